//! Handler registry: maps dotted dispatch keys (`module.action`) to async
//! handlers and their auth metadata.
//!
//! Feature modules describe themselves with a [`ModuleRegistration`]; the
//! bootstrap feeds those into a single [`Registry`] which the dispatcher
//! then reads concurrently.

pub mod entry;
pub mod error;
pub mod key;
pub mod registry;
pub mod schema;

pub use {
    entry::{
        Action, HandlerContext, HandlerEntry, HandlerFn, HandlerFuture, HandlerResult,
        ModuleMeta, ModuleRegistration, handler,
    },
    error::{RegistryError, Result},
    key::DispatchKey,
    registry::{DuplicatePolicy, KeyInfo, Registry, ToolDefinition},
    schema::{ParamField, ParamSchema, ParamType},
};
