//! Gateway: dispatcher, built-in modules and the HTTP surface.
//!
//! Lifecycle:
//! 1. Load + validate config
//! 2. Build the registry and bootstrap the built-in modules (fatal on error)
//! 3. Wrap it in a [`Dispatcher`] with the configured timeouts
//! 4. Serve `/api/*` with bearer-token auth

use std::sync::Arc;

use {
    switchboard_config::{DuplicateKeyPolicy, SwitchboardConfig},
    switchboard_registry::{DuplicatePolicy, Registry},
};

pub mod auth;
pub mod dispatch;
pub mod methods;
pub mod server;

pub use {
    auth::TokenAuth,
    dispatch::{DispatchOptions, Dispatcher},
    methods::{BootstrapOptions, bootstrap},
    server::{AppState, build_app, serve},
};

pub fn duplicate_policy(policy: DuplicateKeyPolicy) -> DuplicatePolicy {
    match policy {
        DuplicateKeyPolicy::Reject => DuplicatePolicy::Reject,
        DuplicateKeyPolicy::Overwrite => DuplicatePolicy::Overwrite,
    }
}

/// Build and bootstrap a registry from config.
pub fn registry_from_config(config: &SwitchboardConfig) -> switchboard_registry::Result<Registry> {
    let registry = Registry::with_policy(duplicate_policy(config.dispatch.duplicate_policy));
    bootstrap(&registry, &BootstrapOptions::from_config(config))?;
    Ok(registry)
}

pub fn dispatcher_from_config(
    config: &SwitchboardConfig,
) -> switchboard_registry::Result<Dispatcher> {
    let registry = registry_from_config(config)?;
    Ok(Dispatcher::with_options(
        Arc::new(registry),
        DispatchOptions::from_config(&config.dispatch),
    ))
}

pub fn app_state_from_config(config: &SwitchboardConfig) -> switchboard_registry::Result<AppState> {
    Ok(AppState::new(
        dispatcher_from_config(config)?,
        TokenAuth::from_config(&config.auth),
    ))
}
