//! Configuration loading, validation, and env substitution.
//!
//! Config files: `switchboard.toml`, `switchboard.yaml`, or `switchboard.json`
//! Searched in `./` then `~/.config/switchboard/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{ConfigError, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config, load_or_discover},
    schema::{
        ApiToken, AuthConfig, DispatchConfig, DuplicateKeyPolicy, ModulesConfig, ServerConfig,
        SwitchboardConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
