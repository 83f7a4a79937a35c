use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{ConfigError, Result},
    schema::SwitchboardConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "switchboard.toml",
    "switchboard.yaml",
    "switchboard.yml",
    "switchboard.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SwitchboardConfig> {
    let raw = read(path)?;
    parse_config(&substitute_env(&raw), path)
}

/// Load the config file as a generic JSON value (after env substitution).
pub fn load_config_value(path: &Path) -> Result<serde_json::Value> {
    let raw = read(path)?;
    parse_config_value(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./switchboard.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/switchboard/switchboard.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SwitchboardConfig::default()` if no config file is found or the
/// one found cannot be loaded.
pub fn discover_and_load() -> SwitchboardConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SwitchboardConfig::default()
}

/// Load an explicit path strictly, or fall back to discovery.
pub fn load_or_discover(path: Option<&Path>) -> Result<SwitchboardConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(discover_and_load()),
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/switchboard/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "switchboard").map(|d| d.config_dir().to_path_buf())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

fn parse_error(path: &Path, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<SwitchboardConfig> {
    match extension(path) {
        "toml" => toml::from_str(raw).map_err(|e| parse_error(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_error(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| parse_error(path, e)),
        ext => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

pub(crate) fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    match extension(path) {
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| parse_error(path, e))?;
            serde_json::to_value(v).map_err(|e| parse_error(path, e))
        },
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_error(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| parse_error(path, e)),
        ext => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}
