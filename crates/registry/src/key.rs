use std::{borrow::Borrow, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{RegistryError, Result};

/// Dotted, case-sensitive operation name such as `memory.save`.
///
/// Always has at least two non-empty segments and contains no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DispatchKey(String);

impl DispatchKey {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(RegistryError::invalid(raw, "key is empty"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(RegistryError::invalid(raw, "key contains whitespace"));
        }
        if !raw.contains('.') {
            return Err(RegistryError::invalid(
                raw,
                "key must have the form <module>.<action>",
            ));
        }
        if raw.split('.').any(str::is_empty) {
            return Err(RegistryError::invalid(raw, "key has an empty segment"));
        }
        Ok(Self(raw))
    }

    /// Build `module.action`.
    pub fn join(module: &str, action: &str) -> Result<Self> {
        Self::parse(format!("{module}.{action}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading segment.
    pub fn module(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(m, _)| m)
    }

    /// Everything after the leading segment.
    pub fn action(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, a)| a)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DispatchKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DispatchKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for DispatchKey {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for DispatchKey {
    type Error = RegistryError;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DispatchKey {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for DispatchKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}
