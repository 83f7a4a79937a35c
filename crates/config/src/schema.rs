/// Config schema types (server, dispatch, auth, modules, aliases).
use std::collections::BTreeMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub server: ServerConfig,
    pub dispatch: DispatchConfig,
    pub auth: AuthConfig,
    pub modules: ModulesConfig,
    /// Extra `alias = "target"` pairs applied after the built-in aliases.
    pub aliases: BTreeMap<String, String>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8787,
        }
    }
}

/// How a second registration of the same key is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKeyPolicy {
    #[default]
    Reject,
    Overwrite,
}

/// Dispatcher behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-invocation timeout. Absent means handlers run unbounded.
    pub timeout_ms: Option<u64>,
    /// Upper bound applied to per-request `timeoutMs` overrides.
    pub max_timeout_ms: Option<u64>,
    pub duplicate_policy: DuplicateKeyPolicy,
}

/// Static bearer tokens accepted by the HTTP surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<ApiToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,
    pub subject: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Built-in modules the bootstrap skips.
    pub disabled: Vec<String>,
}

impl ModulesConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.iter().any(|d| d == name)
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SwitchboardConfig::default();
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.port, 8787);
        assert!(cfg.dispatch.timeout_ms.is_none());
        assert_eq!(cfg.dispatch.duplicate_policy, DuplicateKeyPolicy::Reject);
        assert!(cfg.auth.tokens.is_empty());
        assert!(cfg.modules.is_enabled("memory"));
    }

    #[test]
    fn parses_full_toml() {
        let cfg: SwitchboardConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [dispatch]
            timeout_ms = 5000
            duplicate_policy = "overwrite"

            [[auth.tokens]]
            token = "abc"
            subject = "alice"
            scopes = ["memory.write"]

            [modules]
            disabled = ["onboarding"]

            [aliases]
            "mem.save" = "memory.save"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.dispatch.timeout_ms, Some(5000));
        assert_eq!(cfg.dispatch.duplicate_policy, DuplicateKeyPolicy::Overwrite);
        assert_eq!(cfg.auth.tokens[0].token.expose_secret(), "abc");
        assert_eq!(cfg.auth.tokens[0].scopes, vec!["memory.write"]);
        assert!(!cfg.modules.is_enabled("onboarding"));
        assert_eq!(cfg.aliases["mem.save"], "memory.save");
    }

    #[test]
    fn token_debug_is_redacted() {
        let cfg: SwitchboardConfig =
            toml::from_str("[[auth.tokens]]\ntoken = \"hunter2\"\nsubject = \"bob\"").unwrap();
        let dbg = format!("{:?}", cfg.auth.tokens[0]);
        assert!(!dbg.contains("hunter2"));
    }
}
