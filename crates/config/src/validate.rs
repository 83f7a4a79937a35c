//! Configuration validation.
//!
//! Flags unknown/misspelled fields and semantic problems (empty tokens,
//! malformed aliases, contradictory timeouts) before the server boots.

use std::{collections::HashSet, path::Path};

use secrecy::ExposeSecret;

use crate::{loader, schema::SwitchboardConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "syntax", "unknown-field", "type-error", "auth", "alias", "dispatch"
    pub category: &'static str,
    /// Dotted path, e.g. "auth.tokens[0].subject"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(category: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(category: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}] {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Collapse into a [`ConfigError::Invalid`](crate::ConfigError::Invalid)
    /// when any error is present.
    pub fn into_result(self) -> crate::Result<Vec<Diagnostic>> {
        let errors: Vec<_> = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        if let Some(first) = errors.first() {
            return Err(crate::ConfigError::Invalid {
                count: errors.len(),
                first: first.to_string(),
            });
        }
        Ok(self.diagnostics)
    }
}

// ── Known fields ────────────────────────────────────────────────────────────

const TOP_LEVEL: &[&str] = &["server", "dispatch", "auth", "modules", "aliases"];
const SERVER_FIELDS: &[&str] = &["bind", "port"];
const DISPATCH_FIELDS: &[&str] = &["timeout_ms", "max_timeout_ms", "duplicate_policy"];
const AUTH_FIELDS: &[&str] = &["tokens"];
const TOKEN_FIELDS: &[&str] = &["token", "subject", "scopes"];
const MODULES_FIELDS: &[&str] = &["disabled"];

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn check_fields(
    value: &serde_json::Value,
    known: &[&str],
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(obj) = value.as_object() else {
        return;
    };
    for key in obj.keys() {
        if known.contains(&key.as_str()) {
            continue;
        }
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let message = match suggest(key, known) {
            Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
            None => "unknown field".to_string(),
        };
        diagnostics.push(Diagnostic::error("unknown-field", path, message));
    }
}

fn check_unknown_fields(value: &serde_json::Value, diagnostics: &mut Vec<Diagnostic>) {
    check_fields(value, TOP_LEVEL, "", diagnostics);
    for (section, fields) in [
        ("server", SERVER_FIELDS),
        ("dispatch", DISPATCH_FIELDS),
        ("auth", AUTH_FIELDS),
        ("modules", MODULES_FIELDS),
    ] {
        if let Some(v) = value.get(section) {
            check_fields(v, fields, section, diagnostics);
        }
    }
    if let Some(tokens) = value.pointer("/auth/tokens").and_then(|v| v.as_array()) {
        for (i, token) in tokens.iter().enumerate() {
            check_fields(token, TOKEN_FIELDS, &format!("auth.tokens[{i}]"), diagnostics);
        }
    }
}

// ── Semantic checks ─────────────────────────────────────────────────────────

fn is_dotted_key(raw: &str) -> bool {
    raw.contains('.')
        && !raw.chars().any(char::is_whitespace)
        && raw.split('.').all(|s| !s.is_empty())
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn check_config(config: &SwitchboardConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let mut seen = HashSet::new();
    for (i, token) in config.auth.tokens.iter().enumerate() {
        let path = format!("auth.tokens[{i}]");
        let secret = token.token.expose_secret();
        if secret.trim().is_empty() {
            diagnostics.push(Diagnostic::error("auth", format!("{path}.token"), "token is empty"));
        } else if !seen.insert(secret.as_str()) {
            diagnostics.push(Diagnostic::error(
                "auth",
                format!("{path}.token"),
                "token is configured more than once",
            ));
        }
        if token.subject.trim().is_empty() {
            diagnostics.push(Diagnostic::error(
                "auth",
                format!("{path}.subject"),
                "subject is empty",
            ));
        }
    }

    for (alias, target) in &config.aliases {
        if !is_dotted_key(alias) {
            diagnostics.push(Diagnostic::error(
                "alias",
                format!("aliases.{alias}"),
                "alias must have the form <module>.<action>",
            ));
        }
        if !is_dotted_key(target) {
            diagnostics.push(Diagnostic::error(
                "alias",
                format!("aliases.{alias}"),
                format!("target `{target}` must have the form <module>.<action>"),
            ));
        }
    }

    let dispatch = &config.dispatch;
    if dispatch.timeout_ms == Some(0) {
        diagnostics.push(Diagnostic::error(
            "dispatch",
            "dispatch.timeout_ms",
            "timeout must be greater than zero (omit it to disable)",
        ));
    }
    if dispatch.max_timeout_ms == Some(0) {
        diagnostics.push(Diagnostic::error(
            "dispatch",
            "dispatch.max_timeout_ms",
            "max timeout must be greater than zero (omit it to disable)",
        ));
    }
    if let (Some(t), Some(max)) = (dispatch.timeout_ms, dispatch.max_timeout_ms)
        && t > max
    {
        diagnostics.push(Diagnostic::warning(
            "dispatch",
            "dispatch.timeout_ms",
            format!("timeout {t}ms exceeds max_timeout_ms {max}ms"),
        ));
    }

    let is_localhost = matches!(config.server.bind.as_str(), "127.0.0.1" | "localhost" | "::1");
    if config.auth.tokens.is_empty() && !is_localhost {
        diagnostics.push(Diagnostic::warning(
            "auth",
            "auth.tokens",
            format!(
                "no tokens configured while binding to {}; auth-gated keys are unreachable",
                config.server.bind
            ),
        ));
    }

    diagnostics
}

/// Validate a raw config value (any format, already parsed).
#[must_use]
pub fn validate_value(value: &serde_json::Value) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_unknown_fields(value, &mut diagnostics);

    match serde_json::from_value::<SwitchboardConfig>(value.clone()) {
        Ok(config) => diagnostics.extend(check_config(&config)),
        Err(e) => diagnostics.push(Diagnostic::error(
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Validate a config file, or the discovered one when `path` is `None`.
/// No file at all is not an error.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let Some(path) = path.map(Path::to_path_buf).or_else(loader::find_config_file) else {
        return ValidationResult::default();
    };

    let mut result = match loader::load_config_value(&path) {
        Ok(value) => validate_value(&value),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::error("syntax", "", e.to_string())],
            config_path: None,
        },
    };
    result.config_path = Some(path);
    result
}
