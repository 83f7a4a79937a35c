//! Switchboard dispatch protocol definitions.
//!
//! Every dispatch, whether it arrives over HTTP or from an LLM tool call,
//! crosses the boundary as a [`RequestEnvelope`] and leaves as exactly one
//! [`ResponseEnvelope`].
//!
//! Envelope shapes:
//! - success: `{ "ok": true, "data": ... }`
//! - failure: `{ "ok": false, "error": { "code", "message", "statusCode" } }`

use {
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

// ── Constants ────────────────────────────────────────────────────────────────

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PAYLOAD_BYTES: usize = 524_288; // 512 KB

/// Messages returned in place of the handler's own detail for 5xx kinds.
pub const GENERIC_INTERNAL_MESSAGE: &str = "internal error";
pub const GENERIC_TIMEOUT_MESSAGE: &str = "handler timed out";

// ── Error kinds ──────────────────────────────────────────────────────────────

/// Closed set of failure kinds a dispatch can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,
    DuplicateKey,
    Timeout,
    InternalError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::NotFound,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::BadRequest,
        ErrorKind::DuplicateKey,
        ErrorKind::Timeout,
        ErrorKind::InternalError,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => error_codes::NOT_FOUND,
            Self::Unauthorized => error_codes::UNAUTHORIZED,
            Self::Forbidden => error_codes::FORBIDDEN,
            Self::BadRequest => error_codes::BAD_REQUEST,
            Self::DuplicateKey => error_codes::DUPLICATE_KEY,
            Self::Timeout => error_codes::TIMEOUT,
            Self::InternalError => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::BadRequest => 400,
            Self::DuplicateKey => 409,
            Self::Timeout => 504,
            Self::InternalError => 500,
        }
    }

    /// 4xx kinds carry caller-actionable messages that are safe to return.
    pub fn exposes_message(self) -> bool {
        self.status_code() < 500
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

pub mod error_codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const DUPLICATE_KEY: &str = "DUPLICATE_KEY";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

// ── Dispatch error ───────────────────────────────────────────────────────────

/// Failure signalled by a handler or produced by the dispatcher.
///
/// The message is the full detail. Use [`ErrorShape::from`] to get the
/// caller-facing projection, which hides detail for 5xx kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DispatchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(err.to_string())
    }
}

// ── Error shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl ErrorShape {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code().into(),
            message: message.into(),
            status_code: kind.status_code(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(&self.code)
    }
}

impl From<&DispatchError> for ErrorShape {
    fn from(err: &DispatchError) -> Self {
        let message = match err.kind {
            ErrorKind::InternalError => GENERIC_INTERNAL_MESSAGE.to_string(),
            ErrorKind::Timeout => GENERIC_TIMEOUT_MESSAGE.to_string(),
            _ => err.message.clone(),
        };
        Self::new(err.kind, message)
    }
}

impl From<DispatchError> for ErrorShape {
    fn from(err: DispatchError) -> Self {
        Self::from(&err)
    }
}

// ── Auth ─────────────────────────────────────────────────────────────────────

pub mod scopes {
    /// Satisfies every scope requirement.
    pub const ADMIN: &str = "admin";
}

/// Identity of the caller, attached by the transport after it has verified
/// a credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    pub subject: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl AuthContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.subject.trim().is_empty()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == scopes::ADMIN)
    }
}

// ── Envelopes ────────────────────────────────────────────────────────────────

/// Inbound dispatch request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub key: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(
        rename = "authContext",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auth: Option<AuthContext>,
    #[serde(rename = "timeoutMs", default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl RequestEnvelope {
    pub fn new(key: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            params,
            ..Default::default()
        }
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Outbound dispatch result. Exactly one of `data` / `error` is set,
/// matching `ok`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            request_id: None,
        }
    }

    pub fn err(error: impl Into<ErrorShape>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// HTTP status matching the envelope: 200 on success.
    pub fn status_code(&self) -> u16 {
        self.error.as_ref().map_or(200, |e| e.status_code)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().and_then(ErrorShape::kind)
    }
}

// ── Tool calling ─────────────────────────────────────────────────────────────

/// Tool call emitted by an LLM. `arguments` is either a JSON object or a
/// string containing one, depending on the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Normalise `arguments` into a param bag.
    pub fn params(&self) -> Result<serde_json::Value, DispatchError> {
        match &self.arguments {
            serde_json::Value::String(raw) if raw.trim().is_empty() => {
                Ok(serde_json::Value::Object(Default::default()))
            },
            serde_json::Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
                DispatchError::bad_request(format!("invalid tool call arguments: {e}"))
            }),
            other => Ok(other.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(rename = "toolCallId")]
    pub tool_call_id: String,
    #[serde(flatten)]
    pub envelope: ResponseEnvelope,
}
