use {
    switchboard_protocol::{DispatchError, ErrorKind},
    thiserror::Error,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid dispatch key `{key}`: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("dispatch key already registered: {0}")]
    DuplicateKey(String),

    #[error("unknown dispatch key: {0}")]
    UnknownKey(String),
}

impl RegistryError {
    pub(crate) fn invalid(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKey { .. } => ErrorKind::BadRequest,
            Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Self::UnknownKey(_) => ErrorKind::NotFound,
        }
    }
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        DispatchError::new(err.kind(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
