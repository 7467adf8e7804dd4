use models::validation::FieldError;
use thiserror::Error;

use crate::errors::StoreError;

/// Typed failure categories for auth operations.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
    #[error("server rejected input: {0}")]
    RemoteValidation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("network unreachable: {0}")]
    Network(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("session expired")]
    SessionExpired,
    #[error("credential storage error: {0}")]
    Storage(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("unknown auth failure: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 1001,
            AuthError::RemoteValidation(_) => 1002,
            AuthError::InvalidCredentials => 1003,
            AuthError::SessionExpired => 1004,
            AuthError::Network(_) => 1101,
            AuthError::Server(_) => 1102,
            AuthError::Storage(_) => 1200,
            AuthError::Cancelled => 1300,
            AuthError::Unknown(_) => 1999,
        }
    }

    /// Whether re-submitting the same flow can plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AuthError::Storage(_) | AuthError::Unknown(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Storage(e.to_string())
    }
}
