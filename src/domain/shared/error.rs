//! Domain errors

use crate::domain::auth::AuthError;
use crate::domain::validation::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("SIP store is not configured")]
    StoreUnavailable,

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Remote call failed: {0}")]
    RemoteCall(String),

    #[error("Remote call timed out after {0:?}")]
    RemoteTimeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Short machine-readable kind, used for metrics labels and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::StoreUnavailable => "store_unavailable",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::InvalidInput(_) => "invalid_input",
            DomainError::RemoteCall(_) => "remote_call",
            DomainError::RemoteTimeout(_) => "remote_timeout",
            DomainError::Storage(_) => "storage",
            DomainError::Internal(_) => "internal",
        }
    }
}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        if err.is_conflict() {
            DomainError::Conflict(err.to_string())
        } else {
            DomainError::InvalidInput(err.to_string())
        }
    }
}
