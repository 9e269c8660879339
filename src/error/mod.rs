//! Unified error handling for the access core

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AccessError>;

/// Access core error types
///
/// Read-path resolution never surfaces `NotFound`: an unknown role or user
/// resolves to an empty collection. `NotFound`, `InvalidTarget` and
/// `Conflict` belong to the mutation boundary.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AccessError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AccessError::Validation(errors.to_string())
    }
}
