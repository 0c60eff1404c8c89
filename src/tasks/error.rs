//! Domain error taxonomy for the task engine.
//!
//! Every mutating operation runs inside one transaction; any of these
//! errors aborts and rolls back the whole operation, batch members included.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// Malformed input rejected before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced task/project/resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Permission gate rejected the caller.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Query or transaction failure. Logged with context at the boundary,
    /// surfaced to callers as an opaque internal error.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl TaskError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TaskError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        TaskError::NotFound(what.into())
    }
}

pub type TaskResult<T> = Result<T, TaskError>;
