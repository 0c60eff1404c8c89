// src/api/error.rs
// Centralized error handling for HTTP API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use tracing::error;

use crate::tasks::error::TaskError;

/// Standard API error response format
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
    pub error_code: Option<String>,
}

impl ApiError {
    /// Create a new internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            error_code: Some("INTERNAL_ERROR".to_string()),
        }
    }

    /// Create a new bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_REQUEST,
            error_code: Some("BAD_REQUEST".to_string()),
        }
    }

    /// Create a new not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::NOT_FOUND,
            error_code: Some("NOT_FOUND".to_string()),
        }
    }

    /// Create a new forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::FORBIDDEN,
            error_code: Some("FORBIDDEN".to_string()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response_json = json!({
            "error": true,
            "message": self.message,
            "status": self.status_code.as_u16()
        });

        if let Some(error_code) = self.error_code {
            response_json["error_code"] = json!(error_code);
        }

        (self.status_code, Json(response_json)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Map the engine's error taxonomy onto HTTP statuses. Storage errors are
/// logged with full context and surfaced opaquely; callers never see
/// storage internals.
impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Validation(reason) => ApiError::bad_request(reason),
            TaskError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            TaskError::PermissionDenied(reason) => ApiError::forbidden(reason),
            TaskError::Storage(e) => {
                error!("Storage error: {:?}", e);
                ApiError::internal("Internal storage error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_api_error_creation() {
        let error = ApiError::internal("Test error");
        assert_eq!(error.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "Test error");
    }

    #[test]
    fn test_task_error_mapping() {
        let e: ApiError = TaskError::validation("bad nesting").into();
        assert_eq!(e.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(e.message, "bad nesting");

        let e: ApiError = TaskError::not_found("task 42").into();
        assert_eq!(e.status_code, StatusCode::NOT_FOUND);

        let e: ApiError = TaskError::PermissionDenied("nope".to_string()).into();
        assert_eq!(e.status_code, StatusCode::FORBIDDEN);

        let e: ApiError = TaskError::Storage(sqlx::Error::RowNotFound).into();
        assert_eq!(e.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        // opaque: never leaks storage internals
        assert_eq!(e.message, "Internal storage error");
    }
}
