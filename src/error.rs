//! Error types for the lending portal server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    Forbidden = 3,
    StorageFailure = 4,
    NotFound = 5,
    InsufficientStock = 6,
    InvalidTransition = 7,
    Duplicate = 8,
    BadValue = 9,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input: bad dates, non-positive quantities, missing fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// A reservation could not be satisfied by the available units
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    /// The acting role may not perform the requested action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested action is not legal from the request's current status
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code for this error kind
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::InsufficientStock(_) => ErrorCode::InsufficientStock,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::InvalidTransition(_) => ErrorCode::InvalidTransition,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Authentication(_) => ErrorCode::NotAuthenticated,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::Database(_) => ErrorCode::StorageFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    /// HTTP status the API layer answers with
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientStock(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Storage error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Validation(msg)
            | AppError::InsufficientStock(msg)
            | AppError::Forbidden(msg)
            | AppError::InvalidTransition(msg)
            | AppError::NotFound(msg)
            | AppError::Authentication(msg)
            | AppError::Conflict(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_kinds_map_to_distinct_codes() {
        let errors = [
            AppError::Validation(String::new()),
            AppError::InsufficientStock(String::new()),
            AppError::Forbidden(String::new()),
            AppError::InvalidTransition(String::new()),
            AppError::NotFound(String::new()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| e.code() as u32).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_storage_errors_are_not_exposed() {
        let response = AppError::Internal("pool exhausted on node 3".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InsufficientStock("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidTransition("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
    }
}
