//! Error types for the feed service
//!
//! Read-path callers generally do not see these: the assembler collapses
//! failures into an empty page. They surface on the HTTP boundary only for
//! request-shape problems (bad parameters, missing identity header).

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for feed-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Request failed validation at the boundary
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced entity does not exist in the source of truth
    #[error("not found: {0}")]
    NotFound(String),

    /// Cache store unavailable or a command failed
    #[error("store error: {0}")]
    Store(String),

    /// A cached value could not be interpreted
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// Missing or malformed caller identity
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Relational collaborator failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::DataIntegrity(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(_)
            | AppError::DataIntegrity(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}
