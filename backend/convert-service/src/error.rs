/// Error types for convert-service
///
/// One taxonomy for the whole service. HTTP-facing paths convert to
/// responses through `ResponseError`; the worker logs and drops.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for convert-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input (bad ratio, unsupported type, missing extension)
    #[error("validation error: {0}")]
    Validation(String),

    /// Request or image missing
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Object storage operation failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Work item could not be published to the broker
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Decode, resize or encode failed
    #[error("image processing error: {0}")]
    ImageProcessing(String),

    /// A write affected an unexpected number of rows; always rolled back
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_)
            | AppError::Database(_)
            | AppError::Dispatch(_)
            | AppError::ImageProcessing(_)
            | AppError::Consistency(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Internal detail stays in the logs, not in the response body.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
