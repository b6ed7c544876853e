/**
 * Backend Error Types
 *
 * Errors that surface at the HTTP boundary. Every variant maps to a status
 * code and a client-facing message; see `conversion.rs` for the response
 * body.
 *
 * # Status Mapping
 *
 * - `HandlerError` - carries its own status (400/401/403/404/409/429)
 * - `SharedError` - validation and input decoding, 400
 * - `StoreError` - 404 for a missing recipient, otherwise 500
 * - `ImageError` - 400 for rejected uploads, 500 for storage failures
 * - `DatabaseError`, `HubError`, `SerializationError` - 500
 *
 * 5xx messages are replaced with a generic text before they reach the
 * client; the cause is logged instead.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::messaging::db::StoreError;
use crate::backend::messaging::images::ImageError;
use crate::backend::realtime::hub::HubError;
use crate::shared::SharedError;

/// Backend-specific error types
///
/// ```rust
/// use agora::backend::error::BackendError;
/// use axum::http::StatusCode;
///
/// let err = BackendError::bad_request("Invalid request payload");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error (e.g., missing session, invalid request)
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Validation or decoding failure from the shared layer
    #[error(transparent)]
    SharedError(#[from] SharedError),

    #[error(transparent)]
    StoreError(#[from] StoreError),

    #[error(transparent)]
    ImageError(#[from] ImageError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error(transparent)]
    HubError(#[from] HubError),

    /// Serialization error while building a response
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    /// Create a new handler error with a status code
    ///
    /// # Arguments
    ///
    /// * `status` - HTTP status code
    /// * `message` - Error message shown to the client
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::BAD_REQUEST, message)
    }

    /// 401 with the canonical `unauthorized access` message
    pub fn unauthorized() -> Self {
        Self::handler(StatusCode::UNAUTHORIZED, "unauthorized access")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::CONFLICT, message)
    }

    pub fn too_many_requests() -> Self {
        Self::handler(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::SharedError(_) => StatusCode::BAD_REQUEST,
            Self::StoreError(StoreError::RecipientNotFound) => StatusCode::NOT_FOUND,
            Self::StoreError(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ImageError(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::ImageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DatabaseError(_) | Self::HubError(_) | Self::SerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message a client sees
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { status, message } if !status.is_server_error() => message.clone(),
            Self::SharedError(err) => err.reason().to_string(),
            Self::StoreError(StoreError::RecipientNotFound) => "Recipient not found".to_string(),
            Self::ImageError(err) if err.is_client_error() => err.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}
