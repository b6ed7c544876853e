//! Shared Error Types
//!
//! Errors raised while decoding wire data or validating user input, before
//! any backend state is touched.
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - Input rejected by a validation rule
//!
//! ```rust
//! use agora::shared::error::SharedError;
//!
//! let error = SharedError::validation("recipient_id", "Recipient ID is required");
//! assert_eq!(error.reason(), "Recipient ID is required");
//! ```
use thiserror::Error;

/// Shared error types that can occur anywhere input is decoded
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The bare message, without the variant prefix.
    ///
    /// This is what clients see in the `error` field of a response.
    pub fn reason(&self) -> &str {
        match self {
            Self::SerializationError { message } => message,
            Self::ValidationError { message, .. } => message,
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
