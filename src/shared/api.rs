/**
 * API Response Envelope
 *
 * Every JSON body the HTTP surface returns has the same outer shape:
 *
 * ```json
 * { "success": true, "data": { ... } }
 * { "success": false, "error": "Cannot send message to yourself" }
 * ```
 */
use serde::{Deserialize, Serialize};

/// `{success, data?, error?}` wrapper for all JSON responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    /// Successful response with no data
    pub fn success() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// Failed response with a human-readable message and no data
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
