/**
 * Error Conversion
 *
 * `BackendError` implements `IntoResponse`, so handlers return
 * `Result<_, BackendError>` and failures render as the standard envelope:
 *
 * ```json
 * { "success": false, "error": "Cannot send message to yourself" }
 * ```
 */

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::BackendError;
use crate::shared::ApiResponse;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("[Http] {} -> {}", self, status);
        } else {
            tracing::debug!("[Http] {} -> {}", self, status);
        }

        (status, Json(ApiResponse::failure(self.message()))).into_response()
    }
}
