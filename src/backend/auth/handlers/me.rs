/**
 * Get Current User Handler
 *
 * GET /api/auth/me
 *
 * The session middleware has already loaded the user, so this only
 * reshapes it.
 */

use axum::response::Json;

use crate::backend::auth::handlers::types::UserEnvelope;
use crate::backend::middleware::auth::AuthUser;
use crate::shared::ApiResponse;

pub async fn get_me(AuthUser(current): AuthUser) -> Json<ApiResponse<UserEnvelope>> {
    Json(ApiResponse::ok(UserEnvelope {
        user: current.user.into(),
    }))
}
