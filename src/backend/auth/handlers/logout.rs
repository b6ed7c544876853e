/**
 * Logout Handler
 *
 * POST /api/auth/logout
 *
 * Deletes the caller's session and clears the cookie. Live WebSocket
 * connections are left to expire on their own; the next HTTP request on
 * the old cookie is anonymous.
 */

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Json, Response},
};

use crate::backend::auth::cookies::clear_session_cookie;
use crate::backend::auth::sessions::delete_session;
use crate::backend::error::BackendError;
use crate::backend::middleware::auth::AuthUser;
use crate::backend::server::state::AppState;
use crate::shared::ApiResponse;

pub async fn logout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Response, BackendError> {
    delete_session(&state.db_pool, &user.session_id).await?;
    tracing::info!("[Auth] {} logged out", user.nickname);

    Ok((
        [(SET_COOKIE, clear_session_cookie(&state.config))],
        Json(ApiResponse::success()),
    )
        .into_response())
}
