/**
 * Login Handler
 *
 * POST /api/auth/login
 *
 * 1. Look the user up by nickname or email
 * 2. Verify the password with bcrypt
 * 3. Create a session bound to the client address, replacing any older one
 * 4. Set the session cookie and return the user with the session id
 *
 * Unknown identifiers and wrong passwords both answer 401 `Invalid credentials`.
 */

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Json, Response},
};

use crate::backend::auth::client_ip::ClientIp;
use crate::backend::auth::cookies::session_cookie;
use crate::backend::auth::handlers::types::{LoginRequest, LoginResponse};
use crate::backend::auth::sessions::create_session;
use crate::backend::auth::users::get_user_by_login;
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;
use crate::shared::ApiResponse;

/// Login handler
///
/// # Errors
///
/// * `400 Bad Request` - malformed body or missing fields
/// * `401 Unauthorized` - unknown identifier or wrong password
/// * `500 Internal Server Error` - database or hashing failure
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, BackendError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("[Auth] rejected login body: {}", e);
        BackendError::bad_request("Invalid request payload")
    })?;

    let identifier = request.identifier.trim();
    if identifier.is_empty() || request.password.is_empty() {
        return Err(BackendError::bad_request(
            "Identifier (nickname or email) and password are required",
        ));
    }

    let Some(user) = get_user_by_login(&state.db_pool, identifier).await? else {
        tracing::debug!("[Auth] login for unknown identifier");
        return Err(invalid_credentials());
    };

    let password = request.password;
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| BackendError::internal(format!("verify task failed: {}", e)))?
        .map_err(|e| BackendError::internal(format!("password verification failed: {}", e)))?;

    if !valid {
        tracing::warn!("[Auth] invalid password for {}", user.nickname);
        return Err(invalid_credentials());
    }

    let session = create_session(
        &state.db_pool,
        &user.user_id,
        ip.as_deref().unwrap_or_default(),
        state.config.session_duration,
    )
    .await?;

    tracing::info!("[Auth] {} logged in from {}", user.nickname, ip.as_deref().unwrap_or("unknown"));

    let cookie = session_cookie(&state.config, &session.session_id, session.expires_at);
    let body = ApiResponse::ok(LoginResponse {
        user: user.into(),
        session_id: session.session_id,
    });
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

fn invalid_credentials() -> BackendError {
    BackendError::handler(StatusCode::UNAUTHORIZED, "Invalid credentials")
}
