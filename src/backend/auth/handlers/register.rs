/**
 * Register Handler
 *
 * POST /api/auth/register
 *
 * 1. Validate the profile fields
 * 2. Hash the password with bcrypt (off the async executor)
 * 3. Insert the user; unique violations become 409
 * 4. Return 201 with the created user
 *
 * Registration does not log the user in.
 */

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};

use crate::backend::auth::handlers::types::{RegisterRequest, UserEnvelope};
use crate::backend::auth::users::{create_user, taken_field, NewUser, TakenField};
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;
use crate::shared::ApiResponse;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NICKNAME_LENGTH: usize = 30;

/// Check a registration request, returning the first problem found.
pub fn validate_registration(request: &RegisterRequest) -> Result<(), BackendError> {
    let nickname = request.nickname.trim();
    if nickname.is_empty() {
        return Err(BackendError::bad_request("Nickname is required"));
    }
    if nickname.chars().count() > MAX_NICKNAME_LENGTH || nickname.contains(char::is_whitespace) {
        return Err(BackendError::bad_request(
            "Nickname must be at most 30 characters with no spaces",
        ));
    }
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(BackendError::bad_request("Email and password are required"));
    }
    if request.first_name.trim().is_empty() {
        return Err(BackendError::bad_request("First name is required"));
    }
    if request.last_name.trim().is_empty() {
        return Err(BackendError::bad_request("Last name is required"));
    }
    if request.gender.trim().is_empty() {
        return Err(BackendError::bad_request("Gender is required"));
    }
    if request.age <= 0 {
        return Err(BackendError::bad_request("Valid age is required"));
    }

    let email = request.email.trim();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(BackendError::bad_request("Invalid email format"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(BackendError::bad_request("Password must be at least 8 characters"));
    }
    Ok(())
}

/// Register handler
///
/// # Errors
///
/// * `400 Bad Request` - malformed body or failed validation
/// * `409 Conflict` - nickname or email already taken (case-insensitive)
/// * `500 Internal Server Error` - hashing or database failure
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserEnvelope>>), BackendError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("[Auth] rejected register body: {}", e);
        BackendError::bad_request("Invalid request payload")
    })?;
    validate_registration(&request)?;

    let password = request.password.clone();
    let cost = state.config.password_hash_cost;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| BackendError::internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| BackendError::internal(format!("failed to hash password: {}", e)))?;

    let new_user = NewUser {
        nickname: request.nickname.trim().to_string(),
        age: request.age,
        gender: request.gender.trim().to_string(),
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        email: request.email.trim().to_string(),
        password_hash,
    };

    let user = match create_user(&state.db_pool, new_user).await {
        Ok(user) => user,
        Err(e) => {
            return Err(match taken_field(&e) {
                Some(TakenField::Nickname) => BackendError::conflict("nickname already taken"),
                Some(TakenField::Email) => BackendError::conflict("email already taken"),
                None => e.into(),
            })
        }
    };

    tracing::info!("[Auth] registered {} ({})", user.nickname, user.user_id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserEnvelope { user: user.into() })),
    ))
}
