/**
 * Authentication Handler Types
 *
 * Request and response bodies for the account endpoints. Responses are
 * wrapped in `ApiResponse` by the handlers.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::auth::users::User;

/// Registration request
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub nickname: String,
    pub email: String,
    /// Plain text; hashed with bcrypt before storage
    pub password: String,
    pub age: i64,
    pub gender: String,
    pub first_name: String,
    pub last_name: String,
}

/// Login request
///
/// `identifier` is matched against both nickname and email.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// User information that is safe to return to clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub user_id: String,
    pub nickname: String,
    pub email: String,
    pub age: i64,
    pub gender: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            nickname: user.nickname,
            email: user.email,
            age: user.age,
            gender: user.gender,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
        }
    }
}

/// `data` of register and me responses
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

/// `data` of a successful login
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// Same value as the session cookie
    pub session_id: String,
}
