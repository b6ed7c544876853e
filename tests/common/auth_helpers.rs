//! Authentication test helpers
//!
//! Factories for users and sessions that bypass the HTTP layer, plus the
//! cookie header tests attach to authenticated requests.

use std::time::Duration;

use agora::backend::auth::sessions::create_session;
use agora::backend::auth::users::{create_user, NewUser, User};
use axum::http::{header, HeaderName, HeaderValue};
use sqlx::SqlitePool;

/// Password every factory user gets
pub const TEST_PASSWORD: &str = "password123";

/// Session cookie name of the default configuration
pub const SESSION_COOKIE: &str = "forum_session";

/// Test user credentials
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: String,
    pub nickname: String,
    pub email: String,
    pub password: String,
}

impl From<User> for TestUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            nickname: user.nickname,
            email: user.email,
            password: TEST_PASSWORD.to_string(),
        }
    }
}

/// Create a user directly in the database
pub async fn create_test_user(pool: &SqlitePool, nickname: &str) -> TestUser {
    // Minimum bcrypt cost keeps the suite fast.
    let password_hash = bcrypt::hash(TEST_PASSWORD, 4).expect("Failed to hash test password");

    let user = create_user(
        pool,
        NewUser {
            nickname: nickname.to_string(),
            age: 30,
            gender: "other".to_string(),
            first_name: format!("{}-first", nickname),
            last_name: format!("{}-last", nickname),
            email: format!("{}@example.com", nickname.to_lowercase()),
            password_hash,
        },
    )
    .await
    .expect("Failed to create test user");

    user.into()
}

/// Start a session for `user` and return its id.
///
/// The session has no recorded address, so the first request from any
/// address binds it.
pub async fn create_test_session(pool: &SqlitePool, user: &TestUser) -> String {
    create_session(pool, &user.user_id, "", Duration::from_secs(3600))
        .await
        .expect("Failed to create test session")
        .session_id
}

/// `Cookie` header carrying `session_id`
pub fn session_cookie(session_id: &str) -> (HeaderName, HeaderValue) {
    let value = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, session_id))
        .expect("session ids are valid header values");
    (header::COOKIE, value)
}

/// Registration body with every required field filled in
pub fn registration_body(nickname: &str) -> serde_json::Value {
    serde_json::json!({
        "nickname": nickname,
        "email": format!("{}@example.com", nickname.to_lowercase()),
        "password": TEST_PASSWORD,
        "age": 27,
        "gender": "female",
        "first_name": "Test",
        "last_name": "User",
    })
}
