/**
 * User Model and Database Operations
 *
 * Nicknames and emails are unique case-insensitively; the `users` table
 * declares both columns `COLLATE NOCASE`, so plain `=` comparisons below
 * already ignore case.
 */

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// User struct representing a row of `users`
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Opaque user id (UUID text)
    pub user_id: String,
    pub nickname: String,
    pub age: i64,
    pub gender: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Hashed password (bcrypt)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub nickname: String,
    pub age: i64,
    pub gender: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

const USER_COLUMNS: &str =
    "user_id, nickname, age, gender, first_name, last_name, email, password_hash, created_at";

/// Create a new user
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `new_user` - Profile fields and password hash
///
/// # Returns
/// Created user, or a unique-constraint error if the nickname or email is taken
pub async fn create_user(pool: &SqlitePool, new_user: NewUser) -> Result<User, sqlx::Error> {
    let user = User {
        user_id: uuid::Uuid::new_v4().to_string(),
        nickname: new_user.nickname,
        age: new_user.age,
        gender: new_user.gender,
        first_name: new_user.first_name,
        last_name: new_user.last_name,
        email: new_user.email,
        password_hash: new_user.password_hash,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO users (user_id, nickname, age, gender, first_name, last_name, email, password_hash, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&user.user_id)
    .bind(&user.nickname)
    .bind(user.age)
    .bind(&user.gender)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .execute(pool)
    .await?;

    Ok(user)
}

/// Get user by ID
///
/// # Returns
/// User or None if not found
pub async fn get_user_by_id(pool: &SqlitePool, user_id: &str) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS);
    sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Look a user up by nickname or email, whichever `identifier` matches.
pub async fn get_user_by_login(pool: &SqlitePool, identifier: &str) -> Result<Option<User>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM users WHERE nickname = ?1 OR email = ?1 LIMIT 1",
        USER_COLUMNS
    );
    sqlx::query_as::<_, User>(&query)
        .bind(identifier.trim())
        .fetch_optional(pool)
        .await
}

/// Which unique column a failed insert collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakenField {
    Nickname,
    Email,
}

/// Classify a unique-constraint violation from [`create_user`].
pub fn taken_field(err: &sqlx::Error) -> Option<TakenField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.is_unique_violation() {
        return None;
    }
    let message = db_err.message();
    if message.contains("users.email") {
        Some(TakenField::Email)
    } else {
        Some(TakenField::Nickname)
    }
}
