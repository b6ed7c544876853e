/**
 * Session Management
 *
 * Server-side sessions keyed by an opaque random token that travels in the
 * session cookie. A user has at most one session: creating one deletes
 * whatever session the user had before, in the same transaction.
 */

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use sqlx::SqlitePool;

/// Row of the `sessions` table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    /// Client address at creation (or last tolerated move), without port
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is valid strictly before `expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Outcome of looking up a session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Valid(Session),
    /// The session existed but had expired; its row has been deleted.
    Expired,
    Missing,
}

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Create a session for `user_id`, replacing any previous one.
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `user_id` - Owner of the session
/// * `ip_address` - Client address, already stripped of its port
/// * `duration` - Validity window
pub async fn create_session(
    pool: &SqlitePool,
    user_id: &str,
    ip_address: &str,
    duration: Duration,
) -> Result<Session, sqlx::Error> {
    let created_at = Utc::now();
    let lifetime = TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
    let session = Session {
        session_id: generate_session_id(),
        user_id: user_id.to_string(),
        ip_address: ip_address.to_string(),
        created_at,
        expires_at: created_at.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
    };

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO sessions (user_id, session_id, ip_address, created_at, expires_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&session.user_id)
    .bind(&session.session_id)
    .bind(&session.ip_address)
    .bind(session.created_at)
    .bind(session.expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(session)
}

pub async fn get_session(pool: &SqlitePool, session_id: &str) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT session_id, user_id, ip_address, created_at, expires_at
        FROM sessions
        WHERE session_id = ?1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

/// Look up a session and delete it if it has expired.
pub async fn resolve_session(
    pool: &SqlitePool,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<SessionLookup, sqlx::Error> {
    match get_session(pool, session_id).await? {
        None => Ok(SessionLookup::Missing),
        Some(session) if session.is_valid_at(now) => Ok(SessionLookup::Valid(session)),
        Some(session) => {
            delete_session(pool, &session.session_id).await?;
            Ok(SessionLookup::Expired)
        }
    }
}

/// Delete a session; returns whether a row was removed.
pub async fn delete_session(pool: &SqlitePool, session_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_session_ip(pool: &SqlitePool, session_id: &str, ip_address: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET ip_address = ?1 WHERE session_id = ?2")
        .bind(ip_address)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}
