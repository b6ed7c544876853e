//! Database operations for direct messages
//!
//! Messages, their image rows, read state, and the per-viewer conversation
//! list. Timestamps are stored as RFC3339 text in UTC, which sorts
//! chronologically as text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::shared::messaging::{Conversation, DirectMessage, MessageImage, MessagePage};

/// Message store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("recipient not found")]
    RecipientNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An image file already written to disk, ready to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub image_url: String,
    pub original_filename: String,
}

/// Identity of a freshly persisted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedMessage {
    pub message_id: String,
    pub created_at: DateTime<Utc>,
}

static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time at microsecond precision, strictly increasing within the process.
fn next_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let previous = LAST_TIMESTAMP_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or_else(|last| last);
    let assigned = now.max(previous + 1);
    DateTime::from_timestamp_micros(assigned).unwrap_or_else(Utc::now)
}

/// Persist a message and its images atomically.
///
/// # Errors
///
/// `StoreError::RecipientNotFound` when `recipient_id` is not a user; nothing
/// is written in that case.
pub async fn save_message(
    pool: &SqlitePool,
    sender_id: &str,
    recipient_id: &str,
    content: &str,
    images: &[NewImage],
) -> Result<SavedMessage, StoreError> {
    let mut tx = pool.begin().await?;

    let recipient_exists = sqlx::query("SELECT 1 FROM users WHERE user_id = ?1")
        .bind(recipient_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !recipient_exists {
        return Err(StoreError::RecipientNotFound);
    }

    let saved = SavedMessage {
        message_id: Uuid::new_v4().to_string(),
        created_at: next_timestamp(),
    };

    sqlx::query(
        r#"
        INSERT INTO messages (message_id, sender_id, recipient_id, content, created_at, is_read)
        VALUES (?1, ?2, ?3, ?4, ?5, 0)
        "#,
    )
    .bind(&saved.message_id)
    .bind(sender_id)
    .bind(recipient_id)
    .bind(content)
    .bind(saved.created_at)
    .execute(&mut *tx)
    .await?;

    for image in images {
        sqlx::query(
            r#"
            INSERT INTO message_images (image_id, message_id, image_url, original_filename, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&saved.message_id)
        .bind(&image.image_url)
        .bind(&image.original_filename)
        .bind(saved.created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(saved)
}

/// One page of the conversation between `viewer_id` and `other_id`, newest first.
///
/// `before` is an exclusive upper bound on `created_at`. One extra row is
/// read to decide `has_more`.
pub async fn get_messages(
    pool: &SqlitePool,
    viewer_id: &str,
    other_id: &str,
    limit: u32,
    before: Option<DateTime<Utc>>,
) -> Result<MessagePage, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT m.message_id, m.sender_id, u.nickname AS sender_nickname, m.recipient_id,
               m.content, m.created_at, m.is_read
        FROM messages m
        JOIN users u ON u.user_id = m.sender_id
        WHERE ((m.sender_id = ?1 AND m.recipient_id = ?2)
            OR (m.sender_id = ?2 AND m.recipient_id = ?1))
          AND (?3 IS NULL OR m.created_at < ?3)
        ORDER BY m.created_at DESC, m.message_id DESC
        LIMIT ?4
        "#,
    )
    .bind(viewer_id)
    .bind(other_id)
    .bind(before)
    .bind(i64::from(limit) + 1)
    .fetch_all(pool)
    .await?;

    let mut messages: Vec<DirectMessage> = rows.iter().map(message_from_row).collect::<Result<_, _>>()?;
    let has_more = messages.len() > limit as usize;
    messages.truncate(limit as usize);

    let ids: Vec<&str> = messages.iter().map(|m| m.message_id.as_str()).collect();
    let mut images = get_images_for_messages(pool, &ids).await?;
    for message in &mut messages {
        message.images = images.remove(&message.message_id).unwrap_or_default();
    }

    Ok(MessagePage { messages, has_more })
}

/// Mark everything `other_id` sent to `viewer_id` as read. Returns the number of rows changed.
pub async fn mark_messages_as_read(pool: &SqlitePool, viewer_id: &str, other_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE messages SET is_read = 1
        WHERE recipient_id = ?1 AND sender_id = ?2 AND is_read = 0
        "#,
    )
    .bind(viewer_id)
    .bind(other_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Unread messages addressed to `viewer_id`, from anyone.
pub async fn get_unread_count(pool: &SqlitePool, viewer_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0")
        .bind(viewer_id)
        .fetch_one(pool)
        .await
}

/// One entry per other user, those with messages first (latest first), the
/// rest by nickname. `is_online` is left false for the caller to fill in.
pub async fn get_conversations(pool: &SqlitePool, viewer_id: &str) -> Result<Vec<Conversation>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT u.user_id, u.nickname, u.first_name, u.last_name,
               lm.content AS last_message,
               lm.created_at AS last_message_at,
               lm.sender_id AS last_sender_id,
               (SELECT COUNT(*) FROM messages un
                 WHERE un.sender_id = u.user_id AND un.recipient_id = ?1 AND un.is_read = 0) AS unread_count
        FROM users u
        LEFT JOIN messages lm ON lm.message_id = (
            SELECT m.message_id FROM messages m
            WHERE (m.sender_id = ?1 AND m.recipient_id = u.user_id)
               OR (m.sender_id = u.user_id AND m.recipient_id = ?1)
            ORDER BY m.created_at DESC, m.message_id DESC
            LIMIT 1
        )
        WHERE u.user_id <> ?1
        ORDER BY (lm.created_at IS NULL) ASC, lm.created_at DESC, u.nickname COLLATE NOCASE ASC
        "#,
    )
    .bind(viewer_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let last_sender: Option<String> = row.try_get("last_sender_id")?;
            Ok(Conversation {
                user_id: row.try_get("user_id")?,
                nickname: row.try_get("nickname")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                last_message: row.try_get("last_message")?,
                last_message_at: row.try_get("last_message_at")?,
                last_message_from_me: last_sender.map(|sender| sender == viewer_id),
                unread_count: row.try_get("unread_count")?,
                is_online: false,
            })
        })
        .collect()
}

/// Images of one message, in upload order.
pub async fn get_images_for_message(pool: &SqlitePool, message_id: &str) -> Result<Vec<MessageImage>, sqlx::Error> {
    let mut images = get_images_for_messages(pool, &[message_id]).await?;
    Ok(images.remove(message_id).unwrap_or_default())
}

async fn get_images_for_messages(
    pool: &SqlitePool,
    message_ids: &[&str],
) -> Result<HashMap<String, Vec<MessageImage>>, sqlx::Error> {
    let mut grouped: HashMap<String, Vec<MessageImage>> = HashMap::new();
    if message_ids.is_empty() {
        return Ok(grouped);
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT image_id, message_id, image_url, original_filename, uploaded_at \
         FROM message_images WHERE message_id IN (",
    );
    let mut ids = query.separated(", ");
    for id in message_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY uploaded_at ASC, rowid ASC");

    for row in query.build().fetch_all(pool).await? {
        let image = MessageImage {
            image_id: row.try_get("image_id")?,
            message_id: row.try_get("message_id")?,
            image_url: row.try_get("image_url")?,
            original_filename: row.try_get("original_filename")?,
            uploaded_at: row.try_get("uploaded_at")?,
        };
        grouped.entry(image.message_id.clone()).or_default().push(image);
    }
    Ok(grouped)
}

fn message_from_row(row: &SqliteRow) -> Result<DirectMessage, sqlx::Error> {
    Ok(DirectMessage {
        message_id: row.try_get("message_id")?,
        sender_id: row.try_get("sender_id")?,
        sender_nickname: row.try_get("sender_nickname")?,
        recipient_id: row.try_get("recipient_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        is_read: row.try_get("is_read")?,
        images: Vec::new(),
    })
}
