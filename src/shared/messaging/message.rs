//! Direct Message Data Structures
//!
//! Messages, their image attachments, the HTTP bodies of the send and
//! history endpoints, and the validation rules applied to an outgoing
//! message before it is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;

/// Upper bound on message content, in UTF-16 code units.
pub const MAX_CONTENT_LENGTH: usize = 512;

/// Default page size of the history endpoint
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page the history endpoint will return
pub const MAX_PAGE_SIZE: u32 = 50;

/// An image attached to a direct message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageImage {
    pub image_id: String,
    pub message_id: String,
    /// Public URL under `/uploads/`
    pub image_url: String,
    pub original_filename: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A persisted direct message as returned by the history endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectMessage {
    pub message_id: String,
    pub sender_id: String,
    pub sender_nickname: String,
    pub recipient_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    #[serde(default)]
    pub images: Vec<MessageImage>,
}

/// JSON body of `POST /api/messages/send`
///
/// The multipart form carries the same two fields plus `images`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub recipient_id: String,
    #[serde(default)]
    pub content: String,
}

/// Returned with 201 once a message has been persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageResponse {
    pub message_id: String,
    pub created_at: DateTime<Utc>,
}

/// One page of history, newest first
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePage {
    pub messages: Vec<DirectMessage>,
    pub has_more: bool,
}

/// Body of `GET /api/messages/unread-count`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

/// Length of `content` as counted against [`MAX_CONTENT_LENGTH`].
pub fn content_length(content: &str) -> usize {
    content.encode_utf16().count()
}

/// Check an outgoing message before anything is written.
///
/// `content` is checked exactly as sent; whitespace counts towards the limit.
pub fn validate_outgoing(
    sender_id: &str,
    recipient_id: &str,
    content: &str,
    image_count: usize,
) -> Result<(), SharedError> {
    if recipient_id.trim().is_empty() {
        return Err(SharedError::validation("recipient_id", "Recipient ID is required"));
    }
    if recipient_id == sender_id {
        return Err(SharedError::validation("recipient_id", "Cannot send message to yourself"));
    }
    if content_length(content) > MAX_CONTENT_LENGTH {
        return Err(SharedError::validation(
            "content",
            format!("Message content too long (max {} characters)", MAX_CONTENT_LENGTH),
        ));
    }
    if content.is_empty() && image_count == 0 {
        return Err(SharedError::validation("content", "Message must have content or images"));
    }
    Ok(())
}

/// Resolve the `limit` query parameter of the history endpoint.
///
/// Absent or `0` falls back to [`DEFAULT_PAGE_SIZE`].
pub fn resolve_page_size(limit: Option<&str>) -> Result<u32, SharedError> {
    let invalid = || {
        SharedError::validation(
            "limit",
            format!("Invalid limit parameter (must be 1-{})", MAX_PAGE_SIZE),
        )
    };
    match limit.map(str::trim) {
        None | Some("") => Ok(DEFAULT_PAGE_SIZE),
        Some(raw) => {
            let value: u32 = raw.parse().map_err(|_| invalid())?;
            match value {
                0 => Ok(DEFAULT_PAGE_SIZE),
                1..=MAX_PAGE_SIZE => Ok(value),
                _ => Err(invalid()),
            }
        }
    }
}

/// Parse the optional `before` cursor (RFC3339).
pub fn parse_before(before: Option<&str>) -> Result<Option<DateTime<Utc>>, SharedError> {
    match before.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|_| {
                SharedError::validation("before", "Invalid before parameter (use RFC3339 format)")
            }),
    }
}
