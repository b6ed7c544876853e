//! Conversation Data Structure
//!
//! A conversation is a per-viewer summary of one other user: who they are,
//! the last message exchanged (if any), how many of their messages the
//! viewer has not read yet, and whether they are connected right now.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation with one peer, as seen by the viewer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub user_id: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    /// Content of the last message exchanged in either direction
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Whether the viewer sent the last message
    pub last_message_from_me: Option<bool>,
    /// Messages from this peer the viewer has not read
    pub unread_count: i64,
    pub is_online: bool,
}

impl Conversation {
    pub fn has_messages(&self) -> bool {
        self.last_message_at.is_some()
    }
}

/// Body of `GET /api/conversations`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListConversationsResponse {
    pub conversations: Vec<Conversation>,
}

/// A user currently connected to the live channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct OnlineUser {
    pub user_id: String,
    pub nickname: String,
}

/// Body of `GET /api/users/online`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnlineUsersResponse {
    pub users: Vec<OnlineUser>,
}
