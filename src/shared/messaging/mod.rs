//! Messaging Module
//!
//! Data structures for direct messaging:
//!
//! - `DirectMessage` / `MessageImage` - persisted messages and attachments
//! - `Conversation` - the per-viewer conversation list entry
//! - request/response bodies of the messaging endpoints
//!
//! ```rust
//! use agora::shared::messaging::{validate_outgoing, MAX_CONTENT_LENGTH};
//!
//! assert!(validate_outgoing("alice", "bob", "hi", 0).is_ok());
//! assert_eq!(MAX_CONTENT_LENGTH, 512);
//! ```

pub mod conversation;
pub mod message;

pub use conversation::{Conversation, ListConversationsResponse, OnlineUser, OnlineUsersResponse};
pub use message::{
    content_length, parse_before, resolve_page_size, validate_outgoing, DirectMessage,
    MessageImage, MessagePage, SendMessageRequest, SendMessageResponse, UnreadCountResponse,
    DEFAULT_PAGE_SIZE, MAX_CONTENT_LENGTH, MAX_PAGE_SIZE,
};
