//! Messaging Module
//!
//! Direct messages between users: the SQLite store, image uploads, and the
//! HTTP handlers that tie them to the realtime hub.

pub mod db;
pub mod handlers;
pub mod images;

pub use handlers::{get_messages, list_conversations, online_users, send_message, unread_count};
pub use images::{ImageError, ImageStore};
