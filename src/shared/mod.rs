//! Shared Module
//!
//! Types that travel over the wire or are needed by more than one backend
//! subsystem: the WebSocket envelope, HTTP request/response bodies, the
//! `{success, data, error}` response envelope, configuration and the
//! validation errors raised before anything touches the database.
//!
//! Nothing in here performs I/O apart from `AppConfig::load`, which reads
//! the optional TOML file and the process environment.

/// WebSocket event envelope and payloads
pub mod event;

/// Shared error types
pub mod error;

/// JSON response envelope
pub mod api;

/// Application configuration
pub mod config;

/// Direct message and conversation types
pub mod messaging;

pub use api::ApiResponse;
pub use config::{AppConfig, AppConfigBuilder, ConfigError, RealtimeConfig};
pub use error::SharedError;
pub use event::{ClientEvent, Envelope, ServerEvent};
