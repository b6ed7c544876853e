//! Agora - Forum Messaging Server
//!
//! The real-time core of a community forum: accounts and cookie sessions,
//! persistent direct messages with image attachments, and a WebSocket hub
//! that carries live delivery, presence and typing indicators.
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types and configuration
//!   - WebSocket envelope and events
//!   - `{success, data, error}` response envelope
//!   - Message and conversation types, content validation
//!   - `AppConfig`
//!
//! - **`backend`** - The Axum server
//!   - Auth, sessions and middleware
//!   - Message store (SQLite via sqlx)
//!   - Realtime hub and client pumps
//!
//! # Usage
//!
//! ```rust,no_run
//! use agora::backend::server::{config::load_database, init::create_app};
//! use agora::shared::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let pool = load_database(&config).await?;
//! let app = create_app(config, pool).await?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(
//!     listener,
//!     app.router.clone().into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `shared::SharedError` and `shared::ConfigError` for wire and config problems
//! - `backend::BackendError` at the HTTP boundary, rendered as an error envelope

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
pub mod backend;
