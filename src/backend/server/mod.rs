//! Server Module
//!
//! Startup plumbing for the Axum server.
//!
//! - **`state`** - `AppState` and its `FromRef` implementations
//! - **`config`** - SQLite pool and embedded migrations
//! - **`init`** - App assembly and background tasks
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Database loading and migrations
//! └── init.rs         - App creation, rate-limit cleanup task
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use agora::backend::server::{config::load_database, init::create_app};
//! use agora::shared::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let pool = load_database(&config).await?;
//! let app = create_app(config, pool).await?;
//! # Ok(())
//! # }
//! ```

/// Application state management
pub mod state;

/// Database loading
pub mod config;

/// Server initialization
pub mod init;

pub use config::load_database;
pub use init::{create_app, App};
pub use state::AppState;
