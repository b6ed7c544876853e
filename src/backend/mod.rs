//! Backend Module
//!
//! The Axum server: HTTP API, the `/ws` realtime channel, and SQLite
//! persistence.
//!
//! # Architecture
//!
//! - **`server`** - Application state, database loading, app assembly
//! - **`routes`** - Route groups and the middleware stack
//! - **`auth`** - Users, sessions, cookies, account handlers
//! - **`middleware`** - Identity resolution, auth gate, rate limiting
//! - **`realtime`** - Hub loop and WebSocket client pumps
//! - **`messaging`** - Direct message store, image uploads, handlers
//! - **`error`** - `BackendError` and its HTTP mapping
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - agora-server binary
//! ├── server/         - State and initialization
//! ├── routes/         - Route configuration
//! ├── auth/           - Accounts and sessions
//! ├── middleware/     - Request middleware
//! ├── realtime/       - Hub and sockets
//! ├── messaging/      - Direct messages
//! └── error/          - Error types
//! ```
//!
//! # Request Flow
//!
//! Every request passes `TraceLayer`, CORS, the rate limiter and
//! `authenticate`, which attaches the session's user when there is one.
//! Authenticated routes then check for that user. Handlers talk to the
//! store through the pool in `AppState` and to live sockets through the
//! `Hub` handle; neither holds a lock across an await.

/// Server setup and state
pub mod server;

/// Route configuration
pub mod routes;

/// Real-time hub and WebSocket handling
pub mod realtime;

/// Backend error types
pub mod error;

/// Authentication and user management
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Direct messaging
pub mod messaging;

pub use error::BackendError;
pub use realtime::Hub;
pub use server::{create_app, App, AppState};
