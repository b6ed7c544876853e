//! Authentication Handlers Module
//!
//! ```text
//! handlers/
//! ├── mod.rs       - Handler exports
//! ├── types.rs     - Request and response types
//! ├── register.rs  - POST /api/auth/register
//! ├── login.rs     - POST /api/auth/login
//! ├── logout.rs    - POST /api/auth/logout
//! └── me.rs        - GET /api/auth/me
//! ```

/// Request and response types
pub mod types;

pub mod register;

pub mod login;

pub mod logout;

/// Get current user handler
pub mod me;

pub use types::{LoginRequest, LoginResponse, RegisterRequest, UserEnvelope, UserResponse};

pub use login::login;
pub use logout::logout;
pub use me::get_me;
pub use register::register;
