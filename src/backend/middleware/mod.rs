//! Middleware Module
//!
//! - **`auth`** - Session resolution (`authenticate`), the `require_auth`
//!   gate, and the `AuthUser` extractor
//! - **`rate_limit`** - Per-client token bucket returning 429

pub mod auth;
pub mod rate_limit;

pub use auth::{authenticate, require_auth, AuthUser, AuthenticatedUser};
pub use rate_limit::{rate_limit, RateLimiter};
