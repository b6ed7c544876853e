//! Authentication Module
//!
//! Accounts, server-side sessions, and the HTTP handlers around them.
//!
//! # Architecture
//!
//! - **`users`** - User model and database operations
//! - **`sessions`** - Session rows keyed by an opaque cookie token
//! - **`cookies`** - Reading and writing the session cookie
//! - **`client_ip`** - Client address resolution and the IP-change heuristic
//! - **`handlers`** - register, login, logout, me
//!
//! # Authentication Flow
//!
//! 1. **Register**: profile and password stored (bcrypt), 201 with the user
//! 2. **Login**: credentials verified, session created, cookie set
//! 3. **Requests**: `middleware::auth::authenticate` resolves the cookie on every request
//! 4. **Logout**: session deleted, cookie cleared
//!
//! One session per user: logging in again replaces the old session.

pub mod client_ip;
pub mod cookies;
pub mod handlers;
pub mod sessions;
pub mod users;

pub use handlers::{get_me, login, logout, register};
pub use handlers::types::{LoginRequest, LoginResponse, RegisterRequest, UserResponse};
