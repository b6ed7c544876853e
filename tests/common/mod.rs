//! Common test utilities and helpers
//!
//! Shared by every integration test target:
//! - Database fixtures (in-memory SQLite with migrations)
//! - User and session factories
//! - `TestApp` for in-process HTTP tests, `LiveServer` for socket tests
//! - Custom assertion macros

#![allow(dead_code)]

pub mod auth_helpers;

// Re-export commonly used utilities
#[allow(unused_imports)]
pub use auth_helpers::*;
#[allow(unused_imports)]
pub use database::*;
#[allow(unused_imports)]
pub use live_server::*;
#[allow(unused_imports)]
pub use test_app::*;
