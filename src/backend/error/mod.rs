//! Backend Error Module
//!
//! - **`types`** - `BackendError` and its status/message mapping
//! - **`conversion`** - `IntoResponse` rendering the `{success:false, error}` envelope

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::BackendError;
