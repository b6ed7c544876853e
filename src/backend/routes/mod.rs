//! Route Configuration Module
//!
//! - **`router`** - Router assembly and the middleware stack
//! - **`api_routes`** - Public and authenticated route groups
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - create_router, CORS
//! └── api_routes.rs   - Route groups
//! ```
//!
//! Uploaded images are served under `/uploads` straight from the upload
//! directory. Anything else that does not match a route gets a 404
//! envelope.

/// Main router creation
pub mod router;

/// API route groups
pub mod api_routes;

pub use router::create_router;
