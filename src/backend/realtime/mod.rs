//! Real-time Module
//!
//! The live channel: a WebSocket per connected user, fanned out through a
//! single hub task.
//!
//! - **`hub`** - registry of live clients; presence, typing relay, directed delivery
//! - **`client`** - read and write pumps of one socket
//! - **`handler`** - the authenticated `/ws` upgrade endpoint
//!
//! ```text
//! realtime/
//! ├── mod.rs      - Module exports and documentation
//! ├── hub.rs      - Hub loop and handle
//! ├── client.rs   - Socket pumps, heartbeat, backpressure
//! └── handler.rs  - Upgrade handler
//! ```

pub mod client;
pub mod handler;
pub mod hub;

pub use handler::websocket_handler;
pub use hub::{ClientId, ClientRef, Hub, HubError, LiveClient};
