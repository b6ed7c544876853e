//! `GET /ws` upgrade handler.
//!
//! Sits behind `require_auth`; the user attached by the identity middleware
//! becomes the connection's identity for its whole lifetime.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::backend::middleware::AuthUser;
use crate::backend::realtime::client::serve_connection;
use crate::backend::realtime::hub::ClientRef;
use crate::backend::server::state::AppState;

pub async fn websocket_handler(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let settings = state.config.realtime.clone();
    let hub = state.hub.clone();
    let identity = ClientRef::new(user.user_id, user.nickname);

    tracing::info!(
        "[Client] upgrading connection {} for {} ({})",
        identity.id,
        identity.nickname,
        identity.user_id
    );

    ws.max_message_size(settings.max_frame_size)
        .on_upgrade(move |socket| serve_connection(socket, hub, identity, settings))
}
