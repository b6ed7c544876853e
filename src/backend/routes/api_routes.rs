/**
 * API Route Groups
 *
 * ## Public
 * - `POST /api/auth/register` - Create an account
 * - `POST /api/auth/login` - Start a session (sets the session cookie)
 *
 * ## Authenticated
 * - `POST /api/auth/logout` - End the session
 * - `GET /api/auth/me` - Current user
 * - `GET /api/users/online` - Users with a live socket
 * - `POST /api/messages/send` - Send a direct message (JSON or multipart)
 * - `GET /api/messages/unread-count` - Unread direct messages
 * - `GET /api/messages/{user_id}` - Conversation history, newest first
 * - `GET /api/conversations` - Conversation list
 * - `GET /ws` - WebSocket upgrade
 */

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::backend::auth::{get_me, login, logout, register};
use crate::backend::messaging::{get_messages, list_conversations, online_users, send_message, unread_count};
use crate::backend::realtime::websocket_handler;
use crate::backend::server::state::AppState;
use crate::shared::AppConfig;

/// Routes reachable without a session.
pub fn configure_public_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

/// Routes that sit behind `require_auth`.
///
/// The send endpoint accepts image uploads, so its body limit is raised to
/// fit `max_images_per_message` files of the maximum size.
pub fn configure_protected_routes(router: Router<AppState>, config: &AppConfig) -> Router<AppState> {
    router
        // Account
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(get_me))
        .route("/api/users/online", get(online_users))
        // Messaging
        .route(
            "/api/messages/send",
            post(send_message).layer(DefaultBodyLimit::max(config.upload_body_limit())),
        )
        .route("/api/messages/unread-count", get(unread_count))
        .route("/api/messages/{user_id}", get(get_messages))
        .route("/api/conversations", get(list_conversations))
        // Realtime
        .route("/ws", get(websocket_handler))
}
