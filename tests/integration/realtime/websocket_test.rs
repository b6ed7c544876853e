//! WebSocket integration tests
//!
//! A real listener on `127.0.0.1:0`; sockets via `tokio-tungstenite`,
//! HTTP via `reqwest`. Covers the upgrade gate, presence broadcasts, the
//! inbound frame rules and the heartbeat.

#[macro_use]
#[path = "../../common/mod.rs"]
mod common;

use std::time::Duration;

use agora::shared::RealtimeConfig;
use common::*;
use futures_util::SinkExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

fn fast_heartbeat() -> RealtimeConfig {
    RealtimeConfig {
        ping_period: Duration::from_millis(50),
        pong_wait: Duration::from_millis(300),
        ..RealtimeConfig::default()
    }
}

fn assert_refused(result: Result<TestSocket, WsError>) {
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
        Err(other) => panic!("expected an HTTP refusal, got {}", other),
        Ok(_) => panic!("upgrade should have been refused"),
    }
}

#[tokio::test]
async fn test_upgrade_requires_session() {
    let server = LiveServer::start().await;

    assert_refused(server.try_connect(None).await);
    assert_refused(server.try_connect(Some("not-a-session")).await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_connect_registers_presence() {
    let server = LiveServer::start().await;
    let (alice, alice_session) = server.user_with_session("alice").await;
    let (_bob, bob_session) = server.user_with_session("bob").await;

    let _socket = server.connect(&alice, &alice_session).await;

    let (status, body) = server.get_json(&bob_session, "/api/users/online").await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(
        body["data"]["users"],
        json!([{"user_id": alice.user_id, "nickname": "alice"}])
    );

    let (_, conversations) = server.get_json(&bob_session, "/api/conversations").await;
    let entry = conversations["data"]["conversations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["user_id"] == alice.user_id.as_str())
        .cloned()
        .expect("alice listed");
    assert_eq!(entry["is_online"], true);

    server.shutdown().await;
}

#[tokio::test]
async fn test_presence_broadcasts() {
    let server = LiveServer::start().await;
    let (alice, alice_session) = server.user_with_session("alice").await;
    let (bob, bob_session) = server.user_with_session("bob").await;

    let mut bob_socket = server.connect(&bob, &bob_session).await;
    let mut alice_socket = server.connect(&alice, &alice_session).await;

    let online = next_event_named(&mut bob_socket, "user_online").await;
    assert_eq!(
        online,
        json!({
            "event": "user_online",
            "payload": {"user_id": alice.user_id, "nickname": "alice", "status": "online"}
        })
    );

    alice_socket.close(None).await.unwrap();

    let offline = next_event_named(&mut bob_socket, "user_offline").await;
    assert_eq!(offline["payload"]["user_id"], alice.user_id.as_str());
    assert_eq!(offline["payload"]["status"], "offline");

    let hub = &server.state.hub;
    let alice_id = alice.user_id.as_str();
    wait_until(move || async move { !hub.is_online(alice_id).await.unwrap_or(true) }).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_inbound_send_message_is_rejected() {
    let server = LiveServer::start().await;
    let (alice, session) = server.user_with_session("alice").await;
    let bob = create_test_user(&server.state.db_pool, "bob").await;
    let mut socket = server.connect(&alice, &session).await;

    send_event(
        &mut socket,
        json!({"event": "send_message", "payload": {"recipient_id": bob.user_id, "content": "hi"}}),
    )
    .await;

    let error = next_event(&mut socket).await.expect("error frame");
    assert_eq!(
        error,
        json!({
            "event": "error",
            "payload": {"message": "Unsupported event type. Use HTTP POST /api/messages/send to send messages."}
        })
    );
    assert_eq!(count_messages(&server.state.db_pool).await, 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_bad_frames_get_error_and_keep_connection() {
    let server = LiveServer::start().await;
    let (alice, session) = server.user_with_session("alice").await;
    let mut socket = server.connect(&alice, &session).await;

    send_event(&mut socket, json!({"event": "dance", "payload": {}})).await;
    let unknown = next_event(&mut socket).await.expect("error frame");
    assert_eq!(unknown["payload"]["message"], "Unsupported event type: dance");

    socket.send(Message::Text("{not json".to_string())).await.unwrap();
    let invalid = next_event(&mut socket).await.expect("error frame");
    assert_eq!(invalid["payload"]["message"], "Invalid message format");

    socket.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    let binary = next_event(&mut socket).await.expect("error frame");
    assert_eq!(binary["payload"]["message"], "Binary frames are not supported");

    assert!(server.state.hub.is_online(&alice.user_id).await.unwrap());

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let server = LiveServer::with_config(|builder| {
        builder.realtime(RealtimeConfig {
            max_frame_size: 1024,
            ..RealtimeConfig::default()
        })
    })
    .await;
    let (alice, session) = server.user_with_session("alice").await;
    let mut socket = server.connect(&alice, &session).await;

    let padding = "x".repeat(4096);
    let _ = socket
        .send(Message::Text(json!({"event": "typing_start", "payload": {"pad": padding}}).to_string()))
        .await;

    assert_eq!(next_event(&mut socket).await, None);
    let hub = &server.state.hub;
    let alice_id = alice.user_id.as_str();
    wait_until(move || async move { !hub.is_online(alice_id).await.unwrap_or(true) }).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_typing_ignored_for_self_and_empty_recipient() {
    let server = LiveServer::start().await;
    let (alice, alice_session) = server.user_with_session("alice").await;
    let (bob, bob_session) = server.user_with_session("bob").await;
    let mut bob_socket = server.connect(&bob, &bob_session).await;
    let mut alice_socket = server.connect(&alice, &alice_session).await;
    next_event_named(&mut bob_socket, "user_online").await;

    send_event(&mut alice_socket, json!({"event": "typing_start", "payload": {"recipient_id": alice.user_id}})).await;
    send_event(&mut alice_socket, json!({"event": "typing_start", "payload": {"recipient_id": ""}})).await;
    send_event(&mut alice_socket, json!({"event": "typing_stop", "payload": {"recipient_id": "offline-user"}})).await;

    let to_alice = drain_events(&mut alice_socket, Duration::from_millis(300)).await;
    let to_bob = drain_events(&mut bob_socket, Duration::from_millis(300)).await;
    assert_eq!(to_alice, Vec::<serde_json::Value>::new());
    assert_eq!(to_bob, Vec::<serde_json::Value>::new());

    server.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_keeps_responsive_client() {
    let server = LiveServer::with_config(|builder| builder.realtime(fast_heartbeat())).await;
    let (alice, session) = server.user_with_session("alice").await;
    let mut socket = server.connect(&alice, &session).await;

    // Reading lets the client answer pings.
    let events = drain_events(&mut socket, Duration::from_millis(900)).await;
    assert!(events.is_empty());

    assert!(server.state.hub.is_online(&alice.user_id).await.unwrap());

    server.shutdown().await;
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let server = LiveServer::with_config(|builder| builder.realtime(fast_heartbeat())).await;
    let (alice, session) = server.user_with_session("alice").await;
    let _socket = server.connect(&alice, &session).await;

    // Never read, so pings go unanswered.
    let hub = &server.state.hub;
    let alice_id = alice.user_id.as_str();
    wait_until(move || async move { !hub.is_online(alice_id).await.unwrap_or(true) }).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_session_bound_to_address_on_first_use() {
    let server = LiveServer::start().await;
    let (alice, session) = server.user_with_session("alice").await;

    let _socket = server.connect(&alice, &session).await;

    let stored: String = sqlx::query_scalar("SELECT ip_address FROM sessions WHERE session_id = ?1")
        .bind(&session)
        .fetch_one(&server.state.db_pool)
        .await
        .unwrap();
    assert_eq!(stored, "127.0.0.1");

    server.shutdown().await;
}
