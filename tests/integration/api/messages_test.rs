//! Messaging API integration tests
//!
//! Send (JSON and multipart), history pagination, unread counts and the
//! conversation list, driven through the real router.

#[macro_use]
#[path = "../../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use common::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

async fn send(server: &TestServer, session_id: &str, recipient_id: &str, content: &str) -> Value {
    let (name, value) = session_cookie(session_id);
    let response = server
        .post("/api/messages/send")
        .add_header(name, value)
        .json(&json!({"recipient_id": recipient_id, "content": content}))
        .await;
    assert_api_success!(response, StatusCode::CREATED)
}

async fn history(server: &TestServer, session_id: &str, other_id: &str, query: &[(&str, &str)]) -> Value {
    let (name, value) = session_cookie(session_id);
    let mut request = server
        .get(&format!("/api/messages/{}", other_id))
        .add_header(name, value);
    for (key, param) in query {
        request = request.add_query_param(key, param);
    }
    let response = request.await;
    assert_api_success!(response, StatusCode::OK)
}

async fn unread(server: &TestServer, session_id: &str) -> i64 {
    let (name, value) = session_cookie(session_id);
    let response = server
        .get("/api/messages/unread-count")
        .add_header(name, value)
        .await;
    let data = assert_api_success!(response, StatusCode::OK);
    data["unread_count"].as_i64().expect("unread_count is a number")
}

#[tokio::test]
async fn test_send_json_message() {
    let app = TestApp::new().await;
    let (_alice, alice_session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;

    let data = send(&app.server, &alice_session, &bob.user_id, "  hi bob  ").await;

    assert!(data["message_id"].as_str().is_some_and(|id| id.len() == 36));
    assert!(data["created_at"].as_str().is_some());
    assert_eq!(count_messages(app.pool()).await, 1);

    let stored: String = sqlx::query_scalar("SELECT content FROM messages")
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(stored, "  hi bob  ");
}

#[tokio::test]
async fn test_send_requires_auth() {
    let app = TestApp::new().await;
    let bob = create_test_user(app.pool(), "bob").await;

    let response = app
        .server
        .post("/api/messages/send")
        .json(&json!({"recipient_id": bob.user_id, "content": "hi"}))
        .await;

    assert_api_error!(response, StatusCode::UNAUTHORIZED, "unauthorized access");
}

#[tokio::test]
async fn test_send_to_self_is_rejected() {
    let app = TestApp::new().await;
    let (alice, session) = app.user_with_session("alice").await;

    let (name, value) = session_cookie(&session);
    let response = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .json(&json!({"recipient_id": alice.user_id, "content": "x"}))
        .await;

    assert_api_error!(response, StatusCode::BAD_REQUEST, "Cannot send message to yourself");
    assert_eq!(count_messages(app.pool()).await, 0);
}

#[tokio::test]
async fn test_send_to_unknown_recipient() {
    let app = TestApp::new().await;
    let (_alice, session) = app.user_with_session("alice").await;

    let (name, value) = session_cookie(&session);
    let response = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .json(&json!({"recipient_id": "no-such-user", "content": "hello?"}))
        .await;

    assert_api_error!(response, StatusCode::NOT_FOUND, "Recipient not found");
    assert_eq!(count_messages(app.pool()).await, 0);
}

#[tokio::test]
async fn test_send_content_length_boundary() {
    let app = TestApp::new().await;
    let (_alice, session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;
    let (name, value) = session_cookie(&session);

    let at_limit = app
        .server
        .post("/api/messages/send")
        .add_header(name.clone(), value.clone())
        .json(&json!({"recipient_id": bob.user_id, "content": "a".repeat(512)}))
        .await;
    assert_eq!(at_limit.status_code(), StatusCode::CREATED);

    let over_limit = app
        .server
        .post("/api/messages/send")
        .add_header(name.clone(), value.clone())
        .json(&json!({"recipient_id": bob.user_id, "content": "a".repeat(513)}))
        .await;
    assert_api_error!(
        over_limit,
        StatusCode::BAD_REQUEST,
        "Message content too long (max 512 characters)"
    );

    // Trailing whitespace is part of the content and counts against the limit.
    let padded_over_limit = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .json(&json!({"recipient_id": bob.user_id, "content": format!("{} ", "a".repeat(512))}))
        .await;
    assert_api_error!(
        padded_over_limit,
        StatusCode::BAD_REQUEST,
        "Message content too long (max 512 characters)"
    );
    assert_eq!(count_messages(app.pool()).await, 1);
}

#[tokio::test]
async fn test_send_empty_message_is_rejected() {
    let app = TestApp::new().await;
    let (_alice, session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;

    let (name, value) = session_cookie(&session);
    let response = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .json(&json!({"recipient_id": bob.user_id, "content": ""}))
        .await;

    assert_api_error!(response, StatusCode::BAD_REQUEST, "Message must have content or images");
    assert_eq!(count_messages(app.pool()).await, 0);
}

#[tokio::test]
async fn test_send_whitespace_only_message() {
    let app = TestApp::new().await;
    let (_alice, session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;

    let data = send(&app.server, &session, &bob.user_id, "   ").await;
    assert!(data["message_id"].as_str().is_some());

    let stored: String = sqlx::query_scalar("SELECT content FROM messages")
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(stored, "   ");
}

#[tokio::test]
async fn test_send_malformed_json() {
    let app = TestApp::new().await;
    let (_alice, session) = app.user_with_session("alice").await;

    let (name, value) = session_cookie(&session);
    let response = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .content_type("application/json")
        .bytes("{\"recipient_id\":".into())
        .await;

    assert_api_error!(response, StatusCode::BAD_REQUEST, "Invalid request payload");
}

#[tokio::test]
async fn test_send_multipart_with_image() {
    let app = TestApp::new().await;
    let (alice, alice_session) = app.user_with_session("alice").await;
    let (bob, bob_session) = app.user_with_session("bob").await;

    let form = MultipartForm::new()
        .add_text("recipient_id", bob.user_id.clone())
        .add_text("content", "look at this")
        .add_part(
            "images",
            Part::bytes(PNG_BYTES.to_vec())
                .file_name("Cat.PNG")
                .mime_type("image/png"),
        );

    let (name, value) = session_cookie(&alice_session);
    let response = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .multipart(form)
        .await;
    assert_api_success!(response, StatusCode::CREATED);

    let page = history(&app.server, &bob_session, &alice.user_id, &[]).await;
    let images = page["messages"][0]["images"].as_array().expect("images array").clone();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["original_filename"], "Cat.PNG");

    let image_url = images[0]["image_url"].as_str().expect("image url").to_string();
    assert!(image_url.starts_with("/uploads/"));
    assert!(image_url.ends_with(".png"));

    let served = app.server.get(&image_url).await;
    assert_eq!(served.status_code(), StatusCode::OK);
    assert_eq!(served.as_bytes().as_ref(), PNG_BYTES);
}

#[tokio::test]
async fn test_send_image_only_message() {
    let app = TestApp::new().await;
    let (_alice, session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;

    let form = MultipartForm::new()
        .add_text("recipient_id", bob.user_id.clone())
        .add_part("images", Part::bytes(PNG_BYTES.to_vec()).file_name("a.gif"));

    let (name, value) = session_cookie(&session);
    let response = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_api_success!(response, StatusCode::CREATED);
}

#[tokio::test]
async fn test_image_count_boundary() {
    let app = TestApp::with_config(|builder| builder.max_images_per_message(2)).await;
    let (_alice, session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;
    let (name, value) = session_cookie(&session);

    let form_with = |count: usize| {
        (0..count).fold(
            MultipartForm::new()
                .add_text("recipient_id", bob.user_id.clone())
                .add_text("content", "pics"),
            |form, i| {
                form.add_part(
                    "images",
                    Part::bytes(PNG_BYTES.to_vec()).file_name(format!("{}.jpg", i)),
                )
            },
        )
    };

    let at_limit = app
        .server
        .post("/api/messages/send")
        .add_header(name.clone(), value.clone())
        .multipart(form_with(2))
        .await;
    assert_eq!(at_limit.status_code(), StatusCode::CREATED);

    let over_limit = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .multipart(form_with(3))
        .await;
    assert_api_error!(over_limit, StatusCode::BAD_REQUEST, "Too many images (max 2)");
    assert_eq!(count_messages(app.pool()).await, 1);
}

#[tokio::test]
async fn test_image_with_bad_extension_writes_nothing() {
    let app = TestApp::new().await;
    let (_alice, session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;

    let form = MultipartForm::new()
        .add_text("recipient_id", bob.user_id.clone())
        .add_text("content", "totally an image")
        .add_part("images", Part::bytes(PNG_BYTES.to_vec()).file_name("a.png"))
        .add_part("images", Part::bytes(b"#!/bin/sh".to_vec()).file_name("run.sh"));

    let (name, value) = session_cookie(&session);
    let response = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_api_error!(
        response,
        StatusCode::BAD_REQUEST,
        "Invalid file type for run.sh. Allowed: jpg, jpeg, png, gif"
    );
    assert_eq!(count_messages(app.pool()).await, 0);

    let upload_dir = app.upload_dir.path().join("uploads");
    let written = std::fs::read_dir(&upload_dir).unwrap().count();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn test_oversized_image_is_rejected() {
    let app = TestApp::with_config(|builder| builder.max_message_image_size(8)).await;
    let (_alice, session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;

    let form = MultipartForm::new()
        .add_text("recipient_id", bob.user_id.clone())
        .add_part("images", Part::bytes(vec![0u8; 9]).file_name("big.png"));

    let (name, value) = session_cookie(&session);
    let response = app
        .server
        .post("/api/messages/send")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_contains!(body["error"].as_str().unwrap(), "too large");
    assert_eq!(count_messages(app.pool()).await, 0);
}

#[tokio::test]
async fn test_history_is_newest_first_and_paginates() {
    let app = TestApp::new().await;
    let (alice, alice_session) = app.user_with_session("alice").await;
    let (bob, bob_session) = app.user_with_session("bob").await;

    for i in 0..7 {
        if i % 2 == 0 {
            send(&app.server, &alice_session, &bob.user_id, &format!("m{}", i)).await;
        } else {
            send(&app.server, &bob_session, &alice.user_id, &format!("m{}", i)).await;
        }
    }

    let first = history(&app.server, &alice_session, &bob.user_id, &[("limit", "3")]).await;
    let contents: Vec<&str> = first["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["m6", "m5", "m4"]);
    assert_eq!(first["has_more"], true);

    // Walk every page with the `before` cursor.
    let mut seen: Vec<String> = Vec::new();
    let mut before: Option<String> = None;
    loop {
        let mut query = vec![("limit", "3")];
        if let Some(cursor) = before.as_deref() {
            query.push(("before", cursor));
        }
        let page = history(&app.server, &alice_session, &bob.user_id, &query).await;
        let messages = page["messages"].as_array().unwrap();
        seen.extend(messages.iter().map(|m| m["content"].as_str().unwrap().to_string()));
        before = messages
            .last()
            .map(|m| m["created_at"].as_str().unwrap().to_string());
        if page["has_more"] == false {
            break;
        }
    }
    assert_eq!(seen, vec!["m6", "m5", "m4", "m3", "m2", "m1", "m0"]);
}

#[tokio::test]
async fn test_history_limit_defaults_and_bounds() {
    let app = TestApp::new().await;
    let (_alice, alice_session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;

    for i in 0..12 {
        send(&app.server, &alice_session, &bob.user_id, &format!("m{}", i)).await;
    }

    let default_page = history(&app.server, &alice_session, &bob.user_id, &[]).await;
    assert_eq!(default_page["messages"].as_array().unwrap().len(), 10);
    assert_eq!(default_page["has_more"], true);

    let zero = history(&app.server, &alice_session, &bob.user_id, &[("limit", "0")]).await;
    assert_eq!(zero["messages"].as_array().unwrap().len(), 10);

    let (name, value) = session_cookie(&alice_session);
    let too_big = app
        .server
        .get(&format!("/api/messages/{}", bob.user_id))
        .add_header(name.clone(), value.clone())
        .add_query_param("limit", "51")
        .await;
    assert_api_error!(too_big, StatusCode::BAD_REQUEST, "Invalid limit parameter (must be 1-50)");

    let bad_before = app
        .server
        .get(&format!("/api/messages/{}", bob.user_id))
        .add_header(name, value)
        .add_query_param("before", "yesterday")
        .await;
    assert_api_error!(
        bad_before,
        StatusCode::BAD_REQUEST,
        "Invalid before parameter (use RFC3339 format)"
    );
}

#[tokio::test]
async fn test_history_before_in_future_returns_latest() {
    let app = TestApp::new().await;
    let (_alice, alice_session) = app.user_with_session("alice").await;
    let bob = create_test_user(app.pool(), "bob").await;

    send(&app.server, &alice_session, &bob.user_id, "old").await;
    send(&app.server, &alice_session, &bob.user_id, "new").await;

    let page = history(
        &app.server,
        &alice_session,
        &bob.user_id,
        &[("before", "2999-01-01T00:00:00Z")],
    )
    .await;
    assert_eq!(page["messages"][0]["content"], "new");
    assert_eq!(page["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_history_marks_messages_read() {
    let app = TestApp::new().await;
    let (alice, alice_session) = app.user_with_session("alice").await;
    let (bob, bob_session) = app.user_with_session("bob").await;
    let (carol, carol_session) = app.user_with_session("carol").await;

    send(&app.server, &alice_session, &bob.user_id, "one").await;
    send(&app.server, &alice_session, &bob.user_id, "two").await;
    send(&app.server, &carol_session, &bob.user_id, "from carol").await;
    assert_eq!(unread(&app.server, &bob_session).await, 3);

    // The fetch returns the pre-read state, then marks.
    let page = history(&app.server, &bob_session, &alice.user_id, &[]).await;
    assert_eq!(page["messages"][0]["is_read"], false);
    assert_eq!(unread(&app.server, &bob_session).await, 1);

    let again = history(&app.server, &bob_session, &alice.user_id, &[]).await;
    assert_eq!(again["messages"][0]["is_read"], true);
    assert_eq!(unread(&app.server, &bob_session).await, 1);

    // Reading Alice's own view does not touch Bob's unread messages.
    history(&app.server, &alice_session, &bob.user_id, &[]).await;
    history(&app.server, &bob_session, &carol.user_id, &[]).await;
    assert_eq!(unread(&app.server, &bob_session).await, 0);
}

#[tokio::test]
async fn test_conversation_list() {
    let app = TestApp::new().await;
    let (alice, alice_session) = app.user_with_session("alice").await;
    let (bob, bob_session) = app.user_with_session("bob").await;
    create_test_user(app.pool(), "zed").await;
    let carol = create_test_user(app.pool(), "carol").await;

    send(&app.server, &bob_session, &alice.user_id, "older").await;
    send(&app.server, &alice_session, &carol.user_id, "newer").await;
    send(&app.server, &bob_session, &alice.user_id, "newest from bob").await;

    let (name, value) = session_cookie(&alice_session);
    let response = app.server.get("/api/conversations").add_header(name, value).await;
    let data = assert_api_success!(response, StatusCode::OK);
    let conversations = data["conversations"].as_array().unwrap();

    let nicknames: Vec<&str> = conversations
        .iter()
        .map(|c| c["nickname"].as_str().unwrap())
        .collect();
    assert_eq!(nicknames, vec!["bob", "carol", "zed"]);

    assert_eq!(conversations[0]["user_id"], bob.user_id.as_str());
    assert_eq!(conversations[0]["last_message"], "newest from bob");
    assert_eq!(conversations[0]["unread_count"], 2);
    assert_eq!(conversations[0]["is_online"], false);
    assert_eq!(conversations[1]["unread_count"], 0);
    assert!(conversations[2]["last_message"].is_null());
}
