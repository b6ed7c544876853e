//! Messaging HTTP Handlers
//!
//! - `POST /api/messages/send` - validate, persist, then push to the recipient
//! - `GET /api/messages/{user_id}` - history page, then mark as read
//! - `GET /api/messages/unread-count`
//! - `GET /api/conversations` - conversation list with live presence
//! - `GET /api/users/online` - hub snapshot
//!
//! A message is only pushed over the live channel after it has been
//! committed, so anything a client receives live is also in history.

use std::collections::HashSet;

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    Json,
};
use serde::Deserialize;

use crate::backend::error::BackendError;
use crate::backend::messaging::db;
use crate::backend::messaging::images::{client_filename, ImageStore, UploadedImage};
use crate::backend::middleware::auth::AuthUser;
use crate::backend::server::state::AppState;
use crate::shared::event::{ReceiveMessagePayload, ServerEvent};
use crate::shared::messaging::{
    parse_before, resolve_page_size, validate_outgoing, ListConversationsResponse, MessagePage,
    OnlineUsersResponse, SendMessageRequest, SendMessageResponse, UnreadCountResponse,
};
use crate::shared::ApiResponse;

/// Query string of the history endpoint
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
    pub before: Option<String>,
}

/// Send a direct message (JSON or multipart with images)
pub async fn send_message(
    AuthUser(sender): AuthUser,
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<ApiResponse<SendMessageResponse>>), BackendError> {
    let (body, uploads) = if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| BackendError::handler(e.status(), "Invalid multipart form data"))?;
        read_multipart(multipart, &state.images).await?
    } else {
        let Json(body) = Json::<SendMessageRequest>::from_request(request, &state)
            .await
            .map_err(|e| {
                tracing::debug!("[Messaging] rejected send body: {}", e);
                BackendError::bad_request("Invalid request payload")
            })?;
        (body, Vec::new())
    };

    let recipient_id = body.recipient_id.trim();
    let content = body.content.as_str();
    validate_outgoing(&sender.user_id, recipient_id, content, uploads.len())?;

    let stored = state.images.save_all(&uploads).await?;
    let records: Vec<db::NewImage> = stored.iter().map(|image| image.record.clone()).collect();

    let saved = match db::save_message(&state.db_pool, &sender.user_id, recipient_id, content, &records).await {
        Ok(saved) => saved,
        Err(e) => {
            state.images.remove_all(&stored).await;
            return Err(e.into());
        }
    };

    let images = if stored.is_empty() {
        Vec::new()
    } else {
        db::get_images_for_message(&state.db_pool, &saved.message_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("[Messaging] could not reload images of {}: {}", saved.message_id, e);
                Vec::new()
            })
    };

    let event = ServerEvent::ReceiveMessage(ReceiveMessagePayload {
        message_id: saved.message_id.clone(),
        sender_id: sender.user_id.clone(),
        sender_nickname: sender.nickname.clone(),
        content: content.to_string(),
        sent_at: saved.created_at,
        images,
    });
    match state.hub.send_to_user(recipient_id, event).await {
        Ok(true) => tracing::debug!("[Messaging] {} delivered live to {}", saved.message_id, recipient_id),
        Ok(false) => tracing::debug!("[Messaging] {} stored for offline {}", saved.message_id, recipient_id),
        Err(e) => tracing::warn!("[Messaging] live delivery of {} skipped: {}", saved.message_id, e),
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(SendMessageResponse {
            message_id: saved.message_id,
            created_at: saved.created_at,
        })),
    ))
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

async fn read_multipart(
    mut multipart: Multipart,
    images: &ImageStore,
) -> Result<(SendMessageRequest, Vec<UploadedImage>), BackendError> {
    let mut body = SendMessageRequest::default();
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BackendError::handler(e.status(), "Invalid multipart form data"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "recipient_id" => {
                body.recipient_id = field
                    .text()
                    .await
                    .map_err(|e| BackendError::handler(e.status(), "Invalid multipart form data"))?;
            }
            "content" => {
                body.content = field
                    .text()
                    .await
                    .map_err(|e| BackendError::handler(e.status(), "Invalid multipart form data"))?;
            }
            "images" => {
                let filename = field.file_name().map(client_filename).unwrap_or_default();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| BackendError::handler(e.status(), "Invalid multipart form data"))?;
                // Browsers send an empty part when no file was picked.
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                images.check_count(uploads.len() + 1)?;
                images.check_image(&filename, data.len())?;
                uploads.push(UploadedImage {
                    original_filename: filename,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok((body, uploads))
}

/// History with one user, newest first
pub async fn get_messages(
    AuthUser(viewer): AuthUser,
    State(state): State<AppState>,
    Path(other_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<MessagePage>>, BackendError> {
    let limit = resolve_page_size(query.limit.as_deref())?;
    let before = parse_before(query.before.as_deref())?;

    let page = db::get_messages(&state.db_pool, &viewer.user_id, &other_id, limit, before).await?;

    if let Err(e) = db::mark_messages_as_read(&state.db_pool, &viewer.user_id, &other_id).await {
        tracing::warn!("[Messaging] failed to mark messages from {} as read: {}", other_id, e);
    }

    Ok(Json(ApiResponse::ok(page)))
}

pub async fn unread_count(
    AuthUser(viewer): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UnreadCountResponse>>, BackendError> {
    let unread_count = db::get_unread_count(&state.db_pool, &viewer.user_id).await?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { unread_count })))
}

/// Conversation list with `is_online` taken from the hub
pub async fn list_conversations(
    AuthUser(viewer): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListConversationsResponse>>, BackendError> {
    let mut conversations = db::get_conversations(&state.db_pool, &viewer.user_id).await?;

    let online: HashSet<String> = state
        .hub
        .online_users()
        .await?
        .into_iter()
        .map(|user| user.user_id)
        .collect();
    for conversation in &mut conversations {
        conversation.is_online = online.contains(&conversation.user_id);
    }

    Ok(Json(ApiResponse::ok(ListConversationsResponse { conversations })))
}

pub async fn online_users(
    AuthUser(_viewer): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OnlineUsersResponse>>, BackendError> {
    let users = state.hub.online_users().await?;
    Ok(Json(ApiResponse::ok(OnlineUsersResponse { users })))
}
