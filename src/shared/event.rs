/**
 * Live Channel Events
 *
 * Every WebSocket text frame is a JSON envelope `{"event": ..., "payload": ...}`.
 *
 * Inbound frames are first read as a loose [`Envelope`] so that an unknown
 * `event` name can be answered with an `error` frame instead of failing to
 * decode. [`ClientEvent::decode`] then turns the envelope into a typed
 * event. Outbound frames are built as [`ServerEvent`], which serializes
 * straight to the envelope shape.
 *
 * # Vocabulary
 *
 * | Event             | Direction        |
 * |-------------------|------------------|
 * | `receive_message` | server -> client |
 * | `user_online`     | server -> client |
 * | `user_offline`    | server -> client |
 * | `typing_start`    | both             |
 * | `typing_stop`     | both             |
 * | `error`           | server -> client |
 * | `send_message`    | client, always rejected |
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;
use crate::shared::messaging::MessageImage;

/// Event names used on the wire
pub mod names {
    pub const RECEIVE_MESSAGE: &str = "receive_message";
    pub const USER_ONLINE: &str = "user_online";
    pub const USER_OFFLINE: &str = "user_offline";
    pub const TYPING_START: &str = "typing_start";
    pub const TYPING_STOP: &str = "typing_stop";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const ERROR: &str = "error";
}

/// Untyped `{event, payload}` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Payload a client sends with `typing_start` / `typing_stop`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingIndicator {
    #[serde(default)]
    pub recipient_id: String,
}

/// Typed inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    TypingStart(TypingIndicator),
    TypingStop(TypingIndicator),
    /// Messages must go through the HTTP pipeline; always answered with an error.
    SendMessage,
    Unsupported(String),
}

impl ClientEvent {
    /// Decode an envelope by its `event` tag.
    ///
    /// Fails only when a known tag carries a payload of the wrong shape.
    pub fn decode(envelope: &Envelope) -> Result<Self, SharedError> {
        let typing = |payload: &serde_json::Value| {
            serde_json::from_value::<TypingIndicator>(payload.clone())
                .map_err(|_| SharedError::validation("payload", "Invalid typing indicator format"))
        };

        match envelope.event.as_str() {
            names::TYPING_START => Ok(Self::TypingStart(typing(&envelope.payload)?)),
            names::TYPING_STOP => Ok(Self::TypingStop(typing(&envelope.payload)?)),
            names::SEND_MESSAGE => Ok(Self::SendMessage),
            other => Ok(Self::Unsupported(other.to_string())),
        }
    }
}

/// `receive_message` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveMessagePayload {
    pub message_id: String,
    pub sender_id: String,
    pub sender_nickname: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<MessageImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// `user_online` / `user_offline` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user_id: String,
    pub nickname: String,
    pub status: PresenceStatus,
}

/// Typing notification delivered to the recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub user_id: String,
    pub nickname: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Typed outbound event; serializes as `{"event": ..., "payload": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage(ReceiveMessagePayload),
    UserOnline(PresencePayload),
    UserOffline(PresencePayload),
    TypingStart(TypingPayload),
    TypingStop(TypingPayload),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn user_online(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self::UserOnline(PresencePayload {
            user_id: user_id.into(),
            nickname: nickname.into(),
            status: PresenceStatus::Online,
        })
    }

    pub fn user_offline(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self::UserOffline(PresencePayload {
            user_id: user_id.into(),
            nickname: nickname.into(),
            status: PresenceStatus::Offline,
        })
    }

    /// Typing notification for the recipient of a `typing_start`/`typing_stop`
    pub fn typing(user_id: impl Into<String>, nickname: impl Into<String>, is_typing: bool) -> Self {
        let payload = TypingPayload {
            user_id: user_id.into(),
            nickname: nickname.into(),
            is_typing,
        };
        if is_typing {
            Self::TypingStart(payload)
        } else {
            Self::TypingStop(payload)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Wire name of this event
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReceiveMessage(_) => names::RECEIVE_MESSAGE,
            Self::UserOnline(_) => names::USER_ONLINE,
            Self::UserOffline(_) => names::USER_OFFLINE,
            Self::TypingStart(_) => names::TYPING_START,
            Self::TypingStop(_) => names::TYPING_STOP,
            Self::Error(_) => names::ERROR,
        }
    }

    pub fn to_json(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }
}
