//! Wire format of the chat socket.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::ChatMessage;

use super::RoomId;

/// An event received from a participant, decoded by its `type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// New chat text to persist and broadcast.
    Message { body: String },
    /// Typing indicator, relayed exactly as received.
    Typing(Value),
    Ping,
    /// The participant has read the conversation.
    Read,
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: Option<MessageInput>,
}

#[derive(Deserialize)]
struct MessageInput {
    #[serde(default)]
    message: String,
}

impl Inbound {
    /// Fails only when `text` is not a JSON object; unknown kinds decode to
    /// [`Inbound::Unknown`].
    pub fn decode(text: &str) -> serde_json::Result<Inbound> {
        let raw: Value = serde_json::from_str(text)?;
        let Envelope { kind, message } = serde_json::from_value(raw.clone())?;

        Ok(match kind.as_str() {
            "message" => Inbound::Message {
                body: message.map(|m| m.message).unwrap_or_default(),
            },
            "typing" => Inbound::Typing(raw),
            "ping" => Inbound::Ping,
            "read" => Inbound::Read,
            _ => Inbound::Unknown(kind),
        })
    }
}

/// Events the server emits on its own account.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent<'a> {
    /// Sent once, to the new connection only.
    Connected {
        project_id: RoomId,
        user_id: Uuid,
        user_name: &'a str,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// A persisted chat message.
    Message {
        project_id: RoomId,
        message: &'a ChatMessage,
        user_id: Uuid,
        user_name: &'a str,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
}

impl ServerEvent<'_> {
    pub fn encode(&self) -> serde_json::Result<Utf8Bytes> {
        Ok(serde_json::to_string(self)?.into())
    }
}

/// Re-encodes a relayed event without touching its contents.
pub fn relay(raw: &Value) -> Utf8Bytes {
    raw.to_string().into()
}
