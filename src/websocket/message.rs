use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Actions a push client can send, one JSON object per frame:
/// `{"action": "join" | "leave" | "post", "channel": "...", "data": ...}`
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join { channel: String },
    Leave { channel: String },
    Post { channel: String, data: Value },
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("client sent non-JSON data: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("client sent a JSON value that is not an object")]
    NotAnObject,

    #[error("client sent a message without an action")]
    MissingAction,

    #[error("client sent unknown action {0}")]
    UnknownAction(String),

    #[error("action {action} requires a channel")]
    MissingChannel { action: &'static str },
}

#[derive(Debug, Deserialize)]
struct RawClientMessage {
    action: Option<String>,
    channel: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl ClientMessage {
    /// Decode a frame. Anything that is not a well-formed join/leave/post is
    /// rejected here and never reaches the relay.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let Value::Object(fields) = serde_json::from_str::<Value>(text)? else {
            return Err(MessageError::NotAnObject);
        };
        let raw: RawClientMessage = serde_json::from_value(Value::Object(fields))?;
        let action = raw.action.ok_or(MessageError::MissingAction)?;

        let channel = |action: &'static str| {
            raw.channel
                .clone()
                .ok_or(MessageError::MissingChannel { action })
        };

        match action.as_str() {
            "join" => Ok(Self::Join { channel: channel("join")? }),
            "leave" => Ok(Self::Leave { channel: channel("leave")? }),
            "post" => Ok(Self::Post {
                channel: channel("post")?,
                data: raw.data.clone().unwrap_or(Value::Null),
            }),
            other => Err(MessageError::UnknownAction(other.to_string())),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Post { .. } => "post",
        }
    }
}

/// Messages queued for a push connection's send task
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Broadcast payload serialized once and shared by every recipient
    Broadcast(Arc<str>),
    /// Liveness probe, written as a WebSocket ping frame
    Ping,
}
