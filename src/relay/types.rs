use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Broadcast payload: delivered as-is to push connections and buffered for pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: String,
    pub data: Value,
}

impl ChannelMessage {
    pub fn new(channel: impl Into<String>, data: Value) -> Self {
        Self {
            channel: channel.into(),
            data,
        }
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    /// Push connections the payload was handed to
    pub delivered: usize,
    /// Push connections whose outbound queue was full or closed
    pub failed: usize,
    /// Poll buffers the payload was appended to
    pub buffered: usize,
    /// Poll buffers that were full and dropped the payload
    pub dropped: usize,
}
