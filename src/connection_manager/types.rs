//! Connection handle and related types

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::websocket::OutboundMessage;

pub type ConnectionId = Uuid;

/// One live push connection.
///
/// The channel set is owned by the registry; only `ConnectionRegistry::join`
/// and `ConnectionRegistry::leave` mutate it.
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: DateTime<Utc>,
    pub(crate) channels: RwLock<HashSet<String>>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: Utc::now(),
            channels: RwLock::new(HashSet::new()),
        }
    }

    /// Queue a message without waiting for capacity
    pub fn try_send(
        &self,
        message: OutboundMessage,
    ) -> Result<(), mpsc::error::TrySendError<OutboundMessage>> {
        self.sender.try_send(message)
    }

    /// Queue a message, waiting for capacity
    pub async fn send(
        &self,
        message: OutboundMessage,
    ) -> Result<(), mpsc::error::SendError<OutboundMessage>> {
        self.sender.send(message).await
    }

    pub async fn channels(&self) -> Vec<String> {
        self.channels.read().await.iter().cloned().collect()
    }
}
