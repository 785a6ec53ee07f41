use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::connection_manager::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::poll::PollBufferStore;
use crate::websocket::OutboundMessage;

use super::router::ChannelRouter;
use super::types::{ChannelMessage, PublishResult};

/// Operations transport adapters invoke on the relay.
///
/// Adapters decode raw input first; malformed frames or bodies never get here.
#[async_trait]
pub trait RelayIngress: Send + Sync {
    /// A push client connected
    async fn on_connect(&self, sender: mpsc::Sender<OutboundMessage>) -> Arc<ConnectionHandle>;

    /// The transport reported close or error; safe to call more than once
    async fn on_disconnect(&self, connection_id: ConnectionId);

    async fn on_join(&self, connection_id: ConnectionId, channel: &str);

    async fn on_leave(&self, connection_id: ConnectionId, channel: &str);

    /// Publish to a channel. `origin` is set only for push clients.
    async fn on_post(&self, channel: &str, data: Value, origin: Option<ConnectionId>) -> PublishResult;

    /// Create the poll buffer if needed, replace its subscription when
    /// `channels` is given, and drain it
    async fn on_fetch(&self, id: &str, channels: Option<Vec<String>>) -> Vec<ChannelMessage>;
}

/// The relay core: connection registry, poll buffer store and the router over both
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    buffers: Arc<PollBufferStore>,
    router: ChannelRouter,
}

impl Relay {
    pub fn new(registry: Arc<ConnectionRegistry>, buffers: Arc<PollBufferStore>) -> Self {
        let router = ChannelRouter::new(registry.clone(), buffers.clone());
        Self {
            registry,
            buffers,
            router,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(PollBufferStore::new(config.max_buffer_size)),
        )
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn buffers(&self) -> &Arc<PollBufferStore> {
        &self.buffers
    }

    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }
}

#[async_trait]
impl RelayIngress for Relay {
    async fn on_connect(&self, sender: mpsc::Sender<OutboundMessage>) -> Arc<ConnectionHandle> {
        self.registry.register(sender)
    }

    async fn on_disconnect(&self, connection_id: ConnectionId) {
        self.registry.unregister(connection_id).await;
    }

    async fn on_join(&self, connection_id: ConnectionId, channel: &str) {
        self.registry.join(connection_id, channel).await;
    }

    async fn on_leave(&self, connection_id: ConnectionId, channel: &str) {
        self.registry.leave(connection_id, channel).await;
    }

    async fn on_post(&self, channel: &str, data: Value, origin: Option<ConnectionId>) -> PublishResult {
        self.router.publish(channel, data, origin)
    }

    async fn on_fetch(&self, id: &str, channels: Option<Vec<String>>) -> Vec<ChannelMessage> {
        let messages = self.buffers.fetch(id, channels);
        tracing::debug!(buffer_id = %id, count = messages.len(), "Poll buffer drained");
        messages
    }
}
