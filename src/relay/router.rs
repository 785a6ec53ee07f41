use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;

use crate::connection_manager::{ConnectionId, ConnectionRegistry};
use crate::metrics::MessageMetrics;
use crate::poll::{EnqueueOutcome, PollBufferStore};
use crate::websocket::OutboundMessage;

use super::types::{ChannelMessage, PublishResult};

/// Counters for the router
#[derive(Debug, Default)]
pub struct RouterStats {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub buffered: AtomicU64,
    pub dropped: AtomicU64,
}

impl RouterStats {
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            buffered: self.buffered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn record(&self, result: &PublishResult) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(result.delivered as u64, Ordering::Relaxed);
        self.failed.fetch_add(result.failed as u64, Ordering::Relaxed);
        self.buffered
            .fetch_add(result.buffered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(result.dropped as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterStatsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub failed: u64,
    pub buffered: u64,
    pub dropped: u64,
}

/// Fans a channel message out to joined push connections and subscribed poll buffers.
///
/// Holds no delivery state of its own; everything goes through the registry
/// and the store.
pub struct ChannelRouter {
    registry: Arc<ConnectionRegistry>,
    buffers: Arc<PollBufferStore>,
    stats: RouterStats,
}

impl ChannelRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, buffers: Arc<PollBufferStore>) -> Self {
        Self {
            registry,
            buffers,
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Publish `data` on `channel`.
    ///
    /// When `origin` is a push connection it is skipped; poll buffers always
    /// receive the message, since they have no connection identity to compare.
    /// Sends never wait: a full or closed outbound queue is a per-target
    /// failure and fan-out carries on.
    #[tracing::instrument(
        name = "router.publish",
        skip(self, data),
        fields(from_push = origin.is_some())
    )]
    pub fn publish(&self, channel: &str, data: Value, origin: Option<ConnectionId>) -> PublishResult {
        let message = ChannelMessage::new(channel, data);
        let mut result = PublishResult::default();

        // Serialize once, share across every push recipient
        match serde_json::to_string(&message) {
            Ok(text) => {
                let wire: Arc<str> = text.into();
                self.deliver_to_connections(&message.channel, &wire, origin, &mut result);
            }
            Err(e) => {
                tracing::error!(channel = %channel, error = %e, "Failed to serialize broadcast payload");
            }
        }

        for buffer_id in self.buffers.subscribers_of(channel) {
            match self.buffers.enqueue(&buffer_id, message.clone()) {
                EnqueueOutcome::Queued => result.buffered += 1,
                EnqueueOutcome::Dropped => result.dropped += 1,
                // Swept between the snapshot and the enqueue
                EnqueueOutcome::Missing => {}
            }
        }

        self.stats.record(&result);
        if origin.is_some() {
            MessageMetrics::record_push_published();
        } else {
            MessageMetrics::record_http_published();
        }
        MessageMetrics::record_delivered(result.delivered as u64);
        MessageMetrics::record_failed(result.failed as u64);

        if result.failed > 0 {
            tracing::warn!(
                channel = %channel,
                delivered = result.delivered,
                failed = result.failed,
                "Some push connections did not receive the message"
            );
        }

        tracing::debug!(
            channel = %channel,
            delivered = result.delivered,
            buffered = result.buffered,
            dropped = result.dropped,
            "Published message"
        );

        result
    }

    fn deliver_to_connections(
        &self,
        channel: &str,
        wire: &Arc<str>,
        origin: Option<ConnectionId>,
        result: &mut PublishResult,
    ) {
        for handle in self.registry.subscribers_of(channel) {
            if origin == Some(handle.id) {
                continue;
            }

            match handle.try_send(OutboundMessage::Broadcast(wire.clone())) {
                Ok(()) => result.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    result.failed += 1;
                    tracing::debug!(
                        connection_id = %handle.id,
                        "Outbound queue full, message dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    result.failed += 1;
                    tracing::debug!(
                        connection_id = %handle.id,
                        "Connection closed before delivery"
                    );
                }
            }
        }
    }
}
