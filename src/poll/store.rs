//! In-memory poll buffer store using DashMap.
//!
//! Buffers live only in memory and are lost on restart. Each buffer is
//! guarded by its DashMap shard lock, so every operation below is atomic
//! with respect to that buffer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::metrics::BufferMetrics;
use crate::relay::ChannelMessage;

use super::buffer::{EnqueueOutcome, PollBuffer, PollBufferInfo};

/// Default cap on pending messages per buffer
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Serialize)]
pub struct PollBufferStats {
    pub total_buffers: usize,
    pub pending_messages: usize,
    pub max_buffer_size: usize,
}

pub struct PollBufferStore {
    /// client-supplied id -> buffer
    buffers: DashMap<String, PollBuffer>,
    max_buffer_size: usize,
}

impl PollBufferStore {
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            buffers: DashMap::new(),
            max_buffer_size,
        }
    }

    /// Return the buffer for `id`, creating an empty, never-active one if needed
    pub fn get_or_create(&self, id: &str) -> PollBufferInfo {
        self.buffers
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(buffer_id = %id, "Poll buffer created");
                PollBuffer::new(id)
            })
            .info()
    }

    pub fn get(&self, id: &str) -> Option<PollBufferInfo> {
        self.buffers.get(id).map(|b| b.info())
    }

    /// Replace the subscription wholesale when `channels` is given; `None` keeps it.
    /// Returns false if the buffer does not exist.
    pub fn update_subscription(&self, id: &str, channels: Option<Vec<String>>) -> bool {
        let Some(mut buffer) = self.buffers.get_mut(id) else {
            return false;
        };

        if let Some(channels) = channels {
            tracing::debug!(buffer_id = %id, channels = ?channels, "Poll subscription replaced");
            buffer.replace_subscription(channels);
        }
        true
    }

    /// Append a message. A full buffer silently drops it until the next drain.
    pub fn enqueue(&self, id: &str, message: ChannelMessage) -> EnqueueOutcome {
        let Some(mut buffer) = self.buffers.get_mut(id) else {
            return EnqueueOutcome::Missing;
        };

        let outcome = buffer.push(message, self.max_buffer_size);
        match outcome {
            EnqueueOutcome::Queued => BufferMetrics::record_enqueued(1),
            EnqueueOutcome::Dropped => {
                BufferMetrics::record_dropped(1);
                tracing::debug!(
                    buffer_id = %id,
                    max_buffer_size = self.max_buffer_size,
                    "Poll buffer full, message dropped"
                );
            }
            EnqueueOutcome::Missing => {}
        }
        outcome
    }

    /// Return and clear everything pending, in enqueue order, and mark the buffer active.
    /// Returned messages count as delivered; there is no acknowledgement step.
    pub fn drain(&self, id: &str) -> Vec<ChannelMessage> {
        self.buffers
            .get_mut(id)
            .map(|mut buffer| buffer.take(Utc::now()))
            .unwrap_or_default()
    }

    /// getOrCreate, optional subscription replacement and drain under one lock,
    /// so the sweeper cannot evict the buffer halfway through a fetch.
    pub fn fetch(&self, id: &str, channels: Option<Vec<String>>) -> Vec<ChannelMessage> {
        let mut buffer = self.buffers.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(buffer_id = %id, "Poll buffer created");
            PollBuffer::new(id)
        });

        if let Some(channels) = channels {
            buffer.replace_subscription(channels);
        }

        buffer.take(Utc::now())
    }

    /// Snapshot of the ids of buffers subscribed to `channel`
    pub fn subscribers_of(&self, channel: &str) -> Vec<String> {
        self.buffers
            .iter()
            .filter(|entry| entry.value().subscribes_to(channel))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove every buffer whose last drain is older than `idle_timeout` at `now`
    pub fn sweep_idle(&self, now: DateTime<Utc>, idle_timeout: Duration) -> usize {
        let timeout_ms = i64::try_from(idle_timeout.as_millis()).unwrap_or(i64::MAX);
        let before = self.buffers.len();

        self.buffers.retain(|id, buffer| {
            let idle = buffer.is_idle(now, timeout_ms);
            if idle {
                tracing::debug!(
                    buffer_id = %id,
                    pending = buffer.pending(),
                    "Evicting idle poll buffer"
                );
            }
            !idle
        });

        let removed = before.saturating_sub(self.buffers.len());
        if removed > 0 {
            BufferMetrics::record_evicted(removed as u64);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    pub fn stats(&self) -> PollBufferStats {
        PollBufferStats {
            total_buffers: self.buffers.len(),
            pending_messages: self.buffers.iter().map(|b| b.pending()).sum(),
            max_buffer_size: self.max_buffer_size,
        }
    }
}

impl Default for PollBufferStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_SIZE)
    }
}
