use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::relay::ChannelMessage;

/// Result of appending to a poll buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Buffer already held `max_buffer_size` entries
    Dropped,
    /// No buffer with that id
    Missing,
}

/// Mailbox of one polling consumer
#[derive(Debug)]
pub struct PollBuffer {
    pub id: String,
    channels: HashSet<String>,
    queue: VecDeque<ChannelMessage>,
    /// Unix millis of the last drain; 0 until the first one
    last_active_at: i64,
}

impl PollBuffer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channels: HashSet::new(),
            queue: VecDeque::new(),
            last_active_at: 0,
        }
    }

    pub fn subscribes_to(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_active_at).unwrap_or_default()
    }

    pub(crate) fn replace_subscription(&mut self, channels: Vec<String>) {
        self.channels = channels.into_iter().collect();
    }

    /// Append unless full. Overflow drops the newcomer, never the oldest entry.
    pub(crate) fn push(&mut self, message: ChannelMessage, max_size: usize) -> EnqueueOutcome {
        if self.queue.len() >= max_size {
            return EnqueueOutcome::Dropped;
        }
        self.queue.push_back(message);
        EnqueueOutcome::Queued
    }

    /// Empty the queue in enqueue order and mark the buffer active
    pub(crate) fn take(&mut self, now: DateTime<Utc>) -> Vec<ChannelMessage> {
        self.last_active_at = now.timestamp_millis();
        self.queue.drain(..).collect()
    }

    pub(crate) fn is_idle(&self, now: DateTime<Utc>, idle_timeout_ms: i64) -> bool {
        self.last_active_at.saturating_add(idle_timeout_ms) < now.timestamp_millis()
    }

    pub fn info(&self) -> PollBufferInfo {
        let mut channels: Vec<String> = self.channels.iter().cloned().collect();
        channels.sort();

        PollBufferInfo {
            id: self.id.clone(),
            channels,
            pending: self.queue.len(),
            last_active_at: self.last_active_at(),
        }
    }
}

/// Read-only view of a buffer, detached from the store's locks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollBufferInfo {
    pub id: String,
    pub channels: Vec<String>,
    pub pending: usize,
    pub last_active_at: DateTime<Utc>,
}
