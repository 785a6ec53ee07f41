use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::websocket::OutboundMessage;

use super::stats::ConnectionStats;
use super::types::{ConnectionHandle, ConnectionId};

/// Tracks every live push connection and the channels it has joined
pub struct ConnectionRegistry {
    /// connection_id -> ConnectionHandle
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// channel_name -> Set<connection_id>
    channel_index: DashMap<String, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            channel_index: DashMap::new(),
        }
    }

    /// Register a new connection with an empty channel set
    pub fn register(&self, sender: mpsc::Sender<OutboundMessage>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(sender));
        self.connections.insert(handle.id, handle.clone());

        tracing::info!(connection_id = %handle.id, "Connection registered");

        handle
    }

    /// Unregister a connection. Duplicate close notifications are no-ops.
    pub async fn unregister(&self, connection_id: ConnectionId) {
        let Some((_, handle)) = self.connections.remove(&connection_id) else {
            return;
        };

        let channels = handle.channels().await;
        for channel in &channels {
            self.remove_from_index(connection_id, channel);
        }

        let connected_secs = (Utc::now() - handle.connected_at).num_seconds();
        tracing::info!(
            connection_id = %connection_id,
            channel_count = channels.len(),
            connected_secs,
            "Connection unregistered"
        );
    }

    /// Add a channel to the connection's set. Returns false if it was already
    /// a member or the connection is unknown.
    pub async fn join(&self, connection_id: ConnectionId, channel: &str) -> bool {
        let Some(handle) = self.get_connection(connection_id) else {
            return false;
        };

        let added = handle.channels.write().await.insert(channel.to_string());
        if !added {
            return false;
        }

        self.channel_index
            .entry(channel.to_string())
            .or_default()
            .insert(connection_id);

        // Lost a race with unregister: undo the index entry it could not see
        if !self.connections.contains_key(&connection_id) {
            self.remove_from_index(connection_id, channel);
            return false;
        }

        tracing::debug!(connection_id = %connection_id, channel = %channel, "Joined channel");
        true
    }

    /// Remove a channel from the connection's set. Returns false if it was not a member.
    pub async fn leave(&self, connection_id: ConnectionId, channel: &str) -> bool {
        let Some(handle) = self.get_connection(connection_id) else {
            return false;
        };

        let removed = handle.channels.write().await.remove(channel);
        if removed {
            self.remove_from_index(connection_id, channel);
            tracing::debug!(connection_id = %connection_id, channel = %channel, "Left channel");
        }

        removed
    }

    /// Snapshot of the connections currently joined to `channel`, in no particular order
    pub fn subscribers_of(&self, channel: &str) -> Vec<Arc<ConnectionHandle>> {
        let ids: Vec<ConnectionId> = self
            .channel_index
            .get(channel)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        ids.iter()
            .filter_map(|id| self.connections.get(id).map(|h| h.clone()))
            .collect()
    }

    /// Get all connections
    pub fn get_all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Get connection by ID
    pub fn get_connection(&self, connection_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> ConnectionStats {
        let channels: HashMap<String, usize> = self
            .channel_index
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();

        let oldest_connected_at = self
            .connections
            .iter()
            .map(|entry| entry.value().connected_at)
            .min();

        ConnectionStats {
            total_connections: self.connections.len(),
            channels,
            oldest_connected_at,
        }
    }

    fn remove_from_index(&self, connection_id: ConnectionId, channel: &str) {
        if let Some(mut members) = self.channel_index.get_mut(channel) {
            members.remove(&connection_id);
        }
        self.channel_index
            .remove_if(channel, |_, members| members.is_empty());
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(registry: &ConnectionRegistry) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (registry.register(tx), rx)
    }

    fn ids(handles: &[Arc<ConnectionHandle>]) -> HashSet<ConnectionId> {
        handles.iter().map(|h| h.id).collect()
    }

    #[tokio::test]
    async fn test_register_starts_with_no_channels() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = register(&registry);

        assert_eq!(registry.len(), 1);
        assert!(handle.channels().await.is_empty());
    }

    #[tokio::test]
    async fn test_join_then_leave_removes_from_subscribers() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = register(&registry);

        assert!(registry.join(handle.id, "chat").await);
        assert_eq!(ids(&registry.subscribers_of("chat")), HashSet::from([handle.id]));

        assert!(registry.leave(handle.id, "chat").await);
        assert!(registry.subscribers_of("chat").is_empty());
        assert!(registry.stats().channels.is_empty());
    }

    #[tokio::test]
    async fn test_join_and_leave_are_idempotent() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = register(&registry);

        assert!(registry.join(handle.id, "chat").await);
        assert!(!registry.join(handle.id, "chat").await);
        assert_eq!(handle.channels().await, vec!["chat".to_string()]);
        assert_eq!(registry.subscribers_of("chat").len(), 1);

        assert!(registry.leave(handle.id, "chat").await);
        assert!(!registry.leave(handle.id, "chat").await);
        assert!(handle.channels().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_only_include_members() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = register(&registry);
        let (b, _rx_b) = register(&registry);
        let (c, _rx_c) = register(&registry);

        registry.join(a.id, "chat").await;
        registry.join(b.id, "chat").await;
        registry.join(c.id, "news").await;

        assert_eq!(ids(&registry.subscribers_of("chat")), HashSet::from([a.id, b.id]));
        assert_eq!(ids(&registry.subscribers_of("news")), HashSet::from([c.id]));
        assert!(registry.subscribers_of("sports").is_empty());
    }

    #[tokio::test]
    async fn test_unregister_cleans_channel_index() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = register(&registry);
        let (b, _rx_b) = register(&registry);

        registry.join(a.id, "chat").await;
        registry.join(a.id, "news").await;
        registry.join(b.id, "chat").await;

        registry.unregister(a.id).await;

        assert_eq!(registry.len(), 1);
        assert_eq!(ids(&registry.subscribers_of("chat")), HashSet::from([b.id]));
        let stats = registry.stats();
        assert_eq!(stats.channels.get("chat"), Some(&1));
        assert!(!stats.channels.contains_key("news"));
    }

    #[tokio::test]
    async fn test_stats_report_oldest_connection() {
        let registry = ConnectionRegistry::new();
        assert!(registry.stats().oldest_connected_at.is_none());

        let (first, _rx_a) = register(&registry);
        let (second, _rx_b) = register(&registry);

        let stats = registry.stats();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(
            stats.oldest_connected_at,
            Some(first.connected_at.min(second.connected_at))
        );

        registry.unregister(first.id).await;
        assert_eq!(registry.stats().oldest_connected_at, Some(second.connected_at));
    }

    #[tokio::test]
    async fn test_unregister_twice_is_noop() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = register(&registry);

        registry.unregister(handle.id).await;
        registry.unregister(handle.id).await;

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_operations_on_unknown_connection_are_noops() {
        let registry = ConnectionRegistry::new();
        let unknown = uuid::Uuid::new_v4();

        assert!(!registry.join(unknown, "chat").await);
        assert!(!registry.leave(unknown, "chat").await);
        assert!(registry.subscribers_of("chat").is_empty());
    }
}
