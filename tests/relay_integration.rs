//! Cross-component integration tests
//!
//! These drive the relay through its ingress operations the way the
//! WebSocket and HTTP adapters do, without starting a server.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};

use channel_relay::config::RelayConfig;
use channel_relay::poll::DEFAULT_MAX_BUFFER_SIZE;
use channel_relay::relay::{ChannelMessage, Relay, RelayIngress};
use channel_relay::tasks::{sweep_once, LivenessSweeper};
use channel_relay::websocket::OutboundMessage;

fn create_relay() -> Relay {
    Relay::from_config(&RelayConfig::default())
}

fn decode(message: OutboundMessage) -> Value {
    match message {
        OutboundMessage::Broadcast(text) => serde_json::from_str(&text).unwrap(),
        OutboundMessage::Ping => panic!("expected a broadcast, got a ping"),
    }
}

mod fan_out {
    use super::*;

    #[tokio::test]
    async fn test_push_and_poll_subscribers_both_receive() {
        let relay = create_relay();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = relay.on_connect(tx_a).await;
        let b = relay.on_connect(tx_b).await;

        relay.on_join(a.id, "chat").await;
        relay.on_join(b.id, "chat").await;
        relay.on_fetch("p1", Some(vec!["chat".to_string()])).await;

        let result = relay.on_post("chat", json!({"text": "hi"}), Some(a.id)).await;
        assert_eq!(result.delivered, 1);
        assert_eq!(result.buffered, 1);

        assert_eq!(
            decode(rx_b.recv().await.unwrap()),
            json!({"channel": "chat", "data": {"text": "hi"}})
        );
        assert!(rx_a.try_recv().is_err());
        assert_eq!(
            relay.on_fetch("p1", None).await,
            vec![ChannelMessage::new("chat", json!({"text": "hi"}))]
        );
    }

    #[tokio::test]
    async fn test_http_post_reaches_every_push_member() {
        let relay = create_relay();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let a = relay.on_connect(tx_a).await;
        relay.on_join(a.id, "alerts").await;

        relay.on_post("alerts", json!("disk full"), None).await;

        assert_eq!(
            decode(rx_a.recv().await.unwrap()),
            json!({"channel": "alerts", "data": "disk full"})
        );
    }

    #[tokio::test]
    async fn test_post_to_empty_channel_is_noop() {
        let relay = create_relay();

        let result = relay.on_post("nobody", json!(null), None).await;

        assert_eq!(result.delivered, 0);
        assert_eq!(result.buffered, 0);
        assert!(relay.buffers().is_empty());
    }

    #[tokio::test]
    async fn test_join_and_leave_are_idempotent() {
        let relay = create_relay();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = relay.on_connect(tx).await;

        relay.on_join(handle.id, "chat").await;
        relay.on_join(handle.id, "chat").await;
        relay.on_post("chat", json!(1), None).await;
        assert_eq!(decode(rx.recv().await.unwrap())["data"], json!(1));
        assert!(rx.try_recv().is_err());

        relay.on_leave(handle.id, "chat").await;
        relay.on_leave(handle.id, "chat").await;
        relay.on_leave(handle.id, "never-joined").await;
        relay.on_post("chat", json!(2), None).await;
        assert!(rx.try_recv().is_err());
        assert!(relay.registry().stats().channels.is_empty());
    }
}

mod poll_buffers {
    use super::*;

    #[tokio::test]
    async fn test_overflow_keeps_oldest_messages() {
        let relay = create_relay();
        relay.on_fetch("p1", Some(vec!["firehose".to_string()])).await;

        for i in 0..=DEFAULT_MAX_BUFFER_SIZE {
            relay.on_post("firehose", json!(i), None).await;
        }

        let messages = relay.on_fetch("p1", None).await;
        assert_eq!(messages.len(), DEFAULT_MAX_BUFFER_SIZE);
        assert_eq!(messages[0].data, json!(0));
        assert_eq!(
            messages[DEFAULT_MAX_BUFFER_SIZE - 1].data,
            json!(DEFAULT_MAX_BUFFER_SIZE - 1)
        );
        assert_eq!(relay.router().stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_channels() {
        let relay = create_relay();
        relay.on_fetch("p1", Some(vec!["a".to_string()])).await;
        relay.on_fetch("p1", Some(vec!["b".to_string()])).await;

        relay.on_post("a", json!("old"), None).await;
        relay.on_post("b", json!("new"), None).await;

        assert_eq!(
            relay.on_fetch("p1", None).await,
            vec![ChannelMessage::new("b", json!("new"))]
        );
    }

    #[tokio::test]
    async fn test_idle_buffer_is_evicted_and_recreated_empty() {
        let relay = create_relay();
        relay.on_fetch("p1", Some(vec!["news".to_string()])).await;
        relay.on_post("news", json!("lost"), None).await;

        let later = Utc::now() + chrono::Duration::seconds(301);
        let evicted = relay.buffers().sweep_idle(later, Duration::from_secs(300));
        assert_eq!(evicted, 1);
        assert!(relay.buffers().is_empty());

        relay.on_post("news", json!("unseen"), None).await;
        assert!(relay.on_fetch("p1", None).await.is_empty());

        let info = relay.buffers().get("p1").unwrap();
        assert!(info.channels.is_empty());
    }
}

mod liveness {
    use super::*;

    #[tokio::test]
    async fn test_sweep_probes_connections_and_keeps_fresh_buffers() {
        let relay = create_relay();
        let (tx, mut rx) = mpsc::channel(8);
        relay.on_connect(tx).await;
        relay.on_fetch("p1", None).await;

        let report = sweep_once(relay.registry(), relay.buffers(), &RelayConfig::default()).await;

        assert_eq!(report.probe.sent, 1);
        assert_eq!(report.evicted, 0);
        assert_eq!(rx.recv().await, Some(OutboundMessage::Ping));
        assert_eq!(relay.buffers().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_does_not_unregister() {
        let relay = create_relay();
        let (tx, rx) = mpsc::channel(8);
        relay.on_connect(tx).await;
        drop(rx);

        let report = sweep_once(relay.registry(), relay.buffers(), &RelayConfig::default()).await;

        assert_eq!(report.probe.failed, 1);
        assert_eq!(relay.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_ticks_until_shutdown() {
        let relay = Arc::new(create_relay());
        let (tx, mut rx) = mpsc::channel(8);
        relay.on_connect(tx).await;

        let config = RelayConfig {
            sweep_interval_secs: 1,
            ..RelayConfig::default()
        };
        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = LivenessSweeper::new(
            config,
            relay.registry().clone(),
            relay.buffers().clone(),
            shutdown_tx.subscribe(),
        )
        .spawn();

        let probe = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("sweeper should probe within a few ticks");
        assert_eq!(probe, Some(OutboundMessage::Ping));

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop on shutdown")
            .unwrap();
    }
}
