use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::connection_manager::ConnectionHandle;
use crate::metrics::{WsMessageMetrics, WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED};
use crate::relay::RelayIngress;
use crate::server::AppState;

use super::message::{ClientMessage, MessageError, OutboundMessage};

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let buffer_size = state.settings.relay.outbound_buffer_size;
    let ingress: Arc<dyn RelayIngress> = state.relay.clone();

    ws.on_upgrade(move |socket| handle_socket(socket, ingress, buffer_size))
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, ingress))]
pub async fn handle_socket(socket: WebSocket, ingress: Arc<dyn RelayIngress>, buffer_size: usize) {
    let connection_start = std::time::Instant::now();

    // Outbound queue for this connection; the router never waits on it
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(buffer_size.max(1));

    let handle = ingress.on_connect(tx).await;
    let connection_id = handle.id;

    WS_CONNECTIONS_OPENED.inc();
    tracing::info!(connection_id = %connection_id, "Client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for writing queued messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let frame = match msg {
                OutboundMessage::Broadcast(text) => Message::Text(text.to_string().into()),
                OutboundMessage::Ping => Message::Ping(Vec::new().into()),
            };

            if let Err(e) = ws_sender.send(frame).await {
                tracing::debug!(connection_id = %connection_id, error = %e, "Socket write failed");
                break;
            }
        }
    });

    // Task for reading client frames
    let recv_ingress = ingress.clone();
    let recv_handle = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, recv_ingress.as_ref(), &recv_handle).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %recv_handle.id, error = %e, "Client error");
                    break;
                }
            }
        }
    });

    // Whichever side ends first takes the other down with it
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
        }
    }

    ingress.on_disconnect(connection_id).await;

    WS_CONNECTIONS_CLOSED.inc();
    tracing::info!(
        connection_id = %connection_id,
        duration_secs = connection_start.elapsed().as_secs_f64(),
        "Client disconnected"
    );
}

/// Process a received WebSocket frame.
/// Returns false if the connection should be closed.
pub async fn process_message(
    msg: Message,
    ingress: &dyn RelayIngress,
    handle: &Arc<ConnectionHandle>,
) -> bool {
    let text = match msg {
        Message::Text(text) => text.as_str().to_owned(),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => text,
            Err(_) => {
                WsMessageMetrics::record_rejected();
                tracing::warn!(connection_id = %handle.id, "Client sent non-UTF-8 binary data");
                return true;
            }
        },
        // axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => return true,
        Message::Close(frame) => {
            tracing::debug!(connection_id = %handle.id, close = ?frame, "Received close frame");
            return false;
        }
    };

    match ClientMessage::parse(&text) {
        Ok(client_msg) => handle_client_message(client_msg, ingress, handle).await,
        Err(e) => {
            WsMessageMetrics::record_rejected();
            match e {
                MessageError::UnknownAction(_) | MessageError::MissingAction => {
                    tracing::warn!(connection_id = %handle.id, error = %e, "Ignoring unknown action");
                }
                _ => {
                    tracing::warn!(connection_id = %handle.id, error = %e, "Dropping malformed message");
                }
            }
        }
    }

    true
}

/// Dispatch a decoded client message to the relay
#[tracing::instrument(
    name = "ws.message",
    skip(ingress, handle, msg),
    fields(connection_id = %handle.id, action = msg.action())
)]
async fn handle_client_message(msg: ClientMessage, ingress: &dyn RelayIngress, handle: &Arc<ConnectionHandle>) {
    match msg {
        ClientMessage::Join { channel } => {
            WsMessageMetrics::record_join();
            tracing::debug!(channel = %channel, "Client joined channel");
            ingress.on_join(handle.id, &channel).await;
        }
        ClientMessage::Leave { channel } => {
            WsMessageMetrics::record_leave();
            tracing::debug!(channel = %channel, "Client left channel");
            ingress.on_leave(handle.id, &channel).await;
        }
        ClientMessage::Post { channel, data } => {
            WsMessageMetrics::record_post();
            tracing::debug!(channel = %channel, "Client posted message to channel");
            ingress.on_post(&channel, data, Some(handle.id)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::relay::Relay;
    use serde_json::{json, Value};

    async fn connect(relay: &Relay) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (relay.on_connect(tx).await, rx)
    }

    fn text(s: &str) -> Message {
        Message::Text(s.to_string().into())
    }

    #[tokio::test]
    async fn test_join_post_leave_frames() {
        let relay = Relay::from_config(&RelayConfig::default());
        let (a, mut rx_a) = connect(&relay).await;
        let (b, mut rx_b) = connect(&relay).await;

        assert!(process_message(text(r#"{"action":"join","channel":"chat"}"#), &relay, &a).await);
        assert!(process_message(text(r#"{"action":"join","channel":"chat"}"#), &relay, &b).await);
        assert!(
            process_message(
                text(r#"{"action":"post","channel":"chat","data":{"text":"hi"}}"#),
                &relay,
                &a
            )
            .await
        );

        let OutboundMessage::Broadcast(payload) = rx_b.try_recv().unwrap() else {
            panic!("expected a broadcast");
        };
        let payload: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(payload, json!({"channel": "chat", "data": {"text": "hi"}}));
        assert!(rx_a.try_recv().is_err());

        assert!(process_message(text(r#"{"action":"leave","channel":"chat"}"#), &relay, &b).await);
        assert_eq!(relay.registry().subscribers_of("chat").len(), 1);
    }

    #[tokio::test]
    async fn test_binary_json_is_accepted() {
        let relay = Relay::from_config(&RelayConfig::default());
        let (a, _rx) = connect(&relay).await;

        let frame = Message::Binary(br#"{"action":"join","channel":"chat"}"#.to_vec().into());
        assert!(process_message(frame, &relay, &a).await);

        assert_eq!(a.channels().await, vec!["chat".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_input_changes_nothing_and_keeps_connection() {
        let relay = Relay::from_config(&RelayConfig::default());
        let (a, _rx) = connect(&relay).await;

        assert!(process_message(text("not json"), &relay, &a).await);
        assert!(process_message(text(r#"{"action":"shout","channel":"chat"}"#), &relay, &a).await);
        assert!(process_message(text(r#"{"action":"join"}"#), &relay, &a).await);
        assert!(process_message(text(r#"["join","chat"]"#), &relay, &a).await);

        assert!(a.channels().await.is_empty());
        assert_eq!(relay.router().stats().published, 0);
    }

    #[tokio::test]
    async fn test_close_frame_ends_connection() {
        let relay = Relay::from_config(&RelayConfig::default());
        let (a, _rx) = connect(&relay).await;

        assert!(!process_message(Message::Close(None), &relay, &a).await);
    }
}
