//! # WebSocket Handlers
//!
//! Serves `/ws/deployment/{resource_id}`:
//! - Upgrading the HTTP request and checking the subscriber's token
//! - Replaying the simulated deployment on a feed task
//! - Answering heartbeats from the subscriber
//! - Dropping the subscription from the registry on disconnect

use crate::protocol::{ClientMessage, ControlReply, Outbound};
use crate::scenario::simulated_deployment;
use crate::state::{generate_connection_id, AppState, StreamInfo};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use haifu_protocol::Envelope;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

type SubscriberTx = mpsc::UnboundedSender<Outbound>;

/// Query string of a feed subscription.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub token: Option<String>,
    #[serde(rename = "projectId")]
    pub project_id: Option<String>,
}

// ─── WebSocket Upgrade Endpoint ─────────────────────────────────

/// `GET /ws/deployment/{resource_id}?token=..&projectId=..`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(resource_id): Path<String>,
    Query(params): Query<StreamParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, resource_id, params))
}

// ─── Connection Lifecycle ───────────────────────────────────────

/// Manages one subscriber socket.
///
/// ## Flow:
/// 1. Assign a connection ID and spawn the outbound task
/// 2. Reject with an `error` frame if the token does not match
/// 3. Register the subscription and spawn the feed task
/// 4. Process inbound frames until the subscriber leaves
/// 5. On disconnect: stop both tasks and unregister
async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    resource_id: String,
    params: StreamParams,
) {
    let conn_id = generate_connection_id();
    info!("New subscriber {} for resource {}", conn_id, resource_id);

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    // ── Outbound Task ──
    // Drains the queue as JSON text frames. Once every sender is gone the
    // socket is closed from our side.
    let outbound_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    error!("Serialize error: {}", e);
                    continue;
                }
            };
            if ws_sink.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_sink.close().await;
    });

    if !state.feed.accepts(params.token.as_deref()) {
        warn!("Rejecting subscriber {}: invalid token", conn_id);
        let _ = tx.send(Outbound::Feed(Envelope::error(json!({
            "message": "Invalid or missing token",
        }))));
        drop(tx);
        let _ = outbound_task.await;
        return;
    }

    state.streams.insert(
        conn_id.clone(),
        StreamInfo {
            connection_id: conn_id.clone(),
            resource_id: resource_id.clone(),
            project_id: params.project_id,
        },
    );

    let feed_task = tokio::spawn(replay_deployment(
        tx.clone(),
        resource_id,
        state.feed.frame_interval,
    ));

    // ── Inbound Loop ──
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                debug!("Subscriber {} sent: {}", conn_id, text.as_str());
                handle_message(&tx, text.as_str());
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // ── Cleanup on Disconnect ──
    info!("Subscriber {} disconnected", conn_id);
    feed_task.abort();
    outbound_task.abort();
    state.streams.remove(&conn_id);
}

/// Emits the scripted deployment, one frame per interval. The first frame
/// goes out immediately.
async fn replay_deployment(tx: SubscriberTx, resource_id: String, interval: Duration) {
    for (index, step) in simulated_deployment(&resource_id).into_iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(interval).await;
        }
        if tx.send(Outbound::Feed(step.envelope(Utc::now()))).is_err() {
            return;
        }
    }
    info!("Deployment feed for {} complete", resource_id);
}

fn handle_message(tx: &SubscriberTx, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => {
            let _ = tx.send(Outbound::Control(ControlReply::Pong));
        }
        Ok(ClientMessage::Other) | Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haifu_protocol::FrameKind;

    #[test]
    fn ping_is_answered_and_noise_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_message(&tx, r#"{"type":"ping"}"#);
        handle_message(&tx, r#"{"type":"hello"}"#);
        handle_message(&tx, "not json");

        assert!(matches!(
            rx.try_recv(),
            Ok(Outbound::Control(ControlReply::Pong))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn replay_paces_frames_by_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = tokio::time::Instant::now();
        tokio::spawn(replay_deployment(tx, "svc-1".into(), Duration::from_secs(1)));

        let mut kinds = Vec::new();
        while let Some(Outbound::Feed(envelope)) = rx.recv().await {
            kinds.push(envelope.kind);
        }

        assert_eq!(kinds.len(), 7);
        assert_eq!(kinds.first(), Some(&FrameKind::Status));
        assert_eq!(kinds.last(), Some(&FrameKind::Complete));
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[test]
    fn project_id_uses_camel_case_query_key() {
        let params: StreamParams =
            serde_json::from_value(json!({"token": "t", "projectId": "p-1"})).unwrap();
        assert_eq!(params.project_id.as_deref(), Some("p-1"));
        assert_eq!(params.token.as_deref(), Some("t"));
    }
}
