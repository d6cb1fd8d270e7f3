//! WebSocket support for live harvest progress.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use dorama_core::{BatchProgress, LifecycleState};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket message sent to clients.
///
/// Progress carries counts only; clients read items through the page
/// endpoint, which applies the caller's access level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A harvest group finished (or a cache read answered the run).
    Progress {
        total: usize,
        processed: usize,
        candidates: usize,
    },
    /// The lifecycle state changed through the API.
    Lifecycle { state: LifecycleState },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::Progress { .. } => "progress",
            WsMessage::Lifecycle { .. } => "lifecycle",
        }
    }
}

impl From<&BatchProgress> for WsMessage {
    fn from(progress: &BatchProgress) -> Self {
        WsMessage::Progress {
            total: progress.total,
            processed: progress.processed,
            candidates: progress.candidates,
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // No receivers just means no one is listening
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn progress(&self, progress: &BatchProgress) {
        self.broadcast(WsMessage::from(progress));
    }

    pub fn lifecycle_changed(&self, state: LifecycleState) {
        self.broadcast(WsMessage::Lifecycle { state });
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Relay controller progress snapshots to WebSocket clients until the
/// controller's channel closes.
pub async fn forward_progress(
    mut progress: broadcast::Receiver<BatchProgress>,
    broadcaster: WsBroadcaster,
) {
    loop {
        match progress.recv().await {
            Ok(snapshot) => broadcaster.progress(&snapshot),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // Snapshots are cumulative, the next one catches up
                debug!("Progress forwarder lagged, skipped {} snapshots", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Progress channel closed");
                break;
            }
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();

                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize WsMessage: {}", e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Client messages are not part of the protocol; only watch for close
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring client text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_message_serialization() {
        let progress = BatchProgress::new(vec![], 40, 120);
        let json = serde_json::to_value(WsMessage::from(&progress)).unwrap();

        assert_eq!(json["type"], "progress");
        assert_eq!(json["total"], 0);
        assert_eq!(json["processed"], 40);
        assert_eq!(json["candidates"], 120);
    }

    #[test]
    fn test_lifecycle_message_serialization() {
        let json = serde_json::to_string(&WsMessage::Lifecycle {
            state: LifecycleState::Paused,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"lifecycle","state":"paused"}"#);
    }

    #[test]
    fn test_forward_progress_relays_until_closed() {
        tokio_test::block_on(async {
            let (tx, rx) = broadcast::channel(8);
            let broadcaster = WsBroadcaster::default();
            let mut ws_rx = broadcaster.subscribe();

            tx.send(BatchProgress::new(vec![], 2, 6)).unwrap();
            tx.send(BatchProgress::new(vec![], 4, 6)).unwrap();
            drop(tx);

            forward_progress(rx, broadcaster).await;

            let first = ws_rx.recv().await.unwrap();
            assert_eq!(
                first,
                WsMessage::Progress {
                    total: 0,
                    processed: 2,
                    candidates: 6
                }
            );
            let second = ws_rx.recv().await.unwrap();
            assert!(matches!(second, WsMessage::Progress { processed: 4, .. }));
        });
    }
}
