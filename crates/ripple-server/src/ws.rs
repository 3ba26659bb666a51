use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use ripple_core::ChannelId;
use ripple_pipeline::SessionRegistry;

use crate::server::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// GET /api/events/stream — upgrade and register a push session.
/// No replay is sent on connect; late joiners backfill via the query API.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (channel_id, rx) = state.registry.register();
    tracing::info!(channel_id = %channel_id, "push session connected");
    stream_session(socket, channel_id, rx, state.registry).await;
}

/// Pump broadcast frames to the socket until either side hangs up, then
/// unregister. The registry also prunes lazily if a broadcast send fails
/// first.
async fn stream_session(
    socket: WebSocket,
    channel_id: ChannelId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<SessionRegistry>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Close(_) => break,
                // Inbound text is only a keep-alive; axum answers pings itself.
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.remove(&channel_id);
    tracing::info!(channel_id = %channel_id, "push session closed");
}
