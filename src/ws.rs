//! WebSocket endpoint for live subscribers.
//!
//! Every connection gets one full snapshot up front, then the per-cycle
//! batches from the broadcast channel. Subscribers never pull state
//! directly; the only inbound message is a request for the full graph
//! history, answered out of band from the cycle cadence.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::app::App;

const REQUEST_HISTORY_GRAPH: &str = "request_history_graph";

pub fn router(app: Arc<App>) -> Router {
    Router::new().route("/ws", get(websocket_handler)).with_state(app)
}

async fn websocket_handler(ws: WebSocketUpgrade, State(app): State<Arc<App>>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, app))
}

async fn handle_websocket(socket: WebSocket, app: Arc<App>) {
    info!("subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    // Snapshot first, so the diffs that follow have something to land on
    match app.init_message().await {
        Ok(text) => {
            if sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        Err(e) => {
            error!("failed to build init snapshot: {e}");
            return;
        }
    }

    let mut updates_rx = app.subscribe();

    loop {
        tokio::select! {
            update = updates_rx.recv() => match update {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("subscriber lagged, skipped {skipped} batches");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) if text == REQUEST_HISTORY_GRAPH => {
                    match app.history_graph_message().await {
                        Ok(text) => {
                            if sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => error!("failed to build graph history: {e}"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("subscriber socket error: {e}");
                    break;
                }
            },
        }
    }

    info!("subscriber disconnected");
}
