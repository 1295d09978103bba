//! Event stream over WebSocket
//!
//! Every pipeline event is forwarded to the client as one JSON text frame.
//! The connection carries events for all runs; clients filter by
//! `pipelineId`.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};

use crate::api::AppState;

/// GET /ws
pub async fn events_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(socket: WebSocket, state: AppState) {
    let mut events = state.orchestrator.events().subscribe();
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!("WebSocket subscriber connected");

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!("Failed to serialize {}: {}", event.name(), e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("WebSocket subscriber disconnected");
}
