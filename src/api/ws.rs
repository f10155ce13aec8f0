// WebSocket handler for streaming game lifecycle events.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use tokio::sync::broadcast;

use crate::engine::events::GameEvent;

use super::AppState;

/// WebSocket upgrade handler for a channel's event stream. Works for both
/// game kinds; when the game ends and its sender drops, the stream closes.
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> impl IntoResponse {
    let rx = if let Some(session) = state.sessions.get(channel_id) {
        session.subscribe()
    } else if let Some(game) = state.channels.get(channel_id) {
        game.subscribe()
    } else {
        return (StatusCode::NOT_FOUND, "no game in this channel").into_response();
    };

    ws.on_upgrade(move |socket| handle_ws(socket, rx)).into_response()
}

async fn handle_ws(mut socket: WebSocket, mut rx: broadcast::Receiver<GameEvent>) {
    // Forward all broadcast events to the WebSocket client.
    // When the client disconnects or the broadcast channel closes, we stop.
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(_) => continue,
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            // Client disconnected
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Channel closed, game ended
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket client lagged, skipped {n} events");
                        // Continue receiving
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    _ => {
                        // Ignore other client messages
                    }
                }
            }
        }
    }
}
