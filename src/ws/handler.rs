//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::error::ServerError;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The guest is registered only once the upgrade has completed, so a failed
/// handshake never shows up in the count.
///
/// # Errors
///
/// Returns [`ServerError::ShuttingDown`] once shutdown has been triggered.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, ServerError> {
    if state.shutdown.is_triggered() {
        return Err(ServerError::ShuttingDown);
    }

    let presence = state.presence.clone();
    let shutdown = state.shutdown.subscribe();
    let settings = state.ws;

    Ok(ws.on_upgrade(move |socket| async move {
        let session = presence.join();
        run_connection(socket, session, settings, shutdown).await;
    }))
}
