//! Voice relay WebSocket handler
//!
//! Accepts the browser's WebSocket upgrade on the relay path and hands the
//! socket to a [`RelaySession`] that pipes it to Gemini Live.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::core::relay::{CloseReason, RelayOptions, RelaySession, UpstreamConnector};
use crate::state::{AppState, ConnectionSlot};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Relay WebSocket handler
///
/// Upgrades the connection, then either closes it with 1008 when no Google
/// credential is configured or starts a relay session.
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<ConnectionSlot>>,
) -> Response {
    let session_id = Uuid::new_v4().to_string();
    info!(session_id = %session_id, "Relay WebSocket connection upgrade requested");

    let slot = slot.map(|Extension(slot)| slot);
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state, session_id, slot))
}

async fn handle_relay_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    session_id: String,
    slot: Option<ConnectionSlot>,
) {
    info!(session_id = %session_id, "Client connected to relay");

    let connector = match UpstreamConnector::from_config(&state.config) {
        Ok(connector) => connector,
        Err(e) => {
            error!(session_id = %session_id, error = %e, "No API key found, closing client");
            let close = Message::Close(Some(CloseReason::MissingCredential.close_frame()));
            if let Err(e) = socket.send(close).await {
                error!(session_id = %session_id, error = %e, "Failed to send close frame");
            }
            return;
        }
    };

    let session = RelaySession::new(
        session_id.clone(),
        connector,
        RelayOptions::from_config(&state.config),
    );
    let stats = session.run(socket).await;

    info!(
        session_id = %session_id,
        close_reason = ?stats.close_reason,
        "Relay connection finished"
    );

    // Hold the slot until both legs are gone
    drop(slot);
}
