//! Voice relay WebSocket route configuration
//!
//! This module configures the single WebSocket endpoint that bridges the
//! browser's voice assistant to Gemini Live.

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::relay_handler;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
///
/// # Endpoint
///
/// `GET <path>` - WebSocket upgrade (default `/ws/gemini`)
///
/// # Protocol
///
/// The gateway speaks no protocol of its own. Once the upstream connection
/// is open it sends the setup message, then every text or binary frame is
/// passed through unchanged in both directions.
///
/// Failures are reported only through the close frame:
/// - `1008 API Key missing` when no Google credential is configured
/// - `1011 Failed to connect to upstream` when the upstream request cannot be built
/// - `1011 Upstream Error` on upstream transport errors
/// - a plain close when Gemini closes the session
///
/// Other paths are not handled here and fall through to the rest of the router.
pub fn create_relay_router(path: &str, state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(path, get(relay_handler))
        .layer(middleware::from_fn_with_state(
            state,
            connection_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
