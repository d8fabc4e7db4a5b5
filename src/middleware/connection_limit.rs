//! Connection limit middleware for WebSocket connections
//!
//! This module provides middleware to enforce connection limits:
//! - Global maximum WebSocket connections
//! - Per-IP connection limits
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use dispatch_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/ws/gemini", get(relay_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError, ConnectionSlot};

/// Middleware that enforces connection limits for WebSocket connections.
///
/// This middleware:
/// 1. Checks if the global WebSocket connection limit has been reached
/// 2. Checks if the per-IP connection limit has been reached
/// 3. Returns 503 Service Unavailable if global limit is exceeded
/// 4. Returns 429 Too Many Requests if per-IP limit is exceeded
/// 5. Injects a `ConnectionSlot` (carrying the client IP) the handler keeps
///    alive for the duration of the session
///
/// The middleware only applies to WebSocket upgrade requests (detected by the
/// Upgrade header). Non-WebSocket requests pass through without limit checks.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match ConnectionSlot::acquire(&state, client_ip) {
        Ok(slot) => {
            // Released when the handler (or this request, if the upgrade fails) drops it
            request.extensions_mut().insert(slot);
            next.run(request).await
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                "Rejecting connection: global limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                "Rejecting connection: per-IP limit reached"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{Extension, Router, routing::get};
    use tower::ServiceExt;

    async fn app(per_ip: u32) -> (Router, Arc<AppState>) {
        let mut config = ServerConfig::default();
        config.max_connections_per_ip = per_ip;
        let state = AppState::new(config).await;

        let router = Router::new()
            .route(
                "/ws",
                get(|slot: Option<Extension<ConnectionSlot>>| async move {
                    match slot {
                        Some(Extension(slot)) => slot.ip().to_string(),
                        None => "no-slot".to_string(),
                    }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state.clone());
        (router, state)
    }

    fn upgrade_request() -> Request<Body> {
        let mut request = Request::builder()
            .uri("/ws")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5555))));
        request
    }

    #[tokio::test]
    async fn test_plain_requests_pass_through() {
        let (router, state) = app(1).await;
        let response = router
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"no-slot");
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_upgrade_gets_slot_released_after_response() {
        let (router, state) = app(1).await;
        let response = router.oneshot(upgrade_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"127.0.0.1");
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_per_ip_limit_rejects_with_429() {
        let (router, state) = app(1).await;
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();
        let _held = ConnectionSlot::acquire(&state, ip).unwrap();

        let response = router.oneshot(upgrade_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_global_limit_rejects_with_503() {
        let mut config = ServerConfig::default();
        config.max_websocket_connections = Some(0);
        let state = AppState::new(config).await;
        let router = Router::new()
            .route("/ws", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state);

        let response = router.oneshot(upgrade_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
