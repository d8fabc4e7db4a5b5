pub mod api;
pub mod relay;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::handlers::api::health_check;
use crate::state::AppState;

/// Compose every route group into the application router.
///
/// Cross-cutting layers (CORS, rate limiting, security headers) are added by
/// the binary on top of this.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    let relay_path = state.config.relay_path.clone();

    // Public health check route
    let public_routes = Router::new().route("/", get(health_check));

    public_routes
        .merge(api::create_api_router())
        .merge(relay::create_relay_router(&relay_path, state.clone()))
        .with_state(state)
}
