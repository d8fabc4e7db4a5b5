use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::{chat, telegram};
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
///
/// - `POST /api/chat` - text chat with the dispatch assistant
/// - `POST /api/telegram` - voice lead notification
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chat", post(chat::chat_handler))
        .route("/api/telegram", post(telegram::telegram_handler))
        .layer(TraceLayer::new_for_http())
}
