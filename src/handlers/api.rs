use axum::response::Json;
use serde_json::{Value, json};

/// Liveness probe.
///
/// Always answers `{"status":"OK"}`; it does not check the upstream services.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}
