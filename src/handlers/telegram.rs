use axum::extract::{Json, State, rejection::JsonRejection};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

use crate::core::conversation::{ChatTurn, UserInfo};
use crate::core::notify::{TelegramNotifier, format_voice_lead};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadNotificationRequest {
    #[serde(default)]
    pub user_info: Option<UserInfo>,
    #[serde(default)]
    pub history: Option<Vec<ChatTurn>>,
}

/// `POST /api/telegram`
///
/// Posts a voice-assistant lead (contact details and conversation recap) to
/// the dispatch chat.
pub async fn telegram_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LeadNotificationRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let notifier = TelegramNotifier::from_config(&state.config, state.http_client.clone())
        .inspect_err(|_| error!("Telegram credentials not configured"))?;
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let user_info = request.user_info.unwrap_or_default();
    let history = request.history.unwrap_or_default();
    let message = format_voice_lead(&user_info, &history);

    notifier
        .send_message(&message)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to deliver voice lead"))?;

    info!(turns = history.len(), "Voice lead sent to Telegram");
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: LeadNotificationRequest = serde_json::from_str("{}").unwrap();
        assert!(request.user_info.is_none());
        assert!(request.history.is_none());

        let request: LeadNotificationRequest = serde_json::from_str(
            r#"{"userInfo":{"name":"Julie"},"history":[{"role":"user","parts":[{"text":"Allo"}]}]}"#,
        )
        .unwrap();
        assert_eq!(request.user_info.unwrap().name(), Some("Julie"));
        assert_eq!(request.history.unwrap()[0].first_text(), "Allo");
    }
}
