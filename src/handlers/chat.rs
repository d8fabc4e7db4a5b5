//! Text chat endpoint for the dispatch assistant.

use axum::extract::{Json, State, rejection::JsonRejection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::chat::{GeminiChatClient, parse_extraction, parse_reply};
use crate::core::conversation::{ChatTurn, ConfirmedLead, UserInfo};
use crate::core::notify::{NotifyError, TelegramNotifier, format_confirmed_lead};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Option<Vec<ChatTurn>>,
    pub message: String,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub completed: bool,
}

/// `POST /api/chat`
///
/// Sends the conversation to the hosted model. When the reply carries the
/// completion marker, the extracted lead is merged with the caller's form
/// data and pushed to Telegram; notification problems are logged and never
/// fail the request.
///
/// Without a Google credential every request fails with a configuration
/// error, whatever the body.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    info!("Chat request received");

    let client = GeminiChatClient::from_config(&state.config, state.http_client.clone())
        .inspect_err(|_| error!("GOOGLE_API_KEY is not configured"))?;
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let history = request.history.unwrap_or_default();
    debug!(turns = history.len(), "Sending conversation to the model");

    let reply = client
        .send(&history, &request.message)
        .await
        .inspect_err(|e| error!(error = %e, "Chat request to the model failed"))?;

    let reply = parse_reply(&reply);
    let Some(completion) = reply.completion else {
        return Ok(Json(ChatResponse {
            response: reply.public_text,
            completed: false,
        }));
    };

    info!("Conversation marked as complete, extracting lead");
    match parse_extraction(&completion) {
        Ok(extraction) => {
            let lead = ConfirmedLead::merge(extraction, request.user_info.as_ref());
            notify_confirmed_lead(&state, &lead).await;
        }
        Err(e) => warn!(error = %e, "Failed to parse completion data"),
    }

    Ok(Json(ChatResponse {
        response: reply.public_text,
        completed: true,
    }))
}

async fn notify_confirmed_lead(state: &AppState, lead: &ConfirmedLead) {
    let notifier = match TelegramNotifier::from_config(&state.config, state.http_client.clone()) {
        Ok(notifier) => notifier,
        Err(NotifyError::NotConfigured) => {
            warn!("Telegram credentials missing, lead not sent");
            return;
        }
        Err(e) => {
            error!(error = %e, "Failed to create Telegram notifier");
            return;
        }
    };

    match notifier.send_message(&format_confirmed_lead(lead)).await {
        Ok(()) => info!(name = %lead.name, "Confirmed lead sent to Telegram"),
        Err(e) => error!(error = %e, "Failed to send Telegram message"),
    }
}
