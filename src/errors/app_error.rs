//! HTTP-facing error type.
//!
//! Every handler error ends up here and is rendered as a JSON body of the
//! form `{"error": "...", "details": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::core::chat::ChatError;
use crate::core::notify::NotifyError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Telegram credentials not configured")]
    NotificationNotConfigured,

    #[error("Failed to send to Telegram")]
    NotificationFailed,

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal Server Error")]
    Internal { details: Option<String> },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Internal {
                details: Some(details),
            } => json!({ "error": self.to_string(), "details": details }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::MissingCredential => AppError::Configuration(err.to_string()),
            other => AppError::Internal {
                details: Some(other.to_string()),
            },
        }
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::NotConfigured => AppError::NotificationNotConfigured,
            NotifyError::Api { .. } => AppError::NotificationFailed,
            NotifyError::Request(details) => AppError::Internal {
                details: Some(details),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_key_body() {
        let (status, body) = body_json(ChatError::MissingCredential.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Configuration Error: API Key missing" }));
    }

    #[tokio::test]
    async fn test_internal_error_carries_details() {
        let (status, body) = body_json(ChatError::EmptyResponse.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["details"], "Model returned no text");
    }

    #[tokio::test]
    async fn test_notify_errors() {
        let (_, body) = body_json(NotifyError::NotConfigured.into()).await;
        assert_eq!(body, json!({ "error": "Telegram credentials not configured" }));

        let (_, body) = body_json(
            NotifyError::Api {
                status: 400,
                body: "bad".to_string(),
            }
            .into(),
        )
        .await;
        assert_eq!(body, json!({ "error": "Failed to send to Telegram" }));
    }

    #[tokio::test]
    async fn test_bad_request_status() {
        let (status, body) = body_json(AppError::BadRequest("missing message".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing message");
    }
}
