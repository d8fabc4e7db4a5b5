use serde::Serialize;
use tracing::{debug, error};
use zeroize::Zeroizing;

use super::{NotifyError, NotifyResult};
use crate::config::ServerConfig;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Sends Markdown messages to one Telegram chat through the Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: Zeroizing<String>,
    chat_id: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base_url", &self.api_base_url)
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(
        http: reqwest::Client,
        api_base_url: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            bot_token: Zeroizing::new(bot_token.into()),
            chat_id: chat_id.into(),
        }
    }

    /// Build a notifier from configuration, [`NotifyError::NotConfigured`]
    /// when the token or chat id is missing.
    pub fn from_config(config: &ServerConfig, http: reqwest::Client) -> NotifyResult<Self> {
        let (token, chat_id) = config
            .telegram_credentials()
            .ok_or(NotifyError::NotConfigured)?;
        Ok(Self::new(http, &config.telegram_api_base_url, token, chat_id))
    }

    /// Post `text` with `parse_mode: Markdown`.
    pub async fn send_message(&self, text: &str) -> NotifyResult<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token.as_str());
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        debug!(chat_id = %self.chat_id, chars = text.chars().count(), "Sending Telegram message");

        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Telegram API error");
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
