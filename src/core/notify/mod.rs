//! Lead notifications delivered to the dispatch team over Telegram.

mod message;
mod telegram;

use thiserror::Error;

pub use message::{MAX_RECAP_CHARS, format_confirmed_lead, format_voice_lead};
pub use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Telegram credentials not configured")]
    NotConfigured,

    #[error("Telegram request failed: {0}")]
    Request(String),

    #[error("Telegram API returned {status}: {body}")]
    Api { status: u16, body: String },
}

pub type NotifyResult<T> = Result<T, NotifyError>;

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL embeds the bot token
        NotifyError::Request(err.without_url().to_string())
    }
}
