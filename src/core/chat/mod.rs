//! Text chat with the hosted model over its `generateContent` REST endpoint.
//!
//! [`GeminiChatClient`] sends the conversation history and the new message;
//! [`parse_reply`] splits the reply at the `[COMPLETE]` marker and extracts
//! the lead details the model appends once qualification is done.

mod client;
mod completion;

use thiserror::Error;

pub use client::{GeminiChatClient, GenerationSettings};
pub use completion::{COMPLETE_MARKER, ChatReply, parse_extraction, parse_reply};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API Key missing")]
    MissingCredential,

    #[error("Request to the model failed: {0}")]
    Request(String),

    #[error("Model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Invalid completion data: {0}")]
    Extraction(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL; it is not useful to callers
        ChatError::Request(err.without_url().to_string())
    }
}
