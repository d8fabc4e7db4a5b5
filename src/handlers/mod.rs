//! HTTP and WebSocket request handlers
//!
//! This module organizes all handlers into logical groups:
//! - `api` - Health check endpoint
//! - `chat` - Text chat with the dispatch assistant
//! - `relay` - Voice relay WebSocket (browser to Gemini Live)
//! - `telegram` - Lead notification for the voice assistant

pub mod api;
pub mod chat;
pub mod relay;
pub mod telegram;

// Re-export commonly used handlers for convenient access
pub use chat::chat_handler;
pub use relay::relay_handler;
pub use telegram::telegram_handler;
