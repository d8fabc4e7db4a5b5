//! Mock upstream servers for integration tests
//!
//! - `gemini_live_mock` - Gemini Live bidirectional WebSocket endpoint
//!
//! REST upstreams (Gemini `generateContent`, Telegram Bot API) are mocked
//! with `wiremock` directly in the tests that need them.

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod gemini_live_mock;

pub use gemini_live_mock::{MockEvent, MockGeminiLive, UpstreamBehavior};
