//! Bidirectional voice relay between a browser and Gemini Live.
//!
//! A relay session pairs one downstream WebSocket (the caller's browser) with
//! one upstream WebSocket (the hosted real-time audio service) and pipes
//! frames between them verbatim.
//!
//! # Architecture
//!
//! - [`UpstreamConnector`] builds the upstream request from the read-only
//!   configuration, opens the connection and produces the setup message.
//! - [`RelayState`] is the session state machine. [`RelayState::on`] is a pure
//!   transition table mapping an event to the next state and the action to run.
//! - [`RelaySession`] drives one session: it multiplexes both legs with
//!   `tokio::select!`, feeds events through the table and executes actions.
//!
//! # Close codes
//!
//! Failures are reported to the browser only through the close frame on the
//! downstream leg, see [`CloseReason`].

mod frame;
mod session;
mod state;
mod upstream;

use thiserror::Error;

pub use frame::Frame;
pub use session::{RelayOptions, RelaySession, RelayStats};
pub use state::{RelayAction, RelayEvent, RelayState, Transition};
pub use upstream::{
    GenerationConfig, ResponseModality, SetupConfig, SetupMessage, UpstreamConnector,
    UpstreamSocket,
};

/// Errors raised while establishing or using the upstream leg.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No credential for the upstream service is configured
    #[error("Upstream credential is not configured")]
    MissingCredential,

    /// The upstream request could not be built (bad endpoint, bad URI)
    #[error("Failed to build upstream request: {0}")]
    UpstreamConstruction(String),

    /// The transport failed while opening the upstream connection
    #[error("Upstream connection failed: {0}")]
    UpstreamConnection(String),

    /// The setup message could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Reasons the relay itself closes the downstream leg.
///
/// A plain close (no code) is used when the upstream service closes normally;
/// that case has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// No upstream credential configured (policy violation)
    MissingCredential,
    /// The upstream request could not be constructed
    UpstreamConnectFailed,
    /// The upstream leg reported a transport or protocol error
    UpstreamError,
    /// Neither leg carried a frame within the configured idle timeout
    IdleTimeout,
}

impl CloseReason {
    /// WebSocket close code sent to the browser.
    pub fn code(&self) -> u16 {
        match self {
            Self::MissingCredential => 1008,
            Self::UpstreamConnectFailed => 1011,
            Self::UpstreamError => 1011,
            Self::IdleTimeout => 1001,
        }
    }

    /// Human-readable close reason sent to the browser.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "API Key missing",
            Self::UpstreamConnectFailed => "Failed to connect to upstream",
            Self::UpstreamError => "Upstream Error",
            Self::IdleTimeout => "Idle timeout",
        }
    }

    /// Close frame for the downstream (axum) leg.
    pub fn close_frame(&self) -> axum::extract::ws::CloseFrame {
        axum::extract::ws::CloseFrame {
            code: self.code(),
            reason: axum::extract::ws::Utf8Bytes::from_static(self.reason()),
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.reason(), self.code())
    }
}
