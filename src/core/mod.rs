pub mod chat;
pub mod conversation;
pub mod notify;
pub mod relay;

// Re-export commonly used types for convenience
pub use chat::{ChatError, ChatReply, ChatResult, GeminiChatClient, parse_extraction, parse_reply};

pub use conversation::{ChatPart, ChatTurn, ConfirmedLead, GeoLocation, LeadExtraction, UserInfo};

pub use notify::{NotifyError, NotifyResult, TelegramNotifier};

pub use relay::{
    CloseReason, Frame, RelayError, RelayOptions, RelayResult, RelaySession, RelayState,
    RelayStats, UpstreamConnector,
};
