use axum::extract::ws::Message as DownstreamMessage;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// One opaque data message carried by the relay.
///
/// The relay never looks inside a frame. Text stays text and binary stays
/// binary on the way through; control messages (ping, pong, close) are
/// handled by the transport and the session, never forwarded as frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Data frame from a downstream message, `None` for control messages.
    pub fn from_downstream(message: &DownstreamMessage) -> Option<Self> {
        match message {
            DownstreamMessage::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            DownstreamMessage::Binary(data) => Some(Frame::Binary(data.clone())),
            _ => None,
        }
    }

    /// Data frame from an upstream message, `None` for control messages.
    pub fn from_upstream(message: &UpstreamMessage) -> Option<Self> {
        match message {
            UpstreamMessage::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            UpstreamMessage::Binary(data) => Some(Frame::Binary(data.clone())),
            _ => None,
        }
    }

    pub fn into_upstream(self) -> UpstreamMessage {
        match self {
            Frame::Text(text) => UpstreamMessage::Text(text.into()),
            Frame::Binary(data) => UpstreamMessage::Binary(data),
        }
    }

    pub fn into_downstream(self) -> DownstreamMessage {
        match self {
            Frame::Text(text) => DownstreamMessage::Text(text.into()),
            Frame::Binary(data) => DownstreamMessage::Binary(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_messages_are_not_frames() {
        assert!(Frame::from_downstream(&DownstreamMessage::Ping(Bytes::new())).is_none());
        assert!(Frame::from_downstream(&DownstreamMessage::Close(None)).is_none());
        assert!(Frame::from_upstream(&UpstreamMessage::Pong(Bytes::new())).is_none());
        assert!(Frame::from_upstream(&UpstreamMessage::Close(None)).is_none());
    }

    #[test]
    fn test_frame_kind_survives_the_relay() {
        let text = r#"{"realtimeInput":{"mediaChunks":[]}}"#;
        let frame = Frame::from_downstream(&DownstreamMessage::Text(text.into())).unwrap();
        match frame.into_upstream() {
            UpstreamMessage::Text(out) => assert_eq!(out.as_str(), text),
            other => panic!("expected text, got {other:?}"),
        }

        let audio = Bytes::from_static(&[0x00, 0x7f, 0x80, 0xff]);
        let frame = Frame::from_upstream(&UpstreamMessage::Binary(audio.clone())).unwrap();
        assert_eq!(frame.len(), 4);
        match frame.into_downstream() {
            DownstreamMessage::Binary(out) => assert_eq!(out, audio),
            other => panic!("expected binary, got {other:?}"),
        }
    }
}
