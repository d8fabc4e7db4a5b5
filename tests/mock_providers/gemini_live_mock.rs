//! WebSocket Mock Server for Gemini Live
//!
//! Accepts relay connections, records everything it sees as [`MockEvent`]s
//! and answers the setup message with `setupComplete` like the real service.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Reply sent after the setup message.
pub const SETUP_COMPLETE: &str = r#"{"setupComplete":{}}"#;

/// How the mock behaves once a relay connects.
#[derive(Clone, Debug)]
pub enum UpstreamBehavior {
    /// Answer setup, then echo every data frame back
    Echo,
    /// Answer setup, then close with 1000
    CloseAfterSetup,
    /// Read setup, then drop the TCP connection without a close frame
    DropAfterSetup,
    /// Hold the handshake for the given time, then behave like `Echo`
    DelayedEcho(Duration),
}

#[derive(Clone, Debug)]
pub enum MockEvent {
    Connected { conn: usize, uri: String },
    Received { conn: usize, message: Message },
    Closed { conn: usize },
}

pub struct MockGeminiLive {
    pub addr: SocketAddr,
    events: mpsc::UnboundedReceiver<MockEvent>,
}

impl MockGeminiLive {
    pub async fn start(behavior: UpstreamBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let addr = listener.local_addr().unwrap();
        let (tx, events) = mpsc::unbounded_channel();
        let counter = Arc::new(AtomicUsize::new(0));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let conn = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::spawn(handle_connection(stream, conn, behavior.clone(), tx.clone()));
            }
        });

        Self { addr, events }
    }

    /// Endpoint to configure as `GEMINI_LIVE_URL`.
    pub fn url(&self) -> String {
        format!("ws://{}/ws/live", self.addr)
    }

    /// Next event, panicking after five seconds.
    pub async fn next_event(&mut self) -> MockEvent {
        self.try_next_event(Duration::from_secs(5))
            .await
            .expect("Timed out waiting for mock upstream event")
    }

    pub async fn try_next_event(&mut self, wait: Duration) -> Option<MockEvent> {
        tokio::time::timeout(wait, self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// Wait for the next data frame received on any connection.
    pub async fn next_received(&mut self) -> (usize, Message) {
        loop {
            if let MockEvent::Received { conn, message } = self.next_event().await {
                return (conn, message);
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    conn: usize,
    behavior: UpstreamBehavior,
    tx: mpsc::UnboundedSender<MockEvent>,
) {
    if let UpstreamBehavior::DelayedEcho(delay) = behavior {
        tokio::time::sleep(delay).await;
    }

    let mut uri = String::new();
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        uri = req.uri().to_string();
        Ok(resp)
    };
    let Ok(ws_stream) = accept_hdr_async(stream, callback).await else {
        return;
    };
    let _ = tx.send(MockEvent::Connected { conn, uri });

    let (mut write, mut read) = ws_stream.split();
    let mut setup_seen = false;

    while let Some(msg) = read.next().await {
        let Ok(msg) = msg else {
            break;
        };
        match msg {
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            Message::Text(_) | Message::Binary(_) => {}
        }

        let _ = tx.send(MockEvent::Received {
            conn,
            message: msg.clone(),
        });

        if !setup_seen {
            setup_seen = true;
            match behavior {
                UpstreamBehavior::DropAfterSetup => break,
                UpstreamBehavior::CloseAfterSetup => {
                    let _ = write.send(Message::Text(SETUP_COMPLETE.into())).await;
                    let _ = write
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "session ended".into(),
                        })))
                        .await;
                }
                UpstreamBehavior::Echo | UpstreamBehavior::DelayedEcho(_) => {
                    if write.send(Message::Text(SETUP_COMPLETE.into())).await.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        if write.send(msg).await.is_err() {
            break;
        }
    }

    let _ = tx.send(MockEvent::Closed { conn });
}
