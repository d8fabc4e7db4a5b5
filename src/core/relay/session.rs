use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::select;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tracing::{debug, error, info, trace, warn};

use super::frame::Frame;
use super::state::{RelayAction, RelayEvent, RelayState};
use super::upstream::{UpstreamConnector, UpstreamSocket};
use super::{CloseReason, RelayResult};
use crate::config::ServerConfig;

type ConnectFuture = Pin<Box<dyn Future<Output = RelayResult<UpstreamSocket>> + Send>>;
type UpstreamSink = SplitSink<UpstreamSocket, UpstreamMessage>;
type UpstreamStream = SplitStream<UpstreamSocket>;

/// Per-session tunables, read from configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
    /// Close both legs when no data frame crosses the relay for this long
    pub idle_timeout: Option<Duration>,
    /// Downstream frames to hold while the upstream leg is connecting (0 = drop)
    pub preopen_buffer_frames: usize,
}

impl RelayOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            idle_timeout: config.relay_idle_timeout_seconds.map(Duration::from_secs),
            preopen_buffer_frames: config.relay_preopen_buffer_frames,
        }
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub frames_upstream: u64,
    pub frames_downstream: u64,
    pub frames_dropped: u64,
    /// Close reason sent downstream, `None` for a plain close or a client-initiated close
    pub close_reason: Option<CloseReason>,
}

/// What happened on the downstream leg.
enum DownstreamInput {
    Frame(Frame),
    Control,
    Closed,
}

/// What happened on the upstream leg.
enum UpstreamInput {
    Frame(Frame),
    Control,
    Closed,
    Error(String),
}

/// Live handles for both legs.
struct Legs {
    downstream: SplitSink<WebSocket, Message>,
    upstream: Option<UpstreamSink>,
    connecting: Option<ConnectFuture>,
}

/// One relay session: a downstream socket paired with one upstream connection.
///
/// The session owns both legs exclusively and runs on a single task. Every
/// event from either leg goes through [`RelayState::on`]; the returned action
/// is carried out before the next event is read, so the setup message is
/// always the first upstream frame and frames keep their order per direction.
pub struct RelaySession {
    id: String,
    connector: UpstreamConnector,
    options: RelayOptions,
    state: RelayState,
    pending: VecDeque<Frame>,
    stats: RelayStats,
}

impl RelaySession {
    pub fn new(id: impl Into<String>, connector: UpstreamConnector, options: RelayOptions) -> Self {
        Self {
            id: id.into(),
            connector,
            options,
            state: RelayState::UpstreamPending,
            pending: VecDeque::new(),
            stats: RelayStats::default(),
        }
    }

    /// Run the session until both legs are closed.
    ///
    /// The upstream connection is started immediately; downstream frames that
    /// arrive before it opens are held (up to the configured buffer) or dropped.
    pub async fn run(mut self, socket: WebSocket) -> RelayStats {
        let (downstream, mut downstream_rx) = socket.split();
        let mut upstream_rx: Option<UpstreamStream> = None;

        info!(
            session_id = %self.id,
            upstream = %self.connector.redacted_url(),
            model = %self.connector.model(),
            "Relay session started"
        );

        let mut legs = Legs {
            downstream,
            upstream: None,
            connecting: None,
        };

        match self.connector.build_request() {
            Ok(request) => {
                legs.connecting = Some(Box::pin(UpstreamConnector::connect(
                    request,
                    self.connector.connect_timeout(),
                )));
            }
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Failed to build upstream request");
                self.handle(RelayEvent::UpstreamConstructionFailed, None, &mut legs, &mut upstream_rx)
                    .await;
            }
        }

        let mut last_activity = Instant::now();

        while !self.state.is_terminal() {
            let idle_deadline = self.options.idle_timeout.map(|t| last_activity + t);

            let (event, frame) = select! {
                result = wait_connect(&mut legs.connecting) => {
                    legs.connecting = None;
                    match result {
                        Ok(socket) => {
                            let (tx, rx) = socket.split();
                            legs.upstream = Some(tx);
                            upstream_rx = Some(rx);
                            info!(session_id = %self.id, "Connected to upstream");
                            (RelayEvent::UpstreamOpened, None)
                        }
                        Err(e) => {
                            error!(session_id = %self.id, error = %e, "Upstream connection failed");
                            (RelayEvent::UpstreamError, None)
                        }
                    }
                }

                msg = downstream_rx.next() => {
                    match classify_downstream(msg) {
                        DownstreamInput::Frame(frame) => {
                            last_activity = Instant::now();
                            (RelayEvent::DownstreamFrame, Some(frame))
                        }
                        DownstreamInput::Control => continue,
                        DownstreamInput::Closed => {
                            info!(session_id = %self.id, "Client disconnected");
                            (RelayEvent::DownstreamClosed, None)
                        }
                    }
                }

                msg = next_upstream(&mut upstream_rx) => {
                    match classify_upstream(msg) {
                        UpstreamInput::Frame(frame) => {
                            last_activity = Instant::now();
                            (RelayEvent::UpstreamFrame, Some(frame))
                        }
                        UpstreamInput::Control => continue,
                        UpstreamInput::Closed => {
                            info!(session_id = %self.id, "Upstream closed");
                            (RelayEvent::UpstreamClosed, None)
                        }
                        UpstreamInput::Error(e) => {
                            error!(session_id = %self.id, error = %e, "Upstream WebSocket error");
                            (RelayEvent::UpstreamError, None)
                        }
                    }
                }

                _ = idle_expired(idle_deadline) => {
                    warn!(session_id = %self.id, "Relay session idle timeout");
                    (RelayEvent::IdleTimeout, None)
                }
            };

            self.handle(event, frame, &mut legs, &mut upstream_rx).await;
        }

        info!(
            session_id = %self.id,
            frames_upstream = self.stats.frames_upstream,
            frames_downstream = self.stats.frames_downstream,
            frames_dropped = self.stats.frames_dropped,
            "Relay session closed"
        );

        self.stats
    }

    /// Feed an event through the state machine, run the action, and keep going
    /// while actions raise follow-up events.
    async fn handle(
        &mut self,
        event: RelayEvent,
        frame: Option<Frame>,
        legs: &mut Legs,
        upstream_rx: &mut Option<UpstreamStream>,
    ) {
        let mut next = Some((event, frame));

        while let Some((event, frame)) = next.take() {
            let transition = self.state.on(event);
            if transition.next != self.state {
                debug!(
                    session_id = %self.id,
                    from = %self.state,
                    to = %transition.next,
                    ?event,
                    "Relay state transition"
                );
            }
            self.state = transition.next;
            next = self
                .run_action(transition.action, frame, legs, upstream_rx)
                .await
                .map(|event| (event, None));
        }
    }

    async fn run_action(
        &mut self,
        action: RelayAction,
        frame: Option<Frame>,
        legs: &mut Legs,
        upstream_rx: &mut Option<UpstreamStream>,
    ) -> Option<RelayEvent> {
        match action {
            RelayAction::None => None,

            RelayAction::SendSetup => {
                let setup = match self.connector.setup_frame() {
                    Ok(setup) => setup,
                    Err(e) => {
                        error!(session_id = %self.id, error = %e, "Failed to build setup message");
                        return Some(RelayEvent::UpstreamError);
                    }
                };
                if let Err(e) = send_upstream(legs, UpstreamMessage::Text(setup.into())).await {
                    error!(session_id = %self.id, error = %e, "Failed to send setup message");
                    return Some(RelayEvent::UpstreamError);
                }
                debug!(session_id = %self.id, "Setup message sent");

                while let Some(held) = self.pending.pop_front() {
                    if let Err(e) = send_upstream(legs, held.into_upstream()).await {
                        error!(session_id = %self.id, error = %e, "Failed to flush held frame");
                        return Some(RelayEvent::UpstreamError);
                    }
                    self.stats.frames_upstream += 1;
                }
                None
            }

            RelayAction::Hold => {
                if let Some(frame) = frame {
                    if self.pending.len() < self.options.preopen_buffer_frames {
                        self.pending.push_back(frame);
                    } else {
                        self.stats.frames_dropped += 1;
                        debug!(
                            session_id = %self.id,
                            bytes = frame.len(),
                            "Upstream not open, dropping frame"
                        );
                    }
                }
                None
            }

            RelayAction::ForwardUpstream => {
                let frame = frame?;
                trace!(session_id = %self.id, bytes = frame.len(), "client -> upstream");
                match send_upstream(legs, frame.into_upstream()).await {
                    Ok(()) => {
                        self.stats.frames_upstream += 1;
                        None
                    }
                    Err(e) => {
                        error!(session_id = %self.id, error = %e, "Failed to forward frame upstream");
                        Some(RelayEvent::UpstreamError)
                    }
                }
            }

            RelayAction::ForwardDownstream => {
                let frame = frame?;
                trace!(session_id = %self.id, bytes = frame.len(), "upstream -> client");
                match legs.downstream.send(frame.into_downstream()).await {
                    Ok(()) => {
                        self.stats.frames_downstream += 1;
                        None
                    }
                    Err(e) => {
                        debug!(session_id = %self.id, error = %e, "Failed to forward frame to client");
                        Some(RelayEvent::DownstreamClosed)
                    }
                }
            }

            RelayAction::Drop => {
                if frame.is_some() {
                    self.stats.frames_dropped += 1;
                }
                None
            }

            RelayAction::CloseDownstream(reason) => {
                legs.upstream = None;
                *upstream_rx = None;
                self.close_downstream(legs, reason).await;
                Some(RelayEvent::LegsClosed)
            }

            RelayAction::CloseUpstream => {
                self.close_upstream(legs, upstream_rx).await;
                self.finish_downstream(legs).await;
                Some(RelayEvent::LegsClosed)
            }

            RelayAction::AbandonUpstream => {
                if legs.connecting.take().is_some() {
                    debug!(session_id = %self.id, "Abandoned pending upstream connection");
                }
                self.finish_downstream(legs).await;
                Some(RelayEvent::LegsClosed)
            }

            RelayAction::CloseBoth(reason) => {
                legs.connecting = None;
                self.close_upstream(legs, upstream_rx).await;
                self.close_downstream(legs, Some(reason)).await;
                Some(RelayEvent::LegsClosed)
            }
        }
    }

    async fn close_downstream(&mut self, legs: &mut Legs, reason: Option<CloseReason>) {
        self.stats.close_reason = reason;
        let close = Message::Close(reason.map(|r| r.close_frame()));
        if let Err(e) = legs.downstream.send(close).await {
            debug!(session_id = %self.id, error = %e, "Client already gone while closing");
        }
    }

    /// Complete the close handshake the client started and flush it.
    async fn finish_downstream(&mut self, legs: &mut Legs) {
        if let Err(e) = legs.downstream.close().await {
            debug!(session_id = %self.id, error = %e, "Client gone before close reply");
        }
    }

    async fn close_upstream(&mut self, legs: &mut Legs, upstream_rx: &mut Option<UpstreamStream>) {
        if let Some(mut sink) = legs.upstream.take()
            && let Err(e) = sink.send(UpstreamMessage::Close(None)).await
        {
            debug!(session_id = %self.id, error = %e, "Upstream already gone while closing");
        }
        *upstream_rx = None;
    }
}

async fn send_upstream(legs: &mut Legs, message: UpstreamMessage) -> Result<(), tungstenite::Error> {
    match legs.upstream.as_mut() {
        Some(sink) => sink.send(message).await,
        None => Err(tungstenite::Error::AlreadyClosed),
    }
}

async fn wait_connect(connecting: &mut Option<ConnectFuture>) -> RelayResult<UpstreamSocket> {
    match connecting {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_upstream(
    rx: &mut Option<UpstreamStream>,
) -> Option<Result<UpstreamMessage, tungstenite::Error>> {
    match rx {
        Some(rx) => rx.next().await,
        None => std::future::pending().await,
    }
}

async fn idle_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn classify_downstream(msg: Option<Result<Message, axum::Error>>) -> DownstreamInput {
    match msg {
        Some(Ok(Message::Close(frame))) => {
            if let Some(frame) = frame {
                debug!(code = frame.code, reason = %frame.reason.as_str(), "Client sent close frame");
            }
            DownstreamInput::Closed
        }
        Some(Ok(message)) => match Frame::from_downstream(&message) {
            Some(frame) => DownstreamInput::Frame(frame),
            None => DownstreamInput::Control,
        },
        Some(Err(e)) => {
            debug!(error = %e, "Client WebSocket error");
            DownstreamInput::Closed
        }
        None => DownstreamInput::Closed,
    }
}

fn classify_upstream(msg: Option<Result<UpstreamMessage, tungstenite::Error>>) -> UpstreamInput {
    match msg {
        Some(Ok(UpstreamMessage::Close(frame))) => {
            if let Some(frame) = frame {
                info!(code = u16::from(frame.code), reason = %frame.reason.as_str(), "Upstream sent close frame");
            }
            UpstreamInput::Closed
        }
        Some(Ok(message)) => match Frame::from_upstream(&message) {
            Some(frame) => UpstreamInput::Frame(frame),
            None => UpstreamInput::Control,
        },
        // A dropped connection without a close frame ends the session normally
        Some(Err(
            tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake),
        )) => UpstreamInput::Closed,
        Some(Err(e)) => UpstreamInput::Error(e.to_string()),
        None => UpstreamInput::Closed,
    }
}
