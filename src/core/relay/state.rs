use super::CloseReason;

/// Lifecycle of one relay session.
///
/// `UpstreamPending` → `BothOpen` → `Closing` → `Closed`. `Closed` is terminal;
/// a session never reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Downstream is open, the upstream connection is being established
    UpstreamPending,
    /// Both legs are open and frames flow both ways
    BothOpen,
    /// Close frames are being written to the remaining leg(s)
    Closing,
    /// Both legs are closed
    Closed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEvent {
    UpstreamOpened,
    /// The upstream request could not be built
    UpstreamConstructionFailed,
    /// Transport or protocol error on the upstream leg, including a failed connect
    UpstreamError,
    UpstreamClosed,
    DownstreamFrame,
    UpstreamFrame,
    DownstreamClosed,
    IdleTimeout,
    /// All close actions have been carried out
    LegsClosed,
}

/// Side effect the session runs for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    None,
    /// Send the setup message upstream, then flush any pre-open buffer
    SendSetup,
    /// Upstream is not open yet: buffer the frame if there is room, else drop it
    Hold,
    ForwardUpstream,
    ForwardDownstream,
    /// Destination leg is not open: discard the frame
    Drop,
    /// Close the downstream leg; `None` is a plain close
    CloseDownstream(Option<CloseReason>),
    CloseUpstream,
    /// Cancel the upstream connection attempt
    AbandonUpstream,
    /// Close (or abandon) upstream and close downstream with the reason
    CloseBoth(CloseReason),
}

/// Result of feeding one event to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: RelayState,
    pub action: RelayAction,
}

impl Transition {
    fn to(next: RelayState, action: RelayAction) -> Self {
        Self { next, action }
    }

    fn stay(state: RelayState, action: RelayAction) -> Self {
        Self {
            next: state,
            action,
        }
    }
}

impl RelayState {
    /// Transition table.
    ///
    /// Each leg is closed at most once: only the transitions out of
    /// `UpstreamPending` and `BothOpen` carry close actions, and they all
    /// move to `Closing`, where every further event is ignored.
    pub fn on(self, event: RelayEvent) -> Transition {
        use RelayAction as A;
        use RelayEvent as E;
        use RelayState as S;

        match (self, event) {
            (S::UpstreamPending, E::UpstreamOpened) => Transition::to(S::BothOpen, A::SendSetup),
            (S::UpstreamPending, E::UpstreamConstructionFailed) => Transition::to(
                S::Closing,
                A::CloseDownstream(Some(CloseReason::UpstreamConnectFailed)),
            ),
            (S::UpstreamPending, E::UpstreamError) => Transition::to(
                S::Closing,
                A::CloseDownstream(Some(CloseReason::UpstreamError)),
            ),
            (S::UpstreamPending, E::UpstreamClosed) => {
                Transition::to(S::Closing, A::CloseDownstream(None))
            }
            (S::UpstreamPending, E::DownstreamFrame) => Transition::stay(self, A::Hold),
            (S::UpstreamPending, E::UpstreamFrame) => Transition::stay(self, A::Drop),
            (S::UpstreamPending, E::DownstreamClosed) => {
                Transition::to(S::Closing, A::AbandonUpstream)
            }
            (S::UpstreamPending, E::IdleTimeout) => {
                Transition::to(S::Closing, A::CloseBoth(CloseReason::IdleTimeout))
            }

            (S::BothOpen, E::DownstreamFrame) => Transition::stay(self, A::ForwardUpstream),
            (S::BothOpen, E::UpstreamFrame) => Transition::stay(self, A::ForwardDownstream),
            (S::BothOpen, E::UpstreamError) => Transition::to(
                S::Closing,
                A::CloseDownstream(Some(CloseReason::UpstreamError)),
            ),
            (S::BothOpen, E::UpstreamClosed) => {
                Transition::to(S::Closing, A::CloseDownstream(None))
            }
            (S::BothOpen, E::DownstreamClosed) => Transition::to(S::Closing, A::CloseUpstream),
            (S::BothOpen, E::IdleTimeout) => {
                Transition::to(S::Closing, A::CloseBoth(CloseReason::IdleTimeout))
            }
            (S::BothOpen, E::UpstreamOpened | E::UpstreamConstructionFailed) => {
                Transition::stay(self, A::None)
            }

            (S::UpstreamPending | S::BothOpen | S::Closing, E::LegsClosed) => {
                Transition::to(S::Closed, A::None)
            }

            (S::Closing | S::Closed, E::DownstreamFrame | E::UpstreamFrame) => {
                Transition::stay(self, A::Drop)
            }
            (S::Closing | S::Closed, _) => Transition::stay(self, A::None),
        }
    }

    /// Whether downstream frames may be forwarded upstream in this state.
    pub fn upstream_open(self) -> bool {
        matches!(self, RelayState::BothOpen)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RelayState::Closed)
    }
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayState::UpstreamPending => write!(f, "downstream-open-upstream-pending"),
            RelayState::BothOpen => write!(f, "both-open"),
            RelayState::Closing => write!(f, "closing"),
            RelayState::Closed => write!(f, "closed"),
        }
    }
}
