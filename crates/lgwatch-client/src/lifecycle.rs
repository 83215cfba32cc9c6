//! Connection lifecycle state machine.
//!
//! The orchestrator feeds every lifecycle event through [`transition`] and
//! publishes the result. Keeping the table pure lets it be tested without a
//! socket.

use std::fmt;

use lgwatch_core::TransportError;

/// Observable orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; waiting to connect.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// A session is open and receiving.
    Connected,
    /// Shutting down; no further reconnects.
    Stopping,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Stopping => "stopping",
        })
    }
}

/// Why a live session ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// The peer closed, or the stream ended.
    Remote {
        /// Close code, if one was sent.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
    /// No inbound activity for longer than the idle timeout.
    IdleTimeout,
    /// The forced-refresh interval elapsed.
    ForcedRefresh,
}

impl CloseCause {
    /// Short label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote_close",
            Self::IdleTimeout => "idle_timeout",
            Self::ForcedRefresh => "forced_refresh",
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The orchestrator began running.
    Start,
    /// The reconnect backoff elapsed.
    BackoffElapsed,
    /// A session opened and the join directive was sent.
    Opened,
    /// A connect attempt failed before a session existed.
    ConnectFailed(TransportError),
    /// The live session failed.
    Error(TransportError),
    /// The live session closed.
    Closed(CloseCause),
    /// An explicit stop was requested.
    StopRequested,
}

/// Next state for `event` in `state`.
///
/// `Stopping` is absorbing. Events that make no sense in the current state
/// leave it unchanged.
pub fn transition(state: ConnectionState, event: &LifecycleEvent) -> ConnectionState {
    use ConnectionState::{Connected, Connecting, Disconnected, Stopping};
    use LifecycleEvent as E;

    match (state, event) {
        (Stopping, _) | (_, E::StopRequested) => Stopping,
        (Disconnected, E::Start | E::BackoffElapsed) => Connecting,
        (Connecting, E::Opened) => Connected,
        (Connecting, E::ConnectFailed(_)) | (Connected, E::Error(_) | E::Closed(_)) => Disconnected,
        (current, _) => current,
    }
}
