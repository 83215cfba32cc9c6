//! Heartbeat emitter and pluggable keep-alive strategies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lgwatch_core::TransportError;
use lgwatch_settings::KeepAliveMode;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::state::SessionState;
use crate::transport::Outbound;

/// Queue into the session's writer.
pub type OutboundSender = mpsc::Sender<Outbound>;

/// The action run on every heartbeat tick.
#[async_trait]
pub trait KeepAlive: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Execute one keep-alive action.
    async fn beat(&self, outbound: &OutboundSender) -> Result<(), TransportError>;
}

/// Does nothing. The endpoint needs no application-level keep-alive.
pub struct NoopKeepAlive;

#[async_trait]
impl KeepAlive for NoopKeepAlive {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn beat(&self, _outbound: &OutboundSender) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Sends a WebSocket ping.
pub struct PingKeepAlive;

#[async_trait]
impl KeepAlive for PingKeepAlive {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn beat(&self, outbound: &OutboundSender) -> Result<(), TransportError> {
        enqueue(outbound, Outbound::Ping)
    }
}

/// Sends a fixed text frame.
pub struct TextKeepAlive {
    payload: String,
}

impl TextKeepAlive {
    /// Keep-alive sending `payload`.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

#[async_trait]
impl KeepAlive for TextKeepAlive {
    fn name(&self) -> &'static str {
        "text"
    }

    async fn beat(&self, outbound: &OutboundSender) -> Result<(), TransportError> {
        enqueue(outbound, Outbound::Text(self.payload.clone()))
    }
}

fn enqueue(outbound: &OutboundSender, message: Outbound) -> Result<(), TransportError> {
    outbound
        .try_send(message)
        .map_err(|e| TransportError::Send(format!("outbound queue unavailable: {e}")))
}

/// Strategy for a configured mode.
pub fn keep_alive_for(mode: &KeepAliveMode) -> Arc<dyn KeepAlive> {
    match mode {
        KeepAliveMode::None => Arc::new(NoopKeepAlive),
        KeepAliveMode::Ping => Arc::new(PingKeepAlive),
        KeepAliveMode::Text { payload } => Arc::new(TextKeepAlive::new(payload.clone())),
    }
}

/// Why the heartbeat loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// The session reported itself disconnected.
    Disconnected,
    /// The session or the process is stopping.
    Cancelled,
}

/// Run `keep_alive` every `interval` while `state` is connected.
///
/// The first beat fires immediately. A failed beat is logged and the loop
/// carries on.
pub async fn run_heartbeat(
    state: Arc<SessionState>,
    keep_alive: Arc<dyn KeepAlive>,
    outbound: OutboundSender,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatExit {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(strategy = keep_alive.name(), ?interval, "heartbeat started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => return HeartbeatExit::Cancelled,
            _ = ticker.tick() => {
                if !state.is_connected() {
                    return HeartbeatExit::Disconnected;
                }
                if let Err(e) = keep_alive.beat(&outbound).await {
                    warn!(strategy = keep_alive.name(), error = %e, "keep-alive failed");
                }
            }
        }
    }
}
