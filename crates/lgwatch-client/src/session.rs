//! One connection session, from join directive to shutdown.
//!
//! A session owns its link and three background tasks (heartbeat, idle
//! monitor, refresh monitor). The receive loop is the only writer to the
//! link; background tasks reach it through channels.

use std::future::Future;
use std::sync::Arc;

use lgwatch_core::{ConnectionId, Identity, JoinDirective, TransportError};
use lgwatch_settings::TimingSettings;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::handler::MessageHandler;
use crate::heartbeat::{KeepAlive, OutboundSender, run_heartbeat};
use crate::lifecycle::CloseCause;
use crate::liveness::{MonitorOutcome, RefreshClock, run_idle_monitor, run_refresh_monitor};
use crate::state::SessionState;
use crate::transport::{Connector, Frame, Link, Outbound};

/// Outbound queue depth. Only keep-alives use it.
const OUTBOUND_CAPACITY: usize = 8;

/// How a session's receive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Closed by the peer or by a liveness timer.
    Closed(CloseCause),
    /// The transport failed.
    Failed(TransportError),
    /// A stop was requested.
    Stopped,
}

/// A live connection session.
pub struct Session {
    id: ConnectionId,
    link: Box<dyn Link>,
    state: Arc<SessionState>,
    outbound_tx: OutboundSender,
    outbound_rx: mpsc::Receiver<Outbound>,
    trigger_tx: mpsc::Sender<CloseCause>,
    trigger_rx: mpsc::Receiver<CloseCause>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Connect as `identity` and send the join directive exactly once.
    ///
    /// The session's token is a child of `parent`, so cancelling `parent`
    /// stops the receive loop and every background task.
    pub async fn open(
        connector: &dyn Connector,
        identity: &Identity,
        parent: &CancellationToken,
    ) -> Result<Self, TransportError> {
        let join = JoinDirective::for_identity(identity)
            .to_json()
            .map_err(|e| TransportError::Serialize(e.to_string()))?;

        let mut link = connector.connect(identity).await?;
        if let Err(e) = link.send(Outbound::Text(join)).await {
            link.close().await;
            return Err(e);
        }

        let state = Arc::new(SessionState::new());
        state.set_connected(true);
        state.touch();

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (trigger_tx, trigger_rx) = mpsc::channel(2);
        let id = ConnectionId::new();
        info!(connection_id = %id, uid = identity.uid(), "session opened, joined chat channel");

        Ok(Self {
            id,
            link,
            state,
            outbound_tx,
            outbound_rx,
            trigger_tx,
            trigger_rx,
            cancel: parent.child_token(),
            tasks: Vec::new(),
        })
    }

    /// Session id for log correlation.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Shared connectivity and activity state.
    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Start the heartbeat and both liveness timers.
    pub fn spawn_background(
        &mut self,
        timing: &TimingSettings,
        keep_alive: Arc<dyn KeepAlive>,
        refresh: RefreshClock,
    ) {
        let heartbeat = run_heartbeat(
            self.state.clone(),
            keep_alive,
            self.outbound_tx.clone(),
            timing.heartbeat_interval(),
            self.cancel.clone(),
        );
        self.tasks.push(tokio::spawn(async move {
            let exit = heartbeat.await;
            debug!(?exit, "heartbeat finished");
        }));

        let idle = run_idle_monitor(
            self.state.clone(),
            timing.idle_check_interval(),
            timing.idle_timeout(),
            self.cancel.clone(),
        );
        self.tasks
            .push(spawn_monitor(self.trigger_tx.clone(), CloseCause::IdleTimeout, idle));

        let forced = run_refresh_monitor(
            refresh,
            timing.refresh_check_interval(),
            timing.force_reconnect_interval(),
            self.cancel.clone(),
        );
        self.tasks
            .push(spawn_monitor(self.trigger_tx.clone(), CloseCause::ForcedRefresh, forced));
    }

    /// Receive until the session ends.
    ///
    /// Every inbound frame counts as activity, including control frames and
    /// frames the handler discards.
    pub async fn run(&mut self, handler: &mut MessageHandler) -> SessionEnd {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return SessionEnd::Stopped,
                Some(cause) = self.trigger_rx.recv() => return SessionEnd::Closed(cause),
                Some(message) = self.outbound_rx.recv() => {
                    if let Err(e) = self.link.send(message).await {
                        warn!(connection_id = %self.id, error = %e, "outbound send failed");
                    }
                }
                inbound = self.link.recv() => match inbound {
                    None => {
                        return SessionEnd::Closed(CloseCause::Remote { code: None, reason: String::new() });
                    }
                    Some(Err(e)) => return SessionEnd::Failed(e),
                    Some(Ok(frame)) => {
                        self.state.touch();
                        if let Frame::Close { code, reason } = frame {
                            return SessionEnd::Closed(CloseCause::Remote { code, reason });
                        }
                        if let Err(e) = handler.handle_frame(&frame).await {
                            warn!(connection_id = %self.id, error = %e, "dropping message");
                        }
                    }
                },
            }
        }
    }

    /// Mark disconnected, stop the background tasks and close the link.
    pub async fn shutdown(mut self) {
        self.state.set_connected(false);
        self.cancel.cancel();
        self.link.close().await;
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        debug!(connection_id = %self.id, "session shut down");
    }
}

fn spawn_monitor<F>(trigger: mpsc::Sender<CloseCause>, cause: CloseCause, monitor: F) -> JoinHandle<()>
where
    F: Future<Output = MonitorOutcome> + Send + 'static,
{
    tokio::spawn(async move {
        if monitor.await == MonitorOutcome::Triggered {
            let _ = trigger.try_send(cause);
        }
    })
}
