//! Reconnect orchestrator.
//!
//! Runs sessions back to back until stopped. Every way a session can end
//! (remote close, transport error, idle timeout, forced refresh) converges
//! on the same path: shut the session down, wait the fixed backoff, connect
//! again. Only one session is ever live.

use std::sync::Arc;

use lgwatch_core::constants::{MONITOR_STARTED, MONITOR_STOPPED, MONITOR_TITLE};
use lgwatch_core::{Identity, SeenSet};
use lgwatch_notify::Notifier;
use lgwatch_settings::{TimingSettings, WatchSettings};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::handler::MessageHandler;
use crate::heartbeat::{KeepAlive, keep_alive_for};
use crate::lifecycle::{ConnectionState, LifecycleEvent, transition};
use crate::liveness::{RefreshClock, refresh_clock, restamp_if_stale};
use crate::session::{Session, SessionEnd};
use crate::stats::{Counters, OrchestratorStats};
use crate::transport::Connector;

/// Control surface for a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    stop: CancellationToken,
    state_rx: watch::Receiver<ConnectionState>,
    counters: Arc<Counters>,
}

impl OrchestratorHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Request shutdown. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Whether a stop was requested.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> OrchestratorStats {
        self.counters.snapshot()
    }
}

/// Owns the SeenSet, the refresh clock and the reconnect loop.
pub struct Orchestrator {
    connector: Arc<dyn Connector>,
    identity: Arc<Identity>,
    notifier: Arc<dyn Notifier>,
    handler: MessageHandler,
    timing: TimingSettings,
    keep_alive: Arc<dyn KeepAlive>,
    refresh: RefreshClock,
    stop: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
    counters: Arc<Counters>,
}

impl Orchestrator {
    /// Build an orchestrator; nothing connects until [`Self::run`].
    pub fn new(
        connector: Arc<dyn Connector>,
        identity: Arc<Identity>,
        notifier: Arc<dyn Notifier>,
        settings: &WatchSettings,
    ) -> Self {
        let counters = Arc::new(Counters::default());
        let handler = MessageHandler::new(
            identity.clone(),
            SeenSet::new(settings.dedup.policy()),
            notifier.clone(),
            settings.notify.message_title.clone(),
            counters.clone(),
        );
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            identity,
            notifier,
            handler,
            timing: settings.timing.clone(),
            keep_alive: keep_alive_for(&settings.keep_alive),
            refresh: refresh_clock(),
            stop: CancellationToken::new(),
            state_tx,
            counters,
        }
    }

    /// Handle for observing and stopping this orchestrator.
    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            stop: self.stop.clone(),
            state_rx: self.state_tx.subscribe(),
            counters: self.counters.clone(),
        }
    }

    /// Run on a new task.
    pub fn spawn(self) -> (OrchestratorHandle, JoinHandle<OrchestratorStats>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Connect, watch, reconnect; return once stopped.
    ///
    /// The first connect is immediate. Each later one waits the fixed
    /// backoff, whatever ended the previous session.
    pub async fn run(mut self) -> OrchestratorStats {
        info!(uid = self.identity.uid(), keep_alive = self.keep_alive.name(), "watcher starting");
        self.notifier.notify(MONITOR_TITLE, MONITOR_STARTED).await;
        self.apply(&LifecycleEvent::Start);

        loop {
            let attempt = tokio::select! {
                biased;
                () = self.stop.cancelled() => break,
                result = Session::open(self.connector.as_ref(), &self.identity, &self.stop) => result,
            };

            match attempt {
                Ok(mut session) => {
                    self.counters.session_opened();
                    self.apply(&LifecycleEvent::Opened);
                    if restamp_if_stale(&self.refresh, self.timing.force_reconnect_interval()) {
                        debug!(connection_id = %session.id(), "refresh clock stale after outage, restamped");
                    }
                    session.spawn_background(&self.timing, self.keep_alive.clone(), self.refresh.clone());
                    let end = session.run(&mut self.handler).await;
                    let connection_id = session.id().clone();
                    session.shutdown().await;
                    match end {
                        SessionEnd::Stopped => break,
                        SessionEnd::Closed(cause) => {
                            info!(%connection_id, cause = cause.label(), ?cause, "session closed");
                            self.apply(&LifecycleEvent::Closed(cause));
                        }
                        SessionEnd::Failed(e) => {
                            warn!(%connection_id, error_kind = e.error_kind(), error = %e, "session failed");
                            self.apply(&LifecycleEvent::Error(e));
                        }
                    }
                }
                Err(e) => {
                    warn!(error_kind = e.error_kind(), error = %e, "connect failed");
                    self.counters.connect_failed();
                    self.apply(&LifecycleEvent::ConnectFailed(e));
                }
            }

            let backoff = self.timing.reconnect_backoff();
            debug!(?backoff, "reconnecting after backoff");
            tokio::select! {
                biased;
                () = self.stop.cancelled() => break,
                () = time::sleep(backoff) => {}
            }
            self.apply(&LifecycleEvent::BackoffElapsed);
        }

        self.apply(&LifecycleEvent::StopRequested);
        self.notifier.notify(MONITOR_TITLE, MONITOR_STOPPED).await;
        let stats = self.counters.snapshot();
        info!(
            sessions = stats.sessions_opened,
            notifications = stats.notifications_delivered,
            seen_ids = self.handler.seen().len(),
            "watcher stopped"
        );
        stats
    }

    fn apply(&self, event: &LifecycleEvent) {
        let _ = self.state_tx.send_if_modified(|state| {
            let next = transition(*state, event);
            if next == *state {
                return false;
            }
            debug!(from = %state, to = %next, "state change");
            *state = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lgwatch_core::TransportError;
    use lgwatch_notify::{Notification, RecordingNotifier};
    use lgwatch_settings::KeepAliveMode;
    use tokio::time::Instant;

    use crate::mock::{MockConnect, MockConnector, MockRemote};
    use crate::transport::Outbound;

    const ALICE_HI: &str = r#"{"_ws_type":"server_broadcast","message":{"id":"m1","sender":{"uid":"42","name":"Alice"},"content":"hi"}}"#;
    const BOB_YO: &str = r#"{"_ws_type":"server_broadcast","message":{"id":"m2","sender":{"uid":"43","name":"Bob"},"content":"yo"}}"#;
    const OWN: &str = r#"{"_ws_type":"server_broadcast","message":{"id":"m3","sender":{"uid":"7","name":"Me"},"content":"mine"}}"#;

    struct Harness {
        connector: Arc<MockConnector>,
        remotes: tokio::sync::mpsc::UnboundedReceiver<MockRemote>,
        recorder: RecordingNotifier,
        handle: OrchestratorHandle,
        task: JoinHandle<OrchestratorStats>,
        start: Instant,
    }

    impl Harness {
        fn start(settings: &WatchSettings, script: Vec<MockConnect>) -> Self {
            let (connector, remotes) = MockConnector::scripted(script);
            let connector = Arc::new(connector);
            let recorder = RecordingNotifier::new();
            let orchestrator = Orchestrator::new(
                connector.clone(),
                Arc::new(Identity::new("abc", "7").unwrap()),
                Arc::new(recorder.clone()),
                settings,
            );
            let start = Instant::now();
            let (handle, task) = orchestrator.spawn();
            Self { connector, remotes, recorder, handle, task, start }
        }

        async fn next_remote(&mut self) -> MockRemote {
            self.remotes.recv().await.unwrap()
        }

        async fn stop(self) -> (OrchestratorStats, RecordingNotifier) {
            self.handle.stop();
            (self.task.await.unwrap(), self.recorder)
        }
    }

    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    fn bodies(recorder: &RecordingNotifier) -> Vec<String> {
        recorder.notifications().into_iter().map(|n| n.body).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn first_connect_is_immediate_and_state_reaches_connected() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let remote = h.next_remote().await;
        assert_eq!(remote.opened_at(), h.start);
        settle().await;
        assert_eq!(h.handle.state(), ConnectionState::Connected);
        assert_eq!(h.handle.stats().sessions_opened, 1);
        let _ = h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_reconnects_once_after_backoff() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let _first = h.next_remote().await;
        let second = h.next_remote().await;
        // Idle breach at 70s, plus the 5s backoff.
        assert_eq!(second.opened_at() - h.start, Duration::from_secs(75));

        let third = time::timeout(Duration::from_secs(30), h.remotes.recv()).await;
        assert!(third.is_err(), "a single breach reconnects once");
        assert_eq!(h.connector.attempts(), 2);
        let _ = h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn forced_refresh_repeats_on_schedule() {
        let mut settings = WatchSettings::default();
        settings.timing.idle_timeout_ms = 3_600_000;
        let mut h = Harness::start(&settings, vec![]);
        let _first = h.next_remote().await;
        let second = h.next_remote().await;
        assert_eq!(second.opened_at() - h.start, Duration::from_secs(635));
        let third = h.next_remote().await;
        assert_eq!(third.opened_at() - h.start, Duration::from_secs(1240));
        let _ = h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn forced_refresh_still_fires_under_continuous_traffic() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let first = h.next_remote().await;
        let feeder = tokio::spawn(async move {
            while !first.is_closed() {
                first.push_text(r#"{"_ws_type":"heartbeat"}"#);
                time::sleep(Duration::from_secs(5)).await;
            }
        });
        // Traffic every 5s keeps the idle timer quiet; the refresh still
        // fires at the 630s check.
        let second = h.next_remote().await;
        assert_eq!(second.opened_at() - h.start, Duration::from_secs(635));
        feeder.await.unwrap();
        let (stats, _) = h.stop().await;
        assert_eq!(stats.sessions_opened, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn session_after_long_outage_gets_a_full_refresh_interval() {
        let mut settings = WatchSettings::default();
        settings.timing.idle_timeout_ms = 3_600_000;
        let refused = || MockConnect::Fail(TransportError::Connect("refused".into()));
        let mut h = Harness::start(&settings, (0..200).map(|_| refused()).collect());
        let first = h.next_remote().await;
        assert_eq!(first.opened_at() - h.start, Duration::from_secs(1000));
        let second = h.next_remote().await;
        assert_eq!(second.opened_at() - first.opened_at(), Duration::from_secs(635));
        let (stats, _) = h.stop().await;
        assert_eq!(stats.connect_failures, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_reconnects_after_backoff() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let first = h.next_remote().await;
        time::sleep(Duration::from_secs(2)).await;
        first.fail(TransportError::Receive("connection reset".into()));
        let second = h.next_remote().await;
        assert_eq!(second.opened_at() - h.start, Duration::from_secs(7));
        assert!(first.is_closed());
        let _ = h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn remote_close_reconnects_after_backoff() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let first = h.next_remote().await;
        drop(first);
        let second = h.next_remote().await;
        assert_eq!(second.opened_at() - h.start, Duration::from_secs(5));
        let _ = h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connects_retry_at_fixed_backoff() {
        let refused = || MockConnect::Fail(TransportError::Connect("refused".into()));
        let mut h = Harness::start(&WatchSettings::default(), vec![refused(), refused()]);
        let remote = h.next_remote().await;
        assert_eq!(remote.opened_at() - h.start, Duration::from_secs(10));
        assert_eq!(h.connector.attempts(), 3);
        let (stats, _) = h.stop().await;
        assert_eq!(stats.connect_failures, 2);
        assert_eq!(stats.sessions_opened, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn join_is_sent_once_per_session() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let mut first = h.next_remote().await;
        settle().await;
        let join = Outbound::Text(
            r#"{"type":"join_channel","channel":"chat","channel_param":"7","exclusive_key":null}"#.into(),
        );
        assert_eq!(first.sent(), vec![join.clone()]);
        drop(first);
        let mut second = h.next_remote().await;
        settle().await;
        assert_eq!(second.sent(), vec![join]);
        let _ = h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ping_keep_alive_goes_through_the_session() {
        let mut settings = WatchSettings::default();
        settings.keep_alive = KeepAliveMode::Ping;
        let mut h = Harness::start(&settings, vec![]);
        let mut remote = h.next_remote().await;
        time::sleep(Duration::from_secs(41)).await;
        let sent = remote.sent();
        assert!(matches!(sent[0], Outbound::Text(_)));
        assert_eq!(&sent[1..], &[Outbound::Ping, Outbound::Ping, Outbound::Ping]);
        let _ = h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dedup_spans_reconnects() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let first = h.next_remote().await;
        first.push_text(ALICE_HI);
        first.push_text(ALICE_HI);
        settle().await;
        drop(first);

        let second = h.next_remote().await;
        second.push_text(ALICE_HI);
        second.push_text(BOB_YO);
        settle().await;

        let (stats, recorder) = h.stop().await;
        assert_eq!(
            bodies(&recorder),
            vec![MONITOR_STARTED, "Alice: hi", "Bob: yo", MONITOR_STOPPED]
        );
        assert_eq!(recorder.notifications()[1], Notification::new("洛谷新消息", "Alice: hi"));
        assert_eq!(stats.notifications_delivered, 2);
        assert_eq!(stats.duplicates_suppressed, 2);
        assert_eq!(stats.sessions_opened, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn own_and_malformed_messages_do_not_notify() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let remote = h.next_remote().await;
        remote.push_text(OWN);
        remote.push_text("{broken");
        remote.push_text(r#"{"_ws_type":"join_result","result":"success"}"#);
        remote.push_text(ALICE_HI);
        settle().await;

        let (stats, recorder) = h.stop().await;
        assert_eq!(bodies(&recorder), vec![MONITOR_STARTED, "Alice: hi", MONITOR_STOPPED]);
        assert_eq!(stats.self_echoes_suppressed, 1);
        // The malformed frame did not end the session.
        assert_eq!(stats.sessions_opened, 1);
        assert!(remote.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_the_session_and_notifies() {
        let mut h = Harness::start(&WatchSettings::default(), vec![]);
        let remote = h.next_remote().await;
        let states = h.handle.subscribe();
        let handle = h.handle.clone();
        let (stats, recorder) = h.stop().await;

        assert!(remote.is_closed());
        assert_eq!(handle.state(), ConnectionState::Stopping);
        assert!(handle.is_stopping());
        assert_eq!(*states.borrow(), ConnectionState::Stopping);
        assert_eq!(stats.sessions_opened, 1);
        assert_eq!(
            recorder.notifications(),
            vec![
                Notification::new(MONITOR_TITLE, MONITOR_STARTED),
                Notification::new(MONITOR_TITLE, MONITOR_STOPPED),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_backoff_returns_promptly() {
        let refused = MockConnect::Fail(TransportError::Connect("refused".into()));
        let h = Harness::start(&WatchSettings::default(), vec![refused]);
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.handle.state(), ConnectionState::Disconnected);
        let start = h.start;
        let connector = h.connector.clone();
        let _ = h.stop().await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(connector.attempts(), 1);
    }
}
