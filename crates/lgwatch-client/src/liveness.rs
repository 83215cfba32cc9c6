//! Liveness monitor: the idle-timeout and forced-refresh timers.
//!
//! Each timer returns [`MonitorOutcome::Triggered`] at most once. The session
//! turns that into its end reason, so a breach yields exactly one reconnect.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::state::SessionState;

/// Why a monitor returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The threshold was exceeded.
    Triggered,
    /// The session or the process is stopping.
    Cancelled,
}

/// Orchestrator-wide timestamp of the last forced refresh.
///
/// Survives reconnects: an idle-timeout reconnect does not reset it.
pub type RefreshClock = Arc<Mutex<Instant>>;

/// A refresh clock stamped now.
pub fn refresh_clock() -> RefreshClock {
    Arc::new(Mutex::new(Instant::now()))
}

/// Restamp `clock` if it is already older than `force_interval`.
///
/// The refresh monitor only runs while a session is open, so a long connect
/// outage leaves the clock stale. Called when a session opens; returns
/// whether the clock was restamped.
pub fn restamp_if_stale(clock: &RefreshClock, force_interval: Duration) -> bool {
    let mut last = clock.lock();
    if last.elapsed() > force_interval {
        *last = Instant::now();
        true
    } else {
        false
    }
}

fn ticker(period: Duration) -> time::Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Every `check_interval`, trigger if connected and silent for longer than
/// `idle_timeout`.
pub async fn run_idle_monitor(
    state: Arc<SessionState>,
    check_interval: Duration,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> MonitorOutcome {
    let mut ticker = ticker(check_interval);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return MonitorOutcome::Cancelled,
            _ = ticker.tick() => {
                let idle = state.idle_for();
                if state.is_connected() && idle > idle_timeout {
                    warn!(idle_secs = idle.as_secs(), threshold_secs = idle_timeout.as_secs(), "no inbound activity, reconnecting");
                    return MonitorOutcome::Triggered;
                }
            }
        }
    }
}

/// Every `check_interval`, trigger if the last forced refresh is older than
/// `force_interval`. Resets the clock when it fires.
pub async fn run_refresh_monitor(
    clock: RefreshClock,
    check_interval: Duration,
    force_interval: Duration,
    cancel: CancellationToken,
) -> MonitorOutcome {
    let mut ticker = ticker(check_interval);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return MonitorOutcome::Cancelled,
            _ = ticker.tick() => {
                let mut last = clock.lock();
                if last.elapsed() > force_interval {
                    *last = Instant::now();
                    drop(last);
                    warn!(interval_secs = force_interval.as_secs(), "forced refresh due, reconnecting");
                    return MonitorOutcome::Triggered;
                }
            }
        }
    }
}
