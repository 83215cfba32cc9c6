//! Per-session shared state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Connectivity flag and last-activity timestamp for one session.
///
/// Written by the receive loop, read by the heartbeat and liveness tasks.
pub struct SessionState {
    connected: AtomicBool,
    last_activity: Mutex<Instant>,
}

impl SessionState {
    /// Fresh state: disconnected, activity stamped now.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Whether the session is live.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Update the connectivity flag.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Record inbound activity.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let state = SessionState::new();
        assert!(!state.is_connected());
        state.set_connected(true);
        assert!(state.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn touch_resets_idle_time() {
        let state = SessionState::new();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(state.idle_for() >= Duration::from_secs(30));
        state.touch();
        assert_eq!(state.idle_for(), Duration::ZERO);
    }
}
