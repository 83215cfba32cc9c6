//! Process-lifetime counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Sessions that opened and sent their join directive.
    pub sessions_opened: u64,
    /// Connect attempts that failed before a session existed.
    pub connect_failures: u64,
    /// Chat messages handed to the notifier.
    pub notifications_delivered: u64,
    /// Messages dropped because their id was already seen.
    pub duplicates_suppressed: u64,
    /// Messages dropped because this account sent them.
    pub self_echoes_suppressed: u64,
}

/// Live counters shared by the orchestrator, its handle and the handler.
#[derive(Debug, Default)]
pub struct Counters {
    sessions_opened: AtomicU64,
    connect_failures: AtomicU64,
    notifications_delivered: AtomicU64,
    duplicates_suppressed: AtomicU64,
    self_echoes_suppressed: AtomicU64,
}

impl Counters {
    pub(crate) fn session_opened(&self) {
        let _ = self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connect_failed(&self) {
        let _ = self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivered(&self) {
        let _ = self.notifications_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn duplicate(&self) {
        let _ = self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn self_echo(&self) {
        let _ = self.self_echoes_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> OrchestratorStats {
        OrchestratorStats {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            self_echoes_suppressed: self.self_echoes_suppressed.load(Ordering::Relaxed),
        }
    }
}
