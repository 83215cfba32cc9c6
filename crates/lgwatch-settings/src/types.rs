//! Settings types.
//!
//! Every struct is `#[serde(default)]` so a partial user file only needs to
//! name the keys it changes.

use std::path::PathBuf;
use std::time::Duration;

use lgwatch_core::DedupPolicy;
use lgwatch_core::constants::{ICON_URL, MESSAGE_TITLE, ORIGIN, REFERER, USER_AGENT, WS_URL};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchSettings {
    /// Transport endpoint and handshake headers.
    pub endpoint: EndpointSettings,
    /// Heartbeat, liveness and backoff intervals.
    pub timing: TimingSettings,
    /// Keep-alive strategy run by the heartbeat.
    pub keep_alive: KeepAliveMode,
    /// SeenSet retention.
    pub dedup: DedupSettings,
    /// Notification delivery.
    pub notify: NotifySettings,
    /// Diagnostics output.
    pub logging: LoggingSettings,
}

impl WatchSettings {
    /// Reject values the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        for (name, value) in [
            ("timing.heartbeatIntervalMs", t.heartbeat_interval_ms),
            ("timing.idleCheckIntervalMs", t.idle_check_interval_ms),
            ("timing.idleTimeoutMs", t.idle_timeout_ms),
            ("timing.refreshCheckIntervalMs", t.refresh_check_interval_ms),
            ("timing.forceReconnectIntervalMs", t.force_reconnect_interval_ms),
            ("timing.reconnectBackoffMs", t.reconnect_backoff_ms),
        ] {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!("{name} must be non-zero")));
            }
        }
        if self.dedup.capacity == Some(0) {
            return Err(SettingsError::InvalidValue(
                "dedup.capacity must be null or at least 1".into(),
            ));
        }
        if self.endpoint.url.trim().is_empty() {
            return Err(SettingsError::InvalidValue("endpoint.url must not be empty".into()));
        }
        Ok(())
    }
}

/// Where and how to connect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// Secure WebSocket URL.
    pub url: String,
    /// `Origin` header.
    pub origin: String,
    /// `Referer` header.
    pub referer: String,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            url: WS_URL.to_string(),
            origin: ORIGIN.to_string(),
            referer: REFERER.to_string(),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Timer settings, all in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingSettings {
    /// Keep-alive period.
    pub heartbeat_interval_ms: u64,
    /// How often the idle timer checks the last-activity timestamp.
    pub idle_check_interval_ms: u64,
    /// Silence threshold that triggers a reconnect.
    pub idle_timeout_ms: u64,
    /// How often the refresh timer checks the last forced refresh.
    pub refresh_check_interval_ms: u64,
    /// Unconditional reconnect period.
    pub force_reconnect_interval_ms: u64,
    /// Fixed delay between a session ending and the next connect.
    pub reconnect_backoff_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 20_000,
            idle_check_interval_ms: 10_000,
            idle_timeout_ms: 60_000,
            refresh_check_interval_ms: 30_000,
            force_reconnect_interval_ms: 600_000,
            reconnect_backoff_ms: 5_000,
        }
    }
}

impl TimingSettings {
    /// Keep-alive period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Idle timer period.
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }

    /// Idle threshold.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Refresh timer period.
    pub fn refresh_check_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_check_interval_ms)
    }

    /// Forced refresh threshold.
    pub fn force_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.force_reconnect_interval_ms)
    }

    /// Reconnect delay.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

/// Keep-alive action executed on each heartbeat tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum KeepAliveMode {
    /// Do nothing.
    #[default]
    None,
    /// Send a WebSocket ping frame.
    Ping,
    /// Send a fixed text frame.
    Text {
        /// Frame payload.
        payload: String,
    },
}

/// SeenSet retention.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DedupSettings {
    /// Maximum retained ids; `None` keeps every id.
    pub capacity: Option<usize>,
}

impl DedupSettings {
    /// The policy these settings describe.
    pub fn policy(&self) -> DedupPolicy {
        DedupPolicy::from_capacity(self.capacity)
    }
}

/// Notification delivery settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifySettings {
    /// Title of new-message notifications.
    pub message_title: String,
    /// Whether the toast channel may be used.
    pub toast_enabled: bool,
    /// Whether the dialog channel may be used.
    pub dialog_enabled: bool,
    /// How long a toast stays on screen.
    pub toast_duration_secs: u64,
    /// Icon source.
    pub icon_url: String,
    /// Icon cache location. A leading `~/` is expanded.
    pub icon_path: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            message_title: MESSAGE_TITLE.to_string(),
            toast_enabled: true,
            dialog_enabled: true,
            toast_duration_secs: 10,
            icon_url: ICON_URL.to_string(),
            icon_path: "~/.lgwatch/luogu_icon.ico".to_string(),
        }
    }
}

impl NotifySettings {
    /// Icon cache path with `~` expanded.
    pub fn icon_path(&self) -> PathBuf {
        expand_home(&self.icon_path)
    }
}

/// Diagnostics settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter; `RUST_LOG` takes precedence.
    pub level: String,
    /// Log file. A leading `~/` is expanded.
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "~/.lgwatch/logs/luogu_monitor.log".to_string(),
        }
    }
}

impl LoggingSettings {
    /// Log file path with `~` expanded.
    pub fn file_path(&self) -> PathBuf {
        expand_home(&self.file)
    }
}

/// Expand a leading `~/` against `$HOME` (falling back to `/tmp`).
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None if path == "~" => home_dir(),
        None => PathBuf::from(path),
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME").map_or_else(|_| PathBuf::from("/tmp"), PathBuf::from)
}
