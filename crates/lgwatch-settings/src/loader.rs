//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`WatchSettings::default()`]
//! 2. If `~/.lgwatch/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `LGWATCH_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{KeepAliveMode, WatchSettings, expand_home};

/// Resolve the path to the settings file (`~/.lgwatch/settings.json`).
pub fn settings_path() -> PathBuf {
    expand_home("~/.lgwatch/settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<WatchSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid value is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<WatchSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults merged with the user file, without env overrides or validation.
pub fn load_file_layer(path: &Path) -> Result<WatchSettings> {
    let defaults = serde_json::to_value(WatchSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides.
pub fn apply_env_overrides(settings: &mut WatchSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and leave the file/default
/// value in place.
pub fn apply_overrides(settings: &mut WatchSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Endpoint ────────────────────────────────────────────────────
    if let Some(v) = env.string("LGWATCH_WS_URL") {
        settings.endpoint.url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("LGWATCH_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("LGWATCH_LOG_FILE") {
        settings.logging.file = v;
    }

    // ── Timing ──────────────────────────────────────────────────────
    if let Some(v) = env.u64("LGWATCH_HEARTBEAT_INTERVAL_MS", 100, 3_600_000) {
        settings.timing.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.u64("LGWATCH_IDLE_TIMEOUT_MS", 1_000, 86_400_000) {
        settings.timing.idle_timeout_ms = v;
    }
    if let Some(v) = env.u64("LGWATCH_FORCE_RECONNECT_MS", 1_000, 86_400_000) {
        settings.timing.force_reconnect_interval_ms = v;
    }
    if let Some(v) = env.u64("LGWATCH_RECONNECT_BACKOFF_MS", 1, 3_600_000) {
        settings.timing.reconnect_backoff_ms = v;
    }

    // ── Dedup / keep-alive ──────────────────────────────────────────
    if let Some(v) = env.usize("LGWATCH_DEDUP_CAPACITY", 1, usize::MAX) {
        settings.dedup.capacity = Some(v);
    }
    if let Some(v) = env.string("LGWATCH_KEEPALIVE") {
        match parse_keep_alive(&v) {
            Some(mode) => settings.keep_alive = mode,
            None => warn!(key = "LGWATCH_KEEPALIVE", value = %v, "invalid keep-alive mode, ignoring"),
        }
    }

    // ── Notify ──────────────────────────────────────────────────────
    if let Some(v) = env.bool("LGWATCH_TOAST") {
        settings.notify.toast_enabled = v;
    }
    if let Some(v) = env.bool("LGWATCH_DIALOG") {
        settings.notify.dialog_enabled = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a keep-alive mode name. Only the payload-free modes are accepted.
pub fn parse_keep_alive(val: &str) -> Option<KeepAliveMode> {
    match val.to_lowercase().as_str() {
        "none" | "off" => Some(KeepAliveMode::None),
        "ping" => Some(KeepAliveMode::Ping),
        _ => None,
    }
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
