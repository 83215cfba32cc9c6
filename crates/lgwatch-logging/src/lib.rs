//! # lgwatch-logging
//!
//! `tracing` subscriber setup: a compact stderr layer plus a plain-text file
//! layer written through a non-blocking appender.
//!
//! The file layer is optional at runtime. If the log file cannot be opened the
//! subscriber is installed console-only and a warning is emitted once the
//! console layer is live.

#![deny(unsafe_code)]

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logging configuration.
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Default filter directive (e.g. `info`, `lgwatch_client=debug`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Log file, appended to. `None` disables the file layer.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log file or its directory could not be created.
    #[error("failed to open log file {path}: {source}")]
    File {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The level directive did not parse.
    #[error("invalid log level {0:?}")]
    InvalidLevel(String),

    /// A global subscriber was already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Keeps the file writer alive. Dropping it flushes buffered lines.
#[derive(Debug)]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
    file: Option<PathBuf>,
}

impl LogGuard {
    /// The file being written, if the file layer is active.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// Install the global subscriber.
///
/// Fails only on an unparsable level or a second initialization. A file that
/// cannot be opened degrades to console-only.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard, LoggingError> {
    let filter = build_filter(&config.level, std::env::var("RUST_LOG").ok().as_deref())?;

    let (file_writer, file_error) = match config.file.as_deref().map(open_file_writer) {
        Some(Ok(pair)) => (Some(pair), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let (writer, worker) = match file_writer {
        Some((writer, worker)) => (Some(writer), Some(worker)),
        None => (None, None),
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let file_layer = writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "file logging disabled, continuing with console only");
    }

    let file = worker.as_ref().and(config.file.clone());
    Ok(LogGuard {
        _worker: worker,
        file,
    })
}

/// Build the level filter. A non-empty `rust_log` wins over `level`.
pub fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter, LoggingError> {
    if let Some(directive) = rust_log.filter(|d| !d.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directive) {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(level).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

/// Open `path` for appending (creating parent directories) behind a
/// non-blocking writer.
pub fn open_file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let to_err = |source| LoggingError::File {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(to_err)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    Ok(tracing_appender::non_blocking(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used_without_rust_log() {
        let filter = build_filter("debug", None).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn rust_log_wins() {
        let filter = build_filter("info", Some("lgwatch_client=trace")).unwrap();
        assert_eq!(filter.to_string(), "lgwatch_client=trace");
    }

    #[test]
    fn blank_rust_log_is_ignored() {
        let filter = build_filter("warn", Some("  ")).unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn invalid_level_is_rejected() {
        let err = build_filter("lgwatch=loud", None).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLevel(_)));
    }

    #[test]
    fn file_writer_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/luogu_monitor.log");
        let (_writer, _guard) = open_file_writer(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_writer_fails_under_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let err = open_file_writer(&blocker.join("x.log")).unwrap_err();
        assert!(matches!(err, LoggingError::File { .. }));
        assert!(err.to_string().contains("blocker"));
    }
}
