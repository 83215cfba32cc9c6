//! # lgwatch
//!
//! Watches a Luogu account's private messages and raises a desktop
//! notification for each new one. Runs until Ctrl+C.

#![deny(unsafe_code)]

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use lgwatch_client::{Orchestrator, WsConnector};
use lgwatch_core::Identity;
use lgwatch_core::constants::VERSION;
use lgwatch_logging::{LogConfig, init_logging};
use lgwatch_notify::FallbackNotifier;
use lgwatch_settings::{WatchSettings, load_settings, load_settings_from_path};

/// Luogu private-message watcher.
#[derive(Parser, Debug)]
#[command(name = "lgwatch", version, about = "Desktop notifications for Luogu private messages")]
struct Cli {
    /// Settings file (defaults to `~/.lgwatch/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Value of the `__client_id` cookie.
    #[arg(long, env = "LGWATCH_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// Numeric account id (`_uid` cookie).
    #[arg(long, env = "LGWATCH_UID")]
    uid: Option<String>,

    /// Log level directive; overrides the settings file.
    #[arg(long)]
    log_level: Option<String>,
}

/// Use `given` if present, otherwise ask on the terminal.
fn credential(
    given: Option<String>,
    label: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<String> {
    if let Some(value) = given.filter(|v| !v.trim().is_empty()) {
        return Ok(value);
    }
    write!(output, "请输入 {label}: ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("no value entered for {label}");
    }
    Ok(line.trim().to_string())
}

fn load(cli: &Cli) -> Result<WatchSettings> {
    let settings = match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => load_settings().context("failed to load settings")?,
    };
    Ok(settings)
}

fn log_config(settings: &WatchSettings, level_override: Option<&str>) -> LogConfig {
    let file = (!settings.logging.file.trim().is_empty()).then(|| settings.logging.file_path());
    LogConfig {
        level: level_override.unwrap_or(&settings.logging.level).to_string(),
        file,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        bail!("a TLS crypto provider was already installed");
    }

    let settings = load(&cli)?;
    let _log_guard = init_logging(&log_config(&settings, cli.log_level.as_deref()))
        .context("failed to initialize logging")?;

    let identity = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        let client_id = credential(cli.client_id.clone(), "__client_id", &mut input, &mut output)?;
        let uid = credential(cli.uid.clone(), "_uid", &mut input, &mut output)?;
        Identity::new(&client_id, &uid).context("invalid credentials")?
    };

    tracing::info!(version = VERSION, uid = identity.uid(), endpoint = %settings.endpoint.url, "starting");

    let notifier = Arc::new(FallbackNotifier::desktop(&settings.notify));
    let connector = Arc::new(WsConnector::new(settings.endpoint.clone()));
    let orchestrator = Orchestrator::new(connector, Arc::new(identity), notifier, &settings);
    let (handle, task) = orchestrator.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    tracing::info!(state = %handle.state(), "shutting down");
    handle.stop();
    let stats = task.await.context("watcher task panicked")?;
    tracing::info!(
        sessions = stats.sessions_opened,
        connect_failures = stats.connect_failures,
        notifications = stats.notifications_delivered,
        "shutdown complete"
    );
    Ok(())
}
