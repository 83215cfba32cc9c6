//! Helper-process plumbing shared by the toast and dialog channels.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use lgwatch_core::NotifyError;
use tracing::debug;

/// How long a helper gets to fail before it counts as delivered.
///
/// Modal dialogs block until dismissed; a helper still running after this
/// window is treated as showing its notification and is reaped in the
/// background.
pub const DELIVERY_GRACE: Duration = Duration::from_millis(1500);

/// Target desktop family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Linux and other freedesktop systems.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

/// A helper invocation, built purely so it can be asserted on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name, resolved against `PATH`.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// New spec for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Locate `program` on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{program}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// Run `spec` detached from the terminal and wait up to `grace`.
///
/// Exited successfully or still running after `grace` is `Ok`. A failed
/// spawn or non-zero exit within the window is an error.
pub async fn run_with_grace(
    channel: &'static str,
    spec: &CommandSpec,
    grace: Duration,
) -> Result<(), NotifyError> {
    let mut child = tokio::process::Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| NotifyError::Spawn { channel, source })?;

    debug!(channel, program = %spec.program, "helper spawned");

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|source| NotifyError::Spawn { channel, source })?;
            if status.success() {
                Ok(())
            } else {
                Err(NotifyError::Exited { channel, status: status.to_string() })
            }
        }
        () = tokio::time::sleep(grace) => {
            debug!(channel, program = %spec.program, "helper still running, reaping in background");
            drop(tokio::spawn(async move {
                let _ = child.wait().await;
            }));
            Ok(())
        }
    }
}
