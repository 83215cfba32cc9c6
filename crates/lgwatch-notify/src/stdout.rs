//! Last-resort channel: a line on standard output.

use std::io::Write;

use async_trait::async_trait;
use lgwatch_core::NotifyError;
use parking_lot::Mutex;

use crate::notifier::{DeliveryChannel, Notification};

const CHANNEL: &str = "stdout";

/// Render the console line for `notification`.
pub fn console_line(notification: &Notification) -> String {
    format!("新消息: {} - {}", notification.title, notification.body)
}

/// Writes notifications to a stream, stdout by default.
pub struct StdoutChannel {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutChannel {
    /// Write to the process's standard output.
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    /// Write to an arbitrary stream.
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for StdoutChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryChannel for StdoutChannel {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut out = self.out.lock();
        writeln!(out, "{}", console_line(notification))
            .and_then(|()| out.flush())
            .map_err(|source| NotifyError::Write {
                channel: CHANNEL,
                source,
            })
    }
}
