//! The notifier capability and its fallback chain.

use std::sync::Arc;

use async_trait::async_trait;
use lgwatch_core::NotifyError;
use lgwatch_settings::NotifySettings;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::command::Platform;
use crate::dialog::DialogChannel;
use crate::icon::IconCache;
use crate::stdout::StdoutChannel;
use crate::toast::ToastChannel;

/// A `(title, body)` pair to surface to the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Headline.
    pub title: String,
    /// Message text.
    pub body: String,
}

impl Notification {
    /// Build a notification.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Surfaces notifications. Never fails observably.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `(title, body)` through whatever channel works.
    async fn notify(&self, title: &str, body: &str);
}

/// One way of reaching the operator.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Short name for log fields.
    fn name(&self) -> &'static str;

    /// Attempt delivery. [`NotifyError::Unavailable`] means the channel was
    /// not tried at all.
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Tries each channel in order until one succeeds.
pub struct FallbackNotifier {
    channels: Vec<Box<dyn DeliveryChannel>>,
}

impl FallbackNotifier {
    /// Chain over `channels`, highest priority first.
    pub fn new(channels: Vec<Box<dyn DeliveryChannel>>) -> Self {
        Self { channels }
    }

    /// Toast, then dialog, then stdout, configured from settings.
    pub fn desktop(settings: &NotifySettings) -> Self {
        let platform = Platform::current();
        let icon = IconCache::new(settings.icon_url.clone(), settings.icon_path());
        Self::new(vec![
            Box::new(ToastChannel::new(
                settings.toast_enabled,
                platform,
                settings.toast_duration_secs,
                Some(icon),
            )),
            Box::new(DialogChannel::new(settings.dialog_enabled, platform)),
            Box::new(StdoutChannel::new()),
        ])
    }

    /// Deliver through the chain, returning the channel that succeeded.
    pub async fn deliver(&self, notification: &Notification) -> Option<&'static str> {
        for channel in &self.channels {
            match channel.deliver(notification).await {
                Ok(()) => {
                    info!(channel = channel.name(), title = %notification.title, body = %notification.body, "notification delivered");
                    return Some(channel.name());
                }
                Err(e @ NotifyError::Unavailable { .. }) => {
                    info!(channel = e.channel(), error = %e, "channel unavailable, falling back");
                }
                Err(e) => {
                    warn!(channel = e.channel(), error = %e, "delivery failed, falling back");
                }
            }
        }
        warn!(title = %notification.title, body = %notification.body, "every notification channel failed");
        None
    }
}

#[async_trait]
impl Notifier for FallbackNotifier {
    async fn notify(&self, title: &str, body: &str) {
        let _ = self.deliver(&Notification::new(title, body)).await;
    }
}

/// Records every notification in memory.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    /// Number of notifications delivered so far.
    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, body: &str) {
        self.seen.lock().push(Notification::new(title, body));
    }
}
