//! Primary channel: desktop toast notifications.

use async_trait::async_trait;
use lgwatch_core::NotifyError;
use lgwatch_core::constants::{NAME, WINDOWS_TOAST_APP_ID};
use std::path::Path;

use crate::command::{CommandSpec, DELIVERY_GRACE, Platform, find_program, run_with_grace};
use crate::icon::IconCache;
use crate::notifier::{DeliveryChannel, Notification};

const CHANNEL: &str = "toast";

/// Build the toast helper invocation for `platform`.
///
/// The icon is only honoured by `notify-send`.
pub fn toast_command(
    platform: Platform,
    notification: &Notification,
    duration_secs: u64,
    icon: Option<&Path>,
) -> CommandSpec {
    match platform {
        Platform::Linux => {
            let mut spec = CommandSpec::new("notify-send")
                .arg(format!("--app-name={NAME}"))
                .arg(format!("--expire-time={}", duration_secs.saturating_mul(1000)));
            if let Some(icon) = icon {
                spec = spec.arg(format!("--icon={}", icon.display()));
            }
            spec.arg("--")
                .arg(notification.title.as_str())
                .arg(notification.body.as_str())
        }
        Platform::MacOs => CommandSpec::new("osascript").arg("-e").arg(format!(
            "display notification {} with title {}",
            applescript_string(&notification.body),
            applescript_string(&notification.title)
        )),
        Platform::Windows => CommandSpec::new("powershell")
            .arg("-NoProfile")
            .arg("-NonInteractive")
            .arg("-Command")
            .arg(windows_toast_script(notification, duration_secs)),
    }
}

fn windows_toast_script(notification: &Notification, duration_secs: u64) -> String {
    format!(
        "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null; \
         $t = [Windows.UI.Notifications.ToastNotificationManager]::GetTemplateContent([Windows.UI.Notifications.ToastTemplateType]::ToastText02); \
         $x = $t.GetElementsByTagName('text'); \
         $x.Item(0).AppendChild($t.CreateTextNode({title})) | Out-Null; \
         $x.Item(1).AppendChild($t.CreateTextNode({body})) | Out-Null; \
         $n = [Windows.UI.Notifications.ToastNotification]::new($t); \
         $n.ExpirationTime = [DateTimeOffset]::Now.AddSeconds({duration_secs}); \
         [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier({app_id}).Show($n)",
        app_id = powershell_string(WINDOWS_TOAST_APP_ID),
        title = powershell_string(&notification.title),
        body = powershell_string(&notification.body),
    )
}

/// Quote `s` as an AppleScript string literal.
pub(crate) fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote `s` as a single-quoted PowerShell literal.
pub(crate) fn powershell_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Toast delivery through the platform helper.
pub struct ToastChannel {
    enabled: bool,
    platform: Platform,
    duration_secs: u64,
    icon: Option<IconCache>,
}

impl ToastChannel {
    /// New toast channel.
    pub fn new(enabled: bool, platform: Platform, duration_secs: u64, icon: Option<IconCache>) -> Self {
        Self {
            enabled,
            platform,
            duration_secs,
            icon,
        }
    }
}

#[async_trait]
impl DeliveryChannel for ToastChannel {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        if !self.enabled {
            return Err(NotifyError::Unavailable {
                channel: CHANNEL,
                reason: "disabled in settings".into(),
            });
        }
        let helper = toast_command(self.platform, notification, self.duration_secs, None);
        if find_program(&helper.program).is_none() {
            return Err(NotifyError::Unavailable {
                channel: CHANNEL,
                reason: format!("{} not found on PATH", helper.program),
            });
        }

        let icon = match (&self.icon, self.platform) {
            (Some(cache), Platform::Linux) => cache.resolve().await,
            _ => None,
        };
        let spec = toast_command(self.platform, notification, self.duration_secs, icon.as_deref());
        run_with_grace(CHANNEL, &spec, DELIVERY_GRACE).await
    }
}
