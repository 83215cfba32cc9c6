//! Fallback channel: a modal system dialog.

use async_trait::async_trait;
use lgwatch_core::NotifyError;

use crate::command::{CommandSpec, DELIVERY_GRACE, Platform, find_program, run_with_grace};
use crate::notifier::{DeliveryChannel, Notification};
use crate::toast::{applescript_string, powershell_string};

const CHANNEL: &str = "dialog";

/// Dialog helpers for `platform`, in order of preference.
pub fn dialog_commands(platform: Platform, notification: &Notification) -> Vec<CommandSpec> {
    let Notification { title, body } = notification;
    match platform {
        Platform::Linux => vec![
            CommandSpec::new("zenity")
                .arg("--info")
                .arg("--no-markup")
                .arg(format!("--title={title}"))
                .arg(format!("--text={body}")),
            CommandSpec::new("kdialog")
                .arg("--title")
                .arg(title.as_str())
                .arg("--msgbox")
                .arg(body.as_str()),
        ],
        Platform::MacOs => vec![CommandSpec::new("osascript").arg("-e").arg(format!(
            "display dialog {} with title {} buttons {{\"OK\"}} default button \"OK\" with icon note",
            applescript_string(body),
            applescript_string(title)
        ))],
        Platform::Windows => vec![
            CommandSpec::new("powershell")
                .arg("-NoProfile")
                .arg("-NonInteractive")
                .arg("-Command")
                .arg(format!(
                    "Add-Type -AssemblyName PresentationFramework; \
                     [System.Windows.MessageBox]::Show({}, {}, 'OK', 'Information') | Out-Null",
                    powershell_string(body),
                    powershell_string(title)
                )),
        ],
    }
}

/// Modal dialog delivery.
pub struct DialogChannel {
    enabled: bool,
    platform: Platform,
}

impl DialogChannel {
    /// New dialog channel.
    pub fn new(enabled: bool, platform: Platform) -> Self {
        Self { enabled, platform }
    }
}

#[async_trait]
impl DeliveryChannel for DialogChannel {
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
        let candidates = dialog_commands(self.platform, notification);
        let Some(spec) = candidates.iter().find(|c| find_program(&c.program).is_some()) else {
            let tried: Vec<&str> = candidates.iter().map(|c| c.program.as_str()).collect();
            return Err(NotifyError::Unavailable {
                channel: CHANNEL,
                reason: format!("none of {} found on PATH", tried.join(", ")),
            });
        };
        run_with_grace(CHANNEL, spec, DELIVERY_GRACE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn linux_prefers_zenity_then_kdialog() {
        let n = Notification::new("洛谷新消息", "Alice: <b>hi</b>");
        let specs = dialog_commands(Platform::Linux, &n);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].program, "zenity");
        assert!(specs[0].args.contains(&"--no-markup".to_string()));
        assert!(specs[0].args.contains(&"--text=Alice: <b>hi</b>".to_string()));
        assert_eq!(specs[1].program, "kdialog");
        assert_eq!(specs[1].args, vec!["--title", "洛谷新消息", "--msgbox", "Alice: <b>hi</b>"]);
    }

    #[test]
    fn macos_dialog_script() {
        let n = Notification::new("T", "B");
        let specs = dialog_commands(Platform::MacOs, &n);
        assert_eq!(
            specs[0].args[1],
            r#"display dialog "B" with title "T" buttons {"OK"} default button "OK" with icon note"#
        );
    }

    #[test]
    fn windows_dialog_uses_message_box() {
        let n = Notification::new("T", "B");
        let script = dialog_commands(Platform::Windows, &n)[0].args.last().cloned().unwrap();
        assert!(script.contains("MessageBox]::Show('B', 'T', 'OK', 'Information')"));
    }

    #[tokio::test]
    async fn disabled_dialog_is_unavailable() {
        let channel = DialogChannel::new(false, Platform::Linux);
        assert_matches!(
            channel.deliver(&Notification::new("t", "b")).await,
            Err(NotifyError::Unavailable { channel: "dialog", .. })
        );
    }
}
