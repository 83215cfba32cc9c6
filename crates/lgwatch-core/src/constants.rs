//! Fixed protocol values and user-facing strings.

/// Current version of the watcher (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name shown by desktop notification daemons.
pub const NAME: &str = "lgwatch";

/// AppUserModelID for Windows toasts (PowerShell's). Windows drops toasts
/// raised under an unregistered id without reporting an error.
pub const WINDOWS_TOAST_APP_ID: &str =
    r"{1AC14E77-02E7-4E5D-B744-2EB1AE5198B7}\WindowsPowerShell\v1.0\powershell.exe";

/// Luogu realtime WebSocket endpoint.
pub const WS_URL: &str = "wss://ws.luogu.com.cn/ws";

/// `Origin` header expected by the endpoint.
pub const ORIGIN: &str = "https://www.luogu.com.cn";

/// `Referer` header expected by the endpoint.
pub const REFERER: &str = "https://www.luogu.com.cn/chat";

/// Browser user agent presented during the handshake.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36 Edg/137.0.0.0";

/// Site favicon, used as the toast icon.
pub const ICON_URL: &str = "https://www.luogu.com.cn/favicon.ico";

/// Cookie carrying the session credential.
pub const CLIENT_ID_COOKIE: &str = "__client_id";

/// Cookie carrying the numeric user id.
pub const UID_COOKIE: &str = "_uid";

/// Channel joined after every open.
pub const CHAT_CHANNEL: &str = "chat";

/// Join directive `type` value.
pub const JOIN_CHANNEL_TYPE: &str = "join_channel";

/// Envelope tag field.
pub const WS_TYPE_FIELD: &str = "_ws_type";

/// Envelope tag for pushed chat messages.
pub const SERVER_BROADCAST: &str = "server_broadcast";

/// Title of a new-message notification.
pub const MESSAGE_TITLE: &str = "洛谷新消息";

/// Title of lifecycle notifications.
pub const MONITOR_TITLE: &str = "洛谷监控";

/// Body of the startup notification.
pub const MONITOR_STARTED: &str = "洛谷私信监控已启动";

/// Body of the shutdown notification.
pub const MONITOR_STOPPED: &str = "洛谷私信监控已停止";

/// Display name used when the sender has none.
pub const UNKNOWN_SENDER: &str = "未知用户";
