//! Error taxonomy for the watcher.
//!
//! Only [`IdentityError`] is ever fatal, and only at startup. Everything else
//! is recoverable and handled at a well-defined boundary:
//!
//! - [`ParseError`]: a malformed inbound frame, discarded by the session
//! - [`HandlerError`]: a well-formed frame the handler could not process,
//!   logged at the session boundary
//! - [`TransportError`]: connection-level failure, ends the session and
//!   triggers a reconnect
//! - [`NotifyError`]: a delivery channel failed, the notifier falls through
//!   to the next channel

use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Inbound frames
// ─────────────────────────────────────────────────────────────────────────────

/// A frame that could not be decoded as JSON.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The frame was not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A binary frame did not contain UTF-8 text.
    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,
}

/// A broadcast frame whose message object could not be processed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// A nested field had a type the handler cannot read.
    #[error("message field `{field}` has unexpected type {found}")]
    UnexpectedField {
        /// Field path inside the message object.
        field: &'static str,
        /// JSON type that was found instead.
        found: &'static str,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Connection-level failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The configured endpoint could not be turned into a request.
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A handshake header value was not representable.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading from the connection failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// An outbound payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl TransportError {
    /// Short classification string for log fields.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint { .. } => "invalid_endpoint",
            Self::InvalidHeader { .. } => "invalid_header",
            Self::Connect(_) => "connect",
            Self::Send(_) => "send",
            Self::Receive(_) => "receive",
            Self::Serialize(_) => "serialize",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notification delivery
// ─────────────────────────────────────────────────────────────────────────────

/// A single delivery channel failed.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The channel cannot be used on this machine.
    #[error("{channel} unavailable: {reason}")]
    Unavailable {
        /// Channel name.
        channel: &'static str,
        /// Why it is unavailable.
        reason: String,
    },

    /// The helper process could not be started.
    #[error("{channel} failed to start: {source}")]
    Spawn {
        /// Channel name.
        channel: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The helper process exited unsuccessfully.
    #[error("{channel} exited with {status}")]
    Exited {
        /// Channel name.
        channel: &'static str,
        /// Rendered exit status.
        status: String,
    },

    /// Writing to the output stream failed.
    #[error("{channel} write failed: {source}")]
    Write {
        /// Channel name.
        channel: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl NotifyError {
    /// Name of the channel that failed.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Unavailable { channel, .. }
            | Self::Spawn { channel, .. }
            | Self::Exited { channel, .. }
            | Self::Write { channel, .. } => channel,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup
// ─────────────────────────────────────────────────────────────────────────────

/// The identity supplied at startup is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// `__client_id` was empty.
    #[error("__client_id is required")]
    MissingClientId,

    /// `_uid` was empty.
    #[error("_uid is required")]
    MissingUid,

    /// `_uid` was not a decimal number.
    #[error("_uid must be numeric, got {0:?}")]
    InvalidUid(String),
}
