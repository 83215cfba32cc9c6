//! Wire shapes: the inbound broadcast envelope and the outbound join directive.
//!
//! The only inbound shape acted upon is
//!
//! ```json
//! {"_ws_type": "server_broadcast",
//!  "message": {"id": "m1", "sender": {"uid": 42, "name": "Alice"}, "content": "hi"}}
//! ```
//!
//! Everything else is [`Classified::Ignored`]. Field types are read leniently
//! because the server is not consistent about numbers versus strings.

use serde::Serialize;
use serde_json::Value;

use crate::constants::{
    CHAT_CHANNEL, JOIN_CHANNEL_TYPE, SERVER_BROADCAST, UNKNOWN_SENDER, WS_TYPE_FIELD,
};
use crate::errors::{HandlerError, ParseError};
use crate::identity::Identity;

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// A chat message extracted from a broadcast envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Server-assigned message id, when present and non-empty.
    pub id: Option<String>,
    /// Sender uid normalized to a decimal string (`""` when absent).
    pub sender_uid: String,
    /// Sender display name.
    pub sender_name: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Notification body: `"<sender>: <content>"`.
    pub fn notification_body(&self) -> String {
        format!("{}: {}", self.sender_name, self.content)
    }
}

/// Result of classifying a decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classified {
    /// A broadcast carrying a chat message.
    Message(ChatMessage),
    /// Any other envelope.
    Ignored,
}

/// Decode a text frame as JSON.
pub fn parse_frame(text: &str) -> Result<Value, ParseError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a binary frame as UTF-8 JSON.
pub fn parse_binary_frame(bytes: &[u8]) -> Result<Value, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8)?;
    parse_frame(text)
}

/// Classify a decoded envelope.
///
/// Returns [`HandlerError`] when a broadcast's `sender` is not an object
/// (including `null` or missing), or its `id` is an array or object.
pub fn classify(envelope: &Value) -> Result<Classified, HandlerError> {
    if envelope.get(WS_TYPE_FIELD).and_then(Value::as_str) != Some(SERVER_BROADCAST) {
        return Ok(Classified::Ignored);
    }
    let Some(message) = envelope.get("message").and_then(Value::as_object) else {
        return Ok(Classified::Ignored);
    };

    let (sender_uid, sender_name) = match message.get("sender") {
        Some(Value::Object(sender)) => (
            sender.get("uid").map(normalize_scalar).unwrap_or_default(),
            match sender.get("name") {
                Some(Value::String(name)) => name.clone(),
                None | Some(Value::Null) => UNKNOWN_SENDER.to_owned(),
                Some(other) => other.to_string(),
            },
        ),
        other => {
            return Err(HandlerError::UnexpectedField {
                field: "message.sender",
                found: other.map_or("missing", json_type),
            });
        }
    };

    let content = message.get("content").map(normalize_scalar).unwrap_or_default();

    let id = match message.get("id") {
        Some(value @ (Value::Array(_) | Value::Object(_))) => {
            return Err(HandlerError::UnexpectedField {
                field: "message.id",
                found: json_type(value),
            });
        }
        Some(value) => message_id(value),
        None => None,
    };

    Ok(Classified::Message(ChatMessage {
        id,
        sender_uid,
        sender_name,
        content,
    }))
}

/// Render a scalar the way it would print: strings verbatim, `null` as empty.
fn normalize_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Message ids key the SeenSet; empty, `null` and `false` ids are "absent".
fn message_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Subscribes the connection to the account's chat channel.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct JoinDirective {
    #[serde(rename = "type")]
    kind: &'static str,
    channel: &'static str,
    channel_param: String,
    exclusive_key: Option<String>,
}

impl JoinDirective {
    /// The directive sent once after every successful open.
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            kind: JOIN_CHANNEL_TYPE,
            channel: CHAT_CHANNEL,
            channel_param: identity.uid().to_owned(),
            exclusive_key: None,
        }
    }

    /// Serialize to the JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
