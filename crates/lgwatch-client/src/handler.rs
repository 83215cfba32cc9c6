//! Inbound frame handling: parse, classify, suppress, deliver.

use std::sync::Arc;

use lgwatch_core::{
    Classified, HandlerError, Identity, ParseError, SeenSet, classify, parse_binary_frame,
    parse_frame,
};
use lgwatch_notify::Notifier;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::stats::Counters;
use crate::transport::Frame;

/// Longest frame excerpt written to the log.
const EXCERPT_CHARS: usize = 200;

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A notification was delivered.
    Delivered {
        /// Id recorded in the SeenSet, if the message had one.
        message_id: Option<String>,
    },
    /// Sent by the watched account itself.
    SelfEcho,
    /// Id already notified.
    Duplicate,
    /// Not a chat broadcast, or a control frame.
    Ignored,
    /// Not decodable as JSON; discarded.
    Malformed,
}

/// Turns frames into notifications.
///
/// Owned by the orchestrator and lent to each session in turn, so the
/// SeenSet spans reconnects.
pub struct MessageHandler {
    identity: Arc<Identity>,
    seen: SeenSet,
    notifier: Arc<dyn Notifier>,
    title: String,
    counters: Arc<Counters>,
}

impl MessageHandler {
    /// New handler notifying under `title`.
    pub fn new(
        identity: Arc<Identity>,
        seen: SeenSet,
        notifier: Arc<dyn Notifier>,
        title: impl Into<String>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            identity,
            seen,
            notifier,
            title: title.into(),
            counters,
        }
    }

    /// Ids notified so far.
    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Process one inbound frame.
    ///
    /// Parse failures are logged and reported as [`Outcome::Malformed`]. A
    /// [`HandlerError`] is returned for the session to log.
    pub async fn handle_frame(&mut self, frame: &Frame) -> Result<Outcome, HandlerError> {
        let parsed = match frame {
            Frame::Text(text) => parse_frame(text).map_err(|e| (e, excerpt(text))),
            Frame::Binary(bytes) => {
                parse_binary_frame(bytes).map_err(|e| (e, excerpt(&String::from_utf8_lossy(bytes))))
            }
            Frame::Ping | Frame::Pong | Frame::Close { .. } => return Ok(Outcome::Ignored),
        };
        match parsed {
            Ok(envelope) => self.handle_envelope(&envelope).await,
            Err((e, excerpt)) => {
                log_malformed(&e, &excerpt);
                Ok(Outcome::Malformed)
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: &Value) -> Result<Outcome, HandlerError> {
        let Classified::Message(message) = classify(envelope)? else {
            return Ok(Outcome::Ignored);
        };

        if self.identity.is_self(&message.sender_uid) {
            debug!(message_id = ?message.id, content = %message.content, "ignoring own message");
            self.counters.self_echo();
            return Ok(Outcome::SelfEcho);
        }

        if let Some(id) = &message.id {
            if !self.seen.check_and_insert(id) {
                debug!(message_id = %id, "already notified, skipping");
                self.counters.duplicate();
                return Ok(Outcome::Duplicate);
            }
        }

        info!(
            message_id = ?message.id,
            sender_uid = %message.sender_uid,
            sender = %message.sender_name,
            content = %message.content,
            "private message received"
        );
        self.notifier
            .notify(&self.title, &message.notification_body())
            .await;
        self.counters.delivered();
        Ok(Outcome::Delivered {
            message_id: message.id,
        })
    }
}

fn log_malformed(error: &ParseError, excerpt: &str) {
    warn!(error = %error, frame = %excerpt, "discarding unparsable frame");
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgwatch_core::DedupPolicy;
    use lgwatch_notify::{Notification, RecordingNotifier};

    const ALICE_HI: &str = r#"{"_ws_type":"server_broadcast","message":{"id":"m1","sender":{"uid":"42","name":"Alice"},"content":"hi"}}"#;

    fn handler_for(uid: &str) -> (MessageHandler, RecordingNotifier) {
        let recorder = RecordingNotifier::new();
        let handler = MessageHandler::new(
            Arc::new(Identity::new("secret", uid).unwrap()),
            SeenSet::new(DedupPolicy::Unbounded),
            Arc::new(recorder.clone()),
            "洛谷新消息",
            Arc::new(Counters::default()),
        );
        (handler, recorder)
    }

    fn text(s: &str) -> Frame {
        Frame::Text(s.to_string())
    }

    #[tokio::test]
    async fn delivers_once_then_suppresses_duplicate() {
        let (mut handler, recorder) = handler_for("7");
        assert_eq!(
            handler.handle_frame(&text(ALICE_HI)).await.unwrap(),
            Outcome::Delivered { message_id: Some("m1".into()) }
        );
        assert_eq!(handler.handle_frame(&text(ALICE_HI)).await.unwrap(), Outcome::Duplicate);
        assert_eq!(
            recorder.notifications(),
            vec![Notification::new("洛谷新消息", "Alice: hi")]
        );
        assert!(handler.seen().contains("m1"));
    }

    #[tokio::test]
    async fn own_messages_are_suppressed() {
        let (mut handler, recorder) = handler_for("42");
        assert_eq!(handler.handle_frame(&text(ALICE_HI)).await.unwrap(), Outcome::SelfEcho);
        assert_eq!(recorder.count(), 0);
        // A self-echo does not consume the id.
        assert!(!handler.seen().contains("m1"));
    }

    #[tokio::test]
    async fn numeric_sender_uid_matches_identity() {
        let (mut handler, recorder) = handler_for("42");
        let frame = text(r#"{"_ws_type":"server_broadcast","message":{"id":"m9","sender":{"uid":42,"name":"Me"},"content":"x"}}"#);
        assert_eq!(handler.handle_frame(&frame).await.unwrap(), Outcome::SelfEcho);
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn messages_without_id_always_notify() {
        let (mut handler, recorder) = handler_for("7");
        let frame = text(r#"{"_ws_type":"server_broadcast","message":{"sender":{"uid":1,"name":"Bob"},"content":"yo"}}"#);
        assert_eq!(
            handler.handle_frame(&frame).await.unwrap(),
            Outcome::Delivered { message_id: None }
        );
        let _ = handler.handle_frame(&frame).await.unwrap();
        assert_eq!(recorder.count(), 2);
        assert!(handler.seen().is_empty());
    }

    #[tokio::test]
    async fn malformed_and_foreign_frames_are_dropped() {
        let (mut handler, recorder) = handler_for("7");
        assert_eq!(handler.handle_frame(&text("not json")).await.unwrap(), Outcome::Malformed);
        assert_eq!(
            handler.handle_frame(&Frame::Binary(vec![0xff, 0x00])).await.unwrap(),
            Outcome::Malformed
        );
        assert_eq!(
            handler.handle_frame(&text(r#"{"_ws_type":"join_result"}"#)).await.unwrap(),
            Outcome::Ignored
        );
        assert_eq!(handler.handle_frame(&Frame::Ping).await.unwrap(), Outcome::Ignored);
        assert_eq!(recorder.count(), 0);
        // Still fully functional afterwards.
        assert!(matches!(
            handler.handle_frame(&text(ALICE_HI)).await.unwrap(),
            Outcome::Delivered { .. }
        ));
    }

    #[tokio::test]
    async fn binary_json_is_accepted() {
        let (mut handler, recorder) = handler_for("7");
        let outcome = handler.handle_frame(&Frame::Binary(ALICE_HI.as_bytes().to_vec())).await.unwrap();
        assert!(matches!(outcome, Outcome::Delivered { .. }));
        assert_eq!(recorder.count(), 1);
    }

    #[tokio::test]
    async fn unexpected_sender_shape_is_a_handler_error() {
        let (mut handler, recorder) = handler_for("7");
        let frame = text(r#"{"_ws_type":"server_broadcast","message":{"id":"m2","sender":[1,2],"content":"x"}}"#);
        assert!(handler.handle_frame(&frame).await.is_err());
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn null_sender_and_structured_id_are_never_notified() {
        let (mut handler, recorder) = handler_for("7");
        let null_sender = text(r#"{"_ws_type":"server_broadcast","message":{"id":"m5","sender":null,"content":"x"}}"#);
        let list_id = text(r#"{"_ws_type":"server_broadcast","message":{"id":["m6"],"sender":{"uid":1,"name":"Bob"},"content":"x"}}"#);
        for _ in 0..2 {
            assert_eq!(
                handler.handle_frame(&null_sender).await,
                Err(HandlerError::UnexpectedField { field: "message.sender", found: "null" })
            );
            assert_eq!(
                handler.handle_frame(&list_id).await,
                Err(HandlerError::UnexpectedField { field: "message.id", found: "array" })
            );
        }
        assert_eq!(recorder.count(), 0);
        assert!(handler.seen().is_empty());
    }

    #[test]
    fn excerpt_truncates_long_frames() {
        let long = "界".repeat(300);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(excerpt("short"), "short");
    }
}
