//! In-memory transport for deterministic tests without a socket.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use lgwatch_core::{Identity, TransportError};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::transport::{Connector, Frame, Link, Outbound};

/// Pre-programmed result of one connect attempt.
#[derive(Debug, Clone)]
pub enum MockConnect {
    /// Open a link and hand its far end to the test.
    Accept,
    /// Fail the attempt.
    Fail(TransportError),
}

/// Connector that follows a script, then accepts every further attempt.
pub struct MockConnector {
    script: Mutex<VecDeque<MockConnect>>,
    attempts: AtomicUsize,
    remotes: mpsc::UnboundedSender<MockRemote>,
}

impl MockConnector {
    /// Connector that accepts every attempt.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockRemote>) {
        Self::scripted([])
    }

    /// Connector that plays `script` first.
    ///
    /// The receiver yields the far end of every accepted link.
    pub fn scripted(
        script: impl IntoIterator<Item = MockConnect>,
    ) -> (Self, mpsc::UnboundedReceiver<MockRemote>) {
        let (remotes, rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Mutex::new(script.into_iter().collect()),
            attempts: AtomicUsize::new(0),
            remotes,
        };
        (connector, rx)
    }

    /// Connect attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _identity: &Identity) -> Result<Box<dyn Link>, TransportError> {
        let _ = self.attempts.fetch_add(1, Ordering::Relaxed);
        let next = self.script.lock().pop_front().unwrap_or(MockConnect::Accept);
        if let MockConnect::Fail(e) = next {
            return Err(e);
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let remote = MockRemote {
            inbound: inbound_tx,
            sent: sent_rx,
            closed: closed.clone(),
            opened_at: Instant::now(),
        };
        let _ = self.remotes.send(remote);
        Ok(Box::new(MockLink {
            inbound: inbound_rx,
            sent: sent_tx,
            closed,
        }))
    }
}

/// Far end of a mock link, driven by the test.
///
/// Dropping it ends the stream, which the session sees as a remote close.
pub struct MockRemote {
    inbound: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    sent: mpsc::UnboundedReceiver<Outbound>,
    closed: Arc<AtomicBool>,
    opened_at: Instant,
}

impl MockRemote {
    /// Deliver a frame to the session.
    pub fn push(&self, frame: Frame) {
        let _ = self.inbound.send(Ok(frame));
    }

    /// Deliver a text frame.
    pub fn push_text(&self, text: &str) {
        self.push(Frame::Text(text.to_owned()));
    }

    /// Make the session's next read fail.
    pub fn fail(&self, error: TransportError) {
        let _ = self.inbound.send(Err(error));
    }

    /// Drain everything the session has sent so far.
    pub fn sent(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(message) = self.sent.try_recv() {
            out.push(message);
        }
        out
    }

    /// Whether the session closed its end.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// When the link was opened.
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }
}

struct MockLink {
    inbound: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    sent: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, message: Outbound) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Send("link closed".into()));
        }
        self.sent
            .send(message)
            .map_err(|_| TransportError::Send("remote gone".into()))
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}
