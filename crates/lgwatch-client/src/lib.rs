//! # lgwatch-client
//!
//! Keeps one authenticated WebSocket session to the Luogu realtime endpoint
//! alive for as long as the process runs.
//!
//! - [`transport`]: the [`Connector`]/[`Link`] seam and the tungstenite impl
//! - [`session`]: join directive, receive loop, background tasks
//! - [`heartbeat`] and [`liveness`]: keep-alive, idle and forced-refresh timers
//! - [`handler`]: frame to notification, with self-echo and duplicate suppression
//! - [`orchestrator`]: the reconnect loop and its [`OrchestratorHandle`]
//! - [`mock`]: scripted in-memory transport for tests

#![deny(unsafe_code)]

pub mod handler;
pub mod heartbeat;
pub mod lifecycle;
pub mod liveness;
pub mod mock;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod stats;
pub mod transport;

pub use handler::{MessageHandler, Outcome};
pub use heartbeat::{KeepAlive, NoopKeepAlive, PingKeepAlive, TextKeepAlive, keep_alive_for};
pub use lifecycle::{CloseCause, ConnectionState, LifecycleEvent, transition};
pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use session::{Session, SessionEnd};
pub use state::SessionState;
pub use stats::OrchestratorStats;
pub use transport::{Connector, Frame, Link, Outbound, WsConnector};
