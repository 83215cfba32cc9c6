//! # lgwatch-core
//!
//! Foundation types for the Luogu private-message watcher.
//!
//! - **Identity**: the `(__client_id, _uid)` pair used to authenticate and to
//!   recognise self-sent messages
//! - **Envelope**: classification of inbound frames and the outbound join
//!   directive
//! - **Deduplication**: [`dedup::SeenSet`] gating repeat deliveries
//! - **Errors**: the parse / transport / notify / handler taxonomy
//! - **Branded IDs**: [`ids::ConnectionId`] for per-session log correlation
//!
//! Nothing in this crate performs I/O.

#![deny(unsafe_code)]

pub mod constants;
pub mod dedup;
pub mod envelope;
pub mod errors;
pub mod identity;
pub mod ids;

pub use dedup::{DedupPolicy, SeenSet};
pub use envelope::{
    ChatMessage, Classified, JoinDirective, classify, parse_binary_frame, parse_frame,
};
pub use errors::{HandlerError, IdentityError, NotifyError, ParseError, TransportError};
pub use identity::Identity;
pub use ids::ConnectionId;
