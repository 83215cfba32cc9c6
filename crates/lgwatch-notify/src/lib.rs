//! # lgwatch-notify
//!
//! The [`Notifier`] capability and its desktop implementation.
//!
//! [`FallbackNotifier`] walks an ordered list of [`DeliveryChannel`]s:
//! a platform toast (with a cached site icon), a modal dialog, and finally a
//! line on stdout. A channel that is disabled or whose helper is missing from
//! `PATH` is skipped; one that fails hands over to the next. `notify()` never
//! returns an error.

#![deny(unsafe_code)]

pub mod command;
pub mod dialog;
pub mod icon;
pub mod notifier;
pub mod stdout;
pub mod toast;

pub use command::{CommandSpec, Platform};
pub use dialog::DialogChannel;
pub use icon::{IconCache, IconError};
pub use notifier::{DeliveryChannel, FallbackNotifier, Notification, Notifier, RecordingNotifier};
pub use stdout::StdoutChannel;
pub use toast::ToastChannel;
