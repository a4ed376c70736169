//! Notification dispatch
//!
//! [`Dispatcher`] applies the per-webhook throttle and hands messages to a
//! [`NotificationSink`]. [`WebhookSink`] is the HTTP implementation.

mod dispatcher;
mod error;
mod sink;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::DispatchError;
pub use sink::{NotificationSink, TRUNCATION_MARKER, WebhookSink, truncate_content};

#[cfg(test)]
pub mod mock;
