//! Per-webhook throttle gate in front of a notification sink

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::error::DispatchError;
use super::sink::NotificationSink;
use crate::domain::Webhook;
use crate::scan::{BranchKey, ScanState, SharedState, WebhookKey};

/// Frequencies above this (a century) are treated as this
const MAX_FREQUENCY_MINUTES: u64 = 60 * 24 * 366 * 100;

/// What happened to one dispatch request
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Delivered; the throttle clock was advanced
    Sent,
    /// Skipped; the last successful send is too recent
    Throttled { remaining: Duration },
    /// Delivery attempted and failed; the throttle clock is unchanged
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

/// Sends messages through a sink, at most once per webhook frequency window
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// The sink messages are delivered through
    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    /// Time left before `key` may send again, if it is still inside its window
    pub fn throttle_remaining(
        state: &ScanState,
        key: &WebhookKey,
        frequency_minutes: u64,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        if frequency_minutes == 0 {
            return None;
        }
        let last = state.last_sent(key)?;
        let window = Duration::minutes(frequency_minutes.min(MAX_FREQUENCY_MINUTES) as i64);
        let elapsed = now - last;
        (elapsed < window).then(|| window - elapsed)
    }

    /// Throttle-check, then send `message` to `webhook` for `unit`
    ///
    /// Never fails past this boundary: every outcome is returned and logged.
    pub async fn send(
        &self,
        state: &SharedState,
        unit: &BranchKey,
        webhook: &Webhook,
        message: &str,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        debug!(path = %unit.path.display(), branch = %unit.branch, url = %webhook.url, "Dispatcher::send: called");
        let key = unit.webhook(webhook.url.as_str());

        let throttled = state.read(|s| Self::throttle_remaining(s, &key, webhook.frequency_minutes, now));
        if let Some(remaining) = throttled {
            info!(
                url = %webhook.url,
                remaining_secs = remaining.num_seconds(),
                "Dispatcher::send: throttled"
            );
            return DispatchOutcome::Throttled { remaining };
        }

        match self.sink.send(&webhook.url, message).await {
            Ok(()) => {
                state.update(|s| s.record_sent(&key, now));
                debug!(url = %webhook.url, "Dispatcher::send: sent");
                DispatchOutcome::Sent
            }
            Err(e) => {
                warn!(url = %webhook.url, error = %e, "Dispatcher::send: failed");
                DispatchOutcome::Failed(e)
            }
        }
    }
}
