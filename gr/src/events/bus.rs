//! Event Bus - pub/sub for scan activity
//!
//! Emitting never blocks and never fails: with no subscribers the event is
//! dropped, and a slow subscriber lags rather than stalling the scan.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::types::{LogLevel, ScanEvent};
use crate::scan::{PassOutcome, Trigger};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Central event bus for scan activity
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: ScanEvent) {
        debug!(event_type = event.event_type(), pass_id = event.pass_id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one pass
    pub fn emitter_for(&self, pass_id: impl Into<String>) -> ScanEmitter {
        ScanEmitter {
            tx: self.tx.clone(),
            pass_id: pass_id.into(),
        }
    }

}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Create a shared event bus with default capacity
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}

/// Which unit (and optionally which webhook) a log line is about
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub project: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub webhook: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn unit(project: &'a str, branch: &'a str) -> Self {
        Self {
            project: Some(project),
            branch: Some(branch),
            webhook: None,
        }
    }

    pub fn with_webhook(self, url: &'a str) -> Self {
        Self {
            webhook: Some(url),
            ..self
        }
    }
}

/// Emits events for one pass and mirrors log lines into tracing
#[derive(Clone)]
pub struct ScanEmitter {
    tx: broadcast::Sender<ScanEvent>,
    pass_id: String,
}

impl ScanEmitter {
    pub fn pass_id(&self) -> &str {
        &self.pass_id
    }

    fn emit(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }

    pub fn pass_started(&self, trigger: Trigger, total: usize) {
        info!(pass_id = %self.pass_id, %trigger, total, "scan pass started");
        self.emit(ScanEvent::PassStarted {
            pass_id: self.pass_id.clone(),
            trigger,
            total,
        });
    }

    pub fn log(&self, level: LogLevel, scope: Scope<'_>, message: impl Into<String>) {
        let message = message.into();
        let project = scope.project.unwrap_or("");
        let branch = scope.branch.unwrap_or("");
        let webhook = scope.webhook.unwrap_or("");
        match level {
            LogLevel::Info => info!(pass_id = %self.pass_id, project, branch, webhook, "{}", message),
            LogLevel::Warn => warn!(pass_id = %self.pass_id, project, branch, webhook, "{}", message),
            LogLevel::Error => error!(pass_id = %self.pass_id, project, branch, webhook, "{}", message),
        }
        self.emit(ScanEvent::Log {
            pass_id: self.pass_id.clone(),
            level,
            project: scope.project.map(str::to_string),
            branch: scope.branch.map(str::to_string),
            webhook: scope.webhook.map(str::to_string),
            message,
        });
    }

    pub fn info(&self, scope: Scope<'_>, message: impl Into<String>) {
        self.log(LogLevel::Info, scope, message);
    }

    pub fn warn(&self, scope: Scope<'_>, message: impl Into<String>) {
        self.log(LogLevel::Warn, scope, message);
    }

    pub fn error(&self, scope: Scope<'_>, message: impl Into<String>) {
        self.log(LogLevel::Error, scope, message);
    }

    pub fn progress(&self, completed: usize, total: usize) {
        debug!(pass_id = %self.pass_id, completed, total, "progress");
        self.emit(ScanEvent::Progress {
            pass_id: self.pass_id.clone(),
            completed,
            total,
        });
    }

    pub fn pass_finished(&self, outcome: PassOutcome, completed: usize, total: usize, dispatched: usize) {
        info!(pass_id = %self.pass_id, %outcome, completed, total, dispatched, "scan pass finished");
        self.emit(ScanEvent::PassFinished {
            pass_id: self.pass_id.clone(),
            outcome,
            completed,
            total,
            dispatched,
        });
    }

    pub fn trigger_rejected(&self, trigger: Trigger, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(pass_id = %self.pass_id, %trigger, %reason, "scan trigger rejected");
        self.emit(ScanEvent::TriggerRejected {
            pass_id: self.pass_id.clone(),
            trigger,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers() {
        let bus = EventBus::new(16);
        bus.emitter_for("p1").progress(1, 2);
    }

    #[tokio::test]
    async fn test_emitter_events_reach_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("p1");

        emitter.pass_started(Trigger::Manual, 2);
        emitter.warn(Scope::unit("Foo", "main").with_webhook("https://hook"), "throttled");
        emitter.pass_finished(PassOutcome::Completed, 2, 2, 0);

        assert!(matches!(rx.recv().await.unwrap(), ScanEvent::PassStarted { total: 2, .. }));
        match rx.recv().await.unwrap() {
            ScanEvent::Log {
                level,
                project,
                branch,
                webhook,
                message,
                ..
            } => {
                assert_eq!(level, LogLevel::Warn);
                assert_eq!(project.as_deref(), Some("Foo"));
                assert_eq!(branch.as_deref(), Some("main"));
                assert_eq!(webhook.as_deref(), Some("https://hook"));
                assert_eq!(message, "throttled");
            }
            other => panic!("unexpected event {:?}", other),
        }
        let finished = rx.recv().await.unwrap();
        assert_eq!(finished.pass_id(), "p1");
        assert_eq!(finished.event_type(), "PassFinished");
    }
}
