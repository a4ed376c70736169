//! Event types for scan activity streaming

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scan::{PassOutcome, Trigger};

/// Severity of a [`ScanEvent::Log`] line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.pad(name)
    }
}

/// Everything observable about scan passes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// A pass acquired the lock and is about to scan
    PassStarted {
        pass_id: String,
        trigger: Trigger,
        total: usize,
    },
    /// A human-readable activity line for one unit (or the pass as a whole)
    Log {
        pass_id: String,
        level: LogLevel,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        webhook: Option<String>,
        message: String,
    },
    /// A unit finished, successfully or not
    Progress {
        pass_id: String,
        completed: usize,
        total: usize,
    },
    /// The pass released the lock
    PassFinished {
        pass_id: String,
        outcome: PassOutcome,
        completed: usize,
        total: usize,
        dispatched: usize,
    },
    /// A trigger arrived while `pass_id` was running and was dropped
    TriggerRejected {
        pass_id: String,
        trigger: Trigger,
        reason: String,
    },
}

impl ScanEvent {
    pub fn pass_id(&self) -> &str {
        match self {
            ScanEvent::PassStarted { pass_id, .. }
            | ScanEvent::Log { pass_id, .. }
            | ScanEvent::Progress { pass_id, .. }
            | ScanEvent::PassFinished { pass_id, .. }
            | ScanEvent::TriggerRejected { pass_id, .. } => pass_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::PassStarted { .. } => "PassStarted",
            ScanEvent::Log { .. } => "Log",
            ScanEvent::Progress { .. } => "Progress",
            ScanEvent::PassFinished { .. } => "PassFinished",
            ScanEvent::TriggerRejected { .. } => "TriggerRejected",
        }
    }

    /// One-line rendering for `gr activity`
    pub fn summary(&self) -> String {
        match self {
            ScanEvent::PassStarted { trigger, total, .. } => {
                format!("pass started ({} trigger, {} units)", trigger, total)
            }
            ScanEvent::Log {
                level,
                project,
                branch,
                webhook,
                message,
                ..
            } => {
                let mut scope = Vec::new();
                if let Some(project) = project {
                    scope.push(project.clone());
                }
                if let Some(branch) = branch {
                    scope.push(if branch.is_empty() { "(current)".to_string() } else { branch.clone() });
                }
                if let Some(webhook) = webhook {
                    scope.push(webhook.clone());
                }
                if scope.is_empty() {
                    format!("{:5} {}", level, message)
                } else {
                    format!("{:5} [{}] {}", level, scope.join(" / "), message)
                }
            }
            ScanEvent::Progress { completed, total, .. } => format!("progress {}/{}", completed, total),
            ScanEvent::PassFinished {
                outcome,
                completed,
                total,
                dispatched,
                ..
            } => format!(
                "pass {} ({}/{} units, {} notifications sent)",
                outcome, completed, total, dispatched
            ),
            ScanEvent::TriggerRejected { trigger, reason, .. } => {
                format!("{} trigger rejected: {}", trigger, reason)
            }
        }
    }
}

/// A persisted event with its timestamp
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: ScanEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: ScanEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(project: Option<&str>, branch: Option<&str>) -> ScanEvent {
        ScanEvent::Log {
            pass_id: "p1".to_string(),
            level: LogLevel::Warn,
            project: project.map(str::to_string),
            branch: branch.map(str::to_string),
            webhook: None,
            message: "skipped".to_string(),
        }
    }

    #[test]
    fn test_pass_id_and_type() {
        let event = ScanEvent::Progress {
            pass_id: "p1".to_string(),
            completed: 1,
            total: 2,
        };
        assert_eq!(event.pass_id(), "p1");
        assert_eq!(event.event_type(), "Progress");
    }

    #[test]
    fn test_serialization_is_tagged() {
        let entry = EventLogEntry::new(ScanEvent::PassStarted {
            pass_id: "p1".to_string(),
            trigger: Trigger::Manual,
            total: 3,
        });
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""ts""#));
        assert!(json.contains(r#""type":"PassStarted""#));
        assert!(json.contains(r#""trigger":"manual""#));
    }

    #[test]
    fn test_log_omits_missing_scope() {
        let json = serde_json::to_string(&log(Some("Foo"), None)).unwrap();
        assert!(json.contains("Foo"));
        assert!(!json.contains("branch"));

        let back: ScanEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log(Some("Foo"), None));
    }

    #[test]
    fn test_summary() {
        assert_eq!(log(Some("Foo"), Some("main")).summary(), "WARN  [Foo / main] skipped");
        assert_eq!(log(Some("Foo"), Some("")).summary(), "WARN  [Foo / (current)] skipped");
        assert_eq!(log(None, None).summary(), "WARN  skipped");
    }
}
