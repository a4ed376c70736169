//! Scan orchestrator messages
//!
//! Requests and replies for the orchestrator actor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use super::state::ScanState;
use crate::config::ValidationError;
use crate::notify::DispatchError;

/// What asked for a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    /// Daemon start with `auto-start`
    Startup,
    Interval,
    Calendar,
    /// `gr run`, `gr trigger` or the IPC equivalent
    Manual,
    /// A single named project
    ProjectTest,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Startup => "startup",
            Trigger::Interval => "interval",
            Trigger::Calendar => "calendar",
            Trigger::Manual => "manual",
            Trigger::ProjectTest => "project-test",
        };
        write!(f, "{}", name)
    }
}

/// How a pass ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassOutcome {
    /// Every unit was visited
    Completed,
    /// Stopped early at a unit boundary
    Cancelled,
    /// The pass task itself panicked; its state updates were discarded
    Failed,
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassOutcome::Completed => "completed",
            PassOutcome::Cancelled => "cancelled",
            PassOutcome::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Orchestrator state machine position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPhase {
    Idle,
    Running,
    Cancelling,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Running => "running",
            ScanPhase::Cancelling => "cancelling",
        };
        write!(f, "{}", name)
    }
}

/// A finished pass
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass_id: String,
    pub trigger: Trigger,
    pub outcome: PassOutcome,
    pub completed: usize,
    pub total: usize,
    pub dispatched: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The pass in flight
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassProgress {
    pub pass_id: String,
    pub trigger: Trigger,
    pub completed: usize,
    pub total: usize,
    pub started_at: DateTime<Utc>,
}

/// Reply to a status request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatus {
    pub phase: ScanPhase,
    pub current: Option<PassProgress>,
    pub last: Option<PassSummary>,
    /// (path, branch) keys with a recorded head revision
    pub tracked_branches: usize,
}

/// Why a pass could not be started or observed
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan pass is already running ({0})")]
    Busy(String),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("unknown project '{0}'")]
    UnknownProject(String),

    #[error("webhook test failed: {0}")]
    Webhook(#[from] DispatchError),

    #[error("orchestrator is not running")]
    Closed,
}

/// Requests sent to the orchestrator actor
#[derive(Debug)]
pub enum ScanRequest {
    /// Start a pass if Idle; `project` limits it to one project
    Start {
        trigger: Trigger,
        project: Option<String>,
        reply: oneshot::Sender<Result<String, ScanError>>,
    },
    /// Ask the running pass to stop at the next unit boundary
    Cancel { reply: oneshot::Sender<bool> },
    Status { reply: oneshot::Sender<ScanStatus> },
    /// State as of the end of the last pass
    Snapshot { reply: oneshot::Sender<ScanState> },
    /// Resolve when no pass is running, with the latest summary
    WaitIdle { reply: oneshot::Sender<Option<PassSummary>> },
    /// Send a fixed message to one URL, bypassing throttle and state
    TestWebhook {
        url: String,
        reply: oneshot::Sender<Result<(), DispatchError>>,
    },
    /// Cancel, wait for Idle, then stop the actor
    Shutdown { reply: oneshot::Sender<()> },
}
