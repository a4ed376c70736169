//! IPC message types for daemon communication
//!
//! Each message is a single line of JSON followed by `\n`.

use serde::{Deserialize, Serialize};

use crate::scan::ScanStatus;

/// Messages from the CLI to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DaemonMessage {
    /// Check the daemon is alive
    Ping,

    /// Start a pass if Idle; `project` limits it to one project
    Trigger {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
    },

    /// Cancel the running pass at the next unit boundary
    Cancel,

    Status,

    /// Stop the daemon once the running pass (if any) has ended
    Shutdown,
}

/// Responses from the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DaemonResponse {
    Ok,

    Pong { version: String },

    /// A pass was started
    Started { pass_id: String },

    /// Reply to `Cancel`; `running` is false when there was nothing to cancel
    Cancelled { running: bool },

    Status { status: ScanStatus },

    Error { message: String },
}
