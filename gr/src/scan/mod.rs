//! Scan orchestration
//!
//! A pass visits every (project, branch) unit in configured order: inspect
//! the repository, detect a new head, record it, evaluate filters, then
//! format and dispatch per webhook. The [`Orchestrator`] actor guarantees at
//! most one pass at a time; callers talk to it through a [`ScanHandle`].

mod detector;
mod filter;
mod handle;
mod messages;
mod orchestrator;
mod pass;
mod state;

pub use detector::is_new;
pub use filter::{Predicate, evaluate};
pub use handle::ScanHandle;
pub use messages::{PassOutcome, PassProgress, PassSummary, ScanError, ScanPhase, ScanRequest, ScanStatus, Trigger};
pub use orchestrator::{Orchestrator, TEST_MESSAGE};
pub use pass::{PassContext, PassReport, panic_message, run_pass};
pub use state::{BranchKey, ScanState, SharedState, WebhookKey};
