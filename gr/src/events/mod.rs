//! Scan activity events
//!
//! The orchestrator emits [`ScanEvent`]s on a broadcast [`EventBus`]: pass
//! start and finish, per-unit log lines, progress ticks and rejected
//! triggers. Consumers subscribe; the [`EventLogger`] persists every pass
//! to its own JSONL file for `gr activity`.
//!
//! ```text
//!  Scheduler / IPC ──► Orchestrator ──► EventBus ──┬──► EventLogger (.jsonl)
//!                                                  └──► run/test subscribers
//! ```

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, ScanEmitter, Scope, create_event_bus};
pub use logger::{EventLogger, default_activity_dir, latest_pass_id, read_pass_events, spawn_event_logger};
pub use types::{EventLogEntry, LogLevel, ScanEvent};
