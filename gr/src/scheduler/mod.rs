//! Interval and calendar triggers
//!
//! Both triggers and the manual entry point feed the same orchestrator
//! "start if Idle" request; a trigger that finds a pass running is dropped,
//! never queued.

mod config;
mod core;

pub use config::{CALENDAR_POLL, CalendarEntry, SchedulerConfig};
pub use core::{CalendarTracker, Scheduler, SchedulerStats};
