//! GitReporter - repository change reports for chat webhooks
//!
//! GitReporter polls a set of local git repositories, notices when a tracked
//! branch moves to a new head, decides with per-project filters whether the
//! change is worth reporting, and posts a formatted message to each of the
//! project's webhooks, throttled per webhook.
//!
//! # Modules
//!
//! - [`repo`] - Repository inspector trait and the `git` CLI adapter
//! - [`scan`] - Change detection, filters and the pass orchestrator
//! - [`format`] - Message formats and templates
//! - [`notify`] - Webhook sink and throttled dispatcher
//! - [`scheduler`] - Interval and calendar triggers
//! - [`events`] - Pass activity events and the JSONL activity log
//! - [`ipc`] - Daemon control socket
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod format;
pub mod ipc;
pub mod notify;
pub mod repo;
pub mod scan;
pub mod scheduler;
