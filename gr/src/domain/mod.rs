//! Domain types for monitored projects
//!
//! A [`Project`] is a repository plus how it is monitored: which branches,
//! which [`Filters`] decide whether a change is worth reporting, and which
//! [`Webhook`]s receive the report. [`ScanResult`] is what one branch looked
//! like during a scan pass.

mod project;
mod result;

pub use project::{Filters, MessageFormat, Project, Webhook};
pub use result::ScanResult;
