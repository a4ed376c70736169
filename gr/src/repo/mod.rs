//! Read-only repository queries
//!
//! [`RepositoryInspector`] is the seam between the scan engine and the
//! version-control tool. [`GitInspector`] implements it by shelling out to
//! `git`; tests substitute their own implementations.

mod error;
mod git;
mod inspector;
pub mod status;

pub use error::{RepoFailure, RepositoryError};
pub use git::GitInspector;
pub use inspector::RepositoryInspector;
pub use status::{ChangeKind, StatusLine};

#[cfg(test)]
pub mod mock;
