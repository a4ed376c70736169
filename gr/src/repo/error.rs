//! Repository error types

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a single repository query failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoFailure {
    #[error("path does not exist")]
    MissingPath,

    #[error("not a git repository")]
    NotARepository,

    #[error("`git {command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("failed to run git: {0}")]
    Spawn(String),
}

/// A failed query, tagged with the unit it belongs to
///
/// Only the affected branch is skipped; the pass continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("repository {} (branch '{branch}'): {cause}", .path.display())]
pub struct RepositoryError {
    pub path: PathBuf,
    pub branch: String,
    #[source]
    pub cause: RepoFailure,
}

impl RepositoryError {
    pub fn new(path: impl AsRef<Path>, branch: impl Into<String>, cause: RepoFailure) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            branch: branch.into(),
            cause,
        }
    }
}
