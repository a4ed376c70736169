//! RepositoryInspector trait definition

use std::path::Path;

use async_trait::async_trait;

use super::error::RepoFailure;

/// Read-only queries against a working tree
///
/// Every call may block on process I/O, so callers run them off any
/// foreground context. A failure affects only the branch being inspected.
#[async_trait]
pub trait RepositoryInspector: Send + Sync {
    /// Whether `path` exists and is inside a work tree
    async fn is_valid_repository(&self, path: &Path) -> bool;

    /// Check out `branch`; no-op when `branch` is empty
    async fn select_branch(&self, path: &Path, branch: &str) -> Result<(), RepoFailure>;

    /// Identifier of the most recent commit on the current branch
    async fn head_revision(&self, path: &Path) -> Result<String, RepoFailure>;

    /// Porcelain status lines: two-character code, space, filename
    async fn working_tree_status(&self, path: &Path) -> Result<Vec<String>, RepoFailure>;

    /// Up to `limit` commit summaries, newest first
    async fn recent_log(&self, path: &Path, limit: usize) -> Result<Vec<String>, RepoFailure>;

    /// Names of tags whose history contains `revision`
    async fn tags_containing(&self, path: &Path, revision: &str) -> Result<Vec<String>, RepoFailure>;

    /// Name of the checked-out branch
    async fn current_branch(&self, path: &Path) -> Result<String, RepoFailure>;

    /// Latest commit as `subject||author||date`; trailing fields may be absent
    async fn latest_commit(&self, path: &Path) -> Result<String, RepoFailure>;

    /// One-line change statistics of the latest commit
    async fn diff_stat(&self, path: &Path) -> Result<String, RepoFailure>;
}
