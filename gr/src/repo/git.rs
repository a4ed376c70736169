//! RepositoryInspector backed by the `git` command line

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::RepoFailure;
use super::inspector::RepositoryInspector;

/// Log line layout for `recent_log`
const LOG_FORMAT: &str = "--pretty=format:%h - %s - by %an (%ad)";

/// Inspects repositories by running `git` in the working tree
#[derive(Debug, Clone, Default)]
pub struct GitInspector;

impl GitInspector {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self
    }

    /// Run git in `path` and return stdout with trailing whitespace removed
    ///
    /// Leading whitespace is kept: porcelain status codes may start with a space.
    async fn git(&self, path: &Path, args: &[&str]) -> Result<String, RepoFailure> {
        debug!(path = %path.display(), ?args, "GitInspector::git: called");
        if !path.exists() {
            return Err(RepoFailure::MissingPath);
        }

        let output = Command::new("git")
            .args(args)
            .current_dir(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RepoFailure::Spawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(?args, %stderr, "GitInspector::git: command failed");
            return Err(RepoFailure::Command {
                command: args.join(" "),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    async fn git_lines(&self, path: &Path, args: &[&str]) -> Result<Vec<String>, RepoFailure> {
        let stdout = self.git(path, args).await?;
        Ok(stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl RepositoryInspector for GitInspector {
    async fn is_valid_repository(&self, path: &Path) -> bool {
        if !tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
            debug!(path = %path.display(), "is_valid_repository: not a directory");
            return false;
        }
        matches!(
            self.git(path, &["rev-parse", "--is-inside-work-tree"]).await.as_deref(),
            Ok("true")
        )
    }

    async fn select_branch(&self, path: &Path, branch: &str) -> Result<(), RepoFailure> {
        if branch.is_empty() {
            return Ok(());
        }
        self.git(path, &["checkout", "--quiet", branch]).await.map(|_| ())
    }

    async fn head_revision(&self, path: &Path) -> Result<String, RepoFailure> {
        let head = self.git(path, &["rev-parse", "HEAD"]).await?;
        Ok(head.trim().to_string())
    }

    async fn working_tree_status(&self, path: &Path) -> Result<Vec<String>, RepoFailure> {
        self.git_lines(path, &["status", "--porcelain"]).await
    }

    async fn recent_log(&self, path: &Path, limit: usize) -> Result<Vec<String>, RepoFailure> {
        let limit = limit.to_string();
        self.git_lines(path, &["log", LOG_FORMAT, "--date=relative", "-n", &limit])
            .await
    }

    async fn tags_containing(&self, path: &Path, revision: &str) -> Result<Vec<String>, RepoFailure> {
        self.git_lines(path, &["tag", "--contains", revision]).await
    }

    async fn current_branch(&self, path: &Path) -> Result<String, RepoFailure> {
        let branch = self.git(path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(branch.trim().to_string())
    }

    async fn latest_commit(&self, path: &Path) -> Result<String, RepoFailure> {
        self.git(
            path,
            &["log", "-1", "--date=format:%Y-%m-%d %H:%M:%S", "--pretty=format:%s||%an <%ae>||%cd"],
        )
        .await
    }

    async fn diff_stat(&self, path: &Path) -> Result<String, RepoFailure> {
        let stat = self.git(path, &["show", "--shortstat", "--format=", "HEAD"]).await?;
        Ok(stat.trim().to_string())
    }
}
