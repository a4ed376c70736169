//! Scripted RepositoryInspector for unit tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::error::RepoFailure;
use super::inspector::RepositoryInspector;

/// State of one fake repository
#[derive(Debug, Clone, Default)]
pub struct MockRepo {
    pub valid: bool,
    /// Head revision per branch; "" is the checked-out default
    pub heads: HashMap<String, String>,
    pub status: Vec<String>,
    pub log: Vec<String>,
    pub tags: Vec<String>,
    pub latest: String,
    pub diff: String,
    pub fail_tags: bool,
    pub fail_summary: bool,
    /// Number of upcoming `recent_log` calls that fail
    pub fail_log: usize,
    /// Panic inside `head_revision`
    pub panic_head: bool,
    selected: String,
}

impl MockRepo {
    /// A valid repo whose checked-out branch is at `head`
    pub fn at(head: &str) -> Self {
        let mut heads = HashMap::new();
        heads.insert(String::new(), head.to_string());
        Self {
            valid: true,
            heads,
            latest: "Initial commit||Tester".to_string(),
            diff: "1 file changed, 1 insertion(+)".to_string(),
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, branch: &str, head: &str) -> Self {
        self.heads.insert(branch.to_string(), head.to_string());
        self
    }

    pub fn with_log(mut self, lines: &[&str]) -> Self {
        self.log = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_status(mut self, lines: &[&str]) -> Self {
        self.status = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Inspector serving [`MockRepo`]s keyed by path
#[derive(Default)]
pub struct MockInspector {
    repos: Mutex<HashMap<PathBuf, MockRepo>>,
    head_calls: AtomicUsize,
}

impl MockInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, repo: MockRepo) {
        self.repos.lock().unwrap().insert(path.into(), repo);
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    fn with_repo<T>(&self, path: &Path, f: impl FnOnce(&mut MockRepo) -> Result<T, RepoFailure>) -> Result<T, RepoFailure> {
        let mut repos = self.repos.lock().unwrap();
        match repos.get_mut(path) {
            Some(repo) if repo.valid => f(repo),
            Some(_) => Err(RepoFailure::NotARepository),
            None => Err(RepoFailure::MissingPath),
        }
    }
}

#[async_trait]
impl RepositoryInspector for MockInspector {
    async fn is_valid_repository(&self, path: &Path) -> bool {
        self.repos.lock().unwrap().get(path).map(|r| r.valid).unwrap_or(false)
    }

    async fn select_branch(&self, path: &Path, branch: &str) -> Result<(), RepoFailure> {
        self.with_repo(path, |repo| {
            if !branch.is_empty() && !repo.heads.contains_key(branch) {
                return Err(RepoFailure::Command {
                    command: format!("checkout --quiet {}", branch),
                    stderr: format!("error: pathspec '{}' did not match", branch),
                });
            }
            repo.selected = branch.to_string();
            Ok(())
        })
    }

    async fn head_revision(&self, path: &Path) -> Result<String, RepoFailure> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        let panic_head = self.repos.lock().unwrap().get(path).map(|r| r.panic_head).unwrap_or(false);
        if panic_head {
            panic!("scripted panic in head_revision");
        }
        self.with_repo(path, |repo| {
            repo.heads.get(&repo.selected).cloned().ok_or(RepoFailure::Command {
                command: "rev-parse HEAD".to_string(),
                stderr: "fatal: ambiguous argument 'HEAD'".to_string(),
            })
        })
    }

    async fn working_tree_status(&self, path: &Path) -> Result<Vec<String>, RepoFailure> {
        self.with_repo(path, |repo| Ok(repo.status.clone()))
    }

    async fn recent_log(&self, path: &Path, limit: usize) -> Result<Vec<String>, RepoFailure> {
        self.with_repo(path, |repo| {
            if repo.fail_log > 0 {
                repo.fail_log -= 1;
                return Err(RepoFailure::Spawn("log failed".to_string()));
            }
            Ok(repo.log.iter().take(limit).cloned().collect())
        })
    }

    async fn tags_containing(&self, path: &Path, _revision: &str) -> Result<Vec<String>, RepoFailure> {
        self.with_repo(path, |repo| {
            if repo.fail_tags {
                return Err(RepoFailure::Spawn("tag lookup failed".to_string()));
            }
            Ok(repo.tags.clone())
        })
    }

    async fn current_branch(&self, path: &Path) -> Result<String, RepoFailure> {
        self.with_repo(path, |repo| {
            if repo.fail_summary {
                return Err(RepoFailure::Spawn("summary failed".to_string()));
            }
            Ok(if repo.selected.is_empty() {
                "main".to_string()
            } else {
                repo.selected.clone()
            })
        })
    }

    async fn latest_commit(&self, path: &Path) -> Result<String, RepoFailure> {
        self.with_repo(path, |repo| Ok(repo.latest.clone()))
    }

    async fn diff_stat(&self, path: &Path) -> Result<String, RepoFailure> {
        self.with_repo(path, |repo| Ok(repo.diff.clone()))
    }
}
