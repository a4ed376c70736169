//! In-memory scan state
//!
//! Two maps survive between passes (never persisted across restarts):
//! the last head revision seen per (path, branch), and the last successful
//! send per (path, branch, webhook URL). Only the running pass mutates them,
//! one unit at a time, through [`SharedState`]; everyone else reads a copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

/// Identifies one scanned unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchKey {
    pub path: PathBuf,
    pub branch: String,
}

impl BranchKey {
    pub fn new(path: impl AsRef<Path>, branch: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            branch: branch.into(),
        }
    }

    /// Throttle key for a webhook attached to this unit
    pub fn webhook(&self, url: impl Into<String>) -> WebhookKey {
        WebhookKey {
            path: self.path.clone(),
            branch: self.branch.clone(),
            url: url.into(),
        }
    }
}

/// Identifies one webhook's throttle clock for one unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebhookKey {
    pub path: PathBuf,
    pub branch: String,
    pub url: String,
}

/// Last-seen revisions and last-sent times
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    last_seen: HashMap<BranchKey, String>,
    last_sent: HashMap<WebhookKey, DateTime<Utc>>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self, key: &BranchKey) -> Option<&str> {
        self.last_seen.get(key).map(String::as_str)
    }

    /// Record `revision` for `key`; returns true if the stored value changed
    ///
    /// An entry is only ever replaced by a different revision, never removed.
    pub fn record_seen(&mut self, key: &BranchKey, revision: &str) -> bool {
        if self.last_seen(key) == Some(revision) {
            return false;
        }
        self.last_seen.insert(key.clone(), revision.to_string());
        true
    }

    pub fn last_sent(&self, key: &WebhookKey) -> Option<DateTime<Utc>> {
        self.last_sent.get(key).copied()
    }

    pub fn record_sent(&mut self, key: &WebhookKey, at: DateTime<Utc>) {
        self.last_sent.insert(key.clone(), at);
    }

    /// Number of (path, branch) keys with a recorded revision
    pub fn tracked_branches(&self) -> usize {
        self.last_seen.len()
    }

    /// Number of webhook throttle clocks
    pub fn tracked_webhooks(&self) -> usize {
        self.last_sent.len()
    }
}

/// Scan state shared by the orchestrator and its running pass
///
/// Each update lands as soon as it is made, so a pass that dies midway
/// leaves behind everything it recorded before dying.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<ScanState>>);

impl SharedState {
    // Every update is a single insert, so a poisoned lock still holds consistent maps
    fn lock(&self) -> MutexGuard<'_, ScanState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&ScanState) -> R) -> R {
        f(&self.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ScanState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ScanState {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_seen_only_changes_on_new_value() {
        let mut state = ScanState::new();
        let key = BranchKey::new("/repo", "main");

        assert!(state.record_seen(&key, "abc123"));
        assert!(!state.record_seen(&key, "abc123"));
        assert!(state.record_seen(&key, "def456"));
        assert_eq!(state.last_seen(&key), Some("def456"));
        assert_eq!(state.tracked_branches(), 1);
    }

    #[test]
    fn test_branch_keys_are_independent() {
        let mut state = ScanState::new();
        state.record_seen(&BranchKey::new("/repo", "main"), "a");
        state.record_seen(&BranchKey::new("/repo", "develop"), "b");
        state.record_seen(&BranchKey::new("/other", "main"), "c");

        assert_eq!(state.last_seen(&BranchKey::new("/repo", "main")), Some("a"));
        assert_eq!(state.last_seen(&BranchKey::new("/repo", "develop")), Some("b"));
        assert_eq!(state.tracked_branches(), 3);
    }

    #[test]
    fn test_webhook_key_from_branch() {
        let key = BranchKey::new("/repo", "main").webhook("https://hook");
        assert_eq!(key.path, PathBuf::from("/repo"));
        assert_eq!(key.branch, "main");
        assert_eq!(key.url, "https://hook");
    }

    #[test]
    fn test_record_sent() {
        let mut state = ScanState::new();
        let key = BranchKey::new("/repo", "").webhook("https://hook");
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

        assert!(state.last_sent(&key).is_none());
        state.record_sent(&key, at);
        assert_eq!(state.last_sent(&key), Some(at));
        assert_eq!(state.tracked_webhooks(), 1);
    }

    #[test]
    fn test_shared_state_updates_are_visible_to_clones() {
        let shared = SharedState::default();
        let other = shared.clone();
        let key = BranchKey::new("/repo", "main");

        assert!(shared.update(|s| s.record_seen(&key, "abc123")));
        assert_eq!(other.read(|s| s.last_seen(&key).map(str::to_string)), Some("abc123".to_string()));
        assert_eq!(other.snapshot().tracked_branches(), 1);
    }

    #[test]
    fn test_shared_state_survives_panicking_holder() {
        let shared = SharedState::default();
        let key = BranchKey::new("/repo", "main");
        shared.update(|s| s.record_seen(&key, "r1"));

        let poisoner = shared.clone();
        let result = std::thread::spawn(move || {
            poisoner.update(|_| panic!("boom"));
        })
        .join();
        assert!(result.is_err());

        assert_eq!(shared.read(|s| s.last_seen(&key).map(str::to_string)), Some("r1".to_string()));
    }
}
