//! Per-branch scan result

use serde::Serialize;

/// What one (project, branch) looked like during a scan pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Project name
    pub project: String,

    /// Branch selection ("" = currently checked out)
    pub branch: String,

    /// Head revision observed
    pub head: String,

    /// Raw working-tree status, one porcelain line per change
    pub status: String,

    /// Raw recent log, newest first
    pub log: String,

    /// Whether at least one enabled filter predicate fired
    pub qualifies: bool,

    /// Status after filtering
    pub filtered_status: String,

    /// Log after filtering
    pub filtered_log: String,
}

impl ScanResult {
    /// Create an unevaluated result; filtered payload starts as the raw payload
    pub fn new(
        project: impl Into<String>,
        branch: impl Into<String>,
        head: impl Into<String>,
        status: impl Into<String>,
        log: impl Into<String>,
    ) -> Self {
        let status = status.into();
        let log = log.into();
        Self {
            project: project.into(),
            branch: branch.into(),
            head: head.into(),
            filtered_status: status.clone(),
            filtered_log: log.clone(),
            status,
            log,
            qualifies: false,
        }
    }

    /// Short form of the head revision for log lines
    pub fn short_head(&self) -> &str {
        let end = self.head.char_indices().nth(7).map(|(i, _)| i).unwrap_or(self.head.len());
        &self.head[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_copies_raw_into_filtered() {
        let result = ScanResult::new("Foo", "main", "abc123", "M  a.rs", "abc123 - init");
        assert_eq!(result.filtered_status, "M  a.rs");
        assert_eq!(result.filtered_log, "abc123 - init");
        assert!(!result.qualifies);
    }

    #[test]
    fn test_short_head() {
        let result = ScanResult::new("Foo", "", "0123456789abcdef", "", "");
        assert_eq!(result.short_head(), "0123456");

        let short = ScanResult::new("Foo", "", "abc", "", "");
        assert_eq!(short.short_head(), "abc");
    }
}
