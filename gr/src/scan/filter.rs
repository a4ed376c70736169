//! Filter evaluation: decide whether a branch's result is reported
//!
//! Predicates run in a fixed order (commits, merges, tags, filetypes). Each
//! one that fires marks the result as qualifying and may replace the
//! filtered payload; a later predicate wins over an earlier one.

use std::fmt;

use crate::domain::{Filters, ScanResult};
use crate::repo::StatusLine;

/// A filter predicate that fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Commits,
    Merges,
    Tags,
    Filetypes,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Predicate::Commits => "commits",
            Predicate::Merges => "merges",
            Predicate::Tags => "tags",
            Predicate::Filetypes => "filetypes",
        };
        write!(f, "{}", name)
    }
}

/// Apply `filters` to `result`, setting `qualifies` and the filtered payload
///
/// `tags` are the tags containing the head revision; callers only look them
/// up when the tags predicate is enabled. Returns the predicates that fired.
pub fn evaluate(filters: &Filters, result: &mut ScanResult, tags: &[String]) -> Vec<Predicate> {
    let mut fired = Vec::new();
    result.filtered_log = result.log.clone();
    result.filtered_status = result.status.clone();

    if filters.commits && !result.log.trim().is_empty() {
        result.filtered_log = result.log.clone();
        fired.push(Predicate::Commits);
    }

    if filters.merges {
        let merges: Vec<&str> = result
            .log
            .lines()
            .filter(|line| line.to_lowercase().contains("merge"))
            .collect();
        if !merges.is_empty() {
            result.filtered_log = merges.join("\n");
            fired.push(Predicate::Merges);
        }
    }

    if filters.tags && !tags.is_empty() {
        let line = format!("Tags: {}", tags.join(", "));
        result.filtered_log = if result.filtered_log.is_empty() {
            line
        } else {
            format!("{}\n{}", result.filtered_log, line)
        };
        fired.push(Predicate::Tags);
    }

    if !filters.filetypes.is_empty() && !result.status.trim().is_empty() {
        let matching: Vec<&str> = result
            .status
            .lines()
            .filter(|line| {
                StatusLine::parse(line)
                    .map(|s| filters.filetypes.iter().any(|ext| s.filename.ends_with(ext.as_str())))
                    .unwrap_or(false)
            })
            .collect();
        if !matching.is_empty() {
            result.filtered_status = matching.join("\n");
            fired.push(Predicate::Filetypes);
        }
    }

    result.qualifies = !fired.is_empty();
    fired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(commits: bool, merges: bool, tags: bool, filetypes: &[&str]) -> Filters {
        Filters {
            commits,
            merges,
            tags,
            filetypes: filetypes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn result(status: &str, log: &str) -> ScanResult {
        ScanResult::new("Foo", "main", "abc123", status, log)
    }

    #[test]
    fn test_commits_predicate() {
        let mut r = result("", "abc123 - Add player - by Ann (2 minutes ago)");
        let fired = evaluate(&filters(true, false, false, &[]), &mut r, &[]);
        assert_eq!(fired, vec![Predicate::Commits]);
        assert!(r.qualifies);
        assert_eq!(r.filtered_log, r.log);
    }

    #[test]
    fn test_commits_predicate_needs_log() {
        let mut r = result("M  a.rs", "");
        evaluate(&filters(true, false, false, &[]), &mut r, &[]);
        assert!(!r.qualifies);
    }

    #[test]
    fn test_merges_keep_merge_lines_only() {
        let log = "a1 - Merge branch 'feature' - by Ann\nb2 - Fix typo - by Bob\nc3 - MERGE pull request #4 - by Cy";
        let mut r = result("", log);
        let fired = evaluate(&filters(true, true, false, &[]), &mut r, &[]);
        assert_eq!(fired, vec![Predicate::Commits, Predicate::Merges]);
        assert_eq!(
            r.filtered_log,
            "a1 - Merge branch 'feature' - by Ann\nc3 - MERGE pull request #4 - by Cy"
        );
    }

    #[test]
    fn test_merges_without_merge_lines_do_not_qualify() {
        let mut r = result("", "b2 - Fix typo - by Bob");
        let fired = evaluate(&filters(false, true, false, &[]), &mut r, &[]);
        assert!(fired.is_empty());
        assert!(!r.qualifies);
    }

    #[test]
    fn test_tags_append_to_filtered_log() {
        let mut r = result("", "a1 - Release - by Ann");
        let tags = vec!["v1.0".to_string(), "stable".to_string()];
        let fired = evaluate(&filters(true, false, true, &[]), &mut r, &tags);
        assert_eq!(fired, vec![Predicate::Commits, Predicate::Tags]);
        assert_eq!(r.filtered_log, "a1 - Release - by Ann\nTags: v1.0, stable");
    }

    #[test]
    fn test_tags_without_tags_do_not_qualify() {
        let mut r = result("", "a1 - Release - by Ann");
        evaluate(&filters(false, false, true, &[]), &mut r, &[]);
        assert!(!r.qualifies);
    }

    #[test]
    fn test_filetypes_or_semantics() {
        let f = filters(false, false, false, &[".cpp"]);

        let mut txt_only = result("M  notes.txt", "a1 - Work - by Ann");
        evaluate(&f, &mut txt_only, &[]);
        assert!(!txt_only.qualifies);

        let mut with_cpp = result("M  notes.txt\nM  Source/Player.cpp", "a1 - Work - by Ann");
        let fired = evaluate(&f, &mut with_cpp, &[]);
        assert_eq!(fired, vec![Predicate::Filetypes]);
        assert!(with_cpp.qualifies);
        assert_eq!(with_cpp.filtered_status, "M  Source/Player.cpp");
    }

    #[test]
    fn test_filetypes_are_case_sensitive() {
        let mut r = result("M  Player.CPP", "");
        evaluate(&filters(false, false, false, &[".cpp"]), &mut r, &[]);
        assert!(!r.qualifies);
    }

    #[test]
    fn test_nothing_enabled_never_qualifies() {
        let mut r = result("M  a.cpp", "a1 - Merge - by Ann");
        let tags = vec!["v1".to_string()];
        evaluate(&filters(false, false, false, &[]), &mut r, &tags);
        assert!(!r.qualifies);
    }
}
