//! Repository insight for the AI summary format
//!
//! The summary re-queries the repository on its own (current branch,
//! latest subject, author and date, status, diff stats) and classifies what
//! it finds. No model is called; "AI" is the name users know the format by.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::repo::status::parse_block;
use crate::repo::{ChangeKind, RepoFailure, RepositoryInspector};

/// Keyword groups matched against the commit subject and changed filenames
const KEYWORDS: &[(&[&str], &str)] = &[
    (&["fix", "bug"], "🐛"),
    (&["feature", "add"], "✨"),
    (&["docs", "doc"], "📝"),
    (&["refactor"], "♻️"),
    (&["breaking-change"], "💥"),
    (&["delete", "remove"], "🔥"),
    (&["build", "chore"], "🔧"),
    (&["deps", "dependency"], "📦"),
    (&["test", "ci"], "✅"),
];

/// File categories by extension, checked in order; anything else is [`OTHER`]
const CATEGORIES: &[(&str, &[&str])] = &[
    ("Blueprints", &[".uasset"]),
    ("C++", &[".cpp", ".h"]),
    ("Content", &[".umap", ".uproject"]),
    ("Config", &[".ini", ".config"]),
];

const OTHER: &str = "Other";

/// Files listed per category; the rest are counted
const CATEGORY_LISTING: usize = 5;

/// Snapshot of a repository used to build an AI summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoInsight {
    pub branch: String,
    pub subject: String,
    pub author: String,
    /// Commit date as reported by the repository
    pub date: String,
    pub status: Vec<String>,
    pub diff_stat: String,
}

impl RepoInsight {
    /// Query everything the summary needs; any failure aborts the summary
    pub async fn collect(inspector: &dyn RepositoryInspector, path: &Path) -> Result<Self, RepoFailure> {
        debug!(path = %path.display(), "RepoInsight::collect: called");
        let branch = inspector.current_branch(path).await?;
        let latest = inspector.latest_commit(path).await?;
        let status = inspector.working_tree_status(path).await?;
        let diff_stat = inspector.diff_stat(path).await?;

        let mut fields = latest.splitn(3, "||").map(|f| f.trim().to_string());
        let subject = fields.next().unwrap_or_default();
        let author = fields.next().unwrap_or_default();
        let date = fields.next().unwrap_or_default();

        Ok(Self {
            branch,
            subject,
            author,
            date,
            status,
            diff_stat,
        })
    }

    /// Render the summary text for `project`
    pub fn render(&self, project: &str) -> String {
        let status = self.status.join("\n");
        let mut buckets: BTreeMap<&'static str, Vec<&str>> = BTreeMap::new();
        let mut extensions: BTreeMap<String, usize> = BTreeMap::new();
        let mut categories: Vec<(&'static str, Vec<&str>)> = Vec::new();
        for line in parse_block(&status) {
            let bucket = match line.kind() {
                ChangeKind::Added => "Added",
                ChangeKind::Modified => "Modified",
                ChangeKind::Deleted => "Deleted",
            };
            buckets.entry(bucket).or_default().push(line.filename);
            let ext = line.extension();
            let name = category(ext.as_deref());
            match categories.iter_mut().find(|(c, _)| *c == name) {
                Some((_, files)) => files.push(line.filename),
                None => categories.push((name, vec![line.filename])),
            }
            if let Some(ext) = ext {
                *extensions.entry(ext).or_default() += 1;
            }
        }
        categories.sort_by_key(|(name, _)| category_rank(name));

        let project = if project.trim().is_empty() { "(unnamed project)" } else { project };
        let branch = if self.branch.is_empty() { "(current branch)" } else { &self.branch };
        let mut lines = vec![format!("**🤖 {} Summary** ({})", project, branch)];

        if self.subject.is_empty() {
            lines.push("Latest: (no commits)".to_string());
        } else {
            let mut latest = format!("Latest: {}", self.subject);
            if !self.author.is_empty() {
                latest.push_str(&format!(" by {}", self.author));
            }
            if !self.date.is_empty() {
                latest.push_str(&format!(" ({})", self.date));
            }
            lines.push(latest);
        }

        for bucket in ["Added", "Modified", "Deleted"] {
            if let Some(files) = buckets.get(bucket) {
                lines.push(format!("{} ({}): {}", bucket, files.len(), files.join(", ")));
            }
        }
        if buckets.is_empty() {
            lines.push("Working tree clean.".to_string());
        }

        for (name, files) in &categories {
            lines.push(format!("{} changes:", name));
            lines.extend(files.iter().take(CATEGORY_LISTING).map(|f| format!("• {}", f)));
            if files.len() > CATEGORY_LISTING {
                lines.push(format!("... and {} more", files.len() - CATEGORY_LISTING));
            }
        }

        if !extensions.is_empty() {
            let counts: Vec<String> = extensions.iter().map(|(ext, n)| format!("{} ×{}", ext, n)).collect();
            lines.push(format!("File types: {}", counts.join(", ")));
        }

        if !self.diff_stat.trim().is_empty() {
            lines.push(format!("Stats: {}", self.diff_stat.trim()));
        }

        let filenames: Vec<&str> = buckets.values().flatten().copied().collect();
        let highlights = keyword_highlights(&self.subject, &filenames);
        if !highlights.is_empty() {
            lines.push(format!("Highlights: {}", highlights.join(", ")));
        }

        lines.join("\n")
    }
}

/// Category of a file with lowercased extension `ext`
fn category(ext: Option<&str>) -> &'static str {
    ext.and_then(|ext| {
        CATEGORIES
            .iter()
            .find(|(_, exts)| exts.contains(&ext))
            .map(|(name, _)| *name)
    })
    .unwrap_or(OTHER)
}

fn category_rank(name: &str) -> usize {
    CATEGORIES
        .iter()
        .position(|(c, _)| *c == name)
        .unwrap_or(CATEGORIES.len())
}

/// `"<symbol> <keyword>"` for each keyword group found in the subject or filenames
///
/// Matching is case-insensitive substring matching; each group contributes
/// at most once, using the first of its keywords that matched.
pub fn keyword_highlights(subject: &str, filenames: &[&str]) -> Vec<String> {
    let haystacks: Vec<String> = std::iter::once(subject)
        .chain(filenames.iter().copied())
        .map(str::to_lowercase)
        .collect();

    KEYWORDS
        .iter()
        .filter_map(|(words, symbol)| {
            words
                .iter()
                .find(|word| haystacks.iter().any(|h| h.contains(*word)))
                .map(|word| format!("{} {}", symbol, word))
        })
        .collect()
}
