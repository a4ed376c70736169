//! Message formatting
//!
//! [`format`] turns one branch's change data into the text a webhook
//! receives. It is pure: the repository summary used by
//! [`MessageFormat::AiSummary`] is collected beforehand and passed in.

mod summary;
mod template;

pub use summary::{RepoInsight, keyword_highlights};
pub use template::render_template;

use chrono::NaiveDateTime;

use crate::domain::MessageFormat;

/// Placeholder when there is no log to show
pub const NO_COMMITS: &str = "No recent commits.";

/// Placeholder when there is neither status nor log
pub const NO_CHANGES: &str = "No changes.";

/// Change data for one (project, branch)
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageInput<'a> {
    pub project: &'a str,
    pub branch: &'a str,
    pub status: &'a str,
    pub log: &'a str,
    /// Repository summary; only consulted by the AI summary format
    pub insight: Option<&'a RepoInsight>,
    /// Local time the report was produced; shown by the block formats
    pub reported_at: Option<NaiveDateTime>,
}

/// Render a notification; never empty
///
/// A non-blank `template` overrides `kind`. `CustomTemplate` without a
/// template falls back to `RawCommits`.
pub fn format(kind: MessageFormat, input: &MessageInput<'_>, template: Option<&str>) -> String {
    if let Some(template) = template.filter(|t| !t.trim().is_empty()) {
        return render_template(template, input);
    }

    match kind {
        MessageFormat::RawCommits | MessageFormat::CustomTemplate => raw_commits(input),
        MessageFormat::ShortInterpretation => short_interpretation(input),
        MessageFormat::ChangelogStyle => blocks(input, &[Block::Status, Block::Log]),
        MessageFormat::DailySummary => blocks(input, &[Block::Log, Block::Status]),
        MessageFormat::AiSummary => match input.insight {
            Some(insight) => insight.render(input.project),
            None => format!("⚠️ AI summary unavailable for {}.", label(input.project)),
        },
    }
}

fn label(project: &str) -> &str {
    if project.trim().is_empty() { "(unnamed project)" } else { project }
}

fn header(input: &MessageInput<'_>) -> String {
    let branch = if input.branch.is_empty() {
        "(current branch)"
    } else {
        input.branch
    };
    format!("**📦 {} Update** ({})", label(input.project), branch)
}

fn fenced(title: &str, body: &str) -> String {
    format!("{}\n```\n{}\n```", title, body.trim_end())
}

fn raw_commits(input: &MessageInput<'_>) -> String {
    if input.log.trim().is_empty() {
        format!("{}\n{}", header(input), NO_COMMITS)
    } else {
        format!("{}\n{}", header(input), fenced("**🔄 Recent Commits:**", input.log))
    }
}

fn short_interpretation(input: &MessageInput<'_>) -> String {
    let first = input.log.lines().map(str::trim).find(|l| !l.is_empty());
    format!("{}\n{}", header(input), first.unwrap_or(NO_COMMITS))
}

#[derive(Clone, Copy)]
enum Block {
    Status,
    Log,
}

fn blocks(input: &MessageInput<'_>, order: &[Block]) -> String {
    let mut parts = vec![header(input)];
    if let Some(at) = input.reported_at {
        parts.push(format!("*Report Time: {}*", at.format("%Y-%m-%d %H:%M:%S")));
    }
    let preamble = parts.len();
    for block in order {
        match block {
            Block::Status if !input.status.trim().is_empty() => {
                parts.push(fenced("**📝 Uncommitted Changes:**", input.status));
            }
            Block::Log if !input.log.trim().is_empty() => {
                parts.push(fenced("**🔄 Recent Commits:**", input.log));
            }
            _ => {}
        }
    }
    if parts.len() == preamble {
        parts.push(NO_CHANGES.to_string());
    }
    parts.join("\n")
}
