//! Project, filter and webhook definitions

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A monitored repository and its monitoring configuration
///
/// Treated as a read-only snapshot for the duration of a scan pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    /// Unique project name, used as the label in reports
    pub name: String,

    /// Filesystem path to the repository working tree
    pub path: PathBuf,

    /// Branches to scan, in order. Empty means whatever is checked out.
    pub branches: Vec<String>,

    /// Predicates deciding whether a change is reported
    pub filters: Filters,

    /// Notification targets for this project
    pub webhooks: Vec<Webhook>,
}

impl Project {
    /// Branch selections to scan, in configured order
    ///
    /// An empty branch list yields a single empty selection, meaning
    /// "the currently checked-out branch".
    pub fn branch_selections(&self) -> Vec<String> {
        if self.branches.is_empty() {
            vec![String::new()]
        } else {
            self.branches.clone()
        }
    }

    /// Number of progress units this project contributes to a pass
    pub fn unit_count(&self) -> usize {
        self.branches.len().max(1)
    }
}

/// Content filters applied to a branch's scan result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Report whenever the recent log is non-empty
    pub commits: bool,

    /// Report only merge commits
    pub merges: bool,

    /// Report when the head revision is tagged
    pub tags: bool,

    /// Report uncommitted changes to files with these suffixes (e.g. ".cpp")
    pub filetypes: BTreeSet<String>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            commits: true,
            merges: false,
            tags: false,
            filetypes: BTreeSet::new(),
        }
    }
}

/// Outbound notification target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Webhook {
    /// Endpoint URL
    pub url: String,

    /// How the report is rendered
    pub format: MessageFormat,

    /// Minimum minutes between successful sends (0 = no throttle)
    #[serde(rename = "frequency-minutes")]
    pub frequency_minutes: u64,

    /// Template overriding `format` when non-empty
    pub template: Option<String>,
}

impl Default for Webhook {
    fn default() -> Self {
        Self {
            url: String::new(),
            format: MessageFormat::default(),
            frequency_minutes: 0,
            template: None,
        }
    }
}

impl Webhook {
    /// Template text if one is configured and non-empty
    pub fn active_template(&self) -> Option<&str> {
        self.template.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Whether rendering this webhook's message needs a repository summary query
    pub fn needs_insight(&self) -> bool {
        self.active_template().is_none() && self.format == MessageFormat::AiSummary
    }
}

/// Report format selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageFormat {
    #[default]
    RawCommits,
    ShortInterpretation,
    ChangelogStyle,
    DailySummary,
    AiSummary,
    CustomTemplate,
}

impl MessageFormat {
    /// All formats, in display order
    pub const ALL: [MessageFormat; 6] = [
        MessageFormat::RawCommits,
        MessageFormat::ShortInterpretation,
        MessageFormat::ChangelogStyle,
        MessageFormat::DailySummary,
        MessageFormat::AiSummary,
        MessageFormat::CustomTemplate,
    ];
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageFormat::RawCommits => "raw-commits",
            MessageFormat::ShortInterpretation => "short-interpretation",
            MessageFormat::ChangelogStyle => "changelog-style",
            MessageFormat::DailySummary => "daily-summary",
            MessageFormat::AiSummary => "ai-summary",
            MessageFormat::CustomTemplate => "custom-template",
        };
        write!(f, "{}", name)
    }
}
