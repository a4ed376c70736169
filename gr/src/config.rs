//! GitReporter configuration types and loading

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Project;
use crate::notify::TRUNCATION_MARKER;
use crate::scheduler::CalendarEntry;

/// Longest accepted `interval-minutes`: one year
pub const MAX_INTERVAL_MINUTES: u64 = 60 * 24 * 366;

/// Main GitReporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes between interval-triggered passes (0 disables the interval trigger)
    #[serde(rename = "interval-minutes")]
    pub interval_minutes: u64,

    /// Run one pass as soon as the daemon starts
    #[serde(rename = "auto-start")]
    pub auto_start: bool,

    /// Log level used when none is given on the command line
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Commits included in each branch's recent log
    #[serde(rename = "log-limit")]
    pub log_limit: usize,

    /// Calendar trigger entries
    pub schedule: Vec<ScheduleSpec>,

    /// Webhook HTTP client settings
    pub http: HttpConfig,

    /// Monitored projects, scanned in this order
    pub projects: Vec<Project>,

    /// File this configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            auto_start: true,
            log_level: None,
            log_limit: 5,
            schedule: Vec::new(),
            http: HttpConfig::default(),
            projects: Vec::new(),
            source: None,
        }
    }
}

/// A calendar trigger as written in the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSpec {
    /// Local time of day, `HH:MM`
    pub time: String,

    /// Weekday names (`mon`, `Tuesday`, ...); empty means every day
    pub days: Vec<String>,
}

/// Webhook HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Longest message body sent; longer messages are truncated (0 = no limit)
    #[serde(rename = "max-message-chars")]
    pub max_message_chars: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_message_chars: 2000,
        }
    }
}

/// A malformed configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("project #{index} has no name")]
    EmptyName { index: usize },

    #[error("project '{project}' has no path")]
    EmptyPath { project: String },

    #[error("project name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("project '{project}' has a webhook with no URL")]
    EmptyWebhookUrl { project: String },

    #[error("schedule entry #{index}: invalid time '{value}' (expected HH:MM)")]
    ScheduleTime { index: usize, value: String },

    #[error("schedule entry #{index}: unknown weekday '{value}'")]
    Weekday { index: usize, value: String },

    #[error("interval-minutes {0} is longer than one year")]
    Interval(u64),

    #[error("http.max-message-chars {0} is too small to hold the truncation marker")]
    MessageCap(usize),

    #[error("cannot read configuration {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// Validated projects and scan settings for one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSnapshot {
    pub projects: Vec<Project>,
    pub log_limit: usize,
}

impl ProjectSnapshot {
    /// Progress units in a pass over these projects
    pub fn unit_count(&self) -> usize {
        self.projects.iter().map(Project::unit_count).sum()
    }
}

impl Config {
    /// Check every project entry and schedule entry
    ///
    /// Returns the first problem found, in file order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut names = HashSet::new();
        for (index, project) in self.projects.iter().enumerate() {
            let name = project.name.trim();
            if name.is_empty() {
                return Err(ValidationError::EmptyName { index });
            }
            if project.path.as_os_str().is_empty() {
                return Err(ValidationError::EmptyPath {
                    project: name.to_string(),
                });
            }
            if !names.insert(name) {
                return Err(ValidationError::DuplicateName(name.to_string()));
            }
            if project.webhooks.iter().any(|w| w.url.trim().is_empty()) {
                return Err(ValidationError::EmptyWebhookUrl {
                    project: name.to_string(),
                });
            }
        }
        if self.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(ValidationError::Interval(self.interval_minutes));
        }
        let cap = self.http.max_message_chars;
        if cap != 0 && cap <= TRUNCATION_MARKER.chars().count() {
            return Err(ValidationError::MessageCap(cap));
        }
        self.calendar()?;
        Ok(())
    }

    /// Parsed calendar entries
    pub fn calendar(&self) -> Result<Vec<CalendarEntry>, ValidationError> {
        self.schedule
            .iter()
            .enumerate()
            .map(|(index, spec)| CalendarEntry::parse(index, spec))
            .collect()
    }

    /// Validate and take the scan-relevant part of this configuration
    pub fn snapshot(&self) -> Result<ProjectSnapshot, ValidationError> {
        self.validate()?;
        Ok(ProjectSnapshot {
            projects: self.projects.clone(),
            log_limit: self.log_limit.max(1),
        })
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .gitreporter.yml
        let local_config = PathBuf::from(".gitreporter.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/gitreporter/gitreporter.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("gitreporter").join("gitreporter.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let mut config = Self::parse(&content).context("Failed to parse config file")?;
        config.source = Some(path.as_ref().to_path_buf());

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse YAML text; an empty document yields the defaults
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

/// Supplies the projects to scan at the start of each pass
#[async_trait]
pub trait ProjectSource: Send + Sync {
    async fn snapshot(&self) -> Result<ProjectSnapshot, ValidationError>;
}

/// A fixed configuration, validated on every request
pub struct StaticProjects {
    config: Config,
}

impl StaticProjects {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProjectSource for StaticProjects {
    async fn snapshot(&self) -> Result<ProjectSnapshot, ValidationError> {
        self.config.snapshot()
    }
}

/// Re-reads a config file for every pass, so edits apply without a restart
pub struct FileProjects {
    path: PathBuf,
}

impl FileProjects {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProjectSource for FileProjects {
    async fn snapshot(&self) -> Result<ProjectSnapshot, ValidationError> {
        tracing::debug!(path = %self.path.display(), "FileProjects::snapshot: called");
        let unreadable = |message: String| ValidationError::Unreadable {
            path: self.path.clone(),
            message,
        };
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        let config = Config::parse(&content).map_err(|e| unreadable(e.to_string()))?;
        config.snapshot()
    }
}

/// Project source for a loaded configuration: the file it came from, or the config itself
pub fn project_source(config: &Config) -> Arc<dyn ProjectSource> {
    match &config.source {
        Some(path) => Arc::new(FileProjects::new(path.clone())),
        None => Arc::new(StaticProjects::new(config.clone())),
    }
}
