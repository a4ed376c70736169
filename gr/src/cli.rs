//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use crate::ipc::get_socket_path;

/// GitReporter - repository change reports for chat webhooks
#[derive(Parser)]
#[command(
    name = "gr",
    about = "Watch git repositories and post commit reports to chat webhooks",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scheduler, orchestrator and control socket in the foreground
    Daemon,

    /// Run one scan pass in-process and print its summary
    Run {
        /// Scan only this project
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Send a connectivity test message to a webhook URL
    TestWebhook {
        url: String,
    },

    /// Load and validate the configuration
    Check,

    /// Ask the running daemon to start a pass
    Trigger {
        /// Scan only this project
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Ask the running daemon to cancel its pass
    Cancel,

    /// Show the running daemon's scan status
    Status {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check the daemon is alive and responsive
    Ping,

    /// Stop the running daemon after its current pass
    Stop,

    /// Show the activity log of a pass
    Activity {
        /// Pass id; defaults to the most recent pass
        pass_id: Option<String>,

        /// Number of entries to show (from the end)
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Output format for status
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Result of checking a required tool
pub struct ToolCheck {
    pub name: &'static str,
    pub available: bool,
    pub version: Option<String>,
}

impl ToolCheck {
    /// Check if a tool is available and get its version
    pub fn check(name: &'static str, version_args: &[&str]) -> Self {
        debug!(name, ?version_args, "ToolCheck::check: called");
        match std::process::Command::new(name).args(version_args).output() {
            Ok(output) if output.status.success() => {
                let version_str = String::from_utf8_lossy(&output.stdout);
                Self {
                    name,
                    available: true,
                    version: Some(parse_version(&version_str)),
                }
            }
            _ => {
                debug!(name, "ToolCheck::check: tool not available");
                Self {
                    name,
                    available: false,
                    version: None,
                }
            }
        }
    }
}

/// Extract the first version-like word from command output
fn parse_version(output: &str) -> String {
    for word in output.split_whitespace() {
        let word = word.trim_start_matches('v');
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let version: String = word.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
            if !version.is_empty() {
                return version;
            }
        }
    }
    "unknown".to_string()
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gitreporter")
        .join("logs")
        .join("gitreporter.log")
}

/// After-help text: git availability, daemon socket, log location
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let git = ToolCheck::check("git", &["--version"]);
    let daemon_running = get_socket_path().exists();

    let mut help = String::new();
    help.push_str("Required Tools:\n");
    let icon = if git.available { "\u{2705}" } else { "\u{274C}" };
    let version = git.version.as_deref().unwrap_or("not found");
    help.push_str(&format!("  {} {:<10} {}\n", icon, git.name, version));

    help.push('\n');
    help.push_str("Daemon:\n");
    let (icon, status) = if daemon_running {
        ("\u{2705}", "running")
    } else {
        ("\u{274C}", "stopped")
    };
    help.push_str(&format!("  {} {}\n", icon, status));

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}
