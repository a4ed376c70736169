//! Event Logger - persists scan activity to JSONL files
//!
//! One file per pass: `<activity_dir>/<pass-id>.jsonl`. Pass ids are
//! UUIDv7, so file names sort in start order.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, ScanEvent};

/// Event logger that writes events to per-pass JSONL files
pub struct EventLogger {
    activity_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    pub fn new(activity_dir: impl AsRef<Path>) -> Self {
        let activity_dir = activity_dir.as_ref().to_path_buf();
        debug!(?activity_dir, "EventLogger::new: creating logger");
        Self {
            activity_dir,
            writers: HashMap::new(),
        }
    }

    /// Create a logger writing under the default activity directory
    pub fn with_default_path() -> eyre::Result<Self> {
        let dir = default_activity_dir();
        fs::create_dir_all(&dir)?;
        Ok(Self::new(dir))
    }

    /// Append an event to its pass's log file
    pub fn write_event(&mut self, event: &ScanEvent) -> eyre::Result<()> {
        let pass_id = event.pass_id();
        debug!(%pass_id, event_type = event.event_type(), "EventLogger::write_event");

        if !self.writers.contains_key(pass_id) {
            fs::create_dir_all(&self.activity_dir)?;
            let log_path = self.activity_dir.join(format!("{}.jsonl", pass_id));
            debug!(?log_path, "EventLogger: creating new log file");
            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(pass_id.to_string(), BufWriter::new(file));
        }
        let writer = self
            .writers
            .get_mut(pass_id)
            .ok_or_else(|| eyre::eyre!("no writer for pass {}", pass_id))?;

        let json = serde_json::to_string(&EventLogEntry::new(event.clone()))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// Close the writer for a finished pass
    pub fn close_pass(&mut self, pass_id: &str) {
        debug!(%pass_id, "EventLogger::close_pass");
        if let Some(mut writer) = self.writers.remove(pass_id) {
            let _ = writer.flush();
        }
    }

    /// Consume events from the bus until it closes
    pub async fn run(mut self, event_bus: Arc<EventBus>) {
        debug!("EventLogger::run: starting event logger");
        let rx = event_bus.subscribe();
        drop(event_bus);
        self.run_with(rx).await;
    }

    async fn run_with(&mut self, mut rx: broadcast::Receiver<ScanEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let pass_id = event.pass_id().to_string();
                    let finished = matches!(event, ScanEvent::PassFinished { .. });

                    if let Err(e) = self.write_event(&event) {
                        error!(%pass_id, error = %e, "EventLogger: failed to write event");
                    }
                    if finished {
                        self.close_pass(&pass_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        for (pass_id, mut writer) in self.writers.drain() {
            debug!(%pass_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// `<data_local_dir>/gitreporter/activity`
pub fn default_activity_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gitreporter")
        .join("activity")
}

/// Read one pass's events
pub fn read_pass_events(activity_dir: impl AsRef<Path>, pass_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = activity_dir.as_ref().join(format!("{}.jsonl", pass_id));
    debug!(?log_path, "read_pass_events: reading log file");

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_pass_events: failed to parse line");
            }
        }
    }

    debug!(count = entries.len(), "read_pass_events: loaded entries");
    Ok(entries)
}

/// Id of the most recently started pass with a log file
pub fn latest_pass_id(activity_dir: impl AsRef<Path>) -> eyre::Result<Option<String>> {
    let dir = activity_dir.as_ref();
    if !dir.exists() {
        return Ok(None);
    }
    let mut latest: Option<String> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            && latest.as_deref().is_none_or(|l| stem > l)
        {
            latest = Some(stem.to_string());
        }
    }
    Ok(latest)
}

/// Spawn the event logger as a background task
pub fn spawn_event_logger(event_bus: Arc<EventBus>) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::with_default_path()?;
    Ok(tokio::spawn(async move {
        logger.run(event_bus).await;
    }))
}
