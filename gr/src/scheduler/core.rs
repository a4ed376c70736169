//! Scheduler implementation

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::{CalendarEntry, SchedulerConfig};
use crate::scan::{ScanError, ScanHandle, Trigger};

/// Counters for triggers the scheduler has fired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Triggers that started a pass
    pub started: u64,
    /// Triggers refused because a pass was already running
    pub rejected: u64,
    /// Triggers that failed for any other reason
    pub failed: u64,
}

/// Drives the orchestrator from the interval and calendar triggers
pub struct Scheduler {
    config: SchedulerConfig,
    handle: ScanHandle,
    stats: Arc<Mutex<SchedulerStats>>,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, handle: ScanHandle) -> Self {
        debug!(?config, "Scheduler::new: called");
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            handle,
            stats: Arc::new(Mutex::new(SchedulerStats::default())),
            stop_tx,
            tasks: Vec::new(),
        }
    }

    /// Spawn the startup, interval and calendar triggers
    pub fn start(&mut self) {
        debug!("Scheduler::start: called");
        if self.config.auto_start {
            let handle = self.handle.clone();
            let stats = self.stats.clone();
            self.tasks.push(tokio::spawn(async move {
                fire(&handle, Trigger::Startup, &stats).await;
            }));
        }

        match self.config.interval {
            Some(interval) => {
                info!(?interval, "interval trigger enabled");
                let handle = self.handle.clone();
                let stats = self.stats.clone();
                let stop = self.stop_tx.subscribe();
                self.tasks
                    .push(tokio::spawn(interval_loop(handle, interval, stats, stop)));
            }
            None => info!("interval trigger disabled"),
        }

        if !self.config.calendar.is_empty() {
            info!(entries = self.config.calendar.len(), "calendar trigger enabled");
            let handle = self.handle.clone();
            let stats = self.stats.clone();
            let stop = self.stop_tx.subscribe();
            let calendar = CalendarTracker::new(self.config.calendar.clone());
            let poll = self.config.calendar_poll;
            self.tasks
                .push(tokio::spawn(calendar_loop(handle, calendar, poll, stats, stop)));
        }
    }

    /// Manual trigger; same entry point the timers use
    pub async fn run_now(&self) -> Result<String, ScanError> {
        debug!("Scheduler::run_now: called");
        self.handle.start(Trigger::Manual).await
    }

    pub async fn stats(&self) -> SchedulerStats {
        *self.stats.lock().await
    }

    /// Signal both trigger loops and join them
    pub async fn shutdown(self) {
        debug!("Scheduler::shutdown: called");
        let _ = self.stop_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler: trigger task ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

async fn fire(handle: &ScanHandle, trigger: Trigger, stats: &Mutex<SchedulerStats>) {
    debug!(%trigger, "Scheduler::fire: called");
    let result = handle.start(trigger).await;
    let mut stats = stats.lock().await;
    match result {
        Ok(pass_id) => {
            stats.started += 1;
            info!(%trigger, %pass_id, "scheduled pass started");
        }
        Err(ScanError::Busy(running)) => {
            stats.rejected += 1;
            if trigger == Trigger::Calendar {
                debug!(%trigger, %running, "calendar trigger skipped: pass already running");
            } else {
                warn!(%trigger, %running, "trigger rejected: pass already running");
            }
        }
        Err(e) => {
            stats.failed += 1;
            warn!(%trigger, error = %e, "scheduled pass not started");
        }
    }
}

async fn interval_loop(
    handle: ScanHandle,
    interval: std::time::Duration,
    stats: Arc<Mutex<SchedulerStats>>,
    mut stop: watch::Receiver<bool>,
) {
    debug!("interval_loop: started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => fire(&handle, Trigger::Interval, &stats).await,
            _ = stop.changed() => break,
        }
        if *stop.borrow() {
            break;
        }
    }
    debug!("interval_loop: stopped");
}

async fn calendar_loop(
    handle: ScanHandle,
    mut calendar: CalendarTracker,
    poll: std::time::Duration,
    stats: Arc<Mutex<SchedulerStats>>,
    mut stop: watch::Receiver<bool>,
) {
    debug!("calendar_loop: started");
    loop {
        if calendar.due(chrono::Local::now().naive_local()) {
            fire(&handle, Trigger::Calendar, &stats).await;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = stop.changed() => break,
        }
        if *stop.borrow() {
            break;
        }
    }
    debug!("calendar_loop: stopped");
}

/// Calendar matching with once-per-minute firing
#[derive(Debug)]
pub struct CalendarTracker {
    entries: Vec<CalendarEntry>,
    /// Minute each entry last fired in
    fired: HashMap<usize, NaiveDateTime>,
}

impl CalendarTracker {
    pub fn new(entries: Vec<CalendarEntry>) -> Self {
        Self {
            entries,
            fired: HashMap::new(),
        }
    }

    /// Whether any entry matches `now` and has not fired this minute yet
    pub fn due(&mut self, now: NaiveDateTime) -> bool {
        let minute = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        let mut due = false;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.matches(now) && self.fired.get(&index) != Some(&minute) {
                self.fired.insert(index, minute);
                due = true;
            }
        }
        due
    }
}
