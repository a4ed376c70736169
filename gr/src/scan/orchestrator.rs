//! Scan orchestrator actor
//!
//! The actor owns the [`SharedState`] and a single slot for the running
//! pass. Every trigger path goes through its request channel, so "start if
//! idle" is an atomic check-and-set. The pass itself runs in a spawned task
//! that records into the shared state unit by unit; if that task panics,
//! whatever it recorded before the panic stays recorded.

use std::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::messages::{PassOutcome, PassProgress, PassSummary, ScanError, ScanPhase, ScanRequest, ScanStatus, Trigger};
use super::pass::{PassContext, PassReport, panic_message, run_pass};
use super::state::SharedState;
use crate::config::{ProjectSnapshot, ProjectSource};
use crate::events::{EventBus, ScanEmitter, Scope};
use crate::notify::Dispatcher;
use crate::repo::RepositoryInspector;

/// Body of the connectivity test message
pub const TEST_MESSAGE: &str = "✅ GitReporter webhook connectivity test";

struct RunningPass {
    pass_id: String,
    trigger: Trigger,
    started_at: DateTime<Utc>,
    total: usize,
    cancel: Arc<AtomicBool>,
    completed: Arc<AtomicUsize>,
    emitter: ScanEmitter,
    handle: JoinHandle<PassReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// The orchestrator actor; spawn it through [`super::ScanHandle::spawn`]
pub struct Orchestrator {
    rx: mpsc::Receiver<ScanRequest>,
    projects: Arc<dyn ProjectSource>,
    inspector: Arc<dyn RepositoryInspector>,
    dispatcher: Dispatcher,
    events: Arc<EventBus>,
    state: SharedState,
    running: Option<RunningPass>,
    last: Option<PassSummary>,
    idle_waiters: Vec<oneshot::Sender<Option<PassSummary>>>,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl Orchestrator {
    pub fn new(
        rx: mpsc::Receiver<ScanRequest>,
        projects: Arc<dyn ProjectSource>,
        inspector: Arc<dyn RepositoryInspector>,
        dispatcher: Dispatcher,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            rx,
            projects,
            inspector,
            dispatcher,
            events,
            state: SharedState::default(),
            running: None,
            last: None,
            idle_waiters: Vec::new(),
            shutdown_waiters: Vec::new(),
        }
    }

    /// Process requests until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        debug!("Orchestrator::run: called");
        loop {
            tokio::select! {
                request = self.rx.recv() => match request {
                    Some(request) => {
                        if self.handle_request(request).await == Flow::Stop {
                            break;
                        }
                    }
                    None => {
                        debug!("Orchestrator::run: all handles dropped");
                        self.drain_running().await;
                        break;
                    }
                },
                joined = join_running(&mut self.running) => {
                    if self.finish_pass(joined) == Flow::Stop {
                        break;
                    }
                }
            }
        }
        info!("Orchestrator stopped");
    }

    async fn handle_request(&mut self, request: ScanRequest) -> Flow {
        match request {
            ScanRequest::Start { trigger, project, reply } => {
                debug!(%trigger, ?project, "Orchestrator: Start request");
                let result = self.start(trigger, project).await;
                let _ = reply.send(result);
            }
            ScanRequest::Cancel { reply } => {
                debug!("Orchestrator: Cancel request");
                let cancelled = match &self.running {
                    Some(running) => {
                        running.cancel.store(true, Ordering::SeqCst);
                        running.emitter.info(Scope::pass(), "cancellation requested");
                        true
                    }
                    None => false,
                };
                let _ = reply.send(cancelled);
            }
            ScanRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
            ScanRequest::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            ScanRequest::WaitIdle { reply } => {
                if self.running.is_some() {
                    self.idle_waiters.push(reply);
                } else {
                    let _ = reply.send(self.last.clone());
                }
            }
            ScanRequest::TestWebhook { url, reply } => {
                debug!(%url, "Orchestrator: TestWebhook request");
                let sink = self.dispatcher.sink().clone();
                tokio::spawn(async move {
                    let result = sink.send(&url, TEST_MESSAGE).await;
                    match &result {
                        Ok(()) => info!(%url, "webhook connectivity test succeeded"),
                        Err(e) => warn!(%url, error = %e, "webhook connectivity test failed"),
                    }
                    let _ = reply.send(result);
                });
            }
            ScanRequest::Shutdown { reply } => {
                info!("Orchestrator: Shutdown request");
                match &self.running {
                    Some(running) => {
                        running.cancel.store(true, Ordering::SeqCst);
                        running.emitter.info(Scope::pass(), "shutting down; cancelling pass");
                        self.shutdown_waiters.push(reply);
                    }
                    None => {
                        let _ = reply.send(());
                        return Flow::Stop;
                    }
                }
            }
        }
        Flow::Continue
    }

    async fn start(&mut self, trigger: Trigger, project: Option<String>) -> Result<String, ScanError> {
        if let Some(running) = &self.running {
            running.emitter.trigger_rejected(trigger, "a pass is already running");
            return Err(ScanError::Busy(running.pass_id.clone()));
        }
        if !self.shutdown_waiters.is_empty() {
            return Err(ScanError::Closed);
        }

        let mut snapshot = self.projects.snapshot().await.map_err(|e| {
            error!(%trigger, error = %e, "scan pass not started: invalid configuration");
            ScanError::Validation(e)
        })?;
        if let Some(name) = project {
            snapshot.projects.retain(|p| p.name == name);
            if snapshot.projects.is_empty() {
                warn!(%name, "scan pass not started: unknown project");
                return Err(ScanError::UnknownProject(name));
            }
        }

        let pass_id = Uuid::now_v7().to_string();
        let total = snapshot.unit_count();
        let emitter = self.events.emitter_for(&pass_id);
        emitter.pass_started(trigger, total);

        let cancel = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicUsize::new(0));
        let ctx = PassContext {
            inspector: self.inspector.clone(),
            dispatcher: self.dispatcher.clone(),
            emitter: emitter.clone(),
            cancel: cancel.clone(),
            completed: completed.clone(),
        };
        let handle = spawn_pass(ctx, snapshot, self.state.clone());

        self.running = Some(RunningPass {
            pass_id: pass_id.clone(),
            trigger,
            started_at: Utc::now(),
            total,
            cancel,
            completed,
            emitter,
            handle,
        });
        Ok(pass_id)
    }

    fn status(&self) -> ScanStatus {
        let (phase, current) = match &self.running {
            Some(running) => {
                let phase = if running.cancel.load(Ordering::SeqCst) {
                    ScanPhase::Cancelling
                } else {
                    ScanPhase::Running
                };
                let progress = PassProgress {
                    pass_id: running.pass_id.clone(),
                    trigger: running.trigger,
                    completed: running.completed.load(Ordering::SeqCst),
                    total: running.total,
                    started_at: running.started_at,
                };
                (phase, Some(progress))
            }
            None => (ScanPhase::Idle, None),
        };
        ScanStatus {
            phase,
            current,
            last: self.last.clone(),
            tracked_branches: self.state.read(|s| s.tracked_branches()),
        }
    }

    /// Return to Idle after the pass task ends, however it ended
    fn finish_pass(&mut self, joined: Result<PassReport, JoinError>) -> Flow {
        let Some(running) = self.running.take() else {
            return Flow::Continue;
        };

        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                let reason = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                } else {
                    e.to_string()
                };
                error!(
                    pass_id = %running.pass_id,
                    trigger = %running.trigger,
                    %reason,
                    "scan pass aborted; keeping state recorded so far"
                );
                running
                    .emitter
                    .error(Scope::pass(), format!("pass aborted: {}", reason));
                PassReport {
                    outcome: PassOutcome::Failed,
                    completed: running.completed.load(Ordering::SeqCst),
                    total: running.total,
                    dispatched: 0,
                }
            }
        };

        running
            .emitter
            .pass_finished(report.outcome, report.completed, report.total, report.dispatched);
        let summary = PassSummary {
            pass_id: running.pass_id,
            trigger: running.trigger,
            outcome: report.outcome,
            completed: report.completed,
            total: report.total,
            dispatched: report.dispatched,
            started_at: running.started_at,
            finished_at: Utc::now(),
        };
        self.last = Some(summary.clone());

        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(Some(summary.clone()));
        }
        if self.shutdown_waiters.is_empty() {
            return Flow::Continue;
        }
        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
        Flow::Stop
    }

    async fn drain_running(&mut self) {
        if let Some(running) = &mut self.running {
            running.cancel.store(true, Ordering::SeqCst);
            let joined = (&mut running.handle).await;
            self.finish_pass(joined);
        }
    }
}

fn spawn_pass(ctx: PassContext, snapshot: ProjectSnapshot, state: SharedState) -> JoinHandle<PassReport> {
    tokio::spawn(async move { run_pass(&ctx, &snapshot, &state).await })
}

/// Resolves when the running pass ends; never resolves while Idle
async fn join_running(running: &mut Option<RunningPass>) -> Result<PassReport, JoinError> {
    match running {
        Some(running) => (&mut running.handle).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticProjects;
    use crate::notify::mock::RecordingSink;
    use crate::repo::mock::MockInspector;
    use crate::scan::BranchKey;

    fn orchestrator() -> (mpsc::Sender<ScanRequest>, Orchestrator) {
        let (tx, rx) = mpsc::channel(8);
        let orch = Orchestrator::new(
            rx,
            Arc::new(StaticProjects::new(Default::default())),
            Arc::new(MockInspector::new()),
            Dispatcher::new(Arc::new(RecordingSink::new())),
            Arc::new(EventBus::new(64)),
        );
        (tx, orch)
    }

    fn fake_running(orch: &mut Orchestrator, handle: JoinHandle<PassReport>) {
        let emitter = orch.events.emitter_for("p-test");
        orch.running = Some(RunningPass {
            pass_id: "p-test".to_string(),
            trigger: Trigger::Manual,
            started_at: Utc::now(),
            total: 4,
            cancel: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(AtomicUsize::new(2)),
            emitter,
            handle,
        });
    }

    fn blow_up() -> PassReport {
        panic!("pass blew up")
    }

    fn seen(orch: &Orchestrator, branch: &str) -> Option<String> {
        orch.state
            .read(|s| s.last_seen(&BranchKey::new("/repo", branch)).map(str::to_string))
    }

    #[tokio::test]
    async fn test_panicked_pass_keeps_units_recorded_before_panic() {
        let (_tx, mut orch) = orchestrator();
        orch.state.update(|s| s.record_seen(&BranchKey::new("/repo", "main"), "r0"));
        let sent_at = Utc::now();

        let state = orch.state.clone();
        let handle = tokio::spawn(async move {
            let unit = BranchKey::new("/repo", "main");
            state.update(|s| {
                s.record_seen(&unit, "r1");
                s.record_sent(&unit.webhook("https://hook/a"), sent_at);
            });
            state.update(|s| s.record_seen(&BranchKey::new("/repo", "develop"), "d1"));
            blow_up()
        });
        fake_running(&mut orch, handle);
        let joined = join_running(&mut orch.running).await;

        assert_eq!(orch.finish_pass(joined), Flow::Continue);
        assert!(orch.running.is_none());
        assert_eq!(seen(&orch, "main").as_deref(), Some("r1"));
        assert_eq!(seen(&orch, "develop").as_deref(), Some("d1"));
        let hook = BranchKey::new("/repo", "main").webhook("https://hook/a");
        assert_eq!(orch.state.read(|s| s.last_sent(&hook)), Some(sent_at));

        let last = orch.last.clone().unwrap();
        assert_eq!(last.outcome, PassOutcome::Failed);
        assert_eq!(last.completed, 2);
        let status = orch.status();
        assert_eq!(status.phase, ScanPhase::Idle);
        assert_eq!(status.tracked_branches, 2);
    }

    #[tokio::test]
    async fn test_finished_pass_wakes_idle_waiters() {
        let (_tx, mut orch) = orchestrator();
        let state = orch.state.clone();
        let handle = tokio::spawn(async move {
            state.update(|s| s.record_seen(&BranchKey::new("/repo", "main"), "r2"));
            PassReport {
                outcome: PassOutcome::Completed,
                completed: 4,
                total: 4,
                dispatched: 1,
            }
        });
        fake_running(&mut orch, handle);

        let (waiter_tx, waiter_rx) = oneshot::channel();
        orch.idle_waiters.push(waiter_tx);
        let joined = join_running(&mut orch.running).await;
        orch.finish_pass(joined);

        assert_eq!(seen(&orch, "main").as_deref(), Some("r2"));
        let summary = waiter_rx.await.unwrap().unwrap();
        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.pass_id, "p-test");

        let (reply, rx) = oneshot::channel();
        orch.handle_request(ScanRequest::Snapshot { reply }).await;
        assert_eq!(rx.await.unwrap().tracked_branches(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_cancelling() {
        let (_tx, mut orch) = orchestrator();
        let handle = tokio::spawn(future::pending::<PassReport>());
        fake_running(&mut orch, handle);

        assert_eq!(orch.status().phase, ScanPhase::Running);
        assert_eq!(orch.status().current.unwrap().completed, 2);

        let (reply, rx) = oneshot::channel();
        orch.handle_request(ScanRequest::Cancel { reply }).await;
        assert!(rx.await.unwrap());
        assert_eq!(orch.status().phase, ScanPhase::Cancelling);

        if let Some(running) = orch.running.take() {
            running.handle.abort();
        }
    }

    #[tokio::test]
    async fn test_shutdown_when_idle_stops() {
        let (_tx, mut orch) = orchestrator();
        let (reply, rx) = oneshot::channel();
        assert_eq!(orch.handle_request(ScanRequest::Shutdown { reply }).await, Flow::Stop);
        rx.await.unwrap();
    }
}
