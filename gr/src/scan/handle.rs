//! Cloneable handle to the orchestrator actor

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::messages::{PassSummary, ScanError, ScanRequest, ScanStatus, Trigger};
use super::orchestrator::Orchestrator;
use super::state::ScanState;
use crate::config::ProjectSource;
use crate::events::EventBus;
use crate::notify::{Dispatcher, NotificationSink};
use crate::repo::RepositoryInspector;

/// Handle for talking to the orchestrator; every trigger path uses one
#[derive(Clone)]
pub struct ScanHandle {
    tx: mpsc::Sender<ScanRequest>,
}

impl ScanHandle {
    /// Spawn the orchestrator actor with empty state
    pub fn spawn(
        projects: Arc<dyn ProjectSource>,
        inspector: Arc<dyn RepositoryInspector>,
        sink: Arc<dyn NotificationSink>,
        events: Arc<EventBus>,
    ) -> (Self, JoinHandle<()>) {
        debug!("ScanHandle::spawn: called");
        let (tx, rx) = mpsc::channel(64);
        let orchestrator = Orchestrator::new(rx, projects, inspector, Dispatcher::new(sink), events);
        let task = tokio::spawn(orchestrator.run());
        info!("Orchestrator spawned");
        (Self { tx }, task)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> ScanRequest) -> Result<T, ScanError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(build(reply_tx)).await.map_err(|_| ScanError::Closed)?;
        reply_rx.await.map_err(|_| ScanError::Closed)
    }

    /// Start a full pass if Idle; returns the new pass id
    pub async fn start(&self, trigger: Trigger) -> Result<String, ScanError> {
        debug!(%trigger, "ScanHandle::start: called");
        self.request(|reply| ScanRequest::Start {
            trigger,
            project: None,
            reply,
        })
        .await?
    }

    /// Start a pass over one named project if Idle
    pub async fn start_project(&self, name: &str) -> Result<String, ScanError> {
        debug!(%name, "ScanHandle::start_project: called");
        self.request(|reply| ScanRequest::Start {
            trigger: Trigger::ProjectTest,
            project: Some(name.to_string()),
            reply,
        })
        .await?
    }

    /// Request cancellation; `false` when nothing was running
    pub async fn cancel(&self) -> Result<bool, ScanError> {
        debug!("ScanHandle::cancel: called");
        self.request(|reply| ScanRequest::Cancel { reply }).await
    }

    pub async fn status(&self) -> Result<ScanStatus, ScanError> {
        self.request(|reply| ScanRequest::Status { reply }).await
    }

    /// Scan state as of the end of the last pass
    pub async fn snapshot(&self) -> Result<ScanState, ScanError> {
        self.request(|reply| ScanRequest::Snapshot { reply }).await
    }

    /// Wait until no pass is running; returns the latest summary
    pub async fn wait_idle(&self) -> Result<Option<PassSummary>, ScanError> {
        self.request(|reply| ScanRequest::WaitIdle { reply }).await
    }

    /// Start a pass and wait for it to finish
    pub async fn run_to_completion(&self, trigger: Trigger, project: Option<&str>) -> Result<PassSummary, ScanError> {
        debug!(%trigger, ?project, "ScanHandle::run_to_completion: called");
        let pass_id = match project {
            Some(name) => self.start_project(name).await?,
            None => self.start(trigger).await?,
        };
        match self.wait_idle().await? {
            Some(summary) if summary.pass_id == pass_id => Ok(summary),
            _ => Err(ScanError::Closed),
        }
    }

    /// Send the connectivity test message to `url`
    pub async fn test_webhook(&self, url: &str) -> Result<(), ScanError> {
        debug!(%url, "ScanHandle::test_webhook: called");
        self.request(|reply| ScanRequest::TestWebhook {
            url: url.to_string(),
            reply,
        })
        .await?
        .map_err(ScanError::from)
    }

    /// Cancel any running pass, wait for Idle, then stop the actor
    pub async fn shutdown(&self) -> Result<(), ScanError> {
        debug!("ScanHandle::shutdown: called");
        self.request(|reply| ScanRequest::Shutdown { reply }).await
    }
}
