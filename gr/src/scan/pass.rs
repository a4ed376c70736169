//! One scan pass over a project snapshot
//!
//! Units are (project, branch) pairs visited strictly in configured order.
//! Each unit runs detect, record, filter, then dispatch to completion
//! before the next one starts. Cancellation is checked before every
//! project and every branch; nothing is interrupted mid-unit.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{Local, Utc};
use futures::FutureExt;
use tracing::debug;

use super::detector;
use super::filter;
use super::messages::PassOutcome;
use super::state::{BranchKey, SharedState};
use crate::config::ProjectSnapshot;
use crate::domain::{Project, ScanResult};
use crate::events::{ScanEmitter, Scope};
use crate::format::{self, MessageInput, RepoInsight};
use crate::notify::{DispatchOutcome, Dispatcher};
use crate::repo::{RepoFailure, RepositoryError, RepositoryInspector};

/// Collaborators and control flags for one pass
#[derive(Clone)]
pub struct PassContext {
    pub inspector: Arc<dyn RepositoryInspector>,
    pub dispatcher: Dispatcher,
    pub emitter: ScanEmitter,
    /// Set to stop at the next unit boundary
    pub cancel: Arc<AtomicBool>,
    /// Units finished so far, readable while the pass runs
    pub completed: Arc<AtomicUsize>,
}

impl PassContext {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// What a pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub completed: usize,
    pub total: usize,
    pub dispatched: usize,
}

/// Scan every unit in `snapshot`, updating `state`
pub async fn run_pass(ctx: &PassContext, snapshot: &ProjectSnapshot, state: &SharedState) -> PassReport {
    let total = snapshot.unit_count();
    debug!(pass_id = ctx.emitter.pass_id(), total, "run_pass: called");

    let mut runner = UnitRunner {
        ctx,
        log_limit: snapshot.log_limit,
        validity: HashMap::new(),
    };
    let mut completed = 0;
    let mut dispatched = 0;

    'projects: for project in &snapshot.projects {
        if ctx.cancelled() {
            break;
        }
        for branch in project.branch_selections() {
            if ctx.cancelled() {
                break 'projects;
            }

            let scope = Scope::unit(&project.name, &branch);
            let unit = AssertUnwindSafe(runner.process(project, &branch, state))
                .catch_unwind()
                .await;
            match unit {
                Ok(Ok(sent)) => dispatched += sent,
                Ok(Err(e)) => ctx.emitter.warn(scope, format!("skipped: {}", e)),
                Err(panic) => ctx
                    .emitter
                    .error(scope, format!("unit aborted by panic: {}", panic_message(panic.as_ref()))),
            }

            completed += 1;
            ctx.completed.store(completed, Ordering::SeqCst);
            ctx.emitter.progress(completed, total);
        }
    }

    let outcome = if ctx.cancelled() && completed < total {
        PassOutcome::Cancelled
    } else {
        PassOutcome::Completed
    };
    PassReport {
        outcome,
        completed,
        total,
        dispatched,
    }
}

/// Text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct UnitRunner<'a> {
    ctx: &'a PassContext,
    log_limit: usize,
    /// Per-pass repository validity, keyed by path
    validity: HashMap<PathBuf, bool>,
}

impl UnitRunner<'_> {
    async fn is_valid(&mut self, path: &Path) -> bool {
        if let Some(valid) = self.validity.get(path) {
            return *valid;
        }
        let valid = self.ctx.inspector.is_valid_repository(path).await;
        self.validity.insert(path.to_path_buf(), valid);
        valid
    }

    /// Process one unit; returns the number of notifications delivered
    async fn process(
        &mut self,
        project: &Project,
        branch: &str,
        state: &SharedState,
    ) -> Result<usize, RepositoryError> {
        debug!(project = %project.name, %branch, "UnitRunner::process: called");
        let ctx = self.ctx;
        let inspector = ctx.inspector.as_ref();
        let path = project.path.as_path();
        let scope = Scope::unit(&project.name, branch);
        let fail = |cause: RepoFailure| RepositoryError::new(path, branch, cause);

        if !self.is_valid(path).await {
            let cause = if tokio::fs::try_exists(path).await.unwrap_or(false) {
                RepoFailure::NotARepository
            } else {
                RepoFailure::MissingPath
            };
            return Err(fail(cause));
        }

        inspector.select_branch(path, branch).await.map_err(fail)?;
        let head = inspector.head_revision(path).await.map_err(fail)?;
        let key = BranchKey::new(path, branch);

        let new = state.update(|s| {
            let new = detector::is_new(s, &key, &head);
            s.record_seen(&key, &head);
            new
        });
        if !new {
            ctx.emitter.info(scope, "no new commits");
            return Ok(0);
        }

        let status = inspector.working_tree_status(path).await.map_err(fail)?;
        let log = inspector.recent_log(path, self.log_limit).await.map_err(fail)?;
        let mut result = ScanResult::new(&project.name, branch, &head, status.join("\n"), log.join("\n"));
        ctx.emitter.info(scope, format!("new commit {} detected", result.short_head()));

        let tags = if project.filters.tags {
            match inspector.tags_containing(path, &head).await {
                Ok(tags) => tags,
                Err(e) => {
                    ctx.emitter.warn(scope, format!("tag lookup failed, treating as untagged: {}", e));
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let fired = filter::evaluate(&project.filters, &mut result, &tags);
        if !result.qualifies {
            ctx.emitter.info(scope, "no filter matched; not notifying");
            return Ok(0);
        }
        let fired: Vec<String> = fired.iter().map(ToString::to_string).collect();
        debug!(project = %project.name, %branch, ?fired, "UnitRunner::process: qualifies");

        if project.webhooks.is_empty() {
            ctx.emitter.info(scope, "qualifies but no webhooks are configured");
            return Ok(0);
        }

        let insight = if project.webhooks.iter().any(|w| w.needs_insight()) {
            match RepoInsight::collect(inspector, path).await {
                Ok(insight) => Some(insight),
                Err(e) => {
                    ctx.emitter.warn(scope, format!("summary query failed: {}", e));
                    None
                }
            }
        } else {
            None
        };

        let now = Utc::now();
        let input = MessageInput {
            project: &project.name,
            branch,
            status: &result.filtered_status,
            log: &result.filtered_log,
            insight: insight.as_ref(),
            reported_at: Some(now.with_timezone(&Local).naive_local()),
        };
        let mut sent = 0;
        for webhook in &project.webhooks {
            let hook_scope = scope.with_webhook(&webhook.url);
            let message = format::format(webhook.format, &input, webhook.template.as_deref());
            match ctx.dispatcher.send(state, &key, webhook, &message, now).await {
                DispatchOutcome::Sent => {
                    sent += 1;
                    ctx.emitter.info(hook_scope, format!("notification sent ({})", webhook.format));
                }
                DispatchOutcome::Throttled { remaining } => {
                    let minutes = (remaining.num_seconds() + 59) / 60;
                    ctx.emitter
                        .info(hook_scope, format!("throttled; next send allowed in {} min", minutes));
                }
                DispatchOutcome::Failed(e) => {
                    ctx.emitter.error(hook_scope, format!("delivery failed: {}", e));
                }
            }
        }
        Ok(sent)
    }
}
