//! Lifecycle scheduler for match sessions
//!
//! One cancellable task per session: wait, warn, wait, delete. Every wait is
//! a `select!` against the session's `CancellationToken`, so a cancel that
//! lands mid-wait stops the task at once. Before deleting, the task commits by
//! removing its own registry entry under the registry lock; after that point a
//! `cancel` finds nothing and is a no-op.
//!
//! State lives in the task slot while a session is pending. Finished
//! sessions are kept in a short history of the last [`FINISHED_HISTORY`]
//! outcomes; older ones report no state at all.

use crate::error::{is_forbidden, lock_poisoned, Result};
use crate::metrics::MetricsCollector;
use crate::platform::PlatformCoordinator;
use crate::session::lifecycle::{LifecyclePlan, SessionState};
use crate::storage::SnapshotStore;
use crate::types::ResourceId;
use crate::utils::{current_timestamp, resource_mention};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DELETION_NOTICE: &str = "This match session is being deleted automatically.";
pub const EXPIRY_REASON: &str = "Match session expired.";

/// Finished sessions remembered by [`SessionScheduler::state`]
pub const FINISHED_HISTORY: usize = 256;

struct ScheduledTask {
    token: CancellationToken,
    generation: u64,
    state: SessionState,
    _handle: JoinHandle<()>,
}

struct SchedulerInner {
    coordinator: PlatformCoordinator,
    store: Arc<dyn SnapshotStore>,
    metrics: Arc<MetricsCollector>,
    tasks: Mutex<HashMap<ResourceId, ScheduledTask>>,
    finished: RwLock<VecDeque<(ResourceId, SessionState)>>,
    next_generation: AtomicU64,
}

/// Schedules and cancels warn-then-delete tasks for match sessions
#[derive(Clone)]
pub struct SessionScheduler {
    inner: Arc<SchedulerInner>,
}

impl SessionScheduler {
    pub fn new(
        coordinator: PlatformCoordinator,
        store: Arc<dyn SnapshotStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                coordinator,
                store,
                metrics,
                tasks: Mutex::new(HashMap::new()),
                finished: RwLock::new(VecDeque::with_capacity(FINISHED_HISTORY)),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Install the lifecycle task for a session, cancelling any task already
    /// scheduled for it
    pub fn schedule(&self, session: ResourceId, plan: LifecyclePlan) -> Result<()> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        let mut tasks = self
            .inner
            .tasks
            .lock()
            .map_err(|_| lock_poisoned("session tasks"))?;

        if let Some(previous) = tasks.remove(&session) {
            debug!(session_id = session, "Replacing scheduled session task");
            previous.token.cancel();
            self.inner.metrics.record_session_cancelled();
        }

        let handle = tokio::spawn(run_session(
            self.inner.clone(),
            session,
            plan,
            token.clone(),
            generation,
        ));
        tasks.insert(
            session,
            ScheduledTask {
                token,
                generation,
                state: SessionState::Created,
                _handle: handle,
            },
        );
        drop(tasks);

        self.inner.metrics.record_session_scheduled();
        info!(
            session_id = session,
            delete_after_secs = plan.delete_after().as_secs(),
            warn_before_secs = plan.warn_before().as_secs(),
            "Scheduled session lifecycle"
        );
        Ok(())
    }

    /// Cancel the pending task for a session. Returns false when nothing was
    /// pending.
    pub fn cancel(&self, session: ResourceId) -> Result<bool> {
        let removed = {
            let mut tasks = self
                .inner
                .tasks
                .lock()
                .map_err(|_| lock_poisoned("session tasks"))?;
            tasks.remove(&session)
        };

        match removed {
            Some(task) => {
                task.token.cancel();
                self.inner.record_finished(session, SessionState::Cancelled);
                self.inner.metrics.record_session_cancelled();
                info!(session_id = session, "Cancelled session lifecycle");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Cancel any pending task and delete the session's resource right away.
    /// Returns true when the platform confirmed the delete.
    pub async fn teardown_now(&self, session: ResourceId, reason: &str) -> Result<bool> {
        let was_scheduled = self.cancel(session)?;
        let deleted = self.inner.coordinator.close_lobby(session, reason).await;
        if was_scheduled {
            self.inner.record_deleted(session).await;
        }
        Ok(deleted)
    }

    /// State of a pending session, or the outcome of a recently finished
    /// one. `None` for unknown sessions and for outcomes pushed out of the
    /// finished history.
    pub fn state(&self, session: ResourceId) -> Option<SessionState> {
        if let Ok(tasks) = self.inner.tasks.lock() {
            if let Some(task) = tasks.get(&session) {
                return Some(task.state);
            }
        }
        self.inner.finished.read().ok().and_then(|finished| {
            finished
                .iter()
                .rev()
                .find(|(id, _)| *id == session)
                .map(|(_, state)| *state)
        })
    }

    /// Sessions with a pending warn or delete step
    pub fn active_count(&self) -> usize {
        self.inner.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    /// Cancel every pending task. Used on shutdown.
    pub fn cancel_all(&self) -> Result<usize> {
        let drained: Vec<(ResourceId, ScheduledTask)> = {
            let mut tasks = self
                .inner
                .tasks
                .lock()
                .map_err(|_| lock_poisoned("session tasks"))?;
            tasks.drain().collect()
        };

        for (session, task) in &drained {
            task.token.cancel();
            self.inner.record_finished(*session, SessionState::Cancelled);
            self.inner.metrics.record_session_cancelled();
        }

        if !drained.is_empty() {
            info!(count = drained.len(), "Cancelled all pending session tasks");
        }
        Ok(drained.len())
    }
}

impl SchedulerInner {
    /// Advance the state of a pending task. A cancelled or replaced task no
    /// longer owns the slot and is ignored.
    fn advance(&self, session: ResourceId, generation: u64, state: SessionState) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.get_mut(&session) {
                if task.generation == generation {
                    task.state = state;
                }
            }
        }
    }

    fn record_finished(&self, session: ResourceId, state: SessionState) {
        let Ok(mut finished) = self.finished.write() else {
            return;
        };
        finished.retain(|(id, _)| *id != session);
        if finished.len() >= FINISHED_HISTORY {
            finished.pop_front();
        }
        finished.push_back((session, state));
    }

    /// Take ownership of the terminal step. Fails if the task was cancelled
    /// or replaced.
    fn commit(&self, session: ResourceId, generation: u64, token: &CancellationToken) -> bool {
        let Ok(mut tasks) = self.tasks.lock() else {
            return false;
        };
        if token.is_cancelled() {
            return false;
        }
        match tasks.get(&session) {
            Some(task) if task.generation == generation => {
                tasks.remove(&session);
                drop(tasks);
                self.record_finished(session, SessionState::Terminated);
                true
            }
            _ => false,
        }
    }

    async fn warn(&self, session: ResourceId, plan: &LifecyclePlan, token: &CancellationToken) {
        let Some(resource) = self.coordinator.resolve(session).await else {
            debug!(session_id = session, "Session gone before warning, skipping");
            return;
        };
        self.coordinator.ensure_unarchived(&resource).await;
        if token.is_cancelled() {
            debug!(session_id = session, "Session cancelled during warning, skipping");
            return;
        }

        let text = plan.warning_text();
        match self
            .coordinator
            .platform()
            .send_message(session, &text)
            .await
        {
            Ok(_) => {}
            Err(e) if is_forbidden(&e) => {
                debug!(
                    session_id = session,
                    "Cannot post into session, warning parent channel instead"
                );
                let fallback = format!("{} {}", resource_mention(session), text);
                if self.coordinator.notify(resource.parent, &fallback).await.is_none() {
                    return;
                }
            }
            Err(e) => {
                warn!(session_id = session, "Failed to post session warning: {}", e);
                self.metrics.record_side_effect_failure("send_warning");
                return;
            }
        }

        self.metrics.record_warning_sent();
        info!(session_id = session, "Posted session deletion warning");
    }

    async fn terminate(&self, session: ResourceId) {
        match self.coordinator.resolve(session).await {
            Some(resource) => {
                self.coordinator.ensure_unarchived(&resource).await;
                self.coordinator.notify(session, DELETION_NOTICE).await;
                self.coordinator.delete(session, EXPIRY_REASON).await;
            }
            None => debug!(session_id = session, "Session already gone at deletion time"),
        }
        self.record_deleted(session).await;
    }

    async fn record_deleted(&self, session: ResourceId) {
        if let Err(e) = self
            .store
            .mark_match_deleted(session, current_timestamp())
            .await
        {
            warn!(session_id = session, "Failed to record session deletion: {}", e);
            self.metrics.record_side_effect_failure("mark_match_deleted");
        }
    }
}

/// Sleep for `delay` unless cancelled first. Returns false on cancellation.
async fn wait(delay: Duration, token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

async fn run_session(
    inner: Arc<SchedulerInner>,
    session: ResourceId,
    plan: LifecyclePlan,
    token: CancellationToken,
    generation: u64,
) {
    if plan.has_warning() {
        if !wait(plan.warn_delay(), &token).await {
            return;
        }
        let warned = tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = inner.warn(session, &plan, &token) => true,
        };
        if !warned {
            debug!(session_id = session, "Session cancelled while warning");
            return;
        }
        inner.advance(session, generation, SessionState::Warned);
    }

    if !wait(plan.final_delay(), &token).await {
        return;
    }
    if !inner.commit(session, generation, &token) {
        debug!(session_id = session, "Session cancelled before deletion");
        return;
    }

    inner.terminate(session).await;
    inner.metrics.record_session_terminated();
    info!(session_id = session, "Session lifecycle finished");
}
