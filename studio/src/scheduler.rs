//! Queue scheduler — runs pending tasks through bounded pollers.
//!
//! DESIGN
//! ======
//! `drain` is synchronous and single-flight: an atomic flag turns a
//! concurrent call into a no-op. Each drain reads the durable queue, picks
//! candidates (queued tasks, plus processing tasks with no live poller) in
//! `created_at` order, and starts pollers until `max_concurrent` are active.
//!
//! Every started poller gets a supervisor task that forwards progress to the
//! [`TaskListener`] and handles settlement:
//!
//! 1. completed/failed: the listener is told, then the task leaves the
//!    queue and the active set, and a new drain runs after `drain_delay`.
//!    The task stays in the active set until it is off the queue, so no
//!    drain can restart it in between.
//! 2. cancelled: the task leaves the active set but stays in the queue as
//!    `processing`, so the next drain picks it up again. No re-drain.
//!
//! `cancel_all` stops every poller and prevents further drains.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use canvas::doc::ItemStatus;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::StudioConfig;
use crate::poller::{self, PollError, PollOptions, PollOutcome, PollUpdate};
use crate::queue::{Task, TaskPatch, TaskQueue};
use crate::remote::SessionApi;

// =============================================================================
// TYPES
// =============================================================================

/// Receives task lifecycle events from the scheduler.
#[async_trait]
pub trait TaskListener: Send + Sync {
    /// Called for every status fetch, including the final one.
    async fn on_progress(&self, task: &Task, update: &PollUpdate);

    async fn on_completed(&self, task: &Task, outcome: &PollOutcome);

    /// Called once when a task fails or times out. Not called on cancel.
    async fn on_failed(&self, task: &Task, error: &PollError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub max_concurrent: usize,
    pub poll: PollOptions,
    pub drain_delay: Duration,
}

impl SchedulerOptions {
    #[must_use]
    pub fn from_config(config: &StudioConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            poll: PollOptions::from_config(config),
            drain_delay: config.drain_delay,
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    queue: TaskQueue,
    api: Arc<dyn SessionApi>,
    listener: Arc<dyn TaskListener>,
    options: SchedulerOptions,
    active: Mutex<HashMap<String, CancellationToken>>,
    draining: AtomicBool,
    shutdown: CancellationToken,
}

/// Clears the single-flight flag when a drain returns.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

impl Scheduler {
    #[must_use]
    pub fn new(
        queue: TaskQueue,
        api: Arc<dyn SessionApi>,
        listener: Arc<dyn TaskListener>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                queue,
                api,
                listener,
                options,
                active: Mutex::new(HashMap::new()),
                draining: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start pollers for waiting tasks up to the concurrency bound.
    ///
    /// Returns the number of pollers started. A drain that overlaps another
    /// drain, or runs after [`Scheduler::cancel_all`], starts nothing.
    /// Must be called from within a tokio runtime.
    pub fn drain(&self) -> usize {
        if self.inner.shutdown.is_cancelled() {
            return 0;
        }
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("scheduler: drain already running");
            return 0;
        }
        let _guard = DrainGuard(&self.inner.draining);

        let tasks = match self.inner.queue.get() {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "scheduler: queue read failed");
                return 0;
            }
        };

        // Only this drain adds to the active set; settling pollers only free
        // slots, so a snapshot is a safe lower bound.
        let running: HashSet<String> = self.active().keys().cloned().collect();
        let mut free = self.inner.options.max_concurrent.saturating_sub(running.len());
        let mut candidates: Vec<Task> = tasks
            .into_iter()
            .filter(|t| matches!(t.status, ItemStatus::Queued | ItemStatus::Processing))
            .filter(|t| !running.contains(&t.task_id))
            .collect();
        candidates.sort_by_key(|t| t.created_at);

        let mut started = 0;
        for task in candidates {
            if free == 0 {
                break;
            }
            let marked = self.inner.queue.update(&task.task_id, TaskPatch::status(ItemStatus::Processing));
            let task = match marked {
                Ok(task) => task,
                Err(e) => {
                    warn!(task_id = %task.task_id, error = %e, "scheduler: could not mark task processing");
                    continue;
                }
            };
            info!(task_id = %task.task_id, created_at = task.created_at, "scheduler: starting poller");
            // Held across the spawn so the supervisor cannot settle before the
            // token is registered.
            let mut active = self.active();
            let token = self.start(task.clone());
            active.insert(task.task_id, token);
            drop(active);
            free -= 1;
            started += 1;
        }
        started
    }

    /// Cancel every active poller and stop scheduling. Cancelled tasks stay
    /// in the queue for the next process to resume.
    pub fn cancel_all(&self) {
        self.inner.shutdown.cancel();
        let active = self.active();
        for (task_id, token) in active.iter() {
            debug!(%task_id, "scheduler: cancelling poller");
            token.cancel();
        }
        info!(count = active.len(), "scheduler: cancelled all pollers");
    }

    /// Cancel one task's poller, if it is running.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.active().get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active().len()
    }

    #[must_use]
    pub fn is_active(&self, task_id: &str) -> bool {
        self.active().contains_key(task_id)
    }

    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.inner.queue
    }

    fn active(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.inner.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a poller and its supervisor. Returns the poller's cancel token.
    fn start(&self, task: Task) -> CancellationToken {
        let (tx, mut rx) = mpsc::unbounded_channel::<PollUpdate>();
        let task_id = task.task_id.clone();
        let handle = poller::poll(
            Arc::clone(&self.inner.api),
            task.session_id.clone(),
            task.task_id.clone(),
            move |update| {
                if tx.send(update.clone()).is_err() {
                    debug!(task_id = %task_id, "scheduler: progress receiver gone");
                }
            },
            self.inner.options.poll,
        );
        let token = handle.token();

        let scheduler = self.clone();
        tokio::spawn(async move {
            let wait = handle.wait();
            tokio::pin!(wait);
            let result = loop {
                tokio::select! {
                    Some(update) = rx.recv() => scheduler.progress(&task, &update).await,
                    result = &mut wait => break result,
                }
            };
            while let Ok(update) = rx.try_recv() {
                scheduler.progress(&task, &update).await;
            }
            scheduler.settle(task, result).await;
        });
        token
    }

    async fn progress(&self, task: &Task, update: &PollUpdate) {
        if !update.status.is_terminal() {
            // Providers often keep answering `queued` after the drain marked
            // the task processing; keep the status, still record progress.
            let status = if task.status.can_advance_to(update.status) { update.status } else { task.status };
            let patch = TaskPatch::progress(status, update.progress);
            if let Err(e) = self.inner.queue.update(&task.task_id, patch) {
                warn!(task_id = %task.task_id, error = %e, "scheduler: progress not recorded");
            }
        }
        self.inner.listener.on_progress(task, update).await;
    }

    async fn settle(&self, task: Task, result: Result<PollOutcome, PollError>) {
        match &result {
            Ok(outcome) => {
                info!(task_id = %task.task_id, "scheduler: task completed");
                self.inner.listener.on_completed(&task, outcome).await;
            }
            Err(e) if e.is_cancelled() => {
                self.active().remove(&task.task_id);
                info!(task_id = %task.task_id, "scheduler: poller cancelled, task left queued");
                return;
            }
            Err(e) => {
                error!(task_id = %task.task_id, error = %e, "scheduler: task failed");
                self.inner.listener.on_failed(&task, e).await;
            }
        }

        if let Err(e) = self.inner.queue.remove(&task.task_id) {
            warn!(task_id = %task.task_id, error = %e, "scheduler: settled task not removed");
        }
        self.active().remove(&task.task_id);

        tokio::select! {
            () = self.inner.shutdown.cancelled() => {}
            () = tokio::time::sleep(self.inner.options.drain_delay) => {
                self.drain();
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
