//! Durable task queue — pending generation jobs that survive restarts.
//!
//! DESIGN
//! ======
//! The queue is a JSON array of [`Task`] in a single file. Every operation
//! takes the process-wide lock, reads the whole list, applies its change,
//! and writes the whole list back (temp file + rename), so the file is
//! always the source of truth and concurrent writers are last-write-wins
//! per call. `open` purges terminal tasks; whatever is left re-enters the
//! schedule.
//!
//! Every successful mutation bumps a revision on a `watch` channel so
//! placeholder reconciliation can rerun on each change.
//!
//! ERROR HANDLING
//! ==============
//! IO and serde failures surface as [`QueueError`]. Logical violations
//! (duplicate id, status moving backwards) are refused with their own
//! variants and leave the file untouched.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use canvas::doc::ItemStatus;
use canvas::geometry::Rect;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

/// A pending generation job tracked by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    /// Assistant message that receives this task's updates.
    pub message_id: String,
    pub session_id: String,
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub status: ItemStatus,
    #[serde(default)]
    pub progress: u8,
    /// Milliseconds since the Unix epoch; orders the schedule.
    pub created_at: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Task {
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Partial update applied by [`TaskQueue::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub status: Option<ItemStatus>,
    pub progress: Option<u8>,
}

impl TaskPatch {
    #[must_use]
    pub fn status(status: ItemStatus) -> Self {
        Self { status: Some(status), progress: None }
    }

    #[must_use]
    pub fn progress(status: ItemStatus, progress: u8) -> Self {
        Self { status: Some(status), progress: Some(progress) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("queue file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("task {0} is already queued")]
    Duplicate(String),
    #[error("task {0} is not queued")]
    NotFound(String),
    #[error("task {task_id} cannot move from {from:?} to {to:?}")]
    StatusRegression { task_id: String, from: ItemStatus, to: ItemStatus },
    #[error("queue is closed")]
    Closed,
}

impl ErrorCode for QueueError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_QUEUE_IO",
            Self::Serde(_) => "E_QUEUE_SERDE",
            Self::Duplicate(_) => "E_QUEUE_DUPLICATE",
            Self::NotFound(_) => "E_QUEUE_NOT_FOUND",
            Self::StatusRegression { .. } => "E_QUEUE_STATUS_REGRESSION",
            Self::Closed => "E_QUEUE_CLOSED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

// =============================================================================
// QUEUE
// =============================================================================

/// Handle to the durable queue. Cheap to clone; clones share the lock.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    path: PathBuf,
    lock: Mutex<()>,
    closed: AtomicBool,
    revision: watch::Sender<u64>,
}

impl TaskQueue {
    /// Open the queue at `path`, creating parent directories as needed, and
    /// purge tasks that already reached a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or rewritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tasks = read_tasks(&path)?;
        let before = tasks.len();
        let pending: Vec<Task> = tasks.into_iter().filter(|t| !t.status.is_terminal()).collect();
        write_tasks(&path, &pending)?;
        info!(path = %path.display(), pending = pending.len(), purged = before - pending.len(), "queue: opened");

        let (revision, _) = watch::channel(0);
        let inner = QueueInner { path, lock: Mutex::new(()), closed: AtomicBool::new(false), revision };
        Ok(Self { inner: Arc::new(inner) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Every task currently queued, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is closed or the file cannot be read.
    pub fn get(&self) -> Result<Vec<Task>, QueueError> {
        let _guard = self.lock()?;
        read_tasks(&self.inner.path)
    }

    /// Append a task.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if a task with the same id is already queued.
    pub fn add(&self, task: Task) -> Result<(), QueueError> {
        self.mutate(|tasks| {
            if tasks.iter().any(|t| t.task_id == task.task_id) {
                return Err(QueueError::Duplicate(task.task_id.clone()));
            }
            tasks.push(task);
            Ok(true)
        })
    }

    /// Apply a patch to one task. Status may stay or advance, never regress.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `StatusRegression` when the
    /// patch would move the status backwards or out of a terminal state.
    pub fn update(&self, task_id: &str, patch: TaskPatch) -> Result<Task, QueueError> {
        let mut updated = None;
        self.mutate(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.task_id == task_id)
                .ok_or_else(|| QueueError::NotFound(task_id.to_string()))?;
            if let Some(status) = patch.status {
                if !task.status.can_advance_to(status) {
                    warn!(%task_id, from = ?task.status, to = ?status, "queue: status regression refused");
                    return Err(QueueError::StatusRegression {
                        task_id: task_id.to_string(),
                        from: task.status,
                        to: status,
                    });
                }
                task.status = status;
            }
            if let Some(progress) = patch.progress {
                task.progress = progress.min(100);
            }
            updated = Some(task.clone());
            Ok(true)
        })?;
        updated.ok_or_else(|| QueueError::NotFound(task_id.to_string()))
    }

    /// Remove a task. Removing an absent task is a no-op that returns `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or rewritten.
    pub fn remove(&self, task_id: &str) -> Result<bool, QueueError> {
        let mut removed = false;
        self.mutate(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.task_id != task_id);
            removed = tasks.len() != before;
            Ok(removed)
        })?;
        Ok(removed)
    }

    /// Rewrite the file and sync it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is closed or the write fails.
    pub fn flush(&self) -> Result<(), QueueError> {
        let _guard = self.lock()?;
        let tasks = read_tasks(&self.inner.path)?;
        write_tasks(&self.inner.path, &tasks)
    }

    /// Flush and refuse all further operations on every clone of this handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails. The queue is closed either way.
    pub fn close(&self) -> Result<(), QueueError> {
        let result = self.flush();
        self.inner.closed.store(true, Ordering::SeqCst);
        info!(path = %self.inner.path.display(), "queue: closed");
        result
    }

    /// Revision counter bumped after every successful mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, QueueError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        Ok(self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Locked read-modify-write. `change` returns whether it modified the
    /// list; unchanged lists are not rewritten.
    fn mutate<F>(&self, change: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<bool, QueueError>,
    {
        let guard = self.lock()?;
        let mut tasks = read_tasks(&self.inner.path)?;
        if change(&mut tasks)? {
            write_tasks(&self.inner.path, &tasks)?;
            drop(guard);
            self.inner.revision.send_modify(|rev| *rev += 1);
        }
        Ok(())
    }
}

// =============================================================================
// FILE IO
// =============================================================================

fn read_tasks(path: &Path) -> Result<Vec<Task>, QueueError> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_tasks(path: &Path, tasks: &[Task]) -> Result<(), QueueError> {
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(tasks)?;
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
