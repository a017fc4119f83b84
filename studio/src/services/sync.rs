//! Session synchronizer — debounced write-behind plus read-through hydration.
//!
//! DESIGN
//! ======
//! Local mutations apply immediately; persistence trails behind. A
//! [`Debouncer`] keeps at most one pending job per key and restarts its
//! timer on every new schedule, so a burst of changes to the same target
//! turns into one write after the burst goes quiet. The view and each item
//! are separate keys, so unrelated targets never delay each other.
//!
//! Item patches for the same item are merged while pending, so a move
//! followed by a resize persists both position and size.
//!
//! Hydration replaces local state wholesale from `getSessionDetail` and
//! enqueues generation jobs that are still running remotely.
//!
//! ERROR HANDLING
//! ==============
//! Debounced writes are best-effort: failures are logged at `warn` and not
//! retried. Hydration fails only if the session fetch fails.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use canvas::camera::{Point, View};
use canvas::consts::DEFAULT_ITEM_EDGE;
use canvas::doc::{CanvasItem, ItemId, ItemKind, ItemPatch};
use canvas::geometry::{Rect, Size};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::now_ms;
use crate::queue::Task;
use crate::remote::types::{GenerationRecord, RemoteCanvasItem, SessionPatch};
use crate::remote::{RemoteError, SessionApi};
use crate::services::canvas::reconcile_placeholders;
use crate::state::StudioState;

// =============================================================================
// DEBOUNCER
// =============================================================================

type PendingJobs<K> = HashMap<K, (u64, JoinHandle<()>)>;

/// Trailing-edge debounce keyed by `K`.
pub struct Debouncer<K> {
    delay: Duration,
    pending: Arc<Mutex<PendingJobs<K>>>,
    next_generation: Arc<AtomicU64>,
}

impl<K> Clone for Debouncer<K> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            pending: Arc::clone(&self.pending),
            next_generation: Arc::clone(&self.next_generation),
        }
    }
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: Arc::new(Mutex::new(HashMap::new())), next_generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Run `job` once `delay` passes without another schedule for `key`.
    /// A job that already started is not interrupted.
    pub fn schedule<F, Fut>(&self, key: K, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        let task_key = key.clone();

        // Held across the spawn so the new job cannot fire before it is registered.
        let mut jobs = lock(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut jobs = lock(&pending);
                if jobs.get(&task_key).is_none_or(|(g, _)| *g != generation) {
                    return;
                }
                jobs.remove(&task_key);
            }
            job().await;
        });
        if let Some((_, superseded)) = jobs.insert(key, (generation, handle)) {
            superseded.abort();
        }
    }

    /// Number of keys with a job still waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Drop every waiting job.
    pub fn cancel_all(&self) {
        for (_, (_, handle)) in lock(&self.pending).drain() {
            handle.abort();
        }
    }
}

fn lock<K>(pending: &Mutex<PendingJobs<K>>) -> MutexGuard<'_, PendingJobs<K>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// SESSION SYNC
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SyncKey {
    View,
    Item(ItemId),
}

/// Debounced persistence of the view and of item geometry.
#[derive(Clone)]
pub struct SessionSync {
    api: Arc<dyn SessionApi>,
    session_id: Arc<str>,
    debouncer: Debouncer<SyncKey>,
    patches: Arc<Mutex<HashMap<ItemId, ItemPatch>>>,
}

impl SessionSync {
    #[must_use]
    pub fn new(api: Arc<dyn SessionApi>, session_id: &str, delay: Duration) -> Self {
        Self {
            api,
            session_id: Arc::from(session_id),
            debouncer: Debouncer::new(delay),
            patches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Persist `view` once view changes go quiet.
    pub fn schedule_view(&self, view: View) {
        let api = Arc::clone(&self.api);
        let session_id = Arc::clone(&self.session_id);
        self.debouncer.schedule(SyncKey::View, move || async move {
            let patch = SessionPatch { canvas_view: view };
            match api.update_session(&session_id, &patch).await {
                Ok(()) => debug!(%session_id, zoom = view.zoom, "sync: view persisted"),
                Err(e) => warn!(%session_id, error = %e, "sync: view persist failed"),
            }
        });
    }

    /// Persist an item patch once changes to that item go quiet. Patches
    /// scheduled while one is pending are merged into it.
    pub fn schedule_item(&self, id: ItemId, remote_id: String, patch: ItemPatch) {
        {
            let mut patches = self.patches.lock().unwrap_or_else(PoisonError::into_inner);
            let merged = patches.get(&id).map_or(patch, |earlier| earlier.merge(patch));
            patches.insert(id, merged);
        }
        let api = Arc::clone(&self.api);
        let patches = Arc::clone(&self.patches);
        self.debouncer.schedule(SyncKey::Item(id), move || async move {
            let patch = patches.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
            let Some(patch) = patch.filter(|p| !p.is_empty()) else {
                return;
            };
            match api.update_canvas_item(&remote_id, &patch).await {
                Ok(()) => debug!(item_id = %remote_id, "sync: item persisted"),
                Err(e) => warn!(item_id = %remote_id, error = %e, "sync: item persist failed"),
            }
        });
    }

    /// Number of targets with a write still waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.debouncer.pending()
    }

    /// Drop every waiting write.
    pub fn cancel_all(&self) {
        self.debouncer.cancel_all();
        self.patches.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// =============================================================================
// HYDRATION
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrateReport {
    pub items: usize,
    pub messages: usize,
    /// Generation jobs added to the queue because they were still running.
    pub enqueued: usize,
}

/// Replace local state with the remote session and resume its pending jobs.
///
/// # Errors
///
/// Returns the remote error if the session cannot be fetched. Queue
/// failures while enqueuing are logged and skipped.
pub async fn hydrate(state: &StudioState) -> Result<HydrateReport, RemoteError> {
    let detail = state.api.get_session_detail(&state.session_id).await?;
    let view = detail.view.unwrap_or_default();

    let items: Vec<(CanvasItem, Option<String>)> = detail
        .items
        .iter()
        .filter(|item| item.kind != ItemKind::Placeholder)
        .map(|item| (local_item(item), Some(item.id.clone())))
        .collect();
    let mut report = HydrateReport { items: items.len(), messages: detail.messages.len(), enqueued: 0 };

    state.canvas.write().await.replace(items, view);
    state.transcript.write().await.replace(detail.messages);

    let queued = match state.queue.get() {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = %e, "hydrate: queue read failed, pending jobs not resumed");
            Vec::new()
        }
    };
    let origin = view.sanitized().placement_origin();
    for record in detail.generations.iter().filter(|g| !g.status.is_terminal()) {
        if queued.iter().any(|t| t.task_id == record.poll_id()) {
            continue;
        }
        let task = task_from_record(&state.session_id, record, origin);
        match state.queue.add(task) {
            Ok(()) => report.enqueued += 1,
            Err(e) => warn!(task_id = %record.poll_id(), error = %e, "hydrate: could not enqueue generation"),
        }
    }

    if let Err(e) = reconcile_placeholders(state).await {
        warn!(error = %e, "hydrate: placeholder reconcile failed");
    }
    info!(
        session_id = %state.session_id,
        items = report.items,
        messages = report.messages,
        enqueued = report.enqueued,
        "hydrate: session loaded"
    );
    Ok(report)
}

fn local_item(remote: &RemoteCanvasItem) -> CanvasItem {
    let rect = Rect::new(remote.x, remote.y, remote.width, remote.height);
    let mut item = CanvasItem::media(remote.kind, remote.url.clone(), rect, remote.prompt.clone());
    if let Ok(id) = Uuid::parse_str(&remote.id) {
        item.id = id;
    }
    item
}

/// Queue entry for a generation that is still running remotely. Records
/// without stored geometry are sized from their aspect ratio at `origin`.
fn task_from_record(session_id: &str, record: &GenerationRecord, origin: Point) -> Task {
    let aspect_ratio = record.aspect_ratio.clone().unwrap_or_else(|| "1:1".into());
    let rect = record.canvas_item.filter(|r| r.width > 0.0 && r.height > 0.0).unwrap_or_else(|| {
        let size = Size::from_aspect_ratio(&aspect_ratio, DEFAULT_ITEM_EDGE);
        Rect::from_size(origin.x, origin.y, size)
    });
    Task {
        task_id: record.poll_id().to_string(),
        message_id: record.message_id.clone().unwrap_or_default(),
        session_id: session_id.to_string(),
        prompt: record.prompt.clone(),
        model: record.model.clone(),
        aspect_ratio,
        quality: record.quality.clone(),
        style: record.style.clone(),
        status: record.status,
        progress: 0,
        created_at: record.created_at.unwrap_or_else(now_ms),
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
