//! Canvas handlers — move, resize, selection, view, copy, paste, delete, cut.
//!
//! DESIGN
//! ======
//! Every handler mutates the local [`CanvasSession`](crate::session::CanvasSession)
//! first and persists second. Move, resize and view changes go through the
//! debounced synchronizer. Paste persists each new item directly; a failed
//! create is logged and the local item stays. Edits to an item whose create
//! is still in flight are held by the session and scheduled once the remote
//! id arrives (see [`attach_remote_id`]). Delete is the one handler that
//! waits for the remote answer: items sit in the deleting state for a settle
//! delay, and a rejected batch delete leaves them on the canvas.
//!
//! Placeholders are derived state. [`reconcile_placeholders`] rebuilds them
//! from the queue and [`watch_queue`] reruns it on every queue change.

use canvas::camera::{Point, View};
use canvas::doc::{CanvasItem, ItemId, ItemKind, ItemPatch};
use canvas::geometry::{Rect, find_non_overlapping_position};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ActionError;
use crate::clipboard::ClipboardPayload;
use crate::queue::QueueError;
use crate::remote::types::NewCanvasItem;
use crate::session::CanvasSession;
use crate::state::StudioState;

// =============================================================================
// PLACEHOLDERS
// =============================================================================

/// Rebuild placeholders from the current queue. Returns how many exist.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
pub async fn reconcile_placeholders(state: &StudioState) -> Result<usize, QueueError> {
    let tasks = state.queue.get()?;
    let mut canvas = state.canvas.write().await;
    canvas.reconcile_placeholders(&tasks, state.config.placement_padding, state.config.placement_max_attempts);
    Ok(canvas.placeholders().len())
}

/// Reconcile placeholders after every queue change until `cancel` fires.
#[must_use]
pub fn watch_queue(state: StudioState, cancel: CancellationToken) -> JoinHandle<()> {
    let mut revisions = state.queue.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Err(e) = reconcile_placeholders(&state).await {
                        warn!(error = %e, "canvas: placeholder reconcile failed");
                    }
                }
            }
        }
        debug!("canvas: queue watcher stopped");
    })
}

// =============================================================================
// MOVE / RESIZE
// =============================================================================

/// Move an item and schedule its persistence.
///
/// # Errors
///
/// Returns `ItemNotFound` for an unknown id.
pub async fn move_item(state: &StudioState, id: ItemId, x: f64, y: f64) -> Result<(), ActionError> {
    let outgoing = {
        let mut canvas = state.canvas.write().await;
        let patch = canvas.move_item(&id, x, y).ok_or(ActionError::ItemNotFound(id))?;
        outgoing_patch(&mut canvas, id, patch)
    };
    if let Some((remote_id, patch)) = outgoing {
        state.sync.schedule_item(id, remote_id, patch);
    }
    Ok(())
}

/// Move and resize an item and schedule its persistence.
///
/// # Errors
///
/// Returns `ItemNotFound` for an unknown id.
pub async fn resize_item(state: &StudioState, id: ItemId, rect: Rect) -> Result<(), ActionError> {
    let outgoing = {
        let mut canvas = state.canvas.write().await;
        let patch = canvas.resize_item(&id, rect).ok_or(ActionError::ItemNotFound(id))?;
        outgoing_patch(&mut canvas, id, patch)
    };
    if let Some((remote_id, patch)) = outgoing {
        state.sync.schedule_item(id, remote_id, patch);
    }
    Ok(())
}

/// Pair a patch with the item's remote id, or hold it in the session until
/// the item has one. Decided under the same lock as the edit so a create
/// finishing concurrently cannot miss it.
fn outgoing_patch(canvas: &mut CanvasSession, id: ItemId, patch: ItemPatch) -> Option<(String, ItemPatch)> {
    if let Some(remote_id) = canvas.remote_id_for(&id).map(str::to_string) {
        return Some((remote_id, patch));
    }
    debug!(item_id = %id, "canvas: item not persisted yet, change held");
    canvas.defer_patch(id, patch);
    None
}

/// Record the remote id of a freshly created item and schedule any edits
/// made while the create was in flight.
pub(crate) async fn attach_remote_id(state: &StudioState, id: ItemId, remote_id: String) {
    let held = state.canvas.write().await.set_remote_id(id, remote_id.clone());
    if let Some(patch) = held {
        info!(item_id = %id, %remote_id, "canvas: flushing edits made before create finished");
        state.sync.schedule_item(id, remote_id, patch);
    }
}

// =============================================================================
// VIEW
// =============================================================================

pub async fn set_view(state: &StudioState, view: View) {
    let view = {
        let mut canvas = state.canvas.write().await;
        canvas.set_view(view);
        canvas.view()
    };
    state.sync.schedule_view(view);
}

pub async fn pan_by(state: &StudioState, dx: f64, dy: f64) {
    let view = {
        let mut canvas = state.canvas.write().await;
        canvas.pan_by(dx, dy);
        canvas.view()
    };
    state.sync.schedule_view(view);
}

pub async fn zoom_at(state: &StudioState, anchor: Point, zoom: f64) {
    let view = {
        let mut canvas = state.canvas.write().await;
        canvas.zoom_at(anchor, zoom);
        canvas.view()
    };
    state.sync.schedule_view(view);
}

// =============================================================================
// SELECTION
// =============================================================================

pub async fn select(state: &StudioState, id: ItemId) {
    state.canvas.write().await.select(id);
}

pub async fn toggle_selection(state: &StudioState, id: ItemId) {
    state.canvas.write().await.toggle_selection(id);
}

pub async fn select_all(state: &StudioState) {
    state.canvas.write().await.select_all();
}

pub async fn clear_selection(state: &StudioState) {
    state.canvas.write().await.clear_selection();
}

// =============================================================================
// COPY / PASTE
// =============================================================================

/// Copy the selected media items to the clipboard. Returns how many.
///
/// # Errors
///
/// Returns `NothingSelected` when no media item is selected, or the
/// clipboard error if the write fails.
pub async fn copy(state: &StudioState) -> Result<usize, ActionError> {
    let items: Vec<CanvasItem> = state
        .canvas
        .read()
        .await
        .selected_items()
        .into_iter()
        .filter(|item| item.kind != ItemKind::Placeholder && !item.url.is_empty())
        .collect();
    let payload = ClipboardPayload::from_items(items).ok_or(ActionError::NothingSelected)?;
    let count = payload.items().len();
    state.clipboard.write(&payload)?;
    info!(count, "canvas: copied");
    Ok(count)
}

/// Paste the clipboard contents as new items, each placed clear of every
/// item, placeholder, and earlier pasted item, starting at its source
/// position. The pasted items become the selection.
///
/// # Errors
///
/// Returns `ClipboardEmpty` if nothing was copied, or the clipboard error if
/// it cannot be read. Remote failures do not fail the paste.
pub async fn paste(state: &StudioState) -> Result<Vec<CanvasItem>, ActionError> {
    let payload = state.clipboard.read()?.ok_or(ActionError::ClipboardEmpty)?;
    let padding = state.config.placement_padding;
    let max_attempts = state.config.placement_max_attempts;

    let pasted: Vec<CanvasItem> = {
        let mut canvas = state.canvas.write().await;
        let mut occupied = canvas.occupied_rects();
        let mut pasted = Vec::with_capacity(payload.items().len());
        for source in payload.items() {
            let rect = find_non_overlapping_position(
                source.rect().size(),
                &occupied,
                source.x,
                source.y,
                max_attempts,
                padding,
            );
            occupied.push(rect);
            let item = CanvasItem::media(source.kind, source.url.clone(), rect, source.prompt.clone());
            canvas.insert_item(item.clone(), None);
            pasted.push(item);
        }
        canvas.clear_selection();
        for item in &pasted {
            canvas.toggle_selection(item.id);
        }
        pasted
    };
    info!(count = pasted.len(), "canvas: pasted");

    for item in &pasted {
        let body = NewCanvasItem {
            kind: item.kind,
            url: item.url.clone(),
            x: item.x,
            y: item.y,
            width: item.width,
            height: item.height,
            prompt: item.prompt.clone(),
        };
        match state.api.create_canvas_item(&state.session_id, &body).await {
            Ok(created) => attach_remote_id(state, item.id, created.canvas_item_id).await,
            Err(e) => warn!(item_id = %item.id, error = %e, "canvas: pasted item not persisted"),
        }
    }
    Ok(pasted)
}

// =============================================================================
// DELETE / CUT
// =============================================================================

/// Delete items after the settle delay. Returns how many were removed.
///
/// Items that were never persisted are removed locally only. If the remote
/// batch delete fails, nothing is removed and a notice is sent.
///
/// # Errors
///
/// Returns `NothingSelected` when none of `ids` is on the canvas, or the
/// remote error when the batch delete is rejected.
pub async fn delete_items(state: &StudioState, ids: &[ItemId]) -> Result<usize, ActionError> {
    let (targets, remote_ids) = {
        let mut canvas = state.canvas.write().await;
        let targets: Vec<ItemId> = ids.iter().copied().filter(|id| canvas.items().contains(id)).collect();
        canvas.mark_deleting(&targets);
        let remote_ids: Vec<String> =
            targets.iter().filter_map(|id| canvas.remote_id_for(id).map(str::to_string)).collect();
        (targets, remote_ids)
    };
    if targets.is_empty() {
        return Err(ActionError::NothingSelected);
    }

    tokio::time::sleep(state.config.delete_settle).await;

    if !remote_ids.is_empty() {
        if let Err(e) = state.api.batch_delete_canvas_items(&remote_ids).await {
            error!(count = targets.len(), error = %e, "canvas: delete rejected");
            state.canvas.write().await.clear_deleting(&targets);
            state.notices.error("Delete failed", &e);
            return Err(e.into());
        }
    }

    let removed = state.canvas.write().await.remove_items(&targets).len();
    info!(count = removed, "canvas: deleted");
    Ok(removed)
}

/// Delete the current selection.
///
/// # Errors
///
/// See [`delete_items`].
pub async fn delete_selected(state: &StudioState) -> Result<usize, ActionError> {
    let ids = state.canvas.read().await.selection().ids().to_vec();
    delete_items(state, &ids).await
}

/// Copy the selection, then delete it. The delete runs even if the copy
/// fails.
///
/// # Errors
///
/// Returns the delete error, if any.
pub async fn cut(state: &StudioState) -> Result<usize, ActionError> {
    if let Err(e) = copy(state).await {
        warn!(error = %e, "canvas: copy failed during cut");
    }
    delete_selected(state).await
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
