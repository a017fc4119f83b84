//! Canvas session state — the local, optimistically mutated projection of
//! one remote session.
//!
//! DESIGN
//! ======
//! Items live in an ordered [`ItemStore`]. Placeholders are kept apart from
//! items and are never edited directly: [`CanvasSession::reconcile_placeholders`]
//! recomputes them from the durable queue on every queue change. Each task
//! keeps a stable placeholder id and, where it still fits, its previous
//! position. A task whose placeholder was completed or dropped is settled:
//! it may linger in the queue until the scheduler removes it, but it never
//! gets a placeholder again.
//!
//! Local ids are UUIDs. Items that exist remotely carry a mapping to their
//! remote id, which is what persistence calls use. Edits made before that
//! mapping exists are held and handed back by [`CanvasSession::set_remote_id`].

use std::collections::{HashMap, HashSet};

use canvas::camera::{Point, View};
use canvas::doc::{CanvasItem, ItemId, ItemKind, ItemPatch, ItemStatus, ItemStore};
use canvas::geometry::{Rect, find_non_overlapping_position, overlaps};
use canvas::selection::Selection;
use uuid::Uuid;

use crate::queue::Task;

#[derive(Debug, Clone)]
pub struct CanvasSession {
    session_id: String,
    items: ItemStore,
    placeholders: Vec<CanvasItem>,
    /// task id -> placeholder id, stable across reconciliations.
    placeholder_ids: HashMap<String, ItemId>,
    selection: Selection,
    view: View,
    remote_ids: HashMap<ItemId, String>,
    /// Patches for items not yet known remotely.
    deferred: HashMap<ItemId, ItemPatch>,
    deleting: HashSet<ItemId>,
    settled: HashSet<String>,
}

impl CanvasSession {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            items: ItemStore::new(),
            placeholders: Vec::new(),
            placeholder_ids: HashMap::new(),
            selection: Selection::new(),
            view: View::default(),
            remote_ids: HashMap::new(),
            deferred: HashMap::new(),
            deleting: HashSet::new(),
            settled: HashSet::new(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    #[must_use]
    pub fn placeholders(&self) -> &[CanvasItem] {
        &self.placeholders
    }

    #[must_use]
    pub fn placeholder_for_task(&self, task_id: &str) -> Option<&CanvasItem> {
        self.placeholders.iter().find(|p| p.task_id.as_deref() == Some(task_id))
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.view
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view.sanitized();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.view.pan_by(dx, dy);
    }

    pub fn zoom_at(&mut self, anchor: Point, zoom: f64) {
        self.view.zoom_at(anchor, zoom);
    }

    /// Rects of every item and placeholder.
    #[must_use]
    pub fn occupied_rects(&self) -> Vec<Rect> {
        let mut rects = self.items.rects();
        rects.extend(self.placeholders.iter().map(CanvasItem::rect));
        rects
    }

    // =========================================================================
    // ITEMS
    // =========================================================================

    pub fn insert_item(&mut self, item: CanvasItem, remote_id: Option<String>) {
        if let Some(remote_id) = remote_id {
            self.remote_ids.insert(item.id, remote_id);
        }
        self.items.insert(item);
    }

    /// Map an item to its remote id. Returns the edits made while the item
    /// had no remote id, which still need to be persisted.
    pub fn set_remote_id(&mut self, id: ItemId, remote_id: impl Into<String>) -> Option<ItemPatch> {
        self.remote_ids.insert(id, remote_id.into());
        self.deferred.remove(&id)
    }

    /// Hold a patch for an item that has no remote id yet.
    pub fn defer_patch(&mut self, id: ItemId, patch: ItemPatch) {
        if !self.items.contains(&id) || patch.is_empty() {
            return;
        }
        let merged = match self.deferred.remove(&id) {
            Some(earlier) => earlier.merge(patch),
            None => patch,
        };
        self.deferred.insert(id, merged);
    }

    #[must_use]
    pub fn deferred_patch(&self, id: &ItemId) -> Option<&ItemPatch> {
        self.deferred.get(id)
    }

    #[must_use]
    pub fn remote_id_for(&self, id: &ItemId) -> Option<&str> {
        self.remote_ids.get(id).map(String::as_str)
    }

    /// Move an item. Returns the patch to persist, or `None` for an unknown id.
    pub fn move_item(&mut self, id: &ItemId, x: f64, y: f64) -> Option<ItemPatch> {
        let patch = ItemPatch::position(x, y);
        self.items.apply_patch(id, &patch).then_some(patch)
    }

    /// Move and resize an item. Non-positive sizes keep the old size.
    pub fn resize_item(&mut self, id: &ItemId, rect: Rect) -> Option<ItemPatch> {
        let patch = ItemPatch::transform(rect);
        if !self.items.apply_patch(id, &patch) {
            return None;
        }
        let applied = self.items.get(id).map(CanvasItem::rect)?;
        Some(ItemPatch::transform(applied))
    }

    /// Remove items, pruning selection, remote ids, and deleting marks.
    pub fn remove_items(&mut self, ids: &[ItemId]) -> Vec<CanvasItem> {
        let removed: Vec<CanvasItem> = ids.iter().filter_map(|id| self.items.remove(id)).collect();
        for id in ids {
            self.remote_ids.remove(id);
            self.deferred.remove(id);
            self.deleting.remove(id);
        }
        self.selection.retain(|id| !ids.contains(id));
        removed
    }

    pub fn mark_deleting(&mut self, ids: &[ItemId]) {
        self.deleting.extend(ids.iter().filter(|id| self.items.contains(id)));
    }

    pub fn clear_deleting(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.deleting.remove(id);
        }
    }

    #[must_use]
    pub fn is_deleting(&self, id: &ItemId) -> bool {
        self.deleting.contains(id)
    }

    /// Replace every item and the view, as on hydration. Selection, marks,
    /// and placeholders start over; settled tasks stay settled.
    pub fn replace(&mut self, items: Vec<(CanvasItem, Option<String>)>, view: View) {
        self.items.clear();
        self.remote_ids.clear();
        self.deferred.clear();
        self.deleting.clear();
        self.selection.clear();
        self.placeholders.clear();
        self.placeholder_ids.clear();
        for (item, remote_id) in items {
            self.insert_item(item, remote_id);
        }
        self.view = view.sanitized();
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Select a single item. Unknown ids are ignored.
    pub fn select(&mut self, id: ItemId) {
        if self.items.contains(&id) {
            self.selection.select(id);
        }
    }

    /// Add or remove one item from the selection.
    pub fn toggle_selection(&mut self, id: ItemId) {
        if self.items.contains(&id) {
            self.selection.toggle(id);
        }
    }

    pub fn select_all(&mut self) {
        self.selection.select_many(self.items.ids());
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected items in selection order.
    #[must_use]
    pub fn selected_items(&self) -> Vec<CanvasItem> {
        self.selection.ids().iter().filter_map(|id| self.items.get(id)).cloned().collect()
    }

    // =========================================================================
    // PLACEHOLDERS
    // =========================================================================

    /// Recompute placeholders from the queue.
    ///
    /// Only pending, unsettled tasks of this session count, in queue order.
    /// Settled ids whose task has left the queue are forgotten. Each keeps
    /// its previous rect (or its task rect, the first time) unless that
    /// overlaps an item or an earlier placeholder, in which case a new cell
    /// is searched starting from the task's position.
    pub fn reconcile_placeholders(&mut self, tasks: &[Task], padding: f64, max_attempts: usize) {
        let previous: HashMap<String, Rect> = self
            .placeholders
            .iter()
            .filter_map(|p| p.task_id.clone().map(|t| (t, p.rect())))
            .collect();

        self.settled.retain(|settled| tasks.iter().any(|t| t.task_id == *settled));

        let mut occupied = self.items.rects();
        let mut placeholders = Vec::new();
        let mut ids = HashMap::new();

        let pending = tasks.iter().filter(|t| {
            t.session_id == self.session_id && !t.status.is_terminal() && !self.settled.contains(&t.task_id)
        });
        for task in pending {
            let wanted = previous.get(&task.task_id).copied().unwrap_or_else(|| task.rect());
            let rect = if occupied.iter().any(|r| overlaps(&wanted, r, padding)) {
                find_non_overlapping_position(wanted.size(), &occupied, task.x, task.y, max_attempts, padding)
            } else {
                wanted
            };
            occupied.push(rect);

            let id = self.placeholder_ids.get(&task.task_id).copied().unwrap_or_else(Uuid::new_v4);
            ids.insert(task.task_id.clone(), id);
            placeholders.push(CanvasItem::placeholder(
                id,
                task.task_id.clone(),
                rect,
                Some(task.prompt.clone()),
                task.status,
                task.progress,
            ));
        }

        self.placeholders = placeholders;
        self.placeholder_ids = ids;
    }

    #[must_use]
    pub fn is_settled(&self, task_id: &str) -> bool {
        self.settled.contains(task_id)
    }

    /// Reflect a progress update on a task's placeholder.
    pub fn update_placeholder(&mut self, task_id: &str, status: ItemStatus, progress: u8) -> bool {
        let Some(placeholder) = self.placeholders.iter_mut().find(|p| p.task_id.as_deref() == Some(task_id)) else {
            return false;
        };
        let current = placeholder.status.unwrap_or(ItemStatus::Queued);
        if !current.can_advance_to(status) {
            return false;
        }
        placeholder.status = Some(status);
        placeholder.progress = Some(progress.min(100));
        true
    }

    /// Swap a task's placeholder for a finished media item with the same
    /// geometry. Without a placeholder, `fallback` supplies the geometry.
    pub fn complete_placeholder(
        &mut self,
        task_id: &str,
        kind: ItemKind,
        url: &str,
        prompt: Option<String>,
        fallback: Rect,
    ) -> CanvasItem {
        let rect = match self.placeholders.iter().position(|p| p.task_id.as_deref() == Some(task_id)) {
            Some(index) => self.placeholders.remove(index).rect(),
            None => fallback,
        };
        self.placeholder_ids.remove(task_id);
        self.settled.insert(task_id.to_string());
        let item = CanvasItem::media(kind, url, rect, prompt);
        self.items.insert(item.clone());
        item
    }

    /// Drop a task's placeholder without replacing it.
    pub fn drop_placeholder(&mut self, task_id: &str) -> bool {
        let before = self.placeholders.len();
        self.placeholders.retain(|p| p.task_id.as_deref() != Some(task_id));
        self.placeholder_ids.remove(task_id);
        self.settled.insert(task_id.to_string());
        self.placeholders.len() != before
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
