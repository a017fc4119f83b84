//! Document model: canvas items and the in-memory store that owns them.
//!
//! A `CanvasItem` is either finished media (image or video with a URL) or a
//! placeholder standing in for a generation task that has not completed.
//! Placeholders carry the task id, progress, and status; media items carry
//! neither. `ItemPatch` is the sparse transform update produced by move and
//! resize gestures. `ItemStore` keeps items in insertion order, which is
//! also stacking order.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Rect;

/// Local identifier for a canvas item.
pub type ItemId = Uuid;

/// What a canvas item displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Image,
    Video,
    /// Stand-in for a pending generation task. Has no URL.
    Placeholder,
}

/// Lifecycle of a generation task, mirrored onto its placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    /// `Completed` and `Failed` admit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the status monotonic.
    ///
    /// Staying put is allowed; leaving a terminal state is not, and neither
    /// is switching between the two terminal states.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }
}

/// A placed element on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasItem {
    pub id: ItemId,
    /// Media URL. Empty for placeholders.
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

impl CanvasItem {
    /// A finished image or video item with a fresh id.
    #[must_use]
    pub fn media(kind: ItemKind, url: impl Into<String>, rect: Rect, prompt: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            kind,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            prompt,
            task_id: None,
            progress: None,
            status: None,
        }
    }

    /// A placeholder for the given task.
    #[must_use]
    pub fn placeholder(
        id: ItemId,
        task_id: impl Into<String>,
        rect: Rect,
        prompt: Option<String>,
        status: ItemStatus,
        progress: u8,
    ) -> Self {
        Self {
            id,
            url: String::new(),
            kind: ItemKind::Placeholder,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            prompt,
            task_id: Some(task_id.into()),
            progress: Some(progress.min(100)),
            status: Some(status),
        }
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_rect(&mut self, rect: Rect) {
        self.x = rect.x;
        self.y = rect.y;
        self.width = rect.width;
        self.height = rect.height;
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.kind == ItemKind::Placeholder
    }
}

/// Sparse transform update. Only present fields are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl ItemPatch {
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    #[must_use]
    pub fn transform(rect: Rect) -> Self {
        Self { x: Some(rect.x), y: Some(rect.y), width: Some(rect.width), height: Some(rect.height) }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.width.is_none() && self.height.is_none()
    }

    /// Fold a later patch into this one; fields present in `later` win.
    #[must_use]
    pub fn merge(self, later: Self) -> Self {
        Self {
            x: later.x.or(self.x),
            y: later.y.or(self.y),
            width: later.width.or(self.width),
            height: later.height.or(self.height),
        }
    }
}

/// Ordered in-memory store of canvas items. Order is stacking order.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Vec<CanvasItem>,
}

impl ItemStore {
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Insert an item on top, or replace the item with the same id in place.
    pub fn insert(&mut self, item: CanvasItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            *existing = item;
        } else {
            self.items.push(item);
        }
    }

    /// Remove an item by id, returning it if it was present.
    pub fn remove(&mut self, id: &ItemId) -> Option<CanvasItem> {
        let idx = self.items.iter().position(|i| i.id == *id)?;
        Some(self.items.remove(idx))
    }

    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&CanvasItem> {
        self.items.iter().find(|i| i.id == *id)
    }

    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Apply a transform patch. Non-positive sizes are ignored so the
    /// width/height invariant holds. Returns false if the item doesn't exist.
    pub fn apply_patch(&mut self, id: &ItemId, patch: &ItemPatch) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == *id) else {
            return false;
        };
        if let Some(x) = patch.x {
            item.x = x;
        }
        if let Some(y) = patch.y {
            item.y = y;
        }
        if let Some(w) = patch.width.filter(|w| *w > 0.0) {
            item.width = w;
        }
        if let Some(h) = patch.height.filter(|h| *h > 0.0) {
            item.height = h;
        }
        true
    }

    /// Replace all items with a full snapshot.
    pub fn load_snapshot(&mut self, items: Vec<CanvasItem>) {
        self.items = items;
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Bounding rects of all items, in stacking order.
    #[must_use]
    pub fn rects(&self) -> Vec<Rect> {
        self.items.iter().map(CanvasItem::rect).collect()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|i| i.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanvasItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[CanvasItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
