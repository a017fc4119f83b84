//! Selection state: a primary item plus an ordered set of selected items.
//!
//! The primary id, when present, is always a member of the set. Selection is
//! UI-only and never persisted.

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use crate::doc::ItemId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    primary: Option<ItemId>,
    ids: Vec<ItemId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select exactly one item.
    pub fn select(&mut self, id: ItemId) {
        self.primary = Some(id);
        self.ids = vec![id];
    }

    /// Replace the selection with `ids`. The first becomes primary.
    pub fn select_many(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.ids.clear();
        for id in ids {
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
        self.primary = self.ids.first().copied();
    }

    /// Add `id` if absent, remove it if present.
    pub fn toggle(&mut self, id: ItemId) {
        if let Some(pos) = self.ids.iter().position(|s| *s == id) {
            self.ids.remove(pos);
            if self.primary == Some(id) {
                self.primary = self.ids.last().copied();
            }
        } else {
            self.ids.push(id);
            self.primary = Some(id);
        }
    }

    pub fn clear(&mut self) {
        self.primary = None;
        self.ids.clear();
    }

    /// Drop every selected id that `keep` rejects.
    pub fn retain(&mut self, mut keep: impl FnMut(&ItemId) -> bool) {
        self.ids.retain(|id| keep(id));
        if self.primary.is_some_and(|p| !self.ids.contains(&p)) {
            self.primary = self.ids.last().copied();
        }
    }

    #[must_use]
    pub fn primary(&self) -> Option<ItemId> {
        self.primary
    }

    #[must_use]
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
