use std::collections::HashMap;

use indexmap::IndexSet;

use crate::items::{ItemId, ItemKind};

/// Selected ids in selection order plus the single active item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    selected: IndexSet<ItemId>,
    active: Option<ItemId>,
    last_by_kind: HashMap<ItemKind, ItemId>,
}

impl SelectionSet {
    #[must_use]
    pub fn ids(&self) -> impl ExactSizeIterator<Item = ItemId> + '_ {
        self.selected.iter().copied()
    }

    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.selected.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    #[must_use]
    pub fn active(&self) -> Option<ItemId> {
        self.active
    }

    /// Most recently selected item of `kind`, even if since unselected.
    #[must_use]
    pub fn last_selected(&self, kind: ItemKind) -> Option<ItemId> {
        self.last_by_kind.get(&kind).copied()
    }

    pub(crate) fn insert(&mut self, id: ItemId, kind: ItemKind) -> bool {
        let inserted = self.selected.insert(id);
        self.last_by_kind.insert(kind, id);
        inserted
    }

    pub(crate) fn remove(&mut self, id: ItemId) -> bool {
        let removed = self.selected.shift_remove(&id);
        if self.active == Some(id) {
            self.active = self.selected.last().copied();
        }
        removed
    }

    pub(crate) fn clear(&mut self) -> bool {
        let changed = !self.selected.is_empty() || self.active.is_some();
        self.selected.clear();
        self.active = None;
        changed
    }

    pub(crate) fn set_active(&mut self, id: Option<ItemId>) -> bool {
        let changed = self.active != id;
        self.active = id;
        changed
    }

    /// Drops every trace of a removed item.
    pub(crate) fn forget(&mut self, id: ItemId) {
        self.remove(id);
        self.last_by_kind.retain(|_, last| *last != id);
    }
}
