//! Item registry: ids, z-order bands, visibility and selection.
//!
//! Z-orders form a total order over `(band, z)`; two items never share one.
//! Iteration is ascending, background band first.

mod selection;

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::{AxisId, AxisPair, CoordinateSystem, DataRect, DevicePoint};
use crate::error::{PlotError, PlotResult};
use crate::items::{ItemData, ItemHit, ItemId, ItemKind, ItemLookup, ItemRenderContext, PlotItem};

pub use selection::SelectionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    Background,
    Foreground,
}

/// Position in the paint order; background entries sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZOrder {
    pub band: Band,
    pub z: i64,
}

impl ZOrder {
    #[must_use]
    pub const fn new(band: Band, z: i64) -> Self {
        Self { band, z }
    }
}

/// Hit resolved against the whole scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub id: ItemId,
    pub hit: ItemHit,
}

#[derive(Debug, Clone)]
struct SceneEntry {
    item: PlotItem,
    z: ZOrder,
    seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    entries: IndexMap<ItemId, SceneEntry>,
    order: BTreeMap<ZOrder, ItemId>,
    selection: SelectionSet,
    next_id: u64,
    next_seq: u64,
    revision: u64,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped by structural changes (add, remove, z-order, selection).
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    fn top_of(&self, band: Band) -> i64 {
        let above_top = self
            .order
            .range(ZOrder::new(band, i64::MIN)..=ZOrder::new(band, i64::MAX))
            .next_back()
            .map_or(0, |(z, _)| z.z.saturating_add(1));
        self.free_slot(band, above_top)
    }

    /// First free z at or above `from`; below it once `i64::MAX` is reached.
    fn free_slot(&self, band: Band, from: i64) -> i64 {
        let taken = |z: i64| self.order.contains_key(&ZOrder::new(band, z));
        let mut z = from;
        while taken(z) {
            match z.checked_add(1) {
                Some(next) => z = next,
                None => {
                    z = from;
                    while taken(z) {
                        z = z.saturating_sub(1);
                    }
                    break;
                }
            }
        }
        z
    }

    fn insert(&mut self, item: PlotItem, z: ZOrder) -> ItemId {
        let id = ItemId::from_raw(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(%id, kind = item.kind().name(), band = ?z.band, z = z.z, "add item");
        self.order.insert(z, id);
        self.entries.insert(id, SceneEntry { item, z, seq });
        self.bump();
        id
    }

    /// Adds on top of the foreground band.
    pub fn add(&mut self, item: PlotItem) -> ItemId {
        self.add_to_band(item, Band::Foreground)
    }

    pub fn add_to_band(&mut self, item: PlotItem, band: Band) -> ItemId {
        let z = ZOrder::new(band, self.top_of(band));
        self.insert(item, z)
    }

    /// Adds at the first free z at or above `offset` in `band`.
    pub fn add_with_z_offset(&mut self, item: PlotItem, band: Band, offset: i64) -> ItemId {
        let z = self.free_slot(band, offset);
        self.insert(item, ZOrder::new(band, z))
    }

    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.entries.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&PlotItem> {
        self.entries.get(&id).map(|entry| &entry.item)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut PlotItem> {
        self.entries.get_mut(&id).map(|entry| &mut entry.item)
    }

    pub fn item(&self, id: ItemId) -> PlotResult<&PlotItem> {
        self.get(id).ok_or(PlotError::UnknownItem(id))
    }

    pub fn item_mut(&mut self, id: ItemId) -> PlotResult<&mut PlotItem> {
        self.get_mut(id).ok_or(PlotError::UnknownItem(id))
    }

    /// Ids whose `parent` is `id`.
    #[must_use]
    pub fn children_of(&self, id: ItemId) -> Vec<ItemId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.item.parent() == Some(id))
            .map(|(child, _)| *child)
            .collect()
    }

    /// Removes `id` and its children. Read-only items are refused.
    pub fn remove(&mut self, id: ItemId) -> PlotResult<Vec<ItemId>> {
        let item = self.item(id)?;
        if item.is_readonly() {
            return Err(PlotError::InvalidData(format!("{id} is read-only and cannot be removed")));
        }
        let mut removed = vec![id];
        let mut cursor = 0;
        while cursor < removed.len() {
            for child in self.children_of(removed[cursor]) {
                if !removed.contains(&child) {
                    removed.push(child);
                }
            }
            cursor += 1;
        }
        for gone in &removed {
            if let Some(entry) = self.entries.shift_remove(gone) {
                self.order.remove(&entry.z);
            }
            self.selection.forget(*gone);
        }
        debug!(%id, removed = removed.len(), "remove item");
        self.bump();
        Ok(removed)
    }

    /// Removes every item, read-only ones included.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.selection = SelectionSet::default();
        self.bump();
    }

    #[must_use]
    pub fn z_order(&self, id: ItemId) -> Option<ZOrder> {
        self.entries.get(&id).map(|entry| entry.z)
    }

    /// Places `id` at `z`; fails when another item already holds it.
    pub fn set_z_order(&mut self, id: ItemId, z: ZOrder) -> PlotResult<()> {
        let current = self.z_order(id).ok_or(PlotError::UnknownItem(id))?;
        if current == z {
            return Ok(());
        }
        if let Some(other) = self.order.get(&z) {
            return Err(PlotError::InvalidData(format!(
                "z-order {:?}/{} already taken by {other}",
                z.band, z.z
            )));
        }
        self.relocate(id, current, z);
        Ok(())
    }

    fn relocate(&mut self, id: ItemId, from: ZOrder, to: ZOrder) {
        self.order.remove(&from);
        self.order.insert(to, id);
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.z = to;
        }
        debug!(%id, band = ?to.band, z = to.z, "set z-order");
        self.bump();
    }

    /// Moves `id` to the top of `band`.
    pub fn set_band(&mut self, id: ItemId, band: Band) -> PlotResult<()> {
        let current = self.z_order(id).ok_or(PlotError::UnknownItem(id))?;
        if current.band == band {
            return Ok(());
        }
        let to = ZOrder::new(band, self.top_of(band));
        self.relocate(id, current, to);
        Ok(())
    }

    fn swap_with_neighbour(&mut self, id: ItemId, upward: bool) -> PlotResult<bool> {
        let current = self.z_order(id).ok_or(PlotError::UnknownItem(id))?;
        let band = ZOrder::new(current.band, i64::MIN)..=ZOrder::new(current.band, i64::MAX);
        let neighbour = if upward {
            self.order
                .range(band)
                .find(|(z, _)| **z > current)
                .map(|(z, other)| (*z, *other))
        } else {
            self.order
                .range(band)
                .rev()
                .find(|(z, _)| **z < current)
                .map(|(z, other)| (*z, *other))
        };
        let Some((other_z, other)) = neighbour else {
            return Ok(false);
        };
        self.order.insert(current, other);
        self.order.insert(other_z, id);
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.z = other_z;
        }
        if let Some(entry) = self.entries.get_mut(&other) {
            entry.z = current;
        }
        self.bump();
        Ok(true)
    }

    /// Swaps with the next item above in the same band; `false` at the top.
    pub fn move_up(&mut self, id: ItemId) -> PlotResult<bool> {
        self.swap_with_neighbour(id, true)
    }

    pub fn move_down(&mut self, id: ItemId) -> PlotResult<bool> {
        self.swap_with_neighbour(id, false)
    }

    /// All items in ascending z.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (ItemId, &PlotItem)> + '_ {
        self.order
            .values()
            .filter_map(|id| self.entries.get(id).map(|entry| (*id, &entry.item)))
    }

    /// Visible items in ascending z. Each call starts a fresh pass.
    pub fn iter_visible(&self) -> impl DoubleEndedIterator<Item = (ItemId, &PlotItem)> + '_ {
        self.iter().filter(|(_, item)| item.is_visible())
    }

    #[must_use]
    pub fn ids(&self) -> Vec<ItemId> {
        self.order.values().copied().collect()
    }

    // --- selection ---

    #[must_use]
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    #[must_use]
    pub fn is_selected(&self, id: ItemId) -> bool {
        self.selection.contains(id)
    }

    #[must_use]
    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.selection.ids().collect()
    }

    #[must_use]
    pub fn active(&self) -> Option<ItemId> {
        self.selection.active()
    }

    /// Selects `id` (replacing the selection unless `additive`) and makes it
    /// active. Returns whether the selection changed.
    pub fn select(&mut self, id: ItemId, additive: bool) -> PlotResult<bool> {
        let item = self.item(id)?;
        if !item.is_selectable() {
            return Ok(false);
        }
        let kind = item.kind();
        let mut changed = false;
        if !additive && !(self.selection.len() == 1 && self.selection.contains(id)) {
            changed |= self.selection.clear();
        }
        changed |= self.selection.insert(id, kind);
        changed |= self.selection.set_active(Some(id));
        if changed {
            trace!(%id, additive, "select");
            self.bump();
        }
        Ok(changed)
    }

    /// Toggles `id` in the selection (modifier click).
    pub fn toggle(&mut self, id: ItemId) -> PlotResult<bool> {
        if self.is_selected(id) {
            self.unselect(id)
        } else {
            self.select(id, true)
        }
    }

    pub fn unselect(&mut self, id: ItemId) -> PlotResult<bool> {
        if !self.contains(id) {
            return Err(PlotError::UnknownItem(id));
        }
        let changed = self.selection.remove(id);
        if changed {
            self.bump();
        }
        Ok(changed)
    }

    pub fn unselect_all(&mut self) -> bool {
        let changed = self.selection.clear();
        if changed {
            self.bump();
        }
        changed
    }

    /// Selects every visible selectable item; the top-most becomes active.
    pub fn select_all(&mut self) -> bool {
        let targets: Vec<(ItemId, ItemKind)> = self
            .iter_visible()
            .filter(|(_, item)| item.is_selectable())
            .map(|(id, item)| (id, item.kind()))
            .collect();
        self.select_some_with_kinds(&targets)
    }

    /// Replaces the selection with `ids` (unknown or unselectable ids are
    /// skipped); the last one becomes active.
    pub fn select_some(&mut self, ids: &[ItemId]) -> bool {
        let targets: Vec<(ItemId, ItemKind)> = ids
            .iter()
            .filter_map(|id| self.get(*id).filter(|item| item.is_selectable()).map(|item| (*id, item.kind())))
            .collect();
        self.select_some_with_kinds(&targets)
    }

    fn select_some_with_kinds(&mut self, targets: &[(ItemId, ItemKind)]) -> bool {
        let before = self.selection.clone();
        self.selection.clear();
        for (id, kind) in targets {
            self.selection.insert(*id, *kind);
        }
        self.selection.set_active(targets.last().map(|(id, _)| *id));
        let changed = self.selection != before;
        if changed {
            self.bump();
        }
        changed
    }

    /// Makes a selected item active. Returns whether it changed.
    pub fn set_active(&mut self, id: ItemId) -> PlotResult<bool> {
        if !self.is_selected(id) {
            self.select(id, true)?;
        }
        let changed = self.selection.set_active(Some(id));
        if changed {
            self.bump();
        }
        Ok(changed)
    }

    #[must_use]
    pub fn last_selected(&self, kind: ItemKind) -> Option<ItemId> {
        self.selection
            .last_selected(kind)
            .filter(|id| self.contains(*id))
    }

    // --- queries ---

    fn context<'a>(&'a self, coords: &'a CoordinateSystem, item: &PlotItem) -> ItemRenderContext<'a> {
        ItemRenderContext::new(coords, item.axes(), self)
    }

    /// Nearest selectable feature within `tolerance` px. Ties go to the higher
    /// z, then to the more recently added item. Items whose buffers went stale
    /// are skipped.
    pub fn hit_test(&self, coords: &CoordinateSystem, point: DevicePoint, tolerance: f64) -> Option<SceneHit> {
        let mut best: Option<(SceneHit, ZOrder, u64)> = None;
        for (id, item) in self.iter_visible().filter(|(_, item)| item.is_selectable()) {
            let hit = match item.hit_test(&self.context(coords, item), point, tolerance) {
                Ok(Some(hit)) => hit,
                Ok(None) => continue,
                Err(err) => {
                    trace!(%id, error = %err, "hit test skipped item");
                    continue;
                }
            };
            let Some(entry) = self.entries.get(&id) else {
                continue;
            };
            let candidate = (SceneHit { id, hit }, entry.z, entry.seq);
            let better = match &best {
                None => true,
                Some((current, z, seq)) => match hit.distance.total_cmp(&current.hit.distance) {
                    std::cmp::Ordering::Less => true,
                    std::cmp::Ordering::Greater => false,
                    std::cmp::Ordering::Equal => (entry.z, entry.seq) > (*z, *seq),
                },
            };
            if better {
                best = Some(candidate);
            }
        }
        best.map(|(hit, _, _)| hit)
    }

    /// Top-most item closer than `close_dist`, else the closest one overall.
    pub fn nearest_item(&self, coords: &CoordinateSystem, point: DevicePoint, close_dist: f64) -> Option<SceneHit> {
        let mut closest: Option<SceneHit> = None;
        for (id, item) in self.iter_visible().rev().filter(|(_, item)| item.is_selectable()) {
            let Ok(Some(hit)) = item.hit_test(&self.context(coords, item), point, f64::INFINITY) else {
                continue;
            };
            if hit.distance < close_dist {
                return Some(SceneHit { id, hit });
            }
            if closest.is_none_or(|c| hit.distance < c.hit.distance) {
                closest = Some(SceneHit { id, hit });
            }
        }
        closest
    }

    /// Top-most visible item whose closed outline contains `point`.
    pub fn nearest_inside(&self, coords: &CoordinateSystem, point: DevicePoint) -> Option<ItemId> {
        self.iter_visible()
            .rev()
            .filter(|(_, item)| item.is_selectable())
            .find(|(_, item)| item.contains(&self.context(coords, item), point).unwrap_or(false))
            .map(|(id, _)| id)
    }

    /// Union of the visible items' extents on `axes`, for auto-scale.
    pub fn data_bounds(&self, axes: AxisPair) -> Option<DataRect> {
        let mut bounds: Option<DataRect> = None;
        for (id, item) in self.iter_visible().filter(|(_, item)| item.axes() == axes) {
            match item.bounding_box() {
                Ok(Some(rect)) => bounds = Some(bounds.map_or(rect, |b| b.union(rect))),
                Ok(None) => {}
                Err(err) => trace!(%id, error = %err, "bounding box skipped item"),
            }
        }
        bounds
    }

    /// Axes referenced by at least one item.
    #[must_use]
    pub fn used_axes(&self) -> BTreeSet<AxisId> {
        self.entries
            .values()
            .flat_map(|entry| {
                let axes = entry.item.axes();
                [axes.x, axes.y]
            })
            .collect()
    }

    /// Distinct axis pairs of visible items.
    #[must_use]
    pub fn axis_pairs(&self) -> Vec<AxisPair> {
        let mut pairs: Vec<AxisPair> = Vec::new();
        for (_, item) in self.iter_visible() {
            if !pairs.contains(&item.axes()) {
                pairs.push(item.axes());
            }
        }
        pairs
    }
}

impl ItemLookup for Scene {
    fn lookup(&self, id: ItemId) -> Option<&PlotItem> {
        self.get(id)
    }

    fn curve_ids(&self) -> Vec<ItemId> {
        self.iter_visible()
            .filter(|(_, item)| matches!(item.data(), ItemData::Curve(_)))
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Band, Scene, ZOrder};
    use crate::core::{DataPoint, DataRect};
    use crate::items::{PlotItem, ShapeGeometry, ShapeItem};

    fn point(x: f64) -> PlotItem {
        PlotItem::new(ShapeItem::new(ShapeGeometry::Point(DataPoint::new(x, 0.0))).expect("shape"))
    }

    #[test]
    fn bands_order_iteration() {
        let mut scene = Scene::new();
        let front = scene.add(point(0.0));
        let back = scene.add_to_band(point(1.0), Band::Background);
        let order: Vec<_> = scene.iter_visible().map(|(id, _)| id).collect();
        assert_eq!(order, vec![back, front]);

        scene.set_band(back, Band::Foreground).expect("band");
        assert_eq!(scene.z_order(back), Some(ZOrder::new(Band::Foreground, 1)));
        let order: Vec<_> = scene.iter_visible().map(|(id, _)| id).collect();
        assert_eq!(order, vec![front, back]);
    }

    #[test]
    fn occupied_z_is_rejected() {
        let mut scene = Scene::new();
        let a = scene.add(point(0.0));
        let b = scene.add(point(1.0));
        assert!(scene.set_z_order(b, scene.z_order(a).expect("z")).is_err());
        assert!(scene.move_down(b).expect("move"));
        assert_eq!(scene.ids(), vec![b, a]);
        assert!(!scene.move_down(b).expect("bottom"));
    }

    #[test]
    fn z_slots_near_the_top_of_the_range_stay_distinct() {
        let mut scene = Scene::new();
        let a = scene.add_with_z_offset(point(0.0), Band::Foreground, i64::MAX - 1);
        let b = scene.add_with_z_offset(point(1.0), Band::Foreground, i64::MAX - 1);
        let c = scene.add(point(2.0));
        let d = scene.add_with_z_offset(point(3.0), Band::Foreground, i64::MAX);
        assert_eq!(scene.z_order(a), Some(ZOrder::new(Band::Foreground, i64::MAX - 1)));
        assert_eq!(scene.z_order(b), Some(ZOrder::new(Band::Foreground, i64::MAX)));
        assert_eq!(scene.z_order(c), Some(ZOrder::new(Band::Foreground, i64::MAX - 2)));
        assert_eq!(scene.z_order(d), Some(ZOrder::new(Band::Foreground, i64::MAX - 3)));
        assert_eq!(scene.len(), 4);
    }

    #[test]
    fn z_offset_skips_taken_slots() {
        let mut scene = Scene::new();
        scene.add_with_z_offset(point(0.0), Band::Foreground, 5);
        let second = scene.add_with_z_offset(point(1.0), Band::Foreground, 5);
        assert_eq!(scene.z_order(second), Some(ZOrder::new(Band::Foreground, 6)));
    }

    #[test]
    fn removal_takes_children_and_respects_readonly() {
        let mut scene = Scene::new();
        let parent = scene.add(PlotItem::new(
            ShapeItem::new(ShapeGeometry::Rectangle(DataRect::new(0.0, 1.0, 0.0, 1.0))).expect("rect"),
        ));
        let child = scene.add(point(0.5).with_parent(parent));
        let locked = scene.add(point(2.0).with_readonly(true));
        scene.select(child, false).expect("select");

        assert!(scene.remove(locked).is_err());
        let removed = scene.remove(parent).expect("remove");
        assert_eq!(removed, vec![parent, child]);
        assert!(scene.selected_ids().is_empty());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn select_some_makes_last_active() {
        let mut scene = Scene::new();
        let a = scene.add(point(0.0));
        let b = scene.add(point(1.0));
        assert!(scene.select_some(&[a, b]));
        assert_eq!(scene.active(), Some(b));
        scene.unselect(b).expect("unselect");
        assert_eq!(scene.active(), Some(a));
        assert!(scene.unselect_all());
        assert_eq!(scene.active(), None);
    }
}
