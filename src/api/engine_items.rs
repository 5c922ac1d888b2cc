use std::sync::Arc;

use tracing::debug;

use crate::core::{palette_preset, ArrayRef, DataRect, Palette};
use crate::error::{PlotError, PlotResult};
use crate::extensions::PlotEvent;
use crate::interaction::RegionFilter;
use crate::items::{
    curve_style_cycle, CurveItem, GridItem, HistogramItem, ImageFilterItem, ImageItem, ItemData,
    ItemId, ItemKind, LabelItem, PlotItem, ShapeGeometry, ShapeItem,
};
use crate::render::Renderer;
use crate::scene::{Band, ZOrder};

use super::{DataSlot, PlotEngine};

impl<R: Renderer> PlotEngine<R> {
    /// Adds `item` on top of the foreground band.
    pub fn add_item(&mut self, item: PlotItem) -> ItemId {
        self.add_item_to_band(item, Band::Foreground)
    }

    pub fn add_item_to_band(&mut self, item: PlotItem, band: Band) -> ItemId {
        let id = self.scene.add_to_band(item, band);
        self.emit(PlotEvent::ItemsAdded(vec![id]));
        id
    }

    /// Adds a curve styled from the shared style cycle and records the data
    /// keys of its adapters.
    pub fn add_curve(&mut self, x: (&str, ArrayRef), y: (&str, ArrayRef), title: &str) -> PlotResult<ItemId> {
        let cycle = curve_style_cycle();
        let curves = self
            .scene
            .iter()
            .filter(|(_, item)| item.kind() == ItemKind::Curve)
            .count();
        let mut curve = CurveItem::new(x.1, y.1)?;
        if let Some(style) = cycle.get(curves % cycle.len().max(1)) {
            curve = curve.with_style(*style);
        }
        let id = self.add_item(PlotItem::new(curve).with_title(title));
        self.data_keys.set(id, DataSlot::X, x.0);
        self.data_keys.set(id, DataSlot::Y, y.0);
        Ok(id)
    }

    /// Adds an image in the background band, colored with the configured
    /// default palette over its finite range.
    pub fn add_image(&mut self, key: &str, data: ArrayRef, extent: DataRect, title: &str) -> PlotResult<ItemId> {
        let image = ImageItem::new(data, extent)?.with_palette(self.default_palette()?);
        let id = self.add_item_to_band(PlotItem::new(image).with_title(title), Band::Background);
        self.data_keys.set(id, DataSlot::Pixels, key);
        Ok(id)
    }

    /// Adds a non-selectable grid under every other item.
    pub fn add_grid(&mut self, grid: GridItem) -> ItemId {
        let item = PlotItem::new(grid).with_selectable(false);
        let id = self.scene.add_with_z_offset(item, Band::Background, i64::MIN);
        self.emit(PlotEvent::ItemsAdded(vec![id]));
        id
    }

    /// Shows the pixels of `image` under `rect` through `filter`, on the
    /// image's axes.
    pub fn add_image_filter(&mut self, image: ItemId, rect: DataRect, filter: RegionFilter) -> PlotResult<ItemId> {
        let source = self.scene.item(image)?;
        if source.kind() != ItemKind::Image {
            return Err(PlotError::InvalidData(format!("{image} is not an image")));
        }
        let axes = source.axes();
        let item = ImageFilterItem::new(image, rect, filter)?;
        Ok(self.add_item(PlotItem::new(item).with_axes(axes)))
    }

    pub fn add_shape(&mut self, geometry: ShapeGeometry) -> PlotResult<ItemId> {
        let shape = ShapeItem::new(geometry)?;
        Ok(self.add_item(PlotItem::new(shape)))
    }

    /// Legend of the given items, or of every visible curve.
    pub fn add_legend(&mut self, items: Option<Vec<ItemId>>) -> PlotResult<ItemId> {
        if let Some(items) = &items {
            for id in items {
                self.scene.item(*id)?;
            }
        }
        Ok(self.add_item(PlotItem::new(LabelItem::legend(items)).with_title("legend")))
    }

    /// Removes `id` and its children. Read-only items are refused.
    pub fn remove_item(&mut self, id: ItemId) -> PlotResult<Vec<ItemId>> {
        let before_active = self.scene.active();
        let removed = self.scene.remove(id)?;
        let mut events = vec![PlotEvent::ItemsRemoved(removed.clone())];
        if self.scene.active() != before_active {
            events.push(PlotEvent::ActiveItemChanged(self.scene.active()));
        }
        self.emit_all(events);
        Ok(removed)
    }

    /// Removes every item, read-only ones included.
    pub fn clear_items(&mut self) {
        let removed = self.scene.ids();
        self.scene.clear();
        self.pipeline.clear_cache();
        if !removed.is_empty() {
            self.emit_all(vec![PlotEvent::ItemsRemoved(removed)]);
        }
    }

    /// Applies `edit` to the item and marks it dirty.
    pub fn update_item(&mut self, id: ItemId, edit: impl FnOnce(&mut PlotItem)) -> PlotResult<()> {
        let item = self.scene.item_mut(id)?;
        edit(item);
        item.touch();
        self.emit(PlotEvent::ItemCommitted(id));
        Ok(())
    }

    pub fn select(&mut self, id: ItemId, additive: bool) -> PlotResult<bool> {
        let before_active = self.scene.active();
        let changed = self.scene.select(id, additive)?;
        if changed {
            self.emit_selection(before_active);
        }
        Ok(changed)
    }

    pub fn select_all(&mut self) -> bool {
        let before_active = self.scene.active();
        let changed = self.scene.select_all();
        if changed {
            self.emit_selection(before_active);
        }
        changed
    }

    pub fn unselect_all(&mut self) -> bool {
        let before_active = self.scene.active();
        let changed = self.scene.unselect_all();
        if changed {
            self.emit_selection(before_active);
        }
        changed
    }

    pub fn set_active(&mut self, id: ItemId) -> PlotResult<bool> {
        let changed = self.scene.set_active(id)?;
        if changed {
            self.emit(PlotEvent::ActiveItemChanged(Some(id)));
        }
        Ok(changed)
    }

    /// Swaps `id` with its upper neighbour in z. Returns whether it moved.
    pub fn move_item_up(&mut self, id: ItemId) -> PlotResult<bool> {
        self.scene.move_up(id)
    }

    pub fn move_item_down(&mut self, id: ItemId) -> PlotResult<bool> {
        self.scene.move_down(id)
    }

    pub fn set_item_z_order(&mut self, id: ItemId, z: ZOrder) -> PlotResult<()> {
        self.scene.set_z_order(id, z)
    }

    /// Sets the contrast range of an image or 2D histogram. `lo > hi` is
    /// rejected; `lo == hi` gives a step LUT.
    pub fn set_contrast_range(&mut self, id: ItemId, lo: f64, hi: f64) -> PlotResult<()> {
        let item = self.scene.item_mut(id)?;
        let lut = match item.data_mut() {
            ItemData::Image(image) => image.lut_mut(),
            ItemData::Histogram(HistogramItem::TwoD(histogram)) => histogram.lut_mut(),
            _ => return Err(PlotError::InvalidData(format!("{id} has no lookup table"))),
        };
        lut.set_range(lo, hi)?;
        self.emit(PlotEvent::LutChanged { item: id, lo, hi });
        Ok(())
    }

    /// Recomputes an image's contrast range so the configured percentage of
    /// samples saturates on each tail.
    pub fn eliminate_outliers(&mut self, id: ItemId) -> PlotResult<(f64, f64)> {
        let (percent, bins) = (self.config.outlier_percent, self.config.outlier_bins);
        let item = self.scene.item_mut(id)?;
        let Some(image) = item.as_image_mut() else {
            return Err(PlotError::InvalidData(format!("{id} is not an image")));
        };
        let data = image.data().clone();
        let (lo, hi) = data.with_view(|view| image.lut_mut().eliminate_outliers(&view, percent, bins))??;
        debug!(%id, lo, hi, percent, "outliers eliminated");
        self.emit(PlotEvent::LutChanged { item: id, lo, hi });
        Ok((lo, hi))
    }

    pub fn set_image_palette(&mut self, id: ItemId, palette: &str) -> PlotResult<()> {
        let palette = self.palette_with_levels(palette)?;
        let item = self.scene.item_mut(id)?;
        let Some(image) = item.as_image_mut() else {
            return Err(PlotError::InvalidData(format!("{id} is not an image")));
        };
        image.lut_mut().set_palette(palette);
        let (lo, hi) = image.lut().range();
        self.emit(PlotEvent::LutChanged { item: id, lo, hi });
        Ok(())
    }

    fn default_palette(&self) -> PlotResult<Arc<Palette>> {
        self.palette_with_levels(&self.config.default_palette)
    }

    fn palette_with_levels(&self, name: &str) -> PlotResult<Arc<Palette>> {
        let preset = palette_preset(name)?;
        if preset.levels() == self.config.lut_levels {
            Ok(preset)
        } else {
            Ok(Arc::new(preset.resampled(self.config.lut_levels)?))
        }
    }

    fn emit_selection(&mut self, before_active: Option<ItemId>) {
        self.emit(PlotEvent::SelectionChanged {
            selected: self.scene.selected_ids(),
        });
        if self.scene.active() != before_active {
            self.emit(PlotEvent::ActiveItemChanged(self.scene.active()));
        }
    }
}
