use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{palette_preset, ArrayRef, AxisPair, CoordinateSystem, LutState, Palette};
use crate::error::{PlotError, PlotResult};
use crate::items::{
    AnnotationItem, CurveItem, CurveStyle, ErrorBars, GridItem, Histogram1DItem, Histogram2DItem,
    HistogramItem, HistogramOptions, ImageFilterItem, ImageItem, ImagePlacement, ItemData, ItemId,
    ItemKind, LabelItem, PlotItem, ShapeItem,
};
use crate::render::Interpolation;
use crate::scene::{Scene, ZOrder};

/// Role of an adapter inside an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataSlot {
    X,
    Y,
    XError,
    YError,
    /// Samples of a 1D histogram.
    Values,
    /// Image pixels.
    Pixels,
}

impl DataSlot {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::XError => "x-error",
            Self::YError => "y-error",
            Self::Values => "values",
            Self::Pixels => "pixels",
        }
    }
}

/// External names of the adapters held by items.
///
/// Documents reference data only through these keys; the host maps them back
/// to buffers on restore through a [`DataResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataKeys {
    keys: IndexMap<(ItemId, DataSlot), String>,
}

impl DataKeys {
    pub fn set(&mut self, item: ItemId, slot: DataSlot, key: impl Into<String>) {
        self.keys.insert((item, slot), key.into());
    }

    #[must_use]
    pub fn get(&self, item: ItemId, slot: DataSlot) -> Option<&str> {
        self.keys.get(&(item, slot)).map(String::as_str)
    }

    pub fn forget(&mut self, item: ItemId) {
        self.keys.retain(|(id, _), _| *id != item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn require(&self, item: ItemId, slot: DataSlot) -> PlotResult<String> {
        self.get(item, slot).map(str::to_owned).ok_or_else(|| {
            PlotError::InvalidData(format!("{item} has no data key for its {} adapter", slot.name()))
        })
    }

    fn optional(&self, item: ItemId, slot: DataSlot, present: bool) -> PlotResult<Option<String>> {
        if present {
            self.require(item, slot).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Maps data keys back to adapters when a document is restored.
pub trait DataResolver {
    fn resolve(&self, key: &str) -> PlotResult<ArrayRef>;
}

fn missing_key(key: &str) -> PlotError {
    PlotError::InvalidData(format!("data key `{key}` cannot be resolved"))
}

impl DataResolver for HashMap<String, ArrayRef> {
    fn resolve(&self, key: &str) -> PlotResult<ArrayRef> {
        self.get(key).cloned().ok_or_else(|| missing_key(key))
    }
}

impl DataResolver for IndexMap<String, ArrayRef> {
    fn resolve(&self, key: &str) -> PlotResult<ArrayRef> {
        self.get(key).cloned().ok_or_else(|| missing_key(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveScope {
    #[default]
    All,
    Selected,
}

/// Palette by preset name plus the LUT range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LutDocument {
    pub palette: String,
    pub levels: usize,
    pub lo: f64,
    pub hi: f64,
}

impl LutDocument {
    fn capture(lut: &LutState) -> Self {
        let (lo, hi) = lut.range();
        Self {
            palette: lut.palette().name().to_owned(),
            levels: lut.palette().levels(),
            lo,
            hi,
        }
    }

    /// Preset palette resampled to the saved level count; unknown names
    /// fall back to gray.
    fn palette(&self) -> PlotResult<Arc<Palette>> {
        let preset = palette_preset(&self.palette).or_else(|err| {
            warn!(palette = %self.palette, error = %err, "unknown palette, using gray");
            palette_preset("gray")
        })?;
        if preset.levels() == self.levels {
            return Ok(preset);
        }
        Ok(Arc::new(preset.resampled(self.levels)?))
    }

    fn apply(&self, lut: &mut LutState) -> PlotResult<()> {
        lut.set_palette(self.palette()?);
        lut.set_range(self.lo, self.hi)
    }
}

/// Variant data of a saved item, with adapters replaced by data keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPayload {
    Curve {
        x: String,
        y: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dx: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dy: Option<String>,
        style: CurveStyle,
    },
    Histogram {
        data: String,
        options: HistogramOptions,
        style: CurveStyle,
    },
    Histogram2d {
        x: String,
        y: String,
        nx: usize,
        ny: usize,
        log_scale: bool,
        lut: LutDocument,
        alpha: f64,
    },
    Image {
        data: String,
        placement: ImagePlacement,
        lut: LutDocument,
        interpolation: Interpolation,
        alpha: f64,
    },
    Shape(ShapeItem),
    Annotation(AnnotationItem),
    Label(LabelItem),
    Grid(GridItem),
    /// The source is referenced by its saved id and re-linked on restore.
    ImageFilter(ImageFilterItem),
}

impl ItemPayload {
    fn capture(id: ItemId, data: &ItemData, keys: &DataKeys) -> PlotResult<Self> {
        Ok(match data {
            ItemData::Curve(curve) => Self::Curve {
                x: keys.require(id, DataSlot::X)?,
                y: keys.require(id, DataSlot::Y)?,
                dx: keys.optional(id, DataSlot::XError, curve.errors().is_some_and(|e| e.dx.is_some()))?,
                dy: keys.optional(id, DataSlot::YError, curve.errors().is_some_and(|e| e.dy.is_some()))?,
                style: curve.style,
            },
            ItemData::Histogram(HistogramItem::OneD(histogram)) => Self::Histogram {
                data: keys.require(id, DataSlot::Values)?,
                options: histogram.options(),
                style: histogram.style,
            },
            ItemData::Histogram(HistogramItem::TwoD(histogram)) => {
                let (nx, ny) = histogram.bins();
                Self::Histogram2d {
                    x: keys.require(id, DataSlot::X)?,
                    y: keys.require(id, DataSlot::Y)?,
                    nx,
                    ny,
                    log_scale: histogram.log_scale,
                    lut: LutDocument::capture(histogram.lut()),
                    alpha: histogram.alpha,
                }
            }
            ItemData::Image(image) => Self::Image {
                data: keys.require(id, DataSlot::Pixels)?,
                placement: image.placement().clone(),
                lut: LutDocument::capture(image.lut()),
                interpolation: image.interpolation,
                alpha: image.alpha,
            },
            ItemData::Shape(shape) => Self::Shape(shape.clone()),
            ItemData::Annotation(annotation) => Self::Annotation(annotation.clone()),
            ItemData::Label(label) => Self::Label(label.clone()),
            ItemData::Grid(grid) => Self::Grid(grid.clone()),
            ItemData::ImageFilter(filter) => {
                if filter.filter.is_custom() {
                    return Err(PlotError::InvalidData(format!("{id} uses a closure filter, which cannot be saved")));
                }
                Self::ImageFilter(filter.clone())
            }
        })
    }

    /// Rebuilds the item data and the keys its adapters came from.
    fn rebuild(&self, resolver: &dyn DataResolver) -> PlotResult<(ItemData, Vec<(DataSlot, String)>)> {
        let mut used = Vec::new();
        let mut fetch = |slot: DataSlot, key: &str| -> PlotResult<ArrayRef> {
            let adapter = resolver.resolve(key)?;
            used.push((slot, key.to_owned()));
            Ok(adapter)
        };
        let data = match self {
            Self::Curve { x, y, dx, dy, style } => {
                let mut curve = CurveItem::new(fetch(DataSlot::X, x)?, fetch(DataSlot::Y, y)?)?.with_style(*style);
                if dx.is_some() || dy.is_some() {
                    let errors = ErrorBars {
                        dx: dx.as_deref().map(|key| fetch(DataSlot::XError, key)).transpose()?,
                        dy: dy.as_deref().map(|key| fetch(DataSlot::YError, key)).transpose()?,
                    };
                    curve = curve.with_errors(errors)?;
                }
                ItemData::Curve(curve)
            }
            Self::Histogram { data, options, style } => {
                let mut histogram = Histogram1DItem::new(fetch(DataSlot::Values, data)?, *options)?;
                histogram.style = *style;
                ItemData::Histogram(HistogramItem::OneD(histogram))
            }
            Self::Histogram2d {
                x,
                y,
                nx,
                ny,
                log_scale,
                lut,
                alpha,
            } => {
                let mut histogram = Histogram2DItem::new(fetch(DataSlot::X, x)?, fetch(DataSlot::Y, y)?, *nx, *ny)?;
                histogram.log_scale = *log_scale;
                histogram.alpha = *alpha;
                lut.apply(histogram.lut_mut())?;
                ItemData::Histogram(HistogramItem::TwoD(histogram))
            }
            Self::Image {
                data,
                placement,
                lut,
                interpolation,
                alpha,
            } => {
                let mut image = ImageItem::with_placement(fetch(DataSlot::Pixels, data)?, placement.clone())?;
                image.interpolation = *interpolation;
                image.alpha = *alpha;
                lut.apply(image.lut_mut())?;
                ItemData::Image(image)
            }
            Self::Shape(shape) => ItemData::Shape(shape.clone()),
            Self::Annotation(annotation) => ItemData::Annotation(annotation.clone()),
            Self::Label(label) => ItemData::Label(label.clone()),
            Self::Grid(grid) => ItemData::Grid(grid.clone()),
            Self::ImageFilter(filter) => ItemData::ImageFilter(filter.clone()),
        };
        Ok((data, used))
    }
}

/// Saved item: common attributes, paint position and variant payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDocument {
    /// Id at save time; only used to re-link parents and label references.
    pub id: ItemId,
    pub title: String,
    pub axes: AxisPair,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub selectable: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ItemId>,
    pub z: ZOrder,
    pub payload: ItemPayload,
}

fn default_true() -> bool {
    true
}

/// Structured description of a plot: geometry, style, transforms and LUTs of
/// its items plus the coordinate state. Numeric data is referenced by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<CoordinateSystem>,
    pub items: Vec<ItemDocument>,
}

impl PlotDocument {
    /// Describes the items of `scene` in paint order. Fails when an item
    /// holds an adapter without a data key.
    pub fn capture(
        scene: &Scene,
        coords: Option<&CoordinateSystem>,
        scope: SaveScope,
        keys: &DataKeys,
    ) -> PlotResult<Self> {
        let mut items = Vec::new();
        for (id, item) in scene.iter() {
            if scope == SaveScope::Selected && !scene.is_selected(id) {
                continue;
            }
            let Some(z) = scene.z_order(id) else {
                continue;
            };
            items.push(ItemDocument {
                id,
                title: item.title().to_owned(),
                axes: item.axes(),
                visible: item.is_visible(),
                selectable: item.is_selectable(),
                readonly: item.is_readonly(),
                parent: item.parent(),
                z,
                payload: ItemPayload::capture(id, item.data(), keys)?,
            });
        }
        debug!(items = items.len(), ?scope, "plot document captured");
        Ok(Self {
            coordinates: coords.cloned(),
            items,
        })
    }

    /// Adds the saved items to `scene` and records their data keys.
    ///
    /// Every item is rebuilt before the scene is touched, so a missing key or
    /// invalid payload leaves the scene unchanged. Returns the new ids in
    /// document order.
    pub fn restore(&self, scene: &mut Scene, resolver: &dyn DataResolver, keys: &mut DataKeys) -> PlotResult<Vec<ItemId>> {
        let mut rebuilt = Vec::with_capacity(self.items.len());
        for (index, saved) in self.items.iter().enumerate() {
            let (data, used) = saved.payload.rebuild(resolver)?;
            let mut item = PlotItem::new(data)
                .with_title(saved.title.clone())
                .with_axes(saved.axes)
                .with_selectable(saved.selectable)
                .with_readonly(saved.readonly);
            item.set_visible(saved.visible);
            rebuilt.push((index, item, used));
        }
        rebuilt.sort_by_key(|(index, _, _)| self.items[*index].z);

        let mut new_ids = vec![None; self.items.len()];
        let mut remap = HashMap::with_capacity(self.items.len());
        for (index, item, used) in rebuilt {
            let saved = &self.items[index];
            let id = scene.add_with_z_offset(item, saved.z.band, saved.z.z);
            for (slot, key) in used {
                keys.set(id, slot, key);
            }
            remap.insert(saved.id, id);
            new_ids[index] = Some(id);
        }

        for (saved, id) in self.items.iter().zip(&new_ids) {
            let Some(id) = *id else {
                continue;
            };
            let item = scene.item_mut(id)?;
            if let Some(parent) = saved.parent {
                item.set_parent(Some(remap.get(&parent).copied().unwrap_or(parent)));
            }
            match item.kind() {
                ItemKind::Label => {
                    if let ItemData::Label(label) = item.data_mut() {
                        label.remap_items(&remap);
                    }
                }
                ItemKind::ImageFilter => {
                    if let ItemData::ImageFilter(filter) = item.data_mut() {
                        filter.remap_source(&remap);
                    }
                }
                _ => {}
            }
        }
        debug!(items = remap.len(), "plot document restored");
        Ok(new_ids.into_iter().flatten().collect())
    }

    pub fn to_json_pretty(&self) -> PlotResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PlotError::Serialization(format!("failed to serialize plot document: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{DataKeys, DataSlot, PlotDocument, SaveScope};
    use crate::core::{ArrayRef, DataRect, SharedArray};
    use crate::interaction::RegionFilter;
    use crate::items::{CurveItem, GridItem, ImageFilterItem, ImageItem, LabelItem, PlotItem, ShapeGeometry, ShapeItem};
    use crate::scene::Scene;

    #[test]
    fn curve_without_key_cannot_be_saved() {
        let x = SharedArray::from_vec(vec![0.0f64, 1.0]);
        let y = SharedArray::from_vec(vec![1.0f64, 2.0]);
        let mut scene = Scene::new();
        scene.add(PlotItem::new(
            CurveItem::new(x.adapter().expect("x"), y.adapter().expect("y")).expect("curve"),
        ));
        let result = PlotDocument::capture(&scene, None, SaveScope::All, &DataKeys::default());
        assert!(result.is_err());
    }

    #[test]
    fn restore_keeps_scene_untouched_on_missing_key() {
        let pixels = SharedArray::from_vec_2d(vec![0.0f64, 1.0, 2.0, 3.0], 2, 2).expect("pixels");
        let mut scene = Scene::new();
        let image = scene.add(PlotItem::new(
            ImageItem::new(pixels.adapter().expect("adapter"), DataRect::new(0.0, 2.0, 0.0, 2.0)).expect("image"),
        ));
        scene.add(PlotItem::new(
            ShapeItem::new(ShapeGeometry::Point(crate::core::DataPoint::new(1.0, 1.0))).expect("shape"),
        ));
        let mut keys = DataKeys::default();
        keys.set(image, DataSlot::Pixels, "frame");
        let document = PlotDocument::capture(&scene, None, SaveScope::All, &keys).expect("capture");

        let mut target = Scene::new();
        let empty: HashMap<String, ArrayRef> = HashMap::new();
        assert!(document.restore(&mut target, &empty, &mut DataKeys::default()).is_err());
        assert!(target.is_empty());
    }

    #[test]
    fn image_filter_follows_its_source_through_a_restore() {
        let pixels = SharedArray::from_vec_2d(vec![0.0f64, 1.0, 2.0, 3.0], 2, 2).expect("pixels");
        let mut scene = Scene::new();
        scene.add(PlotItem::new(ShapeItem::new(ShapeGeometry::Point(crate::core::DataPoint::new(0.0, 0.0))).expect("pad")));
        let image = scene.add(PlotItem::new(
            ImageItem::new(pixels.adapter().expect("adapter"), DataRect::new(0.0, 2.0, 0.0, 2.0)).expect("image"),
        ));
        let filter = ImageFilterItem::new(image, DataRect::new(0.0, 1.0, 0.0, 1.0), RegionFilter::BoxMean { radius: 1 })
            .expect("filter item");
        scene.add(PlotItem::new(filter));
        scene.add(PlotItem::new(GridItem::default()));
        let mut keys = DataKeys::default();
        keys.set(image, DataSlot::Pixels, "frame");
        let document = PlotDocument::capture(&scene, None, SaveScope::All, &keys).expect("capture");
        let json = document.to_json_pretty().expect("json");
        let document: PlotDocument = serde_json::from_str(&json).expect("parse");

        let mut resolver = HashMap::new();
        resolver.insert("frame".to_owned(), pixels.adapter().expect("frame"));
        let mut target = Scene::new();
        let ids = document
            .restore(&mut target, &resolver, &mut DataKeys::default())
            .expect("restore");
        assert_eq!(ids.len(), 4);
        let crate::items::ItemData::ImageFilter(restored) = target.item(ids[2]).expect("filter").data() else {
            panic!("expected an image filter");
        };
        assert_eq!(restored.source(), ids[1]);
        assert_eq!(restored.filter, RegionFilter::BoxMean { radius: 1 });
        assert_eq!(target.item(ids[3]).expect("grid").kind(), crate::items::ItemKind::Grid);
    }

    #[test]
    fn closure_filters_cannot_be_saved() {
        let mut scene = Scene::new();
        let filter = ImageFilterItem::new(
            crate::items::ItemId::from_raw(7),
            DataRect::new(0.0, 1.0, 0.0, 1.0),
            RegionFilter::custom(|region| vec![0.0; region.shape().len()]),
        )
        .expect("filter item");
        scene.add(PlotItem::new(filter));
        assert!(PlotDocument::capture(&scene, None, SaveScope::All, &DataKeys::default()).is_err());
    }

    #[test]
    fn legend_references_follow_new_ids() {
        let x = SharedArray::from_vec(vec![0.0f64, 1.0]);
        let mut scene = Scene::new();
        scene.add(PlotItem::new(ShapeItem::new(ShapeGeometry::Point(crate::core::DataPoint::new(0.0, 0.0))).expect("pad")));
        let curve = scene.add(PlotItem::new(
            CurveItem::new(x.adapter().expect("x"), x.adapter().expect("y")).expect("curve"),
        ));
        scene.add(PlotItem::new(LabelItem::legend(Some(vec![curve]))));
        let mut keys = DataKeys::default();
        keys.set(curve, DataSlot::X, "t");
        keys.set(curve, DataSlot::Y, "t");
        let document = PlotDocument::capture(&scene, None, SaveScope::All, &keys).expect("capture");

        let mut resolver = HashMap::new();
        resolver.insert("t".to_owned(), x.adapter().expect("t"));
        let mut target = Scene::new();
        let mut restored_keys = DataKeys::default();
        let ids = document.restore(&mut target, &resolver, &mut restored_keys).expect("restore");
        assert_eq!(ids.len(), 3);
        let label = target.item(ids[2]).expect("label");
        let crate::items::ItemData::Label(label) = label.data() else {
            panic!("expected a label");
        };
        assert_eq!(label.content, crate::items::LabelContent::Legend { items: Some(vec![ids[1]]) });
        assert_eq!(restored_keys.get(ids[1], DataSlot::Y), Some("t"));
    }
}
