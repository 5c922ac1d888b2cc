//! Plot items: a closed set of variants sharing one capability surface
//! (bounding box, hit test, render, move).
//!
//! Items hold [`ArrayRef`] adapters, never numeric data. Every mutation made
//! through [`PlotItem`] bumps its generation, which the render cache uses as
//! the per-item dirty flag.

mod annotation;
mod curve;
mod grid;
mod histogram;
mod image;
mod image_filter;
mod label;
mod shape;
mod style;

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

use crate::core::{ArrayRef, AxisPair, Color, CoordinateSystem, DataPoint, DataRect, DevicePoint};
use crate::error::{PlotError, PlotResult};
use crate::render::{ItemLayer, StrokeStyle};

pub use annotation::AnnotationItem;
pub use curve::{CurveItem, ErrorBars};
pub use grid::GridItem;
pub use histogram::{Histogram1DItem, Histogram2DItem, HistogramItem, HistogramOptions};
pub use image::{ImageItem, ImagePlacement};
pub use image_filter::ImageFilterItem;
pub use label::{
    Computation, Corner, LabelAnchor, LabelContent, LabelItem, RangeComputation, RegionComputation,
};
pub use shape::{ShapeGeometry, ShapeItem};
pub use style::{curve_style_cycle, CurveStyle, CurveType, ShapeStyle, TextStyle};

/// Stable item identifier, unique within one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Curve,
    Histogram,
    Image,
    Shape,
    Annotation,
    Label,
    Grid,
    ImageFilter,
}

impl ItemKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Curve => "curve",
            Self::Histogram => "histogram",
            Self::Image => "image",
            Self::Shape => "shape",
            Self::Annotation => "annotation",
            Self::Label => "label",
            Self::Grid => "grid",
            Self::ImageFilter => "image-filter",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ItemData {
    Curve(CurveItem),
    Histogram(HistogramItem),
    Image(ImageItem),
    Shape(ShapeItem),
    Annotation(AnnotationItem),
    Label(LabelItem),
    Grid(GridItem),
    ImageFilter(ImageFilterItem),
}

impl ItemData {
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Curve(_) => ItemKind::Curve,
            Self::Histogram(_) => ItemKind::Histogram,
            Self::Image(_) => ItemKind::Image,
            Self::Shape(_) => ItemKind::Shape,
            Self::Annotation(_) => ItemKind::Annotation,
            Self::Label(_) => ItemKind::Label,
            Self::Grid(_) => ItemKind::Grid,
            Self::ImageFilter(_) => ItemKind::ImageFilter,
        }
    }

    /// Shape geometry of shapes, annotations and image filters.
    #[must_use]
    pub fn geometry(&self) -> Option<&ShapeGeometry> {
        match self {
            Self::Shape(shape) => Some(&shape.geometry),
            Self::Annotation(annotation) => Some(&annotation.shape.geometry),
            Self::ImageFilter(filter) => Some(&filter.shape.geometry),
            _ => None,
        }
    }

    pub fn geometry_mut(&mut self) -> Option<&mut ShapeGeometry> {
        match self {
            Self::Shape(shape) => Some(&mut shape.geometry),
            Self::Annotation(annotation) => Some(&mut annotation.shape.geometry),
            Self::ImageFilter(filter) => Some(&mut filter.shape.geometry),
            _ => None,
        }
    }
}

macro_rules! impl_from_item_data {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ItemData {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_item_data!(
    Curve => CurveItem,
    Histogram => HistogramItem,
    Image => ImageItem,
    Shape => ShapeItem,
    Annotation => AnnotationItem,
    Label => LabelItem,
    Grid => GridItem,
    ImageFilter => ImageFilterItem,
);

/// Result of a successful hit test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemHit {
    /// Pixel distance to the nearest feature (0 inside filled areas).
    pub distance: f64,
    /// Control point under the pointer, if any.
    pub handle: Option<usize>,
    /// Pointer is inside a closed outline.
    pub inside: bool,
}

/// Displacement of a drag step in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveDelta {
    pub data: (f64, f64),
    pub device: (f64, f64),
}

/// Read access to sibling items (legends and computed labels).
pub trait ItemLookup {
    fn lookup(&self, id: ItemId) -> Option<&PlotItem>;

    /// Visible curve ids in ascending z.
    fn curve_ids(&self) -> Vec<ItemId>;
}

/// Lookup with no items.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoItems;

impl ItemLookup for NoItems {
    fn lookup(&self, _id: ItemId) -> Option<&PlotItem> {
        None
    }

    fn curve_ids(&self) -> Vec<ItemId> {
        Vec::new()
    }
}

/// Everything an item needs to project itself for one frame.
#[derive(Clone, Copy)]
pub struct ItemRenderContext<'a> {
    pub coords: &'a CoordinateSystem,
    pub axes: AxisPair,
    pub selected: bool,
    pub lookup: &'a dyn ItemLookup,
}

impl fmt::Debug for ItemRenderContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRenderContext")
            .field("axes", &self.axes)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl<'a> ItemRenderContext<'a> {
    #[must_use]
    pub fn new(coords: &'a CoordinateSystem, axes: AxisPair, lookup: &'a dyn ItemLookup) -> Self {
        Self {
            coords,
            axes,
            selected: false,
            lookup,
        }
    }

    #[must_use]
    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn to_device(&self, point: DataPoint) -> PlotResult<DevicePoint> {
        self.coords.data_to_device(self.axes, point)
    }

    pub fn to_data(&self, point: DevicePoint) -> PlotResult<DataPoint> {
        self.coords.device_to_data(self.axes, point)
    }

    /// Outline drawn around selected items without a style of their own.
    #[must_use]
    pub fn selection_stroke(&self) -> StrokeStyle {
        StrokeStyle::solid(Color::rgb(0.0, 1.0, 0.0), 2.0)
    }
}

/// One entry of a scene: common attributes plus variant data.
#[derive(Debug, Clone)]
pub struct PlotItem {
    title: String,
    axes: AxisPair,
    visible: bool,
    selectable: bool,
    readonly: bool,
    parent: Option<ItemId>,
    generation: u64,
    data: ItemData,
}

impl PlotItem {
    #[must_use]
    pub fn new(data: impl Into<ItemData>) -> Self {
        let data = data.into();
        Self {
            title: data.kind().name().to_owned(),
            axes: AxisPair::default(),
            visible: true,
            selectable: true,
            readonly: false,
            parent: None,
            generation: 0,
            data,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_axes(mut self, axes: AxisPair) -> Self {
        self.axes = axes;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    #[must_use]
    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.data.kind()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    #[must_use]
    pub fn axes(&self) -> AxisPair {
        self.axes
    }

    pub fn set_axes(&mut self, axes: AxisPair) {
        self.axes = axes;
        self.touch();
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.touch();
    }

    #[must_use]
    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
    }

    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    #[must_use]
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ItemId>) {
        self.parent = parent;
        self.touch();
    }

    /// Bumped by every mutation; render caches compare it.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks the item dirty without changing it (e.g. after a style edit
    /// made through a shared handle).
    pub fn touch(&mut self) {
        self.generation += 1;
        trace!(generation = self.generation, kind = self.kind().name(), "item touched");
    }

    /// Puts back a snapshot taken before a gesture. The generation keeps
    /// increasing so layers rendered from the discarded state never match.
    pub(crate) fn restore_from(&mut self, snapshot: PlotItem) {
        let generation = self.generation.max(snapshot.generation) + 1;
        *self = snapshot;
        self.generation = generation;
    }

    #[must_use]
    pub fn data(&self) -> &ItemData {
        &self.data
    }

    /// Mutable variant data; marks the item dirty.
    pub fn data_mut(&mut self) -> &mut ItemData {
        self.touch();
        &mut self.data
    }

    #[must_use]
    pub fn as_curve(&self) -> Option<&CurveItem> {
        match &self.data {
            ItemData::Curve(curve) => Some(curve),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_image(&self) -> Option<&ImageItem> {
        match &self.data {
            ItemData::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut ImageItem> {
        match self.data_mut() {
            ItemData::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Adapters read while rendering.
    #[must_use]
    pub fn adapters(&self) -> SmallVec<[&ArrayRef; 4]> {
        match &self.data {
            ItemData::Curve(curve) => curve.adapters(),
            ItemData::Histogram(histogram) => histogram.adapters().into_iter().collect(),
            ItemData::Image(image) => SmallVec::from_slice(&[image.data()]),
            _ => SmallVec::new(),
        }
    }

    /// Revision of the item's LUT, if it has one.
    #[must_use]
    pub fn lut_revision(&self) -> Option<u64> {
        match &self.data {
            ItemData::Image(image) => Some(image.lut().revision()),
            ItemData::Histogram(histogram) => histogram.lut().map(|lut| lut.revision()),
            _ => None,
        }
    }

    /// Content changes with other items or the view, so it is never cached.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        match &self.data {
            ItemData::Label(label) => label.is_dynamic(),
            ItemData::Shape(shape) => matches!(shape.geometry, ShapeGeometry::XRange { .. }),
            ItemData::Annotation(annotation) => {
                matches!(annotation.shape.geometry, ShapeGeometry::XRange { .. })
            }
            ItemData::Grid(_) | ItemData::ImageFilter(_) => true,
            _ => false,
        }
    }

    /// Data-space extent used by auto-scale.
    pub fn bounding_box(&self) -> PlotResult<Option<DataRect>> {
        match &self.data {
            ItemData::Curve(curve) => curve.bounding_box(),
            ItemData::Histogram(histogram) => histogram.bounding_box(),
            ItemData::Image(image) => Ok(Some(image.bounding_box())),
            ItemData::Shape(_) | ItemData::Annotation(_) | ItemData::ImageFilter(_) => {
                Ok(self.data.geometry().and_then(ShapeGeometry::bounding_box))
            }
            ItemData::Label(_) | ItemData::Grid(_) => Ok(None),
        }
    }

    /// Horizontal interval covered by a shape (x-ranges included).
    #[must_use]
    pub fn x_interval(&self) -> Option<(f64, f64)> {
        self.data.geometry().and_then(ShapeGeometry::x_interval)
    }

    pub fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> PlotResult<Option<ItemHit>> {
        match &self.data {
            ItemData::Curve(curve) => curve.hit_test(ctx, point, tolerance),
            ItemData::Histogram(histogram) => histogram.hit_test(ctx, point, tolerance),
            ItemData::Image(image) => image.hit_test(ctx, point, tolerance),
            ItemData::Shape(shape) => Ok(shape.hit_test(ctx, point, tolerance)),
            ItemData::Annotation(annotation) => Ok(annotation.hit_test(ctx, point, tolerance)),
            ItemData::Label(label) => Ok(label.hit_test(ctx, point, tolerance)),
            ItemData::ImageFilter(filter) => Ok(filter.shape.hit_test(ctx, point, tolerance)),
            ItemData::Grid(_) => Ok(None),
        }
    }

    /// Whether `point` lies inside a closed outline of the item.
    pub fn contains(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint) -> PlotResult<bool> {
        match &self.data {
            ItemData::Shape(shape) => Ok(shape.contains(ctx, point)),
            ItemData::Annotation(annotation) => Ok(annotation.shape.contains(ctx, point)),
            ItemData::Label(label) => Ok(label.contains(ctx, point)),
            ItemData::ImageFilter(filter) => Ok(filter.shape.contains(ctx, point)),
            ItemData::Curve(_) | ItemData::Grid(_) => Ok(false),
            _ => Ok(self.hit_test(ctx, point, 0.0)?.is_some_and(|hit| hit.inside)),
        }
    }

    pub fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) -> PlotResult<()> {
        match &self.data {
            ItemData::Curve(curve) => curve.render(ctx, layer),
            ItemData::Histogram(histogram) => histogram.render(ctx, layer),
            ItemData::Image(image) => image.render(ctx, layer),
            ItemData::Shape(shape) => {
                shape.render(ctx, layer);
                Ok(())
            }
            ItemData::Annotation(annotation) => {
                annotation.render(ctx, layer);
                Ok(())
            }
            ItemData::Label(label) => {
                label.render(ctx, layer);
                Ok(())
            }
            ItemData::Grid(grid) => {
                grid.render(ctx, layer);
                Ok(())
            }
            ItemData::ImageFilter(filter) => filter.render(ctx, layer),
        }
    }

    /// Whether dragging the item body moves it.
    #[must_use]
    pub fn is_movable(&self) -> bool {
        !self.readonly
            && matches!(
                self.data,
                ItemData::Image(_)
                    | ItemData::Shape(_)
                    | ItemData::Annotation(_)
                    | ItemData::Label(_)
                    | ItemData::ImageFilter(_)
            )
    }

    /// Translates movable items; returns whether anything moved.
    pub fn move_by(&mut self, delta: MoveDelta) -> bool {
        if !self.is_movable() {
            return false;
        }
        let (dx, dy) = delta.data;
        match self.data_mut() {
            ItemData::Image(image) => image.translate(dx, dy),
            ItemData::Shape(shape) => shape.geometry.translate(dx, dy),
            ItemData::Annotation(annotation) => annotation.shape.geometry.translate(dx, dy),
            ItemData::Label(label) => label.move_by(delta),
            ItemData::ImageFilter(filter) => filter.shape.geometry.translate(dx, dy),
            ItemData::Curve(_) | ItemData::Histogram(_) | ItemData::Grid(_) => return false,
        }
        true
    }

    /// Moves control point `handle` of a shape or annotation.
    pub fn move_handle(&mut self, handle: usize, to: DataPoint) -> PlotResult<()> {
        if self.readonly {
            return Err(PlotError::InvalidData(format!("{} is read-only", self.title)));
        }
        let Some(geometry) = self.data.geometry() else {
            return Err(PlotError::UnsupportedShape(format!(
                "{} items have no control points",
                self.kind().name()
            )));
        };
        let mut geometry = geometry.clone();
        geometry.move_handle(handle, to)?;
        if let Some(target) = self.data_mut().geometry_mut() {
            *target = geometry;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ItemKind, MoveDelta, PlotItem, ShapeGeometry, ShapeItem};
    use crate::core::{DataPoint, DataRect};

    #[test]
    fn mutations_bump_generation() {
        let shape = ShapeItem::new(ShapeGeometry::Rectangle(DataRect::new(0.0, 1.0, 0.0, 1.0))).expect("shape");
        let mut item = PlotItem::new(shape);
        assert_eq!(item.kind(), ItemKind::Shape);
        let before = item.generation();
        assert!(item.move_by(MoveDelta {
            data: (1.0, 1.0),
            device: (10.0, -10.0),
        }));
        assert!(item.generation() > before);
        assert_eq!(
            item.bounding_box().expect("bbox"),
            Some(DataRect::new(1.0, 2.0, 1.0, 2.0))
        );
    }

    #[test]
    fn readonly_items_do_not_move() {
        let shape = ShapeItem::new(ShapeGeometry::Point(DataPoint::new(0.0, 0.0))).expect("shape");
        let mut item = PlotItem::new(shape).with_readonly(true);
        assert!(!item.move_by(MoveDelta::default()));
        assert!(item.move_handle(0, DataPoint::new(1.0, 1.0)).is_err());
    }
}
