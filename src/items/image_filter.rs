use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::{ArrayLayout, DataRect, SharedArray};
use crate::error::{PlotError, PlotResult};
use crate::interaction::RegionFilter;
use crate::items::{ImageItem, ImagePlacement, ItemId, ItemRenderContext, PlotItem, ShapeGeometry, ShapeItem};
use crate::render::ItemLayer;

/// Rectangle over a source image showing that image through a region filter.
///
/// The filter runs over the pixels under the rectangle on every render, so
/// edits to the source and moves or resizes of the rectangle show up on the
/// next frame. The source is only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFilterItem {
    source: ItemId,
    pub shape: ShapeItem,
    pub filter: RegionFilter,
}

impl ImageFilterItem {
    pub fn new(source: ItemId, rect: DataRect, filter: RegionFilter) -> PlotResult<Self> {
        if !rect.has_area() {
            return Err(PlotError::InvalidData("filter rectangle must have an area".to_owned()));
        }
        Ok(Self {
            source,
            shape: ShapeItem::new(ShapeGeometry::Rectangle(rect))?,
            filter,
        })
    }

    #[must_use]
    pub fn source(&self) -> ItemId {
        self.source
    }

    #[must_use]
    pub fn rect(&self) -> Option<DataRect> {
        self.shape.geometry.bounding_box()
    }

    pub(crate) fn remap_source(&mut self, remap: &HashMap<ItemId, ItemId>) {
        if let Some(id) = remap.get(&self.source) {
            self.source = *id;
        }
    }

    /// Filtered pixels of `image` under the rectangle, row-major, with the
    /// pixel rows and columns they came from.
    pub fn filtered(&self, image: &ImageItem) -> PlotResult<Option<(Range<usize>, Range<usize>, Vec<f64>)>> {
        let Some((rows, cols)) = self.rect().and_then(|rect| image.pixel_region(rect)) else {
            return Ok(None);
        };
        let values = image.with_view(|view| {
            let region = view.region(rows.clone(), cols.clone())?;
            self.filter.apply(&region)
        })??;
        Ok(Some((rows, cols, values)))
    }

    fn render_filtered(&self, ctx: &ItemRenderContext<'_>, image: &ImageItem, layer: &mut ItemLayer) -> PlotResult<()> {
        let Some((rows, cols, values)) = self.filtered(image)? else {
            return Ok(());
        };
        let placement = match image.placement() {
            ImagePlacement::Extent(_) => {
                let a = image.pixel_to_data(cols.start as f64, rows.start as f64);
                let b = image.pixel_to_data(cols.end as f64, rows.end as f64);
                ImagePlacement::Extent(DataRect::from_corners(a, b))
            }
            ImagePlacement::Coordinates { x, y } => ImagePlacement::Coordinates {
                x: x[cols.clone()].to_vec(),
                y: y[rows.clone()].to_vec(),
            },
            ImagePlacement::Transformed(_) | ImagePlacement::QuadGrid { .. } => {
                trace!(source = %self.source, "filter needs an axis-aligned source");
                return Ok(());
            }
        };
        let pixels = SharedArray::with_layout(values, ArrayLayout::contiguous_2d(rows.len(), cols.len()))?;
        let mut filtered = ImageItem::with_placement(pixels.adapter()?, placement)?;
        *filtered.lut_mut() = image.lut().clone();
        filtered.interpolation = image.interpolation;
        filtered.alpha = image.alpha;
        filtered.render(&ctx.selected(false), layer)
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) -> PlotResult<()> {
        match ctx.lookup.lookup(self.source).and_then(PlotItem::as_image) {
            Some(image) => self.render_filtered(ctx, image, layer)?,
            None => trace!(source = %self.source, "filter source is gone"),
        }
        self.shape.render(ctx, layer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ImageFilterItem;
    use crate::core::{DataRect, SharedArray};
    use crate::interaction::RegionFilter;
    use crate::items::{ImageItem, ItemId};

    #[test]
    fn filter_runs_over_the_pixels_under_the_rectangle() {
        let owner = SharedArray::from_vec_2d((0..16).map(f64::from).collect(), 4, 4).expect("owner");
        let image = ImageItem::new(owner.adapter().expect("adapter"), DataRect::new(0.0, 4.0, 0.0, 4.0)).expect("image");
        let threshold = RegionFilter::Threshold {
            level: 7.5,
            below: 0.0,
            above: 1.0,
        };
        let item = ImageFilterItem::new(ItemId::from_raw(1), DataRect::new(1.0, 3.0, 1.0, 3.0), threshold).expect("item");
        let (rows, cols, values) = item.filtered(&image).expect("read").expect("inside");
        assert_eq!((rows, cols), (1..3, 1..3));
        assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0]);
        // The source is left alone.
        assert_eq!(image.value_at(crate::core::DataPoint::new(1.5, 1.5)).expect("read"), Some(5.0));
    }

    #[test]
    fn rectangle_needs_an_area() {
        let flat = DataRect::new(1.0, 1.0, 0.0, 2.0);
        assert!(ImageFilterItem::new(ItemId::from_raw(1), flat, RegionFilter::default()).is_err());
    }
}
