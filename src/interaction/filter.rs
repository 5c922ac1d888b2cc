use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::{ArrayRef, ArrayViewMut, CoordinateSystem, DataRect, DevicePoint, RegionStats, RegionView};
use crate::error::{PlotError, PlotResult};
use crate::extensions::PlotEvent;
use crate::interaction::{rubber_band, GestureTool, Modifiers, ToolContext};
use crate::items::{ImageFilterItem, ItemId, ItemKind, PlotItem};
use crate::render::ItemLayer;
use crate::scene::Scene;

/// Closure filters receive the region view and return `rows * cols` values
/// in row-major order.
pub type FilterFn = dyn Fn(&RegionView<'_>) -> Vec<f64> + Send + Sync;

/// Built-in filters serialize; closure filters cannot be saved.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionFilter {
    /// Mean over a `(2r+1)^2` window clipped to the region.
    BoxMean { radius: usize },
    /// `below` where the value is under `level`, `above` otherwise.
    Threshold { level: f64, below: f64, above: f64 },
    #[serde(skip)]
    Custom(Arc<FilterFn>),
}

impl PartialEq for RegionFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::BoxMean { radius: a }, Self::BoxMean { radius: b }) => a == b,
            (
                Self::Threshold { level, below, above },
                Self::Threshold {
                    level: other_level,
                    below: other_below,
                    above: other_above,
                },
            ) => level == other_level && below == other_below && above == other_above,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for RegionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoxMean { radius } => f.debug_struct("BoxMean").field("radius", radius).finish(),
            Self::Threshold { level, below, above } => f
                .debug_struct("Threshold")
                .field("level", level)
                .field("below", below)
                .field("above", above)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Default for RegionFilter {
    fn default() -> Self {
        Self::BoxMean { radius: 1 }
    }
}

impl RegionFilter {
    pub fn custom(f: impl Fn(&RegionView<'_>) -> Vec<f64> + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Applies the filter to `region`; non-finite inputs stay non-finite.
    pub fn apply(&self, region: &RegionView<'_>) -> PlotResult<Vec<f64>> {
        let shape = region.shape();
        let values = match self {
            Self::BoxMean { radius } => box_mean(region, *radius),
            Self::Threshold { level, below, above } => region
                .rows()
                .flatten()
                .map(|v| match v {
                    v if !v.is_finite() => v,
                    v if v < *level => *below,
                    _ => *above,
                })
                .collect(),
            Self::Custom(f) => f(region),
        };
        if values.len() != shape.len() {
            return Err(PlotError::InvalidData(format!(
                "filter produced {} values for a {}x{} region",
                values.len(),
                shape.rows,
                shape.cols
            )));
        }
        Ok(values)
    }
}

fn box_mean(region: &RegionView<'_>, radius: usize) -> Vec<f64> {
    let shape = region.shape();
    let mut out = Vec::with_capacity(shape.len());
    for row in 0..shape.rows {
        let rows = row.saturating_sub(radius)..(row + radius + 1).min(shape.rows);
        for col in 0..shape.cols {
            let cols = col.saturating_sub(radius)..(col + radius + 1).min(shape.cols);
            let (mut sum, mut count) = (0.0, 0usize);
            for r in rows.clone() {
                for c in cols.clone() {
                    if let Some(v) = region.element_at(r, c).filter(|v| v.is_finite()) {
                        sum += v;
                        count += 1;
                    }
                }
            }
            out.push(if count == 0 { f64::NAN } else { sum / count as f64 });
        }
    }
    out
}

fn write_region(view: &mut ArrayViewMut<'_>, values: &[f64], origin: (usize, usize), width: usize) {
    for (i, value) in values.iter().enumerate() {
        view.set(origin.0 + i / width, origin.1 + i % width, *value);
    }
}

/// Where filtered values go.
#[derive(Debug, Clone, Default)]
pub enum FilterOutput {
    /// Statistics of the filtered region only.
    #[default]
    Report,
    /// Filtered values kept in the result, source untouched.
    Separate,
    /// Written into a caller-owned buffer of the source's shape, at the
    /// region's position.
    Buffer(ArrayRef),
    /// Overwrites the source pixels. Mutates caller data under the buffer's
    /// write lock; refused for read-only items.
    InPlace,
    /// Adds an [`ImageFilterItem`] over the rectangle, which keeps filtering
    /// the source as it changes or as the item is moved.
    Item,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub image: ItemId,
    pub rows: Range<usize>,
    pub cols: Range<usize>,
    /// Row-major filtered values for [`FilterOutput::Separate`].
    pub values: Option<Vec<f64>>,
    pub stats: Option<RegionStats>,
    /// Item added for [`FilterOutput::Item`].
    pub item: Option<ItemId>,
}

#[derive(Debug, Clone, Copy, Default)]
enum FilterState {
    #[default]
    Idle,
    Defining { start: DevicePoint, current: DevicePoint },
}

/// Drag a rectangle over an image; on release the filter runs over that
/// sub-rectangle only.
#[derive(Debug, Clone, Default)]
pub struct FilterTool {
    filter: RegionFilter,
    output: FilterOutput,
    image: Option<ItemId>,
    state: FilterState,
    last: Option<FilterResult>,
}

impl FilterTool {
    #[must_use]
    pub fn new(filter: RegionFilter, output: FilterOutput) -> Self {
        Self {
            filter,
            output,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_image(mut self, image: ItemId) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn filter(&self) -> &RegionFilter {
        &self.filter
    }

    #[must_use]
    pub fn output(&self) -> &FilterOutput {
        &self.output
    }

    /// Result of the last committed rectangle.
    #[must_use]
    pub fn last_result(&self) -> Option<&FilterResult> {
        self.last.as_ref()
    }

    /// Configured image, else the active or last selected image, else the
    /// topmost visible one.
    pub fn target(&self, scene: &Scene) -> Option<ItemId> {
        let is_image = |id: &ItemId| scene.get(*id).is_some_and(|item| item.kind() == ItemKind::Image);
        self.image
            .filter(is_image)
            .or_else(|| scene.active().filter(is_image))
            .or_else(|| scene.last_selected(ItemKind::Image))
            .or_else(|| {
                scene
                    .iter_visible()
                    .rev()
                    .find(|(_, item)| item.kind() == ItemKind::Image)
                    .map(|(id, _)| id)
            })
    }

    /// Runs the filter over the pixels of `image` under `rect`. `None` when
    /// the rectangle misses the image.
    pub fn apply(&mut self, scene: &mut Scene, image: ItemId, rect: DataRect) -> PlotResult<Option<FilterResult>> {
        let item = scene.item(image)?;
        let readonly = item.is_readonly();
        let Some(source) = item.as_image() else {
            return Err(PlotError::InvalidData(format!("{image} is not an image")));
        };
        let Some((rows, cols)) = source.pixel_region(rect) else {
            trace!(%image, "filter rectangle outside image");
            return Ok(None);
        };
        let data = source.data().clone();
        let values = data.with_view(|view| {
            let region = view.region(rows.clone(), cols.clone())?;
            self.filter.apply(&region)
        })??;
        let stats = RegionStats::from_values(values.iter().copied());
        let width = cols.len();
        let origin = (rows.start, cols.start);

        let mut added = None;
        let values = match &self.output {
            FilterOutput::Report => None,
            FilterOutput::Separate => Some(values.clone()),
            FilterOutput::Buffer(target) => {
                if target.shape() != data.shape() {
                    return Err(PlotError::InvalidData(
                        "filter output buffer must match the source shape".to_owned(),
                    ));
                }
                target.with_view_mut(|view| write_region(view, &values, origin, width))?;
                None
            }
            FilterOutput::InPlace => {
                if readonly {
                    return Err(PlotError::InvalidData(format!("{image} is read-only")));
                }
                data.with_view_mut(|view| write_region(view, &values, origin, width))?;
                scene.item_mut(image)?.touch();
                None
            }
            FilterOutput::Item => {
                let axes = scene.item(image)?.axes();
                let item = ImageFilterItem::new(image, rect, self.filter.clone())?;
                added = Some(scene.add(PlotItem::new(item).with_axes(axes)));
                None
            }
        };
        debug!(%image, rows = rows.len(), cols = width, "region filter applied");
        let result = FilterResult {
            image,
            rows,
            cols,
            values,
            stats,
            item: added,
        };
        self.last = Some(result.clone());
        Ok(Some(result))
    }
}

impl GestureTool for FilterTool {
    fn is_busy(&self) -> bool {
        matches!(self.state, FilterState::Defining { .. })
    }

    fn pointer_down(&mut self, _ctx: &mut ToolContext<'_>, position: DevicePoint, _modifiers: Modifiers) -> PlotResult<()> {
        self.state = FilterState::Defining {
            start: position,
            current: position,
        };
        Ok(())
    }

    fn pointer_move(&mut self, _ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        if let FilterState::Defining { current, .. } = &mut self.state {
            *current = position;
        }
        Ok(())
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        let FilterState::Defining { start, .. } = std::mem::take(&mut self.state) else {
            return Ok(());
        };
        if (position.x - start.x).abs() < 1.0 || (position.y - start.y).abs() < 1.0 {
            trace!("zero-area filter rectangle ignored");
            return Ok(());
        }
        let Some(image) = self.target(ctx.scene) else {
            return Ok(());
        };
        let axes = ctx.scene.item(image)?.axes();
        let (Ok(a), Ok(b)) = (
            ctx.coords.device_to_data(axes, start),
            ctx.coords.device_to_data(axes, position),
        ) else {
            return Ok(());
        };
        if let Some(result) = self.apply(ctx.scene, image, DataRect::from_corners(a, b))? {
            if let Some(item) = result.item {
                ctx.events.push(PlotEvent::ItemsAdded(vec![item]));
            }
            ctx.events.push(PlotEvent::FilterApplied {
                item: image,
                rows: result.rows.len(),
                cols: result.cols.len(),
            });
        }
        Ok(())
    }

    fn cancel(&mut self, _ctx: &mut ToolContext<'_>) -> PlotResult<()> {
        self.state = FilterState::Idle;
        Ok(())
    }

    fn overlay(&self, _coords: &CoordinateSystem, _scene: &Scene) -> Option<ItemLayer> {
        match self.state {
            FilterState::Defining { start, current } => Some(rubber_band(start, current)),
            FilterState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RegionFilter;
    use crate::core::SharedArray;

    #[test]
    fn box_mean_clips_window_to_region() {
        let owner = SharedArray::from_vec_2d(vec![1.0f64, 2.0, 3.0, 4.0], 2, 2).expect("array");
        let values = owner
            .with_view(|view| {
                let region = view.region(0..2, 0..2).expect("region");
                RegionFilter::BoxMean { radius: 1 }.apply(&region)
            })
            .expect("read")
            .expect("filter");
        assert_eq!(values, vec![2.5; 4]);
    }

    #[test]
    fn threshold_keeps_nan() {
        let owner = SharedArray::from_vec_2d(vec![0.5f64, f64::NAN, 3.0, 1.0], 2, 2).expect("array");
        let values = owner
            .with_view(|view| {
                let region = view.region(0..2, 0..2).expect("region");
                RegionFilter::Threshold {
                    level: 1.0,
                    below: 0.0,
                    above: 9.0,
                }
                .apply(&region)
            })
            .expect("read")
            .expect("filter");
        assert_eq!(values[0], 0.0);
        assert!(values[1].is_nan());
        assert_eq!(&values[2..], &[9.0, 9.0]);
    }

    #[test]
    fn custom_filter_must_cover_region() {
        let owner = SharedArray::from_vec_2d(vec![0.0f64; 6], 2, 3).expect("array");
        let result = owner
            .with_view(|view| {
                let region = view.region(0..2, 1..3).expect("region");
                RegionFilter::custom(|_| vec![1.0]).apply(&region)
            })
            .expect("read");
        assert!(result.is_err());
    }
}
