//! Image resampling into display tiles.
//!
//! Two plans exist. [`SourceTilePlan`] covers axis-aligned images on linear
//! axes: the visible sub-rectangle of the source is decimated by an integer
//! factor so the tile never has more pixels than the device area it covers.
//! [`DeviceTilePlan`] covers everything else (affine placement, per-axis
//! pixel coordinates, log or lookup axes): each device pixel is mapped back
//! to one source pixel. Either way at most one palette lookup happens per
//! tile pixel and reads stay inside the visible source region.

use std::ops::Range;

use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};

use crate::core::{
    ArrayView, AxisPair, AxisScale, CoordinateSystem, DataPoint, DataRect, DevicePoint, DeviceRect,
    LutState,
};
use crate::error::PlotResult;

/// Random access to source pixels.
pub trait PixelSource: Sync {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    fn value(&self, row: usize, col: usize) -> f64;
}

impl PixelSource for ArrayView<'_> {
    fn rows(&self) -> usize {
        self.shape().rows
    }

    fn cols(&self) -> usize {
        self.shape().cols
    }

    #[inline]
    fn value(&self, row: usize, col: usize) -> f64 {
        self.element_at(row, col).unwrap_or(f64::NAN)
    }
}

/// How source pixels are combined when decimating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// One source read per tile pixel (block center).
    #[default]
    Nearest,
    /// Mean of the finite values of each decimation block.
    BlockAverage,
}

/// Decimated tile of an axis-aligned image on linear axes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTilePlan {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
    /// `(kx, ky)` source pixels per tile pixel.
    pub decimation: (usize, usize),
    pub tile_width: usize,
    pub tile_height: usize,
    pub dest: DeviceRect,
    /// Device x grows towards lower source columns.
    pub flip_x: bool,
    /// Device y (downwards) grows towards higher source rows.
    pub flip_y: bool,
}

impl SourceTilePlan {
    /// Plans the visible part of an image covering `extent` with
    /// `rows x cols` pixels. `None` when nothing is visible.
    pub fn plan(
        extent: DataRect,
        rows: usize,
        cols: usize,
        coords: &CoordinateSystem,
        axes: AxisPair,
    ) -> PlotResult<Option<Self>> {
        if rows == 0 || cols == 0 || !extent.has_area() {
            return Ok(None);
        }
        let Some(visible) = coords.visible_rect(axes).intersection(extent) else {
            return Ok(None);
        };
        let dx = extent.width() / cols as f64;
        let dy = extent.height() / rows as f64;
        let c0 = (((visible.x_min - extent.x_min) / dx).floor().max(0.0) as usize).min(cols);
        let c1 = (((visible.x_max - extent.x_min) / dx).ceil().max(0.0) as usize).min(cols);
        let r0 = (((visible.y_min - extent.y_min) / dy).floor().max(0.0) as usize).min(rows);
        let r1 = (((visible.y_max - extent.y_min) / dy).ceil().max(0.0) as usize).min(rows);
        if c0 >= c1 || r0 >= r1 {
            return Ok(None);
        }

        let lo = coords.data_to_device(
            axes,
            DataPoint::new(extent.x_min + c0 as f64 * dx, extent.y_min + r0 as f64 * dy),
        )?;
        let hi = coords.data_to_device(
            axes,
            DataPoint::new(extent.x_min + c1 as f64 * dx, extent.y_min + r1 as f64 * dy),
        )?;
        let dest = DeviceRect::from_corners(lo, hi);
        let (sub_cols, sub_rows) = (c1 - c0, r1 - r0);
        let kx = decimation_factor(sub_cols, dest.width);
        let ky = decimation_factor(sub_rows, dest.height);
        Ok(Some(Self {
            rows: r0..r1,
            cols: c0..c1,
            decimation: (kx, ky),
            tile_width: sub_cols.div_ceil(kx),
            tile_height: sub_rows.div_ceil(ky),
            dest,
            flip_x: lo.x > hi.x,
            flip_y: lo.y < hi.y,
        }))
    }

    /// Source `(row_block, col_block)` ranges of tile pixel `(tx, ty)`.
    fn blocks(&self, tx: usize, ty: usize) -> (Range<usize>, Range<usize>) {
        let (kx, ky) = self.decimation;
        let bx = if self.flip_x { self.tile_width - 1 - tx } else { tx };
        let by = if self.flip_y { ty } else { self.tile_height - 1 - ty };
        let c = self.cols.start + bx * kx;
        let r = self.rows.start + by * ky;
        (r..(r + ky).min(self.rows.end), c..(c + kx).min(self.cols.end))
    }
}

fn decimation_factor(source: usize, device_px: f64) -> usize {
    let device = device_px.floor().max(1.0) as usize;
    source.div_ceil(device).max(1)
}

/// Source pixel lookup for each device pixel.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMapping {
    /// Separable axes: source column per device column, row per device row.
    Separable {
        columns: Vec<Option<usize>>,
        rows: Vec<Option<usize>>,
    },
    /// Rotated placement: data coordinates per device column/row and the
    /// data -> pixel matrix.
    Affine {
        data_x: Vec<f64>,
        data_y: Vec<f64>,
        data_to_pixel: DAffine2,
    },
}

/// Device-aligned tile where every pixel maps back to at most one source pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTilePlan {
    pub x0: usize,
    pub y0: usize,
    pub width: usize,
    pub height: usize,
    pub source_rows: usize,
    pub source_cols: usize,
    pub mapping: DeviceMapping,
}

impl DeviceTilePlan {
    /// Integer device window covering `bounds` clipped to the viewport.
    fn window(bounds: DataRect, coords: &CoordinateSystem, axes: AxisPair) -> PlotResult<Option<(usize, usize, usize, usize)>> {
        let visible = coords.visible_rect(axes);
        let Some(bounds) = bounds.intersection(visible) else {
            return Ok(None);
        };
        let a = coords.data_to_device(axes, DataPoint::new(bounds.x_min, bounds.y_min))?;
        let b = coords.data_to_device(axes, DataPoint::new(bounds.x_max, bounds.y_max))?;
        let viewport = coords.viewport();
        let rect = DeviceRect::from_corners(a, b);
        let x0 = rect.x.floor().clamp(0.0, viewport.width_px()) as usize;
        let y0 = rect.y.floor().clamp(0.0, viewport.height_px()) as usize;
        let x1 = rect.right().ceil().clamp(0.0, viewport.width_px()) as usize;
        let y1 = rect.bottom().ceil().clamp(0.0, viewport.height_px()) as usize;
        Ok((x1 > x0 && y1 > y0).then(|| (x0, y0, x1 - x0, y1 - y0)))
    }

    /// Separable plan; `column_of` / `row_of` map data coordinates to source
    /// indices (`None` outside the image).
    pub fn separable(
        bounds: DataRect,
        source_rows: usize,
        source_cols: usize,
        coords: &CoordinateSystem,
        axes: AxisPair,
        column_of: impl Fn(f64) -> Option<usize>,
        row_of: impl Fn(f64) -> Option<usize>,
    ) -> PlotResult<Option<Self>> {
        let Some((x0, y0, width, height)) = Self::window(bounds, coords, axes)? else {
            return Ok(None);
        };
        let columns = device_centers(x0, width)
            .map(|px| data_x_at(coords, axes, px).ok().and_then(&column_of))
            .collect();
        let rows = device_centers(y0, height)
            .map(|py| data_y_at(coords, axes, py).ok().and_then(&row_of))
            .collect();
        Ok(Some(Self {
            x0,
            y0,
            width,
            height,
            source_rows,
            source_cols,
            mapping: DeviceMapping::Separable { columns, rows },
        }))
    }

    pub fn affine(
        bounds: DataRect,
        source_rows: usize,
        source_cols: usize,
        pixel_to_data: DAffine2,
        coords: &CoordinateSystem,
        axes: AxisPair,
    ) -> PlotResult<Option<Self>> {
        let Some((x0, y0, width, height)) = Self::window(bounds, coords, axes)? else {
            return Ok(None);
        };
        let data_x = device_centers(x0, width)
            .map(|px| data_x_at(coords, axes, px).unwrap_or(f64::NAN))
            .collect();
        let data_y = device_centers(y0, height)
            .map(|py| data_y_at(coords, axes, py).unwrap_or(f64::NAN))
            .collect();
        Ok(Some(Self {
            x0,
            y0,
            width,
            height,
            source_rows,
            source_cols,
            mapping: DeviceMapping::Affine {
                data_x,
                data_y,
                data_to_pixel: pixel_to_data.inverse(),
            },
        }))
    }

    #[inline]
    fn source_pixel(&self, tx: usize, ty: usize) -> Option<(usize, usize)> {
        match &self.mapping {
            DeviceMapping::Separable { columns, rows } => Some((rows[ty]?, columns[tx]?)),
            DeviceMapping::Affine {
                data_x,
                data_y,
                data_to_pixel,
            } => {
                let p = data_to_pixel.transform_point2(DVec2::new(data_x[tx], data_y[ty]));
                if !p.x.is_finite() || !p.y.is_finite() || p.x < 0.0 || p.y < 0.0 {
                    return None;
                }
                let (col, row) = (p.x as usize, p.y as usize);
                (col < self.source_cols && row < self.source_rows).then_some((row, col))
            }
        }
    }
}

fn device_centers(start: usize, len: usize) -> impl Iterator<Item = f64> {
    (start..start + len).map(|px| px as f64 + 0.5)
}

fn data_x_at(coords: &CoordinateSystem, axes: AxisPair, px: f64) -> PlotResult<f64> {
    coords
        .axis(axes.x)
        .from_device(px, coords.viewport().width_px())
}

fn data_y_at(coords: &CoordinateSystem, axes: AxisPair, py: f64) -> PlotResult<f64> {
    coords
        .axis(axes.y)
        .from_device(py, coords.viewport().height_px())
}

/// Whether both axes of `axes` map linearly (source-space plans apply).
#[must_use]
pub fn axes_are_linear(coords: &CoordinateSystem, axes: AxisPair) -> bool {
    matches!(coords.axis(axes.x).scale(), AxisScale::Linear)
        && matches!(coords.axis(axes.y).scale(), AxisScale::Linear)
}

/// Either resampling strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum ResamplePlan {
    Source(SourceTilePlan),
    Device(DeviceTilePlan),
}

impl ResamplePlan {
    #[must_use]
    pub fn tile_size(&self) -> (usize, usize) {
        match self {
            Self::Source(plan) => (plan.tile_width, plan.tile_height),
            Self::Device(plan) => (plan.width, plan.height),
        }
    }

    #[must_use]
    pub fn decimation(&self) -> (usize, usize) {
        match self {
            Self::Source(plan) => plan.decimation,
            Self::Device(_) => (1, 1),
        }
    }

    #[must_use]
    pub fn dest(&self) -> DeviceRect {
        match self {
            Self::Source(plan) => plan.dest,
            Self::Device(plan) => DeviceRect::new(
                plan.x0 as f64,
                plan.y0 as f64,
                plan.width as f64,
                plan.height as f64,
            ),
        }
    }

    /// Device-space origin used to detect sub-pixel pans between frames.
    #[must_use]
    pub fn anchor(&self) -> DevicePoint {
        let dest = self.dest();
        DevicePoint::new(dest.x, dest.y)
    }

    /// RGBA for tile row `ty`, written into `row` (`4 * width` bytes).
    fn fill_row<S: PixelSource + ?Sized>(&self, source: &S, lut: &LutState, interpolation: Interpolation, ty: usize, row: &mut [u8]) {
        let (width, _) = self.tile_size();
        for tx in 0..width {
            let value = match self {
                Self::Source(plan) => {
                    let (rows, cols) = plan.blocks(tx, ty);
                    match interpolation {
                        Interpolation::Nearest => {
                            let r = rows.start + (rows.len() - 1) / 2;
                            let c = cols.start + (cols.len() - 1) / 2;
                            source.value(r, c)
                        }
                        Interpolation::BlockAverage => block_mean(source, rows, cols),
                    }
                }
                Self::Device(plan) => plan
                    .source_pixel(tx, ty)
                    .map_or(f64::NAN, |(r, c)| source.value(r, c)),
            };
            row[tx * 4..tx * 4 + 4].copy_from_slice(&lut.color_of(value));
        }
    }
}

fn block_mean<S: PixelSource + ?Sized>(source: &S, rows: Range<usize>, cols: Range<usize>) -> f64 {
    let (mut sum, mut count) = (0.0, 0usize);
    for r in rows {
        for c in cols.clone() {
            let v = source.value(r, c);
            if v.is_finite() {
                sum += v;
                count += 1;
            }
        }
    }
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

/// Resamples the whole tile. Rows are filled in parallel with the
/// `parallel-resample` feature.
#[must_use]
pub fn resample<S: PixelSource + ?Sized>(source: &S, plan: &ResamplePlan, lut: &LutState, interpolation: Interpolation) -> Vec<u8> {
    let (width, height) = plan.tile_size();
    let mut pixels = vec![0u8; width * height * 4];
    if width == 0 {
        return pixels;
    }

    #[cfg(feature = "parallel-resample")]
    {
        use rayon::prelude::*;
        pixels
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(ty, row)| plan.fill_row(source, lut, interpolation, ty, row));
    }

    #[cfg(not(feature = "parallel-resample"))]
    {
        for (ty, row) in pixels.chunks_mut(width * 4).enumerate() {
            plan.fill_row(source, lut, interpolation, ty, row);
        }
    }

    pixels
}

/// Sequential resample that polls `keep_going` before every row and gives up
/// (returning `None`) once it reports `false`.
#[must_use]
pub fn resample_cancellable<S: PixelSource + ?Sized>(
    source: &S,
    plan: &ResamplePlan,
    lut: &LutState,
    interpolation: Interpolation,
    keep_going: &dyn Fn() -> bool,
) -> Option<Vec<u8>> {
    let (width, height) = plan.tile_size();
    let mut pixels = vec![0u8; width * height * 4];
    if width == 0 {
        return Some(pixels);
    }
    for (ty, row) in pixels.chunks_mut(width * 4).enumerate() {
        if !keep_going() {
            return None;
        }
        plan.fill_row(source, lut, interpolation, ty, row);
    }
    Some(pixels)
}

#[cfg(test)]
mod tests {
    use super::{resample, Interpolation, PixelSource, ResamplePlan, SourceTilePlan};
    use crate::core::{palette_preset, AxisId, AxisPair, CoordinateSystem, DataRect, LutState, Viewport};

    struct Ramp {
        rows: usize,
        cols: usize,
    }

    impl PixelSource for Ramp {
        fn rows(&self) -> usize {
            self.rows
        }

        fn cols(&self) -> usize {
            self.cols
        }

        fn value(&self, row: usize, col: usize) -> f64 {
            (row * self.cols + col) as f64
        }
    }

    fn coords(width: u32, height: u32, x: (f64, f64), y: (f64, f64)) -> CoordinateSystem {
        let mut coords = CoordinateSystem::new(Viewport::new(width, height)).expect("coords");
        coords.set_axis_range(AxisId::XBottom, x.0, x.1).expect("x");
        coords.set_axis_range(AxisId::YLeft, y.0, y.1).expect("y");
        coords
    }

    #[test]
    fn zoomed_out_image_is_decimated_to_device_size() {
        let coords = coords(100, 50, (0.0, 1000.0), (0.0, 1000.0));
        let plan = SourceTilePlan::plan(DataRect::new(0.0, 1000.0, 0.0, 1000.0), 1000, 1000, &coords, AxisPair::default())
            .expect("plan")
            .expect("visible");
        assert_eq!(plan.decimation, (10, 20));
        assert_eq!((plan.tile_width, plan.tile_height), (100, 50));
    }

    #[test]
    fn zoomed_in_image_reads_only_visible_pixels() {
        let coords = coords(400, 400, (2.0, 4.0), (2.0, 4.0));
        let plan = SourceTilePlan::plan(DataRect::new(0.0, 8.0, 0.0, 8.0), 8, 8, &coords, AxisPair::default())
            .expect("plan")
            .expect("visible");
        assert_eq!(plan.cols, 2..4);
        assert_eq!(plan.rows, 2..4);
        assert_eq!(plan.decimation, (1, 1));
        assert!((plan.dest.width - 400.0).abs() < 1e-9);
    }

    #[test]
    fn top_tile_row_holds_highest_source_row() {
        let coords = coords(4, 4, (0.0, 4.0), (0.0, 4.0));
        let plan = SourceTilePlan::plan(DataRect::new(0.0, 4.0, 0.0, 4.0), 4, 4, &coords, AxisPair::default())
            .expect("plan")
            .expect("visible");
        let lut = LutState::new(palette_preset("gray").expect("gray"), 0.0, 15.0).expect("lut");
        let pixels = resample(&Ramp { rows: 4, cols: 4 }, &ResamplePlan::Source(plan), &lut, Interpolation::Nearest);
        // Row 3 (values 12..15) is drawn on top because y grows upwards.
        assert_eq!(pixels[0], lut.color_of(12.0)[0]);
        assert_eq!(pixels[(3 * 4 + 3) * 4], lut.color_of(3.0)[0]);
    }
}
