use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{
    palette_preset, ArrayRef, ArrayView, Color, DataPoint, DataRect, DevicePoint, ImageTransform,
    LutState, Palette, Shape,
};
use crate::error::{PlotError, PlotResult};
use crate::items::{ItemHit, ItemRenderContext};
use crate::render::{
    axes_are_linear, resample, DeviceTilePlan, ImageTile, Interpolation, ItemLayer,
    PathPrimitive, ResamplePlan, SourceTilePlan,
};

/// Where image pixels land in data space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImagePlacement {
    /// Uniform axis-aligned pixels covering the rectangle; row 0 at `y_min`.
    Extent(DataRect),
    /// Rotation, scale, flips and translation applied at render time.
    Transformed(ImageTransform),
    /// Non-uniform pixel-center coordinates, strictly increasing per axis.
    Coordinates { x: Vec<f64>, y: Vec<f64> },
    /// Pixel corners on a `(rows + 1) x (cols + 1)` vertex grid, row-major.
    /// Pixel `(r, c)` is the quadrilateral through vertices `(r, c)`,
    /// `(r, c + 1)`, `(r + 1, c + 1)` and `(r + 1, c)`.
    QuadGrid { x: Vec<f64>, y: Vec<f64> },
}

/// Pixel boundaries derived from pixel-center coordinates.
#[derive(Debug, Clone, PartialEq)]
struct PixelEdges {
    x: Vec<f64>,
    y: Vec<f64>,
}

fn edges_from_centers(centers: &[f64], axis: &str) -> PlotResult<Vec<f64>> {
    if centers.is_empty() || centers.iter().any(|v| !v.is_finite()) {
        return Err(PlotError::InvalidData(format!("{axis} pixel coordinates must be finite")));
    }
    if !centers.windows(2).all(|w| w[0] < w[1]) {
        return Err(PlotError::InvalidData(format!(
            "{axis} pixel coordinates must be strictly increasing"
        )));
    }
    if centers.len() == 1 {
        return Ok(vec![centers[0] - 0.5, centers[0] + 0.5]);
    }
    let n = centers.len();
    let mut edges = Vec::with_capacity(n + 1);
    edges.push(centers[0] - (centers[1] - centers[0]) * 0.5);
    edges.extend(centers.windows(2).map(|w| (w[0] + w[1]) * 0.5));
    edges.push(centers[n - 1] + (centers[n - 1] - centers[n - 2]) * 0.5);
    Ok(edges)
}

/// Fractional pixel coordinate of `value` within `edges`.
fn fraction_in_edges(edges: &[f64], value: f64) -> f64 {
    let last = edges.len() - 1;
    let i = edges.partition_point(|edge| *edge <= value).clamp(1, last) - 1;
    i as f64 + (value - edges[i]) / (edges[i + 1] - edges[i])
}

/// Crossing-number test in data space.
fn quad_contains(p: DataPoint, quad: &[DataPoint; 4]) -> bool {
    let mut inside = false;
    for i in 0..4 {
        let (a, b) = (quad[i], quad[(i + 1) % 4]);
        if (a.y > p.y) != (b.y > p.y) && p.x < a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x) {
            inside = !inside;
        }
    }
    inside
}

fn edge_at(edges: &[f64], position: f64) -> f64 {
    let last = edges.len() - 1;
    let i = (position.floor().max(0.0) as usize).min(last - 1);
    edges[i] + (position - i as f64) * (edges[i + 1] - edges[i])
}

/// 2D image read through an adapter, colored by its own LUT.
#[derive(Debug, Clone)]
pub struct ImageItem {
    data: ArrayRef,
    placement: ImagePlacement,
    edges: Option<PixelEdges>,
    lut: LutState,
    pub interpolation: Interpolation,
    pub alpha: f64,
}

impl ImageItem {
    /// Image covering `extent`, gray palette over the data's finite range.
    pub fn new(data: ArrayRef, extent: DataRect) -> PlotResult<Self> {
        Self::with_placement(data, ImagePlacement::Extent(extent))
    }

    /// Image with explicit pixel size, pixel `(0, 0)` starting at `origin`.
    pub fn with_pixel_size(data: ArrayRef, origin: DataPoint, dx: f64, dy: f64) -> PlotResult<Self> {
        if !dx.is_finite() || !dy.is_finite() || dx <= 0.0 || dy <= 0.0 {
            return Err(PlotError::InvalidData("pixel size must be finite and > 0".to_owned()));
        }
        let shape = data.shape();
        let extent = DataRect::new(
            origin.x,
            origin.x + shape.cols as f64 * dx,
            origin.y,
            origin.y + shape.rows as f64 * dy,
        );
        Self::new(data, extent)
    }

    pub fn with_placement(data: ArrayRef, placement: ImagePlacement) -> PlotResult<Self> {
        let shape = data.shape();
        if shape.rows == 0 || shape.cols == 0 {
            return Err(PlotError::InvalidData("image buffer must not be empty".to_owned()));
        }
        let lut = data.with_view(|view| LutState::auto_range(&view, palette_preset("gray")?))??;
        let mut image = Self {
            data,
            placement: ImagePlacement::Extent(DataRect::new(0.0, 1.0, 0.0, 1.0)),
            edges: None,
            lut,
            interpolation: Interpolation::Nearest,
            alpha: 1.0,
        };
        image.set_placement(placement)?;
        Ok(image)
    }

    #[must_use]
    pub fn with_palette(mut self, palette: Arc<Palette>) -> Self {
        self.lut.set_palette(palette);
        self
    }

    #[must_use]
    pub fn data(&self) -> &ArrayRef {
        &self.data
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.data.shape()
    }

    #[must_use]
    pub fn placement(&self) -> &ImagePlacement {
        &self.placement
    }

    pub fn set_placement(&mut self, placement: ImagePlacement) -> PlotResult<()> {
        let shape = self.shape();
        let edges = match &placement {
            ImagePlacement::Extent(extent) => {
                if !extent.has_area() || !extent.width().is_finite() || !extent.height().is_finite() {
                    return Err(PlotError::InvalidData("image extent must have a finite area".to_owned()));
                }
                None
            }
            ImagePlacement::Transformed(transform) => {
                transform.validate()?;
                None
            }
            ImagePlacement::Coordinates { x, y } => {
                if x.len() != shape.cols || y.len() != shape.rows {
                    return Err(PlotError::InvalidData(format!(
                        "pixel coordinates ({} x, {} y) do not match a {}x{} image",
                        x.len(),
                        y.len(),
                        shape.rows,
                        shape.cols
                    )));
                }
                Some(PixelEdges {
                    x: edges_from_centers(x, "x")?,
                    y: edges_from_centers(y, "y")?,
                })
            }
            ImagePlacement::QuadGrid { x, y } => {
                let vertices = (shape.rows + 1) * (shape.cols + 1);
                if x.len() != vertices || y.len() != vertices {
                    return Err(PlotError::InvalidData(format!(
                        "quad grid needs {vertices} vertices for a {}x{} image",
                        shape.rows, shape.cols
                    )));
                }
                if x.iter().chain(y).any(|v| !v.is_finite()) {
                    return Err(PlotError::InvalidData("quad grid vertices must be finite".to_owned()));
                }
                None
            }
        };
        self.placement = placement;
        self.edges = edges;
        Ok(())
    }

    #[must_use]
    pub fn lut(&self) -> &LutState {
        &self.lut
    }

    pub fn lut_mut(&mut self) -> &mut LutState {
        &mut self.lut
    }

    /// Data size of one pixel for uniform placements.
    #[must_use]
    pub fn pixel_size(&self) -> Option<(f64, f64)> {
        let shape = self.shape();
        match &self.placement {
            ImagePlacement::Extent(extent) => Some((
                extent.width() / shape.cols as f64,
                extent.height() / shape.rows as f64,
            )),
            ImagePlacement::Transformed(t) => Some((t.pixel_width, t.pixel_height)),
            ImagePlacement::Coordinates { .. } | ImagePlacement::QuadGrid { .. } => None,
        }
    }

    /// Whether the image is drawn through a resampled tile. Quad grids are
    /// drawn as one filled polygon per pixel instead.
    #[must_use]
    pub fn is_resampled(&self) -> bool {
        !matches!(self.placement, ImagePlacement::QuadGrid { .. })
    }

    /// Corner `(row, col)` of a quad-grid placement.
    fn vertex(&self, row: usize, col: usize) -> Option<DataPoint> {
        let ImagePlacement::QuadGrid { x, y } = &self.placement else {
            return None;
        };
        let index = row * (self.shape().cols + 1) + col;
        Some(DataPoint::new(*x.get(index)?, *y.get(index)?))
    }

    fn quad(&self, row: usize, col: usize) -> Option<[DataPoint; 4]> {
        Some([
            self.vertex(row, col)?,
            self.vertex(row, col + 1)?,
            self.vertex(row + 1, col + 1)?,
            self.vertex(row + 1, col)?,
        ])
    }

    /// `(row, col)` of the quad-grid pixel containing `point`.
    fn quad_at(&self, point: DataPoint) -> Option<(usize, usize)> {
        let shape = self.shape();
        (0..shape.rows)
            .flat_map(|row| (0..shape.cols).map(move |col| (row, col)))
            .find(|&(row, col)| self.quad(row, col).is_some_and(|quad| quad_contains(point, &quad)))
    }

    #[must_use]
    pub fn bounding_box(&self) -> DataRect {
        let shape = self.shape();
        match (&self.placement, &self.edges) {
            (ImagePlacement::Extent(extent), _) => *extent,
            (ImagePlacement::Transformed(t), _) => t.bounding_rect(shape.cols, shape.rows),
            (ImagePlacement::Coordinates { .. }, Some(edges)) => DataRect::new(
                edges.x[0],
                edges.x[edges.x.len() - 1],
                edges.y[0],
                edges.y[edges.y.len() - 1],
            ),
            (ImagePlacement::Coordinates { x, y }, None) => DataRect::new(x[0], x[x.len() - 1], y[0], y[y.len() - 1]),
            (ImagePlacement::QuadGrid { x, y }, _) => {
                let span = |values: &[f64]| {
                    values
                        .iter()
                        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
                };
                let ((x_min, x_max), (y_min, y_max)) = (span(x), span(y));
                DataRect::new(x_min, x_max, y_min, y_max)
            }
        }
    }

    /// Fractional pixel coordinates `(col, row)` of a data point.
    #[must_use]
    pub fn data_to_pixel(&self, point: DataPoint) -> (f64, f64) {
        let shape = self.shape();
        match (&self.placement, &self.edges) {
            (ImagePlacement::Extent(e), _) => (
                (point.x - e.x_min) / e.width() * shape.cols as f64,
                (point.y - e.y_min) / e.height() * shape.rows as f64,
            ),
            (ImagePlacement::Transformed(t), _) => t.data_to_pixel(shape.cols, shape.rows, point),
            (ImagePlacement::Coordinates { .. }, Some(edges)) => (
                fraction_in_edges(&edges.x, point.x),
                fraction_in_edges(&edges.y, point.y),
            ),
            (ImagePlacement::Coordinates { .. }, None) => (f64::NAN, f64::NAN),
            (ImagePlacement::QuadGrid { .. }, _) => self
                .quad_at(point)
                .map_or((f64::NAN, f64::NAN), |(row, col)| (col as f64 + 0.5, row as f64 + 0.5)),
        }
    }

    /// Data position of fractional pixel coordinates (pixel `(0, 0)` spans
    /// `[0, 1) x [0, 1)`).
    #[must_use]
    pub fn pixel_to_data(&self, col: f64, row: f64) -> DataPoint {
        let shape = self.shape();
        match (&self.placement, &self.edges) {
            (ImagePlacement::Extent(e), _) => DataPoint::new(
                e.x_min + col / shape.cols as f64 * e.width(),
                e.y_min + row / shape.rows as f64 * e.height(),
            ),
            (ImagePlacement::Transformed(t), _) => t.pixel_to_data(shape.cols, shape.rows, col, row),
            (ImagePlacement::Coordinates { .. }, Some(edges)) => {
                DataPoint::new(edge_at(&edges.x, col), edge_at(&edges.y, row))
            }
            (ImagePlacement::Coordinates { .. }, None) => DataPoint::new(f64::NAN, f64::NAN),
            (ImagePlacement::QuadGrid { .. }, _) => self.quad_point(col, row),
        }
    }

    /// Bilinear position inside the quad containing fractional `(col, row)`.
    fn quad_point(&self, col: f64, row: f64) -> DataPoint {
        let shape = self.shape();
        if !col.is_finite() || !row.is_finite() {
            return DataPoint::new(f64::NAN, f64::NAN);
        }
        let (c, r) = (
            (col.max(0.0) as usize).min(shape.cols - 1),
            (row.max(0.0) as usize).min(shape.rows - 1),
        );
        let (u, v) = (col - c as f64, row - r as f64);
        let Some([p00, p01, p11, p10]) = self.quad(r, c) else {
            return DataPoint::new(f64::NAN, f64::NAN);
        };
        let lerp = |a: DataPoint, b: DataPoint, t: f64| DataPoint::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
        lerp(lerp(p00, p01, u), lerp(p10, p11, u), v)
    }

    /// `(row, col)` of the pixel containing `point`.
    #[must_use]
    pub fn pixel_at(&self, point: DataPoint) -> Option<(usize, usize)> {
        let shape = self.shape();
        let (col, row) = self.data_to_pixel(point);
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < shape.cols && row < shape.rows).then_some((row, col))
    }

    /// Like [`Self::pixel_at`], but a point on the closed upper edges of the
    /// image snaps to the last row or column. Callers check the bounds first.
    fn edge_pixel_at(&self, point: DataPoint) -> Option<(usize, usize)> {
        let shape = self.shape();
        let (col, row) = self.data_to_pixel(point);
        if !col.is_finite() || !row.is_finite() || shape.rows == 0 || shape.cols == 0 {
            return None;
        }
        let snap = |v: f64, n: usize| (v.max(0.0) as usize).min(n - 1);
        Some((snap(row, shape.rows), snap(col, shape.cols)))
    }

    pub fn value_at(&self, point: DataPoint) -> PlotResult<Option<f64>> {
        let Some((row, col)) = self.pixel_at(point) else {
            return Ok(None);
        };
        self.data.with_view(|view| view.element_at(row, col))
    }

    /// Pixel rows and columns touched by a data rectangle. On quad grids,
    /// the pixels whose centers lie inside it.
    #[must_use]
    pub fn pixel_region(&self, rect: DataRect) -> Option<(Range<usize>, Range<usize>)> {
        let shape = self.shape();
        if let ImagePlacement::QuadGrid { .. } = self.placement {
            let inside: Vec<(usize, usize)> = (0..shape.rows)
                .flat_map(|row| (0..shape.cols).map(move |col| (row, col)))
                .filter(|&(row, col)| rect.contains(self.quad_point(col as f64 + 0.5, row as f64 + 0.5)))
                .collect();
            let rows = inside.iter().map(|p| p.0).min()?..inside.iter().map(|p| p.0).max()? + 1;
            let cols = inside.iter().map(|p| p.1).min()?..inside.iter().map(|p| p.1).max()? + 1;
            return Some((rows, cols));
        }
        let pixels: Vec<(f64, f64)> = rect.corners().into_iter().map(|c| self.data_to_pixel(c)).collect();
        if pixels.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
            return None;
        }
        let min_c = pixels.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_c = pixels.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let min_r = pixels.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_r = pixels.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let clamp = |v: f64, n: usize| (v.max(0.0) as usize).min(n);
        let cols = clamp(min_c.floor(), shape.cols)..clamp(max_c.ceil(), shape.cols);
        let rows = clamp(min_r.floor(), shape.rows)..clamp(max_r.ceil(), shape.rows);
        (!cols.is_empty() && !rows.is_empty()).then_some((rows, cols))
    }

    /// Data x of each pixel-column center (axis-aligned placements).
    fn column_centers(&self) -> Option<Vec<f64>> {
        let shape = self.shape();
        match &self.placement {
            ImagePlacement::Transformed(_) | ImagePlacement::QuadGrid { .. } => None,
            ImagePlacement::Coordinates { x, .. } => Some(x.clone()),
            ImagePlacement::Extent(_) => {
                Some((0..shape.cols).map(|c| self.pixel_to_data(c as f64 + 0.5, 0.5).x).collect())
            }
        }
    }

    fn row_centers(&self) -> Option<Vec<f64>> {
        let shape = self.shape();
        match &self.placement {
            ImagePlacement::Transformed(_) | ImagePlacement::QuadGrid { .. } => None,
            ImagePlacement::Coordinates { y, .. } => Some(y.clone()),
            ImagePlacement::Extent(_) => {
                Some((0..shape.rows).map(|r| self.pixel_to_data(0.5, r as f64 + 0.5).y).collect())
            }
        }
    }

    /// Values along the horizontal line through `y`: `(x, value)` pairs.
    pub fn x_section(&self, y: f64) -> PlotResult<Option<(Vec<f64>, Vec<f64>)>> {
        let bounds = self.bounding_box();
        if y < bounds.y_min || y > bounds.y_max {
            return Ok(None);
        }
        if let Some(xs) = self.column_centers() {
            let Some((row, _)) = self.edge_pixel_at(DataPoint::new(xs[0], y)) else {
                return Ok(None);
            };
            let values = self.data.with_view(|view| view.row(row).into_iter().collect())?;
            return Ok(Some((xs, values)));
        }
        let shape = self.shape();
        let samples = shape.cols.max(shape.rows);
        let xs: Vec<f64> = (0..samples)
            .map(|i| bounds.x_min + (i as f64 + 0.5) / samples as f64 * bounds.width())
            .collect();
        let values = self.sample_points(xs.iter().map(|&x| DataPoint::new(x, y)))?;
        Ok(Some((xs, values)))
    }

    /// Values along the vertical line through `x`: `(y, value)` pairs.
    pub fn y_section(&self, x: f64) -> PlotResult<Option<(Vec<f64>, Vec<f64>)>> {
        let bounds = self.bounding_box();
        if x < bounds.x_min || x > bounds.x_max {
            return Ok(None);
        }
        if let Some(ys) = self.row_centers() {
            let Some((_, col)) = self.edge_pixel_at(DataPoint::new(x, ys[0])) else {
                return Ok(None);
            };
            let values = self.data.with_view(|view| view.column(col).into_iter().collect())?;
            return Ok(Some((ys, values)));
        }
        let shape = self.shape();
        let samples = shape.cols.max(shape.rows);
        let ys: Vec<f64> = (0..samples)
            .map(|i| bounds.y_min + (i as f64 + 0.5) / samples as f64 * bounds.height())
            .collect();
        let values = self.sample_points(ys.iter().map(|&y| DataPoint::new(x, y)))?;
        Ok(Some((ys, values)))
    }

    fn sample_points(&self, points: impl Iterator<Item = DataPoint>) -> PlotResult<Vec<f64>> {
        let pixels: Vec<Option<(usize, usize)>> = points.map(|p| self.pixel_at(p)).collect();
        self.data.with_view(|view| {
            pixels
                .iter()
                .map(|px| px.and_then(|(r, c)| view.element_at(r, c)).unwrap_or(f64::NAN))
                .collect()
        })
    }

    /// Runs `f` over a read view of the image data.
    pub fn with_view<R>(&self, f: impl FnOnce(&ArrayView<'_>) -> R) -> PlotResult<R> {
        self.data.with_view(|view| f(&view))
    }

    pub(crate) fn translate(&mut self, dx: f64, dy: f64) {
        self.placement = match &self.placement {
            ImagePlacement::Extent(e) => {
                ImagePlacement::Extent(DataRect::new(e.x_min + dx, e.x_max + dx, e.y_min + dy, e.y_max + dy))
            }
            ImagePlacement::Transformed(t) => ImagePlacement::Transformed(t.translated(dx, dy)),
            ImagePlacement::Coordinates { x, y } => ImagePlacement::Coordinates {
                x: x.iter().map(|v| v + dx).collect(),
                y: y.iter().map(|v| v + dy).collect(),
            },
            ImagePlacement::QuadGrid { x, y } => ImagePlacement::QuadGrid {
                x: x.iter().map(|v| v + dx).collect(),
                y: y.iter().map(|v| v + dy).collect(),
            },
        };
        if let Some(edges) = &mut self.edges {
            edges.x.iter_mut().for_each(|v| *v += dx);
            edges.y.iter_mut().for_each(|v| *v += dy);
        }
    }

    /// Resampling plan for the current view; `None` when off-screen.
    pub fn plan(&self, ctx: &ItemRenderContext<'_>) -> PlotResult<Option<ResamplePlan>> {
        let shape = self.shape();
        let bounds = self.bounding_box();
        match (&self.placement, &self.edges) {
            (ImagePlacement::QuadGrid { .. }, _) => Ok(None),
            (ImagePlacement::Extent(extent), _) if axes_are_linear(ctx.coords, ctx.axes) => {
                Ok(SourceTilePlan::plan(*extent, shape.rows, shape.cols, ctx.coords, ctx.axes)?
                    .map(ResamplePlan::Source))
            }
            (ImagePlacement::Transformed(t), _) => Ok(DeviceTilePlan::affine(
                bounds,
                shape.rows,
                shape.cols,
                t.matrix(shape.cols, shape.rows),
                ctx.coords,
                ctx.axes,
            )?
            .map(ResamplePlan::Device)),
            _ => {
                let column_of = |x: f64| self.pixel_at(DataPoint::new(x, bounds.y_min)).map(|(_, c)| c);
                let row_of = |y: f64| self.pixel_at(DataPoint::new(bounds.x_min, y)).map(|(r, _)| r);
                Ok(DeviceTilePlan::separable(bounds, shape.rows, shape.cols, ctx.coords, ctx.axes, column_of, row_of)?
                    .map(ResamplePlan::Device))
            }
        }
    }

    pub(crate) fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> PlotResult<Option<ItemHit>> {
        let outline = self.device_outline(ctx);
        if outline.len() < 3 {
            return Ok(None);
        }
        if crate::core::geometry::polygon_contains(point, &outline) {
            return Ok(Some(ItemHit {
                distance: 0.0,
                handle: None,
                inside: true,
            }));
        }
        let distance = crate::core::geometry::polyline_distance(point, &outline, true);
        Ok((distance <= tolerance).then_some(ItemHit {
            distance,
            handle: None,
            inside: false,
        }))
    }

    fn device_outline(&self, ctx: &ItemRenderContext<'_>) -> Vec<DevicePoint> {
        let shape = self.shape();
        let (w, h) = (shape.cols, shape.rows);
        let corners: Vec<(usize, usize)> = if self.is_resampled() {
            vec![(0, 0), (w, 0), (w, h), (0, h)]
        } else {
            // Every boundary vertex, since quad-grid edges need not be straight.
            (0..w)
                .map(|c| (c, 0))
                .chain((0..h).map(|r| (w, r)))
                .chain((1..=w).rev().map(|c| (c, h)))
                .chain((1..=h).rev().map(|r| (0, r)))
                .collect()
        };
        corners
            .into_iter()
            .filter_map(|(c, r)| ctx.to_device(self.pixel_to_data(c as f64, r as f64)).ok())
            .collect()
    }

    /// One filled polygon per finite quad-grid pixel.
    fn render_quads(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) -> PlotResult<()> {
        let shape = self.shape();
        let values = self.data.with_view(|view| {
            (0..shape.rows)
                .flat_map(|row| (0..shape.cols).map(move |col| (row, col)))
                .map(|(row, col)| (row, col, view.element_at(row, col).unwrap_or(f64::NAN)))
                .collect::<Vec<_>>()
        })?;
        for (row, col, value) in values {
            if !value.is_finite() {
                continue;
            }
            let Some(quad) = self.quad(row, col) else {
                continue;
            };
            let Ok(points) = quad.into_iter().map(|p| ctx.to_device(p)).collect::<PlotResult<Vec<_>>>() else {
                continue;
            };
            let mut fill = Color::from_rgba8(self.lut.color_of(value));
            fill.alpha *= self.alpha;
            layer.paths.push(PathPrimitive::polygon(points, None, Some(fill)));
        }
        Ok(())
    }

    /// Resamples the tile for `plan` on the calling thread.
    pub fn tile(&self, plan: &ResamplePlan) -> PlotResult<ImageTile> {
        let pixels = self
            .data
            .with_view(|view| resample(&view, plan, &self.lut, self.interpolation))?;
        let (width, height) = plan.tile_size();
        Ok(ImageTile {
            dest: plan.dest(),
            width,
            height,
            pixels: Arc::from(pixels),
            alpha: self.alpha,
        })
    }

    /// Selection outline, drawn over the tile.
    pub(crate) fn render_outline(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) {
        if !ctx.selected {
            return;
        }
        let outline = self.device_outline(ctx);
        if outline.len() >= 3 {
            layer.paths.push(PathPrimitive::polygon(outline, Some(ctx.selection_stroke()), None));
        }
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) -> PlotResult<()> {
        if !self.is_resampled() {
            self.render_quads(ctx, layer)?;
        } else if let Some(plan) = self.plan(ctx)? {
            layer.images.push(self.tile(&plan)?);
        }
        self.render_outline(ctx, layer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageItem, ImagePlacement};
    use crate::core::{AxisId, AxisPair, CoordinateSystem, DataPoint, DataRect, SharedArray, Viewport};
    use crate::items::{ItemRenderContext, NoItems};
    use crate::render::ItemLayer;

    fn ramp_image() -> (SharedArray<u16>, ImageItem) {
        let owner = SharedArray::from_vec_2d((0u16..16).collect(), 4, 4).expect("owner");
        let image = ImageItem::new(owner.adapter().expect("adapter"), DataRect::new(0.0, 4.0, 0.0, 4.0)).expect("image");
        (owner, image)
    }

    #[test]
    fn auto_lut_spans_data_range() {
        let (_owner, image) = ramp_image();
        assert_eq!(image.lut().range(), (0.0, 15.0));
    }

    #[test]
    fn value_lookup_uses_pixel_under_point() {
        let (_owner, image) = ramp_image();
        assert_eq!(image.value_at(DataPoint::new(2.5, 1.5)).expect("read"), Some(6.0));
        assert_eq!(image.value_at(DataPoint::new(5.0, 1.0)).expect("read"), None);
    }

    #[test]
    fn sections_follow_rows_and_columns() {
        let (_owner, image) = ramp_image();
        let (xs, values) = image.x_section(2.2).expect("read").expect("inside");
        assert_eq!(values, vec![8.0, 9.0, 10.0, 11.0]);
        assert_eq!(xs, vec![0.5, 1.5, 2.5, 3.5]);
        let (_, column) = image.y_section(0.1).expect("read").expect("inside");
        assert_eq!(column, vec![0.0, 4.0, 8.0, 12.0]);
    }

    #[test]
    fn sections_on_the_upper_edges_use_the_last_row_and_column() {
        let (_owner, image) = ramp_image();
        let (_, top_row) = image.x_section(4.0).expect("read").expect("on edge");
        assert_eq!(top_row, vec![12.0, 13.0, 14.0, 15.0]);
        let (_, right_column) = image.y_section(4.0).expect("read").expect("on edge");
        assert_eq!(right_column, vec![3.0, 7.0, 11.0, 15.0]);
        assert!(image.x_section(4.01).expect("read").is_none());
    }

    #[test]
    fn non_uniform_coordinates_locate_pixels() {
        let owner = SharedArray::from_vec_2d((0u8..6).collect(), 2, 3).expect("owner");
        let image = ImageItem::with_placement(
            owner.adapter().expect("adapter"),
            ImagePlacement::Coordinates {
                x: vec![0.0, 1.0, 10.0],
                y: vec![0.0, 100.0],
            },
        )
        .expect("image");
        assert_eq!(image.pixel_at(DataPoint::new(6.0, 10.0)), Some((0, 2)));
        assert_eq!(image.pixel_at(DataPoint::new(0.9, 60.0)), Some((1, 1)));
    }

    fn sheared_grid() -> (SharedArray<f64>, ImageItem) {
        let owner = SharedArray::from_vec_2d(vec![1.0, 2.0], 1, 2).expect("owner");
        let image = ImageItem::with_placement(
            owner.adapter().expect("adapter"),
            ImagePlacement::QuadGrid {
                x: vec![0.0, 1.0, 2.0, 0.5, 1.5, 2.5],
                y: vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            },
        )
        .expect("quad grid");
        (owner, image)
    }

    #[test]
    fn quad_grid_locates_pixels_inside_sheared_cells() {
        let (_owner, image) = sheared_grid();
        assert_eq!(image.bounding_box(), DataRect::new(0.0, 2.5, 0.0, 1.0));
        assert_eq!(image.pixel_at(DataPoint::new(1.4, 0.9)), Some((0, 0)));
        assert_eq!(image.pixel_at(DataPoint::new(1.4, 0.1)), Some((0, 1)));
        assert_eq!(image.value_at(DataPoint::new(2.2, 0.5)).expect("read"), Some(2.0));
        assert_eq!(image.pixel_at(DataPoint::new(0.1, 0.9)), None);
        let (rows, cols) = image.pixel_region(DataRect::new(0.0, 1.2, 0.0, 1.0)).expect("region");
        assert_eq!((rows, cols), (0..1, 0..1));
    }

    #[test]
    fn quad_grid_needs_one_vertex_more_per_axis() {
        let owner = SharedArray::from_vec_2d(vec![1.0f64, 2.0], 1, 2).expect("owner");
        let placement = ImagePlacement::QuadGrid {
            x: vec![0.0, 1.0, 0.0, 1.0],
            y: vec![0.0, 0.0, 1.0, 1.0],
        };
        assert!(ImageItem::with_placement(owner.adapter().expect("adapter"), placement).is_err());
    }

    #[test]
    fn quad_grid_renders_one_polygon_per_pixel() {
        let (_owner, image) = sheared_grid();
        let mut coords = CoordinateSystem::new(Viewport::new(100, 100)).expect("coords");
        coords.set_axis_range(AxisId::XBottom, 0.0, 2.5).expect("x range");
        coords.set_axis_range(AxisId::YLeft, 0.0, 1.0).expect("y range");
        let ctx = ItemRenderContext::new(&coords, AxisPair::default(), &NoItems);
        let mut layer = ItemLayer::new(None);
        image.render(&ctx, &mut layer).expect("render");
        assert!(layer.images.is_empty());
        assert_eq!(layer.paths.len(), 2);
        assert!(!image.is_resampled());
    }

    #[test]
    fn pixel_region_clamps_to_image() {
        let (_owner, image) = ramp_image();
        let (rows, cols) = image.pixel_region(DataRect::new(-1.0, 1.5, 2.5, 9.0)).expect("region");
        assert_eq!(cols, 0..2);
        assert_eq!(rows, 2..4);
    }
}
