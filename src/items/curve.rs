use ordered_float::OrderedFloat;
use smallvec::SmallVec;

use crate::core::{
    geometry, interval_stats, ArrayRef, ArrayView, Color, DataPoint, DataRect, DevicePoint,
    IntervalStats,
};
use crate::error::{PlotError, PlotResult};
use crate::items::{CurveStyle, CurveType, ItemHit, ItemRenderContext};
use crate::render::{ItemLayer, LinePrimitive, MarkerPrimitive, MarkerShape, PathPrimitive, StrokeStyle};

/// Optional symmetric error bars.
#[derive(Debug, Clone, Default)]
pub struct ErrorBars {
    pub dx: Option<ArrayRef>,
    pub dy: Option<ArrayRef>,
}

/// 1D `(x, y)` curve read through two adapters.
#[derive(Debug, Clone)]
pub struct CurveItem {
    x: ArrayRef,
    y: ArrayRef,
    errors: Option<ErrorBars>,
    pub style: CurveStyle,
}

#[derive(Debug, Clone, Copy)]
struct CurveSample {
    x: f64,
    y: f64,
    dx: f64,
    dy: f64,
}

impl CurveItem {
    pub fn new(x: ArrayRef, y: ArrayRef) -> PlotResult<Self> {
        if x.shape().len() != y.shape().len() {
            return Err(PlotError::InvalidData(format!(
                "curve x/y lengths differ ({} vs {})",
                x.shape().len(),
                y.shape().len()
            )));
        }
        Ok(Self {
            x,
            y,
            errors: None,
            style: CurveStyle::default(),
        })
    }

    /// Error-bar curve; each present adapter must match the sample count.
    pub fn with_errors(mut self, errors: ErrorBars) -> PlotResult<Self> {
        let len = self.len();
        for adapter in [&errors.dx, &errors.dy].into_iter().flatten() {
            if adapter.shape().len() != len {
                return Err(PlotError::InvalidData(
                    "error bar length differs from curve length".to_owned(),
                ));
            }
        }
        self.errors = Some(errors);
        Ok(self)
    }

    #[must_use]
    pub fn with_style(mut self, style: CurveStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.x.shape().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn x(&self) -> &ArrayRef {
        &self.x
    }

    #[must_use]
    pub fn y(&self) -> &ArrayRef {
        &self.y
    }

    #[must_use]
    pub fn errors(&self) -> Option<&ErrorBars> {
        self.errors.as_ref()
    }

    pub(crate) fn adapters(&self) -> SmallVec<[&ArrayRef; 4]> {
        let mut adapters: SmallVec<[&ArrayRef; 4]> = SmallVec::new();
        adapters.push(&self.x);
        adapters.push(&self.y);
        if let Some(errors) = &self.errors {
            adapters.extend(errors.dx.iter());
            adapters.extend(errors.dy.iter());
        }
        adapters
    }

    /// Runs `f` with read views of x and y.
    pub fn with_views<R>(&self, f: impl FnOnce(&ArrayView<'_>, &ArrayView<'_>) -> R) -> PlotResult<R> {
        self.x.with_view(|x| self.y.with_view(|y| f(&x, &y)))?
    }

    /// Visits every sample with its error half-widths (0 without error bars).
    fn for_each_sample(&self, mut visit: impl FnMut(usize, CurveSample)) -> PlotResult<()> {
        let dx = self.errors.as_ref().and_then(|e| e.dx.clone());
        let dy = self.errors.as_ref().and_then(|e| e.dy.clone());
        self.with_views(|x, y| {
            with_optional_view(dx.as_ref(), |dx| {
                with_optional_view(dy.as_ref(), |dy| {
                    for (i, (xv, yv)) in x.iter().zip(y.iter()).enumerate() {
                        let sample = CurveSample {
                            x: xv,
                            y: yv,
                            dx: dx.and_then(|v| v.get(i)).unwrap_or(0.0),
                            dy: dy.and_then(|v| v.get(i)).unwrap_or(0.0),
                        };
                        visit(i, sample);
                    }
                })
            })
        })??
    }

    pub fn bounding_box(&self) -> PlotResult<Option<DataRect>> {
        let mut rect: Option<DataRect> = None;
        self.for_each_sample(|_, s| {
            if !s.x.is_finite() || !s.y.is_finite() {
                return;
            }
            let (dx, dy) = (finite_or_zero(s.dx).abs(), finite_or_zero(s.dy).abs());
            let sample_rect = DataRect::new(s.x - dx, s.x + dx, s.y - dy, s.y + dy);
            rect = Some(rect.map_or(sample_rect, |r| r.union(sample_rect)));
        })?;
        Ok(rect)
    }

    /// Piecewise-linear statistics over `[x0, x1]`.
    pub fn interval_stats(&self, x0: f64, x1: f64) -> PlotResult<Option<IntervalStats>> {
        self.with_views(|x, y| interval_stats(x, y, x0, x1))
    }

    /// Sample closest to `x` (by abscissa).
    pub fn nearest_sample_x(&self, x: f64) -> PlotResult<Option<DataPoint>> {
        self.with_views(|xs, ys| {
            xs.iter()
                .zip(ys.iter())
                .filter(|(xv, yv)| xv.is_finite() && yv.is_finite())
                .min_by_key(|(xv, _)| OrderedFloat((xv - x).abs()))
                .map(|(xv, yv)| DataPoint::new(xv, yv))
        })
    }

    pub(crate) fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> PlotResult<Option<ItemHit>> {
        let mut best = f64::INFINITY;
        let mut previous: Option<DevicePoint> = None;
        let draw_lines = self.style.curve_type != CurveType::NoLine;
        self.for_each_sample(|_, s| {
            let Ok(device) = ctx.to_device(DataPoint::new(s.x, s.y)) else {
                previous = None;
                return;
            };
            best = best.min(device.distance_to(point));
            if draw_lines {
                if let Some(prev) = previous {
                    best = best.min(geometry::segment_distance(point, prev, device));
                }
            }
            previous = Some(device);
        })?;
        Ok((best <= tolerance).then_some(ItemHit {
            distance: best,
            handle: None,
            inside: false,
        }))
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) -> PlotResult<()> {
        let stroke = if ctx.selected {
            let mut s = self.style.line;
            s.width += 1.0;
            s
        } else {
            self.style.line
        };
        let width_px = ctx.coords.viewport().width as usize;
        let mut run: Vec<DevicePoint> = Vec::new();
        let mut runs: Vec<Vec<DevicePoint>> = Vec::new();
        let mut error_bars: Vec<LinePrimitive> = Vec::new();
        let mut markers: Vec<MarkerPrimitive> = Vec::new();
        let needs_baseline = self.style.curve_type == CurveType::Sticks || self.style.fill.is_some();
        let baseline_px = if needs_baseline {
            ctx.coords
                .axis(ctx.axes.y)
                .to_device(self.style.baseline, ctx.coords.viewport().height_px())
                .ok()
        } else {
            None
        };

        self.for_each_sample(|_, s| {
            let Ok(device) = ctx.to_device(DataPoint::new(s.x, s.y)) else {
                if !run.is_empty() {
                    runs.push(std::mem::take(&mut run));
                }
                return;
            };
            if s.dx != 0.0 || s.dy != 0.0 {
                push_error_bars(ctx, s, stroke, &mut error_bars);
            }
            if self.style.marker != MarkerShape::None {
                markers.push(MarkerPrimitive {
                    center: device,
                    shape: self.style.marker,
                    size_px: self.style.marker_size,
                    fill: self.style.marker_fill,
                    stroke: Some(stroke),
                });
            }
            run.push(device);
        })?;
        if !run.is_empty() {
            runs.push(run);
        }

        for points in runs {
            let points = decimate_columns(points, width_px);
            match self.style.curve_type {
                CurveType::NoLine => {}
                CurveType::Lines if points.len() >= 2 => {
                    if let (Some(fill), Some(base)) = (self.style.fill, baseline_px) {
                        layer.paths.push(fill_to_baseline(&points, base, fill));
                    }
                    layer.paths.push(PathPrimitive::polyline(points, stroke));
                }
                CurveType::Steps if points.len() >= 2 => {
                    layer.paths.push(PathPrimitive::polyline(step_points(&points), stroke));
                }
                CurveType::Sticks => {
                    if let Some(base) = baseline_px {
                        layer.lines.extend(points.iter().map(|p| {
                            LinePrimitive::new(DevicePoint::new(p.x, base), *p, stroke)
                        }));
                    }
                }
                _ => {}
            }
        }
        layer.lines.extend(error_bars);
        layer.markers.extend(markers);
        Ok(())
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn with_optional_view<R>(adapter: Option<&ArrayRef>, f: impl FnOnce(Option<&ArrayView<'_>>) -> R) -> PlotResult<R> {
    match adapter {
        Some(adapter) => adapter.with_view(|view| f(Some(&view))),
        None => Ok(f(None)),
    }
}

fn push_error_bars(ctx: &ItemRenderContext<'_>, s: CurveSample, stroke: StrokeStyle, out: &mut Vec<LinePrimitive>) {
    let (dx, dy) = (finite_or_zero(s.dx).abs(), finite_or_zero(s.dy).abs());
    let mut segment = |a: DataPoint, b: DataPoint| {
        if let (Ok(a), Ok(b)) = (ctx.to_device(a), ctx.to_device(b)) {
            out.push(LinePrimitive::new(a, b, stroke));
        }
    };
    if dx > 0.0 {
        segment(DataPoint::new(s.x - dx, s.y), DataPoint::new(s.x + dx, s.y));
    }
    if dy > 0.0 {
        segment(DataPoint::new(s.x, s.y - dy), DataPoint::new(s.x, s.y + dy));
    }
}

/// Min/max-per-pixel-column decimation for runs much denser than the
/// viewport; keeps the visual envelope of the curve.
fn decimate_columns(points: Vec<DevicePoint>, width_px: usize) -> Vec<DevicePoint> {
    if width_px == 0 || points.len() <= width_px * 4 {
        return points;
    }
    let mut out = Vec::with_capacity(width_px * 4);
    let mut column = points[0].x.floor();
    let (mut first, mut min, mut max, mut last) = (points[0], points[0], points[0], points[0]);
    let flush = |out: &mut Vec<DevicePoint>, first, min: DevicePoint, max: DevicePoint, last| {
        out.push(first);
        let (a, b) = if min.x <= max.x { (min, max) } else { (max, min) };
        out.push(a);
        out.push(b);
        out.push(last);
    };
    for p in points.into_iter().skip(1) {
        if p.x.floor() != column {
            flush(&mut out, first, min, max, last);
            column = p.x.floor();
            (first, min, max) = (p, p, p);
        }
        if p.y < min.y {
            min = p;
        }
        if p.y > max.y {
            max = p;
        }
        last = p;
    }
    flush(&mut out, first, min, max, last);
    out.dedup();
    out
}

fn step_points(points: &[DevicePoint]) -> Vec<DevicePoint> {
    let mut out = Vec::with_capacity(points.len() * 2);
    for pair in points.windows(2) {
        out.push(pair[0]);
        out.push(DevicePoint::new(pair[1].x, pair[0].y));
    }
    if let Some(last) = points.last() {
        out.push(*last);
    }
    out
}

fn fill_to_baseline(points: &[DevicePoint], base: f64, fill: Color) -> PathPrimitive {
    let mut polygon = points.to_vec();
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        polygon.push(DevicePoint::new(last.x, base));
        polygon.push(DevicePoint::new(first.x, base));
    }
    PathPrimitive::polygon(polygon, None, Some(fill))
}

#[cfg(test)]
mod tests {
    use super::{decimate_columns, CurveItem};
    use crate::core::{DataRect, DevicePoint, SharedArray};

    #[test]
    fn bounding_box_covers_samples() {
        let x = SharedArray::from_vec(vec![0.0f64, 1.0, 2.0]);
        let y = SharedArray::from_vec(vec![0.0f64, 1.0, 4.0]);
        let curve = CurveItem::new(x.adapter().expect("x"), y.adapter().expect("y")).expect("curve");
        assert_eq!(
            curve.bounding_box().expect("bbox"),
            Some(DataRect::new(0.0, 2.0, 0.0, 4.0))
        );
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let x = SharedArray::from_vec(vec![0.0f64, 1.0]);
        let y = SharedArray::from_vec(vec![0.0f64]);
        assert!(CurveItem::new(x.adapter().expect("x"), y.adapter().expect("y")).is_err());
    }

    #[test]
    fn dense_runs_are_decimated_per_column() {
        let points: Vec<DevicePoint> = (0..10_000)
            .map(|i| DevicePoint::new(i as f64 / 100.0, (i % 7) as f64))
            .collect();
        let decimated = decimate_columns(points, 100);
        assert!(decimated.len() <= 400);
        assert!(decimated.iter().any(|p| p.y == 6.0));
    }
}
