use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::geometry::{polygon_contains, polyline_distance};
use crate::core::{palette_preset, ArrayRef, DataPoint, DataRect, DevicePoint, Histogram, Histogram2D, LutState};
use crate::error::{PlotError, PlotResult};
use crate::items::{CurveStyle, ItemHit, ItemRenderContext};
use crate::render::{
    resample, DeviceTilePlan, ImageTile, Interpolation, ItemLayer, PathPrimitive, PixelSource, ResamplePlan,
};

fn default_bins() -> usize {
    100
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramOptions {
    #[serde(default = "default_bins")]
    pub bins: usize,
    /// Plot `ln(1 + count)` instead of raw counts.
    #[serde(default)]
    pub log_scale: bool,
    #[serde(default)]
    pub remove_first_bin: bool,
    /// Binning range; the finite data range when unset.
    #[serde(default)]
    pub range: Option<(f64, f64)>,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            log_scale: false,
            remove_first_bin: false,
            range: None,
        }
    }
}

impl HistogramOptions {
    #[must_use]
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    #[must_use]
    pub fn with_log_scale(mut self, log_scale: bool) -> Self {
        self.log_scale = log_scale;
        self
    }

    #[must_use]
    pub fn with_range(mut self, lo: f64, hi: f64) -> Self {
        self.range = Some((lo, hi));
        self
    }

    pub fn validate(&self) -> PlotResult<()> {
        if self.bins == 0 {
            return Err(PlotError::InvalidData("histogram needs at least one bin".to_owned()));
        }
        if let Some((lo, hi)) = self.range {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(PlotError::invalid_range(lo, hi));
            }
        }
        Ok(())
    }
}

/// Bar histogram of one adapter's values.
#[derive(Debug, Clone)]
pub struct Histogram1DItem {
    data: ArrayRef,
    options: HistogramOptions,
    pub style: CurveStyle,
}

impl Histogram1DItem {
    pub fn new(data: ArrayRef, options: HistogramOptions) -> PlotResult<Self> {
        options.validate()?;
        Ok(Self {
            data,
            options,
            style: CurveStyle::default(),
        })
    }

    #[must_use]
    pub fn data(&self) -> &ArrayRef {
        &self.data
    }

    #[must_use]
    pub fn options(&self) -> HistogramOptions {
        self.options
    }

    pub fn set_options(&mut self, options: HistogramOptions) -> PlotResult<()> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn compute(&self) -> PlotResult<Histogram> {
        let mut histogram = self
            .data
            .with_view(|view| Histogram::from_view(&view, self.options.bins, self.options.range))??;
        if self.options.remove_first_bin {
            histogram.remove_first_bin();
        }
        Ok(histogram)
    }

    fn height_of(&self, count: u64) -> f64 {
        if self.options.log_scale {
            (count as f64).ln_1p()
        } else {
            count as f64
        }
    }

    /// Closed step outline of the bars in data space.
    fn outline(&self, histogram: &Histogram) -> Vec<DataPoint> {
        let mut points = Vec::with_capacity(histogram.bin_count() * 2 + 2);
        let (lo, hi) = histogram.range();
        points.push(DataPoint::new(lo, 0.0));
        for (i, count) in histogram.counts().iter().enumerate() {
            let (x0, x1) = histogram.bin_edges(i);
            let height = self.height_of(*count);
            points.push(DataPoint::new(x0, height));
            points.push(DataPoint::new(x1, height));
        }
        points.push(DataPoint::new(hi, 0.0));
        points
    }

    pub fn bounding_box(&self) -> PlotResult<Option<DataRect>> {
        let histogram = self.compute()?;
        let (lo, hi) = histogram.range();
        let top = histogram.counts().iter().map(|c| self.height_of(*c)).fold(0.0, f64::max);
        Ok(Some(DataRect::new(lo, hi, 0.0, top.max(1.0))))
    }

    fn device_outline(&self, ctx: &ItemRenderContext<'_>) -> PlotResult<Vec<DevicePoint>> {
        let histogram = self.compute()?;
        Ok(self
            .outline(&histogram)
            .into_iter()
            .filter_map(|p| ctx.to_device(p).ok())
            .collect())
    }

    pub(crate) fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> PlotResult<Option<ItemHit>> {
        let outline = self.device_outline(ctx)?;
        let distance = polyline_distance(point, &outline, true);
        let inside = polygon_contains(point, &outline);
        Ok((distance <= tolerance || inside).then_some(ItemHit {
            distance: distance.min(tolerance),
            handle: None,
            inside,
        }))
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) -> PlotResult<()> {
        let outline = self.device_outline(ctx)?;
        if outline.len() < 3 {
            return Ok(());
        }
        let stroke = if ctx.selected {
            ctx.selection_stroke()
        } else {
            self.style.line
        };
        let fill = self.style.fill.or(Some(self.style.line.color.with_alpha(0.35)));
        layer.paths.push(PathPrimitive::polygon(outline, Some(stroke), fill));
        Ok(())
    }
}

struct GridSource<'a> {
    rows: usize,
    cols: usize,
    values: &'a [f64],
}

impl PixelSource for GridSource<'_> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn value(&self, row: usize, col: usize) -> f64 {
        self.values.get(row * self.cols + col).copied().unwrap_or(f64::NAN)
    }
}

/// Pseudo-color 2D histogram of paired `x`/`y` samples.
#[derive(Debug, Clone)]
pub struct Histogram2DItem {
    x: ArrayRef,
    y: ArrayRef,
    nx: usize,
    ny: usize,
    pub log_scale: bool,
    lut: LutState,
    pub alpha: f64,
}

impl Histogram2DItem {
    pub fn new(x: ArrayRef, y: ArrayRef, nx: usize, ny: usize) -> PlotResult<Self> {
        if x.shape().len() != y.shape().len() {
            return Err(PlotError::InvalidData(format!(
                "2D histogram needs equal sample counts, got {} and {}",
                x.shape().len(),
                y.shape().len()
            )));
        }
        if nx == 0 || ny == 0 {
            return Err(PlotError::InvalidData("2D histogram needs at least one bin per axis".to_owned()));
        }
        let mut item = Self {
            x,
            y,
            nx,
            ny,
            log_scale: false,
            lut: LutState::new(palette_preset("jet")?, 0.0, 1.0)?,
            alpha: 1.0,
        };
        item.auto_contrast()?;
        Ok(item)
    }

    #[must_use]
    pub fn bins(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    #[must_use]
    pub fn adapters(&self) -> [&ArrayRef; 2] {
        [&self.x, &self.y]
    }

    #[must_use]
    pub fn lut(&self) -> &LutState {
        &self.lut
    }

    pub fn lut_mut(&mut self) -> &mut LutState {
        &mut self.lut
    }

    pub fn compute(&self) -> PlotResult<Histogram2D> {
        self.x
            .with_view(|x| self.y.with_view(|y| Histogram2D::from_views(&x, &y, self.nx, self.ny)))??
    }

    /// Resets the LUT to `[0, max intensity]`.
    pub fn auto_contrast(&mut self) -> PlotResult<()> {
        let intensities = self.compute()?.intensities(self.log_scale);
        let top = intensities.iter().copied().fold(0.0, f64::max);
        self.lut.set_range(0.0, top.max(1.0))
    }

    pub fn bounding_box(&self) -> PlotResult<Option<DataRect>> {
        let histogram = self.compute()?;
        let (x0, x1) = histogram.x_range();
        let (y0, y1) = histogram.y_range();
        Ok(Some(DataRect::new(x0, x1, y0, y1)))
    }

    pub(crate) fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> PlotResult<Option<ItemHit>> {
        let Some(bounds) = self.bounding_box()? else {
            return Ok(None);
        };
        let outline: Vec<DevicePoint> = bounds
            .corners()
            .into_iter()
            .filter_map(|c| ctx.to_device(c).ok())
            .collect();
        let inside = polygon_contains(point, &outline);
        let distance = polyline_distance(point, &outline, true);
        Ok((inside || distance <= tolerance).then_some(ItemHit {
            distance: if inside { 0.0 } else { distance },
            handle: None,
            inside,
        }))
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) -> PlotResult<()> {
        let histogram = self.compute()?;
        let (x0, x1) = histogram.x_range();
        let (y0, y1) = histogram.y_range();
        let bounds = DataRect::new(x0, x1, y0, y1);
        let (rows, cols) = histogram.shape();
        let bin = |v: f64, lo: f64, hi: f64, n: usize| -> Option<usize> {
            let t = (v - lo) / (hi - lo);
            (0.0..=1.0).contains(&t).then(|| ((t * n as f64) as usize).min(n - 1))
        };
        let plan = DeviceTilePlan::separable(
            bounds,
            rows,
            cols,
            ctx.coords,
            ctx.axes,
            |x| bin(x, x0, x1, cols),
            |y| bin(y, y0, y1, rows),
        )?;
        let Some(plan) = plan else {
            return Ok(());
        };
        let plan = ResamplePlan::Device(plan);
        let values = histogram.intensities(self.log_scale);
        let source = GridSource {
            rows,
            cols,
            values: &values,
        };
        let pixels = resample(&source, &plan, &self.lut, Interpolation::Nearest);
        let (width, height) = plan.tile_size();
        layer.images.push(ImageTile {
            dest: plan.dest(),
            width,
            height,
            pixels: Arc::from(pixels),
            alpha: self.alpha,
        });
        Ok(())
    }
}

/// One- or two-dimensional histogram item.
#[derive(Debug, Clone)]
pub enum HistogramItem {
    OneD(Histogram1DItem),
    TwoD(Histogram2DItem),
}

impl HistogramItem {
    pub fn bounding_box(&self) -> PlotResult<Option<DataRect>> {
        match self {
            Self::OneD(item) => item.bounding_box(),
            Self::TwoD(item) => item.bounding_box(),
        }
    }

    #[must_use]
    pub fn adapters(&self) -> Vec<&ArrayRef> {
        match self {
            Self::OneD(item) => vec![item.data()],
            Self::TwoD(item) => item.adapters().to_vec(),
        }
    }

    #[must_use]
    pub fn lut(&self) -> Option<&LutState> {
        match self {
            Self::OneD(_) => None,
            Self::TwoD(item) => Some(item.lut()),
        }
    }

    pub(crate) fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> PlotResult<Option<ItemHit>> {
        match self {
            Self::OneD(item) => item.hit_test(ctx, point, tolerance),
            Self::TwoD(item) => item.hit_test(ctx, point, tolerance),
        }
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) -> PlotResult<()> {
        match self {
            Self::OneD(item) => item.render(ctx, layer),
            Self::TwoD(item) => item.render(ctx, layer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Histogram1DItem, Histogram2DItem, HistogramOptions};
    use crate::core::SharedArray;

    #[test]
    fn log_scale_compresses_bar_heights() {
        let data = SharedArray::from_vec(vec![1.0f64; 99].into_iter().chain([5.0]).collect());
        let options = HistogramOptions::default().with_bins(4).with_log_scale(true);
        let item = Histogram1DItem::new(data.adapter().expect("adapter"), options).expect("histogram");
        let bounds = item.bounding_box().expect("bbox").expect("extent");
        assert!((bounds.y_max - 99.0f64.ln_1p()).abs() < 1e-9);
        assert_eq!((bounds.x_min, bounds.x_max), (1.0, 5.0));
    }

    #[test]
    fn zero_bins_rejected() {
        let data = SharedArray::from_vec(vec![1.0f64, 2.0]);
        let options = HistogramOptions::default().with_bins(0);
        assert!(Histogram1DItem::new(data.adapter().expect("adapter"), options).is_err());
    }

    #[test]
    fn two_d_histogram_contrast_covers_peak_bin() {
        let x = SharedArray::from_vec(vec![0.0f64, 0.0, 0.0, 1.0]);
        let y = SharedArray::from_vec(vec![0.0f64, 0.0, 0.0, 1.0]);
        let item = Histogram2DItem::new(x.adapter().expect("x"), y.adapter().expect("y"), 2, 2).expect("2d");
        assert_eq!(item.lut().range(), (0.0, 3.0));
    }
}
