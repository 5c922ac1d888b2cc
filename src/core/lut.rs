//! Palettes and per-image contrast (LUT) state.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::core::{ArrayView, Color, Histogram};
use crate::error::{PlotError, PlotResult};

/// Default number of palette levels.
pub const DEFAULT_LUT_LEVELS: usize = 256;

/// Immutable `N`-level color table.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    name: String,
    colors: Vec<[u8; 4]>,
}

impl Palette {
    /// Samples a piecewise-linear gradient through `stops` (positions in `0..=1`).
    pub fn from_stops(name: impl Into<String>, stops: &[(f64, Color)], levels: usize) -> PlotResult<Self> {
        if levels < 2 {
            return Err(PlotError::InvalidData("palette needs at least two levels".to_owned()));
        }
        if stops.len() < 2 || !stops.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(PlotError::InvalidData(
                "palette stops must be at least two, strictly increasing".to_owned(),
            ));
        }
        let colors = (0..levels)
            .map(|level| {
                let t = level as f64 / (levels - 1) as f64;
                gradient_at(stops, t).to_rgba8()
            })
            .collect();
        Ok(Self {
            name: name.into(),
            colors,
        })
    }

    pub fn from_colors(name: impl Into<String>, colors: Vec<[u8; 4]>) -> PlotResult<Self> {
        if colors.len() < 2 {
            return Err(PlotError::InvalidData("palette needs at least two levels".to_owned()));
        }
        Ok(Self {
            name: name.into(),
            colors,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn levels(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn max_index(&self) -> usize {
        self.colors.len() - 1
    }

    #[must_use]
    pub fn color(&self, index: usize) -> [u8; 4] {
        self.colors[index.min(self.max_index())]
    }

    /// Same gradient resampled to `levels` entries.
    pub fn resampled(&self, levels: usize) -> PlotResult<Self> {
        let stops: Vec<(f64, Color)> = self
            .colors
            .iter()
            .enumerate()
            .map(|(i, rgba)| (i as f64 / self.max_index() as f64, Color::from_rgba8(*rgba)))
            .collect();
        Self::from_stops(self.name.clone(), &stops, levels)
    }
}

fn gradient_at(stops: &[(f64, Color)], t: f64) -> Color {
    let upper = stops.partition_point(|(position, _)| *position <= t);
    if upper == 0 {
        return stops[0].1;
    }
    if upper >= stops.len() {
        return stops[stops.len() - 1].1;
    }
    let (p0, c0) = stops[upper - 1];
    let (p1, c1) = stops[upper];
    c0.lerp(c1, (t - p0) / (p1 - p0))
}

/// Built-in palettes, created once per process and shared read-only.
#[must_use]
pub fn palette_presets() -> &'static [Arc<Palette>] {
    static PRESETS: OnceLock<Vec<Arc<Palette>>> = OnceLock::new();
    PRESETS.get_or_init(|| {
        let definitions: [(&str, &[(f64, Color)]); 4] = [
            ("gray", &[(0.0, Color::BLACK), (1.0, Color::WHITE)]),
            (
                "jet",
                &[
                    (0.0, Color::rgb(0.0, 0.0, 0.5)),
                    (0.11, Color::rgb(0.0, 0.0, 1.0)),
                    (0.125, Color::rgb(0.0, 0.0, 1.0)),
                    (0.34, Color::rgb(0.0, 0.86, 1.0)),
                    (0.35, Color::rgb(0.0, 0.9, 0.97)),
                    (0.64, Color::rgb(1.0, 1.0, 0.0)),
                    (0.65, Color::rgb(1.0, 0.96, 0.0)),
                    (0.89, Color::rgb(1.0, 0.0, 0.0)),
                    (1.0, Color::rgb(0.5, 0.0, 0.0)),
                ],
            ),
            (
                "hot",
                &[
                    (0.0, Color::BLACK),
                    (0.365, Color::rgb(1.0, 0.0, 0.0)),
                    (0.746, Color::rgb(1.0, 1.0, 0.0)),
                    (1.0, Color::WHITE),
                ],
            ),
            (
                "viridis",
                &[
                    (0.0, Color::rgb(0.267, 0.005, 0.329)),
                    (0.25, Color::rgb(0.229, 0.322, 0.546)),
                    (0.5, Color::rgb(0.128, 0.567, 0.551)),
                    (0.75, Color::rgb(0.369, 0.789, 0.383)),
                    (1.0, Color::rgb(0.993, 0.906, 0.144)),
                ],
            ),
        ];
        definitions
            .iter()
            .filter_map(|(name, stops)| Palette::from_stops(*name, stops, DEFAULT_LUT_LEVELS).ok())
            .map(Arc::new)
            .collect()
    })
}

/// Looks up a built-in palette by name.
pub fn palette_preset(name: &str) -> PlotResult<Arc<Palette>> {
    palette_presets()
        .iter()
        .find(|palette| palette.name() == name)
        .cloned()
        .ok_or_else(|| PlotError::InvalidData(format!("unknown palette `{name}`")))
}

/// Contrast range plus palette of one image.
///
/// `lo <= hi` always holds. `lo == hi` is a degenerate single-step LUT:
/// values below `lo` map to index 0, everything else to the top index.
#[derive(Debug, Clone, PartialEq)]
pub struct LutState {
    lo: f64,
    hi: f64,
    palette: Arc<Palette>,
    revision: u64,
}

impl LutState {
    pub fn new(palette: Arc<Palette>, lo: f64, hi: f64) -> PlotResult<Self> {
        validate_contrast(lo, hi)?;
        Ok(Self {
            lo,
            hi,
            palette,
            revision: 0,
        })
    }

    /// Gray LUT spanning the finite range of `view`.
    pub fn auto_range(view: &ArrayView<'_>, palette: Arc<Palette>) -> PlotResult<Self> {
        let (lo, hi) = view.finite_min_max().unwrap_or((0.0, 1.0));
        Self::new(palette, lo, hi)
    }

    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    #[must_use]
    pub fn palette(&self) -> &Arc<Palette> {
        &self.palette
    }

    /// Bumped on every range or palette change; part of render cache keys.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Rejects `lo > hi` (and non-finite bounds) leaving the state unchanged.
    pub fn set_range(&mut self, lo: f64, hi: f64) -> PlotResult<()> {
        validate_contrast(lo, hi)?;
        if (lo, hi) != (self.lo, self.hi) {
            self.lo = lo;
            self.hi = hi;
            self.revision += 1;
            debug!(lo, hi, revision = self.revision, "set lut range");
        }
        Ok(())
    }

    pub fn set_palette(&mut self, palette: Arc<Palette>) {
        self.palette = palette;
        self.revision += 1;
    }

    /// Palette index for `value`; `None` for NaN (drawn transparent).
    #[inline]
    #[must_use]
    pub fn index_of(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let max = self.palette.max_index();
        if self.hi == self.lo {
            return Some(if value < self.lo { 0 } else { max });
        }
        let t = (value - self.lo) / (self.hi - self.lo);
        let index = (t * max as f64).round();
        Some(index.clamp(0.0, max as f64) as usize)
    }

    #[inline]
    #[must_use]
    pub fn color_of(&self, value: f64) -> [u8; 4] {
        self.index_of(value)
            .map_or([0, 0, 0, 0], |index| self.palette.color(index))
    }

    /// Recomputes `[lo, hi]` so that `percent` of the samples on each tail
    /// saturate. Uses a streaming bucketed histogram of `bins` buckets.
    pub fn eliminate_outliers(&mut self, view: &ArrayView<'_>, percent: f64, bins: usize) -> PlotResult<(f64, f64)> {
        let histogram = Histogram::from_view(view, bins, None)?;
        let (lo, hi) = histogram.percentile_bounds(percent)?;
        self.set_range(lo, hi)?;
        Ok((lo, hi))
    }
}

fn validate_contrast(lo: f64, hi: f64) -> PlotResult<()> {
    if !lo.is_finite() || !hi.is_finite() || lo > hi {
        return Err(PlotError::invalid_range(lo, hi));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{palette_preset, palette_presets, LutState};

    fn gray_lut(lo: f64, hi: f64) -> LutState {
        LutState::new(palette_preset("gray").expect("gray"), lo, hi).expect("lut")
    }

    #[test]
    fn presets_are_shared() {
        let a = palette_preset("jet").expect("jet");
        let b = palette_preset("jet").expect("jet");
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert_eq!(palette_presets().len(), 4);
    }

    #[test]
    fn contrast_range_clamps_and_interpolates() {
        let lut = gray_lut(4.0, 11.0);
        assert_eq!(lut.index_of(0.0), Some(0));
        assert_eq!(lut.index_of(4.0), Some(0));
        assert_eq!(lut.index_of(11.0), Some(255));
        assert_eq!(lut.index_of(15.0), Some(255));
        assert_eq!(lut.index_of(7.5), Some(128));
        assert_eq!(lut.index_of(f64::NAN), None);
    }

    #[test]
    fn lo_above_hi_is_rejected_unchanged() {
        let mut lut = gray_lut(0.0, 10.0);
        assert!(lut.set_range(11.0, 10.0).is_err());
        assert_eq!(lut.range(), (0.0, 10.0));
        assert_eq!(lut.revision(), 0);
    }

    #[test]
    fn degenerate_range_is_a_step() {
        let mut lut = gray_lut(0.0, 10.0);
        lut.set_range(10.0, 10.0).expect("lo == hi accepted");
        assert_eq!(lut.index_of(9.99), Some(0));
        assert_eq!(lut.index_of(10.0), Some(255));
        assert_eq!(lut.revision(), 1);
    }
}
