//! Streaming, bucketed histograms over buffer views.
//!
//! Used by histogram items, the contrast panel and LUT outlier elimination.
//! Values are consumed straight from [`ArrayView`] iterators; nothing is
//! collected into an intermediate vector.

use serde::{Deserialize, Serialize};

use crate::core::ArrayView;
use crate::error::{PlotError, PlotResult};

/// 1D histogram with `counts.len()` equal-width bins over `[lo, hi]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    lo: f64,
    hi: f64,
    counts: Vec<u64>,
    total: u64,
}

impl Histogram {
    /// Bins the finite values of `view`. Without an explicit `range` a first
    /// pass finds the finite min/max.
    pub fn from_view(view: &ArrayView<'_>, bins: usize, range: Option<(f64, f64)>) -> PlotResult<Self> {
        if bins == 0 {
            return Err(PlotError::InvalidData("histogram needs at least one bin".to_owned()));
        }
        let (lo, hi) = match range {
            Some((lo, hi)) => {
                if !lo.is_finite() || !hi.is_finite() || lo > hi {
                    return Err(PlotError::invalid_range(lo, hi));
                }
                (lo, hi)
            }
            None => view.finite_min_max().unwrap_or((0.0, 1.0)),
        };
        let (lo, hi) = widen_degenerate(lo, hi);
        let mut histogram = Self {
            lo,
            hi,
            counts: vec![0; bins],
            total: 0,
        };
        for value in view.iter() {
            histogram.add(value);
        }
        Ok(histogram)
    }

    fn add(&mut self, value: f64) {
        if let Some(bin) = bin_index(value, self.lo, self.hi, self.counts.len()) {
            self.counts[bin] += 1;
            self.total += 1;
        }
    }

    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn bin_width(&self) -> f64 {
        (self.hi - self.lo) / self.counts.len() as f64
    }

    /// `[left, right)` edges of bin `index`.
    #[must_use]
    pub fn bin_edges(&self, index: usize) -> (f64, f64) {
        let width = self.bin_width();
        let left = self.lo + index as f64 * width;
        (left, left + width)
    }

    /// Drops the first bin, typically the zero background of detector images.
    pub fn remove_first_bin(&mut self) {
        if self.counts.len() > 1 {
            let width = self.bin_width();
            let removed = self.counts.remove(0);
            self.total -= removed;
            self.lo += width;
        }
    }

    /// Value bounds with `percent` of the samples cut from each tail.
    ///
    /// The bounds are bin edges, so the result is exact to one bin width.
    pub fn percentile_bounds(&self, percent: f64) -> PlotResult<(f64, f64)> {
        if !percent.is_finite() || !(0.0..50.0).contains(&percent) {
            return Err(PlotError::InvalidData(format!(
                "outlier percent must be in [0, 50), got {percent}"
            )));
        }
        if self.total == 0 {
            return Ok((self.lo, self.hi));
        }
        let cut = (self.total as f64 * percent / 100.0).floor() as u64;
        let first = first_bin_exceeding(self.counts.iter().copied().enumerate(), cut);
        let last = first_bin_exceeding(self.counts.iter().copied().enumerate().rev(), cut);
        let (lo, _) = self.bin_edges(first.unwrap_or(0));
        let (_, hi) = self.bin_edges(last.unwrap_or(self.counts.len() - 1));
        Ok((lo, hi.max(lo)))
    }
}

fn first_bin_exceeding(bins: impl Iterator<Item = (usize, u64)>, cut: u64) -> Option<usize> {
    let mut cumulative = 0;
    for (index, count) in bins {
        cumulative += count;
        if cumulative > cut {
            return Some(index);
        }
    }
    None
}

fn widen_degenerate(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) }
}

/// Bin of `value` in `bins` equal bins over `[lo, hi]`; `hi` lands in the last bin.
#[inline]
pub(crate) fn bin_index(value: f64, lo: f64, hi: f64, bins: usize) -> Option<usize> {
    if !value.is_finite() || value < lo || value > hi {
        return None;
    }
    let t = (value - lo) / (hi - lo);
    Some(((t * bins as f64) as usize).min(bins - 1))
}

/// 2D histogram of `(x, y)` pairs, row-major with `ny` rows of `nx` bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    x_range: (f64, f64),
    y_range: (f64, f64),
    nx: usize,
    ny: usize,
    counts: Vec<u64>,
}

impl Histogram2D {
    pub fn from_views(x: &ArrayView<'_>, y: &ArrayView<'_>, nx: usize, ny: usize) -> PlotResult<Self> {
        if nx == 0 || ny == 0 {
            return Err(PlotError::InvalidData("2D histogram needs at least one bin per axis".to_owned()));
        }
        if x.len() != y.len() {
            return Err(PlotError::InvalidData(format!(
                "2D histogram inputs differ in length ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        let x_range = widen_degenerate_pair(x.finite_min_max());
        let y_range = widen_degenerate_pair(y.finite_min_max());
        let mut counts = vec![0; nx * ny];
        for (xv, yv) in x.iter().zip(y.iter()) {
            let column = bin_index(xv, x_range.0, x_range.1, nx);
            let row = bin_index(yv, y_range.0, y_range.1, ny);
            if let (Some(column), Some(row)) = (column, row) {
                counts[row * nx + column] += 1;
            }
        }
        Ok(Self {
            x_range,
            y_range,
            nx,
            ny,
            counts,
        })
    }

    #[must_use]
    pub fn x_range(&self) -> (f64, f64) {
        self.x_range
    }

    #[must_use]
    pub fn y_range(&self) -> (f64, f64) {
        self.y_range
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[must_use]
    pub fn count_at(&self, row: usize, column: usize) -> u64 {
        if row < self.ny && column < self.nx {
            self.counts[row * self.nx + column]
        } else {
            0
        }
    }

    /// Counts as display intensities, `ln(1 + count)` when `log_scale`.
    #[must_use]
    pub fn intensities(&self, log_scale: bool) -> Vec<f64> {
        self.counts
            .iter()
            .map(|&count| {
                let count = count as f64;
                if log_scale { count.ln_1p() } else { count }
            })
            .collect()
    }
}

fn widen_degenerate_pair(range: Option<(f64, f64)>) -> (f64, f64) {
    let (lo, hi) = range.unwrap_or((0.0, 1.0));
    widen_degenerate(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::{Histogram, Histogram2D};
    use crate::core::SharedArray;

    #[test]
    fn max_value_falls_in_last_bin() {
        let owner = SharedArray::from_vec((0u16..10).collect());
        let histogram = owner
            .with_view(|view| Histogram::from_view(&view, 5, None))
            .expect("view")
            .expect("histogram");
        assert_eq!(histogram.counts(), &[2, 2, 2, 2, 2]);
        assert_eq!(histogram.range(), (0.0, 9.0));
    }

    #[test]
    fn percentile_bounds_trim_both_tails() {
        let mut values = vec![50.0f64; 96];
        values.extend([0.0, 1.0, 99.0, 100.0]);
        let owner = SharedArray::from_vec(values);
        let histogram = owner
            .with_view(|view| Histogram::from_view(&view, 100, None))
            .expect("view")
            .expect("histogram");
        let (lo, hi) = histogram.percentile_bounds(2.0).expect("bounds");
        assert!((lo - 50.0).abs() < 1.0 + 1e-9);
        assert!((hi - 51.0).abs() < 1.0 + 1e-9);
    }

    #[test]
    fn remove_first_bin_drops_background() {
        let owner = SharedArray::from_vec(vec![0.0f32, 0.0, 0.0, 3.0, 4.0]);
        let mut histogram = owner
            .with_view(|view| Histogram::from_view(&view, 4, None))
            .expect("view")
            .expect("histogram");
        histogram.remove_first_bin();
        assert_eq!(histogram.bin_count(), 3);
        assert_eq!(histogram.total(), 2);
        assert!((histogram.range().0 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn histogram_2d_counts_pairs() {
        let xs = SharedArray::from_vec(vec![0.0f64, 1.0, 1.0, 0.0]);
        let ys = SharedArray::from_vec(vec![0.0f64, 0.0, 1.0, 1.0]);
        let histogram = xs
            .with_view(|x| ys.with_view(|y| Histogram2D::from_views(&x, &y, 2, 2)))
            .expect("x view")
            .expect("y view")
            .expect("histogram");
        assert_eq!(histogram.counts(), &[1, 1, 1, 1]);
        assert_eq!(histogram.count_at(1, 1), 1);
    }
}
