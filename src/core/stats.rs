//! Aggregates over curve intervals and image regions.

use serde::{Deserialize, Serialize};

use crate::core::{ArrayView, RegionView};

/// Statistics of the piecewise-linear curve restricted to `[x0, x1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub x0: f64,
    pub x1: f64,
    pub min: f64,
    pub max: f64,
    /// Trapezoidal integral of the interpolated curve.
    pub integral: f64,
    /// `integral / covered_length`, the average of the interpolated curve.
    pub mean: f64,
    /// Length of `[x0, x1]` actually covered by curve segments.
    pub covered: f64,
    /// Raw samples with `x` inside the interval.
    pub samples: usize,
}

/// Interpolated statistics of the curve `(xs, ys)` over `[x0, x1]`.
///
/// Segments are clipped to the interval and evaluated by linear
/// interpolation, so interval edges falling between samples are honored.
/// Non-finite samples break the curve. Returns `None` when no segment
/// overlaps the interval.
#[must_use]
pub fn interval_stats(xs: &ArrayView<'_>, ys: &ArrayView<'_>, x0: f64, x1: f64) -> Option<IntervalStats> {
    let (x0, x1) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
    let mut stats = IntervalStats {
        x0,
        x1,
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        integral: 0.0,
        mean: f64::NAN,
        covered: 0.0,
        samples: 0,
    };
    let mut previous: Option<(f64, f64)> = None;
    for (x, y) in xs.iter().zip(ys.iter()) {
        if !x.is_finite() || !y.is_finite() {
            previous = None;
            continue;
        }
        if x >= x0 && x <= x1 {
            stats.samples += 1;
        }
        if x0 == x1 && x == x0 {
            stats.min = stats.min.min(y);
            stats.max = stats.max.max(y);
        }
        if let Some((xa, ya)) = previous {
            accumulate_segment(&mut stats, (xa, ya), (x, y));
        }
        previous = Some((x, y));
    }
    if !stats.min.is_finite() {
        return None;
    }
    stats.mean = if stats.covered > 0.0 {
        stats.integral / stats.covered
    } else {
        (stats.min + stats.max) * 0.5
    };
    Some(stats)
}

fn accumulate_segment(stats: &mut IntervalStats, a: (f64, f64), b: (f64, f64)) {
    let ((xa, ya), (xb, yb)) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    let lo = xa.max(stats.x0);
    let hi = xb.min(stats.x1);
    if lo > hi {
        return;
    }
    let at = |x: f64| {
        if xb == xa { ya } else { ya + (yb - ya) * (x - xa) / (xb - xa) }
    };
    let (y_lo, y_hi) = (at(lo), at(hi));
    stats.min = stats.min.min(y_lo).min(y_hi);
    stats.max = stats.max.max(y_lo).max(y_hi);
    stats.integral += (y_lo + y_hi) * 0.5 * (hi - lo);
    stats.covered += hi - lo;
}

/// Streaming statistics over the finite elements of an image region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl RegionStats {
    #[must_use]
    pub fn from_region(region: &RegionView<'_>) -> Option<Self> {
        Self::from_values(region.rows().flatten())
    }

    /// Welford accumulation; `None` when no finite value is seen.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        let (mut mean, mut m2) = (0.0, 0.0);
        for value in values.into_iter().filter(|v| v.is_finite()) {
            count += 1;
            min = min.min(value);
            max = max.max(value);
            sum += value;
            let delta = value - mean;
            mean += delta / count as f64;
            m2 += delta * (value - mean);
        }
        (count > 0).then(|| Self {
            count,
            min,
            max,
            sum,
            mean,
            std_dev: (m2 / count as f64).sqrt(),
        })
    }
}

/// Aggregate displayed by range and region computation labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregate {
    Mean,
    Min,
    Max,
    Integral,
    PeakToPeak,
    Sum,
    StdDev,
    Count,
}

impl Aggregate {
    #[must_use]
    pub fn of_interval(self, stats: &IntervalStats) -> f64 {
        match self {
            Self::Mean => stats.mean,
            Self::Min => stats.min,
            Self::Max => stats.max,
            Self::Integral | Self::Sum => stats.integral,
            Self::PeakToPeak => stats.max - stats.min,
            Self::Count => stats.samples as f64,
            Self::StdDev => f64::NAN,
        }
    }

    #[must_use]
    pub fn of_region(self, stats: &RegionStats) -> f64 {
        match self {
            Self::Mean => stats.mean,
            Self::Min => stats.min,
            Self::Max => stats.max,
            Self::Sum | Self::Integral => stats.sum,
            Self::PeakToPeak => stats.max - stats.min,
            Self::StdDev => stats.std_dev,
            Self::Count => stats.count as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{interval_stats, RegionStats};
    use crate::core::SharedArray;

    #[test]
    fn interval_mean_interpolates_edges() {
        let xs = SharedArray::from_vec(vec![0.0f64, 1.0, 2.0]);
        let ys = SharedArray::from_vec(vec![0.0f64, 1.0, 4.0]);
        let stats = xs
            .with_view(|x| ys.with_view(|y| interval_stats(&x, &y, 0.5, 1.5)))
            .expect("x")
            .expect("y")
            .expect("stats");
        assert!((stats.integral - 1.25).abs() < 1e-12);
        assert!((stats.mean - 1.25).abs() < 1e-12);
        assert!((stats.min - 0.5).abs() < 1e-12);
        assert!((stats.max - 2.5).abs() < 1e-12);
        assert_eq!(stats.samples, 1);
    }

    #[test]
    fn interval_outside_curve_has_no_stats() {
        let xs = SharedArray::from_vec(vec![0.0f64, 1.0]);
        let ys = SharedArray::from_vec(vec![0.0f64, 1.0]);
        let stats = xs
            .with_view(|x| ys.with_view(|y| interval_stats(&x, &y, 5.0, 6.0)))
            .expect("x")
            .expect("y");
        assert!(stats.is_none());
    }

    #[test]
    fn region_stats_skip_nan() {
        let stats = RegionStats::from_values([1.0, f64::NAN, 3.0]).expect("stats");
        assert_eq!(stats.count, 2);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.std_dev - 1.0).abs() < 1e-12);
    }
}
