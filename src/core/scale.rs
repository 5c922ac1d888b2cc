use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};

/// Monotonic lookup table mapping data values to an abstract axis position.
///
/// `data` is strictly increasing; `positions` is strictly monotonic in either
/// direction. Values outside the table extrapolate along the end segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTable {
    data: Vec<f64>,
    positions: Vec<f64>,
}

impl MappingTable {
    pub fn new(data: Vec<f64>, positions: Vec<f64>) -> PlotResult<Self> {
        if data.len() != positions.len() || data.len() < 2 {
            return Err(PlotError::InvalidData(
                "mapping table needs at least two (data, position) pairs".to_owned(),
            ));
        }
        if data.iter().chain(positions.iter()).any(|v| !v.is_finite()) {
            return Err(PlotError::InvalidData(
                "mapping table entries must be finite".to_owned(),
            ));
        }
        if !data.windows(2).all(|w| w[0] < w[1]) {
            return Err(PlotError::InvalidData(
                "mapping table data column must be strictly increasing".to_owned(),
            ));
        }
        let increasing = positions.windows(2).all(|w| w[0] < w[1]);
        let decreasing = positions.windows(2).all(|w| w[0] > w[1]);
        if !increasing && !decreasing {
            return Err(PlotError::InvalidData(
                "mapping table positions must be strictly monotonic".to_owned(),
            ));
        }
        Ok(Self { data, positions })
    }

    /// Builds a table from `(data, position)` pairs, e.g. pixel-center coordinates.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> PlotResult<Self> {
        let (data, positions) = pairs.iter().copied().unzip();
        Self::new(data, positions)
    }

    #[must_use]
    pub fn is_increasing(&self) -> bool {
        self.positions[self.positions.len() - 1] > self.positions[0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Data value to position, O(log n).
    #[must_use]
    pub fn position_of(&self, value: f64) -> f64 {
        let segment = segment_index(&self.data, value, true);
        lerp_segment(&self.data, &self.positions, segment, value)
    }

    /// Position to data value, O(log n).
    #[must_use]
    pub fn value_at(&self, position: f64) -> f64 {
        let segment = segment_index(&self.positions, position, self.is_increasing());
        lerp_segment(&self.positions, &self.data, segment, position)
    }
}

/// Index `i` of the segment `[i, i + 1]` used to interpolate `value`.
fn segment_index(column: &[f64], value: f64, increasing: bool) -> usize {
    let last_segment = column.len() - 2;
    let upper = if increasing {
        column.partition_point(|entry| *entry <= value)
    } else {
        column.partition_point(|entry| *entry >= value)
    };
    upper.saturating_sub(1).min(last_segment)
}

fn lerp_segment(from: &[f64], to: &[f64], segment: usize, value: f64) -> f64 {
    let (f0, f1) = (from[segment], from[segment + 1]);
    let (t0, t1) = (to[segment], to[segment + 1]);
    t0 + (value - f0) * (t1 - t0) / (f1 - f0)
}

/// Per-axis scale kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum AxisScale {
    #[default]
    Linear,
    /// Base-10 logarithmic scale; all visible values must be > 0.
    Log10,
    Lookup(MappingTable),
}

impl AxisScale {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Linear => "lin",
            Self::Log10 => "log",
            Self::Lookup(_) => "lookup",
        }
    }

    /// Data value to the scale's uniform (transformed) domain.
    #[must_use]
    pub fn forward(&self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        match self {
            Self::Linear => Some(value),
            Self::Log10 => (value > 0.0).then(|| value.log10()),
            Self::Lookup(table) => Some(table.position_of(value)),
        }
    }

    /// Transformed-domain value back to data units.
    #[must_use]
    pub fn inverse(&self, transformed: f64) -> Option<f64> {
        if !transformed.is_finite() {
            return None;
        }
        let value = match self {
            Self::Linear => transformed,
            Self::Log10 => 10f64.powf(transformed),
            Self::Lookup(table) => table.value_at(transformed),
        };
        value.is_finite().then_some(value)
    }

    pub fn validate_range(&self, min: f64, max: f64) -> PlotResult<()> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(PlotError::invalid_range(min, max));
        }
        if matches!(self, Self::Log10) && min <= 0.0 {
            return Err(PlotError::invalid_range(min, max));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AxisScale, MappingTable};

    #[test]
    fn lookup_interpolates_between_entries() {
        let table = MappingTable::new(vec![0.0, 10.0, 100.0], vec![0.0, 1.0, 2.0]).expect("table");
        assert!((table.position_of(5.0) - 0.5).abs() < 1e-12);
        assert!((table.position_of(55.0) - 1.5).abs() < 1e-12);
        assert!((table.value_at(1.5) - 55.0).abs() < 1e-12);
    }

    #[test]
    fn lookup_extrapolates_outside_table() {
        let table = MappingTable::new(vec![0.0, 1.0], vec![10.0, 20.0]).expect("table");
        assert!((table.position_of(-1.0) - 0.0).abs() < 1e-12);
        assert!((table.position_of(2.0) - 30.0).abs() < 1e-12);
    }

    #[test]
    fn decreasing_positions_invert_correctly() {
        let table = MappingTable::new(vec![0.0, 1.0, 2.0], vec![5.0, 3.0, 0.0]).expect("table");
        assert!(!table.is_increasing());
        let position = table.position_of(1.5);
        assert!((table.value_at(position) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn non_monotonic_table_is_rejected() {
        assert!(MappingTable::new(vec![0.0, 1.0, 2.0], vec![0.0, 2.0, 1.0]).is_err());
        assert!(MappingTable::new(vec![0.0, 0.0], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn log_scale_rejects_non_positive_range() {
        assert!(AxisScale::Log10.validate_range(0.0, 10.0).is_err());
        assert!(AxisScale::Log10.validate_range(1.0, 10.0).is_ok());
        assert!(AxisScale::Linear.validate_range(2.0, 2.0).is_err());
    }
}
