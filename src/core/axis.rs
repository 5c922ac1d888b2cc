use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{axis_ticks, AxisScale, AxisTicks};
use crate::error::{PlotError, PlotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AxisId {
    XBottom,
    XTop,
    YLeft,
    YRight,
}

impl AxisId {
    pub const ALL: [AxisId; 4] = [Self::XBottom, Self::XTop, Self::YLeft, Self::YRight];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::XBottom => 0,
            Self::XTop => 1,
            Self::YLeft => 2,
            Self::YRight => 3,
        }
    }

    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::XBottom | Self::XTop)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::XBottom => "bottom",
            Self::XTop => "top",
            Self::YLeft => "left",
            Self::YRight => "right",
        }
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Horizontal + vertical axis an item is plotted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisPair {
    pub x: AxisId,
    pub y: AxisId,
}

impl Default for AxisPair {
    fn default() -> Self {
        Self {
            x: AxisId::XBottom,
            y: AxisId::YLeft,
        }
    }
}

impl AxisPair {
    pub fn new(x: AxisId, y: AxisId) -> PlotResult<Self> {
        if !x.is_horizontal() || y.is_horizontal() {
            return Err(PlotError::InvalidData(format!(
                "axis pair must be (horizontal, vertical), got ({x}, {y})"
            )));
        }
        Ok(Self { x, y })
    }
}

/// One plot axis: scale kind, visible range and orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    id: AxisId,
    scale: AxisScale,
    min: f64,
    max: f64,
    #[serde(default)]
    inverted: bool,
    #[serde(default)]
    title: String,
}

impl Axis {
    #[must_use]
    pub fn new(id: AxisId) -> Self {
        Self {
            id,
            scale: AxisScale::Linear,
            min: 0.0,
            max: 1.0,
            inverted: false,
            title: String::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> AxisId {
        self.id
    }

    #[must_use]
    pub fn scale(&self) -> &AxisScale {
        &self.scale
    }

    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_range(&mut self, min: f64, max: f64) -> PlotResult<()> {
        self.scale.validate_range(min, max)?;
        self.min = min;
        self.max = max;
        Ok(())
    }

    /// Tick values for about `target` major intervals over the visible range.
    #[must_use]
    pub fn ticks(&self, target: usize) -> AxisTicks {
        axis_ticks(&self.scale, (self.min, self.max), target)
    }

    /// Swaps the scale kind; fails when the current range is invalid for it.
    pub fn set_scale(&mut self, scale: AxisScale) -> PlotResult<()> {
        scale.validate_range(self.min, self.max)?;
        self.scale = scale;
        Ok(())
    }

    /// Visible range in the scale's transformed domain, sorted ascending.
    pub fn transformed_bounds(&self) -> PlotResult<(f64, f64)> {
        let a = self.forward(self.min)?;
        let b = self.forward(self.max)?;
        let (t0, t1) = if a <= b { (a, b) } else { (b, a) };
        if t0 == t1 {
            return Err(PlotError::invalid_range(self.min, self.max));
        }
        Ok((t0, t1))
    }

    pub fn forward(&self, value: f64) -> PlotResult<f64> {
        self.scale
            .forward(value)
            .ok_or_else(|| PlotError::InvalidData(format!("value {value} not representable on {} axis", self.id)))
    }

    pub fn inverse(&self, transformed: f64) -> PlotResult<f64> {
        self.scale.inverse(transformed).ok_or_else(|| {
            PlotError::InvalidData(format!(
                "transformed value {transformed} not representable on {} axis",
                self.id
            ))
        })
    }

    /// Sets the visible range from transformed-domain bounds.
    pub fn set_transformed_bounds(&mut self, t0: f64, t1: f64) -> PlotResult<()> {
        let a = self.inverse(t0)?;
        let b = self.inverse(t1)?;
        let (min, max) = if a <= b { (a, b) } else { (b, a) };
        self.set_range(min, max)
    }

    /// Normalized position of `value` inside the visible range (0..1 when visible).
    pub fn normalize(&self, value: f64) -> PlotResult<f64> {
        let (t0, t1) = self.transformed_bounds()?;
        Ok((self.forward(value)? - t0) / (t1 - t0))
    }

    pub fn denormalize(&self, normalized: f64) -> PlotResult<f64> {
        let (t0, t1) = self.transformed_bounds()?;
        self.inverse(t0 + normalized * (t1 - t0))
    }

    /// Maps a data value to device pixels along an axis of `length_px` pixels.
    pub fn to_device(&self, value: f64, length_px: f64) -> PlotResult<f64> {
        let n = self.normalize(value)?;
        Ok(length_px * self.oriented(n))
    }

    pub fn from_device(&self, pixel: f64, length_px: f64) -> PlotResult<f64> {
        if !pixel.is_finite() {
            return Err(PlotError::InvalidData("pixel must be finite".to_owned()));
        }
        let n = self.oriented(pixel / length_px);
        self.denormalize(n)
    }

    /// Horizontal axes grow rightwards, vertical axes grow upwards, both
    /// flipped when inverted.
    fn oriented(&self, normalized: f64) -> f64 {
        let flip = self.id.is_horizontal() == self.inverted;
        if flip { 1.0 - normalized } else { normalized }
    }
}

#[cfg(test)]
mod tests {
    use super::{Axis, AxisId, AxisPair};
    use crate::core::{axis_ticks, AxisScale, AxisTicks};

    #[test]
    fn vertical_axis_grows_upwards() {
        let mut axis = Axis::new(AxisId::YLeft);
        axis.set_range(0.0, 10.0).expect("range");
        assert_eq!(axis.to_device(10.0, 100.0).expect("top"), 0.0);
        assert_eq!(axis.to_device(0.0, 100.0).expect("bottom"), 100.0);

        axis.set_inverted(true);
        assert_eq!(axis.to_device(10.0, 100.0).expect("inverted"), 100.0);
    }

    #[test]
    fn horizontal_axis_grows_rightwards() {
        let mut axis = Axis::new(AxisId::XBottom);
        axis.set_range(-5.0, 5.0).expect("range");
        assert_eq!(axis.to_device(0.0, 200.0).expect("center"), 100.0);
    }

    #[test]
    fn log_scale_cannot_be_set_over_non_positive_range() {
        let mut axis = Axis::new(AxisId::XBottom);
        axis.set_range(-1.0, 1.0).expect("range");
        assert!(axis.set_scale(AxisScale::Log10).is_err());
        assert_eq!(axis.scale(), &AxisScale::Linear);
    }

    #[test]
    fn axis_pair_requires_horizontal_then_vertical() {
        assert!(AxisPair::new(AxisId::YLeft, AxisId::XBottom).is_err());
        assert!(AxisPair::new(AxisId::XTop, AxisId::YRight).is_ok());
    }
}
