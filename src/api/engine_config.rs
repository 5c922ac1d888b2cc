use serde::{Deserialize, Serialize};

use crate::core::{AspectLock, AxisScale, Color, Viewport, DEFAULT_LUT_LEVELS};
use crate::error::{PlotError, PlotResult};

/// Public engine bootstrap configuration.
///
/// Serializable so host applications can persist plot setup as JSON; every
/// field except the viewport and initial ranges has a serde default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotEngineConfig {
    pub viewport: Viewport,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    #[serde(default)]
    pub x_scale: AxisScale,
    #[serde(default)]
    pub y_scale: AxisScale,
    /// Image convention: y grows downwards.
    #[serde(default)]
    pub y_inverted: bool,
    #[serde(default)]
    pub aspect_lock: AspectLock,
    #[serde(default = "default_hit_tolerance_px")]
    pub hit_tolerance_px: f64,
    /// Cached layers survive pans smaller than this many pixels.
    #[serde(default = "default_pan_tolerance_px")]
    pub pan_tolerance_px: f64,
    #[serde(default = "default_wheel_zoom_step")]
    pub wheel_zoom_step: f64,
    #[serde(default = "default_autoscale_margin_ratio")]
    pub autoscale_margin_ratio: f64,
    #[serde(default = "default_palette")]
    pub default_palette: String,
    #[serde(default = "default_lut_levels")]
    pub lut_levels: usize,
    /// Percent of samples saturated on each tail by outlier elimination.
    #[serde(default = "default_outlier_percent")]
    pub outlier_percent: f64,
    #[serde(default = "default_outlier_bins")]
    pub outlier_bins: usize,
    #[serde(default = "default_background")]
    pub background: Color,
    /// Resample images off-thread (needs the `parallel-resample` feature).
    #[serde(default)]
    pub background_resampling: bool,
}

impl PlotEngineConfig {
    /// Minimal config with linear axes over the given ranges.
    #[must_use]
    pub fn new(viewport: Viewport, x_range: (f64, f64), y_range: (f64, f64)) -> Self {
        Self {
            viewport,
            x_range,
            y_range,
            x_scale: AxisScale::Linear,
            y_scale: AxisScale::Linear,
            y_inverted: false,
            aspect_lock: AspectLock::Free,
            hit_tolerance_px: default_hit_tolerance_px(),
            pan_tolerance_px: default_pan_tolerance_px(),
            wheel_zoom_step: default_wheel_zoom_step(),
            autoscale_margin_ratio: default_autoscale_margin_ratio(),
            default_palette: default_palette(),
            lut_levels: default_lut_levels(),
            outlier_percent: default_outlier_percent(),
            outlier_bins: default_outlier_bins(),
            background: default_background(),
            background_resampling: false,
        }
    }

    /// Image-plot defaults: y down, one data unit per pixel square.
    #[must_use]
    pub fn image_plot(viewport: Viewport, x_range: (f64, f64), y_range: (f64, f64)) -> Self {
        Self::new(viewport, x_range, y_range)
            .with_y_inverted(true)
            .with_aspect_lock(AspectLock::Locked { ratio: 1.0 })
    }

    #[must_use]
    pub fn with_scales(mut self, x_scale: AxisScale, y_scale: AxisScale) -> Self {
        self.x_scale = x_scale;
        self.y_scale = y_scale;
        self
    }

    #[must_use]
    pub fn with_y_inverted(mut self, inverted: bool) -> Self {
        self.y_inverted = inverted;
        self
    }

    #[must_use]
    pub fn with_aspect_lock(mut self, aspect_lock: AspectLock) -> Self {
        self.aspect_lock = aspect_lock;
        self
    }

    #[must_use]
    pub fn with_hit_tolerance_px(mut self, tolerance: f64) -> Self {
        self.hit_tolerance_px = tolerance;
        self
    }

    #[must_use]
    pub fn with_pan_tolerance_px(mut self, tolerance: f64) -> Self {
        self.pan_tolerance_px = tolerance;
        self
    }

    #[must_use]
    pub fn with_autoscale_margin_ratio(mut self, ratio: f64) -> Self {
        self.autoscale_margin_ratio = ratio;
        self
    }

    #[must_use]
    pub fn with_default_palette(mut self, name: impl Into<String>) -> Self {
        self.default_palette = name.into();
        self
    }

    #[must_use]
    pub fn with_lut_levels(mut self, levels: usize) -> Self {
        self.lut_levels = levels;
        self
    }

    #[must_use]
    pub fn with_outlier_percent(mut self, percent: f64) -> Self {
        self.outlier_percent = percent;
        self
    }

    #[must_use]
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub fn with_background_resampling(mut self, enabled: bool) -> Self {
        self.background_resampling = enabled;
        self
    }

    /// Checks the values the engine cannot recover from at runtime.
    pub fn validate(&self) -> PlotResult<()> {
        self.viewport.validate()?;
        for (name, value) in [
            ("hit tolerance", self.hit_tolerance_px),
            ("pan tolerance", self.pan_tolerance_px),
            ("autoscale margin", self.autoscale_margin_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PlotError::InvalidData(format!("{name} must be finite and >= 0")));
            }
        }
        if !self.wheel_zoom_step.is_finite() || self.wheel_zoom_step <= 1.0 {
            return Err(PlotError::InvalidData("wheel zoom step must be finite and > 1".to_owned()));
        }
        if !(0.0..50.0).contains(&self.outlier_percent) {
            return Err(PlotError::InvalidData("outlier percent must be in [0, 50)".to_owned()));
        }
        if self.lut_levels < 2 || self.outlier_bins == 0 {
            return Err(PlotError::InvalidData(
                "lut levels must be >= 2 and outlier bins > 0".to_owned(),
            ));
        }
        self.background.validate()
    }

    pub fn to_json_pretty(&self) -> PlotResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PlotError::Serialization(format!("failed to serialize engine config: {e}")))
    }

    pub fn from_json_str(input: &str) -> PlotResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| PlotError::Serialization(format!("failed to parse engine config: {e}")))
    }
}

fn default_hit_tolerance_px() -> f64 {
    5.0
}

fn default_pan_tolerance_px() -> f64 {
    0.5
}

fn default_wheel_zoom_step() -> f64 {
    1.25
}

fn default_autoscale_margin_ratio() -> f64 {
    0.0
}

fn default_palette() -> String {
    "gray".to_owned()
}

fn default_lut_levels() -> usize {
    DEFAULT_LUT_LEVELS
}

fn default_outlier_percent() -> f64 {
    2.0
}

fn default_outlier_bins() -> usize {
    1024
}

fn default_background() -> Color {
    Color::WHITE
}

#[cfg(test)]
mod tests {
    use super::PlotEngineConfig;
    use crate::core::Viewport;

    #[test]
    fn missing_fields_take_defaults() {
        let json = r#"{ "viewport": { "width": 640, "height": 480 }, "x_range": [0.0, 10.0], "y_range": [-1.0, 1.0] }"#;
        let config = PlotEngineConfig::from_json_str(json).expect("parse");
        assert_eq!(config, PlotEngineConfig::new(Viewport::new(640, 480), (0.0, 10.0), (-1.0, 1.0)));
    }

    #[test]
    fn rejects_non_zooming_wheel_step() {
        let mut config = PlotEngineConfig::new(Viewport::new(10, 10), (0.0, 1.0), (0.0, 1.0));
        config.wheel_zoom_step = 1.0;
        assert!(config.validate().is_err());
    }
}
