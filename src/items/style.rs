use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::core::Color;
use crate::render::{LineDash, MarkerShape, StrokeStyle};

fn default_marker_size() -> f64 {
    6.0
}

fn default_handle_size() -> f64 {
    7.0
}

fn default_font_size() -> f64 {
    12.0
}

/// How curve samples are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveType {
    #[default]
    Lines,
    /// Vertical stick from the baseline to each sample.
    Sticks,
    /// Horizontal step to each next sample.
    Steps,
    /// Markers only.
    NoLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveStyle {
    pub line: StrokeStyle,
    #[serde(default)]
    pub curve_type: CurveType,
    #[serde(default)]
    pub marker: MarkerShape,
    #[serde(default = "default_marker_size")]
    pub marker_size: f64,
    #[serde(default)]
    pub marker_fill: Option<Color>,
    /// Fill between the curve and `baseline` when both are set.
    #[serde(default)]
    pub fill: Option<Color>,
    #[serde(default)]
    pub baseline: f64,
}

impl CurveStyle {
    #[must_use]
    pub fn with_color(color: Color) -> Self {
        Self {
            line: StrokeStyle::solid(color, 1.0),
            curve_type: CurveType::Lines,
            marker: MarkerShape::None,
            marker_size: default_marker_size(),
            marker_fill: None,
            fill: None,
            baseline: 0.0,
        }
    }

    #[must_use]
    pub fn with_marker(mut self, marker: MarkerShape, size: f64) -> Self {
        self.marker = marker;
        self.marker_size = size;
        self
    }

    /// `index`-th entry of the process-wide style cycle.
    #[must_use]
    pub fn cycled(index: usize) -> Self {
        let cycle = curve_style_cycle();
        cycle[index % cycle.len()]
    }
}

impl Default for CurveStyle {
    fn default() -> Self {
        Self::cycled(0)
    }
}

/// Immutable style cycle handed out to successive curves.
#[must_use]
pub fn curve_style_cycle() -> &'static [CurveStyle] {
    static CYCLE: OnceLock<Vec<CurveStyle>> = OnceLock::new();
    CYCLE.get_or_init(|| {
        let colors = [
            Color::rgb(0.0, 0.0, 1.0),
            Color::rgb(1.0, 0.0, 0.0),
            Color::rgb(0.0, 0.5, 0.0),
            Color::rgb(0.0, 0.75, 0.75),
            Color::rgb(0.75, 0.0, 0.75),
            Color::rgb(0.75, 0.75, 0.0),
            Color::BLACK,
        ];
        let dashes = [LineDash::Solid, LineDash::Dashed, LineDash::Dotted];
        dashes
            .iter()
            .flat_map(|dash| {
                colors.iter().map(move |color| {
                    let mut style = CurveStyle::with_color(*color);
                    style.line.dash = *dash;
                    style
                })
            })
            .collect()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub stroke: StrokeStyle,
    #[serde(default)]
    pub fill: Option<Color>,
    pub selected_stroke: StrokeStyle,
    #[serde(default = "default_handle_size")]
    pub handle_size_px: f64,
    pub handle_color: Color,
    /// Glyph used by point shapes.
    #[serde(default)]
    pub marker: MarkerShape,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke: StrokeStyle::solid(Color::rgb(0.0, 0.5, 0.0), 1.0),
            fill: None,
            selected_stroke: StrokeStyle::solid(Color::rgb(0.0, 1.0, 0.0), 2.0),
            handle_size_px: default_handle_size(),
            handle_color: Color::rgb(0.0, 1.0, 0.0),
            marker: MarkerShape::Cross,
        }
    }
}

impl ShapeStyle {
    /// Semi-transparent band used by x-range selections.
    #[must_use]
    pub fn range_band() -> Self {
        Self {
            stroke: StrokeStyle::solid(Color::rgb(0.5, 0.5, 0.5), 1.0),
            fill: Some(Color::rgba(0.5, 0.5, 0.5, 0.15)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub color: Color,
    #[serde(default = "default_font_size")]
    pub font_size_px: f64,
    #[serde(default)]
    pub background: Option<Color>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            font_size_px: default_font_size(),
            background: Some(Color::rgba(1.0, 1.0, 1.0, 0.8)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{curve_style_cycle, CurveStyle};

    #[test]
    fn style_cycle_wraps() {
        let len = curve_style_cycle().len();
        assert_eq!(CurveStyle::cycled(1), CurveStyle::cycled(len + 1));
        assert_ne!(CurveStyle::cycled(0), CurveStyle::cycled(1));
    }
}
