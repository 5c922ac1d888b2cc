use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{DevicePoint, DeviceRect};
use crate::error::{PlotError, PlotResult};

pub use crate::core::Color;

fn ensure_finite(values: &[f64], what: &str) -> PlotResult<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(PlotError::InvalidData(format!("{what} coordinates must be finite")))
    }
}

/// Stroke dash pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineDash {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineDash {
    /// On/off lengths in pixels, empty for solid strokes.
    #[must_use]
    pub fn pattern(self) -> &'static [f64] {
        match self {
            Self::Solid => &[],
            Self::Dashed => &[6.0, 4.0],
            Self::Dotted => &[1.5, 3.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f64,
    #[serde(default)]
    pub dash: LineDash,
}

impl StrokeStyle {
    #[must_use]
    pub const fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            dash: LineDash::Solid,
        }
    }

    #[must_use]
    pub fn with_dash(mut self, dash: LineDash) -> Self {
        self.dash = dash;
        self
    }

    pub fn validate(self) -> PlotResult<()> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(PlotError::InvalidData(
                "stroke width must be finite and > 0".to_owned(),
            ));
        }
        self.color.validate()
    }
}

/// Draw command for one line segment in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePrimitive {
    pub from: DevicePoint,
    pub to: DevicePoint,
    pub stroke: StrokeStyle,
}

impl LinePrimitive {
    #[must_use]
    pub const fn new(from: DevicePoint, to: DevicePoint, stroke: StrokeStyle) -> Self {
        Self { from, to, stroke }
    }

    pub fn validate(self) -> PlotResult<()> {
        ensure_finite(&[self.from.x, self.from.y, self.to.x, self.to.y], "line")?;
        self.stroke.validate()
    }
}

/// Connected vertices, optionally closed and filled (polygons).
#[derive(Debug, Clone, PartialEq)]
pub struct PathPrimitive {
    pub points: Vec<DevicePoint>,
    pub closed: bool,
    pub stroke: Option<StrokeStyle>,
    pub fill: Option<Color>,
}

impl PathPrimitive {
    #[must_use]
    pub fn polyline(points: Vec<DevicePoint>, stroke: StrokeStyle) -> Self {
        Self {
            points,
            closed: false,
            stroke: Some(stroke),
            fill: None,
        }
    }

    #[must_use]
    pub fn polygon(points: Vec<DevicePoint>, stroke: Option<StrokeStyle>, fill: Option<Color>) -> Self {
        Self {
            points,
            closed: true,
            stroke,
            fill,
        }
    }

    pub fn validate(&self) -> PlotResult<()> {
        if self.points.len() < 2 {
            return Err(PlotError::InvalidData(
                "path needs at least two points".to_owned(),
            ));
        }
        for point in &self.points {
            ensure_finite(&[point.x, point.y], "path")?;
        }
        if let Some(stroke) = self.stroke {
            stroke.validate()?;
        }
        if let Some(fill) = self.fill {
            fill.validate()?;
        }
        Ok(())
    }
}

/// Axis-aligned rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectPrimitive {
    pub rect: DeviceRect,
    pub fill: Option<Color>,
    pub stroke: Option<StrokeStyle>,
}

impl RectPrimitive {
    #[must_use]
    pub const fn new(rect: DeviceRect, fill: Option<Color>, stroke: Option<StrokeStyle>) -> Self {
        Self { rect, fill, stroke }
    }

    pub fn validate(self) -> PlotResult<()> {
        ensure_finite(
            &[self.rect.x, self.rect.y, self.rect.width, self.rect.height],
            "rect",
        )?;
        if self.rect.width < 0.0 || self.rect.height < 0.0 {
            return Err(PlotError::InvalidData(
                "rect size must be >= 0".to_owned(),
            ));
        }
        if let Some(fill) = self.fill {
            fill.validate()?;
        }
        if let Some(stroke) = self.stroke {
            stroke.validate()?;
        }
        Ok(())
    }
}

/// Marker glyph used by curves, points and handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkerShape {
    #[default]
    None,
    Circle,
    Square,
    Diamond,
    Cross,
    Plus,
    TriangleUp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPrimitive {
    pub center: DevicePoint,
    pub shape: MarkerShape,
    pub size_px: f64,
    pub fill: Option<Color>,
    pub stroke: Option<StrokeStyle>,
}

impl MarkerPrimitive {
    pub fn validate(self) -> PlotResult<()> {
        ensure_finite(&[self.center.x, self.center.y], "marker")?;
        if !self.size_px.is_finite() || self.size_px <= 0.0 {
            return Err(PlotError::InvalidData(
                "marker size must be finite and > 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Horizontal text alignment relative to `TextPrimitive::position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextHAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical text alignment relative to `TextPrimitive::position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextVAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// Draw command for one (possibly multi-line) label in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrimitive {
    pub text: String,
    pub position: DevicePoint,
    pub font_size_px: f64,
    pub color: Color,
    pub h_align: TextHAlign,
    pub v_align: TextVAlign,
    pub background: Option<Color>,
}

impl TextPrimitive {
    #[must_use]
    pub fn new(text: impl Into<String>, position: DevicePoint, font_size_px: f64, color: Color) -> Self {
        Self {
            text: text.into(),
            position,
            font_size_px,
            color,
            h_align: TextHAlign::Left,
            v_align: TextVAlign::Top,
            background: None,
        }
    }

    #[must_use]
    pub fn aligned(mut self, h_align: TextHAlign, v_align: TextVAlign) -> Self {
        self.h_align = h_align;
        self.v_align = v_align;
        self
    }

    #[must_use]
    pub fn with_background(mut self, background: Option<Color>) -> Self {
        self.background = background;
        self
    }

    /// Rough pixel extent used for layout without a font backend.
    #[must_use]
    pub fn estimated_size(&self) -> (f64, f64) {
        let lines = self.text.lines().count().max(1);
        let longest = self.text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        (
            longest as f64 * self.font_size_px * 0.6,
            lines as f64 * self.font_size_px * 1.2,
        )
    }

    pub fn validate(&self) -> PlotResult<()> {
        if self.text.is_empty() {
            return Err(PlotError::InvalidData(
                "text primitive must not be empty".to_owned(),
            ));
        }
        ensure_finite(&[self.position.x, self.position.y], "text")?;
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(PlotError::InvalidData(
                "font size must be finite and > 0".to_owned(),
            ));
        }
        self.color.validate()
    }
}

/// Resampled RGBA pixels drawn stretched into `dest`.
///
/// `pixels` is row-major, 4 bytes per pixel, top row first. The tile holds
/// at most one pixel per device pixel of `dest`; compositing scales it up
/// without materializing an enlarged copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTile {
    pub dest: DeviceRect,
    pub width: usize,
    pub height: usize,
    pub pixels: Arc<[u8]>,
    pub alpha: f64,
}

impl ImageTile {
    pub fn validate(&self) -> PlotResult<()> {
        ensure_finite(
            &[self.dest.x, self.dest.y, self.dest.width, self.dest.height],
            "image tile",
        )?;
        if self.pixels.len() != self.width * self.height * 4 {
            return Err(PlotError::InvalidData(format!(
                "image tile {}x{} carries {} bytes",
                self.width,
                self.height,
                self.pixels.len()
            )));
        }
        Ok(())
    }

    /// RGBA of the tile pixel covering device point `(x, y)`, if any.
    #[must_use]
    pub fn sample_device(&self, x: f64, y: f64) -> Option<[u8; 4]> {
        if self.width == 0 || self.height == 0 || self.dest.width <= 0.0 || self.dest.height <= 0.0 {
            return None;
        }
        let u = (x - self.dest.x) / self.dest.width;
        let v = (y - self.dest.y) / self.dest.height;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return None;
        }
        let column = ((u * self.width as f64) as usize).min(self.width - 1);
        let row = ((v * self.height as f64) as usize).min(self.height - 1);
        let offset = (row * self.width + column) * 4;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}
