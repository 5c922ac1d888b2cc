use serde::{Deserialize, Serialize};

use crate::core::geometry::polygon_area;
use crate::core::{DataPoint, DevicePoint};
use crate::error::PlotResult;
use crate::items::{ItemHit, ItemRenderContext, ShapeGeometry, ShapeItem, TextStyle};
use crate::render::{ItemLayer, TextHAlign, TextPrimitive, TextVAlign};

fn default_precision() -> usize {
    3
}

fn default_true() -> bool {
    true
}

/// Shape with an auto-generated label of derived measurements.
///
/// The label is recomputed from the geometry every time the item is
/// rendered, so handle drags update it live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationItem {
    pub shape: ShapeItem,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_true")]
    pub show_label: bool,
    #[serde(default)]
    pub label_style: TextStyle,
    #[serde(default = "default_precision")]
    pub precision: usize,
}

impl AnnotationItem {
    pub fn new(geometry: ShapeGeometry) -> PlotResult<Self> {
        Ok(Self {
            shape: ShapeItem::new(geometry)?,
            title: String::new(),
            show_label: true,
            label_style: TextStyle::default(),
            precision: default_precision(),
        })
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn geometry(&self) -> &ShapeGeometry {
        &self.shape.geometry
    }

    /// Named measurements derived from the geometry.
    #[must_use]
    pub fn measurements(&self) -> Vec<(&'static str, f64)> {
        match &self.shape.geometry {
            ShapeGeometry::Point(p) => vec![("x", p.x), ("y", p.y)],
            ShapeGeometry::Segment { a, b } => vec![
                ("length", a.distance_to(*b)),
                ("dx", b.x - a.x),
                ("dy", b.y - a.y),
            ],
            ShapeGeometry::Rectangle(r) => {
                let center = r.center();
                vec![
                    ("center x", center.x),
                    ("center y", center.y),
                    ("width", r.width()),
                    ("height", r.height()),
                ]
            }
            ShapeGeometry::Circle { center, radius } => vec![
                ("center x", center.x),
                ("center y", center.y),
                ("diameter", radius * 2.0),
                ("area", std::f64::consts::PI * radius * radius),
            ],
            ShapeGeometry::Ellipse {
                center,
                semi_x,
                semi_y,
                angle,
            } => vec![
                ("center x", center.x),
                ("center y", center.y),
                ("width", semi_x * 2.0),
                ("height", semi_y * 2.0),
                ("angle", angle.to_degrees()),
            ],
            ShapeGeometry::Polygon(points) => vec![
                ("area", polygon_area(points)),
                ("perimeter", path_length(points, true)),
            ],
            ShapeGeometry::Polyline(points) => vec![("length", path_length(points, false))],
            ShapeGeometry::XRange { x0, x1 } => {
                vec![("x0", x0.min(*x1)), ("x1", x0.max(*x1)), ("width", (x1 - x0).abs())]
            }
        }
    }

    #[must_use]
    pub fn label_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        if !self.title.is_empty() {
            lines.push(self.title.clone());
        }
        lines.extend(
            self.measurements()
                .into_iter()
                .map(|(name, value)| format!("{name} = {value:.*}", self.precision)),
        );
        lines.join("\n")
    }

    pub(crate) fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> Option<ItemHit> {
        self.shape.hit_test(ctx, point, tolerance)
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) {
        self.shape.render(ctx, layer);
        if !self.show_label {
            return;
        }
        let Some(anchor) = self.label_anchor(ctx) else {
            return;
        };
        layer.texts.push(
            TextPrimitive::new(
                self.label_text(),
                anchor,
                self.label_style.font_size_px,
                self.label_style.color,
            )
            .aligned(TextHAlign::Left, TextVAlign::Bottom)
            .with_background(self.label_style.background),
        );
    }

    /// Top-right corner of the shape's device footprint, nudged outward.
    fn label_anchor(&self, ctx: &ItemRenderContext<'_>) -> Option<DevicePoint> {
        let handles = self.shape.geometry.device_handles(ctx);
        let points = handles.iter().flatten();
        let x = points.clone().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let y = points.map(|p| p.y).fold(f64::INFINITY, f64::min);
        (x.is_finite() && y.is_finite()).then(|| DevicePoint::new(x + 6.0, y - 6.0))
    }
}

fn path_length(points: &[DataPoint], closed: bool) -> f64 {
    let open: f64 = points.windows(2).map(|w| w[0].distance_to(w[1])).sum();
    match (closed, points.first(), points.last()) {
        (true, Some(first), Some(last)) => open + last.distance_to(*first),
        _ => open,
    }
}

#[cfg(test)]
mod tests {
    use super::AnnotationItem;
    use crate::core::{DataPoint, DataRect};
    use crate::items::ShapeGeometry;

    #[test]
    fn rectangle_label_follows_handle_moves() {
        let mut annotation = AnnotationItem::new(ShapeGeometry::Rectangle(DataRect::new(0.0, 2.0, 0.0, 1.0)))
            .expect("annotation")
            .with_title("roi");
        assert!(annotation.label_text().contains("width = 2.000"));
        annotation
            .shape
            .geometry
            .move_handle(2, DataPoint::new(4.0, 1.0))
            .expect("drag");
        let text = annotation.label_text();
        assert!(text.starts_with("roi\n"));
        assert!(text.contains("width = 4.000"));
    }

    #[test]
    fn polygon_reports_area() {
        let square = vec![
            DataPoint::new(0.0, 0.0),
            DataPoint::new(1.0, 0.0),
            DataPoint::new(1.0, 1.0),
            DataPoint::new(0.0, 1.0),
        ];
        let annotation = AnnotationItem::new(ShapeGeometry::Polygon(square)).expect("annotation");
        let measurements = annotation.measurements();
        assert_eq!(measurements[0], ("area", 1.0));
        assert_eq!(measurements[1], ("perimeter", 4.0));
    }
}
