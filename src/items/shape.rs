use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::geometry::{ellipse_outline, polygon_contains, polyline_distance};
use crate::core::{DataPoint, DataRect, DevicePoint, DeviceRect};
use crate::error::{PlotError, PlotResult};
use crate::items::{ItemHit, ItemRenderContext, ShapeStyle};
use crate::render::{ItemLayer, MarkerPrimitive, PathPrimitive, RectPrimitive};

const CURVED_SEGMENTS: usize = 64;

/// Analytic geometry of a shape, in data units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeGeometry {
    Point(DataPoint),
    Segment { a: DataPoint, b: DataPoint },
    Rectangle(DataRect),
    Circle { center: DataPoint, radius: f64 },
    /// `semi_x` runs along `angle` (radians, counter-clockwise).
    Ellipse {
        center: DataPoint,
        semi_x: f64,
        semi_y: f64,
        angle: f64,
    },
    Polygon(Vec<DataPoint>),
    Polyline(Vec<DataPoint>),
    /// Vertical band `[x0, x1]` spanning the whole plot height.
    XRange { x0: f64, x1: f64 },
}

impl ShapeGeometry {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "point",
            Self::Segment { .. } => "segment",
            Self::Rectangle(_) => "rectangle",
            Self::Circle { .. } => "circle",
            Self::Ellipse { .. } => "ellipse",
            Self::Polygon(_) => "polygon",
            Self::Polyline(_) => "polyline",
            Self::XRange { .. } => "xrange",
        }
    }

    pub fn validate(&self) -> PlotResult<()> {
        let finite = |points: &[DataPoint]| points.iter().all(|p| p.is_finite());
        let ok = match self {
            Self::Point(p) => p.is_finite(),
            Self::Segment { a, b } => a.is_finite() && b.is_finite(),
            Self::Rectangle(r) => finite(&r.corners()),
            Self::Circle { center, radius } => center.is_finite() && radius.is_finite() && *radius > 0.0,
            Self::Ellipse {
                center,
                semi_x,
                semi_y,
                angle,
            } => {
                center.is_finite()
                    && angle.is_finite()
                    && semi_x.is_finite()
                    && semi_y.is_finite()
                    && *semi_x > 0.0
                    && *semi_y > 0.0
            }
            Self::Polygon(points) => {
                if points.len() < 3 {
                    return Err(PlotError::UnsupportedShape(format!(
                        "polygon needs at least 3 vertices, got {}",
                        points.len()
                    )));
                }
                finite(points)
            }
            Self::Polyline(points) => {
                if points.len() < 2 {
                    return Err(PlotError::UnsupportedShape(format!(
                        "polyline needs at least 2 vertices, got {}",
                        points.len()
                    )));
                }
                finite(points)
            }
            Self::XRange { x0, x1 } => x0.is_finite() && x1.is_finite(),
        };
        if ok {
            Ok(())
        } else {
            Err(PlotError::UnsupportedShape(format!(
                "{} geometry must be finite with positive radii",
                self.kind_name()
            )))
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::Rectangle(_) | Self::Circle { .. } | Self::Ellipse { .. } | Self::Polygon(_) | Self::XRange { .. }
        )
    }

    /// Data-space extent; `XRange` has no vertical extent of its own.
    #[must_use]
    pub fn bounding_box(&self) -> Option<DataRect> {
        match self {
            Self::Point(p) => Some(DataRect::from_corners(*p, *p)),
            Self::Segment { a, b } => Some(DataRect::from_corners(*a, *b)),
            Self::Rectangle(r) => Some(*r),
            Self::Circle { center, radius } => Some(DataRect::new(
                center.x - radius,
                center.x + radius,
                center.y - radius,
                center.y + radius,
            )),
            Self::Ellipse {
                center,
                semi_x,
                semi_y,
                angle,
            } => {
                let (sin, cos) = angle.sin_cos();
                let half_w = ((semi_x * cos).powi(2) + (semi_y * sin).powi(2)).sqrt();
                let half_h = ((semi_x * sin).powi(2) + (semi_y * cos).powi(2)).sqrt();
                Some(DataRect::new(
                    center.x - half_w,
                    center.x + half_w,
                    center.y - half_h,
                    center.y + half_h,
                ))
            }
            Self::Polygon(points) | Self::Polyline(points) => DataRect::enclosing(points.iter().copied()),
            Self::XRange { .. } => None,
        }
    }

    /// Control points in data space. `XRange` handles sit at `y`.
    #[must_use]
    pub fn handles(&self, y: f64) -> SmallVec<[DataPoint; 8]> {
        match self {
            Self::Point(p) => SmallVec::from_slice(&[*p]),
            Self::Segment { a, b } => SmallVec::from_slice(&[*a, *b]),
            Self::Rectangle(r) => SmallVec::from_slice(&r.corners()),
            Self::Circle { center, radius } => SmallVec::from_slice(&[
                center.offset(*radius, 0.0),
                center.offset(-*radius, 0.0),
            ]),
            Self::Ellipse {
                center,
                semi_x,
                semi_y,
                angle,
            } => {
                let (sin, cos) = angle.sin_cos();
                SmallVec::from_slice(&[
                    center.offset(semi_x * cos, semi_x * sin),
                    center.offset(-semi_x * cos, -semi_x * sin),
                    center.offset(-semi_y * sin, semi_y * cos),
                    center.offset(semi_y * sin, -semi_y * cos),
                ])
            }
            Self::Polygon(points) | Self::Polyline(points) => points.iter().copied().collect(),
            Self::XRange { x0, x1 } => SmallVec::from_slice(&[DataPoint::new(*x0, y), DataPoint::new(*x1, y)]),
        }
    }

    /// Moves control point `handle` to `to`, keeping the other ones fixed.
    pub fn move_handle(&mut self, handle: usize, to: DataPoint) -> PlotResult<()> {
        if !to.is_finite() {
            return Err(PlotError::InvalidData("handle position must be finite".to_owned()));
        }
        let mut next = self.clone();
        match &mut next {
            Self::Point(p) => *p = to,
            Self::Segment { a, b } => match handle {
                0 => *a = to,
                _ => *b = to,
            },
            Self::Rectangle(r) => {
                let opposite = r.corners()[(handle + 2) % 4];
                *r = DataRect::from_corners(opposite, to);
            }
            Self::Circle { center, radius } => *radius = center.distance_to(to),
            Self::Ellipse {
                center,
                semi_x,
                semi_y,
                angle,
            } => {
                let (dx, dy) = (to.x - center.x, to.y - center.y);
                match handle {
                    0 | 1 => {
                        *semi_x = dx.hypot(dy);
                        let direction = dy.atan2(dx);
                        *angle = if handle == 0 { direction } else { direction + std::f64::consts::PI };
                    }
                    _ => {
                        let (sin, cos) = angle.sin_cos();
                        *semi_y = (-dx * sin + dy * cos).abs();
                    }
                }
            }
            Self::Polygon(points) | Self::Polyline(points) => {
                if let Some(vertex) = points.get_mut(handle) {
                    *vertex = to;
                }
            }
            Self::XRange { x0, x1 } => match handle {
                0 => *x0 = to.x,
                _ => *x1 = to.x,
            },
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        let shift = |p: &mut DataPoint| *p = p.offset(dx, dy);
        match self {
            Self::Point(p) => shift(p),
            Self::Segment { a, b } => {
                shift(a);
                shift(b);
            }
            Self::Rectangle(r) => *r = DataRect::new(r.x_min + dx, r.x_max + dx, r.y_min + dy, r.y_max + dy),
            Self::Circle { center, .. } | Self::Ellipse { center, .. } => shift(center),
            Self::Polygon(points) | Self::Polyline(points) => points.iter_mut().for_each(shift),
            Self::XRange { x0, x1 } => {
                *x0 += dx;
                *x1 += dx;
            }
        }
    }

    /// Sorted `[x0, x1]` of an x-range, or the horizontal extent otherwise.
    #[must_use]
    pub fn x_interval(&self) -> Option<(f64, f64)> {
        match self {
            Self::XRange { x0, x1 } => Some((x0.min(*x1), x0.max(*x1))),
            other => other.bounding_box().map(|r| (r.x_min, r.x_max)),
        }
    }

    /// Outline in device pixels.
    fn device_outline(&self, ctx: &ItemRenderContext<'_>) -> Vec<DevicePoint> {
        let map = |points: &[DataPoint]| -> Vec<DevicePoint> {
            points.iter().filter_map(|p| ctx.to_device(*p).ok()).collect()
        };
        match self {
            Self::Point(p) => map(&[*p]),
            Self::Segment { a, b } => map(&[*a, *b]),
            Self::Rectangle(r) => map(&r.corners()),
            Self::Circle { center, radius } => map(&ellipse_outline(*center, *radius, *radius, 0.0, CURVED_SEGMENTS)),
            Self::Ellipse {
                center,
                semi_x,
                semi_y,
                angle,
            } => map(&ellipse_outline(*center, *semi_x, *semi_y, *angle, CURVED_SEGMENTS)),
            Self::Polygon(points) | Self::Polyline(points) => map(points),
            Self::XRange { .. } => self
                .x_range_rect(ctx)
                .map(|r| {
                    vec![
                        DevicePoint::new(r.x, r.y),
                        DevicePoint::new(r.right(), r.y),
                        DevicePoint::new(r.right(), r.bottom()),
                        DevicePoint::new(r.x, r.bottom()),
                    ]
                })
                .unwrap_or_default(),
        }
    }

    fn x_range_rect(&self, ctx: &ItemRenderContext<'_>) -> Option<DeviceRect> {
        let Self::XRange { x0, x1 } = self else {
            return None;
        };
        let length = ctx.coords.viewport().width_px();
        let axis = ctx.coords.axis(ctx.axes.x);
        let a = axis.to_device(*x0, length).ok()?;
        let b = axis.to_device(*x1, length).ok()?;
        Some(DeviceRect::new(a.min(b), 0.0, (a - b).abs(), ctx.coords.viewport().height_px()))
    }

    fn handle_y(&self, ctx: &ItemRenderContext<'_>) -> f64 {
        let (y0, y1) = ctx.coords.axis_range(ctx.axes.y);
        ctx.coords
            .axis(ctx.axes.y)
            .denormalize(0.5)
            .unwrap_or((y0 + y1) * 0.5)
    }

    /// Device positions of the control points.
    pub(crate) fn device_handles(&self, ctx: &ItemRenderContext<'_>) -> SmallVec<[Option<DevicePoint>; 8]> {
        self.handles(self.handle_y(ctx))
            .into_iter()
            .map(|p| ctx.to_device(p).ok())
            .collect()
    }
}

/// Standalone geometric shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeItem {
    pub geometry: ShapeGeometry,
    #[serde(default)]
    pub style: ShapeStyle,
}

impl ShapeItem {
    pub fn new(geometry: ShapeGeometry) -> PlotResult<Self> {
        geometry.validate()?;
        let style = if matches!(geometry, ShapeGeometry::XRange { .. }) {
            ShapeStyle::range_band()
        } else {
            ShapeStyle::default()
        };
        Ok(Self { geometry, style })
    }

    #[must_use]
    pub fn with_style(mut self, style: ShapeStyle) -> Self {
        self.style = style;
        self
    }

    pub(crate) fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> Option<ItemHit> {
        let outline = self.geometry.device_outline(ctx);
        let closed = self.geometry.is_closed();
        let edge = polyline_distance(point, &outline, closed);
        let handle = self
            .geometry
            .device_handles(ctx)
            .into_iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|p| (i, p.distance_to(point))))
            .filter(|(_, d)| *d <= tolerance)
            .min_by_key(|(_, d)| OrderedFloat(*d));
        if let Some((index, distance)) = handle {
            return Some(ItemHit {
                distance: distance.min(edge),
                handle: Some(index),
                inside: false,
            });
        }

        let inside = closed && polygon_contains(point, &outline);
        if edge <= tolerance || inside {
            return Some(ItemHit {
                distance: edge.min(tolerance),
                handle: None,
                inside,
            });
        }
        None
    }

    pub(crate) fn contains(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint) -> bool {
        self.geometry.is_closed() && polygon_contains(point, &self.geometry.device_outline(ctx))
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) {
        let stroke = if ctx.selected {
            self.style.selected_stroke
        } else {
            self.style.stroke
        };
        match &self.geometry {
            ShapeGeometry::Point(p) => {
                if let Ok(center) = ctx.to_device(*p) {
                    layer.markers.push(MarkerPrimitive {
                        center,
                        shape: self.style.marker,
                        size_px: self.style.handle_size_px * 1.5,
                        fill: None,
                        stroke: Some(stroke),
                    });
                }
            }
            ShapeGeometry::XRange { .. } => {
                if let Some(rect) = self.geometry.x_range_rect(ctx) {
                    layer.rects.push(RectPrimitive::new(rect, self.style.fill, None));
                    let top = DevicePoint::new(rect.x, rect.y);
                    let bottom = DevicePoint::new(rect.x, rect.bottom());
                    let right_top = DevicePoint::new(rect.right(), rect.y);
                    let right_bottom = DevicePoint::new(rect.right(), rect.bottom());
                    layer.paths.push(PathPrimitive::polyline(vec![top, bottom], stroke));
                    layer.paths.push(PathPrimitive::polyline(vec![right_top, right_bottom], stroke));
                }
            }
            geometry => {
                let outline = geometry.device_outline(ctx);
                if outline.len() >= 2 {
                    let path = if geometry.is_closed() {
                        PathPrimitive::polygon(outline, Some(stroke), self.style.fill)
                    } else {
                        PathPrimitive::polyline(outline, stroke)
                    };
                    layer.paths.push(path);
                }
            }
        }
        if ctx.selected {
            let half = self.style.handle_size_px * 0.5;
            for handle in self.geometry.device_handles(ctx).into_iter().flatten() {
                layer.rects.push(RectPrimitive::new(
                    DeviceRect::new(handle.x - half, handle.y - half, half * 2.0, half * 2.0),
                    Some(self.style.handle_color),
                    None,
                ));
            }
        }
    }
}
