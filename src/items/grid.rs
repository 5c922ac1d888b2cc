use serde::{Deserialize, Serialize};

use crate::core::{Color, DataPoint, DevicePoint};
use crate::items::ItemRenderContext;
use crate::render::{ItemLayer, LineDash, LinePrimitive, StrokeStyle};

fn default_spacing_px() -> f64 {
    80.0
}

fn default_true() -> bool {
    true
}

/// Major and minor grid lines at the tick values of the item's axes.
///
/// Lines are derived from the visible ranges on every render, so the grid
/// lives in the background band and follows zoom and pan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridItem {
    pub major: StrokeStyle,
    /// Minor lines are skipped when unset.
    #[serde(default)]
    pub minor: Option<StrokeStyle>,
    #[serde(default = "default_true")]
    pub vertical: bool,
    #[serde(default = "default_true")]
    pub horizontal: bool,
    /// Pixel distance the major lines aim for.
    #[serde(default = "default_spacing_px")]
    pub spacing_px: f64,
}

impl Default for GridItem {
    fn default() -> Self {
        Self {
            major: StrokeStyle::solid(Color::rgba(0.5, 0.5, 0.5, 0.6), 1.0),
            minor: Some(StrokeStyle::solid(Color::rgba(0.5, 0.5, 0.5, 0.3), 1.0).with_dash(LineDash::Dotted)),
            vertical: true,
            horizontal: true,
            spacing_px: default_spacing_px(),
        }
    }
}

impl GridItem {
    #[must_use]
    pub fn without_minor(mut self) -> Self {
        self.minor = None;
        self
    }

    fn target(&self, length_px: f64) -> usize {
        let spacing = if self.spacing_px.is_finite() && self.spacing_px > 0.0 {
            self.spacing_px
        } else {
            default_spacing_px()
        };
        (length_px / spacing).floor().max(1.0) as usize
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) {
        let viewport = ctx.coords.viewport();
        let (width, height) = (viewport.width_px(), viewport.height_px());
        let (x_ref, _) = ctx.coords.axis_range(ctx.axes.x);
        let (y_ref, _) = ctx.coords.axis_range(ctx.axes.y);
        let x_ticks = ctx.coords.axis(ctx.axes.x).ticks(self.target(width));
        let y_ticks = ctx.coords.axis(ctx.axes.y).ticks(self.target(height));

        // Minor lines first so the majors paint over them.
        let passes = [
            (self.minor, &x_ticks.minor, &y_ticks.minor),
            (Some(self.major), &x_ticks.major, &y_ticks.major),
        ];
        for (stroke, xs, ys) in passes {
            let Some(stroke) = stroke else {
                continue;
            };
            if self.vertical {
                for x in xs.iter().filter_map(|v| ctx.to_device(DataPoint::new(*v, y_ref)).ok()) {
                    layer.lines.push(LinePrimitive::new(
                        DevicePoint::new(x.x, 0.0),
                        DevicePoint::new(x.x, height),
                        stroke,
                    ));
                }
            }
            if self.horizontal {
                for y in ys.iter().filter_map(|v| ctx.to_device(DataPoint::new(x_ref, *v)).ok()) {
                    layer.lines.push(LinePrimitive::new(
                        DevicePoint::new(0.0, y.y),
                        DevicePoint::new(width, y.y),
                        stroke,
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GridItem;
    use crate::core::{AxisId, AxisPair, CoordinateSystem, Viewport};
    use crate::items::{ItemRenderContext, NoItems};
    use crate::render::ItemLayer;

    #[test]
    fn lines_follow_the_visible_ticks() {
        let mut coords = CoordinateSystem::new(Viewport::new(100, 100)).expect("coords");
        coords.set_axis_range(AxisId::XBottom, 0.0, 10.0).expect("x range");
        coords.set_axis_range(AxisId::YLeft, 0.0, 10.0).expect("y range");
        let ctx = ItemRenderContext::new(&coords, AxisPair::default(), &NoItems);
        let grid = GridItem {
            spacing_px: 50.0,
            horizontal: false,
            ..GridItem::default()
        };
        let mut layer = ItemLayer::new(None);
        grid.render(&ctx, &mut layer);
        // 8 minor and 3 major vertical lines.
        assert_eq!(layer.lines.len(), 11);
        let majors: Vec<f64> = layer.lines[8..].iter().map(|line| line.from.x).collect();
        assert_eq!(majors, vec![0.0, 50.0, 100.0]);
        assert!(layer.lines.iter().all(|line| line.to.y == 100.0));
    }
}
