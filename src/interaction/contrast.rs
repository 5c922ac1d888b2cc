use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::{AxisPair, CoordinateSystem, DataPoint, DevicePoint};
use crate::error::PlotResult;
use crate::extensions::PlotEvent;
use crate::interaction::{GestureTool, Modifiers, ToolContext};
use crate::items::{ItemId, ItemKind};
use crate::render::{Color, ItemLayer, LinePrimitive, StrokeStyle};
use crate::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContrastEdge {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, Default)]
enum ContrastState {
    #[default]
    Idle,
    Dragging {
        image: ItemId,
        edge: ContrastEdge,
        original: (f64, f64),
    },
}

/// Drags the `lo` / `hi` edges of an image LUT along the x axis of `axes`,
/// which holds data values (typically under a histogram of the image).
#[derive(Debug, Clone, Default)]
pub struct ContrastTool {
    image: Option<ItemId>,
    axes: AxisPair,
    state: ContrastState,
}

impl ContrastTool {
    #[must_use]
    pub fn new(axes: AxisPair) -> Self {
        Self {
            image: None,
            axes,
            state: ContrastState::Idle,
        }
    }

    /// Adjusts `image` instead of the active or last selected image.
    #[must_use]
    pub fn for_image(mut self, image: ItemId) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn axes(&self) -> AxisPair {
        self.axes
    }

    pub fn target(&self, scene: &Scene) -> Option<ItemId> {
        let is_image = |id: &ItemId| scene.get(*id).is_some_and(|item| item.kind() == ItemKind::Image);
        self.image
            .filter(is_image)
            .or_else(|| scene.active().filter(is_image))
            .or_else(|| scene.last_selected(ItemKind::Image))
    }

    fn edge_x(&self, coords: &CoordinateSystem, value: f64) -> Option<f64> {
        let y = coords.axis_range(self.axes.y).0;
        coords.data_to_device(self.axes, DataPoint::new(value, y)).ok().map(|p| p.x)
    }

    fn set_range(ctx: &mut ToolContext<'_>, image: ItemId, lo: f64, hi: f64) -> PlotResult<()> {
        if let Some(image_item) = ctx.scene.item_mut(image)?.as_image_mut() {
            image_item.lut_mut().set_range(lo, hi)?;
            ctx.events.push(PlotEvent::LutChanged { item: image, lo, hi });
        }
        Ok(())
    }
}

impl GestureTool for ContrastTool {
    fn is_busy(&self) -> bool {
        matches!(self.state, ContrastState::Dragging { .. })
    }

    fn pointer_down(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint, _modifiers: Modifiers) -> PlotResult<()> {
        let Some(image) = self.target(ctx.scene) else {
            return Ok(());
        };
        let Some(lut) = ctx.scene.item(image)?.as_image().map(|image| image.lut()) else {
            return Ok(());
        };
        let (lo, hi) = lut.range();
        let (Some(lo_x), Some(hi_x)) = (self.edge_x(ctx.coords, lo), self.edge_x(ctx.coords, hi)) else {
            return Ok(());
        };
        let (d_lo, d_hi) = ((position.x - lo_x).abs(), (position.x - hi_x).abs());
        let edge = if d_lo.min(d_hi) > ctx.tolerance {
            return Ok(());
        } else if d_lo < d_hi || (d_lo == d_hi && position.x < lo_x) {
            ContrastEdge::Low
        } else {
            ContrastEdge::High
        };
        trace!(%image, ?edge, "contrast edge grabbed");
        self.state = ContrastState::Dragging {
            image,
            edge,
            original: (lo, hi),
        };
        Ok(())
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        let ContrastState::Dragging { image, edge, .. } = self.state else {
            return Ok(());
        };
        let Ok(point) = ctx.coords.device_to_data(self.axes, position) else {
            return Ok(());
        };
        let Some((lo, hi)) = ctx.scene.item(image)?.as_image().map(|image| image.lut().range()) else {
            return Ok(());
        };
        // Positions past the opposite edge would invert the window; the
        // range keeps its last valid value until the pointer comes back.
        let (lo, hi) = match edge {
            ContrastEdge::Low if point.x > hi => return Ok(()),
            ContrastEdge::High if point.x < lo => return Ok(()),
            ContrastEdge::Low => (point.x, hi),
            ContrastEdge::High => (lo, point.x),
        };
        Self::set_range(ctx, image, lo, hi)
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        self.pointer_move(ctx, position)?;
        if let ContrastState::Dragging { image, original, .. } = std::mem::take(&mut self.state) {
            let changed = ctx
                .scene
                .get(image)
                .and_then(|item| item.as_image())
                .is_some_and(|image| image.lut().range() != original);
            if changed {
                ctx.events.push(PlotEvent::ItemCommitted(image));
            }
        }
        Ok(())
    }

    fn cancel(&mut self, ctx: &mut ToolContext<'_>) -> PlotResult<()> {
        if let ContrastState::Dragging { image, original, .. } = std::mem::take(&mut self.state) {
            if ctx.scene.contains(image) {
                Self::set_range(ctx, image, original.0, original.1)?;
            }
        }
        Ok(())
    }

    fn overlay(&self, coords: &CoordinateSystem, scene: &Scene) -> Option<ItemLayer> {
        let image = self.target(scene)?;
        let (lo, hi) = scene.get(image)?.as_image()?.lut().range();
        let height = coords.viewport().height_px();
        let mut layer = ItemLayer::new(None);
        for value in [lo, hi] {
            let x = self.edge_x(coords, value)?;
            layer.lines.push(LinePrimitive::new(
                DevicePoint::new(x, 0.0),
                DevicePoint::new(x, height),
                StrokeStyle::solid(Color::rgb(1.0, 0.5, 0.0), 1.5),
            ));
        }
        Some(layer)
    }
}
