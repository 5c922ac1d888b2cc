use tracing::{debug, trace};

use crate::core::{Aggregate, DataPoint, DevicePoint, IntervalStats};
use crate::error::PlotResult;
use crate::extensions::PlotEvent;
use crate::interaction::{GestureTool, Modifiers, ToolContext};
use crate::items::{
    Computation, ItemData, ItemId, ItemKind, ItemLookup, LabelAnchor, LabelItem, PlotItem,
    RangeComputation, ShapeGeometry, ShapeItem,
};
use crate::scene::Scene;

#[derive(Debug, Clone, Default)]
enum IntervalState {
    #[default]
    Idle,
    Defining {
        range: ItemId,
        anchor: f64,
        /// Geometry before an edge drag; `None` for a freshly created range.
        previous: Option<ShapeGeometry>,
    },
    Active {
        range: ItemId,
    },
}

/// Drags an x-range over a curve; a child label shows mean, min, max and
/// integral of the curve inside the range.
#[derive(Debug, Clone, Default)]
pub struct IntervalTool {
    curve: Option<ItemId>,
    state: IntervalState,
}

impl IntervalTool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Measures `curve` instead of the active or last selected one.
    #[must_use]
    pub fn for_curve(curve: ItemId) -> Self {
        Self {
            curve: Some(curve),
            state: IntervalState::Idle,
        }
    }

    /// Range shape of the current interval.
    #[must_use]
    pub fn range(&self) -> Option<ItemId> {
        match self.state {
            IntervalState::Defining { range, .. } | IntervalState::Active { range } => Some(range),
            IntervalState::Idle => None,
        }
    }

    #[must_use]
    pub fn interval(&self, scene: &Scene) -> Option<(f64, f64)> {
        scene.get(self.range()?)?.x_interval()
    }

    /// Statistics of the target curve over the current interval.
    pub fn stats(&self, scene: &Scene) -> PlotResult<Option<IntervalStats>> {
        let (Some(curve), Some((x0, x1))) = (self.target_curve(scene), self.interval(scene)) else {
            return Ok(None);
        };
        match scene.get(curve).map(PlotItem::data) {
            Some(ItemData::Curve(curve)) => curve.interval_stats(x0, x1),
            _ => Ok(None),
        }
    }

    fn target_curve(&self, scene: &Scene) -> Option<ItemId> {
        let is_curve = |id: &ItemId| scene.get(*id).is_some_and(|item| item.kind() == ItemKind::Curve);
        self.curve
            .filter(is_curve)
            .or_else(|| scene.active().filter(is_curve))
            .or_else(|| scene.last_selected(ItemKind::Curve))
            .or_else(|| scene.curve_ids().first().copied())
    }

    fn create(&self, ctx: &mut ToolContext<'_>, curve: ItemId, x: f64) -> PlotResult<ItemId> {
        let axes = ctx.scene.item(curve)?.axes();
        let shape = ShapeItem::new(ShapeGeometry::XRange { x0: x, x1: x })?;
        let range = ctx.scene.add(PlotItem::new(shape).with_axes(axes).with_title("interval"));
        let computations = [
            (Aggregate::Mean, "mean = {}"),
            (Aggregate::Min, "min = {}"),
            (Aggregate::Max, "max = {}"),
            (Aggregate::Integral, "integral = {}"),
        ]
        .into_iter()
        .map(|(aggregate, template)| {
            Computation::Range(RangeComputation {
                curve,
                range,
                aggregate,
                template: template.to_owned(),
            })
        })
        .collect();
        let label = LabelItem::computations(computations, LabelAnchor::default());
        let label = ctx.scene.add(
            PlotItem::new(label)
                .with_axes(axes)
                .with_parent(range)
                .with_selectable(false)
                .with_title("interval statistics"),
        );
        ctx.events.push(PlotEvent::ItemsAdded(vec![range, label]));
        debug!(%range, %curve, "interval created");
        Ok(range)
    }

    fn remove(ctx: &mut ToolContext<'_>, range: ItemId) {
        match ctx.scene.remove(range) {
            Ok(removed) => ctx.events.push(PlotEvent::ItemsRemoved(removed)),
            Err(err) => trace!(%range, error = %err, "interval removal skipped"),
        }
    }

    fn set_geometry(ctx: &mut ToolContext<'_>, range: ItemId, geometry: ShapeGeometry) -> PlotResult<()> {
        if let Some(target) = ctx.scene.item_mut(range)?.data_mut().geometry_mut() {
            *target = geometry;
        }
        Ok(())
    }

    fn edge_under(ctx: &ToolContext<'_>, range: ItemId, position: DevicePoint) -> Option<f64> {
        let item = ctx.scene.get(range)?;
        let (x0, x1) = item.x_interval()?;
        let device_x = |x: f64| {
            ctx.coords
                .data_to_device(item.axes(), DataPoint::new(x, ctx.coords.axis_range(item.axes().y).0))
                .ok()
                .map(|p| (p.x - position.x).abs())
        };
        let (d0, d1) = (device_x(x0)?, device_x(x1)?);
        // The returned anchor is the edge that stays put.
        if d0 <= ctx.tolerance && d0 <= d1 {
            Some(x1)
        } else if d1 <= ctx.tolerance {
            Some(x0)
        } else {
            None
        }
    }
}

impl GestureTool for IntervalTool {
    fn is_busy(&self) -> bool {
        matches!(self.state, IntervalState::Defining { .. })
    }

    fn pointer_down(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint, _modifiers: Modifiers) -> PlotResult<()> {
        if let IntervalState::Active { range } = self.state {
            if !ctx.scene.contains(range) {
                self.state = IntervalState::Idle;
            } else if let Some(anchor) = Self::edge_under(ctx, range, position) {
                let previous = ctx.scene.item(range)?.data().geometry().cloned();
                self.state = IntervalState::Defining { range, anchor, previous };
                return Ok(());
            }
        }

        let Some(curve) = self.target_curve(ctx.scene) else {
            trace!("interval ignored: no curve");
            return Ok(());
        };
        let axes = ctx.scene.item(curve)?.axes();
        let Ok(point) = ctx.coords.device_to_data(axes, position) else {
            return Ok(());
        };
        if let IntervalState::Active { range } = self.state {
            Self::remove(ctx, range);
        }
        let range = self.create(ctx, curve, point.x)?;
        self.state = IntervalState::Defining {
            range,
            anchor: point.x,
            previous: None,
        };
        Ok(())
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        let IntervalState::Defining { range, anchor, .. } = self.state else {
            return Ok(());
        };
        let axes = ctx.scene.item(range)?.axes();
        let Ok(point) = ctx.coords.device_to_data(axes, position) else {
            return Ok(());
        };
        Self::set_geometry(ctx, range, ShapeGeometry::XRange { x0: anchor, x1: point.x })?;
        let stats = self.stats(ctx.scene)?;
        ctx.events.push(PlotEvent::IntervalChanged {
            range,
            x0: anchor.min(point.x),
            x1: anchor.max(point.x),
            stats,
        });
        Ok(())
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        self.pointer_move(ctx, position)?;
        let IntervalState::Defining { range, previous, .. } = std::mem::take(&mut self.state) else {
            return Ok(());
        };
        let item = ctx.scene.item(range)?;
        let width_px = item.x_interval().and_then(|(x0, x1)| {
            let y = ctx.coords.axis_range(item.axes().y).0;
            let a = ctx.coords.data_to_device(item.axes(), DataPoint::new(x0, y)).ok()?;
            let b = ctx.coords.data_to_device(item.axes(), DataPoint::new(x1, y)).ok()?;
            Some((b.x - a.x).abs())
        });
        if width_px.is_some_and(|w| w >= 1.0) {
            ctx.events.push(PlotEvent::ItemCommitted(range));
            self.state = IntervalState::Active { range };
            return Ok(());
        }
        // Zero-width drags leave nothing behind.
        match previous {
            None => Self::remove(ctx, range),
            Some(geometry) => {
                Self::set_geometry(ctx, range, geometry)?;
                self.state = IntervalState::Active { range };
            }
        }
        Ok(())
    }

    fn cancel(&mut self, ctx: &mut ToolContext<'_>) -> PlotResult<()> {
        let IntervalState::Defining { range, previous, .. } = std::mem::take(&mut self.state) else {
            return Ok(());
        };
        match previous {
            None => Self::remove(ctx, range),
            Some(geometry) => {
                Self::set_geometry(ctx, range, geometry)?;
                ctx.events.push(PlotEvent::ItemMoved(range));
                self.state = IntervalState::Active { range };
            }
        }
        Ok(())
    }
}
