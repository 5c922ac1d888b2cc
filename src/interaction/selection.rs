use tracing::trace;

use crate::core::DevicePoint;
use crate::error::PlotResult;
use crate::extensions::PlotEvent;
use crate::interaction::{push_selection_events, GestureTool, Modifiers, ToolContext};
use crate::items::{ItemId, MoveDelta, PlotItem};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Grab {
    /// Body drag: every selected movable item follows.
    Body,
    Handle { item: ItemId, handle: usize },
}

#[derive(Debug, Clone, Default)]
enum SelectionState {
    #[default]
    Idle,
    Dragging {
        last: DevicePoint,
        grab: Grab,
        snapshots: Vec<(ItemId, PlotItem)>,
        moved: bool,
    },
}

/// Click to select, modifier-click to toggle, drag to move or resize.
#[derive(Debug, Clone, Default)]
pub struct SelectionTool {
    state: SelectionState,
}

impl SelectionTool {
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SelectionState::Dragging { .. })
    }

    fn step(ctx: &mut ToolContext<'_>, grab: Grab, ids: &[ItemId], from: DevicePoint, to: DevicePoint) {
        match grab {
            Grab::Body => {
                for id in ids {
                    let Some(item) = ctx.scene.get_mut(*id) else {
                        continue;
                    };
                    let axes = item.axes();
                    let (Ok(a), Ok(b)) = (
                        ctx.coords.device_to_data(axes, from),
                        ctx.coords.device_to_data(axes, to),
                    ) else {
                        continue;
                    };
                    let delta = MoveDelta {
                        data: (b.x - a.x, b.y - a.y),
                        device: (to.x - from.x, to.y - from.y),
                    };
                    if item.move_by(delta) {
                        ctx.events.push(PlotEvent::ItemMoved(*id));
                    }
                }
            }
            Grab::Handle { item: id, handle } => {
                let Some(item) = ctx.scene.get_mut(id) else {
                    return;
                };
                let Ok(target) = ctx.coords.device_to_data(item.axes(), to) else {
                    return;
                };
                match item.move_handle(handle, target) {
                    Ok(()) => ctx.events.push(PlotEvent::ItemMoved(id)),
                    Err(err) => trace!(%id, handle, error = %err, "handle move ignored"),
                }
            }
        }
    }
}

impl GestureTool for SelectionTool {
    fn is_busy(&self) -> bool {
        self.is_dragging()
    }

    fn pointer_down(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint, modifiers: Modifiers) -> PlotResult<()> {
        let before_active = ctx.scene.active();
        let Some(hit) = ctx.scene.hit_test(ctx.coords, position, ctx.tolerance) else {
            if !modifiers.additive() && ctx.scene.unselect_all() {
                push_selection_events(ctx.scene, before_active, ctx.events);
            }
            return Ok(());
        };

        let id = hit.id;
        let changed = if modifiers.additive() {
            ctx.scene.toggle(id)?
        } else if ctx.scene.is_selected(id) {
            ctx.scene.set_active(id)?
        } else {
            ctx.scene.select(id, false)?
        };
        if changed {
            push_selection_events(ctx.scene, before_active, ctx.events);
        }
        if !ctx.scene.is_selected(id) {
            return Ok(());
        }

        let item = ctx.scene.item(id)?;
        let grab = match hit.hit.handle {
            Some(handle) if !item.is_readonly() && item.data().geometry().is_some() => Grab::Handle { item: id, handle },
            _ => Grab::Body,
        };
        let targets: Vec<ItemId> = match grab {
            Grab::Handle { item, .. } => vec![item],
            Grab::Body => ctx
                .scene
                .selected_ids()
                .into_iter()
                .filter(|sid| ctx.scene.get(*sid).is_some_and(PlotItem::is_movable))
                .collect(),
        };
        if targets.is_empty() {
            return Ok(());
        }
        let snapshots = targets
            .into_iter()
            .filter_map(|tid| ctx.scene.get(tid).map(|item| (tid, item.clone())))
            .collect();
        self.state = SelectionState::Dragging {
            last: position,
            grab,
            snapshots,
            moved: false,
        };
        Ok(())
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        let SelectionState::Dragging {
            last,
            grab,
            snapshots,
            moved,
        } = &mut self.state
        else {
            return Ok(());
        };
        if *last == position {
            return Ok(());
        }
        let ids: Vec<ItemId> = snapshots.iter().map(|(id, _)| *id).collect();
        Self::step(ctx, *grab, &ids, *last, position);
        *last = position;
        *moved = true;
        Ok(())
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        self.pointer_move(ctx, position)?;
        if let SelectionState::Dragging { snapshots, moved: true, .. } = std::mem::take(&mut self.state) {
            for (id, _) in snapshots {
                if ctx.scene.contains(id) {
                    ctx.events.push(PlotEvent::ItemCommitted(id));
                }
            }
        }
        Ok(())
    }

    fn cancel(&mut self, ctx: &mut ToolContext<'_>) -> PlotResult<()> {
        if let SelectionState::Dragging { snapshots, moved, .. } = std::mem::take(&mut self.state) {
            if !moved {
                return Ok(());
            }
            for (id, snapshot) in snapshots {
                if let Some(item) = ctx.scene.get_mut(id) {
                    item.restore_from(snapshot);
                    ctx.events.push(PlotEvent::ItemMoved(id));
                }
            }
        }
        Ok(())
    }
}
