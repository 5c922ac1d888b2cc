use tracing::trace;

use crate::error::PlotResult;
use crate::extensions::PlotEvent;
use crate::interaction::{InputEvent, Tool, ToolKind};
use crate::render::Renderer;

use super::PlotEngine;

impl<R: Renderer> PlotEngine<R> {
    /// Routes one input event to navigation or the active tool, then hands the
    /// resulting events to observers.
    ///
    /// On error the gesture state is kept, so a later cancel still restores
    /// what the gesture changed.
    pub fn handle_input(&mut self, event: InputEvent) -> PlotResult<Vec<PlotEvent>> {
        trace!(?event, "input");
        let events = self.controller.handle(event, &mut self.scene, &mut self.coords)?;
        self.emit_all(events.clone());
        Ok(events)
    }

    /// Activates `tool`; refused with `ToolBusy` while a gesture is in progress.
    pub fn set_tool(&mut self, tool: impl Into<Tool>) -> PlotResult<()> {
        self.controller.set_tool(tool)?;
        let kind = self.controller.tool_kind();
        self.emit(PlotEvent::ToolChanged(kind));
        Ok(())
    }

    /// Aborts the gesture in progress without committing it.
    pub fn cancel_gesture(&mut self) -> PlotResult<Vec<PlotEvent>> {
        let mut events = Vec::new();
        self.controller.cancel(&mut self.scene, &mut self.coords, &mut events)?;
        self.emit_all(events.clone());
        Ok(events)
    }

    #[must_use]
    pub fn tool(&self) -> &Tool {
        self.controller.tool()
    }

    #[must_use]
    pub fn tool_kind(&self) -> ToolKind {
        self.controller.tool_kind()
    }

    #[must_use]
    pub fn is_gesture_active(&self) -> bool {
        self.controller.is_busy()
    }

    pub fn set_hit_tolerance_px(&mut self, tolerance: f64) {
        self.controller.set_hit_tolerance_px(tolerance);
        self.config.hit_tolerance_px = self.controller.hit_tolerance_px();
    }
}
