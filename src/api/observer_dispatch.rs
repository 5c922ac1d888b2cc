use crate::extensions::{ObserverContext, PlotEvent};
use crate::render::Renderer;

use super::PlotEngine;

impl<R: Renderer> PlotEngine<R> {
    pub(super) fn observer_context(&self) -> ObserverContext {
        ObserverContext {
            viewport: self.coords.viewport(),
            item_count: self.scene.len(),
            selected_count: self.scene.selection().len(),
            active_item: self.scene.active(),
            tool: self.controller.tool_kind(),
        }
    }

    pub(super) fn emit(&mut self, event: PlotEvent) {
        if self.observers.is_empty() {
            return;
        }
        let context = self.observer_context();
        for observer in &mut self.observers {
            observer.on_event(&event, &context);
        }
    }

    /// Forwards engine-side consequences of `events` and dispatches them.
    pub(super) fn emit_all(&mut self, events: Vec<PlotEvent>) {
        for event in events {
            if let PlotEvent::ItemsRemoved(ids) = &event {
                for id in ids {
                    self.data_keys.forget(*id);
                    self.pipeline.invalidate(*id);
                }
            }
            self.emit(event);
        }
    }
}
