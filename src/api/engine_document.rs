use crate::error::PlotResult;
use crate::extensions::PlotEvent;
use crate::items::ItemId;
use crate::render::Renderer;

use super::{DataResolver, PlotDocument, PlotEngine, SaveScope};

impl<R: Renderer> PlotEngine<R> {
    /// Describes all or only the selected items, plus the coordinate state.
    pub fn save_document(&self, scope: SaveScope) -> PlotResult<PlotDocument> {
        PlotDocument::capture(&self.scene, Some(&self.coords), scope, &self.data_keys)
    }

    /// Adds the document's items to the scene, resolving data keys through
    /// `resolver`. Saved coordinates replace the current ones when
    /// `restore_view` is set. Returns the new item ids.
    pub fn restore_document(
        &mut self,
        document: &PlotDocument,
        resolver: &dyn DataResolver,
        restore_view: bool,
    ) -> PlotResult<Vec<ItemId>> {
        let ids = document.restore(&mut self.scene, resolver, &mut self.data_keys)?;
        if !ids.is_empty() {
            self.emit(PlotEvent::ItemsAdded(ids.clone()));
        }
        if restore_view {
            if let Some(saved) = &document.coordinates {
                let mut coords = saved.clone();
                coords.set_viewport(self.coords.viewport())?;
                self.coords = coords;
                self.emit_view_ranges(self.coords.active_axes());
            }
        }
        Ok(ids)
    }

    pub fn load_document_json(
        &mut self,
        input: &str,
        resolver: &dyn DataResolver,
        restore_view: bool,
    ) -> PlotResult<Vec<ItemId>> {
        let document = PlotDocument::from_json_compat_str(input)?;
        self.restore_document(&document, resolver, restore_view)
    }
}
