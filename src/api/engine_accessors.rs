use crate::core::{CoordinateSystem, Viewport};
use crate::error::PlotResult;
use crate::items::ItemId;
use crate::render::Renderer;
use crate::scene::Scene;

use super::{DataKeys, DataSlot, PlotEngine, PlotEngineConfig};

impl<R: Renderer> PlotEngine<R> {
    #[must_use]
    pub fn config(&self) -> &PlotEngineConfig {
        &self.config
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub fn coordinates(&self) -> &CoordinateSystem {
        &self.coords
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.coords.viewport()
    }

    /// Updates viewport dimensions used by the mapping and render layout.
    ///
    /// Aspect-locked axes are re-derived; the cache revalidates each layer
    /// against the new viewport on the next frame.
    pub fn set_viewport(&mut self, viewport: Viewport) -> PlotResult<()> {
        self.coords.set_viewport(viewport.validate()?)?;
        self.config.viewport = viewport;
        self.emit_view_ranges(self.coords.active_axes());
        Ok(())
    }

    #[must_use]
    pub fn data_keys(&self) -> &DataKeys {
        &self.data_keys
    }

    /// Names the adapter `item` holds in `slot` for document export.
    pub fn set_data_key(&mut self, item: ItemId, slot: DataSlot, key: impl Into<String>) -> PlotResult<()> {
        self.scene.item(item)?;
        self.data_keys.set(item, slot, key);
        Ok(())
    }
}
