use tracing::trace;

use crate::core::{CoordinateSystem, Viewport};
use crate::error::PlotResult;
use crate::extensions::{PlotEvent, PlotObserver};
use crate::interaction::InteractionController;
use crate::render::{RasterRenderer, RenderFrame, RenderPipeline, RenderStats, Renderer, RgbaImage};
use crate::scene::Scene;

use super::{DataKeys, PlotEngineConfig};

#[cfg(feature = "cairo-backend")]
use crate::render::CairoContextRenderer;

/// Main orchestration facade consumed by host applications.
///
/// `PlotEngine` owns the scene, the coordinate system, the active tool and the
/// render cache, and forwards finished frames to the renderer.
pub struct PlotEngine<R: Renderer> {
    pub(super) renderer: R,
    pub(super) config: PlotEngineConfig,
    pub(super) scene: Scene,
    pub(super) coords: CoordinateSystem,
    pub(super) pipeline: RenderPipeline,
    pub(super) controller: InteractionController,
    pub(super) observers: Vec<Box<dyn PlotObserver>>,
    pub(super) data_keys: DataKeys,
}

impl<R: Renderer> PlotEngine<R> {
    /// Builds the frame for the current state and hands it to the renderer.
    pub fn render(&mut self) -> PlotResult<()> {
        let frame = self.build_frame();
        self.renderer.render(&frame)?;
        self.finish_render();
        Ok(())
    }

    /// Renders the frame into an external cairo context.
    ///
    /// This path is used by toolkit draw callbacks while keeping the renderer
    /// implementation decoupled from toolkit-specific APIs.
    #[cfg(feature = "cairo-backend")]
    pub fn render_on_cairo_context(&mut self, context: &cairo::Context) -> PlotResult<()>
    where
        R: CairoContextRenderer,
    {
        let frame = self.build_frame();
        self.renderer.render_on_cairo_context(context, &frame)?;
        self.finish_render();
        Ok(())
    }

    /// Renders the current scene at `width` x `height` into an RGBA raster.
    ///
    /// The visible data ranges are kept; the engine's own viewport and render
    /// cache are not touched.
    pub fn export_rgba(&self, width: u32, height: u32) -> PlotResult<RgbaImage> {
        let viewport = Viewport::new(width, height).validate()?;
        let mut coords = self.coords.clone();
        coords.set_viewport(viewport)?;
        let mut pipeline = RenderPipeline::new(0.0);
        let frame = pipeline.build_frame(&self.scene, &coords, self.config.background, None);
        let mut raster = RasterRenderer::new(width, height)?;
        raster.render(&frame)?;
        trace!(width, height, layers = frame.layers.len(), "exported raster snapshot");
        Ok(raster.into_image())
    }

    /// Counters of the last rendered frame.
    #[must_use]
    pub fn render_stats(&self) -> RenderStats {
        self.pipeline.stats()
    }

    /// Publishes finished background tiles. Returns whether a redraw is due.
    #[cfg(feature = "parallel-resample")]
    pub fn poll_background(&mut self) -> bool {
        !self.pipeline.poll_background().is_empty()
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    #[must_use]
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    fn build_frame(&mut self) -> RenderFrame {
        #[cfg(feature = "parallel-resample")]
        self.pipeline.poll_background();
        let overlay = self.controller.overlay(&self.coords, &self.scene);
        self.pipeline
            .build_frame(&self.scene, &self.coords, self.config.background, overlay)
    }

    fn finish_render(&mut self) {
        let stats = self.pipeline.stats();
        self.emit(PlotEvent::Rendered {
            items_drawn: stats.items_drawn,
            cache_hits: stats.cache_hits,
            items_skipped: stats.items_skipped,
        });
    }
}
