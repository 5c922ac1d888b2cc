mod frame;
mod null_renderer;
mod pipeline;
mod primitives;
mod raster;
mod resample;

#[cfg(feature = "parallel-resample")]
mod background;

pub use frame::{ItemLayer, RenderFrame};
pub use null_renderer::NullRenderer;
pub use pipeline::{render_item_layer, CacheKey, RenderPipeline, RenderStats};
pub use primitives::{
    Color, ImageTile, LineDash, LinePrimitive, MarkerPrimitive, MarkerShape, PathPrimitive,
    RectPrimitive, StrokeStyle, TextHAlign, TextPrimitive, TextVAlign,
};
pub use raster::{RasterRenderer, RgbaImage};
pub use resample::{
    axes_are_linear, resample, resample_cancellable, DeviceMapping, DeviceTilePlan,
    Interpolation, PixelSource, ResamplePlan, SourceTilePlan,
};

#[cfg(feature = "parallel-resample")]
pub use background::{BackgroundResampler, ResampleJob, ResampleResult};

use crate::error::PlotResult;

/// Contract implemented by any rendering backend.
///
/// Backends receive a fully materialized `RenderFrame`: item layers in
/// z-order, each carrying device-space primitives only. Drawing code never
/// sees items, axes or data buffers.
pub trait Renderer {
    fn render(&mut self, frame: &RenderFrame) -> PlotResult<()>;
}

#[cfg(feature = "cairo-backend")]
mod cairo_backend;
#[cfg(feature = "cairo-backend")]
pub use cairo_backend::{CairoContextRenderer, CairoRenderStats, CairoRenderer};
