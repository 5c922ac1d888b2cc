use tracing::debug;

use crate::core::{AxisId, AxisPair, CoordinateSystem};
use crate::error::PlotResult;
use crate::interaction::InteractionController;
use crate::render::{RenderPipeline, Renderer};
use crate::scene::Scene;

use super::{DataKeys, PlotEngine, PlotEngineConfig};

impl<R: Renderer> PlotEngine<R> {
    /// Creates a fully initialized engine from a validated config.
    ///
    /// The config ranges and scales are applied to the default axis pair;
    /// the other two axes keep unit ranges until an item uses them.
    pub fn new(renderer: R, config: PlotEngineConfig) -> PlotResult<Self> {
        config.validate()?;

        let mut coords = CoordinateSystem::new(config.viewport)?;
        let pair = AxisPair::default();
        for axis in AxisId::ALL.into_iter().filter(|axis| !axis.is_horizontal()) {
            coords.set_axis_inverted(axis, config.y_inverted);
        }
        // Ranges first: log scales reject the unit default range.
        coords.set_axis_range(pair.x, config.x_range.0, config.x_range.1)?;
        coords.set_axis_range(pair.y, config.y_range.0, config.y_range.1)?;
        coords.set_axis_scale(pair.x, config.x_scale.clone())?;
        coords.set_axis_scale(pair.y, config.y_scale.clone())?;
        coords.set_aspect_lock(config.aspect_lock)?;

        let mut controller = InteractionController::new(config.hit_tolerance_px);
        controller.set_wheel_zoom_step(config.wheel_zoom_step)?;

        #[cfg_attr(not(feature = "parallel-resample"), allow(unused_mut))]
        let mut pipeline = RenderPipeline::new(config.pan_tolerance_px);
        if config.background_resampling {
            #[cfg(feature = "parallel-resample")]
            pipeline.set_background_resampling(true);
            #[cfg(not(feature = "parallel-resample"))]
            tracing::warn!("background resampling requested without the `parallel-resample` feature");
        }

        debug!(
            width = config.viewport.width,
            height = config.viewport.height,
            "plot engine initialized"
        );
        Ok(Self {
            renderer,
            config,
            scene: Scene::new(),
            coords,
            pipeline,
            controller,
            observers: Vec::new(),
            data_keys: DataKeys::default(),
        })
    }
}
