use crate::error::PlotResult;
use crate::render::{RenderFrame, Renderer};

/// No-op renderer used by tests and headless engine usage.
///
/// It still validates frame content so tests can catch invalid geometry before
/// a real backend is involved.
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub frames_rendered: usize,
    pub last_layer_count: usize,
    pub last_path_count: usize,
    pub last_text_count: usize,
    pub last_image_count: usize,
    pub last_frame: Option<RenderFrame>,
}

impl Renderer for NullRenderer {
    fn render(&mut self, frame: &RenderFrame) -> PlotResult<()> {
        frame.validate()?;
        self.frames_rendered += 1;
        self.last_layer_count = frame.layers.len();
        self.last_path_count = frame.path_count();
        self.last_text_count = frame.text_count();
        self.last_image_count = frame.image_count();
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}
