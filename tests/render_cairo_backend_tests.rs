#![cfg(feature = "cairo-backend")]

use cairo::{Context, Format, ImageSurface};
use sciplot_rs::PlotError;
use sciplot_rs::core::{DataRect, SharedArray, Viewport};
use sciplot_rs::render::CairoRenderer;
use sciplot_rs::{PlotEngine, PlotEngineConfig};

fn populated(renderer: CairoRenderer, width: u32, height: u32) -> PlotEngine<CairoRenderer> {
    let config = PlotEngineConfig::new(Viewport::new(width, height), (0.0, 4.0), (0.0, 4.0));
    let mut engine = PlotEngine::new(renderer, config).expect("engine init");
    let pixels = SharedArray::from_vec_2d((0..16).map(f64::from).collect(), 4, 4).expect("pixels");
    let xs = SharedArray::from_vec(vec![0.0, 1.0, 2.0, 3.0]);
    let ys = SharedArray::from_vec(vec![0.5, 2.5, 1.0, 3.5]);
    engine
        .add_image("frame", pixels.adapter().expect("pixels"), DataRect::new(0.0, 4.0, 0.0, 4.0), "frame")
        .expect("image");
    engine
        .add_curve(("x", xs.adapter().expect("x")), ("y", ys.adapter().expect("y")), "signal")
        .expect("curve");
    engine
}

#[test]
fn cairo_renderer_rejects_invalid_surface_size() {
    let err = CairoRenderer::new(0, 480).expect_err("invalid width must fail");
    assert!(matches!(err, PlotError::InvalidViewport { .. }));
}

#[test]
fn cairo_renderer_draws_image_and_curve_layers() {
    let renderer = CairoRenderer::new(400, 300).expect("renderer");
    let mut engine = populated(renderer, 400, 300);

    engine.render().expect("render");
    let stats = engine.into_renderer().last_stats();
    assert_eq!(stats.layers_drawn, 2);
    assert_eq!(stats.images_drawn, 1);
    assert!(stats.paths_drawn >= 1);
}

#[test]
fn cairo_renderer_can_draw_on_external_context() {
    let renderer = CairoRenderer::new(320, 240).expect("renderer");
    let mut engine = populated(renderer, 320, 240);

    let surface = ImageSurface::create(Format::ARgb32, 320, 240).expect("surface");
    let context = Context::new(&surface).expect("context");
    engine.render_on_cairo_context(&context).expect("render on context");

    assert_eq!(engine.into_renderer().last_stats().images_drawn, 1);
}
