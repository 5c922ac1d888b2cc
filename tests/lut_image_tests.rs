use std::sync::Arc;

use proptest::prelude::*;
use sciplot_rs::core::{palette_preset, DataRect, LutState, SharedArray, Viewport};
use sciplot_rs::error::PlotError;
use sciplot_rs::render::NullRenderer;
use sciplot_rs::{PlotEngine, PlotEngineConfig};

fn gray_lut(lo: f64, hi: f64) -> LutState {
    LutState::new(palette_preset("gray").expect("gray"), lo, hi).expect("lut")
}

fn ramp_image() -> SharedArray<f64> {
    SharedArray::from_vec_2d((0..16).map(f64::from).collect(), 4, 4).expect("4x4 image")
}

fn image_engine(pixels: &SharedArray<f64>) -> (PlotEngine<NullRenderer>, sciplot_rs::items::ItemId) {
    let config = PlotEngineConfig::image_plot(Viewport::new(40, 40), (0.0, 4.0), (0.0, 4.0));
    let mut engine = PlotEngine::new(NullRenderer::default(), config).expect("engine init");
    let id = engine
        .add_image(
            "ramp",
            pixels.adapter().expect("adapter"),
            DataRect::new(0.0, 4.0, 0.0, 4.0),
            "ramp",
        )
        .expect("add image");
    (engine, id)
}

#[test]
fn contrast_window_maps_values_to_indices() {
    let lut = gray_lut(4.0, 11.0);
    assert_eq!(lut.index_of(3.0), Some(0));
    assert_eq!(lut.index_of(4.0), Some(0));
    assert_eq!(lut.index_of(7.5), Some(128));
    assert_eq!(lut.index_of(11.0), Some(255));
    assert_eq!(lut.index_of(40.0), Some(255));
    assert_eq!(lut.index_of(f64::NAN), None);
    assert_eq!(lut.color_of(f64::NAN), [0, 0, 0, 0]);
}

#[test]
fn degenerate_window_is_a_step() {
    let lut = gray_lut(5.0, 5.0);
    assert_eq!(lut.index_of(4.999), Some(0));
    assert_eq!(lut.index_of(5.0), Some(255));
    assert_eq!(lut.index_of(6.0), Some(255));
}

#[test]
fn engine_rejects_inverted_contrast_and_keeps_range() {
    let pixels = ramp_image();
    let (mut engine, id) = image_engine(&pixels);
    engine.set_contrast_range(id, 4.0, 11.0).expect("contrast");

    let err = engine.set_contrast_range(id, 9.0, 2.0).expect_err("lo > hi");
    assert!(matches!(err, PlotError::InvalidRange { .. }));
    let image = engine.scene().item(id).expect("item").as_image().expect("image");
    assert_eq!(image.lut().range(), (4.0, 11.0));

    engine.set_contrast_range(id, 6.0, 6.0).expect("lo == hi accepted");
    let image = engine.scene().item(id).expect("item").as_image().expect("image");
    assert_eq!(image.lut().range(), (6.0, 6.0));
}

#[test]
fn exported_image_follows_the_contrast_window() {
    let pixels = ramp_image();
    let (mut engine, id) = image_engine(&pixels);
    engine.set_contrast_range(id, 4.0, 11.0).expect("contrast");

    let raster = engine.export_rgba(40, 40).expect("export");
    // y grows downwards: source row r covers device rows 10r..10r+10.
    let center = |row: u32, col: u32| raster.pixel(col * 10 + 5, row * 10 + 5).expect("pixel");

    assert_eq!(center(0, 0), [0, 0, 0, 255]);
    assert_eq!(center(0, 3), [0, 0, 0, 255]);
    assert_eq!(center(3, 3), [255, 255, 255, 255]);
    assert_eq!(center(2, 3), [255, 255, 255, 255]);

    // value 7 sits at (7 - 4) / 7 of the gray ramp.
    let gray = center(1, 3);
    assert!((i32::from(gray[0]) - 109).abs() <= 1, "got {gray:?}");
    assert_eq!(gray[0], gray[1]);
    assert_eq!(gray[1], gray[2]);
}

#[test]
fn nan_pixels_show_the_background() {
    let mut values: Vec<f64> = (0..16).map(f64::from).collect();
    values[0] = f64::NAN;
    let pixels = SharedArray::from_vec_2d(values, 4, 4).expect("4x4 image");
    let (engine, _) = image_engine(&pixels);
    let raster = engine.export_rgba(40, 40).expect("export");
    assert_eq!(raster.pixel(5, 5), Some([255, 255, 255, 255]));
}

#[test]
fn outlier_elimination_narrows_the_window() {
    let mut values: Vec<f64> = (0..100).map(f64::from).collect();
    values[99] = 1.0e6;
    let pixels = SharedArray::from_vec_2d(values, 10, 10).expect("10x10 image");
    let config = PlotEngineConfig::image_plot(Viewport::new(50, 50), (0.0, 10.0), (0.0, 10.0))
        .with_outlier_percent(2.0);
    let mut engine = PlotEngine::new(NullRenderer::default(), config).expect("engine init");
    let id = engine
        .add_image(
            "spiky",
            pixels.adapter().expect("adapter"),
            DataRect::new(0.0, 10.0, 0.0, 10.0),
            "spiky",
        )
        .expect("add image");

    let (lo, hi) = engine.eliminate_outliers(id).expect("outliers");
    assert!(lo >= 0.0);
    assert!(hi < 1.0e6);
    assert!(lo < hi);
}

#[test]
fn unknown_palette_is_rejected() {
    let pixels = ramp_image();
    let (mut engine, id) = image_engine(&pixels);
    assert!(engine.set_image_palette(id, "no-such-palette").is_err());
    engine.set_image_palette(id, "viridis").expect("viridis");
    let image = engine.scene().item(id).expect("item").as_image().expect("image");
    assert_eq!(image.lut().palette().name(), "viridis");
}

proptest! {
    #[test]
    fn lookup_is_monotonic(
        lo in -1.0e3f64..1.0e3,
        span in 0.0f64..1.0e3,
        a in -3.0e3f64..3.0e3,
        b in -3.0e3f64..3.0e3,
    ) {
        let lut = gray_lut(lo, lo + span);
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        let i = lut.index_of(small).expect("finite");
        let j = lut.index_of(large).expect("finite");
        prop_assert!(i <= j);
        prop_assert!(j <= 255);
    }

    #[test]
    fn shared_palette_is_not_copied(levels in 2usize..1024) {
        let palette = Arc::new(palette_preset("hot").expect("hot").resampled(levels).expect("resampled"));
        let lut = LutState::new(Arc::clone(&palette), 0.0, 1.0).expect("lut");
        prop_assert!(Arc::ptr_eq(lut.palette(), &palette));
        prop_assert_eq!(lut.index_of(1.0), Some(levels - 1));
    }
}
