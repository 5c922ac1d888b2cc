use criterion::{Criterion, criterion_group, criterion_main};
use sciplot_rs::core::{
    AxisId, AxisPair, AxisScale, CoordinateSystem, DataPoint, DataRect, LutState, SharedArray,
    Viewport, palette_preset,
};
use sciplot_rs::render::{Interpolation, NullRenderer, ResamplePlan, SourceTilePlan, resample};
use sciplot_rs::{PlotEngine, PlotEngineConfig};
use std::hint::black_box;

fn bench_log_axis_round_trip(c: &mut Criterion) {
    let mut coords = CoordinateSystem::new(Viewport::new(1920, 1080)).expect("coords");
    coords
        .set_axis_range(AxisId::XBottom, 1.0e-3, 1.0e6)
        .expect("x range");
    coords
        .set_axis_scale(AxisId::XBottom, AxisScale::Log10)
        .expect("log scale");
    let pair = AxisPair::default();

    c.bench_function("log_axis_round_trip", |b| {
        b.iter(|| {
            let px = coords
                .data_to_device(pair, black_box(DataPoint::new(4_321.123, 0.5)))
                .expect("to device");
            let _ = coords.device_to_data(pair, px).expect("from device");
        })
    });
}

fn bench_resample_4k_image(c: &mut Criterion) {
    let (rows, cols) = (4_096, 4_096);
    let pixels = SharedArray::from_vec_2d(
        (0..rows * cols).map(|i| (i % 4_093) as f32).collect(),
        rows,
        cols,
    )
    .expect("image buffer");
    let mut coords = CoordinateSystem::new(Viewport::new(1600, 900)).expect("coords");
    coords
        .set_axis_range(AxisId::XBottom, 0.0, cols as f64)
        .expect("x range");
    coords
        .set_axis_range(AxisId::YLeft, 0.0, rows as f64)
        .expect("y range");
    let extent = DataRect::new(0.0, cols as f64, 0.0, rows as f64);
    let plan = SourceTilePlan::plan(extent, rows, cols, &coords, AxisPair::default())
        .expect("plan")
        .expect("visible");
    let plan = ResamplePlan::Source(plan);
    let lut = LutState::new(palette_preset("viridis").expect("viridis"), 0.0, 4_092.0).expect("lut");

    c.bench_function("resample_4k_image_nearest", |b| {
        b.iter(|| {
            pixels
                .with_view(|view| resample(&view, black_box(&plan), &lut, Interpolation::Nearest))
                .expect("view")
        })
    });
}

fn bench_engine_render_curves(c: &mut Criterion) {
    let config = PlotEngineConfig::new(Viewport::new(1600, 900), (0.0, 10_000.0), (-1.5, 1.5));
    let mut engine = PlotEngine::new(NullRenderer::default(), config).expect("engine init");
    let xs = SharedArray::from_vec((0..10_000).map(f64::from).collect());
    let buffers: Vec<SharedArray<f64>> = (0..4)
        .map(|k| SharedArray::from_vec((0..10_000).map(|i| (f64::from(i) * 0.01 + f64::from(k)).sin()).collect()))
        .collect();
    for (k, ys) in buffers.iter().enumerate() {
        engine
            .add_curve(
                ("x", xs.adapter().expect("x adapter")),
                (&format!("y{k}"), ys.adapter().expect("y adapter")),
                "sine",
            )
            .expect("curve");
    }

    c.bench_function("engine_pan_render_4x10k", |b| {
        b.iter(|| {
            engine.pan_by_pixels(black_box(3.0), 0.0).expect("pan");
            engine.render().expect("render");
        })
    });
}

criterion_group!(
    benches,
    bench_log_axis_round_trip,
    bench_resample_4k_image,
    bench_engine_render_curves
);
criterion_main!(benches);
