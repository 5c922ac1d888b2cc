use approx::assert_relative_eq;
use proptest::prelude::*;
use sciplot_rs::core::{
    AspectLock, AxisId, AxisPair, AxisScale, CoordinateSystem, DataPoint, Viewport,
};
use sciplot_rs::error::PlotError;

fn coords(width: u32, height: u32, x: (f64, f64), y: (f64, f64)) -> CoordinateSystem {
    let mut coords = CoordinateSystem::new(Viewport::new(width, height)).expect("coords");
    coords.set_axis_range(AxisId::XBottom, x.0, x.1).expect("x range");
    coords.set_axis_range(AxisId::YLeft, y.0, y.1).expect("y range");
    coords
}

#[test]
fn inverted_range_is_rejected_and_axis_kept() {
    let mut coords = coords(200, 100, (0.0, 10.0), (0.0, 5.0));
    let err = coords
        .set_axis_range(AxisId::XBottom, 3.0, 1.0)
        .expect_err("min > max");
    assert!(matches!(err, PlotError::InvalidRange { .. }));
    assert_eq!(coords.axis_range(AxisId::XBottom), (0.0, 10.0));
}

#[test]
fn log_axis_rejects_non_positive_range() {
    let mut coords = coords(200, 100, (1.0, 1000.0), (0.0, 5.0));
    coords
        .set_axis_scale(AxisId::XBottom, AxisScale::Log10)
        .expect("log scale over positive range");
    assert!(coords.set_axis_range(AxisId::XBottom, -1.0, 10.0).is_err());
    assert_eq!(coords.axis_range(AxisId::XBottom), (1.0, 1000.0));

    let middle = coords
        .data_to_device(AxisPair::default(), DataPoint::new(10.0_f64.powf(1.5), 1.0))
        .expect("to device");
    assert_relative_eq!(middle.x, 100.0, epsilon = 1e-9);
}

#[test]
fn y_grows_upwards_unless_inverted() {
    let mut coords = coords(100, 100, (0.0, 1.0), (0.0, 1.0));
    let pair = AxisPair::default();
    let top = coords.data_to_device(pair, DataPoint::new(0.0, 1.0)).expect("device");
    assert_relative_eq!(top.y, 0.0, epsilon = 1e-12);

    coords.set_axis_inverted(AxisId::YLeft, true);
    let top = coords.data_to_device(pair, DataPoint::new(0.0, 0.0)).expect("device");
    assert_relative_eq!(top.y, 0.0, epsilon = 1e-12);
}

#[test]
fn aspect_lock_expands_the_binding_axis() {
    let mut coords = coords(400, 200, (0.0, 10.0), (0.0, 10.0));
    coords
        .set_aspect_lock(AspectLock::Locked { ratio: 1.0 })
        .expect("lock");
    let (x0, x1) = coords.axis_range(AxisId::XBottom);
    let (y0, y1) = coords.axis_range(AxisId::YLeft);
    // Both requested spans stay visible.
    assert!(x1 - x0 >= 10.0 - 1e-9);
    assert!(y1 - y0 >= 10.0 - 1e-9);
    assert_relative_eq!((y1 - y0) / (x1 - x0), 200.0 / 400.0, epsilon = 1e-9);
}

proptest! {
    #[test]
    fn linear_round_trip_is_stable(
        x_min in -1.0e6f64..1.0e6,
        x_span in 1.0e-3f64..1.0e6,
        y_min in -1.0e6f64..1.0e6,
        y_span in 1.0e-3f64..1.0e6,
        fx in 0.0f64..1.0,
        fy in 0.0f64..1.0,
        inverted in any::<bool>(),
    ) {
        let mut coords = coords(640, 480, (x_min, x_min + x_span), (y_min, y_min + y_span));
        coords.set_axis_inverted(AxisId::YLeft, inverted);
        let pair = AxisPair::default();
        let point = DataPoint::new(x_min + fx * x_span, y_min + fy * y_span);
        let device = coords.data_to_device(pair, point).expect("device");
        let back = coords.device_to_data(pair, device).expect("data");
        prop_assert!((back.x - point.x).abs() <= 1e-9 * x_span.max(x_min.abs()).max(1.0));
        prop_assert!((back.y - point.y).abs() <= 1e-9 * y_span.max(y_min.abs()).max(1.0));
    }

    #[test]
    fn log_round_trip_is_stable(
        exp_min in -6.0f64..3.0,
        decades in 0.5f64..6.0,
        f in 0.0f64..1.0,
    ) {
        let lo = 10.0_f64.powf(exp_min);
        let hi = 10.0_f64.powf(exp_min + decades);
        let mut coords = coords(800, 600, (lo, hi), (0.0, 1.0));
        coords.set_axis_scale(AxisId::XBottom, AxisScale::Log10).expect("log");
        let pair = AxisPair::default();
        let value = 10.0_f64.powf(exp_min + f * decades);
        let device = coords.data_to_device(pair, DataPoint::new(value, 0.5)).expect("device");
        let back = coords.device_to_data(pair, device).expect("data");
        prop_assert!(((back.x - value) / value).abs() <= 1e-9);
    }

    #[test]
    fn locked_aspect_matches_viewport_ratio(
        width in 50u32..2000,
        height in 50u32..2000,
        x_span in 0.1f64..1.0e4,
        y_span in 0.1f64..1.0e4,
        ratio in 0.25f64..4.0,
    ) {
        let mut coords = coords(width, height, (0.0, x_span), (0.0, y_span));
        coords.set_aspect_lock(AspectLock::Locked { ratio }).expect("lock");
        let (x0, x1) = coords.axis_range(AxisId::XBottom);
        let (y0, y1) = coords.axis_range(AxisId::YLeft);
        let expected = (x1 - x0) * ratio * f64::from(height) / f64::from(width);
        prop_assert!(((y1 - y0) - expected).abs() <= 1e-9 * expected.max(1.0));
        prop_assert!(x1 - x0 >= x_span * (1.0 - 1e-9));
        prop_assert!(y1 - y0 >= y_span * (1.0 - 1e-9));
    }
}
