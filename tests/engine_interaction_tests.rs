use approx::assert_relative_eq;
use sciplot_rs::api::DataSlot;
use sciplot_rs::core::{AxisId, DataRect, DevicePoint, SharedArray, Viewport};
use sciplot_rs::error::PlotError;
use sciplot_rs::extensions::{EventLog, PlotEvent};
use sciplot_rs::interaction::{
    InputEvent, IntervalTool, Key, Modifiers, PointerButton, SelectionTool, ToolKind,
};
use sciplot_rs::items::{GridItem, ItemData, ItemId, ItemKind, PlotItem, ShapeGeometry, ShapeItem};
use sciplot_rs::render::{render_item_layer, NullRenderer};
use sciplot_rs::{PlotEngine, PlotEngineConfig};

fn engine(width: u32, height: u32, x: (f64, f64), y: (f64, f64)) -> PlotEngine<NullRenderer> {
    let config = PlotEngineConfig::new(Viewport::new(width, height), x, y);
    PlotEngine::new(NullRenderer::default(), config).expect("engine init")
}

fn with_log(engine: &mut PlotEngine<NullRenderer>) -> EventLog {
    let log = EventLog::new("log");
    engine
        .register_observer(Box::new(log.clone()))
        .expect("register log");
    log
}

/// Curve x = [0, 1, 2], y = [0, 1, 4].
fn parabola() -> (SharedArray<f64>, SharedArray<f64>) {
    (
        SharedArray::from_vec(vec![0.0, 1.0, 2.0]),
        SharedArray::from_vec(vec![0.0, 1.0, 4.0]),
    )
}

fn rectangle(engine: &PlotEngine<NullRenderer>, id: ItemId) -> Option<ShapeGeometry> {
    engine.scene().item(id).ok()?.data().geometry().cloned()
}

#[test]
fn autoscale_fits_curve_bounds_without_margin() {
    let mut engine = engine(200, 100, (0.0, 1.0), (0.0, 1.0));
    let (x, y) = parabola();
    engine
        .add_curve(
            ("x", x.adapter().expect("x adapter")),
            ("y", y.adapter().expect("y adapter")),
            "parabola",
        )
        .expect("add curve");

    assert!(engine.autoscale().expect("autoscale"));
    assert_eq!(engine.axis_range(AxisId::XBottom), (0.0, 2.0));
    assert_eq!(engine.axis_range(AxisId::YLeft), (0.0, 4.0));
    assert!(!engine.autoscale().expect("second autoscale"));
}

#[test]
fn interval_drag_reports_curve_statistics() {
    let mut engine = engine(200, 100, (0.0, 2.0), (0.0, 4.0));
    let (x, y) = parabola();
    let curve = engine
        .add_curve(
            ("x", x.adapter().expect("x adapter")),
            ("y", y.adapter().expect("y adapter")),
            "parabola",
        )
        .expect("add curve");
    engine.set_tool(IntervalTool::for_curve(curve)).expect("interval tool");
    let log = with_log(&mut engine);

    let added = engine.handle_input(InputEvent::down(50.0, 50.0)).expect("down");
    let Some(PlotEvent::ItemsAdded(ids)) = added.first() else {
        panic!("interval shape not created: {added:?}");
    };
    let range = ids[0];
    assert!(engine.is_gesture_active());

    let moved = engine.handle_input(InputEvent::moved(150.0, 50.0)).expect("move");
    let stats = moved
        .iter()
        .find_map(|event| match event {
            PlotEvent::IntervalChanged { stats, .. } => *stats,
            _ => None,
        })
        .expect("interval statistics");
    assert_relative_eq!(stats.x0, 0.5, epsilon = 1e-12);
    assert_relative_eq!(stats.x1, 1.5, epsilon = 1e-12);
    assert_relative_eq!(stats.mean, 1.25, epsilon = 1e-12);
    assert_relative_eq!(stats.min, 0.5, epsilon = 1e-12);
    assert_relative_eq!(stats.max, 2.5, epsilon = 1e-12);
    assert_relative_eq!(stats.integral, 1.25, epsilon = 1e-12);

    engine.handle_input(InputEvent::up(150.0, 50.0)).expect("up");
    assert!(!engine.is_gesture_active());
    assert!(log.any(|event| *event == PlotEvent::ItemCommitted(range)));
    assert!(engine.scene().contains(range));
    // The statistics label is a child of the range.
    assert_eq!(engine.scene().children_of(range).len(), 1);
}

#[test]
fn cancelled_interval_leaves_nothing_behind() {
    let mut engine = engine(200, 100, (0.0, 2.0), (0.0, 4.0));
    let (x, y) = parabola();
    let curve = engine
        .add_curve(
            ("x", x.adapter().expect("x adapter")),
            ("y", y.adapter().expect("y adapter")),
            "parabola",
        )
        .expect("add curve");
    engine.set_tool(IntervalTool::for_curve(curve)).expect("interval tool");

    engine.handle_input(InputEvent::down(50.0, 50.0)).expect("down");
    engine.handle_input(InputEvent::moved(120.0, 50.0)).expect("move");
    engine.handle_input(InputEvent::key(Key::Escape)).expect("escape");

    assert_eq!(engine.scene().ids(), vec![curve]);
    assert!(!engine.is_gesture_active());
}

#[test]
fn tool_switch_is_refused_mid_gesture() {
    let mut engine = engine(200, 100, (0.0, 2.0), (0.0, 4.0));
    let (x, y) = parabola();
    let curve = engine
        .add_curve(
            ("x", x.adapter().expect("x adapter")),
            ("y", y.adapter().expect("y adapter")),
            "parabola",
        )
        .expect("add curve");
    engine.set_tool(IntervalTool::for_curve(curve)).expect("interval tool");
    engine.handle_input(InputEvent::down(20.0, 50.0)).expect("down");

    let err = engine.set_tool(SelectionTool::default()).expect_err("busy");
    assert!(matches!(err, PlotError::ToolBusy { .. }));
    assert_eq!(engine.tool_kind(), ToolKind::IntervalSelection);

    engine.cancel_gesture().expect("cancel");
    engine.set_tool(SelectionTool::default()).expect("selection tool");
    assert_eq!(engine.tool_kind(), ToolKind::Selection);
}

#[test]
fn cancelled_drag_restores_geometry_without_commit() {
    let mut engine = engine(100, 100, (0.0, 10.0), (0.0, 10.0));
    let original = ShapeGeometry::Rectangle(DataRect::new(2.0, 4.0, 2.0, 4.0));
    let id = engine.add_shape(original.clone()).expect("shape");
    let log = with_log(&mut engine);

    // Rectangle center (3, 3) sits at device (30, 70).
    engine.handle_input(InputEvent::down(30.0, 70.0)).expect("down");
    assert!(engine.scene().is_selected(id));
    let moved = engine.handle_input(InputEvent::moved(50.0, 50.0)).expect("move");
    assert!(moved.contains(&PlotEvent::ItemMoved(id)));
    assert_ne!(rectangle(&engine, id), Some(original.clone()));

    engine.handle_input(InputEvent::key(Key::Escape)).expect("escape");
    assert_eq!(rectangle(&engine, id), Some(original));
    assert!(!log.any(|event| matches!(event, PlotEvent::ItemCommitted(_))));
    assert!(!engine.is_gesture_active());
}

#[test]
fn finished_drag_commits_once() {
    let mut engine = engine(100, 100, (0.0, 10.0), (0.0, 10.0));
    let id = engine
        .add_shape(ShapeGeometry::Rectangle(DataRect::new(2.0, 4.0, 2.0, 4.0)))
        .expect("shape");
    let log = with_log(&mut engine);

    engine.handle_input(InputEvent::down(30.0, 70.0)).expect("down");
    engine.handle_input(InputEvent::moved(40.0, 70.0)).expect("move");
    engine.handle_input(InputEvent::up(50.0, 70.0)).expect("up");

    assert_eq!(
        rectangle(&engine, id),
        Some(ShapeGeometry::Rectangle(DataRect::new(4.0, 6.0, 2.0, 4.0)))
    );
    let commits = log
        .events()
        .into_iter()
        .filter(|event| *event == PlotEvent::ItemCommitted(id))
        .count();
    assert_eq!(commits, 1);
}

#[test]
fn delete_key_skips_readonly_items() {
    let mut engine = engine(100, 100, (0.0, 10.0), (0.0, 10.0));
    let locked = engine.add_item(
        PlotItem::new(ShapeItem::new(ShapeGeometry::Rectangle(DataRect::new(1.0, 2.0, 1.0, 2.0))).expect("shape"))
            .with_readonly(true),
    );
    let free = engine
        .add_shape(ShapeGeometry::Rectangle(DataRect::new(5.0, 6.0, 5.0, 6.0)))
        .expect("shape");
    assert!(engine.select_all());

    let events = engine.handle_input(InputEvent::key(Key::Delete)).expect("delete");
    assert!(events.contains(&PlotEvent::ItemsRemoved(vec![free])));
    assert!(engine.scene().contains(locked));
    assert!(!engine.scene().contains(free));

    let err = engine.remove_item(locked).expect_err("readonly");
    assert!(matches!(err, PlotError::InvalidData(_)));
}

#[test]
fn wheel_zooms_around_the_pointer() {
    let mut engine = engine(100, 100, (0.0, 10.0), (0.0, 10.0));
    let events = engine
        .handle_input(InputEvent::Wheel {
            position: DevicePoint::new(50.0, 50.0),
            delta: 1.0,
            modifiers: Modifiers::NONE,
        })
        .expect("wheel");
    assert_eq!(events.len(), 2);
    let (x0, x1) = engine.axis_range(AxisId::XBottom);
    assert_relative_eq!(x1 - x0, 10.0 / 1.25, epsilon = 1e-9);
    assert_relative_eq!((x0 + x1) * 0.5, 5.0, epsilon = 1e-9);
}

#[test]
fn cancelled_pan_restores_the_view() {
    let mut engine = engine(100, 100, (0.0, 10.0), (0.0, 10.0));
    engine
        .handle_input(InputEvent::PointerDown {
            position: DevicePoint::new(50.0, 50.0),
            button: PointerButton::Middle,
            modifiers: Modifiers::NONE,
        })
        .expect("pan start");
    engine.handle_input(InputEvent::moved(70.0, 50.0)).expect("pan move");
    assert_relative_eq!(engine.axis_range(AxisId::XBottom).0, -2.0, epsilon = 1e-9);

    engine.handle_input(InputEvent::key(Key::Escape)).expect("escape");
    assert_eq!(engine.axis_range(AxisId::XBottom), (0.0, 10.0));
}

#[test]
fn observers_are_keyed_by_id() {
    let mut engine = engine(100, 100, (0.0, 1.0), (0.0, 1.0));
    let log = with_log(&mut engine);
    assert!(engine.register_observer(Box::new(EventLog::new("log"))).is_err());
    assert_eq!(engine.observer_count(), 1);

    engine.set_axis_range(AxisId::XBottom, 0.0, 5.0).expect("range");
    assert!(log.any(|event| {
        *event
            == PlotEvent::ViewRangeChanged {
                axis: AxisId::XBottom,
                min: 0.0,
                max: 5.0,
            }
    }));

    assert!(engine.unregister_observer("log"));
    assert!(!engine.unregister_observer("log"));
    log.clear();
    engine.set_axis_range(AxisId::XBottom, 0.0, 6.0).expect("range");
    assert!(log.is_empty());
}

#[test]
fn removing_an_item_forgets_its_data_keys() {
    let mut engine = engine(100, 100, (0.0, 1.0), (0.0, 1.0));
    let (x, y) = parabola();
    let curve = engine
        .add_curve(
            ("x", x.adapter().expect("x adapter")),
            ("y", y.adapter().expect("y adapter")),
            "parabola",
        )
        .expect("add curve");
    assert_eq!(engine.data_keys().get(curve, DataSlot::X), Some("x"));

    engine.remove_item(curve).expect("remove");
    assert!(engine.data_keys().get(curve, DataSlot::X).is_none());
    assert!(engine.data_keys().is_empty());
}

#[test]
fn render_draws_visible_items_and_skips_hidden_ones() {
    let mut engine = engine(200, 100, (0.0, 2.0), (0.0, 4.0));
    let (x, y) = parabola();
    let curve = engine
        .add_curve(
            ("x", x.adapter().expect("x adapter")),
            ("y", y.adapter().expect("y adapter")),
            "parabola",
        )
        .expect("add curve");
    engine.render().expect("render");
    assert_eq!(engine.renderer().frames_rendered, 1);
    assert_eq!(engine.render_stats().items_drawn, 1);

    engine.update_item(curve, |item| item.set_visible(false)).expect("hide");
    engine.render().expect("render");
    assert_eq!(engine.render_stats().items_drawn, 0);

    let Some(ItemData::Curve(data)) = engine.scene().get(curve).map(PlotItem::data) else {
        panic!("curve expected");
    };
    assert_eq!(data.len(), 3);
}

#[test]
fn grid_sits_under_every_item_and_ignores_autoscale() {
    let mut engine = engine(200, 100, (0.0, 10.0), (0.0, 5.0));
    let (x, y) = parabola();
    let curve = engine
        .add_curve(
            ("x", x.adapter().expect("x adapter")),
            ("y", y.adapter().expect("y adapter")),
            "parabola",
        )
        .expect("add curve");
    let grid = engine.add_grid(GridItem::default().without_minor());
    let scene = engine.scene();
    assert_eq!(scene.item(grid).expect("grid").kind(), ItemKind::Grid);
    assert!(scene.z_order(grid) < scene.z_order(curve));
    assert_eq!(scene.ids().first(), Some(&grid));
    assert!(!scene.item(grid).expect("grid").is_selectable());

    // Majors every 5 units on x (200 px wide) and every 5 units on y.
    let layer = render_item_layer(engine.scene(), engine.coordinates(), grid).expect("grid layer");
    assert_eq!(layer.lines.len(), 5);

    engine.autoscale().expect("autoscale");
    assert_relative_eq!(engine.coordinates().axis_range(AxisId::XBottom).1, 2.0, epsilon = 0.1);
}
