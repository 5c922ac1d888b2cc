use sciplot_rs::core::{AxisId, AxisPair, DataRect, SharedArray, Viewport};
use sciplot_rs::extensions::PlotEvent;
use sciplot_rs::interaction::{
    ContrastTool, CrossSectionMode, CrossSectionTool, FilterOutput, FilterTool, InputEvent, Key,
    RegionFilter, SectionAxis, Tool,
};
use sciplot_rs::items::{ImageItem, ImagePlacement, ItemData, ItemId, ItemKind, MoveDelta, PlotItem};
use sciplot_rs::render::{render_item_layer, NullRenderer};
use sciplot_rs::scene::Band;
use sciplot_rs::{PlotEngine, PlotEngineConfig};

/// 4x4 image with value `4 * row + col`, one data unit per pixel, shown in a
/// 40x40 viewport so one pixel covers 10x10 device pixels (y down).
fn ramp_engine(pixels: &SharedArray<f64>) -> (PlotEngine<NullRenderer>, ItemId) {
    let config = PlotEngineConfig::image_plot(Viewport::new(40, 40), (0.0, 4.0), (0.0, 4.0));
    let mut engine = PlotEngine::new(NullRenderer::default(), config).expect("engine init");
    let id = engine
        .add_image(
            "ramp",
            pixels.adapter().expect("adapter"),
            DataRect::new(0.0, 4.0, 0.0, 4.0),
            "ramp",
        )
        .expect("image");
    (engine, id)
}

fn ramp() -> SharedArray<f64> {
    SharedArray::from_vec_2d((0..16).map(f64::from).collect(), 4, 4).expect("ramp")
}

fn drag(engine: &mut PlotEngine<NullRenderer>, from: (f64, f64), to: (f64, f64)) -> Vec<PlotEvent> {
    let mut events = engine.handle_input(InputEvent::down(from.0, from.1)).expect("down");
    events.extend(engine.handle_input(InputEvent::moved(to.0, to.1)).expect("move"));
    events.extend(engine.handle_input(InputEvent::up(to.0, to.1)).expect("up"));
    events
}

fn value(pixels: &SharedArray<f64>, row: usize, col: usize) -> f64 {
    pixels
        .with_view(|view| view.element_at(row, col))
        .expect("view")
        .expect("in bounds")
}

#[test]
fn in_place_threshold_rewrites_the_dragged_region() {
    let pixels = ramp();
    let (mut engine, image) = ramp_engine(&pixels);
    let filter = RegionFilter::Threshold {
        level: 7.5,
        below: 0.0,
        above: 1.0,
    };
    engine
        .set_tool(FilterTool::new(filter, FilterOutput::InPlace).for_image(image))
        .expect("filter tool");

    let events = drag(&mut engine, (10.0, 10.0), (30.0, 30.0));
    assert!(events.contains(&PlotEvent::FilterApplied {
        item: image,
        rows: 2,
        cols: 2,
    }));
    assert_eq!(value(&pixels, 1, 1), 0.0);
    assert_eq!(value(&pixels, 1, 2), 0.0);
    assert_eq!(value(&pixels, 2, 1), 1.0);
    assert_eq!(value(&pixels, 2, 2), 1.0);
    // Outside the rectangle nothing changes.
    assert_eq!(value(&pixels, 0, 0), 0.0);
    assert_eq!(value(&pixels, 3, 3), 15.0);
}

#[test]
fn separate_output_leaves_the_source_alone() {
    let pixels = ramp();
    let (mut engine, image) = ramp_engine(&pixels);
    engine
        .set_tool(FilterTool::new(RegionFilter::BoxMean { radius: 1 }, FilterOutput::Separate).for_image(image))
        .expect("filter tool");

    drag(&mut engine, (0.0, 0.0), (40.0, 40.0));
    let Tool::RectangularFilter(tool) = engine.tool() else {
        panic!("filter tool expected");
    };
    let result = tool.last_result().expect("filter result");
    assert_eq!((result.rows.clone(), result.cols.clone()), (0..4, 0..4));
    let values = result.values.as_ref().expect("separate values");
    assert_eq!(values.len(), 16);
    // Corner mean over the clipped 2x2 window: (0 + 1 + 4 + 5) / 4.
    assert!((values[0] - 2.5).abs() < 1e-12);
    assert_eq!(value(&pixels, 0, 0), 0.0);
}

#[test]
fn in_place_filter_refuses_readonly_images() {
    let pixels = ramp();
    let config = PlotEngineConfig::image_plot(Viewport::new(40, 40), (0.0, 4.0), (0.0, 4.0));
    let mut engine = PlotEngine::new(NullRenderer::default(), config).expect("engine init");
    let image = ImageItem::new(pixels.adapter().expect("adapter"), DataRect::new(0.0, 4.0, 0.0, 4.0)).expect("image");
    let id = engine.add_item_to_band(PlotItem::new(image).with_readonly(true), Band::Background);
    let filter = RegionFilter::Threshold {
        level: 0.0,
        below: -1.0,
        above: -1.0,
    };
    engine
        .set_tool(FilterTool::new(filter, FilterOutput::InPlace).for_image(id))
        .expect("filter tool");

    engine.handle_input(InputEvent::down(0.0, 0.0)).expect("down");
    assert!(engine.handle_input(InputEvent::up(40.0, 40.0)).is_err());
    assert_eq!(value(&pixels, 2, 2), 10.0);
}

#[test]
fn filter_items_keep_filtering_the_source() {
    let pixels = ramp();
    let (mut engine, image) = ramp_engine(&pixels);
    let threshold = RegionFilter::Threshold {
        level: 7.5,
        below: 0.0,
        above: 1.0,
    };
    engine
        .set_tool(FilterTool::new(threshold, FilterOutput::Item).for_image(image))
        .expect("filter tool");

    let events = drag(&mut engine, (10.0, 10.0), (30.0, 30.0));
    let added = events
        .iter()
        .find_map(|event| match event {
            PlotEvent::ItemsAdded(ids) => ids.first().copied(),
            _ => None,
        })
        .expect("filter item added");
    assert_eq!(engine.scene().item(added).expect("filter item").kind(), ItemKind::ImageFilter);
    // The source keeps its pixels.
    assert_eq!(value(&pixels, 1, 1), 5.0);

    let filtered = |engine: &PlotEngine<NullRenderer>| {
        let Ok(ItemData::ImageFilter(filter)) = engine.scene().item(added).map(PlotItem::data) else {
            panic!("image filter expected");
        };
        assert_eq!(filter.source(), image);
        let source = engine.scene().item(image).expect("image").as_image().expect("image data");
        filter.filtered(source).expect("read").expect("inside the image")
    };
    let (_, cols, values) = filtered(&engine);
    assert_eq!(cols, 1..3);
    assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0]);

    // Source edits show up without touching the filter item.
    pixels.write().expect("write")[5] = 100.0;
    assert_eq!(filtered(&engine).2, vec![1.0, 0.0, 1.0, 1.0]);

    // Moving the rectangle one pixel right reads the next columns.
    engine
        .update_item(added, |item| {
            item.move_by(MoveDelta {
                data: (1.0, 0.0),
                device: (10.0, 0.0),
            });
        })
        .expect("move filter");
    assert_eq!(filtered(&engine).1, 2..4);

    let layer = render_item_layer(engine.scene(), engine.coordinates(), added).expect("layer");
    assert_eq!(layer.images.len(), 1);
}

#[test]
fn image_filters_need_an_image_source() {
    let pixels = ramp();
    let (mut engine, image) = ramp_engine(&pixels);
    let rect = DataRect::new(0.0, 2.0, 0.0, 2.0);
    let filter = engine
        .add_image_filter(image, rect, RegionFilter::default())
        .expect("filter over the image");
    assert!(engine.add_image_filter(filter, rect, RegionFilter::default()).is_err());
}

#[test]
fn quad_grid_images_render_as_cell_polygons() {
    let pixels = ramp();
    let config = PlotEngineConfig::image_plot(Viewport::new(40, 40), (0.0, 4.0), (0.0, 4.0));
    let mut engine = PlotEngine::new(NullRenderer::default(), config).expect("engine init");
    // 5x5 vertices, every row shifted right by a tenth of a pixel.
    let (x, y): (Vec<f64>, Vec<f64>) = (0..5)
        .flat_map(|row| (0..5).map(move |col| (f64::from(col) + 0.1 * f64::from(row), f64::from(row))))
        .unzip();
    let image = ImageItem::with_placement(pixels.adapter().expect("adapter"), ImagePlacement::QuadGrid { x, y })
        .expect("quad grid");
    let id = engine.add_item_to_band(PlotItem::new(image), Band::Background);

    let layer = render_item_layer(engine.scene(), engine.coordinates(), id).expect("layer");
    assert!(layer.images.is_empty());
    assert_eq!(layer.paths.len(), 16);
    engine.render().expect("render");
    assert_eq!(engine.render_stats().items_drawn, 1);
}

#[test]
fn rectangle_cross_section_averages_the_band() {
    let pixels = ramp();
    let (mut engine, image) = ramp_engine(&pixels);
    engine
        .set_tool(CrossSectionTool::new(CrossSectionMode::Rectangle))
        .expect("cross section tool");

    let events = drag(&mut engine, (10.0, 10.0), (30.0, 30.0));
    assert!(events.contains(&PlotEvent::CrossSectionUpdated { curves: 2 }));

    let Tool::CrossSection(tool) = engine.tool() else {
        panic!("cross section tool expected");
    };
    let columns = tool
        .sections()
        .iter()
        .find(|curve| curve.axis == SectionAxis::X)
        .expect("column means");
    assert_eq!(columns.source, image);
    assert_eq!(columns.positions, vec![1.5, 2.5]);
    assert_eq!(columns.values, vec![7.0, 8.0]);

    let rows = tool
        .sections()
        .iter()
        .find(|curve| curve.axis == SectionAxis::Y)
        .expect("row means");
    assert_eq!(rows.values, vec![5.5, 9.5]);
}

#[test]
fn cross_sections_become_curve_items_in_the_companion_plot() {
    let pixels = ramp();
    let (mut engine, image) = ramp_engine(&pixels);
    engine
        .set_tool(CrossSectionTool::new(CrossSectionMode::Marker))
        .expect("cross section tool");

    // Row 1 and column 2, as in the marker profile below.
    let events = drag(&mut engine, (25.0, 15.0), (25.0, 15.0));
    assert!(events.contains(&PlotEvent::CrossSectionUpdated { curves: 2 }));
    let Tool::CrossSection(tool) = engine.tool() else {
        panic!("cross section tool expected");
    };
    let plot = tool.plot();
    assert_eq!(plot.scene().len(), 2);
    assert!(plot.scene().iter().all(|(_, item)| item.kind() == ItemKind::Curve));

    let row_item = plot.curve(image, SectionAxis::X).expect("row curve item");
    let row = plot
        .scene()
        .item(row_item)
        .expect("row item")
        .as_curve()
        .expect("curve data")
        .with_views(|x, y| (x.iter().collect::<Vec<_>>(), y.iter().collect::<Vec<_>>()))
        .expect("curve views");
    assert_eq!(row.0, vec![0.5, 1.5, 2.5, 3.5]);
    assert_eq!(row.1, vec![4.0, 5.0, 6.0, 7.0]);

    // The companion view is fitted around the profiles.
    let (y_min, y_max) = plot.coords().axis_range(AxisPair::default().y);
    assert!(y_min <= 2.0 && y_max >= 14.0);

    // A new marker rewrites the same items.
    drag(&mut engine, (5.0, 35.0), (5.0, 35.0));
    let Tool::CrossSection(tool) = engine.tool() else {
        panic!("cross section tool expected");
    };
    let plot = tool.plot();
    assert_eq!(plot.curve(image, SectionAxis::X), Some(row_item));
    let values = plot
        .scene()
        .item(row_item)
        .expect("row item")
        .as_curve()
        .expect("curve data")
        .with_views(|_, y| y.iter().collect::<Vec<_>>())
        .expect("curve views");
    assert_eq!(values, vec![12.0, 13.0, 14.0, 15.0]);
}

#[test]
fn marker_cross_section_follows_the_pointer() {
    let pixels = ramp();
    let (mut engine, _) = ramp_engine(&pixels);
    engine
        .set_tool(CrossSectionTool::new(CrossSectionMode::Marker))
        .expect("cross section tool");

    // Data point (2.5, 1.5): column 2, row 1.
    drag(&mut engine, (25.0, 15.0), (25.0, 15.0));
    let Tool::CrossSection(tool) = engine.tool() else {
        panic!("cross section tool expected");
    };
    let row = tool
        .sections()
        .iter()
        .find(|curve| curve.axis == SectionAxis::X)
        .expect("row profile");
    assert_eq!(row.values, vec![4.0, 5.0, 6.0, 7.0]);
    let column = tool
        .sections()
        .iter()
        .find(|curve| curve.axis == SectionAxis::Y)
        .expect("column profile");
    assert_eq!(column.values, vec![2.0, 6.0, 10.0, 14.0]);
}

#[test]
fn contrast_edges_drag_and_cancel() {
    let pixels = ramp();
    let (mut engine, image) = ramp_engine(&pixels);
    engine.set_contrast_range(image, 4.0, 11.0).expect("contrast");
    // Histogram axes: value v sits at device x = 2v.
    engine.set_axis_range(AxisId::XTop, 0.0, 20.0).expect("value axis");
    let axes = AxisPair::new(AxisId::XTop, AxisId::YRight).expect("axes");
    engine
        .set_tool(ContrastTool::new(axes).for_image(image))
        .expect("contrast tool");

    let events = drag(&mut engine, (8.0, 20.0), (12.0, 20.0));
    assert!(events.contains(&PlotEvent::ItemCommitted(image)));
    let lut_range = |engine: &PlotEngine<NullRenderer>| {
        engine
            .scene()
            .item(image)
            .expect("image")
            .as_image()
            .expect("image data")
            .lut()
            .range()
    };
    assert_eq!(lut_range(&engine), (6.0, 11.0));

    engine.handle_input(InputEvent::down(22.0, 20.0)).expect("grab high");
    engine.handle_input(InputEvent::moved(30.0, 20.0)).expect("move high");
    assert_eq!(lut_range(&engine), (6.0, 15.0));
    engine.handle_input(InputEvent::key(Key::Escape)).expect("cancel");
    assert_eq!(lut_range(&engine), (6.0, 11.0));
}

#[test]
fn contrast_edge_cannot_cross_the_other_edge() {
    let pixels = ramp();
    let (mut engine, image) = ramp_engine(&pixels);
    engine.set_contrast_range(image, 4.0, 11.0).expect("contrast");
    engine.set_axis_range(AxisId::XTop, 0.0, 20.0).expect("value axis");
    let axes = AxisPair::new(AxisId::XTop, AxisId::YRight).expect("axes");
    engine
        .set_tool(ContrastTool::new(axes).for_image(image))
        .expect("contrast tool");
    let lut_range = |engine: &PlotEngine<NullRenderer>| {
        engine
            .scene()
            .item(image)
            .expect("image")
            .as_image()
            .expect("image data")
            .lut()
            .range()
    };

    // Low edge (value 4 at x = 8) dragged to value 15, past hi = 11.
    let events = drag(&mut engine, (8.0, 20.0), (30.0, 20.0));
    assert_eq!(lut_range(&engine), (4.0, 11.0));
    assert!(!events.contains(&PlotEvent::ItemCommitted(image)));

    // High edge (value 11 at x = 22) dragged to value 1, below lo = 4.
    drag(&mut engine, (22.0, 20.0), (2.0, 20.0));
    assert_eq!(lut_range(&engine), (4.0, 11.0));

    // Coming back inside the window resumes the drag.
    let events = drag(&mut engine, (8.0, 20.0), (20.0, 20.0));
    assert_eq!(lut_range(&engine), (10.0, 11.0));
    assert!(events.contains(&PlotEvent::ItemCommitted(image)));
}
