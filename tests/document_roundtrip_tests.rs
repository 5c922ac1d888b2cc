use std::collections::HashMap;

use sciplot_rs::api::{DataSlot, PlotDocument, SaveScope};
use sciplot_rs::core::{ArrayRef, AxisId, DataRect, SharedArray, Viewport};
use sciplot_rs::items::{ItemData, ItemId, ItemKind, LabelContent};
use sciplot_rs::render::NullRenderer;
use sciplot_rs::{PlotEngine, PlotEngineConfig};

struct Buffers {
    x: SharedArray<f64>,
    y: SharedArray<f64>,
    pixels: SharedArray<f32>,
}

impl Buffers {
    fn new() -> Self {
        Self {
            x: SharedArray::from_vec(vec![0.0, 1.0, 2.0, 3.0]),
            y: SharedArray::from_vec(vec![1.0, 3.0, 2.0, 5.0]),
            pixels: SharedArray::from_vec_2d((0..12u8).map(f32::from).collect(), 3, 4).expect("pixels"),
        }
    }

    fn resolver(&self) -> HashMap<String, ArrayRef> {
        HashMap::from([
            ("time".to_owned(), self.x.adapter().expect("x")),
            ("signal".to_owned(), self.y.adapter().expect("y")),
            ("frame".to_owned(), self.pixels.adapter().expect("pixels")),
        ])
    }
}

fn engine() -> PlotEngine<NullRenderer> {
    let config = PlotEngineConfig::new(Viewport::new(320, 240), (0.0, 4.0), (0.0, 6.0));
    PlotEngine::new(NullRenderer::default(), config).expect("engine init")
}

/// Image, curve and a legend naming the curve.
fn populated(buffers: &Buffers) -> (PlotEngine<NullRenderer>, ItemId, ItemId) {
    let mut engine = engine();
    let image = engine
        .add_image(
            "frame",
            buffers.pixels.adapter().expect("pixels"),
            DataRect::new(0.0, 4.0, 0.0, 3.0),
            "frame",
        )
        .expect("image");
    engine.set_contrast_range(image, 2.0, 9.0).expect("contrast");
    let curve = engine
        .add_curve(
            ("time", buffers.x.adapter().expect("x")),
            ("signal", buffers.y.adapter().expect("y")),
            "signal",
        )
        .expect("curve");
    engine.add_legend(Some(vec![curve])).expect("legend");
    engine.set_axis_range(AxisId::XBottom, 0.5, 2.5).expect("zoom");
    (engine, image, curve)
}

fn kinds(engine: &PlotEngine<NullRenderer>, ids: &[ItemId]) -> Vec<ItemKind> {
    ids.iter()
        .map(|id| engine.scene().item(*id).expect("restored item").kind())
        .collect()
}

#[test]
fn json_document_restores_items_view_and_contrast() {
    let buffers = Buffers::new();
    let (source, _, _) = populated(&buffers);
    let json = source
        .document_json_contract_v1_pretty(SaveScope::All)
        .expect("save");

    let mut target = engine();
    let ids = target
        .load_document_json(&json, &buffers.resolver(), true)
        .expect("load");
    assert_eq!(kinds(&target, &ids), vec![ItemKind::Image, ItemKind::Curve, ItemKind::Label]);
    assert_eq!(target.axis_range(AxisId::XBottom), (0.5, 2.5));
    assert_eq!(target.viewport(), Viewport::new(320, 240));

    let image = target.scene().item(ids[0]).expect("image").as_image().expect("image data");
    assert_eq!(image.lut().range(), (2.0, 9.0));
    assert_eq!(target.data_keys().get(ids[0], DataSlot::Pixels), Some("frame"));
    assert_eq!(target.data_keys().get(ids[1], DataSlot::Y), Some("signal"));

    let Some(ItemData::Label(legend)) = target.scene().get(ids[2]).map(|item| item.data()) else {
        panic!("legend expected");
    };
    assert_eq!(legend.content, LabelContent::Legend { items: Some(vec![ids[1]]) });
}

#[test]
fn restore_without_view_keeps_current_ranges() {
    let buffers = Buffers::new();
    let (source, _, _) = populated(&buffers);
    let document = source.save_document(SaveScope::All).expect("save");

    let mut target = engine();
    target
        .restore_document(&document, &buffers.resolver(), false)
        .expect("restore");
    assert_eq!(target.axis_range(AxisId::XBottom), (0.0, 4.0));
    assert_eq!(target.scene().len(), 3);
}

#[test]
fn selected_scope_saves_only_the_selection() {
    let buffers = Buffers::new();
    let (mut source, _, curve) = populated(&buffers);
    source.select(curve, false).expect("select");
    let document = source.save_document(SaveScope::Selected).expect("save");
    assert_eq!(document.items.len(), 1);
    assert_eq!(document.items[0].id, curve);
}

#[test]
fn missing_data_key_leaves_the_scene_untouched() {
    let buffers = Buffers::new();
    let (source, _, _) = populated(&buffers);
    let document = source.save_document(SaveScope::All).expect("save");

    let mut resolver = buffers.resolver();
    resolver.remove("signal");
    let mut target = engine();
    assert!(target.restore_document(&document, &resolver, true).is_err());
    assert!(target.scene().is_empty());
    assert_eq!(target.axis_range(AxisId::XBottom), (0.0, 4.0));
}

#[test]
fn document_json_carries_keys_not_samples() {
    let buffers = Buffers::new();
    let (source, _, _) = populated(&buffers);
    let document = source.save_document(SaveScope::All).expect("save");
    let json = document.to_json_contract_v1_pretty().expect("json");
    assert!(json.contains("\"signal\""));
    assert!(json.contains("\"schema_version\": 1"));

    let parsed = PlotDocument::from_json_compat_str(&json).expect("parse");
    let saved_ids: Vec<ItemId> = document.items.iter().map(|item| item.id).collect();
    let parsed_ids: Vec<ItemId> = parsed.items.iter().map(|item| item.id).collect();
    assert_eq!(parsed_ids, saved_ids);
    assert_eq!(
        parsed.coordinates.map(|coords| coords.axis_range(AxisId::XBottom)),
        Some((0.5, 2.5))
    );
}
