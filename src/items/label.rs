use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{Aggregate, DataPoint, DevicePoint, DeviceRect, RegionStats};
use crate::error::PlotResult;
use crate::items::{ItemData, ItemHit, ItemId, ItemLookup, ItemRenderContext, MoveDelta, TextStyle};
use crate::render::{ItemLayer, LinePrimitive, RectPrimitive, StrokeStyle, TextHAlign, TextPrimitive, TextVAlign};

const PADDING_PX: f64 = 4.0;
const SWATCH_PX: f64 = 24.0;

fn default_precision() -> usize {
    3
}

/// Position inside the plot area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    Top,
    #[default]
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Corner {
    /// `(-1 | 0 | 1, -1 | 0 | 1)` for left/center/right and top/middle/bottom.
    fn signs(self) -> (i8, i8) {
        match self {
            Self::TopLeft => (-1, -1),
            Self::Top => (0, -1),
            Self::TopRight => (1, -1),
            Self::Left => (-1, 0),
            Self::Center => (0, 0),
            Self::Right => (1, 0),
            Self::BottomLeft => (-1, 1),
            Self::Bottom => (0, 1),
            Self::BottomRight => (1, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LabelAnchor {
    /// Fixed to a plot corner; `offset_px` is the inward margin.
    Corner { corner: Corner, offset_px: (f64, f64) },
    /// Top-left of the label at a data point, shifted by `offset_px`.
    Data { point: DataPoint, offset_px: (f64, f64) },
}

impl Default for LabelAnchor {
    fn default() -> Self {
        Self::Corner {
            corner: Corner::TopRight,
            offset_px: (10.0, 10.0),
        }
    }
}

/// Aggregate of a curve over the x-interval of a range shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeComputation {
    pub curve: ItemId,
    pub range: ItemId,
    pub aggregate: Aggregate,
    /// Text with a `{}` placeholder for the value.
    pub template: String,
}

/// Aggregate of the image pixels under a rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionComputation {
    pub image: ItemId,
    pub region: ItemId,
    pub aggregate: Aggregate,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Computation {
    Range(RangeComputation),
    Region(RegionComputation),
}

impl Computation {
    #[must_use]
    pub fn depends_on(&self) -> [ItemId; 2] {
        match self {
            Self::Range(c) => [c.curve, c.range],
            Self::Region(c) => [c.image, c.region],
        }
    }

    /// Current value, `None` when the sources are missing or the region is
    /// empty.
    pub fn evaluate(&self, lookup: &dyn ItemLookup) -> PlotResult<Option<f64>> {
        match self {
            Self::Range(c) => {
                let (Some(curve), Some(range)) = (lookup.lookup(c.curve), lookup.lookup(c.range)) else {
                    return Ok(None);
                };
                let (ItemData::Curve(curve), Some((x0, x1))) = (curve.data(), range.x_interval()) else {
                    return Ok(None);
                };
                Ok(curve.interval_stats(x0, x1)?.map(|stats| c.aggregate.of_interval(&stats)))
            }
            Self::Region(c) => {
                let (Some(image), Some(region)) = (lookup.lookup(c.image), lookup.lookup(c.region)) else {
                    return Ok(None);
                };
                let (ItemData::Image(image), Some(rect)) = (image.data(), region.bounding_box()?) else {
                    return Ok(None);
                };
                let Some((rows, cols)) = image.pixel_region(rect) else {
                    return Ok(None);
                };
                let stats = image.with_view(|view| {
                    view.region(rows, cols)
                        .map(|region| RegionStats::from_region(&region))
                })??;
                Ok(stats.map(|stats| c.aggregate.of_region(&stats)))
            }
        }
    }

    fn template(&self) -> &str {
        match self {
            Self::Range(c) => &c.template,
            Self::Region(c) => &c.template,
        }
    }

    fn format(&self, lookup: &dyn ItemLookup, precision: usize) -> String {
        let value = match self.evaluate(lookup) {
            Ok(Some(value)) => format!("{value:.precision$}"),
            Ok(None) | Err(_) => "-".to_owned(),
        };
        let template = self.template();
        if template.contains("{}") {
            template.replacen("{}", &value, 1)
        } else {
            format!("{template}{value}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelContent {
    Text(String),
    /// Curve titles with line swatches; all visible curves when `items` is unset.
    Legend { items: Option<Vec<ItemId>> },
    Computations(Vec<Computation>),
}

/// Text box anchored to a plot corner or a data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelItem {
    pub content: LabelContent,
    #[serde(default)]
    pub anchor: LabelAnchor,
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default = "default_precision")]
    pub precision: usize,
}

struct LabelLayout {
    rect: DeviceRect,
    lines: Vec<(String, Option<StrokeStyle>)>,
    line_height: f64,
}

impl LabelItem {
    #[must_use]
    pub fn text(text: impl Into<String>, anchor: LabelAnchor) -> Self {
        Self::with_content(LabelContent::Text(text.into()), anchor)
    }

    /// Legend in the top-right corner.
    #[must_use]
    pub fn legend(items: Option<Vec<ItemId>>) -> Self {
        Self::with_content(LabelContent::Legend { items }, LabelAnchor::default())
    }

    #[must_use]
    pub fn computations(computations: Vec<Computation>, anchor: LabelAnchor) -> Self {
        Self::with_content(LabelContent::Computations(computations), anchor)
    }

    #[must_use]
    pub fn with_content(content: LabelContent, anchor: LabelAnchor) -> Self {
        Self {
            content,
            anchor,
            style: TextStyle::default(),
            precision: default_precision(),
        }
    }

    /// Whether the text depends on other items and must be recomputed each frame.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        !matches!(self.content, LabelContent::Text(_))
    }

    /// Rewrites item references after a restore assigned new ids. Ids absent
    /// from `map` are kept.
    pub(crate) fn remap_items(&mut self, map: &HashMap<ItemId, ItemId>) {
        let remap = |id: &mut ItemId| {
            if let Some(new) = map.get(id) {
                *id = *new;
            }
        };
        match &mut self.content {
            LabelContent::Text(_) => {}
            LabelContent::Legend { items } => items.iter_mut().flatten().for_each(remap),
            LabelContent::Computations(computations) => {
                for computation in computations {
                    match computation {
                        Computation::Range(c) => {
                            remap(&mut c.curve);
                            remap(&mut c.range);
                        }
                        Computation::Region(c) => {
                            remap(&mut c.image);
                            remap(&mut c.region);
                        }
                    }
                }
            }
        }
    }

    /// Lines of text, each with the swatch stroke of legend entries.
    fn lines(&self, lookup: &dyn ItemLookup) -> Vec<(String, Option<StrokeStyle>)> {
        match &self.content {
            LabelContent::Text(text) => text.lines().map(|l| (l.to_owned(), None)).collect(),
            LabelContent::Legend { items } => {
                let ids = items.clone().unwrap_or_else(|| lookup.curve_ids());
                ids.into_iter()
                    .filter_map(|id| lookup.lookup(id))
                    .filter_map(|item| match item.data() {
                        ItemData::Curve(curve) => Some((item.title().to_owned(), Some(curve.style.line))),
                        ItemData::Histogram(_) | ItemData::Image(_) => Some((item.title().to_owned(), None)),
                        _ => None,
                    })
                    .collect()
            }
            LabelContent::Computations(computations) => computations
                .iter()
                .map(|c| (c.format(lookup, self.precision), None))
                .collect(),
        }
    }

    /// Current text, one line per entry.
    #[must_use]
    pub fn current_text(&self, lookup: &dyn ItemLookup) -> String {
        self.lines(lookup)
            .into_iter()
            .map(|(line, _)| line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn layout(&self, ctx: &ItemRenderContext<'_>) -> Option<LabelLayout> {
        let lines = self.lines(ctx.lookup);
        if lines.is_empty() {
            return None;
        }
        let font = self.style.font_size_px;
        let line_height = font * 1.2;
        let swatch = if lines.iter().any(|(_, s)| s.is_some()) { SWATCH_PX } else { 0.0 };
        let longest = lines.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
        let width = longest as f64 * font * 0.6 + swatch + PADDING_PX * 2.0;
        let height = lines.len() as f64 * line_height + PADDING_PX * 2.0;

        let (x, y) = match self.anchor {
            LabelAnchor::Corner { corner, offset_px } => {
                let viewport = ctx.coords.viewport();
                let (sx, sy) = corner.signs();
                let place = |sign: i8, extent: f64, size: f64, offset: f64| match sign {
                    -1 => offset,
                    0 => (extent - size) * 0.5 + offset,
                    _ => extent - size - offset,
                };
                (
                    place(sx, viewport.width_px(), width, offset_px.0),
                    place(sy, viewport.height_px(), height, offset_px.1),
                )
            }
            LabelAnchor::Data { point, offset_px } => {
                let device = ctx.to_device(point).ok()?;
                (device.x + offset_px.0, device.y + offset_px.1)
            }
        };
        Some(LabelLayout {
            rect: DeviceRect::new(x, y, width, height),
            lines,
            line_height,
        })
    }

    pub(crate) fn hit_test(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint, tolerance: f64) -> Option<ItemHit> {
        let layout = self.layout(ctx)?;
        let distance = layout.rect.distance_to(point);
        let inside = layout.rect.contains(point);
        (inside || distance <= tolerance).then_some(ItemHit {
            distance,
            handle: None,
            inside,
        })
    }

    pub(crate) fn contains(&self, ctx: &ItemRenderContext<'_>, point: DevicePoint) -> bool {
        self.layout(ctx).is_some_and(|layout| layout.rect.contains(point))
    }

    pub(crate) fn render(&self, ctx: &ItemRenderContext<'_>, layer: &mut ItemLayer) {
        let Some(layout) = self.layout(ctx) else {
            return;
        };
        let border = if ctx.selected {
            ctx.selection_stroke()
        } else {
            StrokeStyle::solid(self.style.color.with_alpha(0.5), 1.0)
        };
        layer
            .rects
            .push(RectPrimitive::new(layout.rect, self.style.background, Some(border)));
        let has_swatch = layout.lines.iter().any(|(_, s)| s.is_some());
        let text_x = layout.rect.x + PADDING_PX + if has_swatch { SWATCH_PX } else { 0.0 };
        for (i, (line, swatch)) in layout.lines.iter().enumerate() {
            let top = layout.rect.y + PADDING_PX + i as f64 * layout.line_height;
            if let Some(stroke) = swatch {
                let mid = top + layout.line_height * 0.5;
                layer.lines.push(LinePrimitive::new(
                    DevicePoint::new(layout.rect.x + PADDING_PX, mid),
                    DevicePoint::new(layout.rect.x + SWATCH_PX - 2.0, mid),
                    *stroke,
                ));
            }
            if line.is_empty() {
                continue;
            }
            layer.texts.push(
                TextPrimitive::new(line.clone(), DevicePoint::new(text_x, top), self.style.font_size_px, self.style.color)
                    .aligned(TextHAlign::Left, TextVAlign::Top),
            );
        }
    }

    pub(crate) fn move_by(&mut self, delta: MoveDelta) {
        self.anchor = match self.anchor {
            LabelAnchor::Corner { corner, offset_px } => {
                let (sx, sy) = corner.signs();
                let shift = |sign: i8, offset: f64, d: f64| if sign > 0 { offset - d } else { offset + d };
                LabelAnchor::Corner {
                    corner,
                    offset_px: (shift(sx, offset_px.0, delta.device.0), shift(sy, offset_px.1, delta.device.1)),
                }
            }
            LabelAnchor::Data { point, offset_px } => LabelAnchor::Data {
                point: point.offset(delta.data.0, delta.data.1),
                offset_px,
            },
        };
    }
}
