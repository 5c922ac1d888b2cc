use std::sync::Arc;

use crate::core::{Color, Viewport};
use crate::error::{PlotError, PlotResult};
use crate::items::ItemId;
use crate::render::{ImageTile, LinePrimitive, MarkerPrimitive, PathPrimitive, RectPrimitive, TextPrimitive};

/// Primitives produced by one item (or by the tool overlay when `item` is
/// `None`), drawn in field order: images, rects, paths, lines, markers, texts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemLayer {
    pub item: Option<ItemId>,
    pub images: Vec<ImageTile>,
    pub rects: Vec<RectPrimitive>,
    pub paths: Vec<PathPrimitive>,
    pub lines: Vec<LinePrimitive>,
    pub markers: Vec<MarkerPrimitive>,
    pub texts: Vec<TextPrimitive>,
}

impl ItemLayer {
    #[must_use]
    pub fn new(item: Option<ItemId>) -> Self {
        Self {
            item,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitive_count() == 0
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.images.len()
            + self.rects.len()
            + self.paths.len()
            + self.lines.len()
            + self.markers.len()
            + self.texts.len()
    }

    pub fn validate(&self) -> PlotResult<()> {
        for image in &self.images {
            image.validate()?;
        }
        for rect in &self.rects {
            rect.validate()?;
        }
        for path in &self.paths {
            path.validate()?;
        }
        for line in &self.lines {
            line.validate()?;
        }
        for marker in &self.markers {
            marker.validate()?;
        }
        for text in &self.texts {
            text.validate()?;
        }
        Ok(())
    }
}

/// Backend-agnostic output of one render pass.
///
/// Layers are shared with the render cache; an unchanged item contributes the
/// same `Arc` frame after frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub viewport: Viewport,
    pub background: Color,
    pub layers: Vec<Arc<ItemLayer>>,
}

impl RenderFrame {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            background: Color::WHITE,
            layers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub fn with_layer(mut self, layer: ItemLayer) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    pub fn validate(&self) -> PlotResult<()> {
        if !self.viewport.is_valid() {
            return Err(PlotError::InvalidViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }
        self.background.validate()?;
        for layer in &self.layers {
            layer.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(|layer| layer.is_empty())
    }

    /// Layer drawn for `item`, if it produced one this frame.
    #[must_use]
    pub fn layer_of(&self, item: ItemId) -> Option<&ItemLayer> {
        self.layers
            .iter()
            .find(|layer| layer.item == Some(item))
            .map(Arc::as_ref)
    }

    /// Items in draw order.
    pub fn item_order(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.layers.iter().filter_map(|layer| layer.item)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.layers.iter().map(|l| l.lines.len()).sum()
    }

    #[must_use]
    pub fn path_count(&self) -> usize {
        self.layers.iter().map(|l| l.paths.len()).sum()
    }

    #[must_use]
    pub fn text_count(&self) -> usize {
        self.layers.iter().map(|l| l.texts.len()).sum()
    }

    #[must_use]
    pub fn image_count(&self) -> usize {
        self.layers.iter().map(|l| l.images.len()).sum()
    }
}
