//! Scene + coordinate state to [`RenderFrame`], with a per-item layer cache.
//!
//! A cached layer is reused while its [`CacheKey`] still matches: same item
//! generation, same adapter revisions, same LUT revision, same selection
//! state, same viewport, and a view that differs by less than the pan
//! tolerance. Zoom, scale or inversion changes always miss.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::core::{Axis, AxisPair, CoordinateSystem, Viewport};
use crate::error::PlotResult;
#[cfg(feature = "parallel-resample")]
use crate::items::ItemData;
use crate::items::{ItemId, ItemRenderContext, PlotItem};
use crate::render::{ItemLayer, RenderFrame};
use crate::scene::Scene;

#[cfg(feature = "parallel-resample")]
use crate::render::background::{BackgroundResampler, ResampleJob};

/// Visible state of one axis as seen by a cached layer.
#[derive(Debug, Clone, PartialEq)]
struct AxisView {
    axis: Axis,
    t0: f64,
    t1: f64,
}

impl AxisView {
    fn capture(axis: &Axis) -> PlotResult<Self> {
        let (t0, t1) = axis.transformed_bounds()?;
        Ok(Self {
            axis: axis.clone(),
            t0,
            t1,
        })
    }

    /// Same scale and zoom, panned by less than `tolerance_px`.
    fn matches(&self, other: &Self, length_px: f64, tolerance_px: f64) -> bool {
        if self.axis.scale() != other.axis.scale() || self.axis.is_inverted() != other.axis.is_inverted() {
            return false;
        }
        let span = self.t1 - self.t0;
        let other_span = other.t1 - other.t0;
        if (span - other_span).abs() > span.abs() * 1e-12 {
            return false;
        }
        (self.t0 - other.t0).abs() / span * length_px < tolerance_px
    }
}

/// Everything a cached item layer depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    generation: u64,
    data_revisions: SmallVec<[u64; 4]>,
    lut_revision: Option<u64>,
    selected: bool,
    viewport: Viewport,
    x: AxisView,
    y: AxisView,
}

impl CacheKey {
    /// Fails with `StaleBuffer` when one of the item's adapters is dead.
    fn capture(item: &PlotItem, coords: &CoordinateSystem, selected: bool) -> PlotResult<Self> {
        let data_revisions = item
            .adapters()
            .into_iter()
            .map(|adapter| adapter.revision())
            .collect::<PlotResult<SmallVec<[u64; 4]>>>()?;
        let axes = item.axes();
        Ok(Self {
            generation: item.generation(),
            data_revisions,
            lut_revision: item.lut_revision(),
            selected,
            viewport: coords.viewport(),
            x: AxisView::capture(coords.axis(axes.x))?,
            y: AxisView::capture(coords.axis(axes.y))?,
        })
    }

    fn reusable_for(&self, fresh: &Self, tolerance_px: f64) -> bool {
        self.generation == fresh.generation
            && self.data_revisions == fresh.data_revisions
            && self.lut_revision == fresh.lut_revision
            && self.selected == fresh.selected
            && self.viewport == fresh.viewport
            && self.x.matches(&fresh.x, fresh.viewport.width_px(), tolerance_px)
            && self.y.matches(&fresh.y, fresh.viewport.height_px(), tolerance_px)
    }
}

#[derive(Debug, Clone)]
struct CachedLayer {
    key: CacheKey,
    layer: Arc<ItemLayer>,
    /// Ticket of an outstanding background resample for this layer.
    pending: Option<u64>,
}

/// Counters for the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub items_drawn: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub items_skipped: usize,
    pub pending_tiles: usize,
}

#[derive(Debug, Default)]
pub struct RenderPipeline {
    cache: HashMap<ItemId, CachedLayer>,
    pan_tolerance_px: f64,
    stats: RenderStats,
    #[cfg(feature = "parallel-resample")]
    background: Option<BackgroundResampler>,
}

impl RenderPipeline {
    #[must_use]
    pub fn new(pan_tolerance_px: f64) -> Self {
        Self {
            cache: HashMap::new(),
            pan_tolerance_px: pan_tolerance_px.max(0.0),
            stats: RenderStats::default(),
            #[cfg(feature = "parallel-resample")]
            background: None,
        }
    }

    /// Resample image tiles on the rayon pool; finished tiles are published
    /// by [`RenderPipeline::poll_background`].
    #[cfg(feature = "parallel-resample")]
    pub fn set_background_resampling(&mut self, enabled: bool) {
        self.background = enabled.then(BackgroundResampler::new);
    }

    #[must_use]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    #[must_use]
    pub fn pan_tolerance_px(&self) -> f64 {
        self.pan_tolerance_px
    }

    pub fn set_pan_tolerance_px(&mut self, tolerance: f64) {
        self.pan_tolerance_px = tolerance.max(0.0);
    }

    /// Drops the cached layer of `id`.
    pub fn invalidate(&mut self, id: ItemId) {
        self.cache.remove(&id);
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn is_cached(&self, id: ItemId) -> bool {
        self.cache.contains_key(&id)
    }

    /// Builds the frame for the scene's visible items in ascending z, then
    /// `overlay` on top.
    pub fn build_frame(
        &mut self,
        scene: &Scene,
        coords: &CoordinateSystem,
        background: crate::core::Color,
        overlay: Option<ItemLayer>,
    ) -> RenderFrame {
        let mut frame = RenderFrame::new(coords.viewport()).with_background(background);
        let mut stats = RenderStats::default();

        for (id, item) in scene.iter_visible() {
            let selected = scene.is_selected(id);
            let key = match CacheKey::capture(item, coords, selected) {
                Ok(key) => key,
                Err(err) => {
                    warn!(%id, error = %err, "skipping item for this frame");
                    self.cache.remove(&id);
                    stats.items_skipped += 1;
                    continue;
                }
            };

            if !item.is_dynamic() {
                if let Some(cached) = self.cache.get(&id) {
                    if cached.key.reusable_for(&key, self.pan_tolerance_px) {
                        stats.cache_hits += 1;
                        stats.items_drawn += 1;
                        stats.pending_tiles += usize::from(cached.pending.is_some());
                        frame.layers.push(Arc::clone(&cached.layer));
                        continue;
                    }
                }
            }

            stats.cache_misses += 1;
            let ctx = ItemRenderContext::new(coords, item.axes(), scene).selected(selected);
            match self.render_item(id, item, &ctx, key) {
                Ok(layer) => {
                    stats.items_drawn += 1;
                    stats.pending_tiles += usize::from(self.cache.get(&id).is_some_and(|c| c.pending.is_some()));
                    frame.layers.push(layer);
                }
                Err(err) => {
                    warn!(%id, error = %err, "skipping item for this frame");
                    self.cache.remove(&id);
                    stats.items_skipped += 1;
                }
            }
        }

        self.cache.retain(|id, _| scene.contains(*id));
        if let Some(overlay) = overlay {
            frame.layers.push(Arc::new(overlay));
        }
        trace!(
            hits = stats.cache_hits,
            misses = stats.cache_misses,
            skipped = stats.items_skipped,
            "frame built"
        );
        self.stats = stats;
        frame
    }

    fn render_item(
        &mut self,
        id: ItemId,
        item: &PlotItem,
        ctx: &ItemRenderContext<'_>,
        key: CacheKey,
    ) -> PlotResult<Arc<ItemLayer>> {
        let mut layer = ItemLayer::new(Some(id));

        #[cfg(feature = "parallel-resample")]
        let (deferred, pending) = match (&mut self.background, item.data()) {
            (Some(background), ItemData::Image(image)) if image.is_resampled() => {
                let pending = image
                    .plan(ctx)?
                    .map(|plan| background.submit(ResampleJob::new(id, image, plan)));
                image.render_outline(ctx, &mut layer);
                (true, pending)
            }
            _ => (false, None),
        };
        #[cfg(not(feature = "parallel-resample"))]
        let (deferred, pending): (bool, Option<u64>) = (false, None);

        if !deferred {
            item.render(ctx, &mut layer)?;
        }
        let layer = Arc::new(layer);
        if item.is_dynamic() {
            self.cache.remove(&id);
        } else {
            self.cache.insert(
                id,
                CachedLayer {
                    key,
                    layer: Arc::clone(&layer),
                    pending,
                },
            );
        }
        Ok(layer)
    }

    /// Publishes finished background tiles into the cache. Returns the items
    /// whose layers changed; superseded results are discarded.
    #[cfg(feature = "parallel-resample")]
    pub fn poll_background(&mut self) -> Vec<ItemId> {
        let Some(background) = &mut self.background else {
            return Vec::new();
        };
        let mut published = Vec::new();
        for result in background.poll() {
            let Some(cached) = self.cache.get_mut(&result.item) else {
                continue;
            };
            if cached.pending != Some(result.ticket) {
                continue;
            }
            let mut layer = ItemLayer::clone(&cached.layer);
            layer.images.insert(0, result.tile);
            cached.layer = Arc::new(layer);
            cached.pending = None;
            published.push(result.item);
        }
        published
    }

    /// Whether any background tile is still outstanding.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.cache.values().any(|cached| cached.pending.is_some())
    }
}

/// Renders a single item without caching (exports and previews).
pub fn render_item_layer(scene: &Scene, coords: &CoordinateSystem, id: ItemId) -> PlotResult<ItemLayer> {
    let item = scene.item(id)?;
    let axes: AxisPair = item.axes();
    let ctx = ItemRenderContext::new(coords, axes, scene).selected(scene.is_selected(id));
    let mut layer = ItemLayer::new(Some(id));
    item.render(&ctx, &mut layer)?;
    Ok(layer)
}
