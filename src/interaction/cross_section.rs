//! Cross sections of one or more images along a marker, a segment or a band.
//!
//! Band mode keeps a [`BandAccumulator`] per source image, so dragging a
//! rectangle only reads the rows and columns entering or leaving the band.
//! The derived curves live as ordinary curve items in a [`CrossSectionPlot`].

use std::collections::HashMap;
use std::ops::Range;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::core::{ArrayView, AxisPair, CoordinateSystem, DataPoint, DataRect, DevicePoint, SharedArray};
use crate::error::PlotResult;
use crate::extensions::PlotEvent;
use crate::interaction::{rubber_band, GestureTool, Modifiers, ToolContext};
use crate::items::{curve_style_cycle, CurveItem, ImageItem, ItemData, ItemId, PlotItem};
use crate::render::{Color, ItemLayer, LinePrimitive, RenderFrame, RenderPipeline, StrokeStyle};
use crate::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossSectionMode {
    /// Row through `y` and column through `x` of the marked point.
    #[default]
    Marker,
    /// Profile sampled along a segment.
    Line,
    /// Band averages: per-column mean (X) and per-row mean (Y).
    Rectangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CrossSectionGeometry {
    Marker(DataPoint),
    Line { a: DataPoint, b: DataPoint },
    Rectangle(DataRect),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionAxis {
    X,
    Y,
    /// Distance along the segment.
    Line,
}

/// One derived 1D curve, ready to be shown in a companion plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionCurve {
    pub source: ItemId,
    pub axis: SectionAxis,
    pub positions: Vec<f64>,
    pub values: Vec<f64>,
}

/// Arrays owned by the plot behind one companion curve item.
#[derive(Debug, Clone)]
struct CompanionCurve {
    item: ItemId,
    positions: SharedArray<f64>,
    values: SharedArray<f64>,
}

/// Companion viewport showing the sections as curve items, one per source
/// image and section axis, autoscaled after every update.
#[derive(Debug, Clone, Default)]
pub struct CrossSectionPlot {
    scene: Scene,
    coords: CoordinateSystem,
    curves: IndexMap<(ItemId, SectionAxis), CompanionCurve>,
    margin_ratio: f64,
}

impl CrossSectionPlot {
    #[must_use]
    pub fn new(coords: CoordinateSystem) -> Self {
        Self {
            coords,
            margin_ratio: 0.02,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Selection and styling of the companion curves go through here.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[must_use]
    pub fn coords(&self) -> &CoordinateSystem {
        &self.coords
    }

    pub fn coords_mut(&mut self) -> &mut CoordinateSystem {
        &mut self.coords
    }

    /// Curve item showing `axis` of `source`, if that section exists.
    #[must_use]
    pub fn curve(&self, source: ItemId, axis: SectionAxis) -> Option<ItemId> {
        self.curves.get(&(source, axis)).map(|curve| curve.item)
    }

    pub fn frame(&self, pipeline: &mut RenderPipeline, background: Color) -> RenderFrame {
        pipeline.build_frame(&self.scene, &self.coords, background, None)
    }

    /// Brings the curve items in line with `sections`: same-length curves
    /// are rewritten in place, others get fresh arrays, and curves of
    /// sections that disappeared are removed.
    pub fn update(&mut self, sections: &[CrossSectionCurve]) -> PlotResult<()> {
        let stale: Vec<(ItemId, SectionAxis)> = self
            .curves
            .keys()
            .filter(|key| !sections.iter().any(|s| (s.source, s.axis) == **key))
            .copied()
            .collect();
        for key in stale {
            if let Some(curve) = self.curves.shift_remove(&key) {
                self.scene.remove(curve.item)?;
            }
        }
        for section in sections {
            self.update_curve(section)?;
        }
        if let Some(bounds) = self.scene.data_bounds(AxisPair::default()) {
            self.coords.fit_to_rect(AxisPair::default(), bounds, self.margin_ratio)?;
        }
        debug!(curves = self.curves.len(), "cross section plot updated");
        Ok(())
    }

    fn update_curve(&mut self, section: &CrossSectionCurve) -> PlotResult<()> {
        let key = (section.source, section.axis);
        if let Some(curve) = self.curves.get(&key) {
            if curve.positions.shape()?.len() == section.positions.len() {
                curve.positions.write()?.copy_from_slice(&section.positions);
                curve.values.write()?.copy_from_slice(&section.values);
                self.scene.item_mut(curve.item)?.touch();
                return Ok(());
            }
        }
        let positions = SharedArray::from_vec(section.positions.clone());
        let values = SharedArray::from_vec(section.values.clone());
        let data = CurveItem::new(positions.adapter()?, values.adapter()?)?;
        let item = match self.curves.get(&key) {
            Some(curve) => {
                let entry = self.scene.item_mut(curve.item)?;
                let style = entry.as_curve().map(|old| old.style).unwrap_or_default();
                *entry.data_mut() = ItemData::Curve(data.with_style(style));
                curve.item
            }
            None => {
                let cycle = curve_style_cycle();
                let mut data = data;
                if let Some(style) = cycle.get(self.curves.len() % cycle.len().max(1)) {
                    data = data.with_style(*style);
                }
                let title = format!("{} {:?}", section.source, section.axis);
                self.scene.add(PlotItem::new(data).with_title(title))
            }
        };
        self.curves.insert(key, CompanionCurve { item, positions, values });
        Ok(())
    }
}

/// Running per-column and per-row sums over a pixel band.
///
/// `column_sums[c]` sums rows of the band for column `cols.start + c`;
/// `row_sums[r]` sums columns for row `rows.start + r`. Non-finite pixels are
/// skipped and not counted.
#[derive(Debug, Clone, Default)]
pub struct BandAccumulator {
    revision: Option<u64>,
    rows: Range<usize>,
    cols: Range<usize>,
    column_sums: Vec<(f64, usize)>,
    row_sums: Vec<(f64, usize)>,
    last_reads: usize,
}

fn add(slot: &mut (f64, usize), value: f64, sign: f64) {
    if value.is_finite() {
        slot.0 += sign * value;
        if sign > 0.0 {
            slot.1 += 1;
        } else {
            slot.1 = slot.1.saturating_sub(1);
        }
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

impl BandAccumulator {
    #[must_use]
    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    #[must_use]
    pub fn cols(&self) -> Range<usize> {
        self.cols.clone()
    }

    /// Pixels read by the last update.
    #[must_use]
    pub fn last_reads(&self) -> usize {
        self.last_reads
    }

    /// Moves the band to `rows` x `cols` of `view` (already clipped to it).
    pub fn update(&mut self, view: &ArrayView<'_>, revision: u64, rows: Range<usize>, cols: Range<usize>) {
        self.last_reads = 0;
        let incremental = self.revision == Some(revision)
            && overlaps(&self.rows, &rows)
            && overlaps(&self.cols, &cols);
        if !incremental {
            self.rebuild(view, revision, rows, cols);
            return;
        }
        self.shift_cols(view, cols);
        self.shift_rows(view, rows);
    }

    fn read(&mut self, view: &ArrayView<'_>, row: usize, col: usize) -> f64 {
        self.last_reads += 1;
        view.element_at(row, col).unwrap_or(f64::NAN)
    }

    fn rebuild(&mut self, view: &ArrayView<'_>, revision: u64, rows: Range<usize>, cols: Range<usize>) {
        self.revision = Some(revision);
        self.column_sums = vec![(0.0, 0); cols.len()];
        self.row_sums = vec![(0.0, 0); rows.len()];
        for (ri, row) in rows.clone().enumerate() {
            for (ci, col) in cols.clone().enumerate() {
                let value = self.read(view, row, col);
                add(&mut self.column_sums[ci], value, 1.0);
                add(&mut self.row_sums[ri], value, 1.0);
            }
        }
        self.rows = rows;
        self.cols = cols;
    }

    /// Column change over the current rows.
    fn shift_cols(&mut self, view: &ArrayView<'_>, cols: Range<usize>) {
        if cols == self.cols {
            return;
        }
        let rows = self.rows.clone();
        let old = self.cols.clone();
        for col in old.clone().filter(|c| !cols.contains(c)) {
            for (ri, row) in rows.clone().enumerate() {
                let value = self.read(view, row, col);
                add(&mut self.row_sums[ri], value, -1.0);
            }
        }
        let mut column_sums = Vec::with_capacity(cols.len());
        for col in cols.clone() {
            if old.contains(&col) {
                column_sums.push(self.column_sums[col - old.start]);
                continue;
            }
            let mut slot = (0.0, 0);
            for (ri, row) in rows.clone().enumerate() {
                let value = self.read(view, row, col);
                add(&mut slot, value, 1.0);
                add(&mut self.row_sums[ri], value, 1.0);
            }
            column_sums.push(slot);
        }
        self.column_sums = column_sums;
        self.cols = cols;
    }

    /// Row change over the (already updated) columns.
    fn shift_rows(&mut self, view: &ArrayView<'_>, rows: Range<usize>) {
        if rows == self.rows {
            return;
        }
        let cols = self.cols.clone();
        let old = self.rows.clone();
        for row in old.clone().filter(|r| !rows.contains(r)) {
            for (ci, col) in cols.clone().enumerate() {
                let value = self.read(view, row, col);
                add(&mut self.column_sums[ci], value, -1.0);
            }
        }
        let mut row_sums = Vec::with_capacity(rows.len());
        for row in rows.clone() {
            if old.contains(&row) {
                row_sums.push(self.row_sums[row - old.start]);
                continue;
            }
            let mut slot = (0.0, 0);
            for (ci, col) in cols.clone().enumerate() {
                let value = self.read(view, row, col);
                add(&mut slot, value, 1.0);
                add(&mut self.column_sums[ci], value, 1.0);
            }
            row_sums.push(slot);
        }
        self.row_sums = row_sums;
        self.rows = rows;
    }

    /// Mean over the band's rows, per column.
    #[must_use]
    pub fn column_means(&self) -> Vec<f64> {
        self.column_sums.iter().map(|&(sum, n)| mean(sum, n)).collect()
    }

    /// Mean over the band's columns, per row.
    #[must_use]
    pub fn row_means(&self) -> Vec<f64> {
        self.row_sums.iter().map(|&(sum, n)| mean(sum, n)).collect()
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

#[derive(Debug, Clone, Copy, Default)]
enum SectionState {
    #[default]
    Idle,
    Defining {
        start: DataPoint,
        start_px: DevicePoint,
        current_px: DevicePoint,
        previous: Option<CrossSectionGeometry>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CrossSectionTool {
    mode: CrossSectionMode,
    /// Source images; every visible image when unset.
    sources: Option<Vec<ItemId>>,
    state: SectionState,
    geometry: Option<CrossSectionGeometry>,
    sections: Vec<CrossSectionCurve>,
    accumulators: HashMap<ItemId, BandAccumulator>,
    plot: CrossSectionPlot,
}

impl CrossSectionTool {
    #[must_use]
    pub fn new(mode: CrossSectionMode) -> Self {
        Self {
            mode,
            plot: CrossSectionPlot::new(CoordinateSystem::default()),
            ..Self::default()
        }
    }

    /// Shows the sections in `plot` instead of a default companion plot.
    #[must_use]
    pub fn with_plot(mut self, plot: CrossSectionPlot) -> Self {
        self.plot = plot;
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<ItemId>) -> Self {
        self.sources = Some(sources);
        self
    }

    #[must_use]
    pub fn mode(&self) -> CrossSectionMode {
        self.mode
    }

    #[must_use]
    pub fn geometry(&self) -> Option<CrossSectionGeometry> {
        self.geometry
    }

    #[must_use]
    pub fn sections(&self) -> &[CrossSectionCurve] {
        &self.sections
    }

    #[must_use]
    pub fn plot(&self) -> &CrossSectionPlot {
        &self.plot
    }

    pub fn plot_mut(&mut self) -> &mut CrossSectionPlot {
        &mut self.plot
    }

    #[must_use]
    pub fn accumulator(&self, source: ItemId) -> Option<&BandAccumulator> {
        self.accumulators.get(&source)
    }

    /// Places the section programmatically and recomputes it.
    pub fn set_geometry(&mut self, scene: &Scene, geometry: Option<CrossSectionGeometry>) -> usize {
        self.geometry = geometry;
        self.recompute(scene)
    }

    /// Recomputes every section from the current geometry; returns the
    /// number of curves. Sources whose buffers went stale are skipped.
    pub fn recompute(&mut self, scene: &Scene) -> usize {
        self.compute_sections(scene);
        if let Err(err) = self.plot.update(&self.sections) {
            warn!(error = %err, "cross section plot not updated");
        }
        self.sections.len()
    }

    fn compute_sections(&mut self, scene: &Scene) {
        self.sections.clear();
        let Some(geometry) = self.geometry else {
            return;
        };
        let sources: Vec<ItemId> = match &self.sources {
            Some(ids) => ids.clone(),
            None => scene
                .iter_visible()
                .filter(|(_, item)| matches!(item.data(), ItemData::Image(_)))
                .map(|(id, _)| id)
                .collect(),
        };
        self.accumulators.retain(|id, _| sources.contains(id));
        for source in sources {
            let Some(image) = scene.get(source).and_then(|item| item.as_image()) else {
                continue;
            };
            if let Err(err) = self.section_of(source, image, geometry) {
                warn!(%source, error = %err, "cross section skipped source");
            }
        }
        trace!(curves = self.sections.len(), "cross section recomputed");
    }

    fn section_of(&mut self, source: ItemId, image: &ImageItem, geometry: CrossSectionGeometry) -> PlotResult<()> {
        match geometry {
            CrossSectionGeometry::Marker(point) => {
                if let Some((positions, values)) = image.x_section(point.y)? {
                    self.push(source, SectionAxis::X, positions, values);
                }
                if let Some((positions, values)) = image.y_section(point.x)? {
                    self.push(source, SectionAxis::Y, positions, values);
                }
            }
            CrossSectionGeometry::Line { a, b } => {
                let (positions, values) = line_profile(image, a, b)?;
                if !positions.is_empty() {
                    self.push(source, SectionAxis::Line, positions, values);
                }
            }
            CrossSectionGeometry::Rectangle(rect) => {
                let Some((rows, cols)) = image.pixel_region(rect) else {
                    self.accumulators.remove(&source);
                    return Ok(());
                };
                let revision = image.data().revision()?;
                let accumulator = self.accumulators.entry(source).or_default();
                image.with_view(|view| accumulator.update(view, revision, rows.clone(), cols.clone()))?;
                let (x_means, y_means) = (accumulator.column_means(), accumulator.row_means());
                let xs = cols.map(|c| image.pixel_to_data(c as f64 + 0.5, rows.start as f64).x).collect();
                let ys = rows.map(|r| image.pixel_to_data(0.0, r as f64 + 0.5).y).collect();
                self.push(source, SectionAxis::X, xs, x_means);
                self.push(source, SectionAxis::Y, ys, y_means);
            }
        }
        Ok(())
    }

    fn push(&mut self, source: ItemId, axis: SectionAxis, positions: Vec<f64>, values: Vec<f64>) {
        self.sections.push(CrossSectionCurve {
            source,
            axis,
            positions,
            values,
        });
    }

    fn geometry_between(&self, a: DataPoint, b: DataPoint) -> CrossSectionGeometry {
        match self.mode {
            CrossSectionMode::Marker => CrossSectionGeometry::Marker(b),
            CrossSectionMode::Line => CrossSectionGeometry::Line { a, b },
            CrossSectionMode::Rectangle => CrossSectionGeometry::Rectangle(DataRect::from_corners(a, b)),
        }
    }

    fn publish(&mut self, ctx: &mut ToolContext<'_>, geometry: Option<CrossSectionGeometry>) {
        let curves = self.set_geometry(ctx.scene, geometry);
        ctx.events.push(PlotEvent::CrossSectionUpdated { curves });
    }
}

/// Nearest-pixel profile along `a -> b`, one sample per crossed pixel.
fn line_profile(image: &ImageItem, a: DataPoint, b: DataPoint) -> PlotResult<(Vec<f64>, Vec<f64>)> {
    let (c0, r0) = image.data_to_pixel(a);
    let (c1, r1) = image.data_to_pixel(b);
    let steps = (c1 - c0).abs().max((r1 - r0).abs()).ceil().max(1.0) as usize;
    let shape = image.shape();
    let length = a.distance_to(b);
    image.with_view(|view| {
        let mut positions = Vec::with_capacity(steps + 1);
        let mut values = Vec::with_capacity(steps + 1);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let (col, row) = (c0 + (c1 - c0) * t, r0 + (r1 - r0) * t);
            if col < 0.0 || row < 0.0 || col >= shape.cols as f64 || row >= shape.rows as f64 {
                continue;
            }
            positions.push(length * t);
            values.push(view.element_at(row as usize, col as usize).unwrap_or(f64::NAN));
        }
        (positions, values)
    })
}

impl GestureTool for CrossSectionTool {
    fn is_busy(&self) -> bool {
        matches!(self.state, SectionState::Defining { .. })
    }

    fn pointer_down(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint, _modifiers: Modifiers) -> PlotResult<()> {
        let Ok(point) = ctx.coords.device_to_data(ctx.coords.active_axes(), position) else {
            return Ok(());
        };
        self.state = SectionState::Defining {
            start: point,
            start_px: position,
            current_px: position,
            previous: self.geometry,
        };
        if self.mode == CrossSectionMode::Marker {
            self.publish(ctx, Some(CrossSectionGeometry::Marker(point)));
        }
        Ok(())
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        let SectionState::Defining { start, current_px, .. } = &mut self.state
        else {
            return Ok(());
        };
        let Ok(point) = ctx.coords.device_to_data(ctx.coords.active_axes(), position) else {
            return Ok(());
        };
        *current_px = position;
        let start = *start;
        let geometry = self.geometry_between(start, point);
        self.publish(ctx, Some(geometry));
        Ok(())
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()> {
        self.pointer_move(ctx, position)?;
        let SectionState::Defining {
            start_px,
            current_px,
            previous,
            ..
        } = std::mem::take(&mut self.state)
        else {
            return Ok(());
        };
        let (dx, dy) = ((current_px.x - start_px.x).abs(), (current_px.y - start_px.y).abs());
        let degenerate = match self.mode {
            CrossSectionMode::Marker => false,
            CrossSectionMode::Line => dx.hypot(dy) < 1.0,
            CrossSectionMode::Rectangle => dx < 1.0 || dy < 1.0,
        };
        if degenerate {
            self.publish(ctx, previous);
        }
        Ok(())
    }

    fn cancel(&mut self, ctx: &mut ToolContext<'_>) -> PlotResult<()> {
        if let SectionState::Defining { previous, .. } = std::mem::take(&mut self.state) {
            self.publish(ctx, previous);
        }
        Ok(())
    }

    fn overlay(&self, coords: &CoordinateSystem, _scene: &Scene) -> Option<ItemLayer> {
        let axes = coords.active_axes();
        let stroke = StrokeStyle::solid(Color::rgb(1.0, 0.0, 1.0), 1.0);
        match self.geometry? {
            CrossSectionGeometry::Marker(point) => {
                let p = coords.data_to_device(axes, point).ok()?;
                let viewport = coords.viewport();
                let mut layer = ItemLayer::new(None);
                layer.lines.push(LinePrimitive::new(
                    DevicePoint::new(0.0, p.y),
                    DevicePoint::new(viewport.width_px(), p.y),
                    stroke,
                ));
                layer.lines.push(LinePrimitive::new(
                    DevicePoint::new(p.x, 0.0),
                    DevicePoint::new(p.x, viewport.height_px()),
                    stroke,
                ));
                Some(layer)
            }
            CrossSectionGeometry::Line { a, b } => {
                let mut layer = ItemLayer::new(None);
                layer.lines.push(LinePrimitive::new(
                    coords.data_to_device(axes, a).ok()?,
                    coords.data_to_device(axes, b).ok()?,
                    stroke,
                ));
                Some(layer)
            }
            CrossSectionGeometry::Rectangle(rect) => {
                let a = coords.data_to_device(axes, DataPoint::new(rect.x_min, rect.y_min)).ok()?;
                let b = coords.data_to_device(axes, DataPoint::new(rect.x_max, rect.y_max)).ok()?;
                Some(rubber_band(a, b))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BandAccumulator;
    use crate::core::SharedArray;

    fn grid() -> SharedArray<u16> {
        SharedArray::from_vec_2d((0u16..100).collect(), 10, 10).expect("grid")
    }

    #[test]
    fn band_means_cover_rows_and_columns() {
        let owner = grid();
        let mut band = BandAccumulator::default();
        owner
            .with_view(|view| band.update(&view, 0, 2..4, 0..3))
            .expect("read");
        // Rows 2..4, columns 0..3: column means (20+30)/2, ...
        assert_eq!(band.column_means(), vec![25.0, 26.0, 27.0]);
        assert_eq!(band.row_means(), vec![21.0, 31.0]);
        assert_eq!(band.last_reads(), 6);
    }

    #[test]
    fn shifting_band_reads_only_entering_and_leaving_rows() {
        let owner = grid();
        let mut band = BandAccumulator::default();
        owner
            .with_view(|view| {
                band.update(&view, 0, 0..5, 0..10);
                band.update(&view, 0, 1..6, 0..10);
            })
            .expect("read");
        assert_eq!(band.last_reads(), 20);
        let mut fresh = BandAccumulator::default();
        owner.with_view(|view| fresh.update(&view, 0, 1..6, 0..10)).expect("read");
        assert_eq!(band.column_means(), fresh.column_means());
        assert_eq!(band.row_means(), fresh.row_means());
    }

    #[test]
    fn new_revision_forces_full_rebuild() {
        let owner = grid();
        let mut band = BandAccumulator::default();
        owner
            .with_view(|view| {
                band.update(&view, 0, 0..2, 0..2);
                band.update(&view, 1, 0..2, 0..2);
            })
            .expect("read");
        assert_eq!(band.last_reads(), 4);
    }
}
