use std::collections::BTreeSet;

use tracing::debug;

use crate::core::{AspectLock, AxisId, AxisPair, AxisScale, DataPoint, DevicePoint};
use crate::error::PlotResult;
use crate::extensions::PlotEvent;
use crate::render::Renderer;

use super::PlotEngine;

impl<R: Renderer> PlotEngine<R> {
    #[must_use]
    pub fn axis_range(&self, axis: AxisId) -> (f64, f64) {
        self.coords.axis_range(axis)
    }

    /// Sets the visible range of one axis; `min >= max` is rejected with
    /// `InvalidRange` and leaves the axis unchanged.
    pub fn set_axis_range(&mut self, axis: AxisId, min: f64, max: f64) -> PlotResult<()> {
        self.coords.set_axis_range(axis, min, max)?;
        let active = self.coords.active_axes();
        let locked = self.coords.aspect_lock() != AspectLock::Free;
        if locked && (axis == active.x || axis == active.y) {
            self.emit_view_ranges(active);
        } else {
            self.emit_axis_range(axis);
        }
        Ok(())
    }

    pub fn set_axis_scale(&mut self, axis: AxisId, scale: AxisScale) -> PlotResult<()> {
        self.coords.set_axis_scale(axis, scale)?;
        self.emit_axis_range(axis);
        Ok(())
    }

    pub fn set_aspect_lock(&mut self, aspect: AspectLock) -> PlotResult<()> {
        self.coords.set_aspect_lock(aspect)?;
        self.config.aspect_lock = aspect;
        self.emit_view_ranges(self.coords.active_axes());
        Ok(())
    }

    /// Zooms the active axes by `factor` (> 1 zooms in) around `anchor`.
    pub fn zoom(&mut self, factor: f64, anchor: DevicePoint) -> PlotResult<()> {
        let pair = self.coords.active_axes();
        self.coords.zoom_around(pair, factor, anchor)?;
        self.emit_view_ranges(pair);
        Ok(())
    }

    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) -> PlotResult<()> {
        let pair = self.coords.active_axes();
        self.coords.pan_by_pixels(pair, dx, dy)?;
        self.emit_view_ranges(pair);
        Ok(())
    }

    /// Fits every axis pair used by visible items to their union extent,
    /// padded by the configured margin. Returns whether any range changed.
    pub fn autoscale(&mut self) -> PlotResult<bool> {
        let margin = self.config.autoscale_margin_ratio;
        let mut changed = false;
        for pair in self.scene.axis_pairs() {
            let Some(bounds) = self.scene.data_bounds(pair) else {
                continue;
            };
            let before = (self.coords.axis_range(pair.x), self.coords.axis_range(pair.y));
            self.coords.fit_to_rect(pair, bounds, margin)?;
            if before != (self.coords.axis_range(pair.x), self.coords.axis_range(pair.y)) {
                changed = true;
                self.emit_view_ranges(pair);
            }
        }
        debug!(changed, "autoscale");
        Ok(changed)
    }

    /// Axes referenced by at least one item; hosts hide the others.
    #[must_use]
    pub fn used_axes(&self) -> BTreeSet<AxisId> {
        self.scene.used_axes()
    }

    #[must_use]
    pub fn unused_axes(&self) -> Vec<AxisId> {
        let used = self.used_axes();
        AxisId::ALL.into_iter().filter(|axis| !used.contains(axis)).collect()
    }

    pub fn data_to_device(&self, pair: AxisPair, point: DataPoint) -> PlotResult<DevicePoint> {
        self.coords.data_to_device(pair, point)
    }

    pub fn device_to_data(&self, pair: AxisPair, pixel: DevicePoint) -> PlotResult<DataPoint> {
        self.coords.device_to_data(pair, pixel)
    }

    pub(super) fn emit_view_ranges(&mut self, pair: AxisPair) {
        self.emit_axis_range(pair.x);
        self.emit_axis_range(pair.y);
    }

    fn emit_axis_range(&mut self, axis: AxisId) {
        let (min, max) = self.coords.axis_range(axis);
        self.emit(PlotEvent::ViewRangeChanged { axis, min, max });
    }
}
