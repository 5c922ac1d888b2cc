use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::{Axis, AxisId, AxisPair, AxisScale, DataPoint, DataRect, DevicePoint, Viewport};
use crate::error::{PlotError, PlotResult};

/// Aspect-ratio policy for the active axis pair.
///
/// With `Locked { ratio }` the engine maintains
/// `width_px / height_px == (x_span / y_span) * ratio`, spans measured in each
/// axis' transformed domain. `ratio == 1` means one data unit covers the same
/// number of pixels on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum AspectLock {
    #[default]
    Free,
    Locked {
        ratio: f64,
    },
}

/// Bidirectional data/device mapping for the four plot axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSystem {
    axes: [Axis; 4],
    viewport: Viewport,
    active: AxisPair,
    aspect: AspectLock,
    /// Ranges last asked for by the caller, before aspect-lock expansion.
    requested: [(f64, f64); 4],
}

impl Default for CoordinateSystem {
    /// Unit ranges on a 640x480 viewport.
    fn default() -> Self {
        Self {
            axes: AxisId::ALL.map(Axis::new),
            viewport: Viewport::new(640, 480),
            active: AxisPair::default(),
            aspect: AspectLock::Free,
            requested: [(0.0, 1.0); 4],
        }
    }
}

impl CoordinateSystem {
    pub fn new(viewport: Viewport) -> PlotResult<Self> {
        viewport.validate()?;
        Ok(Self {
            viewport,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn axis(&self, id: AxisId) -> &Axis {
        &self.axes[id.index()]
    }

    #[must_use]
    pub fn active_axes(&self) -> AxisPair {
        self.active
    }

    pub fn set_active_axes(&mut self, pair: AxisPair) -> PlotResult<()> {
        self.active = AxisPair::new(pair.x, pair.y)?;
        self.apply_aspect_lock()
    }

    #[must_use]
    pub fn aspect_lock(&self) -> AspectLock {
        self.aspect
    }

    pub fn set_aspect_lock(&mut self, aspect: AspectLock) -> PlotResult<()> {
        if let AspectLock::Locked { ratio } = aspect {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(PlotError::InvalidData(
                    "aspect ratio must be finite and > 0".to_owned(),
                ));
            }
        }
        self.aspect = aspect;
        self.apply_aspect_lock()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> PlotResult<()> {
        viewport.validate()?;
        self.viewport = viewport;
        self.apply_aspect_lock()
    }

    /// Swaps the scale of one axis. When the new scale leaves the aspect
    /// lock unsatisfiable the previous scale is restored.
    pub fn set_axis_scale(&mut self, id: AxisId, scale: AxisScale) -> PlotResult<()> {
        let previous = self.axes[id.index()].clone();
        self.axes[id.index()].set_scale(scale)?;
        if let Err(err) = self.apply_aspect_lock_for(id) {
            self.axes[id.index()] = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn set_axis_inverted(&mut self, id: AxisId, inverted: bool) {
        self.axes[id.index()].set_inverted(inverted);
    }

    pub fn set_axis_title(&mut self, id: AxisId, title: impl Into<String>) {
        self.axes[id.index()].set_title(title);
    }

    /// Sets the requested visible range of one axis.
    ///
    /// Inverted or zero-width ranges fail with `InvalidRange` and leave the
    /// axis unchanged.
    pub fn set_axis_range(&mut self, id: AxisId, min: f64, max: f64) -> PlotResult<()> {
        self.axes[id.index()].scale().validate_range(min, max)?;
        let previous = (self.axes[id.index()].clone(), self.requested[id.index()]);
        self.axes[id.index()].set_range(min, max)?;
        self.requested[id.index()] = (min, max);
        if let Err(err) = self.apply_aspect_lock_for(id) {
            (self.axes[id.index()], self.requested[id.index()]) = previous;
            return Err(err);
        }
        debug!(axis = %id, min, max, "set axis range");
        Ok(())
    }

    #[must_use]
    pub fn axis_range(&self, id: AxisId) -> (f64, f64) {
        self.axis(id).range()
    }

    /// Visible data rectangle for an axis pair.
    #[must_use]
    pub fn visible_rect(&self, pair: AxisPair) -> DataRect {
        let (x0, x1) = self.axis(pair.x).range();
        let (y0, y1) = self.axis(pair.y).range();
        DataRect::new(x0, x1, y0, y1)
    }

    pub fn data_to_device(&self, pair: AxisPair, point: DataPoint) -> PlotResult<DevicePoint> {
        let x = self.axis(pair.x).to_device(point.x, self.viewport.width_px())?;
        let y = self.axis(pair.y).to_device(point.y, self.viewport.height_px())?;
        Ok(DevicePoint::new(x, y))
    }

    pub fn device_to_data(&self, pair: AxisPair, pixel: DevicePoint) -> PlotResult<DataPoint> {
        let x = self.axis(pair.x).from_device(pixel.x, self.viewport.width_px())?;
        let y = self.axis(pair.y).from_device(pixel.y, self.viewport.height_px())?;
        Ok(DataPoint::new(x, y))
    }

    /// Data units covered by one device pixel, evaluated at `at`.
    pub fn data_per_pixel(&self, pair: AxisPair, at: DataPoint) -> PlotResult<(f64, f64)> {
        let origin = self.data_to_device(pair, at)?;
        let shifted = self.device_to_data(pair, DevicePoint::new(origin.x + 1.0, origin.y + 1.0))?;
        Ok(((shifted.x - at.x).abs(), (shifted.y - at.y).abs()))
    }

    /// Zooms both axes of `pair` by `factor` (>1 zooms in) keeping the data
    /// point under `anchor` fixed.
    pub fn zoom_around(&mut self, pair: AxisPair, factor: f64, anchor: DevicePoint) -> PlotResult<()> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(PlotError::InvalidData(
                "zoom factor must be finite and > 0".to_owned(),
            ));
        }
        let x = zoomed_bounds(self.axis(pair.x), anchor.x, self.viewport.width_px(), factor)?;
        let y = zoomed_bounds(self.axis(pair.y), anchor.y, self.viewport.height_px(), factor)?;
        self.commit_transformed(pair, x, y)?;
        trace!(factor, anchor_x = anchor.x, anchor_y = anchor.y, "zoom around anchor");
        Ok(())
    }

    /// Pans so that content follows a pointer displacement of `(dx, dy)` pixels.
    pub fn pan_by_pixels(&mut self, pair: AxisPair, dx: f64, dy: f64) -> PlotResult<()> {
        if !dx.is_finite() || !dy.is_finite() {
            return Err(PlotError::InvalidData("pan delta must be finite".to_owned()));
        }
        let x = panned_bounds(self.axis(pair.x), dx, self.viewport.width_px())?;
        let y = panned_bounds(self.axis(pair.y), dy, self.viewport.height_px())?;
        self.commit_transformed(pair, x, y)?;
        trace!(dx, dy, "pan by pixels");
        Ok(())
    }

    /// Fits `pair` to `rect` with a relative margin on every side.
    pub fn fit_to_rect(&mut self, pair: AxisPair, rect: DataRect, margin_ratio: f64) -> PlotResult<()> {
        let (x0, x1) = padded_range(self.axis(pair.x).scale(), rect.x_min, rect.x_max, margin_ratio);
        let (y0, y1) = padded_range(self.axis(pair.y).scale(), rect.y_min, rect.y_max, margin_ratio);
        self.axes[pair.x.index()].scale().validate_range(x0, x1)?;
        self.axes[pair.y.index()].scale().validate_range(y0, y1)?;
        self.axes[pair.x.index()].set_range(x0, x1)?;
        self.axes[pair.y.index()].set_range(y0, y1)?;
        self.requested[pair.x.index()] = (x0, x1);
        self.requested[pair.y.index()] = (y0, y1);
        self.apply_aspect_lock()
    }

    fn commit_transformed(&mut self, pair: AxisPair, x: (f64, f64), y: (f64, f64)) -> PlotResult<()> {
        let mut next_x = self.axis(pair.x).clone();
        let mut next_y = self.axis(pair.y).clone();
        next_x.set_transformed_bounds(x.0, x.1)?;
        next_y.set_transformed_bounds(y.0, y.1)?;
        self.requested[pair.x.index()] = next_x.range();
        self.requested[pair.y.index()] = next_y.range();
        self.axes[pair.x.index()] = next_x;
        self.axes[pair.y.index()] = next_y;
        self.apply_aspect_lock()
    }

    fn apply_aspect_lock_for(&mut self, changed: AxisId) -> PlotResult<()> {
        if changed == self.active.x || changed == self.active.y {
            self.apply_aspect_lock()
        } else {
            Ok(())
        }
    }

    /// Re-derives the active pair's ranges from the requested ones.
    ///
    /// Whichever axis is the binding constraint keeps its requested span; the
    /// other axis is expanded around its center.
    fn apply_aspect_lock(&mut self) -> PlotResult<()> {
        let AspectLock::Locked { ratio } = self.aspect else {
            return Ok(());
        };
        let pair = self.active;
        let mut x_axis = self.axis(pair.x).clone();
        let mut y_axis = self.axis(pair.y).clone();
        let (rx0, rx1) = self.requested[pair.x.index()];
        let (ry0, ry1) = self.requested[pair.y.index()];
        x_axis.set_range(rx0, rx1)?;
        y_axis.set_range(ry0, ry1)?;
        let (tx0, tx1) = x_axis.transformed_bounds()?;
        let (ty0, ty1) = y_axis.transformed_bounds()?;
        let (x_span, y_span) = (tx1 - tx0, ty1 - ty0);
        let (w, h) = (self.viewport.width_px(), self.viewport.height_px());

        let y_from_x = x_span * ratio * h / w;
        if y_from_x >= y_span {
            let center = (ty0 + ty1) * 0.5;
            y_axis.set_transformed_bounds(center - y_from_x * 0.5, center + y_from_x * 0.5)?;
        } else {
            let x_from_y = y_span * w / (h * ratio);
            let center = (tx0 + tx1) * 0.5;
            x_axis.set_transformed_bounds(center - x_from_y * 0.5, center + x_from_y * 0.5)?;
        }
        self.axes[pair.x.index()] = x_axis;
        self.axes[pair.y.index()] = y_axis;
        Ok(())
    }
}

fn zoomed_bounds(axis: &Axis, anchor_px: f64, length_px: f64, factor: f64) -> PlotResult<(f64, f64)> {
    let (t0, t1) = axis.transformed_bounds()?;
    let anchor = axis.forward(axis.from_device(anchor_px, length_px)?)?;
    Ok((
        anchor - (anchor - t0) / factor,
        anchor + (t1 - anchor) / factor,
    ))
}

fn panned_bounds(axis: &Axis, delta_px: f64, length_px: f64) -> PlotResult<(f64, f64)> {
    let (t0, t1) = axis.transformed_bounds()?;
    let start = axis.forward(axis.from_device(0.0, length_px)?)?;
    let moved = axis.forward(axis.from_device(delta_px, length_px)?)?;
    let shift = start - moved;
    Ok((t0 + shift, t1 + shift))
}

fn padded_range(scale: &AxisScale, min: f64, max: f64, margin_ratio: f64) -> (f64, f64) {
    let margin_ratio = if margin_ratio.is_finite() { margin_ratio.max(0.0) } else { 0.0 };
    match scale {
        AxisScale::Log10 if min > 0.0 && max > 0.0 => {
            let (l0, l1) = (min.log10(), max.log10());
            let span = if l1 > l0 { l1 - l0 } else { 1.0 };
            let pad = span * margin_ratio;
            let (l0, l1) = if l1 > l0 { (l0 - pad, l1 + pad) } else { (l0 - 0.5, l1 + 0.5) };
            (10f64.powf(l0), 10f64.powf(l1))
        }
        _ => {
            let span = max - min;
            if span > 0.0 {
                let pad = span * margin_ratio;
                (min - pad, max + pad)
            } else {
                let pad = if min == 0.0 { 0.5 } else { min.abs() * 0.5 };
                (min - pad, max + pad)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AspectLock, CoordinateSystem};
    use crate::core::{AxisId, AxisScale, AxisPair, DataPoint, DataRect, DevicePoint, Viewport};

    fn system(width: u32, height: u32) -> CoordinateSystem {
        CoordinateSystem::new(Viewport::new(width, height)).expect("coordinate system")
    }

    #[test]
    fn inverted_range_is_rejected_and_state_kept() {
        let mut coords = system(100, 100);
        coords.set_axis_range(AxisId::XBottom, 0.0, 10.0).expect("range");
        assert!(coords.set_axis_range(AxisId::XBottom, 5.0, 1.0).is_err());
        assert!(coords.set_axis_range(AxisId::XBottom, 3.0, 3.0).is_err());
        assert_eq!(coords.axis_range(AxisId::XBottom), (0.0, 10.0));
    }

    #[test]
    fn failed_scale_change_under_aspect_lock_is_rolled_back() {
        let mut coords = system(100, 100);
        coords.set_axis_range(AxisId::XBottom, 1.0, 1.0e6).expect("x range");
        coords.set_axis_scale(AxisId::XBottom, AxisScale::Log10).expect("log x");
        coords.set_axis_range(AxisId::YLeft, 1.0, 10.0).expect("y range");
        coords.set_axis_scale(AxisId::YLeft, AxisScale::Log10).expect("log y");
        coords
            .set_aspect_lock(AspectLock::Locked { ratio: 1.0 })
            .expect("lock");
        let x_before = coords.axis_range(AxisId::XBottom);
        let y_before = coords.axis_range(AxisId::YLeft);

        // A linear x span of ~1e6 would need y to cover ~1e6 decades.
        assert!(coords.set_axis_scale(AxisId::XBottom, AxisScale::Linear).is_err());
        assert_eq!(coords.axis(AxisId::XBottom).scale(), &AxisScale::Log10);
        assert_eq!(coords.axis_range(AxisId::XBottom), x_before);
        assert_eq!(coords.axis_range(AxisId::YLeft), y_before);
    }

    #[test]
    fn pan_moves_content_with_pointer() {
        let mut coords = system(100, 100);
        let pair = AxisPair::default();
        coords.set_axis_range(AxisId::XBottom, 0.0, 100.0).expect("x");
        coords.pan_by_pixels(pair, 10.0, 0.0).expect("pan");
        let (x0, x1) = coords.axis_range(AxisId::XBottom);
        assert!((x0 + 10.0).abs() < 1e-9);
        assert!((x1 - 90.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut coords = system(200, 100);
        let pair = AxisPair::default();
        coords.set_axis_range(AxisId::XBottom, 0.0, 100.0).expect("x");
        coords.set_axis_range(AxisId::YLeft, 0.0, 50.0).expect("y");
        let anchor = DevicePoint::new(50.0, 25.0);
        let before = coords.device_to_data(pair, anchor).expect("before");
        coords.zoom_around(pair, 2.0, anchor).expect("zoom");
        let after = coords.device_to_data(pair, anchor).expect("after");
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
        let (x0, x1) = coords.axis_range(AxisId::XBottom);
        assert!(((x1 - x0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn aspect_lock_expands_the_looser_axis() {
        let mut coords = system(200, 100);
        coords.set_axis_range(AxisId::XBottom, 0.0, 10.0).expect("x");
        coords.set_axis_range(AxisId::YLeft, 0.0, 10.0).expect("y");
        coords
            .set_aspect_lock(AspectLock::Locked { ratio: 1.0 })
            .expect("lock");
        // 200x100 px with equal units per pixel: x must cover twice the y span.
        let (x0, x1) = coords.axis_range(AxisId::XBottom);
        let (y0, y1) = coords.axis_range(AxisId::YLeft);
        assert!(((x1 - x0) - 20.0).abs() < 1e-9);
        assert!(((y1 - y0) - 10.0).abs() < 1e-9);
        assert!((x0 + 5.0).abs() < 1e-9);
    }

    #[test]
    fn fit_to_flat_rect_pads_degenerate_extent() {
        let mut coords = system(100, 100);
        coords
            .fit_to_rect(AxisPair::default(), DataRect::new(0.0, 2.0, 3.0, 3.0), 0.0)
            .expect("fit");
        assert_eq!(coords.axis_range(AxisId::XBottom), (0.0, 2.0));
        let (y0, y1) = coords.axis_range(AxisId::YLeft);
        assert!(y0 < 3.0 && y1 > 3.0);
        let center = coords
            .data_to_device(AxisPair::default(), DataPoint::new(1.0, 3.0))
            .expect("center");
        assert!((center.x - 50.0).abs() < 1e-9);
        assert!((center.y - 50.0).abs() < 1e-9);
    }
}
