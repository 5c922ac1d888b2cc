//! Render-time affine placement of image pixels in data space.

use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};

use crate::core::{DataPoint, DataRect};
use crate::error::{PlotError, PlotResult};

/// Rotation, per-pixel scale, translation and flips of an image.
///
/// The transform maps pixel coordinates `(col, row)` (pixel `(0, 0)` spans
/// `[0, 1) x [0, 1)`) to data space. Rotation and flips are applied around the
/// image center, which lands on `center`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    pub center: DataPoint,
    /// Counter-clockwise rotation in radians.
    pub angle: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    #[serde(default)]
    pub flip_horizontal: bool,
    #[serde(default)]
    pub flip_vertical: bool,
}

impl ImageTransform {
    #[must_use]
    pub fn centered_at(center: DataPoint) -> Self {
        Self {
            center,
            angle: 0.0,
            pixel_width: 1.0,
            pixel_height: 1.0,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }

    #[must_use]
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    #[must_use]
    pub fn with_pixel_size(mut self, width: f64, height: f64) -> Self {
        self.pixel_width = width;
        self.pixel_height = height;
        self
    }

    #[must_use]
    pub fn with_flips(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    pub fn validate(&self) -> PlotResult<()> {
        let finite = self.center.is_finite()
            && self.angle.is_finite()
            && self.pixel_width.is_finite()
            && self.pixel_height.is_finite();
        if !finite || self.pixel_width <= 0.0 || self.pixel_height <= 0.0 {
            return Err(PlotError::InvalidData(
                "image transform must be finite with positive pixel size".to_owned(),
            ));
        }
        Ok(())
    }

    /// Pixel -> data matrix for an image of `cols x rows` pixels.
    #[must_use]
    pub fn matrix(&self, cols: usize, rows: usize) -> DAffine2 {
        let sx = if self.flip_horizontal { -self.pixel_width } else { self.pixel_width };
        let sy = if self.flip_vertical { -self.pixel_height } else { self.pixel_height };
        let half = DVec2::new(cols as f64 * 0.5, rows as f64 * 0.5);
        DAffine2::from_scale_angle_translation(
            DVec2::new(sx, sy),
            self.angle,
            DVec2::new(self.center.x, self.center.y),
        ) * DAffine2::from_translation(-half)
    }

    #[must_use]
    pub fn pixel_to_data(&self, cols: usize, rows: usize, col: f64, row: f64) -> DataPoint {
        let p = self.matrix(cols, rows).transform_point2(DVec2::new(col, row));
        DataPoint::new(p.x, p.y)
    }

    /// Data -> fractional pixel coordinates `(col, row)`.
    #[must_use]
    pub fn data_to_pixel(&self, cols: usize, rows: usize, point: DataPoint) -> (f64, f64) {
        let p = self
            .matrix(cols, rows)
            .inverse()
            .transform_point2(DVec2::new(point.x, point.y));
        (p.x, p.y)
    }

    /// Data-space bounding box of the transformed image.
    #[must_use]
    pub fn bounding_rect(&self, cols: usize, rows: usize) -> DataRect {
        let (w, h) = (cols as f64, rows as f64);
        let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]
            .map(|(c, r)| self.pixel_to_data(cols, rows, c, r));
        DataRect::enclosing(corners).unwrap_or(DataRect::new(
            self.center.x,
            self.center.x,
            self.center.y,
            self.center.y,
        ))
    }

    #[must_use]
    pub fn translated(mut self, dx: f64, dy: f64) -> Self {
        self.center = self.center.offset(dx, dy);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::ImageTransform;
    use crate::core::DataPoint;

    #[test]
    fn identity_like_transform_centers_image() {
        let transform = ImageTransform::centered_at(DataPoint::new(5.0, 5.0));
        let origin = transform.pixel_to_data(10, 10, 0.0, 0.0);
        assert!((origin.x - 0.0).abs() < 1e-12 && (origin.y - 0.0).abs() < 1e-12);
    }

    #[test]
    fn rotation_round_trips_through_inverse() {
        let transform = ImageTransform::centered_at(DataPoint::new(1.0, -2.0))
            .with_angle(FRAC_PI_2)
            .with_pixel_size(0.5, 2.0)
            .with_flips(true, false);
        let data = transform.pixel_to_data(8, 4, 3.25, 1.5);
        let (col, row) = transform.data_to_pixel(8, 4, data);
        assert!((col - 3.25).abs() < 1e-9);
        assert!((row - 1.5).abs() < 1e-9);
    }

    #[test]
    fn quarter_turn_swaps_bounding_extent() {
        let transform = ImageTransform::centered_at(DataPoint::new(0.0, 0.0)).with_angle(FRAC_PI_2);
        let rect = transform.bounding_rect(4, 2);
        assert!((rect.width() - 2.0).abs() < 1e-9);
        assert!((rect.height() - 4.0).abs() < 1e-9);
    }
}
