//! Planar helpers shared by hit-testing and shape rendering.

use crate::core::{DataPoint, DevicePoint};

/// Distance from `p` to the segment `[a, b]`.
#[must_use]
pub fn segment_distance(p: DevicePoint, a: DevicePoint, b: DevicePoint) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance_to(DevicePoint::new(a.x + t * dx, a.y + t * dy))
}

/// Distance to the nearest edge of an open polyline (closed when `closed`).
#[must_use]
pub fn polyline_distance(p: DevicePoint, points: &[DevicePoint], closed: bool) -> f64 {
    match points {
        [] => f64::INFINITY,
        [single] => p.distance_to(*single),
        _ => {
            let open = points
                .windows(2)
                .map(|w| segment_distance(p, w[0], w[1]))
                .fold(f64::INFINITY, f64::min);
            if closed {
                open.min(segment_distance(p, points[points.len() - 1], points[0]))
            } else {
                open
            }
        }
    }
}

/// Even-odd point-in-polygon test.
#[must_use]
pub fn polygon_contains(p: DevicePoint, points: &[DevicePoint]) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (a, b) = (points[i], points[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Outline of an ellipse in data space, `segments` vertices, not closed.
#[must_use]
pub fn ellipse_outline(center: DataPoint, semi_a: f64, semi_b: f64, angle: f64, segments: usize) -> Vec<DataPoint> {
    let (sin, cos) = angle.sin_cos();
    (0..segments.max(8))
        .map(|i| {
            let t = std::f64::consts::TAU * i as f64 / segments.max(8) as f64;
            let (x, y) = (semi_a * t.cos(), semi_b * t.sin());
            DataPoint::new(center.x + x * cos - y * sin, center.y + x * sin + y * cos)
        })
        .collect()
}

/// Unsigned polygon area in data units (shoelace).
#[must_use]
pub fn polygon_area(points: &[DataPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice.abs() * 0.5
}

#[cfg(test)]
mod tests {
    use super::{polygon_area, polygon_contains, segment_distance};
    use crate::core::{DataPoint, DevicePoint};

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = DevicePoint::new(0.0, 0.0);
        let b = DevicePoint::new(10.0, 0.0);
        assert_eq!(segment_distance(DevicePoint::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(segment_distance(DevicePoint::new(13.0, 4.0), a, b), 5.0);
    }

    #[test]
    fn triangle_contains_centroid_only() {
        let triangle = [
            DevicePoint::new(0.0, 0.0),
            DevicePoint::new(10.0, 0.0),
            DevicePoint::new(0.0, 10.0),
        ];
        assert!(polygon_contains(DevicePoint::new(3.0, 3.0), &triangle));
        assert!(!polygon_contains(DevicePoint::new(8.0, 8.0), &triangle));
    }

    #[test]
    fn unit_square_area() {
        let square = [
            DataPoint::new(0.0, 0.0),
            DataPoint::new(1.0, 0.0),
            DataPoint::new(1.0, 1.0),
            DataPoint::new(0.0, 1.0),
        ];
        assert!((polygon_area(&square) - 1.0).abs() < 1e-12);
    }
}
