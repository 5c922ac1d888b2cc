//! Software rasterizer behind the RGBA export path.
//!
//! Coverage is sampled at pixel centers without anti-aliasing. Text glyphs
//! need a font backend (see the `cairo-backend` feature); only text
//! backgrounds are painted here.

use crate::core::{Color, DevicePoint, DeviceRect};
use crate::error::{PlotError, PlotResult};
use crate::render::{
    ImageTile, ItemLayer, MarkerPrimitive, MarkerShape, PathPrimitive, RectPrimitive, RenderFrame,
    Renderer, StrokeStyle, TextHAlign, TextVAlign,
};

/// Row-major RGBA8 raster, top row first, straight alpha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    #[must_use]
    pub fn new(width: u32, height: u32, fill: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&fill);
        }
        Self { width, height, pixels }
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    fn blend(&mut self, x: i64, y: i64, rgba: [u8; 4], opacity: f64) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let alpha = f64::from(rgba[3]) / 255.0 * opacity.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let Some(dst) = self.pixels.get_mut(offset..offset + 4) else {
            return;
        };
        let dst_alpha = f64::from(dst[3]) / 255.0;
        let out_alpha = alpha + dst_alpha * (1.0 - alpha);
        for channel in 0..3 {
            let src = f64::from(rgba[channel]);
            let under = f64::from(dst[channel]);
            let value = if out_alpha > 0.0 {
                (src * alpha + under * dst_alpha * (1.0 - alpha)) / out_alpha
            } else {
                0.0
            };
            dst[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    fn blend_color(&mut self, x: i64, y: i64, color: Color) {
        self.blend(x, y, color.to_rgba8(), 1.0);
    }
}

/// Renders frames into an owned [`RgbaImage`].
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    image: RgbaImage,
}

impl RasterRenderer {
    pub fn new(width: u32, height: u32) -> PlotResult<Self> {
        if width == 0 || height == 0 {
            return Err(PlotError::InvalidViewport { width, height });
        }
        Ok(Self {
            image: RgbaImage::new(width, height, [0, 0, 0, 0]),
        })
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn draw_layer(&mut self, layer: &ItemLayer) {
        for tile in &layer.images {
            self.draw_tile(tile);
        }
        for rect in &layer.rects {
            self.draw_rect(rect);
        }
        for path in &layer.paths {
            self.draw_path(path);
        }
        for line in &layer.lines {
            self.stroke_segment(line.from, line.to, line.stroke);
        }
        for marker in &layer.markers {
            self.draw_marker(marker);
        }
        for text in &layer.texts {
            let Some(background) = text.background else {
                continue;
            };
            let (w, h) = text.estimated_size();
            let x = match text.h_align {
                TextHAlign::Left => text.position.x,
                TextHAlign::Center => text.position.x - w * 0.5,
                TextHAlign::Right => text.position.x - w,
            };
            let y = match text.v_align {
                TextVAlign::Top => text.position.y,
                TextVAlign::Middle => text.position.y - h * 0.5,
                TextVAlign::Bottom => text.position.y - h,
            };
            self.fill_rect(DeviceRect::new(x, y, w, h), background);
        }
    }

    fn draw_tile(&mut self, tile: &ImageTile) {
        let Some((x0, y0, x1, y1)) = self.pixel_span(tile.dest) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                if let Some(rgba) = tile.sample_device(x as f64 + 0.5, y as f64 + 0.5) {
                    self.image.blend(x, y, rgba, tile.alpha);
                }
            }
        }
    }

    /// Pixel index range whose centers fall inside `rect`, clipped to the raster.
    fn pixel_span(&self, rect: DeviceRect) -> Option<(i64, i64, i64, i64)> {
        let x0 = ((rect.x - 0.5).ceil() as i64).max(0);
        let y0 = ((rect.y - 0.5).ceil() as i64).max(0);
        let x1 = ((rect.right() - 0.5).ceil() as i64).min(i64::from(self.image.width));
        let y1 = ((rect.bottom() - 0.5).ceil() as i64).min(i64::from(self.image.height));
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn fill_rect(&mut self, rect: DeviceRect, color: Color) {
        let Some((x0, y0, x1, y1)) = self.pixel_span(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.blend_color(x, y, color);
            }
        }
    }

    fn draw_rect(&mut self, rect: &RectPrimitive) {
        if let Some(fill) = rect.fill {
            self.fill_rect(rect.rect, fill);
        }
        if let Some(stroke) = rect.stroke {
            let r = rect.rect;
            let corners = [
                DevicePoint::new(r.x, r.y),
                DevicePoint::new(r.right(), r.y),
                DevicePoint::new(r.right(), r.bottom()),
                DevicePoint::new(r.x, r.bottom()),
            ];
            self.stroke_polyline(&corners, true, stroke);
        }
    }

    fn draw_path(&mut self, path: &PathPrimitive) {
        if let Some(fill) = path.fill {
            self.fill_polygon(&path.points, fill);
        }
        if let Some(stroke) = path.stroke {
            self.stroke_polyline(&path.points, path.closed, stroke);
        }
    }

    /// Even-odd scanline fill.
    fn fill_polygon(&mut self, points: &[DevicePoint], color: Color) {
        if points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let y0 = ((min_y - 0.5).ceil() as i64).max(0);
        let y1 = ((max_y - 0.5).ceil() as i64).min(i64::from(self.image.height));
        let mut crossings: Vec<f64> = Vec::new();
        for y in y0..y1 {
            let scan = y as f64 + 0.5;
            crossings.clear();
            for (i, a) in points.iter().enumerate() {
                let b = points[(i + 1) % points.len()];
                if (a.y <= scan) != (b.y <= scan) {
                    crossings.push(a.x + (scan - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
            crossings.sort_by(f64::total_cmp);
            for pair in crossings.chunks_exact(2) {
                let x0 = ((pair[0] - 0.5).ceil() as i64).max(0);
                let x1 = ((pair[1] - 0.5).ceil() as i64).min(i64::from(self.image.width));
                for x in x0..x1 {
                    self.image.blend_color(x, y, color);
                }
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[DevicePoint], closed: bool, stroke: StrokeStyle) {
        for pair in points.windows(2) {
            self.stroke_segment(pair[0], pair[1], stroke);
        }
        if closed && points.len() > 2 {
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                self.stroke_segment(*last, *first, stroke);
            }
        }
    }

    fn stroke_segment(&mut self, from: DevicePoint, to: DevicePoint, stroke: StrokeStyle) {
        let pattern = stroke.dash.pattern();
        if pattern.is_empty() {
            self.stroke_solid(from, to, stroke.width, stroke.color);
            return;
        }
        let length = from.distance_to(to);
        if length <= f64::EPSILON {
            return;
        }
        let (mut travelled, mut index, mut on) = (0.0, 0, true);
        while travelled < length {
            let step = pattern[index % pattern.len()] * stroke.width.max(1.0);
            let end = (travelled + step).min(length);
            if on {
                let a = lerp(from, to, travelled / length);
                let b = lerp(from, to, end / length);
                self.stroke_solid(a, b, stroke.width, stroke.color);
            }
            travelled = end;
            index += 1;
            on = !on;
        }
    }

    fn stroke_solid(&mut self, from: DevicePoint, to: DevicePoint, width: f64, color: Color) {
        let half = (width * 0.5).max(0.5);
        let x0 = ((from.x.min(to.x) - half).floor() as i64).max(0);
        let y0 = ((from.y.min(to.y) - half).floor() as i64).max(0);
        let x1 = ((from.x.max(to.x) + half).ceil() as i64).min(i64::from(self.image.width));
        let y1 = ((from.y.max(to.y) + half).ceil() as i64).min(i64::from(self.image.height));
        for y in y0..y1 {
            for x in x0..x1 {
                let center = DevicePoint::new(x as f64 + 0.5, y as f64 + 0.5);
                if crate::core::geometry::segment_distance(center, from, to) <= half {
                    self.image.blend_color(x, y, color);
                }
            }
        }
    }

    fn draw_marker(&mut self, marker: &MarkerPrimitive) {
        let c = marker.center;
        let r = marker.size_px * 0.5;
        let outline: Vec<DevicePoint> = match marker.shape {
            MarkerShape::None => return,
            MarkerShape::Circle => (0..16)
                .map(|i| {
                    let t = std::f64::consts::TAU * f64::from(i) / 16.0;
                    DevicePoint::new(c.x + r * t.cos(), c.y + r * t.sin())
                })
                .collect(),
            MarkerShape::Square => vec![
                DevicePoint::new(c.x - r, c.y - r),
                DevicePoint::new(c.x + r, c.y - r),
                DevicePoint::new(c.x + r, c.y + r),
                DevicePoint::new(c.x - r, c.y + r),
            ],
            MarkerShape::Diamond => vec![
                DevicePoint::new(c.x, c.y - r),
                DevicePoint::new(c.x + r, c.y),
                DevicePoint::new(c.x, c.y + r),
                DevicePoint::new(c.x - r, c.y),
            ],
            MarkerShape::TriangleUp => vec![
                DevicePoint::new(c.x, c.y - r),
                DevicePoint::new(c.x + r, c.y + r),
                DevicePoint::new(c.x - r, c.y + r),
            ],
            MarkerShape::Cross | MarkerShape::Plus => {
                let stroke = marker
                    .stroke
                    .or(marker.fill.map(|fill| StrokeStyle::solid(fill, 1.0)));
                let Some(stroke) = stroke else {
                    return;
                };
                let arms = if marker.shape == MarkerShape::Cross {
                    [(-r, -r, r, r), (-r, r, r, -r)]
                } else {
                    [(-r, 0.0, r, 0.0), (0.0, -r, 0.0, r)]
                };
                for (ax, ay, bx, by) in arms {
                    self.stroke_segment(
                        DevicePoint::new(c.x + ax, c.y + ay),
                        DevicePoint::new(c.x + bx, c.y + by),
                        stroke,
                    );
                }
                return;
            }
        };
        if let Some(fill) = marker.fill {
            self.fill_polygon(&outline, fill);
        }
        if let Some(stroke) = marker.stroke {
            self.stroke_polyline(&outline, true, stroke);
        }
    }
}

fn lerp(a: DevicePoint, b: DevicePoint, t: f64) -> DevicePoint {
    DevicePoint::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

impl Renderer for RasterRenderer {
    fn render(&mut self, frame: &RenderFrame) -> PlotResult<()> {
        frame.validate()?;
        self.image = RgbaImage::new(frame.viewport.width, frame.viewport.height, frame.background.to_rgba8());
        for layer in &frame.layers {
            self.draw_layer(layer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RasterRenderer;
    use crate::core::{Color, DevicePoint, DeviceRect, Viewport};
    use crate::render::{ItemLayer, LinePrimitive, RectPrimitive, RenderFrame, Renderer, StrokeStyle};

    #[test]
    fn rect_fill_covers_pixel_centers() {
        let mut layer = ItemLayer::new(None);
        layer.rects.push(RectPrimitive::new(
            DeviceRect::new(2.0, 2.0, 3.0, 3.0),
            Some(Color::BLACK),
            None,
        ));
        let frame = RenderFrame::new(Viewport::new(8, 8)).with_layer(layer);
        let mut renderer = RasterRenderer::new(8, 8).expect("renderer");
        renderer.render(&frame).expect("render");
        let image = renderer.image();
        assert_eq!(image.pixel(2, 2), Some([0, 0, 0, 255]));
        assert_eq!(image.pixel(4, 4), Some([0, 0, 0, 255]));
        assert_eq!(image.pixel(5, 5), Some([255, 255, 255, 255]));
    }

    #[test]
    fn horizontal_line_is_one_pixel_thick() {
        let mut layer = ItemLayer::new(None);
        layer.lines.push(LinePrimitive::new(
            DevicePoint::new(0.0, 3.5),
            DevicePoint::new(8.0, 3.5),
            StrokeStyle::solid(Color::BLACK, 1.0),
        ));
        let frame = RenderFrame::new(Viewport::new(8, 8)).with_layer(layer);
        let mut renderer = RasterRenderer::new(8, 8).expect("renderer");
        renderer.render(&frame).expect("render");
        let image = renderer.image();
        assert_eq!(image.pixel(4, 3), Some([0, 0, 0, 255]));
        assert_eq!(image.pixel(4, 1), Some([255, 255, 255, 255]));
    }
}
