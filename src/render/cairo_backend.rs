use cairo::{Context, Filter, Format, ImageSurface};
use pango::FontDescription;
use std::f64::consts::TAU;

use crate::core::DevicePoint;
use crate::error::{PlotError, PlotResult};
use crate::render::{
    Color, ImageTile, ItemLayer, MarkerPrimitive, MarkerShape, PathPrimitive, RectPrimitive,
    RenderFrame, Renderer, StrokeStyle, TextHAlign, TextPrimitive, TextVAlign,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CairoRenderStats {
    pub layers_drawn: usize,
    pub images_drawn: usize,
    pub paths_drawn: usize,
    pub texts_drawn: usize,
}

/// Optional extension trait for renderers that can draw into an external Cairo
/// context (for example a toolkit drawing callback).
pub trait CairoContextRenderer {
    fn render_on_cairo_context(&mut self, context: &Context, frame: &RenderFrame) -> PlotResult<()>;
}

/// Cairo + Pango + PangoCairo renderer backend.
///
/// This renderer supports two modes:
/// - offscreen image-surface rendering through `Renderer::render`
/// - in-place rendering on an external Cairo context through
///   `CairoContextRenderer`
#[derive(Debug)]
pub struct CairoRenderer {
    surface: ImageSurface,
    last_stats: CairoRenderStats,
}

impl CairoRenderer {
    pub fn new(width: i32, height: i32) -> PlotResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(PlotError::InvalidViewport {
                width: width.max(0) as u32,
                height: height.max(0) as u32,
            });
        }
        Ok(Self {
            surface: create_surface(width, height)?,
            last_stats: CairoRenderStats::default(),
        })
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        "cairo+pango+pangocairo"
    }

    #[must_use]
    pub fn surface(&self) -> &ImageSurface {
        &self.surface
    }

    #[must_use]
    pub fn last_stats(&self) -> CairoRenderStats {
        self.last_stats
    }

    /// Encodes the last rendered surface as PNG.
    pub fn write_png(&self, out: &mut impl std::io::Write) -> PlotResult<()> {
        self.surface
            .write_to_png(out)
            .map_err(|err| PlotError::Serialization(format!("failed to encode png: {err}")))
    }

    fn render_with_context(&mut self, context: &Context, frame: &RenderFrame) -> PlotResult<()> {
        frame.validate()?;

        apply_color(context, frame.background);
        context
            .paint()
            .map_err(|err| map_backend_error("failed to clear surface", err))?;

        let mut stats = CairoRenderStats::default();
        for layer in &frame.layers {
            draw_layer(context, layer, &mut stats)?;
            stats.layers_drawn += 1;
        }
        self.last_stats = stats;
        Ok(())
    }
}

impl Renderer for CairoRenderer {
    fn render(&mut self, frame: &RenderFrame) -> PlotResult<()> {
        let (width, height) = (frame.viewport.width as i32, frame.viewport.height as i32);
        if self.surface.width() != width || self.surface.height() != height {
            self.surface = create_surface(width, height)?;
        }
        let context = Context::new(&self.surface)
            .map_err(|err| map_backend_error("failed to create cairo context", err))?;
        self.render_with_context(&context, frame)
    }
}

impl CairoContextRenderer for CairoRenderer {
    fn render_on_cairo_context(&mut self, context: &Context, frame: &RenderFrame) -> PlotResult<()> {
        self.render_with_context(context, frame)
    }
}

fn create_surface(width: i32, height: i32) -> PlotResult<ImageSurface> {
    ImageSurface::create(Format::ARgb32, width, height)
        .map_err(|err| map_backend_error("failed to create cairo surface", err))
}

fn draw_layer(context: &Context, layer: &ItemLayer, stats: &mut CairoRenderStats) -> PlotResult<()> {
    for tile in &layer.images {
        draw_tile(context, tile)?;
        stats.images_drawn += 1;
    }
    for rect in &layer.rects {
        draw_rect(context, rect)?;
    }
    for path in &layer.paths {
        draw_path(context, path)?;
        stats.paths_drawn += 1;
    }
    for line in &layer.lines {
        context.move_to(line.from.x, line.from.y);
        context.line_to(line.to.x, line.to.y);
        stroke(context, line.stroke)?;
    }
    for marker in &layer.markers {
        draw_marker(context, marker)?;
    }
    for text in &layer.texts {
        draw_text(context, text)?;
        stats.texts_drawn += 1;
    }
    Ok(())
}

/// Uploads the tile as premultiplied ARGB32 and stretches it into `dest`.
fn draw_tile(context: &Context, tile: &ImageTile) -> PlotResult<()> {
    if tile.width == 0 || tile.height == 0 {
        return Ok(());
    }
    let mut surface = create_surface(tile.width as i32, tile.height as i32)?;
    let stride = surface.stride() as usize;
    {
        let mut data = surface
            .data()
            .map_err(|err| PlotError::InvalidData(format!("cairo surface is borrowed: {err}")))?;
        for (row, src) in tile.pixels.chunks_exact(tile.width * 4).enumerate() {
            let dst = &mut data[row * stride..row * stride + tile.width * 4];
            for (out, px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let a = u32::from(px[3]);
                let premultiply = |c: u8| u32::from(c) * a / 255;
                let argb = (a << 24) | (premultiply(px[0]) << 16) | (premultiply(px[1]) << 8) | premultiply(px[2]);
                out.copy_from_slice(&argb.to_ne_bytes());
            }
        }
    }
    surface.mark_dirty();

    context
        .save()
        .map_err(|err| map_backend_error("failed to save context", err))?;
    context.translate(tile.dest.x, tile.dest.y);
    context.scale(tile.dest.width / tile.width as f64, tile.dest.height / tile.height as f64);
    context
        .set_source_surface(&surface, 0.0, 0.0)
        .map_err(|err| map_backend_error("failed to bind image tile", err))?;
    context.source().set_filter(Filter::Nearest);
    let painted = context.paint_with_alpha(tile.alpha);
    context
        .restore()
        .map_err(|err| map_backend_error("failed to restore context", err))?;
    painted.map_err(|err| map_backend_error("failed to paint image tile", err))
}

fn draw_rect(context: &Context, rect: &RectPrimitive) -> PlotResult<()> {
    context.rectangle(rect.rect.x, rect.rect.y, rect.rect.width, rect.rect.height);
    fill_and_stroke(context, rect.fill, rect.stroke)
}

fn draw_path(context: &Context, path: &PathPrimitive) -> PlotResult<()> {
    append_polyline(context, &path.points, path.closed);
    fill_and_stroke(context, path.fill, path.stroke)
}

fn draw_marker(context: &Context, marker: &MarkerPrimitive) -> PlotResult<()> {
    let c = marker.center;
    let r = marker.size_px * 0.5;
    match marker.shape {
        MarkerShape::None => return Ok(()),
        MarkerShape::Circle => {
            context.new_sub_path();
            context.arc(c.x, c.y, r, 0.0, TAU);
        }
        MarkerShape::Square => context.rectangle(c.x - r, c.y - r, 2.0 * r, 2.0 * r),
        MarkerShape::Diamond => append_polyline(
            context,
            &[
                DevicePoint::new(c.x, c.y - r),
                DevicePoint::new(c.x + r, c.y),
                DevicePoint::new(c.x, c.y + r),
                DevicePoint::new(c.x - r, c.y),
            ],
            true,
        ),
        MarkerShape::TriangleUp => append_polyline(
            context,
            &[
                DevicePoint::new(c.x, c.y - r),
                DevicePoint::new(c.x + r, c.y + r),
                DevicePoint::new(c.x - r, c.y + r),
            ],
            true,
        ),
        MarkerShape::Cross | MarkerShape::Plus => {
            let Some(style) = marker.stroke.or(marker.fill.map(|fill| StrokeStyle::solid(fill, 1.0))) else {
                return Ok(());
            };
            let arms = if marker.shape == MarkerShape::Cross {
                [(-r, -r, r, r), (-r, r, r, -r)]
            } else {
                [(-r, 0.0, r, 0.0), (0.0, -r, 0.0, r)]
            };
            for (ax, ay, bx, by) in arms {
                context.move_to(c.x + ax, c.y + ay);
                context.line_to(c.x + bx, c.y + by);
            }
            return stroke(context, style);
        }
    }
    fill_and_stroke(context, marker.fill, marker.stroke)
}

fn draw_text(context: &Context, text: &TextPrimitive) -> PlotResult<()> {
    let layout = pangocairo::functions::create_layout(context);
    let font_description = FontDescription::from_string(&format!("Sans {}", text.font_size_px));
    layout.set_font_description(Some(&font_description));
    layout.set_text(&text.text);

    let (text_width, text_height) = layout.pixel_size();
    let (w, h) = (f64::from(text_width), f64::from(text_height));
    let x = match text.h_align {
        TextHAlign::Left => text.position.x,
        TextHAlign::Center => text.position.x - w / 2.0,
        TextHAlign::Right => text.position.x - w,
    };
    let y = match text.v_align {
        TextVAlign::Top => text.position.y,
        TextVAlign::Middle => text.position.y - h / 2.0,
        TextVAlign::Bottom => text.position.y - h,
    };

    if let Some(background) = text.background {
        context.rectangle(x, y, w, h);
        apply_color(context, background);
        context
            .fill()
            .map_err(|err| map_backend_error("failed to fill text background", err))?;
    }
    apply_color(context, text.color);
    context.move_to(x, y);
    pangocairo::functions::show_layout(context, &layout);
    Ok(())
}

fn append_polyline(context: &Context, points: &[DevicePoint], closed: bool) {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return;
    };
    context.move_to(first.x, first.y);
    for point in iter {
        context.line_to(point.x, point.y);
    }
    if closed {
        context.close_path();
    }
}

fn fill_and_stroke(context: &Context, fill: Option<Color>, style: Option<StrokeStyle>) -> PlotResult<()> {
    if let Some(fill) = fill {
        apply_color(context, fill);
        context.set_fill_rule(cairo::FillRule::EvenOdd);
        context
            .fill_preserve()
            .map_err(|err| map_backend_error("failed to fill path", err))?;
    }
    match style {
        Some(style) => stroke(context, style),
        None => {
            context.new_path();
            Ok(())
        }
    }
}

fn stroke(context: &Context, style: StrokeStyle) -> PlotResult<()> {
    apply_color(context, style.color);
    context.set_line_width(style.width);
    context.set_dash(style.dash.pattern(), 0.0);
    context
        .stroke()
        .map_err(|err| map_backend_error("failed to stroke path", err))
}

fn apply_color(context: &Context, color: Color) {
    context.set_source_rgba(color.red, color.green, color.blue, color.alpha);
}

fn map_backend_error(prefix: &str, err: cairo::Error) -> PlotError {
    PlotError::InvalidData(format!("{prefix}: {err}"))
}
