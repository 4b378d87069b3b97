use resvg::tiny_skia::{
    FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Stroke, Transform,
};

use crate::images::{BitmapDescriptor, MarkerError, VectorIcon};
use crate::models::{Color, IconParameters};

/// Width of the circle outline drawn around the background, also the inset of
/// its radius.
pub const BACKGROUND_STROKE_WIDTH: f32 = 3.0;

/// Surface size for a marker: explicit dimensions win, otherwise the icon's
/// intrinsic size plus padding. Each axis is resolved independently.
pub fn marker_size(icon: &VectorIcon, params: &IconParameters) -> (u32, u32) {
    let padding = params.effective_padding();
    (
        params.width.unwrap_or(icon.width().saturating_add(padding)),
        params.height.unwrap_or(icon.height().saturating_add(padding)),
    )
}

// Render a vector icon into a marker bitmap
pub fn render_marker(
    icon: &VectorIcon,
    params: &IconParameters,
) -> Result<BitmapDescriptor, MarkerError> {
    let half_padding = params.effective_padding() / 2;
    let (width, height) = marker_size(icon, params);

    let mut surface = Pixmap::new(width, height).ok_or(MarkerError::Surface { width, height })?;

    if let Some(background) = params.background_color {
        draw_background(&mut surface, background, params.background_alpha);
    }

    let inner_width = width.saturating_sub(2 * half_padding);
    let inner_height = height.saturating_sub(2 * half_padding);

    // an empty inner area (padding eats the whole surface) skips the icon
    if let Some(mut glyph) = Pixmap::new(inner_width, inner_height) {
        let transform = Transform::from_scale(
            inner_width as f32 / icon.tree().size().width(),
            inner_height as f32 / icon.tree().size().height(),
        );
        resvg::render(icon.tree(), transform, &mut glyph.as_mut());
        tint(&mut glyph, params.icon_color);

        surface.draw_pixmap(
            half_padding as i32,
            half_padding as i32,
            glyph.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    BitmapDescriptor::from_pixmap(&surface)
}

// Filled disc at the configured opacity, then an outline in the color's own alpha
fn draw_background(surface: &mut Pixmap, color: Color, fill_alpha: u8) {
    let cx = surface.width() as f32 / 2.0;
    let cy = surface.height() as f32 / 2.0;
    let radius = surface.width() as f32 / 2.0;

    if let Some(circle) = PathBuilder::from_circle(cx, cy, radius) {
        let paint = solid_paint(color.with_alpha(fill_alpha));
        surface.fill_path(
            &circle,
            &paint,
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }

    if let Some(outline) = PathBuilder::from_circle(cx, cy, radius - BACKGROUND_STROKE_WIDTH) {
        let paint = solid_paint(color);
        let stroke = Stroke {
            width: BACKGROUND_STROKE_WIDTH,
            ..Stroke::default()
        };
        surface.stroke_path(&outline, &paint, &stroke, Transform::identity(), None);
    }
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.red(), color.green(), color.blue(), color.alpha());
    paint.anti_alias = true;
    paint
}

/// Source-in tint: every pixel takes `color`, keeping the icon's coverage as
/// a mask on the tint's alpha.
pub fn tint(pixmap: &mut Pixmap, color: Color) {
    for pixel in pixmap.pixels_mut() {
        let coverage = pixel.alpha();
        let alpha = mul_div_255(color.alpha(), coverage);

        *pixel = PremultipliedColorU8::from_rgba(
            mul_div_255(color.red(), alpha),
            mul_div_255(color.green(), alpha),
            mul_div_255(color.blue(), alpha),
            alpha,
        )
        .unwrap_or(PremultipliedColorU8::TRANSPARENT);
    }
}

fn mul_div_255(a: u8, b: u8) -> u8 {
    ((a as u32 * b as u32 + 127) / 255) as u8
}
