//! Render errors and shared tiny-skia helpers.

use kurbo::{Affine, BezPath, PathEl};
use pagemark_core::{RasterImage, SerializableColor};
use thiserror::Error;
use tiny_skia::{
    FillRule, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform,
};

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("No render target")]
    NoSurface,
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Allocate a transparent pixmap.
pub fn new_pixmap(width: u32, height: u32) -> RenderResult<Pixmap> {
    Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height })
}

/// Convert a kurbo path, transformed into pixel space, to a tiny-skia path.
///
/// Returns `None` for paths tiny-skia cannot represent (empty or non-finite).
pub fn to_skia_path(path: &BezPath, transform: Affine) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match transform * *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

/// Anti-aliased solid paint, with `opacity` folded into the alpha channel.
pub fn solid_paint(color: SerializableColor, opacity: f64) -> Paint<'static> {
    let alpha = (color.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, alpha);
    paint.anti_alias = true;
    paint
}

/// Stroke with round caps and joins, `width` in pixels.
pub fn round_stroke(width: f64) -> Stroke {
    Stroke {
        width: width.max(0.0) as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    }
}

pub(crate) fn stroke(
    pixmap: &mut Pixmap,
    path: &BezPath,
    transform: Affine,
    paint: &Paint,
    width: f64,
) {
    if let Some(path) = to_skia_path(path, transform) {
        pixmap.stroke_path(&path, paint, &round_stroke(width), Transform::identity(), None);
    }
}

pub(crate) fn fill(pixmap: &mut Pixmap, path: &BezPath, transform: Affine, paint: &Paint) {
    if let Some(path) = to_skia_path(path, transform) {
        pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
    }
}

/// Copy a pixmap into a core raster image. Both use premultiplied RGBA8.
pub fn pixmap_to_raster(pixmap: &Pixmap) -> RasterImage {
    RasterImage {
        width: pixmap.width(),
        height: pixmap.height(),
        data: pixmap.data().to_vec(),
    }
}

/// Copy a core raster image into a pixmap.
pub fn raster_to_pixmap(image: &RasterImage) -> RenderResult<Pixmap> {
    let invalid = || RenderError::InvalidSize {
        width: image.width,
        height: image.height,
    };
    let size = IntSize::from_wh(image.width, image.height).ok_or_else(invalid)?;
    Pixmap::from_vec(image.data.clone(), size).ok_or_else(invalid)
}
