//! Freehand raster layer.
//!
//! Strokes are stored in base units and drawn through a uniform
//! base-to-pixel scale. The layer keeps no stroke state of its own: every
//! [`RasterLayer::render_paths`] call repaints from the given paths.

use crate::renderer::{new_pixmap, pixmap_to_raster, solid_paint, stroke};
use kurbo::{Affine, Point};
use pagemark_core::drawing::{CapturedStroke, smooth_path};
use pagemark_core::{
    DrawingPath, DrawingTool, RasterImage, SerializableColor, StrokePoint, SurfaceSizes,
};
use tiny_skia::{Color, Pixmap};

/// Preview color of an eraser stroke in progress.
const ERASER_PREVIEW: SerializableColor = SerializableColor::new(0xa0, 0xae, 0xc0, 0x80);

/// The freehand drawing surface of one page.
#[derive(Debug, Default)]
pub struct RasterLayer {
    pixmap: Option<Pixmap>,
    /// Base units to physical pixels.
    pixels_per_unit: f64,
}

impl RasterLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A layer with a surface of the given pixel size.
    pub fn with_size(width: u32, height: u32, pixels_per_unit: f64) -> Self {
        let mut layer = Self::new();
        layer.resize_pixels(width, height, pixels_per_unit);
        layer
    }

    /// Match the page surfaces. The surface is cleared.
    pub fn resize(&mut self, sizes: SurfaceSizes, pixels_per_unit: f64) {
        self.resize_pixels(sizes.physical.0, sizes.physical.1, pixels_per_unit);
    }

    fn resize_pixels(&mut self, width: u32, height: u32, pixels_per_unit: f64) {
        self.pixels_per_unit = pixels_per_unit;
        match new_pixmap(width, height) {
            Ok(pixmap) => self.pixmap = Some(pixmap),
            Err(e) => {
                log::warn!("Drawing surface unavailable: {e}");
                self.pixmap = None;
            }
        }
    }

    /// Drop the surface. Drawing becomes a no-op until the next resize.
    pub fn release(&mut self) {
        self.pixmap = None;
    }

    pub fn has_surface(&self) -> bool {
        self.pixmap.is_some()
    }

    pub fn pixels_per_unit(&self) -> f64 {
        self.pixels_per_unit
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Copy of the current pixels.
    pub fn snapshot(&self) -> Option<RasterImage> {
        self.pixmap.as_ref().map(pixmap_to_raster)
    }

    fn transform(&self) -> Affine {
        Affine::scale(self.pixels_per_unit)
    }

    /// Clear and redraw `paths` in order, later paths on top.
    pub fn render_paths(&mut self, paths: &[DrawingPath]) {
        let transform = self.transform();
        let ppu = self.pixels_per_unit;
        let Some(pixmap) = self.pixmap.as_mut() else {
            log::warn!("Skipping render of {} path(s): no drawing surface", paths.len());
            return;
        };
        pixmap.fill(Color::TRANSPARENT);
        for path in paths.iter().filter(|p| p.tool.persists()) {
            let (color, width) = (path.color, path.line_width);
            draw_stroke(pixmap, &path.points, path.tool, color, width, transform, ppu);
        }
    }

    /// Draw the stroke being captured on top of the current contents.
    pub fn draw_live_stroke(&mut self, live: &CapturedStroke) {
        let transform = self.transform();
        let ppu = self.pixels_per_unit;
        let Some(pixmap) = self.pixmap.as_mut() else {
            log::warn!("Skipping live stroke: no drawing surface");
            return;
        };
        let color = match live.tool {
            DrawingTool::Eraser => ERASER_PREVIEW,
            _ => live.color,
        };
        draw_stroke(pixmap, &live.points, live.tool, color, live.line_width, transform, ppu);
    }
}

fn draw_stroke(
    pixmap: &mut Pixmap,
    points: &[StrokePoint],
    tool: DrawingTool,
    color: SerializableColor,
    line_width: f64,
    transform: Affine,
    pixels_per_unit: f64,
) {
    let points: Vec<Point> = points.iter().map(StrokePoint::point).collect();
    let path = smooth_path(&points);
    let paint = solid_paint(color, tool.opacity());
    stroke(pixmap, &path, transform, &paint, line_width * pixels_per_unit);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(tool: DrawingTool, color: SerializableColor, points: &[(f64, f64)]) -> DrawingPath {
        DrawingPath::new(
            tool,
            color,
            4.0,
            points.iter().map(|&(x, y)| StrokePoint::new(x, y)).collect(),
            1,
        )
    }

    fn pixel(layer: &RasterLayer, x: u32, y: u32) -> tiny_skia::PremultipliedColorU8 {
        layer.pixmap().unwrap().pixel(x, y).unwrap()
    }

    #[test]
    fn test_render_draws_at_scale() {
        let mut layer = RasterLayer::with_size(100, 100, 2.0);
        let red = SerializableColor::new(255, 0, 0, 255);
        layer.render_paths(&[path(DrawingTool::Pencil, red, &[(5.0, 25.0), (45.0, 25.0)])]);

        // y = 25 base is y = 50 in pixels.
        let on = pixel(&layer, 50, 50);
        assert_eq!((on.red(), on.alpha()), (255, 255));
        assert_eq!(pixel(&layer, 50, 20).alpha(), 0);
    }

    #[test]
    fn test_later_paths_draw_on_top() {
        let mut layer = RasterLayer::with_size(50, 50, 1.0);
        let red = SerializableColor::new(255, 0, 0, 255);
        let blue = SerializableColor::new(0, 0, 255, 255);
        layer.render_paths(&[
            path(DrawingTool::Pencil, red, &[(0.0, 25.0), (50.0, 25.0)]),
            path(DrawingTool::Pencil, blue, &[(25.0, 0.0), (25.0, 50.0)]),
        ]);
        let cross = pixel(&layer, 25, 25);
        assert_eq!((cross.red(), cross.blue()), (0, 255));
    }

    #[test]
    fn test_highlight_is_translucent_and_eraser_skipped() {
        let mut layer = RasterLayer::with_size(50, 50, 1.0);
        let yellow = SerializableColor::new(255, 255, 0, 255);
        layer.render_paths(&[
            path(DrawingTool::Highlight, yellow, &[(0.0, 10.0), (50.0, 10.0)]),
            path(DrawingTool::Eraser, SerializableColor::black(), &[(0.0, 40.0), (50.0, 40.0)]),
        ]);
        assert!((pixel(&layer, 25, 10).alpha() as i32 - 102).abs() <= 1);
        assert_eq!(pixel(&layer, 25, 40).alpha(), 0);
    }

    #[test]
    fn test_rerender_is_pixel_identical() {
        let mut layer = RasterLayer::with_size(80, 60, 1.5);
        let paths = vec![
            path(
                DrawingTool::Pencil,
                SerializableColor::from_hex("#2D3748").unwrap(),
                &[(3.0, 4.0), (10.0, 18.0), (22.0, 9.0), (30.0, 30.0), (41.0, 12.0)],
            ),
            path(
                DrawingTool::Highlight,
                SerializableColor::new(255, 235, 59, 255),
                &[(0.0, 20.0), (50.0, 22.0)],
            ),
        ];
        layer.render_paths(&paths);
        let first = layer.snapshot().unwrap();
        layer.render_paths(&paths);
        assert_eq!(layer.snapshot().unwrap(), first);
    }

    #[test]
    fn test_render_clears_previous_contents() {
        let mut layer = RasterLayer::with_size(40, 40, 1.0);
        let red = SerializableColor::new(255, 0, 0, 255);
        layer.render_paths(&[path(DrawingTool::Pencil, red, &[(0.0, 20.0), (40.0, 20.0)])]);
        layer.render_paths(&[]);
        assert!(layer.pixmap().unwrap().data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_missing_surface_is_noop() {
        let mut layer = RasterLayer::new();
        assert!(!layer.has_surface());
        let dot = path(DrawingTool::Pencil, SerializableColor::black(), &[(0.0, 0.0), (5.0, 5.0)]);
        layer.render_paths(&[dot]);
        assert!(layer.snapshot().is_none());

        let mut sized = RasterLayer::with_size(0, 10, 1.0);
        assert!(!sized.has_surface());
        sized.release();
    }

    #[test]
    fn test_live_stroke_draws_over_contents() {
        let mut layer = RasterLayer::with_size(40, 40, 1.0);
        layer.render_paths(&[]);
        let live = CapturedStroke {
            tool: DrawingTool::Eraser,
            color: SerializableColor::transparent(),
            line_width: 6.0,
            points: vec![StrokePoint::new(0.0, 20.0), StrokePoint::new(40.0, 20.0)],
        };
        layer.draw_live_stroke(&live);
        assert!(pixel(&layer, 20, 20).alpha() > 0);
    }
}
