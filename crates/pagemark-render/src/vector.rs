//! Built-in vector layer.
//!
//! Mirrors the current page's shapes and the page-anchored annotations that
//! render as vectors, and rasterises them for display and export. Text
//! boxes and notes get their frame and background; their lines of text are
//! drawn as solid bars, one per line, sized from the font size and the
//! line length. Glyphs are left to the text renderer.

use crate::renderer::{fill, new_pixmap, pixmap_to_raster, solid_paint, stroke};
use kurbo::{Affine, BezPath, Circle, Point, Rect, RoundedRect, Shape};
use pagemark_core::annotations::{StampDefinition, StampGlyph};
use pagemark_core::shape_layer::ShapeLayerResult;
use pagemark_core::{
    AnnotationId, ArrowAnnotation, PageAnnotations, PageItem, PageNumber, RasterImage, ShapeEvent,
    SerializableColor, ShapeGeometry, ShapeLayer, ShapeLayerError, ShapeObject, ShapeStyle,
    ShapeTool, StampAnnotation, StickyNote, TextAnnotation,
};
use tiny_skia::Pixmap;

const TOLERANCE: f64 = 0.1;

/// Font size of text created with [`ShapeLayer::add_text`].
pub const DEFAULT_TEXT_SIZE: f64 = 16.0;

/// A tiny-skia backed [`ShapeLayer`].
#[derive(Debug, Default)]
pub struct VectorLayer {
    tool: ShapeTool,
    page: PageNumber,
    pixels_per_unit: f64,
    size: (u32, u32),
    style: ShapeStyle,
    shapes: Vec<ShapeObject>,
    arrows: Vec<ArrowAnnotation>,
    stamps: Vec<StampAnnotation>,
    notes: Vec<StickyNote>,
    texts: Vec<TextAnnotation>,
    events: Vec<ShapeEvent>,
}

impl VectorLayer {
    pub fn new() -> Self {
        Self {
            page: 1,
            pixels_per_unit: 1.0,
            ..Self::default()
        }
    }

    pub fn tool(&self) -> ShapeTool {
        self.tool
    }

    pub fn shapes(&self) -> &[ShapeObject] {
        &self.shapes
    }

    /// Style applied to shapes created from now on.
    pub fn set_style(&mut self, style: ShapeStyle) {
        self.style = style;
    }

    /// Mirror every vector-rendered entity of a page.
    pub fn load_page(&mut self, annotations: &PageAnnotations) {
        self.load_shapes(&annotations.shapes);
        self.arrows = annotations.arrows.clone();
        self.stamps = annotations.stamps.clone();
        self.notes = annotations.notes.clone();
        self.texts = annotations.texts.clone();
    }

    /// Finish drawing a shape with the active tool.
    pub fn commit_shape(&mut self, geometry: ShapeGeometry) -> AnnotationId {
        let shape = ShapeObject::new(self.page, geometry, self.style.clone());
        let id = shape.id();
        self.shapes.push(shape.clone());
        self.events.push(ShapeEvent::Added(shape));
        id
    }

    /// Apply an edit made on the layer (move, restyle, reshape).
    pub fn edit_shape(&mut self, shape: ShapeObject) -> bool {
        let Some(slot) = self.shapes.iter_mut().find(|s| s.id() == shape.id()) else {
            return false;
        };
        *slot = shape.clone();
        self.events.push(ShapeEvent::Updated(shape));
        true
    }

    pub fn remove_shape(&mut self, id: AnnotationId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| s.id() != id);
        if self.shapes.len() == before {
            return false;
        }
        self.events.push(ShapeEvent::Deleted { id, page: self.page });
        true
    }

    fn render_into(&self, pixmap: &mut Pixmap) {
        let view = Affine::scale(self.pixels_per_unit);
        for note in &self.notes {
            draw_note(pixmap, note, view, self.pixels_per_unit);
        }
        for text in &self.texts {
            draw_text_box(pixmap, text, view, self.pixels_per_unit);
        }
        for shape in &self.shapes {
            draw_shape(pixmap, shape, view, self.pixels_per_unit);
        }
        for arrow in &self.arrows {
            draw_arrow(pixmap, arrow, view, self.pixels_per_unit);
        }
        for stamp in &self.stamps {
            draw_stamp(pixmap, stamp, view, self.pixels_per_unit);
        }
    }
}

impl ShapeLayer for VectorLayer {
    fn set_tool(&mut self, tool: ShapeTool) {
        self.tool = tool;
    }

    fn add_text(&mut self, x: f64, y: f64) {
        self.commit_shape(ShapeGeometry::Text {
            x,
            y,
            content: String::new(),
            font_size: DEFAULT_TEXT_SIZE,
        });
    }

    fn set_view(&mut self, page: PageNumber, pixels_per_unit: f64) {
        self.page = page;
        self.pixels_per_unit = pixels_per_unit;
    }

    fn load_shapes(&mut self, shapes: &[ShapeObject]) {
        self.shapes = shapes.to_vec();
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn export_as_canvas(&self) -> ShapeLayerResult<RasterImage> {
        if let Some(bad) = self.shapes.iter().find(|s| !s.geometry.is_well_formed()) {
            return Err(ShapeLayerError::MalformedShape {
                id: bad.id(),
                reason: format!("{:?}", bad.geometry),
            });
        }
        let mut pixmap =
            new_pixmap(self.size.0, self.size.1).map_err(|_| ShapeLayerError::NoSurface)?;
        self.render_into(&mut pixmap);
        Ok(pixmap_to_raster(&pixmap))
    }

    fn drain_events(&mut self) -> Vec<ShapeEvent> {
        std::mem::take(&mut self.events)
    }
}

fn polygon(points: &[Point], closed: bool) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
        if closed {
            path.close_path();
        }
    }
    path
}

fn draw_shape(pixmap: &mut Pixmap, shape: &ShapeObject, view: Affine, ppu: f64) {
    let path = match &shape.geometry {
        ShapeGeometry::Rectangle { .. }
        | ShapeGeometry::Star { .. }
        | ShapeGeometry::Polygon { .. } => polygon(&shape.geometry.vertices(), true),
        ShapeGeometry::Line { .. } => polygon(&shape.geometry.vertices(), false),
        ShapeGeometry::Circle { cx, cy, radius } => {
            Circle::new((*cx, *cy), *radius).to_path(TOLERANCE)
        }
        ShapeGeometry::Text { .. } => return,
    };
    let transform = if shape.rotation == 0.0 {
        view
    } else {
        view * Affine::rotate_about(shape.rotation.to_radians(), shape.bounds().center())
    };

    let style = &shape.style;
    if let Some(fill_color) = style.fill {
        if !matches!(shape.geometry, ShapeGeometry::Line { .. }) {
            fill(pixmap, &path, transform, &solid_paint(fill_color, style.opacity));
        }
    }
    if style.stroke_width > 0.0 {
        let paint = solid_paint(style.stroke, style.opacity);
        stroke(pixmap, &path, transform, &paint, style.stroke_width * ppu);
    }
}

fn draw_arrow(pixmap: &mut Pixmap, arrow: &ArrowAnnotation, view: Affine, ppu: f64) {
    let paint = solid_paint(arrow.stroke, 1.0);
    let shaft = polygon(&[arrow.start(), arrow.end()], false);
    stroke(pixmap, &shaft, view, &paint, arrow.stroke_width * ppu);
    if let Some(head) = arrow.head_points() {
        fill(pixmap, &polygon(&head, true), view, &paint);
    }
}

/// Inner margin of text boxes and notes, in base units.
const TEXT_PADDING: f64 = 4.0;
const LINE_HEIGHT: f64 = 1.2;
/// Average glyph advance as a share of the font size.
const GLYPH_ADVANCE: f64 = 0.5;
const TEXT_BOX_FILL: SerializableColor = SerializableColor::new(0xff, 0xff, 0xff, 0xff);

fn draw_note(pixmap: &mut Pixmap, note: &StickyNote, view: Affine, ppu: f64) {
    let rect = note.rect();
    let path = rect.to_path(TOLERANCE);
    fill(pixmap, &path, view, &solid_paint(note.background_color, 1.0));
    stroke(pixmap, &path, view, &solid_paint(note.color, 0.25), ppu);
    draw_text_lines(pixmap, rect, &note.text, note.font_size, note.color, view);
}

fn draw_text_box(pixmap: &mut Pixmap, text: &TextAnnotation, view: Affine, ppu: f64) {
    let rect = text.rect();
    let path = rect.to_path(TOLERANCE);
    fill(pixmap, &path, view, &solid_paint(TEXT_BOX_FILL, 0.7));
    stroke(pixmap, &path, view, &solid_paint(text.color, 0.6), ppu);
    draw_text_lines(pixmap, rect, &text.text, text.font_size, text.color, view);
}

/// One bar per line of `content`, cut off at the edges of `rect`.
fn draw_text_lines(
    pixmap: &mut Pixmap,
    rect: Rect,
    content: &str,
    font_size: f64,
    color: SerializableColor,
    view: Affine,
) {
    if font_size <= 0.0 {
        return;
    }
    let inner = rect.inset(-TEXT_PADDING);
    let paint = solid_paint(color, 0.8);
    for (i, line) in content.lines().enumerate() {
        let top = inner.y0 + i as f64 * font_size * LINE_HEIGHT + font_size * 0.2;
        let bottom = top + font_size * 0.6;
        if bottom > inner.y1 {
            break;
        }
        let glyphs = line.trim_end().chars().count() as f64;
        let right = (inner.x0 + glyphs * font_size * GLYPH_ADVANCE).min(inner.x1);
        if right <= inner.x0 {
            continue;
        }
        let bar = Rect::new(inner.x0, top, right, bottom).to_path(TOLERANCE);
        fill(pixmap, &bar, view, &paint);
    }
}

/// Stamp outline in a unit square.
fn glyph_path(glyph: StampGlyph) -> BezPath {
    match glyph {
        StampGlyph::Check => polygon(
            &[Point::new(0.2, 0.55), Point::new(0.42, 0.75), Point::new(0.8, 0.28)],
            false,
        ),
        StampGlyph::Cross => {
            let mut path = polygon(&[Point::new(0.22, 0.22), Point::new(0.78, 0.78)], false);
            path.extend(polygon(&[Point::new(0.78, 0.22), Point::new(0.22, 0.78)], false));
            path
        }
        StampGlyph::Star => polygon(&ShapeGeometry::star_vertices(0.5, 0.5, 0.45, 0.2, 5), true),
        StampGlyph::Circle => Circle::new((0.5, 0.5), 0.42).to_path(TOLERANCE / 100.0),
        StampGlyph::Frame => {
            RoundedRect::from_rect(Rect::new(0.08, 0.2, 0.92, 0.8), 0.08).to_path(TOLERANCE / 100.0)
        }
    }
}

fn draw_stamp(pixmap: &mut Pixmap, stamp: &StampAnnotation, view: Affine, ppu: f64) {
    let Some(definition) = StampDefinition::find(&stamp.stamp_id) else {
        log::warn!("Skipping unknown stamp {}", stamp.stamp_id);
        return;
    };
    let transform = view
        * Affine::rotate_about(stamp.rotation.to_radians(), stamp.center())
        * Affine::translate((stamp.x, stamp.y))
        * Affine::scale(stamp.size);
    let paint = solid_paint(definition.color, 1.0);
    stroke(pixmap, &glyph_path(definition.glyph), transform, &paint, stamp.size * 0.08 * ppu);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Size;

    fn red_fill() -> ShapeStyle {
        ShapeStyle {
            stroke: SerializableColor::new(255, 0, 0, 255),
            fill: Some(SerializableColor::new(255, 0, 0, 255)),
            stroke_width: 1.0,
            opacity: 1.0,
        }
    }

    fn layer(width: u32, height: u32, ppu: f64) -> VectorLayer {
        let mut layer = VectorLayer::new();
        layer.set_view(1, ppu);
        layer.resize(width, height);
        layer
    }

    #[test]
    fn test_export_draws_filled_rectangle_at_scale() {
        let mut layer = layer(100, 100, 2.0);
        let square = Rect::new(10.0, 10.0, 30.0, 30.0);
        layer.load_shapes(&[ShapeObject::rectangle(1, square, red_fill())]);
        let image = layer.export_as_canvas().unwrap();
        assert_eq!((image.width, image.height), (100, 100));
        assert_eq!(image.pixel(40, 40), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(90, 90), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_malformed_shape_fails_export() {
        let mut layer = layer(20, 20, 1.0);
        let bad = ShapeObject::new(
            1,
            ShapeGeometry::Circle {
                cx: f64::NAN,
                cy: 0.0,
                radius: 4.0,
            },
            ShapeStyle::default(),
        );
        layer.load_shapes(&[bad]);
        assert!(matches!(layer.export_as_canvas(), Err(ShapeLayerError::MalformedShape { .. })));
    }

    #[test]
    fn test_export_without_size_fails() {
        let layer = VectorLayer::new();
        assert!(matches!(layer.export_as_canvas(), Err(ShapeLayerError::NoSurface)));
    }

    #[test]
    fn test_editing_emits_events() {
        let mut layer = layer(50, 50, 1.0);
        layer.set_view(3, 1.0);
        let id = layer.commit_shape(ShapeGeometry::Line {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
        });
        let mut moved = layer.shapes()[0].clone();
        moved.rotation = 45.0;
        assert!(layer.edit_shape(moved.clone()));
        assert!(layer.remove_shape(id));
        assert!(!layer.remove_shape(id));

        let events = layer.drain_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ShapeEvent::Added(s) if s.page_number == 3));
        assert_eq!(events[1], ShapeEvent::Updated(moved));
        assert_eq!(events[2], ShapeEvent::Deleted { id, page: 3 });
        assert!(layer.drain_events().is_empty());
    }

    #[test]
    fn test_add_text_creates_text_shape() {
        let mut layer = layer(50, 50, 1.0);
        layer.set_tool(ShapeTool::Text);
        layer.add_text(12.0, 8.0);
        assert_eq!(layer.tool(), ShapeTool::Text);
        match &layer.shapes()[0].geometry {
            ShapeGeometry::Text { x, y, font_size, .. } => {
                assert!((x - 12.0).abs() < f64::EPSILON);
                assert!((y - 8.0).abs() < f64::EPSILON);
                assert!((font_size - DEFAULT_TEXT_SIZE).abs() < f64::EPSILON);
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_page_annotations_are_drawn() {
        let mut page = PageAnnotations::new();
        page.notes.push(StickyNote::new(1, Point::new(0.0, 0.0), StickyNote::DEFAULT_SIZE, None));
        let (from, to) = (Point::new(0.0, 250.0), Point::new(200.0, 250.0));
        page.arrows.push(ArrowAnnotation::between(1, from, to, None));
        page.stamps.push(StampAnnotation::new(1, "cross", Point::new(220.0, 0.0), 60.0, None));

        let mut layer = layer(300, 300, 1.0);
        layer.load_page(&page);
        let image = layer.export_as_canvas().unwrap();

        let bg = StickyNote::DEFAULT_BACKGROUND;
        assert_eq!(image.pixel(100, 75), Some([bg.r, bg.g, bg.b, 255]));
        assert_eq!(image.pixel(100, 250).map(|p| p[3]), Some(255));
        // Center of the cross stamp.
        assert_eq!(image.pixel(250, 30).map(|p| p[3]), Some(255));
    }

    #[test]
    fn test_text_box_draws_background_and_lines() {
        let red = SerializableColor::new(255, 0, 0, 255);
        let mut text = TextAnnotation::new(1, Point::new(50.0, 50.0), Size::new(150.0, 40.0), None)
            .with_text("Hello");
        text.color = red;
        let mut page = PageAnnotations::new();
        page.texts.push(text);

        let mut layer = layer(300, 300, 1.0);
        layer.load_page(&page);
        let image = layer.export_as_canvas().unwrap();

        let [r, g, _, a] = image.pixel(60, 62).unwrap();
        assert!(r > 200 && g < 80 && a > 200);
        let [r, g, b, a] = image.pixel(150, 62).unwrap();
        assert!((150..=210).contains(&a));
        assert_eq!((r, g), (g, b));
        assert_eq!(image.pixel(20, 20), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_note_text_stays_inside_note() {
        let mut note = StickyNote::new(1, Point::ZERO, StickyNote::DEFAULT_SIZE, None);
        note.text = "x".repeat(200);
        let mut page = PageAnnotations::new();
        page.notes.push(note);

        let mut layer = layer(300, 300, 1.0);
        layer.load_page(&page);
        let image = layer.export_as_canvas().unwrap();

        assert_ne!(image.pixel(100, 12), image.pixel(100, 75));
        assert_eq!(image.pixel(250, 12), Some([0, 0, 0, 0]));
    }
}
