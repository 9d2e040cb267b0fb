//! Text box annotation and the resize/font-size coupling shared with notes.

use super::{AnnotationId, PageItem, PageNumber, SerializableColor};
use crate::coords::{Anchored, RelativeRect};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Constrained font size derived from a box's dimensions.
///
/// The width term shrinks text in narrow boxes, the height term caps it in
/// short ones, and the clamp keeps it legible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontFit {
    pub min: f64,
    pub max: f64,
    pub width_factor: f64,
    pub height_factor: f64,
}

impl FontFit {
    pub fn font_size(&self, width: f64, height: f64) -> f64 {
        (width * self.width_factor)
            .min(height * self.height_factor)
            .clamp(self.min, self.max)
    }
}

/// Font fitting for free text boxes.
pub const TEXT_FONT_FIT: FontFit = FontFit {
    min: 12.0,
    max: 48.0,
    width_factor: 0.12,
    height_factor: 0.4,
};

/// Font fitting for sticky notes.
pub const NOTE_FONT_FIT: FontFit = FontFit {
    min: 10.0,
    max: 32.0,
    width_factor: 0.12,
    height_factor: 0.4,
};

/// A resizable text box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub(crate) id: AnnotationId,
    pub page_number: PageNumber,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub relative: RelativeRect,
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    pub color: SerializableColor,
}

impl TextAnnotation {
    pub const DEFAULT_FONT_SIZE: f64 = 16.0;
    pub const DEFAULT_FONT_FAMILY: &'static str = "Helvetica";
    pub const MIN_WIDTH: f64 = 40.0;
    pub const MIN_HEIGHT: f64 = 20.0;

    /// Create a text box at `origin` (base scale).
    pub fn new(page_number: PageNumber, origin: Point, size: Size, page: Option<Size>) -> Self {
        let mut text = Self {
            id: Uuid::new_v4(),
            page_number,
            x: origin.x,
            y: origin.y,
            width: size.width.max(Self::MIN_WIDTH),
            height: size.height.max(Self::MIN_HEIGHT),
            relative: RelativeRect::default(),
            text: String::new(),
            font_size: Self::DEFAULT_FONT_SIZE,
            font_family: Self::DEFAULT_FONT_FAMILY.to_string(),
            color: SerializableColor::black(),
        };
        text.sync_relative(page);
        text
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Resize to an absolute box size, re-deriving the font size.
    pub fn resize_to(&mut self, width: f64, height: f64, page: Option<Size>) {
        self.width = width.max(Self::MIN_WIDTH);
        self.height = height.max(Self::MIN_HEIGHT);
        self.font_size = TEXT_FONT_FIT.font_size(self.width, self.height);
        self.sync_relative(page);
    }

    /// Apply one resize-handle drag tick (deltas in base units).
    pub fn resize_by(&mut self, dw: f64, dh: f64, page: Option<Size>) {
        self.resize_to(self.width + dw, self.height + dh, page);
    }

    pub fn move_to(&mut self, origin: Point, page: Option<Size>) {
        self.x = origin.x;
        self.y = origin.y;
        self.sync_relative(page);
    }
}

impl Anchored for TextAnnotation {
    fn sync_relative(&mut self, page: Option<Size>) {
        self.relative = RelativeRect::from_absolute(self.rect(), page, self.relative);
    }

    fn restore_absolute(&mut self, page: Size) {
        let rect = self.relative.to_absolute(page);
        self.x = rect.x0;
        self.y = rect.y0;
        self.width = rect.width();
        self.height = rect.height();
    }
}

impl PageItem for TextAnnotation {
    fn id(&self) -> AnnotationId {
        self.id
    }

    fn page_number(&self) -> PageNumber {
        self.page_number
    }

    fn bounds(&self) -> Rect {
        self.rect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: Size = Size::new(612.0, 792.0);

    #[test]
    fn test_resize_drag_derives_font_size() {
        let origin = Point::new(100.0, 100.0);
        let mut text = TextAnnotation::new(1, origin, Size::new(150.0, 40.0), Some(PAGE));
        text.resize_by(50.0, 20.0, Some(PAGE));
        assert!((text.width - 200.0).abs() < f64::EPSILON);
        assert!((text.height - 60.0).abs() < f64::EPSILON);
        assert!((text.font_size - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_font_size_clamped() {
        assert!((TEXT_FONT_FIT.font_size(10.0, 10.0) - 12.0).abs() < f64::EPSILON);
        assert!((TEXT_FONT_FIT.font_size(1000.0, 1000.0) - 48.0).abs() < f64::EPSILON);
        assert!((NOTE_FONT_FIT.font_size(1000.0, 1000.0) - 32.0).abs() < f64::EPSILON);
        assert!((NOTE_FONT_FIT.font_size(10.0, 10.0) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_height_caps_font_in_wide_box() {
        // Wide but short: height term wins.
        let size = TEXT_FONT_FIT.font_size(400.0, 50.0);
        assert!((size - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_relative_tracks_absolute() {
        let origin = Point::new(61.2, 79.2);
        let mut text = TextAnnotation::new(1, origin, Size::new(122.4, 39.6), Some(PAGE));
        assert!((text.relative.x - 0.1).abs() < 1e-12);
        assert!((text.relative.height - 0.05).abs() < 1e-12);
        text.move_to(Point::new(306.0, 396.0), Some(PAGE));
        assert!((text.relative.x - 0.5).abs() < 1e-12);
        assert!((text.relative.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_page_keeps_relative_then_restores() {
        let origin = Point::new(61.2, 79.2);
        let mut text = TextAnnotation::new(1, origin, Size::new(122.4, 39.6), Some(PAGE));
        let before = text.relative;
        text.move_to(Point::new(0.0, 0.0), None);
        assert_eq!(text.relative, before);

        // The page re-renders at twice its intrinsic size: absolute follows relative.
        text.restore_absolute(Size::new(PAGE.width * 2.0, PAGE.height * 2.0));
        assert!((text.x - 122.4).abs() < 1e-9);
        assert!((text.height - 79.2).abs() < 1e-9);
    }
}
