//! Sticky note annotation.

use super::text::NOTE_FONT_FIT;
use super::{AnnotationId, PageItem, PageNumber, SerializableColor};
use crate::coords::{Anchored, RelativeRect};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A text note with a colored background and bounded size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
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
    pub background_color: SerializableColor,
}

impl StickyNote {
    pub const MIN_WIDTH: f64 = 120.0;
    pub const MAX_WIDTH: f64 = 400.0;
    pub const MIN_HEIGHT: f64 = 80.0;
    pub const MAX_HEIGHT: f64 = 300.0;
    pub const DEFAULT_SIZE: Size = Size::new(200.0, 150.0);
    pub const DEFAULT_BACKGROUND: SerializableColor =
        SerializableColor::new(0xff, 0xf5, 0x9d, 0xff);

    /// Create a note at `origin`; the size is clamped to the allowed range.
    pub fn new(page_number: PageNumber, origin: Point, size: Size, page: Option<Size>) -> Self {
        let (width, height) = Self::clamp_size(size.width, size.height);
        let mut note = Self {
            id: Uuid::new_v4(),
            page_number,
            x: origin.x,
            y: origin.y,
            width,
            height,
            relative: RelativeRect::default(),
            text: String::new(),
            font_size: NOTE_FONT_FIT.font_size(width, height),
            font_family: "Helvetica".to_string(),
            color: SerializableColor::black(),
            background_color: Self::DEFAULT_BACKGROUND,
        };
        note.sync_relative(page);
        note
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    fn clamp_size(width: f64, height: f64) -> (f64, f64) {
        (
            width.clamp(Self::MIN_WIDTH, Self::MAX_WIDTH),
            height.clamp(Self::MIN_HEIGHT, Self::MAX_HEIGHT),
        )
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Resize to an absolute size (clamped), re-deriving the font size.
    pub fn resize_to(&mut self, width: f64, height: f64, page: Option<Size>) {
        let (width, height) = Self::clamp_size(width, height);
        self.width = width;
        self.height = height;
        self.font_size = NOTE_FONT_FIT.font_size(width, height);
        self.sync_relative(page);
    }

    /// Apply one resize-handle drag tick.
    pub fn resize_by(&mut self, dw: f64, dh: f64, page: Option<Size>) {
        self.resize_to(self.width + dw, self.height + dh, page);
    }

    pub fn move_to(&mut self, origin: Point, page: Option<Size>) {
        self.x = origin.x;
        self.y = origin.y;
        self.sync_relative(page);
    }
}

impl Anchored for StickyNote {
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

impl PageItem for StickyNote {
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

    #[test]
    fn test_size_clamped_on_create() {
        let note = StickyNote::new(1, Point::ZERO, Size::new(50.0, 1000.0), None);
        assert!((note.width - StickyNote::MIN_WIDTH).abs() < f64::EPSILON);
        assert!((note.height - StickyNote::MAX_HEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resize_clamps_and_refits_font() {
        let page = Size::new(612.0, 792.0);
        let mut note = StickyNote::new(1, Point::ZERO, StickyNote::DEFAULT_SIZE, Some(page));
        note.resize_by(1000.0, 1000.0, Some(page));
        assert!((note.width - 400.0).abs() < f64::EPSILON);
        assert!((note.height - 300.0).abs() < f64::EPSILON);
        assert!((note.font_size - 32.0).abs() < f64::EPSILON);

        note.resize_to(120.0, 80.0, Some(page));
        // min(120 * 0.12, 80 * 0.4) = 14.4
        assert!((note.font_size - 14.4).abs() < 1e-9);
    }
}
