//! Stamp annotation and the static stamp catalog.

use super::{AnnotationId, PageItem, PageNumber, SerializableColor};
use crate::coords::{Anchored, RelativeSquare, from_relative, to_relative};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outline drawn for a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampGlyph {
    Check,
    Cross,
    Star,
    Circle,
    Frame,
}

/// Catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub glyph: StampGlyph,
    pub color: SerializableColor,
}

/// Built-in stamps.
pub const STAMP_CATALOG: &[StampDefinition] = &[
    StampDefinition {
        id: "check",
        label: "Check",
        glyph: StampGlyph::Check,
        color: SerializableColor::new(0x2f, 0x85, 0x5a, 0xff),
    },
    StampDefinition {
        id: "cross",
        label: "Cross",
        glyph: StampGlyph::Cross,
        color: SerializableColor::new(0xc5, 0x30, 0x30, 0xff),
    },
    StampDefinition {
        id: "star",
        label: "Star",
        glyph: StampGlyph::Star,
        color: SerializableColor::new(0xd6, 0x9e, 0x2e, 0xff),
    },
    StampDefinition {
        id: "circle",
        label: "Circle",
        glyph: StampGlyph::Circle,
        color: SerializableColor::new(0x2b, 0x6c, 0xb0, 0xff),
    },
    StampDefinition {
        id: "approved",
        label: "Approved",
        glyph: StampGlyph::Frame,
        color: SerializableColor::new(0x2f, 0x85, 0x5a, 0xff),
    },
];

impl StampDefinition {
    pub fn find(id: &str) -> Option<&'static StampDefinition> {
        STAMP_CATALOG.iter().find(|s| s.id == id)
    }
}

/// A square stamp placed on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampAnnotation {
    pub(crate) id: AnnotationId,
    pub page_number: PageNumber,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    #[serde(default)]
    pub relative: RelativeSquare,
    pub stamp_id: String,
    /// Rotation in degrees, always in `[0, 360)`.
    #[serde(default)]
    pub rotation: f64,
}

impl StampAnnotation {
    pub const DEFAULT_SIZE: f64 = 60.0;
    pub const MIN_SIZE: f64 = 20.0;
    pub const MAX_SIZE: f64 = 400.0;
    /// Degrees per mouse-wheel notch.
    pub const WHEEL_STEP: f64 = 15.0;

    pub fn new(
        page_number: PageNumber,
        stamp_id: impl Into<String>,
        origin: Point,
        size: f64,
        page: Option<Size>,
    ) -> Self {
        let mut stamp = Self {
            id: Uuid::new_v4(),
            page_number,
            x: origin.x,
            y: origin.y,
            size: size.clamp(Self::MIN_SIZE, Self::MAX_SIZE),
            relative: RelativeSquare::default(),
            stamp_id: stamp_id.into(),
            rotation: 0.0,
        };
        stamp.sync_relative(page);
        stamp
    }

    pub fn definition(&self) -> Option<&'static StampDefinition> {
        StampDefinition::find(&self.stamp_id)
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees.rem_euclid(360.0);
    }

    /// Rotate by wheel input; positive delta rotates clockwise by one step.
    pub fn rotate_by_wheel(&mut self, delta_y: f64) {
        if delta_y == 0.0 {
            return;
        }
        let step = if delta_y > 0.0 { Self::WHEEL_STEP } else { -Self::WHEEL_STEP };
        self.set_rotation(self.rotation + step);
    }

    pub fn resize_to(&mut self, size: f64, page: Option<Size>) {
        self.size = size.clamp(Self::MIN_SIZE, Self::MAX_SIZE);
        self.sync_relative(page);
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.size / 2.0, self.y + self.size / 2.0)
    }
}

impl Anchored for StampAnnotation {
    fn sync_relative(&mut self, page: Option<Size>) {
        let (pw, ph) = page.map(|s| (s.width, s.height)).unwrap_or((0.0, 0.0));
        let prev = self.relative;
        self.relative = RelativeSquare {
            x: to_relative(self.x, pw, prev.x),
            y: to_relative(self.y, ph, prev.y),
            size: to_relative(self.size, pw, prev.size),
        };
    }

    fn restore_absolute(&mut self, page: Size) {
        self.x = from_relative(self.relative.x, page.width);
        self.y = from_relative(self.relative.y, page.height);
        self.size = from_relative(self.relative.size, page.width);
    }
}

impl PageItem for StampAnnotation {
    fn id(&self) -> AnnotationId {
        self.id
    }

    fn page_number(&self) -> PageNumber {
        self.page_number
    }

    fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.size, self.y + self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(StampDefinition::find("check").map(|d| d.glyph), Some(StampGlyph::Check));
        assert!(StampDefinition::find("missing").is_none());
    }

    #[test]
    fn test_wheel_rotation_wraps() {
        let mut stamp = StampAnnotation::new(1, "star", Point::ZERO, 60.0, None);
        stamp.rotate_by_wheel(-1.0);
        assert!((stamp.rotation - 345.0).abs() < f64::EPSILON);
        for _ in 0..2 {
            stamp.rotate_by_wheel(120.0);
        }
        assert!((stamp.rotation - 15.0).abs() < f64::EPSILON);
        stamp.rotate_by_wheel(0.0);
        assert!((stamp.rotation - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_size_relative_to_page_width() {
        let page = Size::new(600.0, 800.0);
        let stamp = StampAnnotation::new(1, "check", Point::new(300.0, 400.0), 60.0, Some(page));
        assert!((stamp.relative.size - 0.1).abs() < 1e-12);
        assert!((stamp.relative.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_size_clamped() {
        let stamp = StampAnnotation::new(1, "check", Point::ZERO, 5000.0, None);
        assert!((stamp.size - StampAnnotation::MAX_SIZE).abs() < f64::EPSILON);
    }
}
