//! Annotation entities placed on PDF pages.
//!
//! Every entity belongs to exactly one page and stores its geometry in base
//! scale (see [`crate::coords`]).

mod arrow;
mod note;
mod path;
mod shape;
mod stamp;
mod text;

pub use arrow::ArrowAnnotation;
pub use note::StickyNote;
pub use path::{DrawingPath, DrawingTool, StrokePoint};
pub use shape::{ShapeGeometry, ShapeObject, ShapeStyle};
pub use stamp::{StampAnnotation, StampDefinition, StampGlyph, STAMP_CATALOG};
pub use text::{FontFit, TextAnnotation, NOTE_FONT_FIT, TEXT_FONT_FIT};

use crate::coords::Anchored;
use kurbo::{Rect, Size};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for annotations.
pub type AnnotationId = Uuid;

/// One-based page number.
pub type PageNumber = u32;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let r = byte(&hex[0..1])? * 17;
                let g = byte(&hex[1..2])? * 17;
                let b = byte(&hex[2..3])? * 17;
                Some(Self::new(r, g, b, 255))
            }
            6 => Some(Self::new(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, 255)),
            8 => Some(Self::new(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                byte(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    /// Format as `#rrggbb` (or `#rrggbbaa` when not opaque).
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Same color with alpha multiplied by `opacity`.
    pub fn with_opacity(&self, opacity: f64) -> Self {
        let a = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..*self }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Behaviour shared by every page-anchored entity.
pub trait PageItem {
    /// Get the unique identifier.
    fn id(&self) -> AnnotationId;

    /// Page the entity belongs to.
    fn page_number(&self) -> PageNumber;

    /// Bounding box in base-scale page coordinates.
    fn bounds(&self) -> Rect;
}

/// Discriminant for [`Annotation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Path,
    Shape,
    Text,
    Note,
    Arrow,
    Stamp,
}

impl AnnotationKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::Path => "path",
            AnnotationKind::Shape => "shape",
            AnnotationKind::Text => "text",
            AnnotationKind::Note => "note",
            AnnotationKind::Arrow => "arrow",
            AnnotationKind::Stamp => "stamp",
        }
    }
}

/// Any annotation entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    Path(DrawingPath),
    Shape(ShapeObject),
    Text(TextAnnotation),
    Note(StickyNote),
    Arrow(ArrowAnnotation),
    Stamp(StampAnnotation),
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Path(_) => AnnotationKind::Path,
            Annotation::Shape(_) => AnnotationKind::Shape,
            Annotation::Text(_) => AnnotationKind::Text,
            Annotation::Note(_) => AnnotationKind::Note,
            Annotation::Arrow(_) => AnnotationKind::Arrow,
            Annotation::Stamp(_) => AnnotationKind::Stamp,
        }
    }

    pub fn id(&self) -> AnnotationId {
        match self {
            Annotation::Path(a) => a.id(),
            Annotation::Shape(a) => a.id(),
            Annotation::Text(a) => a.id(),
            Annotation::Note(a) => a.id(),
            Annotation::Arrow(a) => a.id(),
            Annotation::Stamp(a) => a.id(),
        }
    }

    pub fn page_number(&self) -> PageNumber {
        match self {
            Annotation::Path(a) => a.page_number(),
            Annotation::Shape(a) => a.page_number(),
            Annotation::Text(a) => a.page_number(),
            Annotation::Note(a) => a.page_number(),
            Annotation::Arrow(a) => a.page_number(),
            Annotation::Stamp(a) => a.page_number(),
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Annotation::Path(a) => a.bounds(),
            Annotation::Shape(a) => a.bounds(),
            Annotation::Text(a) => a.bounds(),
            Annotation::Note(a) => a.bounds(),
            Annotation::Arrow(a) => a.bounds(),
            Annotation::Stamp(a) => a.bounds(),
        }
    }
}

/// Paths and shapes only carry absolute coordinates.
impl Anchored for Annotation {
    fn sync_relative(&mut self, page: Option<Size>) {
        match self {
            Annotation::Text(a) => a.sync_relative(page),
            Annotation::Note(a) => a.sync_relative(page),
            Annotation::Arrow(a) => a.sync_relative(page),
            Annotation::Stamp(a) => a.sync_relative(page),
            Annotation::Path(_) | Annotation::Shape(_) => {}
        }
    }

    fn restore_absolute(&mut self, page: Size) {
        match self {
            Annotation::Text(a) => a.restore_absolute(page),
            Annotation::Note(a) => a.restore_absolute(page),
            Annotation::Arrow(a) => a.restore_absolute(page),
            Annotation::Stamp(a) => a.restore_absolute(page),
            Annotation::Path(_) | Annotation::Shape(_) => {}
        }
    }
}

impl From<DrawingPath> for Annotation {
    fn from(value: DrawingPath) -> Self {
        Annotation::Path(value)
    }
}

impl From<ShapeObject> for Annotation {
    fn from(value: ShapeObject) -> Self {
        Annotation::Shape(value)
    }
}

impl From<TextAnnotation> for Annotation {
    fn from(value: TextAnnotation) -> Self {
        Annotation::Text(value)
    }
}

impl From<StickyNote> for Annotation {
    fn from(value: StickyNote) -> Self {
        Annotation::Note(value)
    }
}

impl From<ArrowAnnotation> for Annotation {
    fn from(value: ArrowAnnotation) -> Self {
        Annotation::Arrow(value)
    }
}

impl From<StampAnnotation> for Annotation {
    fn from(value: StampAnnotation) -> Self {
        Annotation::Stamp(value)
    }
}
