//! Arrow annotation.

use super::{AnnotationId, PageItem, PageNumber, SerializableColor};
use crate::coords::{Anchored, RelativeLine, from_relative, to_relative};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A straight arrow between two base-scale endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowAnnotation {
    pub(crate) id: AnnotationId,
    pub page_number: PageNumber,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default)]
    pub relative: RelativeLine,
    pub stroke: SerializableColor,
    pub stroke_width: f64,
    pub arrow_head: bool,
}

impl ArrowAnnotation {
    /// Arrows shorter than this are discarded when a drag ends.
    pub const MIN_LENGTH: f64 = 5.0;

    /// Start a drag-to-create gesture: both endpoints at `start`.
    pub fn new(page_number: PageNumber, start: Point, page: Option<Size>) -> Self {
        let mut arrow = Self {
            id: Uuid::new_v4(),
            page_number,
            x1: start.x,
            y1: start.y,
            x2: start.x,
            y2: start.y,
            relative: RelativeLine::default(),
            stroke: SerializableColor::new(0xe5, 0x3e, 0x3e, 0xff),
            stroke_width: 2.0,
            arrow_head: true,
        };
        arrow.sync_relative(page);
        arrow
    }

    pub fn between(page_number: PageNumber, start: Point, end: Point, page: Option<Size>) -> Self {
        let mut arrow = Self::new(page_number, start, page);
        arrow.drag_to(end, page);
        arrow
    }

    /// Live-update the second endpoint during creation.
    pub fn drag_to(&mut self, end: Point, page: Option<Size>) {
        self.x2 = end.x;
        self.y2 = end.y;
        self.sync_relative(page);
    }

    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }

    pub fn length(&self) -> f64 {
        (self.end() - self.start()).hypot()
    }

    /// Arrowhead triangle (tip, left, right), scaled with the stroke width.
    pub fn head_points(&self) -> Option<[Point; 3]> {
        if !self.arrow_head || self.length() < f64::EPSILON {
            return None;
        }
        let dir = (self.end() - self.start()) / self.length();
        let head_len = (self.stroke_width * 5.0).max(10.0);
        let half_width = head_len * 0.5;
        let normal = Vec2::new(-dir.y, dir.x);
        let tip = self.end();
        let base = tip - dir * head_len;
        Some([tip, base + normal * half_width, base - normal * half_width])
    }
}

impl Anchored for ArrowAnnotation {
    fn sync_relative(&mut self, page: Option<Size>) {
        let (pw, ph) = page.map(|s| (s.width, s.height)).unwrap_or((0.0, 0.0));
        let prev = self.relative;
        self.relative = RelativeLine {
            x1: to_relative(self.x1, pw, prev.x1),
            y1: to_relative(self.y1, ph, prev.y1),
            x2: to_relative(self.x2, pw, prev.x2),
            y2: to_relative(self.y2, ph, prev.y2),
        };
    }

    fn restore_absolute(&mut self, page: Size) {
        self.x1 = from_relative(self.relative.x1, page.width);
        self.y1 = from_relative(self.relative.y1, page.height);
        self.x2 = from_relative(self.relative.x2, page.width);
        self.y2 = from_relative(self.relative.y2, page.height);
    }
}

impl PageItem for ArrowAnnotation {
    fn id(&self) -> AnnotationId {
        self.id
    }

    fn page_number(&self) -> PageNumber {
        self.page_number
    }

    fn bounds(&self) -> Rect {
        Rect::from_points(self.start(), self.end())
    }
}
