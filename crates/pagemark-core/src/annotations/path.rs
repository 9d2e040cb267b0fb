//! Freehand drawing path.

use super::{AnnotationId, PageItem, PageNumber, SerializableColor};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raster tools that capture a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingTool {
    #[default]
    Pencil,
    Eraser,
    Highlight,
}

impl DrawingTool {
    /// Opacity multiplier applied when rendering strokes of this tool.
    pub fn opacity(&self) -> f64 {
        match self {
            DrawingTool::Highlight => 0.4,
            DrawingTool::Pencil | DrawingTool::Eraser => 1.0,
        }
    }

    /// Whether strokes of this tool are stored after pointer-up.
    pub fn persists(&self) -> bool {
        !matches!(self, DrawingTool::Eraser)
    }
}

/// One sampled pointer position in base-scale page units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, pressure: None }
    }

    pub fn with_pressure(x: f64, y: f64, pressure: f64) -> Self {
        Self {
            x,
            y,
            pressure: Some(pressure.clamp(0.0, 1.0)),
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Point> for StrokePoint {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

/// A captured stroke. Immutable once created; erasing removes it whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingPath {
    pub(crate) id: AnnotationId,
    pub tool: DrawingTool,
    pub color: SerializableColor,
    pub line_width: f64,
    pub points: Vec<StrokePoint>,
    pub page_number: PageNumber,
}

impl DrawingPath {
    pub fn new(
        tool: DrawingTool,
        color: SerializableColor,
        line_width: f64,
        points: Vec<StrokePoint>,
        page_number: PageNumber,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool,
            color,
            line_width,
            points,
            page_number,
        }
    }

    /// Points as kurbo points.
    pub fn kurbo_points(&self) -> Vec<Point> {
        self.points.iter().map(StrokePoint::point).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PageItem for DrawingPath {
    fn id(&self) -> AnnotationId {
        self.id
    }

    fn page_number(&self) -> PageNumber {
        self.page_number
    }

    fn bounds(&self) -> Rect {
        if self.points.is_empty() {
            return Rect::ZERO;
        }

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;

        for point in &self.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        Rect::new(min_x, min_y, max_x, max_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let path = DrawingPath::new(
            DrawingTool::Pencil,
            SerializableColor::black(),
            2.0,
            vec![
                StrokePoint::new(0.0, 0.0),
                StrokePoint::new(100.0, 50.0),
                StrokePoint::new(50.0, 100.0),
            ],
            1,
        );

        let bounds = path.bounds();
        assert!((bounds.x0).abs() < f64::EPSILON);
        assert!((bounds.y0).abs() < f64::EPSILON);
        assert!((bounds.x1 - 100.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_eraser_does_not_persist() {
        assert!(DrawingTool::Pencil.persists());
        assert!(DrawingTool::Highlight.persists());
        assert!(!DrawingTool::Eraser.persists());
    }

    #[test]
    fn test_pressure_is_optional_in_json() {
        let json = serde_json::to_string(&StrokePoint::new(1.0, 2.0)).unwrap();
        assert_eq!(json, r#"{"x":1.0,"y":2.0}"#);
        let p: StrokePoint = serde_json::from_str(r#"{"x":1,"y":2,"pressure":0.5}"#).unwrap();
        assert_eq!(p.pressure, Some(0.5));
    }
}
