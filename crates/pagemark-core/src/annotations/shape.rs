//! Vector shapes mirrored from the shape layer.

use super::{AnnotationId, PageItem, PageNumber, SerializableColor};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use uuid::Uuid;

/// Style properties for vector shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Stroke color.
    pub stroke: SerializableColor,
    /// Fill color (None = no fill).
    pub fill: Option<SerializableColor>,
    /// Stroke width in base units.
    pub stroke_width: f64,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke: SerializableColor::black(),
            fill: None,
            stroke_width: 2.0,
            opacity: 1.0,
        }
    }
}

/// Geometry of a vector shape, in base-scale page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeGeometry {
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Circle {
        cx: f64,
        cy: f64,
        radius: f64,
    },
    Star {
        cx: f64,
        cy: f64,
        outer_radius: f64,
        inner_radius: f64,
        points: u32,
    },
    Polygon {
        points: Vec<Point>,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    /// Free text created by the shape layer's text tool.
    Text {
        x: f64,
        y: f64,
        content: String,
        font_size: f64,
    },
}

impl ShapeGeometry {
    /// Vertices of a star, alternating outer and inner radius, starting at the top.
    pub fn star_vertices(cx: f64, cy: f64, outer: f64, inner: f64, points: u32) -> Vec<Point> {
        let count = points.max(2) as usize * 2;
        (0..count)
            .map(|i| {
                let radius = if i % 2 == 0 { outer } else { inner };
                let angle = -PI / 2.0 + i as f64 * PI / (count as f64 / 2.0);
                Point::new(cx + radius * angle.cos(), cy + radius * angle.sin())
            })
            .collect()
    }

    /// Outline vertices for polygonal geometry (rectangles, stars, polygons, lines).
    pub fn vertices(&self) -> Vec<Point> {
        match self {
            ShapeGeometry::Rectangle { x, y, width, height } => vec![
                Point::new(*x, *y),
                Point::new(x + width, *y),
                Point::new(x + width, y + height),
                Point::new(*x, y + height),
            ],
            ShapeGeometry::Star {
                cx,
                cy,
                outer_radius,
                inner_radius,
                points,
            } => Self::star_vertices(*cx, *cy, *outer_radius, *inner_radius, *points),
            ShapeGeometry::Polygon { points } => points.clone(),
            ShapeGeometry::Line { x1, y1, x2, y2 } => {
                vec![Point::new(*x1, *y1), Point::new(*x2, *y2)]
            }
            ShapeGeometry::Circle { .. } | ShapeGeometry::Text { .. } => Vec::new(),
        }
    }

    /// Whether the geometry can be rendered: finite coordinates and
    /// non-degenerate structure.
    pub fn is_well_formed(&self) -> bool {
        let finite = |v: &[f64]| v.iter().all(|n| n.is_finite());
        match self {
            ShapeGeometry::Rectangle { x, y, width, height } => {
                finite(&[*x, *y, *width, *height]) && *width >= 0.0 && *height >= 0.0
            }
            ShapeGeometry::Circle { cx, cy, radius } => {
                finite(&[*cx, *cy, *radius]) && *radius >= 0.0
            }
            ShapeGeometry::Star {
                cx,
                cy,
                outer_radius,
                inner_radius,
                points,
            } => finite(&[*cx, *cy, *outer_radius, *inner_radius]) && *points >= 3,
            ShapeGeometry::Polygon { points } => {
                points.len() >= 2 && points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
            }
            ShapeGeometry::Line { x1, y1, x2, y2 } => finite(&[*x1, *y1, *x2, *y2]),
            ShapeGeometry::Text { x, y, font_size, .. } => {
                finite(&[*x, *y, *font_size]) && *font_size > 0.0
            }
        }
    }

    fn bounds(&self) -> Rect {
        match self {
            ShapeGeometry::Rectangle { x, y, width, height } => {
                Rect::new(*x, *y, x + width, y + height)
            }
            ShapeGeometry::Circle { cx, cy, radius } => {
                Rect::new(cx - radius, cy - radius, cx + radius, cy + radius)
            }
            ShapeGeometry::Text {
                x,
                y,
                content,
                font_size,
            } => {
                // Approximate width: 0.6em per character.
                let width = content.chars().count() as f64 * font_size * 0.6;
                Rect::new(*x, *y, x + width, y + font_size * 1.2)
            }
            ShapeGeometry::Star { .. }
            | ShapeGeometry::Polygon { .. }
            | ShapeGeometry::Line { .. } => {
                let vertices = self.vertices();
                let Some(first) = vertices.first() else {
                    return Rect::ZERO;
                };
                vertices
                    .iter()
                    .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
            }
        }
    }
}

/// A vector shape owned by the shape layer and mirrored into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeObject {
    pub(crate) id: AnnotationId,
    pub page_number: PageNumber,
    pub geometry: ShapeGeometry,
    pub style: ShapeStyle,
    /// Rotation in degrees around the bounds center.
    #[serde(default)]
    pub rotation: f64,
}

impl ShapeObject {
    pub fn new(page_number: PageNumber, geometry: ShapeGeometry, style: ShapeStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            page_number,
            geometry,
            style,
            rotation: 0.0,
        }
    }

    /// Rebuild a shape with a known id (shape layer round trips).
    pub fn with_id(
        id: AnnotationId,
        page_number: PageNumber,
        geometry: ShapeGeometry,
        style: ShapeStyle,
    ) -> Self {
        Self {
            id,
            page_number,
            geometry,
            style,
            rotation: 0.0,
        }
    }

    pub fn rectangle(page_number: PageNumber, rect: Rect, style: ShapeStyle) -> Self {
        Self::new(
            page_number,
            ShapeGeometry::Rectangle {
                x: rect.x0,
                y: rect.y0,
                width: rect.width(),
                height: rect.height(),
            },
            style,
        )
    }
}

impl PageItem for ShapeObject {
    fn id(&self) -> AnnotationId {
        self.id
    }

    fn page_number(&self) -> PageNumber {
        self.page_number
    }

    fn bounds(&self) -> Rect {
        self.geometry.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_bounds() {
        let rect = Rect::new(10.0, 20.0, 110.0, 70.0);
        let shape = ShapeObject::rectangle(1, rect, ShapeStyle::default());
        let bounds = shape.bounds();
        assert!((bounds.x0 - 10.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_star_vertices() {
        let vertices = ShapeGeometry::star_vertices(0.0, 0.0, 10.0, 4.0, 5);
        assert_eq!(vertices.len(), 10);
        // First vertex points straight up.
        assert!(vertices[0].x.abs() < 1e-9);
        assert!((vertices[0].y + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_geometry() {
        let bad = ShapeGeometry::Circle {
            cx: f64::NAN,
            cy: 0.0,
            radius: 5.0,
        };
        assert!(!bad.is_well_formed());
        let star = ShapeGeometry::Star {
            cx: 0.0,
            cy: 0.0,
            outer_radius: 5.0,
            inner_radius: 2.0,
            points: 2,
        };
        assert!(!star.is_well_formed());
    }

    #[test]
    fn test_geometry_json_is_tagged() {
        let geometry = ShapeGeometry::Circle {
            cx: 1.0,
            cy: 2.0,
            radius: 3.0,
        };
        let json = serde_json::to_value(&geometry).unwrap();
        assert_eq!(json["type"], "circle");
    }
}
