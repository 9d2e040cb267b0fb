//! Freehand stroke capture, smoothing and eraser intersection.

use crate::annotations::{
    AnnotationId, DrawingPath, DrawingTool, PageItem, PageNumber, SerializableColor, StrokePoint,
};
use kurbo::{BezPath, Point, Rect};

/// State of the stroke capture.
#[derive(Debug, Clone, Default)]
pub enum CaptureState {
    /// Waiting for pointer-down.
    #[default]
    Idle,
    /// A stroke is in progress.
    Drawing {
        tool: DrawingTool,
        color: SerializableColor,
        line_width: f64,
        points: Vec<StrokePoint>,
    },
}

/// A finished stroke returned by [`StrokeCapture::end_drawing`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedStroke {
    pub tool: DrawingTool,
    pub color: SerializableColor,
    pub line_width: f64,
    pub points: Vec<StrokePoint>,
}

impl CapturedStroke {
    /// Turn the stroke into a page path.
    pub fn into_path(self, page_number: PageNumber) -> DrawingPath {
        DrawingPath::new(self.tool, self.color, self.line_width, self.points, page_number)
    }
}

/// Turns pointer samples (already in base-scale page units) into strokes.
#[derive(Debug, Clone, Default)]
pub struct StrokeCapture {
    state: CaptureState,
}

impl StrokeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a stroke. Any stroke already in progress is discarded.
    pub fn start_drawing(
        &mut self,
        point: StrokePoint,
        tool: DrawingTool,
        color: SerializableColor,
        line_width: f64,
    ) {
        self.state = CaptureState::Drawing {
            tool,
            color,
            line_width,
            points: vec![point],
        };
    }

    /// Append a sample to the stroke in progress. Ignored while idle.
    pub fn continue_drawing(&mut self, point: StrokePoint) {
        if let CaptureState::Drawing { points, .. } = &mut self.state {
            points.push(point);
        }
    }

    /// Finish the stroke. Returns `None` when idle or when fewer than two
    /// points were captured.
    pub fn end_drawing(&mut self) -> Option<CapturedStroke> {
        match std::mem::take(&mut self.state) {
            CaptureState::Drawing {
                tool,
                color,
                line_width,
                points,
            } if points.len() >= 2 => Some(CapturedStroke {
                tool,
                color,
                line_width,
                points,
            }),
            CaptureState::Drawing { points, .. } => {
                log::debug!("Discarding stroke with {} point(s)", points.len());
                None
            }
            CaptureState::Idle => None,
        }
    }

    /// Abandon the stroke in progress.
    pub fn cancel(&mut self) {
        self.state = CaptureState::Idle;
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, CaptureState::Drawing { .. })
    }

    /// The stroke in progress, for live preview.
    pub fn live_stroke(&self) -> Option<CapturedStroke> {
        match &self.state {
            CaptureState::Drawing {
                tool,
                color,
                line_width,
                points,
            } => Some(CapturedStroke {
                tool: *tool,
                color: *color,
                line_width: *line_width,
                points: points.clone(),
            }),
            CaptureState::Idle => None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }
}

/// Build a smoothed path through `points`.
///
/// Each sample becomes the control point of a quadratic segment ending at the
/// midpoint to the next sample, so coarse pointer input renders without
/// corners. The first and last samples are hit exactly.
pub fn smooth_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let Some(&first) = points.first() else {
        return path;
    };
    path.move_to(first);

    match points.len() {
        1 => {
            // A dot: a zero-length segment still gets round caps.
            path.line_to(first);
        }
        2 => {
            path.line_to(points[1]);
        }
        n => {
            for i in 1..n - 1 {
                let control = points[i];
                let next = points[i + 1];
                let mid = control.midpoint(next);
                path.quad_to(control, mid);
            }
            path.line_to(points[n - 1]);
        }
    }
    path
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Side of the line through `from` and `to` that `p` lies on: 1, -1, or 0
/// when collinear within tolerance.
fn orientation(from: Point, to: Point, p: Point) -> i8 {
    let turn = (to - from).cross(p - from);
    if turn.abs() < 1e-10 {
        0
    } else if turn > 0.0 {
        1
    } else {
        -1
    }
}

/// Whether segments a-b and c-d touch or cross.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let (ab_c, ab_d) = (orientation(a, b, c), orientation(a, b, d));
    let (cd_a, cd_b) = (orientation(c, d, a), orientation(c, d, b));
    if ab_c * ab_d < 0 && cd_a * cd_b < 0 {
        return true;
    }
    let within = |from: Point, to: Point, p: Point| {
        let bounds = Rect::from_points(from, to);
        (bounds.x0..=bounds.x1).contains(&p.x) && (bounds.y0..=bounds.y1).contains(&p.y)
    };
    (cd_a == 0 && within(c, d, a))
        || (cd_b == 0 && within(c, d, b))
        || (ab_c == 0 && within(a, b, c))
        || (ab_d == 0 && within(a, b, d))
}

/// Minimum distance between segments (a-b) and (c-d).
pub fn segment_distance(a: Point, b: Point, c: Point, d: Point) -> f64 {
    if segments_intersect(a, b, c, d) {
        return 0.0;
    }
    point_to_segment_dist(a, c, d)
        .min(point_to_segment_dist(b, c, d))
        .min(point_to_segment_dist(c, a, b))
        .min(point_to_segment_dist(d, a, b))
}

/// Segments of a path; a single point yields one zero-length segment.
fn segments(points: &[StrokePoint]) -> Vec<(Point, Point)> {
    match points {
        [] => Vec::new(),
        [only] => vec![(only.point(), only.point())],
        _ => points.windows(2).map(|w| (w[0].point(), w[1].point())).collect(),
    }
}

/// Whether two strokes touch, accounting for both stroke widths.
///
/// Two strokes intersect when any pair of their segments comes within
/// `a.line_width / 2 + b.line_width / 2` of each other (crossing segments are
/// at distance zero). Returns on the first hit.
pub fn paths_intersect(a: &DrawingPath, b: &DrawingPath) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let threshold = a.line_width.max(0.0) / 2.0 + b.line_width.max(0.0) / 2.0;

    let a_bounds: Rect = a.bounds().inflate(threshold, threshold);
    if !touches(a_bounds, b.bounds()) {
        return false;
    }

    let b_segments = segments(&b.points);
    segments(&a.points).iter().any(|&(p0, p1)| {
        b_segments
            .iter()
            .any(|&(q0, q1)| segment_distance(p0, p1, q0, q1) <= threshold)
    })
}

/// Rect overlap that also accepts degenerate (zero-width or zero-height) rects.
fn touches(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Ids of every path the eraser stroke touches. Paths on other pages and
/// other eraser strokes are never hit.
pub fn erase(eraser: &DrawingPath, paths: &[DrawingPath]) -> Vec<AnnotationId> {
    paths
        .iter()
        .filter(|p| p.page_number == eraser.page_number && p.tool.persists())
        .filter(|p| paths_intersect(eraser, p))
        .map(|p| p.id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(points: &[(f64, f64)], width: f64) -> DrawingPath {
        DrawingPath::new(
            DrawingTool::Pencil,
            SerializableColor::black(),
            width,
            points.iter().map(|&(x, y)| StrokePoint::new(x, y)).collect(),
            1,
        )
    }

    fn eraser(points: &[(f64, f64)], width: f64) -> DrawingPath {
        let mut p = path(points, width);
        p.tool = DrawingTool::Eraser;
        p
    }

    #[test]
    fn test_capture_lifecycle() {
        let mut capture = StrokeCapture::new();
        assert!(!capture.is_drawing());

        let black = SerializableColor::black();
        capture.start_drawing(StrokePoint::new(0.0, 0.0), DrawingTool::Pencil, black, 2.0);
        assert!(capture.is_drawing());
        for i in 1..5 {
            capture.continue_drawing(StrokePoint::new(i as f64 * 10.0, 0.0));
        }

        let stroke = capture.end_drawing().unwrap();
        assert_eq!(stroke.points.len(), 5);
        assert!(!capture.is_drawing());
    }

    #[test]
    fn test_single_point_stroke_is_discarded() {
        let mut capture = StrokeCapture::new();
        let black = SerializableColor::black();
        capture.start_drawing(StrokePoint::new(5.0, 5.0), DrawingTool::Pencil, black, 2.0);
        assert!(capture.end_drawing().is_none());
        assert!(!capture.is_drawing());
    }

    #[test]
    fn test_continue_while_idle_is_ignored() {
        let mut capture = StrokeCapture::new();
        capture.continue_drawing(StrokePoint::new(1.0, 1.0));
        assert!(capture.end_drawing().is_none());
    }

    #[test]
    fn test_smooth_path_hits_endpoints() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 10.0),
        ];
        let path = smooth_path(&points);
        let elements = path.elements();
        assert!(matches!(elements[0], kurbo::PathEl::MoveTo(p) if p == points[0]));
        assert!(matches!(elements.last(), Some(kurbo::PathEl::LineTo(p)) if *p == points[3]));
        let quads = elements.iter().filter(|e| matches!(e, kurbo::PathEl::QuadTo(..))).count();
        assert_eq!(quads, 2);
    }

    #[test]
    fn test_crossing_paths_intersect() {
        let a = path(&[(0.0, 0.0), (100.0, 100.0)], 1.0);
        let b = path(&[(0.0, 100.0), (100.0, 0.0)], 1.0);
        assert!(paths_intersect(&a, &b));
    }

    #[test]
    fn test_proximity_uses_both_widths() {
        let a = path(&[(0.0, 0.0), (100.0, 0.0)], 4.0);
        let near = path(&[(0.0, 5.0), (100.0, 5.0)], 6.0); // gap 5 == 2 + 3
        let far = path(&[(0.0, 5.1), (100.0, 5.1)], 6.0);
        assert!(paths_intersect(&a, &near));
        assert!(!paths_intersect(&a, &far));
    }

    #[test]
    fn test_dot_eraser_hits_stroke() {
        let stroke = path(&[(0.0, 0.0), (100.0, 0.0)], 2.0);
        let dot = eraser(&[(50.0, 3.0)], 6.0);
        assert!(paths_intersect(&dot, &stroke));
    }

    #[test]
    fn test_erase_only_intersecting() {
        let first = path(&[(0.0, 0.0), (100.0, 0.0)], 2.0);
        let second = path(&[(0.0, 50.0), (100.0, 50.0)], 2.0);
        let rubber = eraser(&[(50.0, -10.0), (50.0, 10.0)], 10.0);
        let ids = erase(&rubber, &[first.clone(), second]);
        assert_eq!(ids, vec![first.id()]);
    }

    #[test]
    fn test_erase_ignores_other_pages() {
        let mut other = path(&[(0.0, 0.0), (100.0, 0.0)], 2.0);
        other.page_number = 2;
        let rubber = eraser(&[(50.0, -10.0), (50.0, 10.0)], 10.0);
        assert!(erase(&rubber, &[other]).is_empty());
    }

    #[test]
    fn test_point_to_segment() {
        let (a, b) = (Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let d = point_to_segment_dist(Point::new(5.0, 5.0), a, b);
        assert!((d - 5.0).abs() < f64::EPSILON);
        let d = point_to_segment_dist(Point::new(13.0, 4.0), a, b);
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_segment_touching_cases() {
        let p = |x, y| Point::new(x, y);
        // Collinear and overlapping.
        assert!(segments_intersect(p(0.0, 0.0), p(10.0, 0.0), p(5.0, 0.0), p(20.0, 0.0)));
        // Collinear, disjoint.
        assert!(!segments_intersect(p(0.0, 0.0), p(10.0, 0.0), p(11.0, 0.0), p(20.0, 0.0)));
        // T-junction on an endpoint.
        assert!(segments_intersect(p(0.0, 0.0), p(10.0, 0.0), p(10.0, -5.0), p(10.0, 5.0)));
        // Parallel.
        assert!(!segments_intersect(p(0.0, 0.0), p(10.0, 0.0), p(0.0, 1.0), p(10.0, 1.0)));
    }
}
