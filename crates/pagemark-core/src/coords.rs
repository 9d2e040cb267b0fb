//! Coordinate model for on-page objects.
//!
//! Every stored position or size lives in *base scale*: the page's own
//! coordinate space at zoom 1.0. Alongside it each entity keeps a *relative*
//! value (a fraction of the page width or height) so that it can be
//! re-anchored when the page's base dimensions are unknown or change.
//! *Display* coordinates are what the user sees: base × current scale.

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Substitute a usable scale factor for zero, negative or non-finite input.
pub fn safe_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Convert a base-scale value to display scale.
pub fn to_display(base_value: f64, scale: f64) -> f64 {
    base_value * safe_scale(scale)
}

/// Convert a display-scale value back to base scale.
pub fn to_base(display_value: f64, scale: f64) -> f64 {
    display_value / safe_scale(scale)
}

/// Convert a base-scale value to a fraction of `base_dimension`.
///
/// When the dimension is not usable the `previous` relative value is returned
/// unchanged.
pub fn to_relative(base_value: f64, base_dimension: f64, previous: f64) -> f64 {
    if base_dimension.is_finite() && base_dimension > 0.0 {
        base_value / base_dimension
    } else {
        previous
    }
}

/// Convert a relative value back to base scale.
pub fn from_relative(relative_value: f64, base_dimension: f64) -> f64 {
    relative_value * base_dimension
}

/// Physical pixel size of a surface with the given CSS size.
///
/// Each axis is rounded up and never smaller than one pixel.
pub fn physical_size(css: Size, device_pixel_ratio: f64) -> (u32, u32) {
    let dpr = safe_scale(device_pixel_ratio);
    let w = (css.width * dpr).ceil().max(1.0);
    let h = (css.height * dpr).ceil().max(1.0);
    (w.min(u32::MAX as f64) as u32, h.min(u32::MAX as f64) as u32)
}

/// Relative rectangle (all fields are fractions of the page size).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeRect {
    /// Derive from an absolute base-scale rectangle, keeping `self` on axes
    /// whose page dimension is unknown.
    pub fn from_absolute(rect: Rect, page: Option<Size>, previous: RelativeRect) -> Self {
        let (pw, ph) = page.map(|s| (s.width, s.height)).unwrap_or((0.0, 0.0));
        Self {
            x: to_relative(rect.x0, pw, previous.x),
            y: to_relative(rect.y0, ph, previous.y),
            width: to_relative(rect.width(), pw, previous.width),
            height: to_relative(rect.height(), ph, previous.height),
        }
    }

    /// Reconstruct the absolute base-scale rectangle.
    pub fn to_absolute(&self, page: Size) -> Rect {
        Rect::from_origin_size(
            (from_relative(self.x, page.width), from_relative(self.y, page.height)),
            (
                from_relative(self.width, page.width),
                from_relative(self.height, page.height),
            ),
        )
    }
}

/// Relative line segment (both endpoints as page fractions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelativeLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Relative square: position as page fractions, side as a fraction of page width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelativeSquare {
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

/// Entities that carry both absolute and relative coordinates.
pub trait Anchored {
    /// Recompute relative values from the absolute ones.
    fn sync_relative(&mut self, page: Option<Size>);

    /// Recompute absolute values from the relative ones.
    fn restore_absolute(&mut self, page: Size);

    /// Follow a page size change from `previous` to `size`.
    ///
    /// The first measurement anchors relative values; a later one moves the
    /// absolute values to the new size.
    fn reanchor(&mut self, previous: Option<Size>, size: Size) {
        match previous {
            None => self.sync_relative(Some(size)),
            Some(_) => self.restore_absolute(size),
        }
    }
}

/// The mapping between base, display and physical pixel coordinates for one
/// page at the current zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSpace {
    /// Base-scale page dimensions, if the page has been measured.
    pub page_size: Option<Size>,
    /// Current display scale.
    pub scale: f64,
    /// Device pixel ratio of the output surface.
    pub device_pixel_ratio: f64,
}

impl Default for CoordinateSpace {
    fn default() -> Self {
        Self {
            page_size: None,
            scale: 1.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl CoordinateSpace {
    pub fn new(page_size: Option<Size>, scale: f64, device_pixel_ratio: f64) -> Self {
        Self {
            page_size,
            scale: safe_scale(scale),
            device_pixel_ratio: safe_scale(device_pixel_ratio),
        }
    }

    /// Base point to display point (before pan offset).
    pub fn display_point(&self, base: Point) -> Point {
        Point::new(to_display(base.x, self.scale), to_display(base.y, self.scale))
    }

    /// Display point to base point.
    pub fn base_point(&self, display: Point) -> Point {
        Point::new(to_base(display.x, self.scale), to_base(display.y, self.scale))
    }

    /// Base rectangle to display rectangle.
    pub fn display_rect(&self, base: Rect) -> Rect {
        Rect::from_points(
            self.display_point(base.origin()),
            self.display_point(Point::new(base.x1, base.y1)),
        )
    }

    /// Current display (container) size of the page.
    pub fn container_size(&self) -> Option<Size> {
        self.page_size
            .map(|s| Size::new(to_display(s.width, self.scale), to_display(s.height, self.scale)))
    }

    /// Physical pixel size of a surface covering the page at this scale.
    pub fn physical_page_size(&self) -> Option<(u32, u32)> {
        self.container_size()
            .map(|css| physical_size(css, self.device_pixel_ratio))
    }

    /// Scale factor from base units to physical pixels.
    pub fn pixels_per_unit(&self) -> f64 {
        self.scale * self.device_pixel_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_scale_defaults() {
        assert!((safe_scale(0.0) - 1.0).abs() < f64::EPSILON);
        assert!((safe_scale(-2.0) - 1.0).abs() < f64::EPSILON);
        assert!((safe_scale(f64::NAN) - 1.0).abs() < f64::EPSILON);
        assert!((safe_scale(2.5) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_relative_roundtrip() {
        for &d in &[1.0, 612.0, 792.0, 0.5, 1e6] {
            for &a in &[0.0, 1.0, 50.0, 123.456, 611.9] {
                let rel = to_relative(a, d, 0.0);
                assert!((from_relative(rel, d) - a).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_to_relative_guard_keeps_previous() {
        assert!((to_relative(100.0, 0.0, 0.25) - 0.25).abs() < f64::EPSILON);
        assert!((to_relative(100.0, -5.0, 0.5) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scale_invariance() {
        let base = Point::new(50.0, 73.25);
        for i in 0..=99 {
            let scale = 0.1 + i as f64 * 0.1;
            let space = CoordinateSpace::new(None, scale, 1.0);
            let back = space.base_point(space.display_point(base));
            assert!((back.x - base.x).abs() < 1e-9);
            assert!((back.y - base.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_display_at_double_zoom() {
        let space = CoordinateSpace::new(None, 2.0, 1.0);
        let p = space.display_point(Point::new(50.0, 50.0));
        assert!((p.x - 100.0).abs() < f64::EPSILON);
        assert!((p.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_scale_falls_back_to_identity() {
        assert!((to_base(40.0, 0.0) - 40.0).abs() < f64::EPSILON);
        assert!((to_display(40.0, 0.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_physical_size_dpr() {
        assert_eq!(physical_size(Size::new(612.0, 792.0), 2.0), (1224, 1584));
        assert_eq!(physical_size(Size::new(100.5, 0.0), 1.0), (101, 1));
    }

    #[test]
    fn test_relative_rect_unknown_page_keeps_previous() {
        let prev = RelativeRect { x: 0.1, y: 0.2, width: 0.3, height: 0.4 };
        let rel = RelativeRect::from_absolute(Rect::new(10.0, 10.0, 20.0, 20.0), None, prev);
        assert_eq!(rel, prev);
    }

    #[test]
    fn test_relative_rect_roundtrip() {
        let page = Size::new(612.0, 792.0);
        let rect = Rect::new(100.0, 100.0, 250.0, 140.0);
        let rel = RelativeRect::from_absolute(rect, Some(page), RelativeRect::default());
        let back = rel.to_absolute(page);
        assert!((back.x0 - rect.x0).abs() < 1e-9);
        assert!((back.y1 - rect.y1).abs() < 1e-9);
    }
}
