//! Boundary to the vector shape layer.
//!
//! The shape layer owns interactive editing of vector shapes. It reports
//! changes as [`ShapeEvent`]s which the store turns into its own mutations
//! (see [`crate::store::AnnotationStore::apply_shape_event`]).

use crate::annotations::{AnnotationId, PageNumber, ShapeObject};
use crate::pdf::RasterImage;
use thiserror::Error;

/// Shape layer errors.
#[derive(Debug, Error)]
pub enum ShapeLayerError {
    #[error("Malformed shape {id}: {reason}")]
    MalformedShape { id: AnnotationId, reason: String },
    #[error("Shape layer has no surface")]
    NoSurface,
    #[error("Shape layer error: {0}")]
    Other(String),
}

/// Result type for shape layer operations.
pub type ShapeLayerResult<T> = Result<T, ShapeLayerError>;

/// Change reported by the shape layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeEvent {
    Added(ShapeObject),
    Updated(ShapeObject),
    Deleted { id: AnnotationId, page: PageNumber },
}

/// Tools understood by the shape layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeTool {
    #[default]
    Select,
    Rectangle,
    Circle,
    Star,
    Polygon,
    Line,
    Text,
}

/// A vector shape surface stacked above the freehand layer.
pub trait ShapeLayer {
    /// Switch the active shape tool.
    fn set_tool(&mut self, tool: ShapeTool);

    /// Create a text shape at a base-scale position.
    fn add_text(&mut self, x: f64, y: f64);

    /// Page shown by the layer and its base-unit to pixel factor.
    fn set_view(&mut self, _page: PageNumber, _pixels_per_unit: f64) {}

    /// Replace the displayed shapes (current page only).
    fn load_shapes(&mut self, shapes: &[ShapeObject]);

    /// Resize the surface to the given physical pixel size.
    fn resize(&mut self, width: u32, height: u32);

    /// Rasterise the layer at its current size.
    fn export_as_canvas(&self) -> ShapeLayerResult<RasterImage>;

    /// Take the events produced since the last call.
    fn drain_events(&mut self) -> Vec<ShapeEvent>;
}
