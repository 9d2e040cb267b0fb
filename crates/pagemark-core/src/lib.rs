//! Pagemark Core Library
//!
//! Platform-agnostic annotation model, drawing engine, viewport logic and
//! persistence for the Pagemark PDF annotator.

use std::future::Future;
use std::pin::Pin;

pub mod annotations;
pub mod config;
pub mod coords;
pub mod drawing;
pub mod editor;
pub mod history;
pub mod page;
pub mod pdf;
pub mod shape_layer;
pub mod storage;
pub mod store;
pub mod viewport;

/// Boxed future returned by the async backend traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub use annotations::{
    Annotation, AnnotationId, AnnotationKind, ArrowAnnotation, DrawingPath, DrawingTool, PageItem,
    PageNumber, SerializableColor, ShapeGeometry, ShapeObject, ShapeStyle, StampAnnotation,
    StickyNote, StrokePoint, TextAnnotation,
};
pub use config::{ConfigError, EditorConfig};
pub use coords::CoordinateSpace;
pub use drawing::{StrokeCapture, erase, smooth_path};
pub use editor::{EditAction, Editor, Tool};
pub use history::{History, HistoryEntry, MAX_UNDO_HISTORY};
pub use page::{PageAnnotations, PageMap};
pub use pdf::{PdfBackend, PdfDocument, PdfError, PdfPage, PdfResult, PdfSource, RasterImage};
pub use shape_layer::{ShapeEvent, ShapeLayer, ShapeLayerError, ShapeTool};
pub use storage::{
    AnnotationRecord, AutoSaveManager, DocumentFingerprint, DynAutoSaveManager, MemoryStorage,
    SaveTarget, Storage, StorageError,
};
pub use store::{AnnotationStore, StoreError, StoreEvent};
pub use viewport::{RenderOutcome, SurfaceSizes, ViewState, ViewportController, ViewportError};
