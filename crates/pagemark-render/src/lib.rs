//! Pagemark Render Library
//!
//! CPU rasterisation of the annotation layers with tiny-skia, and the
//! export pipeline that composites them over rendered PDF pages.

mod renderer;
pub mod export;
pub mod raster;
pub mod vector;

pub use export::{
    ExportError, ExportResult, encode_png, export_document, export_page, merge_page, merged_canvas,
};
pub use raster::RasterLayer;
pub use renderer::{RenderError, RenderResult, pixmap_to_raster, raster_to_pixmap, to_skia_path};
pub use vector::VectorLayer;
