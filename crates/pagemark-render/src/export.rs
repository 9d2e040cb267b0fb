//! Export / merge pipeline.
//!
//! A page is exported by re-rendering the PDF at its intrinsic size times
//! the device pixel ratio and compositing the freehand and vector layers
//! over it, in that order. Layers of a different pixel size are scaled to
//! the PDF layer with bilinear sampling.

use crate::raster::RasterLayer;
use crate::renderer::{RenderError, new_pixmap, raster_to_pixmap};
use crate::vector::VectorLayer;
use pagemark_core::coords::safe_scale;
use pagemark_core::shape_layer::ShapeLayerResult;
use pagemark_core::{
    PageAnnotations, PageMap, PageNumber, PdfDocument, RasterImage, ShapeLayer, ViewportController,
};
use thiserror::Error;
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, Transform};

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF layer of page {page} unavailable: {reason}")]
    MissingPdfLayer { page: PageNumber, reason: String },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Failed to encode PNG: {0}")]
    Encode(#[from] png::EncodingError),
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Draw `layer` over `target`, stretched to cover it.
fn draw_layer(target: &mut Pixmap, layer: &Pixmap) {
    let sx = target.width() as f32 / layer.width() as f32;
    let sy = target.height() as f32 / layer.height() as f32;
    let quality = if sx == 1.0 && sy == 1.0 {
        FilterQuality::Nearest
    } else {
        FilterQuality::Bilinear
    };
    let paint = PixmapPaint {
        quality,
        ..PixmapPaint::default()
    };
    target.draw_pixmap(0, 0, layer.as_ref(), &paint, Transform::from_scale(sx, sy), None);
}

/// Composite one page: PDF, then freehand drawing, then vector shapes.
///
/// The output has the PDF layer's pixel size. A missing PDF layer aborts
/// the merge; a failed vector layer is logged and left out.
pub fn merge_page(
    page: PageNumber,
    pdf: Option<&Pixmap>,
    drawing: Option<&Pixmap>,
    vector: ShapeLayerResult<RasterImage>,
) -> ExportResult<Pixmap> {
    let pdf = pdf.ok_or_else(|| ExportError::MissingPdfLayer {
        page,
        reason: "no rendered page".to_string(),
    })?;
    let mut output = new_pixmap(pdf.width(), pdf.height())?;
    draw_layer(&mut output, pdf);

    if let Some(drawing) = drawing {
        draw_layer(&mut output, drawing);
    }

    let vector = vector
        .map_err(|e| e.to_string())
        .and_then(|image| raster_to_pixmap(&image).map_err(|e| e.to_string()));
    match vector {
        Ok(vector) => draw_layer(&mut output, &vector),
        Err(e) => log::warn!("Exporting page {page} without its vector layer: {e}"),
    }
    Ok(output)
}

/// Re-render the PDF page at intrinsic size × `device_pixel_ratio`.
async fn render_pdf_layer(
    document: &dyn PdfDocument,
    page: PageNumber,
    device_pixel_ratio: f64,
) -> ExportResult<Pixmap> {
    let missing = |reason: String| ExportError::MissingPdfLayer { page, reason };
    let pdf_page = document.page(page).await.map_err(|e| missing(e.to_string()))?;
    let image = pdf_page.render(device_pixel_ratio).await.map_err(|e| missing(e.to_string()))?;
    raster_to_pixmap(&image).map_err(|e| missing(e.to_string()))
}

/// Export one page with every layer rendered at export resolution.
pub async fn export_page(
    document: &dyn PdfDocument,
    page: PageNumber,
    annotations: Option<&PageAnnotations>,
    device_pixel_ratio: f64,
) -> ExportResult<Pixmap> {
    let dpr = safe_scale(device_pixel_ratio);
    let pdf = render_pdf_layer(document, page, dpr).await?;
    let (width, height) = (pdf.width(), pdf.height());

    let mut drawing = RasterLayer::with_size(width, height, dpr);
    let mut vector = VectorLayer::new();
    vector.set_view(page, dpr);
    vector.resize(width, height);
    if let Some(annotations) = annotations {
        drawing.render_paths(&annotations.paths);
        vector.load_page(annotations);
    }

    log::debug!("Exporting page {page} at {width}x{height}");
    merge_page(page, Some(&pdf), drawing.pixmap(), vector.export_as_canvas())
}

/// Export every page of the document.
pub async fn export_document(
    document: &dyn PdfDocument,
    pages: &PageMap,
    device_pixel_ratio: f64,
) -> ExportResult<Vec<Pixmap>> {
    let count = document.num_pages();
    let mut output = Vec::with_capacity(count as usize);
    for page in 1..=count {
        output.push(export_page(document, page, pages.get(&page), device_pixel_ratio).await?);
    }
    log::info!("Exported {count} page(s)");
    Ok(output)
}

/// Composite the current page as shown: a fresh export-resolution PDF
/// raster under the on-screen drawing and vector layers.
///
/// Returns `None` when no document is open.
pub async fn merged_canvas(
    viewport: &ViewportController,
    drawing: &RasterLayer,
    vector: &dyn ShapeLayer,
) -> ExportResult<Option<Pixmap>> {
    let Some(document) = viewport.document() else {
        return Ok(None);
    };
    let page = viewport.current_page();
    let pdf = render_pdf_layer(document, page, viewport.device_pixel_ratio()).await?;
    merge_page(page, Some(&pdf), drawing.pixmap(), vector.export_as_canvas()).map(Some)
}

/// Encode as an 8-bit RGBA PNG.
pub fn encode_png(pixmap: &Pixmap) -> ExportResult<Vec<u8>> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
        writer.finish()?;
    }
    Ok(out)
}
