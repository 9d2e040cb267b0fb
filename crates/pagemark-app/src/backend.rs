//! Page images as a document backend.
//!
//! Each PNG file is one page, one pixel per base unit. Rendering at a scale
//! resamples the image bilinearly.

use crate::app::{AppError, AppResult};
use kurbo::Size;
use pagemark_core::coords::physical_size;
use pagemark_core::pdf::PageViewport;
use pagemark_core::{BoxFuture, PdfBackend, PdfDocument, PdfError, PdfPage, PdfResult, RasterImage};
use pagemark_render::{pixmap_to_raster, raster_to_pixmap};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::{ColorU8, FilterQuality, Pixmap, PixmapPaint, Transform};

/// Decode a PNG into premultiplied RGBA8.
pub fn decode_png(reader: impl Read) -> Result<RasterImage, png::DecodingError> {
    let mut decoder = png::Decoder::new(reader);
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    let bytes = &buf[..info.buffer_size()];

    let rgba: Vec<[u8; 4]> = match info.color_type {
        png::ColorType::Rgba => bytes.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect(),
        png::ColorType::Rgb => bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2], 255]).collect(),
        png::ColorType::GrayscaleAlpha => {
            bytes.chunks_exact(2).map(|c| [c[0], c[0], c[0], c[1]]).collect()
        }
        png::ColorType::Grayscale => bytes.iter().map(|&g| [g, g, g, 255]).collect(),
        // Expanded to RGB(A) by the normalize transformation.
        png::ColorType::Indexed => {
            return Err(png::DecodingError::LimitsExceeded);
        }
    };

    let mut data = Vec::with_capacity(rgba.len() * 4);
    for [r, g, b, a] in rgba {
        let p = ColorU8::from_rgba(r, g, b, a).premultiply();
        data.extend_from_slice(&[p.red(), p.green(), p.blue(), p.alpha()]);
    }
    Ok(RasterImage {
        width: info.width,
        height: info.height,
        data,
    })
}

fn load_page_image(path: &Path) -> AppResult<RasterImage> {
    let file = std::fs::File::open(path).map_err(|e| AppError::Io(path.to_path_buf(), e))?;
    decode_png(std::io::BufReader::new(file)).map_err(|e| AppError::Image(path.to_path_buf(), e))
}

/// A document made of page images.
#[derive(Debug, Clone)]
pub struct ImageDocument {
    pages: Vec<Arc<RasterImage>>,
}

impl ImageDocument {
    pub fn new(pages: Vec<RasterImage>) -> Self {
        Self {
            pages: pages.into_iter().map(Arc::new).collect(),
        }
    }

    /// Decode one page per file, in order.
    pub fn open(paths: &[PathBuf]) -> AppResult<Self> {
        let pages = paths.iter().map(|p| load_page_image(p)).collect::<AppResult<Vec<_>>>()?;
        log::info!("Opened {} page image(s)", pages.len());
        Ok(Self::new(pages))
    }

    /// Base-scale size of a one-based page.
    pub fn page_size(&self, page: u32) -> Option<Size> {
        let image = self.pages.get(page.checked_sub(1)? as usize)?;
        Some(Size::new(image.width as f64, image.height as f64))
    }
}

struct ImagePage {
    number: u32,
    image: Arc<RasterImage>,
}

impl PdfDocument for ImageDocument {
    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, number: u32) -> BoxFuture<'_, PdfResult<Box<dyn PdfPage>>> {
        Box::pin(async move {
            let count = self.num_pages();
            let image = number
                .checked_sub(1)
                .and_then(|i| self.pages.get(i as usize))
                .ok_or(PdfError::PageOutOfRange { page: number, count })?;
            Ok(Box::new(ImagePage {
                number,
                image: Arc::clone(image),
            }) as Box<dyn PdfPage>)
        })
    }
}

impl PdfPage for ImagePage {
    fn number(&self) -> u32 {
        self.number
    }

    fn viewport(&self, scale: f64) -> PageViewport {
        PageViewport {
            width: self.image.width as f64 * scale,
            height: self.image.height as f64 * scale,
            scale,
        }
    }

    fn render(&self, scale: f64) -> BoxFuture<'_, PdfResult<RasterImage>> {
        Box::pin(async move {
            if (scale - 1.0).abs() < f64::EPSILON {
                return Ok(self.image.as_ref().clone());
            }
            let source =
                raster_to_pixmap(&self.image).map_err(|e| PdfError::Render(e.to_string()))?;
            let (width, height) = physical_size(self.viewport(scale).size(), 1.0);
            let mut target = Pixmap::new(width, height)
                .ok_or_else(|| PdfError::Render(format!("Invalid render size {width}x{height}")))?;
            let paint = PixmapPaint {
                quality: FilterQuality::Bilinear,
                ..PixmapPaint::default()
            };
            let transform = Transform::from_scale(
                width as f32 / source.width() as f32,
                height as f32 / source.height() as f32,
            );
            target.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
            Ok(pixmap_to_raster(&target))
        })
    }
}

/// Opens single PNG files or PNG bytes as one-page documents.
#[derive(Debug, Default)]
pub struct ImageBackend;

impl PdfBackend for ImageBackend {
    fn load_from_path<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, PdfResult<Box<dyn PdfDocument>>> {
        Box::pin(async move {
            let image = load_page_image(path).map_err(|e| PdfError::Load(e.to_string()))?;
            Ok(Box::new(ImageDocument::new(vec![image])) as Box<dyn PdfDocument>)
        })
    }

    fn load_from_bytes<'a>(
        &'a self,
        name: &'a str,
        data: &'a [u8],
    ) -> BoxFuture<'a, PdfResult<Box<dyn PdfDocument>>> {
        Box::pin(async move {
            let image = decode_png(data).map_err(|e| PdfError::Load(format!("{name}: {e}")))?;
            Ok(Box::new(ImageDocument::new(vec![image])) as Box<dyn PdfDocument>)
        })
    }
}
