//! PDF render collaborator interface.
//!
//! Parsing and rasterising PDF content is delegated to a backend. The core
//! only needs page counts, page viewports and rendered pixels.

use crate::BoxFuture;
use kurbo::Size;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// PDF backend errors. Messages are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PdfError {
    #[error("{0}")]
    Load(String),
    #[error("{0}")]
    Render(String),
    #[error("Page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },
    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

/// Result type for PDF operations.
pub type PdfResult<T> = Result<T, PdfError>;

/// Pixel dimensions of a page at a given scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageViewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl PageViewport {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Whole-pixel dimensions, rounded up and at least one pixel.
    pub fn pixel_size(&self) -> (u32, u32) {
        crate::coords::physical_size(self.size(), 1.0)
    }
}

/// Premultiplied RGBA8 pixels, row-major, no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl RasterImage {
    /// A fully transparent image.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Wrap existing pixels; `None` when the buffer length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize * 4).then_some(Self { width, height, data })
    }

    /// RGBA of one pixel, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }
}

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfSource {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
    Url(String),
}

impl PdfSource {
    /// File name used for the persistence fingerprint.
    pub fn file_name(&self) -> String {
        match self {
            PdfSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            PdfSource::Bytes { name, .. } => name.clone(),
            PdfSource::Url(url) => url.rsplit('/').next().unwrap_or(url).to_string(),
        }
    }
}

/// Opens documents.
pub trait PdfBackend {
    fn load_from_path<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, PdfResult<Box<dyn PdfDocument>>>;

    fn load_from_bytes<'a>(
        &'a self,
        name: &'a str,
        data: &'a [u8],
    ) -> BoxFuture<'a, PdfResult<Box<dyn PdfDocument>>>;

    fn load_from_url<'a>(&'a self, url: &'a str) -> BoxFuture<'a, PdfResult<Box<dyn PdfDocument>>> {
        Box::pin(async move { Err(PdfError::Unsupported(url.to_string())) })
    }

    /// Dispatch on the source kind.
    fn load<'a>(&'a self, source: &'a PdfSource) -> BoxFuture<'a, PdfResult<Box<dyn PdfDocument>>> {
        match source {
            PdfSource::Path(path) => self.load_from_path(path),
            PdfSource::Bytes { name, data } => self.load_from_bytes(name, data),
            PdfSource::Url(url) => self.load_from_url(url),
        }
    }
}

/// A loaded document.
pub trait PdfDocument {
    fn num_pages(&self) -> u32;

    /// Fetch a one-based page.
    fn page(&self, number: u32) -> BoxFuture<'_, PdfResult<Box<dyn PdfPage>>>;
}

/// One page of a loaded document.
pub trait PdfPage {
    fn number(&self) -> u32;

    /// Page dimensions at `scale` (1.0 = intrinsic size).
    fn viewport(&self, scale: f64) -> PageViewport;

    /// Rasterise the page at `scale`.
    fn render(&self, scale: f64) -> BoxFuture<'_, PdfResult<RasterImage>>;
}
