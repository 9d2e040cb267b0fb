//! Viewport controller: the open document, the current page and the zoom.
//!
//! The controller decides *when* a page must be re-rendered and whether a
//! finished render still matches what the user is looking at. Rendering
//! itself is done by the PDF backend.

use crate::annotations::PageNumber;
use crate::coords::{CoordinateSpace, physical_size, safe_scale};
use crate::config::EditorConfig;
use crate::pdf::{PdfBackend, PdfDocument, PdfError, PdfResult, PdfSource, RasterImage};
use kurbo::{Affine, Point, Size, Vec2};
use thiserror::Error;

/// Viewport errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewportError {
    #[error("No document loaded")]
    NoDocument,
    #[error("Page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: PageNumber, count: u32 },
    #[error("Page size is not known yet")]
    NotMeasured,
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

/// Result type for viewport operations.
pub type ViewportResult<T> = Result<T, ViewportError>;

/// Lifecycle of the viewport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Rendering,
    Ready,
    /// Load failed; holds the message shown to the user.
    Error(String),
}

/// Size shared by every stacked surface (PDF raster, freehand, vector).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSizes {
    /// Display size (base size × scale).
    pub css: Size,
    /// Backing pixel size (display size × device pixel ratio).
    pub physical: (u32, u32),
}

impl SurfaceSizes {
    pub fn for_page(base: Size, scale: f64, device_pixel_ratio: f64) -> Self {
        let scale = safe_scale(scale);
        let css = Size::new(base.width * scale, base.height * scale);
        Self {
            css,
            physical: physical_size(css, device_pixel_ratio),
        }
    }
}

/// Identifies one render pass and the view state it was started for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTicket {
    pub page: PageNumber,
    pub scale: f64,
    pub device_pixel_ratio: f64,
}

impl RenderTicket {
    /// Scale passed to the backend.
    pub fn render_scale(&self) -> f64 {
        self.scale * self.device_pixel_ratio
    }
}

/// A rendered page as handed back by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRender {
    /// Intrinsic (scale 1.0) page size.
    pub base_size: Size,
    pub image: RasterImage,
}

/// What happened to a finished render.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// The render matched the current view; all surfaces take these sizes.
    Applied(SurfaceSizes),
    /// The page or scale changed while rendering; the result was discarded.
    Stale,
    /// The backend failed; the page is retried on the next navigation.
    Failed(PdfError),
}

/// Owns the document, the current page and the zoom.
pub struct ViewportController {
    state: ViewState,
    document: Option<Box<dyn PdfDocument>>,
    file_name: Option<String>,
    current_page: PageNumber,
    scale: f64,
    offset: Vec2,
    device_pixel_ratio: f64,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
    fit_padding: f64,
    is_rendering: bool,
    needs_render: bool,
    base_page_size: Option<Size>,
    surfaces: Option<SurfaceSizes>,
    page_raster: Option<RasterImage>,
}

impl std::fmt::Debug for ViewportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportController")
            .field("state", &self.state)
            .field("file_name", &self.file_name)
            .field("current_page", &self.current_page)
            .field("num_pages", &self.num_pages())
            .field("scale", &self.scale)
            .field("offset", &self.offset)
            .field("is_rendering", &self.is_rendering)
            .field("needs_render", &self.needs_render)
            .finish()
    }
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl ViewportController {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            state: ViewState::Idle,
            document: None,
            file_name: None,
            current_page: 1,
            scale: 1.0,
            offset: Vec2::ZERO,
            device_pixel_ratio: safe_scale(config.device_pixel_ratio),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_step: config.zoom_step,
            fit_padding: config.fit_padding,
            is_rendering: false,
            needs_render: false,
            base_page_size: None,
            surfaces: None,
            page_raster: None,
        }
    }

    // --- document ---

    /// Open a document. On failure nothing of the previous or the failed
    /// document is kept and the state is [`ViewState::Error`].
    pub async fn load(
        &mut self,
        backend: &dyn PdfBackend,
        source: &PdfSource,
    ) -> ViewportResult<u32> {
        self.close();
        self.state = ViewState::Loading;
        log::info!("Loading document {}", source.file_name());

        match backend.load(source).await {
            Ok(document) => {
                let pages = document.num_pages();
                self.document = Some(document);
                self.file_name = Some(source.file_name());
                self.current_page = 1;
                self.needs_render = true;
                self.state = ViewState::Ready;
                log::info!("Loaded {} ({pages} pages)", source.file_name());
                Ok(pages)
            }
            Err(err) => {
                log::error!("Failed to load {}: {err}", source.file_name());
                self.state = ViewState::Error(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Drop the document and every derived surface.
    pub fn close(&mut self) {
        self.document = None;
        self.file_name = None;
        self.current_page = 1;
        self.is_rendering = false;
        self.needs_render = false;
        self.base_page_size = None;
        self.surfaces = None;
        self.page_raster = None;
        self.state = ViewState::Idle;
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn document(&self) -> Option<&dyn PdfDocument> {
        self.document.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn num_pages(&self) -> u32 {
        self.document.as_ref().map(|d| d.num_pages()).unwrap_or(0)
    }

    // --- navigation ---

    pub fn current_page(&self) -> PageNumber {
        self.current_page
    }

    /// Show page `page`. Navigating to the current page again re-requests
    /// its render (retry after a failure).
    pub fn go_to_page(&mut self, page: PageNumber) -> ViewportResult<()> {
        let count = self.num_pages();
        if self.document.is_none() {
            return Err(ViewportError::NoDocument);
        }
        if page == 0 || page > count {
            return Err(ViewportError::PageOutOfRange { page, count });
        }
        if page != self.current_page {
            self.base_page_size = None;
        }
        self.current_page = page;
        self.needs_render = true;
        Ok(())
    }

    pub fn next_page(&mut self) -> ViewportResult<()> {
        self.go_to_page(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> ViewportResult<()> {
        self.go_to_page(self.current_page.saturating_sub(1))
    }

    // --- zoom and pan ---

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Set the zoom, clamped to the configured range. Non-finite input is ignored.
    pub fn set_scale(&mut self, scale: f64) {
        if !scale.is_finite() {
            log::warn!("Ignoring non-finite scale {scale}");
            return;
        }
        let scale = scale.clamp(self.min_zoom, self.max_zoom);
        if (scale - self.scale).abs() > f64::EPSILON {
            self.scale = scale;
            self.needs_render = true;
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_scale(self.scale * self.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_scale(self.scale / self.zoom_step);
    }

    /// Back to 100 % with no pan offset.
    pub fn reset_zoom(&mut self) {
        self.offset = Vec2::ZERO;
        self.set_scale(1.0);
    }

    /// Zoom by `factor`, keeping the page point under `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let before = self.scale;
        let base_point = self.screen_to_base(screen_point);
        self.set_scale(self.scale * factor);
        if (self.scale - before).abs() < f64::EPSILON {
            return;
        }

        // Adjust offset so base_point stays at screen_point
        let new_screen = self.base_to_screen(base_point);
        self.offset += screen_point - new_screen;
    }

    /// Pan by a delta in screen pixels. Stored data is never touched.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Scale the page so its width fills `container` minus padding.
    pub fn fit_to_width(&mut self, container: Size) -> ViewportResult<f64> {
        let base = self.base_page_size.ok_or(ViewportError::NotMeasured)?;
        let available = (container.width - self.fit_padding * 2.0).max(1.0);
        self.set_scale(available / base.width);
        let left = (container.width - base.width * self.scale) / 2.0;
        self.offset = Vec2::new(left, self.fit_padding);
        Ok(self.scale)
    }

    /// Scale the page so its height fills `container` minus padding.
    pub fn fit_to_height(&mut self, container: Size) -> ViewportResult<f64> {
        let base = self.base_page_size.ok_or(ViewportError::NotMeasured)?;
        let available = (container.height - self.fit_padding * 2.0).max(1.0);
        self.set_scale(available / base.height);
        self.offset = Vec2::new(
            (container.width - base.width * self.scale) / 2.0,
            (container.height - base.height * self.scale) / 2.0,
        );
        Ok(self.scale)
    }

    /// Base-scale page coordinates to screen pixels (pan included).
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.scale)
    }

    pub fn base_to_screen(&self, base: Point) -> Point {
        self.transform() * base
    }

    pub fn screen_to_base(&self, screen: Point) -> Point {
        self.transform().inverse() * screen
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Changing the device pixel ratio (e.g. moving to another monitor)
    /// requires new surfaces.
    pub fn set_device_pixel_ratio(&mut self, dpr: f64) {
        let dpr = safe_scale(dpr);
        if (dpr - self.device_pixel_ratio).abs() > f64::EPSILON {
            self.device_pixel_ratio = dpr;
            self.needs_render = true;
        }
    }

    pub fn coordinate_space(&self) -> CoordinateSpace {
        CoordinateSpace::new(self.base_page_size, self.scale, self.device_pixel_ratio)
    }

    // --- rendering ---

    pub fn is_rendering(&self) -> bool {
        self.is_rendering
    }

    /// Whether the view changed since the last applied render.
    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    /// Ask for a render on the next pass.
    pub fn request_render(&mut self) {
        self.needs_render = true;
    }

    pub fn base_page_size(&self) -> Option<Size> {
        self.base_page_size
    }

    pub fn surfaces(&self) -> Option<SurfaceSizes> {
        self.surfaces
    }

    /// The last applied PDF raster of the current page.
    pub fn page_raster(&self) -> Option<&RasterImage> {
        self.page_raster.as_ref()
    }

    /// Start a render pass for the current view.
    ///
    /// Returns `None` when no document is open or a render is already in
    /// flight; the request is dropped, and the view state it was made for is
    /// picked up by the next pass.
    pub fn begin_render(&mut self) -> Option<RenderTicket> {
        self.document.as_ref()?;
        if self.is_rendering {
            log::debug!("Render of page {} dropped: render in progress", self.current_page);
            self.needs_render = true;
            return None;
        }
        self.is_rendering = true;
        self.needs_render = false;
        self.state = ViewState::Rendering;
        Some(RenderTicket {
            page: self.current_page,
            scale: self.scale,
            device_pixel_ratio: self.device_pixel_ratio,
        })
    }

    /// Complete a render pass started by [`Self::begin_render`].
    pub fn finish_render(
        &mut self,
        ticket: RenderTicket,
        result: PdfResult<PageRender>,
    ) -> RenderOutcome {
        self.is_rendering = false;
        self.state = ViewState::Ready;

        let current = ticket.page == self.current_page
            && (ticket.scale - self.scale).abs() < f64::EPSILON
            && (ticket.device_pixel_ratio - self.device_pixel_ratio).abs() < f64::EPSILON;
        if !current {
            log::debug!(
                "Discarding stale render of page {} at {:.2}x (now page {} at {:.2}x)",
                ticket.page,
                ticket.scale,
                self.current_page,
                self.scale
            );
            self.needs_render = true;
            return RenderOutcome::Stale;
        }

        match result {
            Ok(render) => {
                let sizes =
                    SurfaceSizes::for_page(render.base_size, self.scale, self.device_pixel_ratio);
                self.base_page_size = Some(render.base_size);
                self.surfaces = Some(sizes);
                self.page_raster = Some(render.image);
                RenderOutcome::Applied(sizes)
            }
            Err(err) => {
                log::error!("Failed to render page {}: {err}", ticket.page);
                RenderOutcome::Failed(err)
            }
        }
    }

    /// Render the current page through the backend.
    ///
    /// Returns `None` when the request was dropped.
    pub async fn render_current_page(&mut self) -> Option<RenderOutcome> {
        let ticket = self.begin_render()?;
        let result = match self.document.as_deref() {
            Some(document) => render_page(document, ticket.page, ticket.render_scale()).await,
            None => Err(PdfError::Render("document closed during render".to_string())),
        };
        Some(self.finish_render(ticket, result))
    }

    /// Render a small preview of any page, at most `max_width` pixels wide.
    pub async fn render_thumbnail(
        &self,
        page: PageNumber,
        max_width: f64,
    ) -> ViewportResult<RasterImage> {
        let document = self.document.as_deref().ok_or(ViewportError::NoDocument)?;
        let pdf_page = document.page(page).await?;
        let base = pdf_page.viewport(1.0);
        let scale = (max_width / base.width).min(1.0);
        Ok(pdf_page.render(safe_scale(scale)).await?)
    }
}

/// Fetch and rasterise one page at `render_scale`.
pub async fn render_page(
    document: &dyn PdfDocument,
    page: PageNumber,
    render_scale: f64,
) -> PdfResult<PageRender> {
    let pdf_page = document.page(page).await?;
    let base_size = pdf_page.viewport(1.0).size();
    let image = pdf_page.render(render_scale).await?;
    Ok(PageRender { base_size, image })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::{BlankBackend, block_on};
    use std::path::PathBuf;

    const LETTER: Size = Size::new(612.0, 792.0);

    fn loaded(pages: u32) -> (ViewportController, BlankBackend) {
        let backend = BlankBackend::new(pages, LETTER);
        let mut viewport = ViewportController::default();
        let source = PdfSource::Path(PathBuf::from("doc.pdf"));
        block_on(viewport.load(&backend, &source)).unwrap();
        (viewport, backend)
    }

    #[test]
    fn test_load_success_and_failure() {
        let (mut viewport, backend) = loaded(3);
        assert_eq!(viewport.state(), &ViewState::Ready);
        assert_eq!(viewport.num_pages(), 3);

        let bad = PdfSource::Bytes {
            name: "broken.pdf".to_string(),
            data: b"garbage".to_vec(),
        };
        let err = block_on(viewport.load(&backend, &bad)).unwrap_err();
        assert_eq!(err, ViewportError::Pdf(PdfError::Load("Invalid PDF structure".to_string())));
        assert_eq!(viewport.state(), &ViewState::Error("Invalid PDF structure".to_string()));
        assert!(viewport.document().is_none());
        assert_eq!(viewport.num_pages(), 0);
    }

    #[test]
    fn test_navigation_bounds() {
        let (mut viewport, _) = loaded(3);
        viewport.next_page().unwrap();
        viewport.next_page().unwrap();
        assert_eq!(viewport.current_page(), 3);
        let err = viewport.next_page();
        assert!(matches!(err, Err(ViewportError::PageOutOfRange { page: 4, count: 3 })));
        viewport.go_to_page(1).unwrap();
        assert!(viewport.previous_page().is_err());
        assert_eq!(viewport.current_page(), 1);
    }

    #[test]
    fn test_navigation_without_document() {
        let mut viewport = ViewportController::default();
        assert_eq!(viewport.go_to_page(1), Err(ViewportError::NoDocument));
        assert!(viewport.begin_render().is_none());
    }

    #[test]
    fn test_zoom_clamped() {
        let mut viewport = ViewportController::default();
        for _ in 0..50 {
            viewport.zoom_in();
        }
        assert!((viewport.scale() - 10.0).abs() < f64::EPSILON);
        for _ in 0..100 {
            viewport.zoom_out();
        }
        assert!((viewport.scale() - 0.1).abs() < f64::EPSILON);
        viewport.reset_zoom();
        assert!((viewport.scale() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_double_zoom_maps_base_to_screen() {
        let mut viewport = ViewportController::default();
        viewport.set_scale(2.0);
        let screen = viewport.base_to_screen(Point::new(50.0, 50.0));
        assert!((screen.x - 100.0).abs() < 1e-9);
        assert!((screen.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_at_keeps_point_fixed() {
        let mut viewport = ViewportController::default();
        viewport.pan(Vec2::new(30.0, -12.0));
        let screen = Point::new(200.0, 150.0);
        let base_before = viewport.screen_to_base(screen);
        viewport.zoom_at(screen, 2.5);
        let base_after = viewport.screen_to_base(screen);
        assert!((base_before.x - base_after.x).abs() < 1e-9);
        assert!((base_before.y - base_after.y).abs() < 1e-9);
    }

    #[test]
    fn test_render_applies_dpr_sizes() {
        let (mut viewport, _) = loaded(1);
        viewport.set_device_pixel_ratio(2.0);
        let outcome = block_on(viewport.render_current_page()).unwrap();
        let expected = SurfaceSizes {
            css: LETTER,
            physical: (1224, 1584),
        };
        assert_eq!(outcome, RenderOutcome::Applied(expected));
        assert_eq!(viewport.page_raster().map(|r| (r.width, r.height)), Some((1224, 1584)));
        assert_eq!(viewport.state(), &ViewState::Ready);
        assert!(!viewport.needs_render());
    }

    #[test]
    fn test_request_during_render_is_dropped() {
        let (mut viewport, _) = loaded(2);
        let ticket = viewport.begin_render().unwrap();
        assert_eq!(viewport.state(), &ViewState::Rendering);
        assert!(viewport.begin_render().is_none());
        assert!(viewport.is_rendering());

        let image = RasterImage::transparent(612, 792);
        let outcome = viewport.finish_render(ticket, Ok(PageRender { base_size: LETTER, image }));
        assert!(matches!(outcome, RenderOutcome::Applied(_)));
        assert!(viewport.begin_render().is_some());
    }

    #[test]
    fn test_stale_render_is_discarded() {
        let (mut viewport, _) = loaded(2);
        let ticket = viewport.begin_render().unwrap();
        viewport.zoom_in();

        let image = RasterImage::transparent(612, 792);
        let outcome = viewport.finish_render(ticket, Ok(PageRender { base_size: LETTER, image }));
        assert_eq!(outcome, RenderOutcome::Stale);
        assert!(viewport.page_raster().is_none());
        assert!(viewport.needs_render());
    }

    #[test]
    fn test_failed_render_waits_for_navigation() {
        let mut backend = BlankBackend::new(2, LETTER);
        backend.failing_pages = vec![2];
        let mut viewport = ViewportController::default();
        block_on(viewport.load(&backend, &PdfSource::Path(PathBuf::from("a.pdf")))).unwrap();
        viewport.go_to_page(2).unwrap();

        let outcome = block_on(viewport.render_current_page()).unwrap();
        assert!(matches!(outcome, RenderOutcome::Failed(PdfError::Render(_))));
        assert_eq!(viewport.state(), &ViewState::Ready);
        assert!(!viewport.needs_render());

        viewport.go_to_page(2).unwrap();
        assert!(viewport.needs_render());
        assert_eq!(backend.renders.get(), 1);
    }

    #[test]
    fn test_fit_to_width_needs_measured_page() {
        let (mut viewport, _) = loaded(1);
        let fit = viewport.fit_to_width(Size::new(1000.0, 800.0));
        assert_eq!(fit, Err(ViewportError::NotMeasured));

        block_on(viewport.render_current_page());
        let scale = viewport.fit_to_width(Size::new(692.0, 800.0)).unwrap();
        assert!((scale - 1.0).abs() < 1e-9);
        let scale = viewport.fit_to_height(Size::new(692.0, 476.0)).unwrap();
        assert!((scale - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_thumbnail_fits_width() {
        let (viewport, _) = loaded(2);
        let thumb = block_on(viewport.render_thumbnail(2, 153.0)).unwrap();
        assert_eq!(thumb.width, 153);
        assert_eq!(thumb.height, 198);
    }
}
