//! End-to-end scenarios: store → layers → merged export.

use kurbo::{Point, Rect, Size};
use pagemark_core::pdf::PageViewport;
use pagemark_core::shape_layer::ShapeLayerResult;
use pagemark_core::{
    AnnotationStore, BoxFuture, DrawingPath, DrawingTool, PdfDocument, PdfError, PdfPage, PdfResult,
    RasterImage, SerializableColor, ShapeGeometry, ShapeObject, ShapeStyle, StrokePoint,
    TextAnnotation,
};
use pagemark_render::{ExportError, RasterLayer, VectorLayer, export_document, export_page};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}

/// White pages of a fixed size. Pages listed in `broken` fail to render.
struct WhiteDocument {
    pages: u32,
    size: Size,
    broken: Vec<u32>,
}

struct WhitePage {
    number: u32,
    size: Size,
    broken: bool,
}

impl PdfDocument for WhiteDocument {
    fn num_pages(&self) -> u32 {
        self.pages
    }

    fn page(&self, number: u32) -> BoxFuture<'_, PdfResult<Box<dyn PdfPage>>> {
        Box::pin(async move {
            if number == 0 || number > self.pages {
                return Err(PdfError::PageOutOfRange {
                    page: number,
                    count: self.pages,
                });
            }
            Ok(Box::new(WhitePage {
                number,
                size: self.size,
                broken: self.broken.contains(&number),
            }) as Box<dyn PdfPage>)
        })
    }
}

impl PdfPage for WhitePage {
    fn number(&self) -> u32 {
        self.number
    }

    fn viewport(&self, scale: f64) -> PageViewport {
        PageViewport {
            width: self.size.width * scale,
            height: self.size.height * scale,
            scale,
        }
    }

    fn render(&self, scale: f64) -> BoxFuture<'_, PdfResult<RasterImage>> {
        Box::pin(async move {
            if self.broken {
                return Err(PdfError::Render("corrupt content stream".to_string()));
            }
            let (width, height) = self.viewport(scale).pixel_size();
            let data = vec![255; width as usize * height as usize * 4];
            RasterImage::from_rgba(width, height, data)
                .ok_or_else(|| PdfError::Render("bad size".to_string()))
        })
    }
}

fn document(pages: u32) -> WhiteDocument {
    WhiteDocument {
        pages,
        size: Size::new(200.0, 100.0),
        broken: Vec::new(),
    }
}

fn blue_stroke(page: u32) -> DrawingPath {
    DrawingPath::new(
        DrawingTool::Pencil,
        SerializableColor::new(0, 0, 255, 255),
        6.0,
        vec![StrokePoint::new(10.0, 50.0), StrokePoint::new(190.0, 50.0)],
        page,
    )
}

fn red_square(page: u32) -> ShapeObject {
    ShapeObject::rectangle(
        page,
        Rect::new(80.0, 30.0, 120.0, 70.0),
        ShapeStyle {
            stroke: SerializableColor::new(255, 0, 0, 255),
            fill: Some(SerializableColor::new(255, 0, 0, 255)),
            stroke_width: 1.0,
            opacity: 1.0,
        },
    )
}

fn rgba(pixmap: &tiny_skia::Pixmap, x: u32, y: u32) -> [u8; 4] {
    let c = pixmap.pixel(x, y).unwrap().demultiply();
    [c.red(), c.green(), c.blue(), c.alpha()]
}

#[test]
fn test_export_stroke_and_rectangle_layer_order() {
    let mut store = AnnotationStore::new();
    store.set_page_size(1, Size::new(200.0, 100.0));
    store.add_path(blue_stroke(1)).unwrap();
    store.add_shape(red_square(1)).unwrap();

    let doc = document(1);
    let dpr = 2.0;
    let merged = block_on(export_page(&doc, 1, store.page(1), dpr)).unwrap();

    assert_eq!((merged.width(), merged.height()), (400, 200));
    // PDF only.
    assert_eq!(rgba(&merged, 20, 20), [255, 255, 255, 255]);
    // Stroke over PDF.
    assert_eq!(rgba(&merged, 40, 100), [0, 0, 255, 255]);
    // Rectangle over stroke.
    assert_eq!(rgba(&merged, 200, 100), [255, 0, 0, 255]);
}

#[test]
fn test_malformed_shape_exports_without_vector_layer() {
    let mut store = AnnotationStore::new();
    store.add_path(blue_stroke(1)).unwrap();
    store.add_shape(red_square(1)).unwrap();
    store
        .add_shape(ShapeObject::new(
            1,
            ShapeGeometry::Polygon {
                points: vec![Point::new(f64::INFINITY, 0.0), Point::new(1.0, 1.0)],
            },
            ShapeStyle::default(),
        ))
        .unwrap();

    let merged = block_on(export_page(&document(1), 1, store.page(1), 1.0)).unwrap();
    // The stroke survives; the whole vector layer is dropped.
    assert_eq!(rgba(&merged, 100, 50), [0, 0, 255, 255]);
    assert_eq!(rgba(&merged, 100, 35), [255, 255, 255, 255]);
}

#[test]
fn test_missing_pdf_layer_aborts_export() {
    let mut doc = document(2);
    doc.broken.push(2);
    let store = AnnotationStore::new();

    assert!(block_on(export_page(&doc, 1, store.page(1), 1.0)).is_ok());
    let err = block_on(export_page(&doc, 2, store.page(2), 1.0)).unwrap_err();
    match err {
        ExportError::MissingPdfLayer { page, reason } => {
            assert_eq!(page, 2);
            assert_eq!(reason, "corrupt content stream");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(block_on(export_document(&doc, store.pages(), 1.0)).is_err());
}

#[test]
fn test_export_document_keeps_pages_apart() {
    let mut store = AnnotationStore::new();
    store.add_path(blue_stroke(2)).unwrap();

    let pages = block_on(export_document(&document(3), store.pages(), 1.0)).unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(rgba(&pages[0], 100, 50), [255, 255, 255, 255]);
    assert_eq!(rgba(&pages[1], 100, 50), [0, 0, 255, 255]);
    assert_eq!(rgba(&pages[2], 100, 50), [255, 255, 255, 255]);
}

#[test]
fn test_export_independent_of_screen_zoom() {
    let mut store = AnnotationStore::new();
    store.add_path(blue_stroke(1)).unwrap();

    // On screen at 0.5x the drawing surface is tiny; export still renders
    // every layer at intrinsic size × DPR.
    let mut screen = RasterLayer::with_size(100, 50, 0.5);
    screen.render_paths(&store.page(1).unwrap().paths);

    let merged = block_on(export_page(&document(1), 1, store.page(1), 1.0)).unwrap();
    assert_eq!((merged.width(), merged.height()), (200, 100));
    assert_eq!(rgba(&merged, 100, 48), [0, 0, 255, 255]);
}

#[test]
fn test_erase_then_export_removes_stroke() {
    let mut store = AnnotationStore::new();
    store.add_path(blue_stroke(1)).unwrap();
    let eraser = DrawingPath::new(
        DrawingTool::Eraser,
        SerializableColor::transparent(),
        20.0,
        vec![StrokePoint::new(100.0, 30.0), StrokePoint::new(100.0, 70.0)],
        1,
    );
    assert_eq!(store.erase_with(&eraser), 1);

    let merged = block_on(export_page(&document(1), 1, store.page(1), 1.0)).unwrap();
    assert_eq!(rgba(&merged, 100, 50), [255, 255, 255, 255]);
}

#[test]
fn test_export_shows_text_box() {
    let mut store = AnnotationStore::new();
    let page = Size::new(200.0, 100.0);
    store.set_page_size(1, page);
    let origin = Point::new(20.0, 20.0);
    let mut text =
        TextAnnotation::new(1, origin, Size::new(150.0, 40.0), Some(page)).with_text("Total: 42");
    text.color = SerializableColor::new(0, 0, 255, 255);
    store.add_text(text).unwrap();

    let merged = block_on(export_page(&document(1), 1, store.page(1), 2.0)).unwrap();
    // Outside the box.
    assert_eq!(rgba(&merged, 20, 20), [255, 255, 255, 255]);
    // Top edge of the frame.
    let [r, _, b, _] = rgba(&merged, 100, 40);
    assert!(r < 200 && b == 255);
    // First line of text.
    let [r, g, b, _] = rgba(&merged, 80, 64);
    assert!(b > 200 && r < 100 && g < 100);
}

struct FailingLayer(VectorLayer);

impl pagemark_core::ShapeLayer for FailingLayer {
    fn set_tool(&mut self, tool: pagemark_core::ShapeTool) {
        self.0.set_tool(tool);
    }

    fn add_text(&mut self, x: f64, y: f64) {
        self.0.add_text(x, y);
    }

    fn load_shapes(&mut self, shapes: &[ShapeObject]) {
        self.0.load_shapes(shapes);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.0.resize(width, height);
    }

    fn export_as_canvas(&self) -> ShapeLayerResult<RasterImage> {
        Err(pagemark_core::ShapeLayerError::Other("context lost".to_string()))
    }

    fn drain_events(&mut self) -> Vec<pagemark_core::ShapeEvent> {
        self.0.drain_events()
    }
}

#[test]
fn test_merged_canvas_scales_screen_layers() {
    use pagemark_core::{EditorConfig, PdfBackend, PdfSource, ViewportController};
    use std::path::Path;

    struct Backend;

    impl PdfBackend for Backend {
        fn load_from_path<'a>(
            &'a self,
            _path: &'a Path,
        ) -> BoxFuture<'a, PdfResult<Box<dyn PdfDocument>>> {
            Box::pin(async move { Ok(Box::new(document(1)) as Box<dyn PdfDocument>) })
        }

        fn load_from_bytes<'a>(
            &'a self,
            _name: &'a str,
            _data: &'a [u8],
        ) -> BoxFuture<'a, PdfResult<Box<dyn PdfDocument>>> {
            Box::pin(async move { Err(PdfError::Load("Invalid PDF structure".to_string())) })
        }
    }

    let mut viewport = ViewportController::new(&EditorConfig::default());
    let mut drawing = RasterLayer::new();
    let layer = FailingLayer(VectorLayer::new());
    let merged = block_on(pagemark_render::merged_canvas(&viewport, &drawing, &layer)).unwrap();
    assert!(merged.is_none());

    block_on(viewport.load(&Backend, &PdfSource::Path("a.pdf".into()))).unwrap();
    viewport.set_scale(0.5);
    block_on(viewport.render_current_page());
    let sizes = viewport.surfaces().unwrap();
    assert_eq!(sizes.physical, (100, 50));
    drawing.resize(sizes, 0.5);
    drawing.render_paths(&[blue_stroke(1)]);

    let merged = block_on(pagemark_render::merged_canvas(&viewport, &drawing, &layer));
    let merged = merged.unwrap().unwrap();
    assert_eq!((merged.width(), merged.height()), (200, 100));
    let c = rgba(&merged, 100, 50);
    assert!(c[2] > 200 && c[0] < 60);
}
