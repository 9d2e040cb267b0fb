//! Command implementations.

use crate::backend::ImageDocument;
use pagemark_core::storage::create_autosave_manager;
use pagemark_core::{
    AnnotationKind, AnnotationRecord, AnnotationStore, ConfigError, DocumentFingerprint,
    EditorConfig, PageMap, PageNumber, StorageError,
};
use pagemark_render::{ExportError, encode_png, export_document};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{path}: {1}", path = .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("{path}: {1}", path = .0.display())]
    Image(PathBuf, #[source] png::DecodingError),
    #[error("{path}: invalid annotation record: {1}", path = .0.display())]
    Record(PathBuf, #[source] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("No saved annotations for {0}")]
    NoAnnotations(String),
}

/// Result type for application commands.
pub type AppResult<T> = Result<T, AppError>;

/// Per-page entity counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub page: PageNumber,
    pub paths: usize,
    pub shapes: usize,
    pub texts: usize,
    pub notes: usize,
    pub arrows: usize,
    pub stamps: usize,
}

impl fmt::Display for PageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {:>3}: {} path(s), {} shape(s), {} text(s), {} note(s), {} arrow(s), {} stamp(s)",
            self.page, self.paths, self.shapes, self.texts, self.notes, self.arrows, self.stamps
        )
    }
}

/// Count the entities on every page of a record.
pub fn summarize(pages: &PageMap) -> Vec<PageSummary> {
    pages
        .iter()
        .map(|(&page, annotations)| PageSummary {
            page,
            paths: annotations.count(AnnotationKind::Path),
            shapes: annotations.count(AnnotationKind::Shape),
            texts: annotations.count(AnnotationKind::Text),
            notes: annotations.count(AnnotationKind::Note),
            arrows: annotations.count(AnnotationKind::Arrow),
            stamps: annotations.count(AnnotationKind::Stamp),
        })
        .collect()
}

/// Read an annotation record from a JSON file.
pub fn load_record(path: &Path) -> AppResult<AnnotationRecord> {
    let json = std::fs::read_to_string(path).map_err(|e| AppError::Io(path.to_path_buf(), e))?;
    AnnotationRecord::from_json(&json).map_err(|e| AppError::Record(path.to_path_buf(), e))
}

/// Fingerprint of a document opened from `path`: file name and size.
pub fn fingerprint(path: &Path) -> AppResult<DocumentFingerprint> {
    let meta = std::fs::metadata(path).map_err(|e| AppError::Io(path.to_path_buf(), e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(DocumentFingerprint::new(name, meta.len()))
}

/// The command line shell.
#[derive(Debug, Clone, Default)]
pub struct App {
    config: EditorConfig,
}

impl App {
    pub fn new(config: EditorConfig) -> Self {
        Self { config }
    }

    /// Build from an optional JSON config file.
    pub fn from_config_file(path: Option<&Path>) -> AppResult<Self> {
        let config = match path {
            Some(path) => EditorConfig::load(path)?,
            None => EditorConfig::default(),
        };
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Find the auto-saved record for a document file.
    pub fn restore_saved(&self, document: &Path) -> AppResult<AnnotationRecord> {
        let fingerprint = fingerprint(document)?;
        let mut manager = create_autosave_manager(&self.config)?;
        pollster::block_on(manager.restore(&fingerprint))
            .ok_or_else(|| AppError::NoAnnotations(fingerprint.key()))
    }

    /// Keys of every auto-saved document.
    pub fn saved_documents(&self) -> AppResult<Vec<String>> {
        let manager = create_autosave_manager(&self.config)?;
        let mut keys = pollster::block_on(manager.list_documents())?;
        keys.sort();
        Ok(keys)
    }

    /// Composite `record` over the page images and write one PNG per page
    /// into `out_dir`. Returns the written files.
    pub fn flatten(
        &self,
        pages: &[PathBuf],
        record: AnnotationRecord,
        out_dir: &Path,
        device_pixel_ratio: Option<f64>,
    ) -> AppResult<Vec<PathBuf>> {
        let document = ImageDocument::open(pages)?;
        let dpr = device_pixel_ratio.unwrap_or(self.config.device_pixel_ratio);

        // Anchor the saved geometry to the sizes it was drawn on, then
        // move it onto the page images.
        let mut store = AnnotationStore::new();
        for (&page, &size) in &record.page_sizes {
            store.set_page_size(page, size);
        }
        store.replace_all(record.pages);
        for page in 1..=pages.len() as PageNumber {
            if let Some(size) = document.page_size(page) {
                store.set_page_size(page, size);
            }
        }
        let extra = store.pages().keys().filter(|&&p| p as usize > pages.len()).count();
        if extra > 0 {
            log::warn!(
                "Ignoring annotations on {extra} page(s) beyond the {} page image(s)",
                pages.len()
            );
        }

        let rendered = pollster::block_on(export_document(&document, store.pages(), dpr))?;

        std::fs::create_dir_all(out_dir).map_err(|e| AppError::Io(out_dir.to_path_buf(), e))?;
        let mut written = Vec::with_capacity(rendered.len());
        for (index, pixmap) in rendered.iter().enumerate() {
            let path = out_dir.join(format!("page-{:03}.png", index + 1));
            let bytes = encode_png(pixmap)?;
            std::fs::write(&path, bytes).map_err(|e| AppError::Io(path.clone(), e))?;
            log::info!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Point, Rect, Size};
    use pagemark_core::{
        ArrowAnnotation, DrawingPath, DrawingTool, SerializableColor, ShapeObject, ShapeStyle,
        StrokePoint,
    };

    fn write_page(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&vec![255; (width * height * 3) as usize]).unwrap();
        path
    }

    fn record(pages: PageMap, page_size: Size) -> AnnotationRecord {
        let fingerprint = DocumentFingerprint::new("scan.pdf", 1234);
        let mut record = AnnotationRecord::new(fingerprint, pages, 1);
        record.page_sizes.insert(1, page_size);
        record
    }

    fn stroke(y: f64) -> DrawingPath {
        DrawingPath::new(
            DrawingTool::Pencil,
            SerializableColor::new(0, 0, 0, 255),
            4.0,
            vec![StrokePoint::new(10.0, y), StrokePoint::new(90.0, y)],
            1,
        )
    }

    #[test]
    fn test_summarize_counts_entities() {
        let mut pages = PageMap::new();
        let page = pages.entry(2).or_default();
        page.paths.push(stroke(10.0));
        page.paths.push(stroke(20.0));
        let square = Rect::new(0.0, 0.0, 5.0, 5.0);
        page.shapes.push(ShapeObject::rectangle(2, square, ShapeStyle::default()));

        let summary = summarize(&pages);
        assert_eq!(summary.len(), 1);
        assert_eq!((summary[0].page, summary[0].paths, summary[0].shapes), (2, 2, 1));
        assert!(summary[0].to_string().starts_with("page   2: 2 path(s), 1 shape(s)"));
    }

    #[test]
    fn test_flatten_writes_pages() {
        let dir = tempfile::tempdir().unwrap();
        let pages = vec![
            write_page(dir.path(), "p1.png", 100, 50),
            write_page(dir.path(), "p2.png", 100, 50),
        ];
        let mut map = PageMap::new();
        map.entry(1).or_default().paths.push(stroke(25.0));

        let out = dir.path().join("out");
        let written = App::default()
            .flatten(&pages, record(map, Size::new(100.0, 50.0)), &out, Some(2.0))
            .unwrap();
        assert_eq!(written.len(), 2);

        let image = crate::backend::decode_png(std::fs::File::open(&written[0]).unwrap()).unwrap();
        assert_eq!((image.width, image.height), (200, 100));
        assert_eq!(image.pixel(100, 50), Some([0, 0, 0, 255]));
        assert_eq!(image.pixel(100, 10), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_flatten_rescales_anchored_annotations() {
        let dir = tempfile::tempdir().unwrap();
        // Drawn on a 100x50 page, flattened onto a 200x100 scan.
        let pages = vec![write_page(dir.path(), "big.png", 200, 100)];
        let drawn_on = Size::new(100.0, 50.0);
        let mut map = PageMap::new();
        map.entry(1).or_default().arrows.push(ArrowAnnotation::between(
            1,
            Point::new(10.0, 25.0),
            Point::new(60.0, 25.0),
            Some(drawn_on),
        ));

        let out = dir.path().join("out");
        let written = App::default().flatten(&pages, record(map, drawn_on), &out, None).unwrap();
        let image = crate::backend::decode_png(std::fs::File::open(&written[0]).unwrap()).unwrap();
        assert_eq!(image.pixel(60, 50), Some([0xe5, 0x3e, 0x3e, 255]));
        assert_eq!(image.pixel(60, 25), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_load_record_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_record(&path).unwrap_err();
        assert!(matches!(err, AppError::Record(..)));
        assert!(err.to_string().contains("broken.json"));

        assert!(matches!(load_record(&dir.path().join("missing.json")), Err(AppError::Io(..))));
    }

    #[test]
    fn test_fingerprint_uses_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.png");
        std::fs::write(&path, [0u8; 42]).unwrap();
        assert_eq!(fingerprint(&path).unwrap().key(), "doc.png:42");
    }
}
