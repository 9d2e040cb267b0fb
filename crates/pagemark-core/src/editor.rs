//! Editing session: routes pointer input through the active tool into the
//! annotation store, and keeps the viewport and shape layer in step.

use crate::annotations::{
    AnnotationId, AnnotationKind, ArrowAnnotation, DrawingTool, PageNumber, SerializableColor,
    StampAnnotation, StickyNote, StrokePoint, TextAnnotation,
};
use crate::config::EditorConfig;
use crate::drawing::{CapturedStroke, StrokeCapture};
use crate::pdf::{PdfBackend, PdfSource};
use crate::shape_layer::{ShapeLayer, ShapeTool};
use crate::page::PageMap;
use crate::storage::{AnnotationRecord, DocumentFingerprint, DynAutoSaveManager, SaveTarget};
use crate::store::{AnnotationStore, StoreResult};
use crate::viewport::{RenderOutcome, ViewportController, ViewportResult};
use kurbo::{Point, Size};

/// Active editing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Pencil,
    Highlight,
    Eraser,
    Arrow,
    Text,
    Note,
    Stamp,
    /// Input goes to the vector shape layer.
    Shape(ShapeTool),
    Pan,
}

impl Tool {
    fn drawing_tool(self) -> Option<DrawingTool> {
        match self {
            Tool::Pencil => Some(DrawingTool::Pencil),
            Tool::Highlight => Some(DrawingTool::Highlight),
            Tool::Eraser => Some(DrawingTool::Eraser),
            _ => None,
        }
    }
}

/// Result of a completed pointer gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    /// Nothing happened.
    None,
    /// A new annotation was stored.
    Added(AnnotationKind, AnnotationId),
    /// The eraser removed this many strokes.
    Erased(usize),
    /// The gesture was too small to keep.
    Discarded,
}

/// Default size of a text box placed by clicking.
pub const DEFAULT_TEXT_BOX: Size = Size::new(150.0, 40.0);

/// Highlighter default color (translucent through the tool's opacity).
pub const DEFAULT_HIGHLIGHT_COLOR: SerializableColor =
    SerializableColor::new(0xff, 0xeb, 0x3b, 0xff);

/// An editing session over one document.
#[derive(Debug)]
pub struct Editor {
    config: EditorConfig,
    store: AnnotationStore,
    viewport: ViewportController,
    capture: StrokeCapture,
    tool: Tool,
    color: SerializableColor,
    highlight_color: SerializableColor,
    stamp_id: String,
    pending_arrow: Option<ArrowAnnotation>,
    pan_anchor: Option<Point>,
    fingerprint: Option<DocumentFingerprint>,
    autosave: Option<DynAutoSaveManager>,
    /// Store revision last reported to the auto-saver.
    seen_revision: u64,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            store: AnnotationStore::with_history_limit(config.undo_limit),
            viewport: ViewportController::new(&config),
            capture: StrokeCapture::new(),
            tool: Tool::default(),
            color: SerializableColor::black(),
            highlight_color: DEFAULT_HIGHLIGHT_COLOR,
            stamp_id: "check".to_string(),
            pending_arrow: None,
            pan_anchor: None,
            fingerprint: None,
            autosave: None,
            seen_revision: 0,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnnotationStore {
        &mut self.store
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportController {
        &mut self.viewport
    }

    // --- document ---

    /// Open a document.
    ///
    /// Pending changes to the previous document are saved first, and its
    /// annotations and history are dropped whether or not the load succeeds.
    /// With auto-save enabled, a record saved for the same fingerprint is
    /// restored.
    pub async fn open(
        &mut self,
        backend: &dyn PdfBackend,
        source: &PdfSource,
        file_size: u64,
    ) -> ViewportResult<u32> {
        self.flush().await;
        self.cancel_gesture();
        self.fingerprint = None;
        self.store.reset_page_sizes();
        self.store.replace_all(PageMap::new());
        self.store.set_current_page(1);
        self.mark_clean();

        let pages = self.viewport.load(backend, source).await?;
        let fingerprint = DocumentFingerprint::new(source.file_name(), file_size);
        let saved = match self.autosave.as_mut() {
            Some(autosave) => autosave.restore(&fingerprint).await,
            None => None,
        };
        if let Some(record) = saved {
            self.restore(record);
        }
        self.fingerprint = Some(fingerprint);
        self.mark_clean();
        Ok(pages)
    }

    pub fn fingerprint(&self) -> Option<&DocumentFingerprint> {
        self.fingerprint.as_ref()
    }

    /// Replace the annotations with a restored record.
    pub fn restore(&mut self, record: AnnotationRecord) {
        for (page, size) in &record.page_sizes {
            self.store.set_page_size(*page, *size);
        }
        self.store.replace_all(record.pages);
        self.mark_clean();
    }

    // --- auto-save ---

    /// Persist annotation changes through `manager`.
    pub fn set_autosave(&mut self, manager: DynAutoSaveManager) {
        self.autosave = Some(manager);
        self.mark_clean();
    }

    pub fn autosave_manager(&self) -> Option<&DynAutoSaveManager> {
        self.autosave.as_ref()
    }

    /// Report store changes made since the last call to the auto-saver.
    fn track_changes(&mut self) {
        let revision = self.store.revision();
        if revision == self.seen_revision {
            return;
        }
        self.seen_revision = revision;
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.mark_dirty(revision);
        }
    }

    fn mark_clean(&mut self) {
        self.seen_revision = self.store.revision();
    }

    /// Save once the quiet period after the last change has passed. Meant to
    /// be called on every UI tick; failures are logged.
    pub async fn autosave(&mut self) -> Option<SaveTarget> {
        self.track_changes();
        let record = self.record()?;
        let autosave = self.autosave.as_mut()?;
        match autosave.maybe_save(&record).await {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Auto-save of {} failed: {e}", record.key());
                None
            }
        }
    }

    /// Save pending changes now, ignoring the quiet period.
    pub async fn flush(&mut self) -> Option<SaveTarget> {
        self.track_changes();
        let record = self.record()?;
        let autosave = self.autosave.as_mut()?;
        if !autosave.is_dirty() {
            return None;
        }
        match autosave.save(&record).await {
            Ok(target) => Some(target),
            Err(e) => {
                log::warn!("Saving {} failed: {e}", record.key());
                None
            }
        }
    }

    /// Snapshot for persistence; `None` before a document is open.
    pub fn record(&self) -> Option<AnnotationRecord> {
        let fingerprint = self.fingerprint.clone()?;
        let pages = self.store.pages().clone();
        let mut record = AnnotationRecord::new(fingerprint, pages, self.store.revision());
        for page in self.store.pages().keys() {
            if let Some(size) = self.store.page_size(*page) {
                record.page_sizes.insert(*page, size);
            }
        }
        Some(record)
    }

    // --- navigation ---

    pub fn current_page(&self) -> PageNumber {
        self.store.current_page()
    }

    pub fn go_to_page(&mut self, page: PageNumber) -> ViewportResult<()> {
        self.cancel_gesture();
        self.viewport.go_to_page(page)?;
        self.store.set_current_page(page);
        Ok(())
    }

    pub fn next_page(&mut self) -> ViewportResult<()> {
        self.go_to_page(self.current_page() + 1)
    }

    pub fn previous_page(&mut self) -> ViewportResult<()> {
        self.go_to_page(self.current_page().saturating_sub(1))
    }

    /// Render the current page and record its measured size.
    pub async fn render(&mut self) -> Option<RenderOutcome> {
        let outcome = self.viewport.render_current_page().await?;
        if let RenderOutcome::Applied(_) = outcome {
            if let Some(size) = self.viewport.base_page_size() {
                self.store.set_page_size(self.viewport.current_page(), size);
            }
        }
        self.track_changes();
        Some(outcome)
    }

    // --- tools ---

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool != tool {
            self.cancel_gesture();
            log::debug!("Tool changed to {tool:?}");
            self.tool = tool;
        }
    }

    pub fn color(&self) -> SerializableColor {
        self.color
    }

    pub fn set_color(&mut self, color: SerializableColor) {
        self.color = color;
    }

    pub fn set_highlight_color(&mut self, color: SerializableColor) {
        self.highlight_color = color;
    }

    /// Choose the stamp placed by the stamp tool. Unknown ids are ignored.
    pub fn set_stamp(&mut self, stamp_id: &str) -> bool {
        if crate::annotations::StampDefinition::find(stamp_id).is_none() {
            log::warn!("Unknown stamp {stamp_id}");
            return false;
        }
        self.stamp_id = stamp_id.to_string();
        true
    }

    fn stroke_style(&self, tool: DrawingTool) -> (SerializableColor, f64) {
        match tool {
            DrawingTool::Pencil => (self.color, self.config.pencil_size),
            DrawingTool::Highlight => (self.highlight_color, self.config.highlight_size),
            DrawingTool::Eraser => (SerializableColor::transparent(), self.config.eraser_size),
        }
    }

    // --- pointer input (screen coordinates) ---

    fn base_point(&self, screen: Point) -> Point {
        self.viewport.screen_to_base(screen)
    }

    fn page_size(&self) -> Option<Size> {
        self.store.page_size(self.current_page())
    }

    pub fn pointer_down(&mut self, screen: Point, pressure: Option<f64>) -> EditAction {
        let base = self.base_point(screen);
        let page = self.current_page();

        if let Some(drawing_tool) = self.tool.drawing_tool() {
            let (color, width) = self.stroke_style(drawing_tool);
            self.capture.start_drawing(stroke_point(base, pressure), drawing_tool, color, width);
            return EditAction::None;
        }

        match self.tool {
            Tool::Arrow => {
                self.pending_arrow = Some(ArrowAnnotation::new(page, base, self.page_size()));
                EditAction::None
            }
            Tool::Text => {
                let text = TextAnnotation::new(page, base, DEFAULT_TEXT_BOX, self.page_size());
                let result = self.store.add_text(text);
                self.added(AnnotationKind::Text, result)
            }
            Tool::Note => {
                let note = StickyNote::new(page, base, StickyNote::DEFAULT_SIZE, self.page_size());
                let result = self.store.add_note(note);
                self.added(AnnotationKind::Note, result)
            }
            Tool::Stamp => {
                let size = StampAnnotation::DEFAULT_SIZE;
                let origin = Point::new(base.x - size / 2.0, base.y - size / 2.0);
                let stamp_id = self.stamp_id.clone();
                let stamp = StampAnnotation::new(page, stamp_id, origin, size, self.page_size());
                let result = self.store.add_stamp(stamp);
                self.added(AnnotationKind::Stamp, result)
            }
            Tool::Pan => {
                self.pan_anchor = Some(screen);
                EditAction::None
            }
            Tool::Shape(_) | Tool::Pencil | Tool::Highlight | Tool::Eraser => EditAction::None,
        }
    }

    pub fn pointer_move(&mut self, screen: Point, pressure: Option<f64>) {
        if self.capture.is_drawing() {
            let base = self.base_point(screen);
            self.capture.continue_drawing(stroke_point(base, pressure));
            return;
        }
        if self.pending_arrow.is_some() {
            let base = self.base_point(screen);
            let page_size = self.page_size();
            if let Some(arrow) = self.pending_arrow.as_mut() {
                arrow.drag_to(base, page_size);
            }
            return;
        }
        if let Some(anchor) = self.pan_anchor {
            self.viewport.pan(screen - anchor);
            self.pan_anchor = Some(screen);
        }
    }

    pub fn pointer_up(&mut self, screen: Point) -> EditAction {
        if self.capture.is_drawing() {
            return match self.capture.end_drawing() {
                Some(stroke) => self.commit_stroke(stroke),
                None => EditAction::Discarded,
            };
        }
        if let Some(mut arrow) = self.pending_arrow.take() {
            arrow.drag_to(self.base_point(screen), self.page_size());
            if arrow.length() < ArrowAnnotation::MIN_LENGTH {
                return EditAction::Discarded;
            }
            let result = self.store.add_arrow(arrow);
            return self.added(AnnotationKind::Arrow, result);
        }
        self.pan_anchor = None;
        EditAction::None
    }

    fn commit_stroke(&mut self, stroke: CapturedStroke) -> EditAction {
        let path = stroke.into_path(self.current_page());
        if path.tool.persists() {
            let result = self.store.add_path(path);
            self.added(AnnotationKind::Path, result)
        } else {
            let erased = self.store.erase_with(&path);
            self.track_changes();
            EditAction::Erased(erased)
        }
    }

    fn added(&mut self, kind: AnnotationKind, result: StoreResult<AnnotationId>) -> EditAction {
        self.track_changes();
        match result {
            Ok(id) => EditAction::Added(kind, id),
            Err(e) => {
                log::warn!("Could not add {}: {e}", kind.name());
                EditAction::Discarded
            }
        }
    }

    /// Abandon any gesture in progress.
    pub fn cancel_gesture(&mut self) {
        self.capture.cancel();
        self.pending_arrow = None;
        self.pan_anchor = None;
        self.store.end_gesture();
    }

    /// The stroke being drawn, for live preview.
    pub fn live_stroke(&self) -> Option<CapturedStroke> {
        self.capture.live_stroke()
    }

    /// The arrow being dragged, for live preview.
    pub fn pending_arrow(&self) -> Option<&ArrowAnnotation> {
        self.pending_arrow.as_ref()
    }

    // --- wheel ---

    /// Zoom around the cursor by one step per wheel notch.
    pub fn wheel_zoom(&mut self, screen: Point, delta_y: f64) {
        if delta_y == 0.0 {
            return;
        }
        let factor = if delta_y < 0.0 {
            self.config.zoom_step
        } else {
            1.0 / self.config.zoom_step
        };
        self.viewport.zoom_at(screen, factor);
    }

    /// Rotate a stamp on the current page by wheel input.
    pub fn rotate_stamp(&mut self, id: AnnotationId, delta_y: f64) -> StoreResult<()> {
        let page = self.current_page();
        let stamps = self.store.current_page_stamps();
        let Some(mut stamp) = stamps.iter().find(|s| s.id == id).cloned() else {
            return Err(crate::store::StoreError::NotFound {
                kind: AnnotationKind::Stamp.name(),
                id,
                page,
            });
        };
        stamp.rotate_by_wheel(delta_y);
        self.store.update_continuous(stamp.into())?;
        self.track_changes();
        Ok(())
    }

    // --- resize ---

    /// One tick of a resize-handle drag on a text box, note or stamp (base units).
    pub fn resize_by(
        &mut self,
        kind: AnnotationKind,
        id: AnnotationId,
        dw: f64,
        dh: f64,
    ) -> StoreResult<()> {
        self.resize_tick(kind, id, dw, dh)?;
        self.track_changes();
        Ok(())
    }

    fn resize_tick(
        &mut self,
        kind: AnnotationKind,
        id: AnnotationId,
        dw: f64,
        dh: f64,
    ) -> StoreResult<()> {
        let page = self.current_page();
        let page_size = self.page_size();
        let not_found = || crate::store::StoreError::NotFound {
            kind: kind.name(),
            id,
            page,
        };
        match kind {
            AnnotationKind::Text => {
                let mut text = self
                    .store
                    .current_page_texts()
                    .iter()
                    .find(|t| t.id == id)
                    .cloned()
                    .ok_or_else(not_found)?;
                text.resize_by(dw, dh, page_size);
                self.store.update_continuous(text.into())
            }
            AnnotationKind::Note => {
                let mut note = self
                    .store
                    .current_page_notes()
                    .iter()
                    .find(|n| n.id == id)
                    .cloned()
                    .ok_or_else(not_found)?;
                note.resize_by(dw, dh, page_size);
                self.store.update_continuous(note.into())
            }
            AnnotationKind::Stamp => {
                let mut stamp = self
                    .store
                    .current_page_stamps()
                    .iter()
                    .find(|s| s.id == id)
                    .cloned()
                    .ok_or_else(not_found)?;
                stamp.resize_to(stamp.size + dw.max(dh), page_size);
                self.store.update_continuous(stamp.into())
            }
            _ => Err(not_found()),
        }
    }

    /// End a resize or rotation gesture.
    pub fn end_resize(&mut self) {
        self.store.end_gesture();
    }

    // --- history and bulk actions ---

    pub fn undo(&mut self) -> bool {
        self.cancel_gesture();
        let undone = self.store.undo();
        self.track_changes();
        undone
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_gesture();
        let redone = self.store.redo();
        self.track_changes();
        redone
    }

    pub fn undo_len(&self) -> usize {
        self.store.undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.store.redo_len()
    }

    pub fn clear_current_page_drawings(&mut self) -> usize {
        let cleared = self.store.clear_current_page_drawings();
        self.track_changes();
        cleared
    }

    /// The "clear drawings" action: removes every annotation (undoable) and
    /// every saved copy of this document's record.
    pub async fn clear_all(&mut self) {
        self.store.clear_all();
        self.mark_clean();
        let Some(fingerprint) = self.fingerprint.clone() else {
            return;
        };
        let Some(autosave) = self.autosave.as_mut() else {
            return;
        };
        if let Err(e) = autosave.clear(&fingerprint).await {
            log::warn!("Failed to clear saved annotations for {}: {e}", fingerprint.key());
        }
    }

    // --- shape layer ---

    /// Size the shape layer to the page surfaces and show the current page's shapes.
    pub fn sync_shape_layer(&self, layer: &mut dyn ShapeLayer) {
        layer.set_view(self.current_page(), self.viewport.coordinate_space().pixels_per_unit());
        if let Some(sizes) = self.viewport.surfaces() {
            layer.resize(sizes.physical.0, sizes.physical.1);
        }
        layer.load_shapes(self.store.current_page_shapes());
        if let Tool::Shape(tool) = self.tool {
            layer.set_tool(tool);
        }
    }

    /// Feed the shape layer's pending events into the store. Returns how
    /// many were applied.
    pub fn pump_shape_events(&mut self, layer: &mut dyn ShapeLayer) -> usize {
        let mut applied = 0;
        for event in layer.drain_events() {
            match self.store.apply_shape_event(event) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("Ignoring shape layer event: {e}"),
            }
        }
        self.track_changes();
        applied
    }
}

fn stroke_point(base: Point, pressure: Option<f64>) -> StrokePoint {
    match pressure {
        Some(p) => StrokePoint::with_pressure(base.x, base.y, p),
        None => StrokePoint::from(base),
    }
}
