//! The annotation store: per-page collections, undo/redo and change
//! notification.
//!
//! Every mutation goes through the store so that it is paired with exactly
//! one history entry and observers see a consistent state.

use crate::annotations::{
    Annotation, AnnotationId, AnnotationKind, ArrowAnnotation, DrawingPath, PageNumber, ShapeObject,
    StampAnnotation, StickyNote, TextAnnotation,
};
use crate::coords::Anchored;
use crate::drawing;
use crate::history::{History, HistoryEntry, MAX_UNDO_HISTORY};
use crate::page::{PageAnnotations, PageMap};
use crate::shape_layer::ShapeEvent;
use kurbo::Size;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found on page {page}")]
    NotFound {
        kind: &'static str,
        id: AnnotationId,
        page: PageNumber,
    },
    #[error("Annotation {0} already exists")]
    Duplicate(AnnotationId),
    #[error("Stroke has {0} point(s), at least 2 are required")]
    DegenerateStroke(usize),
    #[error("Eraser strokes are not stored")]
    EraserStroke,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Handle returned by [`AnnotationStore::subscribe`].
pub type SubscriptionId = u64;

/// Notification sent to store observers.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Annotations changed on one page, or on every page when `None`.
    Changed { page: Option<PageNumber> },
    /// The active page changed.
    PageChanged { page: PageNumber },
    /// Undo/redo availability changed.
    HistoryChanged { undo_len: usize, redo_len: usize },
    /// The whole annotation set was replaced (new document).
    Replaced,
}

type Observer = Box<dyn FnMut(&StoreEvent)>;

/// Authoritative per-page annotation state.
pub struct AnnotationStore {
    pages: PageMap,
    page_sizes: HashMap<PageNumber, Size>,
    current_page: PageNumber,
    history: History,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
    revision: u64,
}

impl fmt::Debug for AnnotationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationStore")
            .field("pages", &self.pages.len())
            .field("current_page", &self.current_page)
            .field("undo_len", &self.history.undo_len())
            .field("redo_len", &self.history.redo_len())
            .field("observers", &self.observers.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::with_history_limit(MAX_UNDO_HISTORY)
    }

    /// Create a store keeping at most `limit` undo entries (0 = unbounded).
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            pages: PageMap::new(),
            page_sizes: HashMap::new(),
            current_page: 1,
            history: History::new(limit),
            observers: Vec::new(),
            next_subscription: 0,
            revision: 0,
        }
    }

    // --- observers ---

    /// Register an observer called after every state change.
    pub fn subscribe(&mut self, observer: impl FnMut(&StoreEvent) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    fn notify(&mut self, event: StoreEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    fn committed(&mut self, page: Option<PageNumber>) {
        self.revision += 1;
        self.notify(StoreEvent::Changed { page });
        self.notify_history();
    }

    fn notify_history(&mut self) {
        let event = StoreEvent::HistoryChanged {
            undo_len: self.history.undo_len(),
            redo_len: self.history.redo_len(),
        };
        self.notify(event);
    }

    // --- pages ---

    pub fn pages(&self) -> &PageMap {
        &self.pages
    }

    pub fn page(&self, page: PageNumber) -> Option<&PageAnnotations> {
        self.pages.get(&page)
    }

    pub fn current_page(&self) -> PageNumber {
        self.current_page
    }

    /// Switch the active page. The derived current-page views follow.
    pub fn set_current_page(&mut self, page: PageNumber) {
        if self.current_page != page {
            self.current_page = page;
            self.notify(StoreEvent::PageChanged { page });
        }
    }

    pub fn page_size(&self, page: PageNumber) -> Option<Size> {
        self.page_sizes.get(&page).copied()
    }

    /// Record a page's base-scale size once it has been measured.
    ///
    /// The first measurement anchors relative coordinates from the stored
    /// absolute ones. A later, different size recomputes absolute
    /// coordinates from the relative ones.
    pub fn set_page_size(&mut self, page: PageNumber, size: Size) {
        if !(size.width > 0.0 && size.height > 0.0) {
            log::warn!("Ignoring unusable size {size:?} for page {page}");
            return;
        }
        let previous = self.page_sizes.insert(page, size);
        if previous == Some(size) {
            return;
        }
        self.history.reanchor(page, previous, size);
        if let Some(annotations) = self.pages.get_mut(&page) {
            annotations.reanchor(previous, size);
            self.revision += 1;
            self.notify(StoreEvent::Changed { page: Some(page) });
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // --- generic CRUD ---

    fn validate(&self, annotation: &Annotation) -> StoreResult<()> {
        if let Annotation::Path(path) = annotation {
            if !path.tool.persists() {
                return Err(StoreError::EraserStroke);
            }
            if path.len() < 2 {
                return Err(StoreError::DegenerateStroke(path.len()));
            }
        }
        let exists = self
            .pages
            .get(&annotation.page_number())
            .is_some_and(|p| p.contains(annotation.kind(), annotation.id()));
        if exists {
            return Err(StoreError::Duplicate(annotation.id()));
        }
        Ok(())
    }

    fn not_found(kind: AnnotationKind, id: AnnotationId, page: PageNumber) -> StoreError {
        StoreError::NotFound {
            kind: kind.name(),
            id,
            page,
        }
    }

    /// Add an annotation to its page.
    pub fn add(&mut self, mut annotation: Annotation) -> StoreResult<AnnotationId> {
        self.validate(&annotation)?;
        let page = annotation.page_number();
        let id = annotation.id();
        annotation.sync_relative(self.page_size(page));

        self.pages.entry(page).or_default().insert(annotation.clone(), None);
        self.history.record(HistoryEntry::Add(annotation));
        log::debug!("Added annotation {id} on page {page}");
        self.committed(Some(page));
        Ok(id)
    }

    fn replace_existing(&mut self, mut annotation: Annotation) -> StoreResult<Annotation> {
        let page = annotation.page_number();
        let kind = annotation.kind();
        let id = annotation.id();
        annotation.sync_relative(self.page_size(page));
        let target = self
            .pages
            .get_mut(&page)
            .ok_or_else(|| Self::not_found(kind, id, page))?;
        target
            .replace(annotation)
            .map_err(|_| Self::not_found(kind, id, page))
    }

    /// Replace an annotation by id within its page.
    pub fn update(&mut self, annotation: Annotation) -> StoreResult<()> {
        let page = annotation.page_number();
        let before = self.replace_existing(annotation.clone())?;
        let after = self.stored(&annotation).unwrap_or(annotation);
        self.history.record(HistoryEntry::Update { before, after });
        self.committed(Some(page));
        Ok(())
    }

    /// Replace an annotation as one tick of an ongoing gesture (resize, drag).
    ///
    /// Consecutive ticks on the same annotation share one undo entry until
    /// [`Self::end_gesture`] is called.
    pub fn update_continuous(&mut self, annotation: Annotation) -> StoreResult<()> {
        let page = annotation.page_number();
        let before = self.replace_existing(annotation.clone())?;
        let after = self.stored(&annotation).unwrap_or(annotation);
        self.history.record_continuous(before, after);
        self.committed(Some(page));
        Ok(())
    }

    /// Close the ongoing gesture so the next update starts a new undo entry.
    pub fn end_gesture(&mut self) {
        self.history.seal();
    }

    fn stored(&self, annotation: &Annotation) -> Option<Annotation> {
        self.pages
            .get(&annotation.page_number())?
            .get(annotation.kind(), annotation.id())
    }

    /// Remove an annotation by id.
    pub fn delete(
        &mut self,
        kind: AnnotationKind,
        id: AnnotationId,
        page: PageNumber,
    ) -> StoreResult<Annotation> {
        let (index, annotation) = self
            .pages
            .get_mut(&page)
            .and_then(|p| p.remove(kind, id))
            .ok_or_else(|| Self::not_found(kind, id, page))?;
        self.history.record(HistoryEntry::Delete {
            annotation: annotation.clone(),
            index,
        });
        log::debug!("Deleted {} {id} on page {page}", kind.name());
        self.committed(Some(page));
        Ok(annotation)
    }

    pub fn get(
        &self,
        kind: AnnotationKind,
        id: AnnotationId,
        page: PageNumber,
    ) -> Option<Annotation> {
        self.pages.get(&page)?.get(kind, id)
    }

    // --- typed CRUD ---

    pub fn add_path(&mut self, path: DrawingPath) -> StoreResult<AnnotationId> {
        self.add(path.into())
    }

    pub fn update_path(&mut self, path: DrawingPath) -> StoreResult<()> {
        self.update(path.into())
    }

    pub fn delete_path(&mut self, id: AnnotationId, page: PageNumber) -> StoreResult<()> {
        self.delete(AnnotationKind::Path, id, page).map(|_| ())
    }

    pub fn add_shape(&mut self, shape: ShapeObject) -> StoreResult<AnnotationId> {
        self.add(shape.into())
    }

    pub fn update_shape(&mut self, shape: ShapeObject) -> StoreResult<()> {
        self.update(shape.into())
    }

    pub fn delete_shape(&mut self, id: AnnotationId, page: PageNumber) -> StoreResult<()> {
        self.delete(AnnotationKind::Shape, id, page).map(|_| ())
    }

    pub fn add_text(&mut self, text: TextAnnotation) -> StoreResult<AnnotationId> {
        self.add(text.into())
    }

    pub fn update_text(&mut self, text: TextAnnotation) -> StoreResult<()> {
        self.update(text.into())
    }

    pub fn delete_text(&mut self, id: AnnotationId, page: PageNumber) -> StoreResult<()> {
        self.delete(AnnotationKind::Text, id, page).map(|_| ())
    }

    pub fn add_note(&mut self, note: StickyNote) -> StoreResult<AnnotationId> {
        self.add(note.into())
    }

    pub fn update_note(&mut self, note: StickyNote) -> StoreResult<()> {
        self.update(note.into())
    }

    pub fn delete_note(&mut self, id: AnnotationId, page: PageNumber) -> StoreResult<()> {
        self.delete(AnnotationKind::Note, id, page).map(|_| ())
    }

    pub fn add_arrow(&mut self, arrow: ArrowAnnotation) -> StoreResult<AnnotationId> {
        self.add(arrow.into())
    }

    pub fn update_arrow(&mut self, arrow: ArrowAnnotation) -> StoreResult<()> {
        self.update(arrow.into())
    }

    pub fn delete_arrow(&mut self, id: AnnotationId, page: PageNumber) -> StoreResult<()> {
        self.delete(AnnotationKind::Arrow, id, page).map(|_| ())
    }

    pub fn add_stamp(&mut self, stamp: StampAnnotation) -> StoreResult<AnnotationId> {
        self.add(stamp.into())
    }

    pub fn update_stamp(&mut self, stamp: StampAnnotation) -> StoreResult<()> {
        self.update(stamp.into())
    }

    pub fn delete_stamp(&mut self, id: AnnotationId, page: PageNumber) -> StoreResult<()> {
        self.delete(AnnotationKind::Stamp, id, page).map(|_| ())
    }

    // --- bulk operations ---

    /// Delete every path on the eraser's page that the eraser stroke touches.
    ///
    /// All deletions form one undo entry. Returns how many paths were removed.
    pub fn erase_with(&mut self, eraser: &DrawingPath) -> usize {
        let page = eraser.page_number;
        let Some(target) = self.pages.get_mut(&page) else {
            return 0;
        };
        let hits = drawing::erase(eraser, &target.paths);
        if hits.is_empty() {
            return 0;
        }

        let mut removed: Vec<(usize, Annotation)> = target
            .paths
            .iter()
            .enumerate()
            .filter(|(_, p)| hits.contains(&p.id))
            .map(|(i, p)| (i, Annotation::Path(p.clone())))
            .collect();
        target.paths.retain(|p| !hits.contains(&p.id));
        removed.sort_by_key(|(i, _)| *i);

        let count = removed.len();
        self.history.record(HistoryEntry::DeleteMany { page, removed });
        log::debug!("Eraser removed {count} path(s) on page {page}");
        self.committed(Some(page));
        count
    }

    /// Remove every freehand path on the active page. Other annotation kinds
    /// are kept. Returns how many paths were removed.
    pub fn clear_current_page_drawings(&mut self) -> usize {
        let page = self.current_page;
        let Some(target) = self.pages.get_mut(&page) else {
            return 0;
        };
        if target.paths.is_empty() {
            return 0;
        }
        let paths = std::mem::take(&mut target.paths);
        let count = paths.len();
        self.history.record(HistoryEntry::ClearPage { page, paths });
        self.committed(Some(page));
        count
    }

    /// Remove every annotation on every page, as one undoable step.
    pub fn clear_all(&mut self) {
        if self.pages.values().all(PageAnnotations::is_empty) {
            return;
        }
        let snapshot = std::mem::take(&mut self.pages);
        self.history.record(HistoryEntry::ClearAll { snapshot });
        log::info!("Cleared all annotations");
        self.committed(None);
    }

    /// Load a new annotation set (e.g. for a newly opened document).
    ///
    /// Not undoable: history is reset.
    pub fn replace_all(&mut self, pages: PageMap) {
        self.pages = pages;
        self.history.clear();
        self.revision += 1;
        self.notify(StoreEvent::Replaced);
        self.notify_history();
    }

    /// Forget page sizes (new document).
    pub fn reset_page_sizes(&mut self) {
        self.page_sizes.clear();
    }

    // --- undo / redo ---

    /// Revert the most recent mutation. Returns false if there was none.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop_undo() else {
            return false;
        };
        entry.revert(&mut self.pages);
        let page = entry.page();
        self.history.push_redo(entry);
        self.committed(page);
        true
    }

    /// Re-apply the most recently undone mutation. Returns false if there was none.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.pop_redo() else {
            return false;
        };
        entry.apply(&mut self.pages);
        let page = entry.page();
        self.history.push_undo(entry);
        self.committed(page);
        true
    }

    pub fn undo_len(&self) -> usize {
        self.history.undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.history.redo_len()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- shape layer ---

    /// Translate a shape layer event into the matching store mutation.
    pub fn apply_shape_event(&mut self, event: ShapeEvent) -> StoreResult<()> {
        match event {
            ShapeEvent::Added(shape) => self.add_shape(shape).map(|_| ()),
            ShapeEvent::Updated(shape) => self.update_shape(shape),
            ShapeEvent::Deleted { id, page } => self.delete_shape(id, page),
        }
    }

    // --- current page views ---

    fn current(&self) -> Option<&PageAnnotations> {
        self.pages.get(&self.current_page)
    }

    pub fn current_page_paths(&self) -> &[DrawingPath] {
        self.current().map(|p| p.paths.as_slice()).unwrap_or(&[])
    }

    pub fn current_page_shapes(&self) -> &[ShapeObject] {
        self.current().map(|p| p.shapes.as_slice()).unwrap_or(&[])
    }

    pub fn current_page_texts(&self) -> &[TextAnnotation] {
        self.current().map(|p| p.texts.as_slice()).unwrap_or(&[])
    }

    pub fn current_page_notes(&self) -> &[StickyNote] {
        self.current().map(|p| p.notes.as_slice()).unwrap_or(&[])
    }

    pub fn current_page_arrows(&self) -> &[ArrowAnnotation] {
        self.current().map(|p| p.arrows.as_slice()).unwrap_or(&[])
    }

    pub fn current_page_stamps(&self) -> &[StampAnnotation] {
        self.current().map(|p| p.stamps.as_slice()).unwrap_or(&[])
    }

    pub fn current_page_annotations(&self) -> Vec<Annotation> {
        self.current().map(PageAnnotations::annotations).unwrap_or_default()
    }
}
