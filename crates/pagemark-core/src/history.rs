//! Undo/redo log of annotation mutations.
//!
//! Each entry stores full entity snapshots, so applying and reverting are
//! exact inverses of each other.

use crate::annotations::{Annotation, AnnotationId, DrawingPath, PageNumber};
use crate::coords::Anchored;
use crate::page::{PageAnnotations, PageMap};
use kurbo::Size;

/// Default maximum number of undo entries to keep.
pub const MAX_UNDO_HISTORY: usize = 100;

/// One undoable mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    /// An annotation was appended to its page.
    Add(Annotation),
    /// An annotation was replaced in place.
    Update { before: Annotation, after: Annotation },
    /// An annotation was removed from `index` in its kind's list.
    Delete { annotation: Annotation, index: usize },
    /// Several annotations on one page were removed at once (eraser).
    /// Sorted by ascending index.
    DeleteMany {
        page: PageNumber,
        removed: Vec<(usize, Annotation)>,
    },
    /// All freehand paths on a page were removed.
    ClearPage {
        page: PageNumber,
        paths: Vec<DrawingPath>,
    },
    /// Every annotation on every page was removed.
    ClearAll { snapshot: PageMap },
}

impl HistoryEntry {
    /// Page touched by this entry, or `None` when it spans every page.
    pub fn page(&self) -> Option<PageNumber> {
        match self {
            HistoryEntry::Add(a) => Some(a.page_number()),
            HistoryEntry::Update { after, .. } => Some(after.page_number()),
            HistoryEntry::Delete { annotation, .. } => Some(annotation.page_number()),
            HistoryEntry::DeleteMany { page, .. } | HistoryEntry::ClearPage { page, .. } => {
                Some(*page)
            }
            HistoryEntry::ClearAll { .. } => None,
        }
    }

    /// Move the snapshots on `page` along with a page size change, so that
    /// replaying them lands where the live entities are.
    pub fn reanchor(&mut self, page: PageNumber, previous: Option<Size>, size: Size) {
        match self {
            HistoryEntry::Add(annotation) | HistoryEntry::Delete { annotation, .. } => {
                if annotation.page_number() == page {
                    annotation.reanchor(previous, size);
                }
            }
            HistoryEntry::Update { before, after } => {
                if after.page_number() == page {
                    before.reanchor(previous, size);
                    after.reanchor(previous, size);
                }
            }
            HistoryEntry::DeleteMany { page: on, removed } => {
                if *on == page {
                    removed.iter_mut().for_each(|(_, a)| a.reanchor(previous, size));
                }
            }
            // Paths carry no relative coordinates.
            HistoryEntry::ClearPage { .. } => {}
            HistoryEntry::ClearAll { snapshot } => {
                if let Some(annotations) = snapshot.get_mut(&page) {
                    annotations.reanchor(previous, size);
                }
            }
        }
    }

    /// Re-apply the mutation.
    pub fn apply(&self, pages: &mut PageMap) {
        match self {
            HistoryEntry::Add(annotation) => {
                page_mut(pages, annotation.page_number()).insert(annotation.clone(), None);
            }
            HistoryEntry::Update { after, .. } => replace(pages, after),
            HistoryEntry::Delete { annotation, .. } => remove(pages, annotation),
            HistoryEntry::DeleteMany { removed, .. } => {
                for (_, annotation) in removed {
                    remove(pages, annotation);
                }
            }
            HistoryEntry::ClearPage { page, .. } => {
                if let Some(page) = pages.get_mut(page) {
                    page.paths.clear();
                }
            }
            HistoryEntry::ClearAll { .. } => pages.clear(),
        }
    }

    /// Undo the mutation.
    pub fn revert(&self, pages: &mut PageMap) {
        match self {
            HistoryEntry::Add(annotation) => remove(pages, annotation),
            HistoryEntry::Update { before, .. } => replace(pages, before),
            HistoryEntry::Delete { annotation, index } => {
                page_mut(pages, annotation.page_number()).insert(annotation.clone(), Some(*index));
            }
            HistoryEntry::DeleteMany { page, removed } => {
                let target = page_mut(pages, *page);
                for (index, annotation) in removed {
                    target.insert(annotation.clone(), Some(*index));
                }
            }
            HistoryEntry::ClearPage { page, paths } => {
                page_mut(pages, *page).paths = paths.clone();
            }
            HistoryEntry::ClearAll { snapshot } => *pages = snapshot.clone(),
        }
    }
}

fn page_mut(pages: &mut PageMap, page: PageNumber) -> &mut PageAnnotations {
    pages.entry(page).or_default()
}

fn remove(pages: &mut PageMap, annotation: &Annotation) {
    let removed = pages
        .get_mut(&annotation.page_number())
        .and_then(|page| page.remove(annotation.kind(), annotation.id()));
    if removed.is_none() {
        log::warn!(
            "History: {} {} already absent from page {}",
            annotation.kind().name(),
            annotation.id(),
            annotation.page_number()
        );
    }
}

fn replace(pages: &mut PageMap, annotation: &Annotation) {
    if page_mut(pages, annotation.page_number())
        .replace(annotation.clone())
        .is_err()
    {
        log::warn!(
            "History: {} {} missing on page {}, nothing replaced",
            annotation.kind().name(),
            annotation.id(),
            annotation.page_number()
        );
    }
}

/// Bounded undo and redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Maximum undo entries; 0 means unbounded.
    limit: usize,
    /// Id of an annotation whose last `Update` may still be amended.
    open_update: Option<AnnotationId>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit,
            open_update: None,
        }
    }

    /// Record a new mutation. Clears the redo stack and drops the oldest
    /// entry past the limit.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.open_update = None;
        self.undo_stack.push(entry);
        self.redo_stack.clear();

        if self.limit > 0 && self.undo_stack.len() > self.limit {
            let excess = self.undo_stack.len() - self.limit;
            self.undo_stack.drain(..excess);
        }
    }

    /// Record an update that later ticks of the same gesture fold into.
    ///
    /// While the gesture stays open, consecutive updates of one annotation
    /// keep the first `before` and only move `after` forward, so a resize
    /// drag is undone in one step.
    pub fn record_continuous(&mut self, before: Annotation, after: Annotation) {
        let id = after.id();
        if self.open_update == Some(id) {
            if let Some(HistoryEntry::Update { after: last, .. }) = self.undo_stack.last_mut() {
                *last = after;
                return;
            }
        }
        self.record(HistoryEntry::Update { before, after });
        self.open_update = Some(id);
    }

    /// Close any open continuous update.
    pub fn seal(&mut self) {
        self.open_update = None;
    }

    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.open_update = None;
        self.undo_stack.pop()
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.open_update = None;
        self.redo_stack.pop()
    }

    /// Push an entry that was just undone.
    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo_stack.push(entry);
    }

    /// Push an entry that was just redone, keeping the redo stack.
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Carry a page size change into every undo and redo snapshot.
    pub fn reanchor(&mut self, page: PageNumber, previous: Option<Size>, size: Size) {
        for entry in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            entry.reanchor(page, previous, size);
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open_update = None;
    }
}
