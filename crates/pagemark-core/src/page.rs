//! Per-page annotation collections.

use crate::annotations::{
    Annotation, AnnotationId, AnnotationKind, ArrowAnnotation, DrawingPath, PageItem, PageNumber,
    ShapeObject, StampAnnotation, StickyNote, TextAnnotation,
};
use crate::coords::Anchored;
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every page's annotations, keyed by page number.
pub type PageMap = BTreeMap<PageNumber, PageAnnotations>;

/// The annotations on one page, one list per entity kind.
///
/// Lists keep insertion order, which is also the draw order: later entries
/// render on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageAnnotations {
    pub paths: Vec<DrawingPath>,
    pub shapes: Vec<ShapeObject>,
    pub texts: Vec<TextAnnotation>,
    pub notes: Vec<StickyNote>,
    pub arrows: Vec<ArrowAnnotation>,
    pub stamps: Vec<StampAnnotation>,
}

fn insert_at<T>(list: &mut Vec<T>, index: Option<usize>, item: T) -> usize {
    let index = index.unwrap_or(list.len()).min(list.len());
    list.insert(index, item);
    index
}

fn position<T: PageItem>(list: &[T], id: AnnotationId) -> Option<usize> {
    list.iter().position(|item| item.id() == id)
}

fn remove_from<T: PageItem>(list: &mut Vec<T>, id: AnnotationId) -> Option<(usize, T)> {
    let index = position(list, id)?;
    Some((index, list.remove(index)))
}

fn take_from<T: PageItem + Into<Annotation>>(
    list: &mut Vec<T>,
    id: AnnotationId,
) -> Option<(usize, Annotation)> {
    remove_from(list, id).map(|(index, item)| (index, item.into()))
}

fn replace_as<T: PageItem + Into<Annotation>>(
    list: &mut [T],
    item: T,
) -> Result<Annotation, Annotation> {
    match position(list, item.id()) {
        Some(index) => Ok(std::mem::replace(&mut list[index], item).into()),
        None => Err(item.into()),
    }
}

fn find_in<T>(list: &[T], id: AnnotationId) -> Option<Annotation>
where
    T: PageItem + Clone + Into<Annotation>,
{
    list.iter().find(|item| item.id() == id).cloned().map(Into::into)
}

impl PageAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at `index` (clamped), or append when `None`. Returns the index used.
    pub fn insert(&mut self, annotation: Annotation, index: Option<usize>) -> usize {
        match annotation {
            Annotation::Path(a) => insert_at(&mut self.paths, index, a),
            Annotation::Shape(a) => insert_at(&mut self.shapes, index, a),
            Annotation::Text(a) => insert_at(&mut self.texts, index, a),
            Annotation::Note(a) => insert_at(&mut self.notes, index, a),
            Annotation::Arrow(a) => insert_at(&mut self.arrows, index, a),
            Annotation::Stamp(a) => insert_at(&mut self.stamps, index, a),
        }
    }

    /// Remove by id, returning the former index and the entity.
    pub fn remove(
        &mut self,
        kind: AnnotationKind,
        id: AnnotationId,
    ) -> Option<(usize, Annotation)> {
        match kind {
            AnnotationKind::Path => take_from(&mut self.paths, id),
            AnnotationKind::Shape => take_from(&mut self.shapes, id),
            AnnotationKind::Text => take_from(&mut self.texts, id),
            AnnotationKind::Note => take_from(&mut self.notes, id),
            AnnotationKind::Arrow => take_from(&mut self.arrows, id),
            AnnotationKind::Stamp => take_from(&mut self.stamps, id),
        }
    }

    /// Replace the entity with the same id in place. Returns the previous
    /// value, or hands the annotation back when no entity has its id.
    pub fn replace(&mut self, annotation: Annotation) -> Result<Annotation, Annotation> {
        match annotation {
            Annotation::Path(a) => replace_as(&mut self.paths, a),
            Annotation::Shape(a) => replace_as(&mut self.shapes, a),
            Annotation::Text(a) => replace_as(&mut self.texts, a),
            Annotation::Note(a) => replace_as(&mut self.notes, a),
            Annotation::Arrow(a) => replace_as(&mut self.arrows, a),
            Annotation::Stamp(a) => replace_as(&mut self.stamps, a),
        }
    }

    pub fn get(&self, kind: AnnotationKind, id: AnnotationId) -> Option<Annotation> {
        match kind {
            AnnotationKind::Path => find_in(&self.paths, id),
            AnnotationKind::Shape => find_in(&self.shapes, id),
            AnnotationKind::Text => find_in(&self.texts, id),
            AnnotationKind::Note => find_in(&self.notes, id),
            AnnotationKind::Arrow => find_in(&self.arrows, id),
            AnnotationKind::Stamp => find_in(&self.stamps, id),
        }
    }

    pub fn contains(&self, kind: AnnotationKind, id: AnnotationId) -> bool {
        match kind {
            AnnotationKind::Path => position(&self.paths, id).is_some(),
            AnnotationKind::Shape => position(&self.shapes, id).is_some(),
            AnnotationKind::Text => position(&self.texts, id).is_some(),
            AnnotationKind::Note => position(&self.notes, id).is_some(),
            AnnotationKind::Arrow => position(&self.arrows, id).is_some(),
            AnnotationKind::Stamp => position(&self.stamps, id).is_some(),
        }
    }

    /// Follow a page size change on every anchored entity.
    pub fn reanchor(&mut self, previous: Option<Size>, size: Size) {
        self.texts.iter_mut().for_each(|a| a.reanchor(previous, size));
        self.notes.iter_mut().for_each(|a| a.reanchor(previous, size));
        self.arrows.iter_mut().for_each(|a| a.reanchor(previous, size));
        self.stamps.iter_mut().for_each(|a| a.reanchor(previous, size));
    }

    /// All annotations, grouped by kind in draw order.
    pub fn annotations(&self) -> Vec<Annotation> {
        let mut all = Vec::with_capacity(self.len());
        all.extend(self.paths.iter().cloned().map(Annotation::from));
        all.extend(self.shapes.iter().cloned().map(Annotation::from));
        all.extend(self.texts.iter().cloned().map(Annotation::from));
        all.extend(self.notes.iter().cloned().map(Annotation::from));
        all.extend(self.arrows.iter().cloned().map(Annotation::from));
        all.extend(self.stamps.iter().cloned().map(Annotation::from));
        all
    }

    /// Number of entities of one kind.
    pub fn count(&self, kind: AnnotationKind) -> usize {
        match kind {
            AnnotationKind::Path => self.paths.len(),
            AnnotationKind::Shape => self.shapes.len(),
            AnnotationKind::Text => self.texts.len(),
            AnnotationKind::Note => self.notes.len(),
            AnnotationKind::Arrow => self.arrows.len(),
            AnnotationKind::Stamp => self.stamps.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
            + self.shapes.len()
            + self.texts.len()
            + self.notes.len()
            + self.arrows.len()
            + self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
