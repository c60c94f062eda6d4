//! Ordered annotation store.
//!
//! Insertion order is z-order. Annotations live in an arena keyed by id;
//! `order` lists the ones currently placed. Removed annotations stay in the
//! arena while the undo log can still bring them back.

use crate::annotation::{Annotation, AnnotationId, HitSlop};
use crate::geometry::Zoom;
use crate::history::{HistoryEntry, Operation, UndoLog};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    arena: HashMap<AnnotationId, Annotation>,
    order: Vec<AnnotationId>,
    selected: Option<AnnotationId>,
    history: UndoLog,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(limit: usize) -> Self {
        Self { history: UndoLog::with_limit(limit), ..Self::default() }
    }

    /// Places `annotation` on top of its page and records the add.
    ///
    /// An annotation whose id is already placed is left alone.
    pub fn add(&mut self, mut annotation: Annotation) -> AnnotationId {
        let id = annotation.id();
        if self.order.contains(&id) {
            tracing::debug!(%id, "annotation already placed");
            return id;
        }
        annotation.set_selected(false);
        self.arena.insert(id, annotation);
        self.order.push(id);
        self.record(Operation::Add, id);
        tracing::debug!(%id, count = self.order.len(), "annotation added");
        id
    }

    /// Removes the annotation with `id` and records the delete. Returns
    /// false, recording nothing, when it is not placed.
    pub fn remove(&mut self, id: AnnotationId) -> bool {
        if !self.detach(id) {
            return false;
        }
        self.record(Operation::Delete, id);
        tracing::debug!(%id, count = self.order.len(), "annotation removed");
        true
    }

    /// Reverts the newest recorded action. Returns the entry undone.
    pub fn undo_once(&mut self) -> Option<HistoryEntry> {
        let entry = self.history.pop_undo()?;
        match entry.op {
            Operation::Add => {
                self.detach(entry.id);
            }
            // Re-inserted on top, not at its former depth.
            Operation::Delete => self.attach(entry.id),
        }
        tracing::debug!(op = ?entry.op, id = %entry.id, "undo");
        Some(entry)
    }

    /// Reapplies the newest undone action. Returns the entry redone.
    pub fn redo_once(&mut self) -> Option<HistoryEntry> {
        let entry = self.history.pop_redo()?;
        match entry.op {
            Operation::Add => self.attach(entry.id),
            Operation::Delete => {
                self.detach(entry.id);
            }
        }
        tracing::debug!(op = ?entry.op, id = %entry.id, "redo");
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &UndoLog {
        &self.history
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        if self.order.contains(&id) {
            self.arena.get(&id)
        } else {
            None
        }
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.order.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every placed annotation, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.order.iter().filter_map(|id| self.arena.get(id))
    }

    /// Annotations on `page_index`, oldest first. Rendering and flattening
    /// both walk this order.
    pub fn annotations_for_page(&self, page_index: u32) -> impl Iterator<Item = &Annotation> + '_ {
        self.iter().filter(move |annotation| annotation.page_index() == page_index)
    }

    pub fn ids(&self) -> &[AnnotationId] {
        &self.order
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn selected_annotation(&self) -> Option<&Annotation> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Selects `id`, clearing any previous selection first. Returns false
    /// when `id` is not placed.
    pub fn select(&mut self, id: AnnotationId) -> bool {
        if !self.order.contains(&id) {
            return false;
        }
        self.clear_selection();
        if let Some(annotation) = self.arena.get_mut(&id) {
            annotation.set_selected(true);
        }
        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.selected.take() {
            if let Some(annotation) = self.arena.get_mut(&previous) {
                annotation.set_selected(false);
            }
        }
    }

    /// Topmost annotation on `page_index` under the view-space point.
    pub fn hit_test(
        &self,
        page_index: u32,
        view_x: f32,
        view_y: f32,
        zoom: Zoom,
        slop: &HitSlop,
    ) -> Option<AnnotationId> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.arena.get(id))
            .filter(|annotation| annotation.page_index() == page_index)
            .find(|annotation| annotation.hit_test_with(view_x, view_y, zoom, slop))
            .map(Annotation::id)
    }

    /// Moves a placed annotation by a document-space delta. Moves are not
    /// recorded in the undo log.
    pub fn move_by(&mut self, id: AnnotationId, dx: f32, dy: f32) -> bool {
        if !self.order.contains(&id) {
            return false;
        }
        match self.arena.get_mut(&id) {
            Some(annotation) => {
                annotation.translate(dx, dy);
                true
            }
            None => false,
        }
    }

    /// Drops every annotation and all history.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.order.clear();
        self.selected = None;
        self.history.clear();
    }

    fn record(&mut self, op: Operation, id: AnnotationId) {
        self.history.record(op, id);
        self.prune();
    }

    /// Removes from `order` without touching history.
    fn detach(&mut self, id: AnnotationId) -> bool {
        let Some(position) = self.order.iter().position(|placed| *placed == id) else {
            return false;
        };
        self.order.remove(position);
        if self.selected == Some(id) {
            self.clear_selection();
        }
        true
    }

    /// Appends to `order` without touching history.
    fn attach(&mut self, id: AnnotationId) {
        if self.arena.contains_key(&id) && !self.order.contains(&id) {
            self.order.push(id);
        }
    }

    /// Frees annotations that are neither placed nor reachable through
    /// history.
    fn prune(&mut self) {
        let order = &self.order;
        let history = &self.history;
        self.arena.retain(|id, _| order.contains(id) || history.references(*id));
    }
}
