//! Undo/redo log over annotation adds and deletes.
//!
//! Entries hold annotation ids, never annotation values, so two
//! field-identical annotations are never confused. The log only tracks
//! operations; the store applies their effects.

use crate::annotation::AnnotationId;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub op: Operation,
    pub id: AnnotationId,
}

/// Two stacks of history entries, most recent last.
#[derive(Debug, Clone)]
pub struct UndoLog {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    limit: usize,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl UndoLog {
    /// A limit of zero is raised to one.
    pub fn with_limit(limit: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), limit: limit.max(1) }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Records a fresh user action. Clears redo; the oldest entry is dropped
    /// once the limit is exceeded and returned.
    pub fn record(&mut self, op: Operation, id: AnnotationId) -> Option<HistoryEntry> {
        self.redo.clear();
        self.undo.push_back(HistoryEntry { op, id });
        if self.undo.len() > self.limit {
            return self.undo.pop_front();
        }
        None
    }

    /// Moves the newest undo entry onto the redo stack.
    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo.pop_back()?;
        self.redo.push(entry);
        Some(entry)
    }

    /// Moves the newest redo entry back onto the undo stack.
    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo.pop()?;
        self.undo.push_back(entry);
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    /// Whether any entry on either stack refers to `id`.
    pub fn references(&self, id: AnnotationId) -> bool {
        self.undo.iter().chain(self.redo.iter()).any(|entry| entry.id == id)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
