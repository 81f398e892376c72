//! Undo/redo history for committed annotation edits.
//!
//! Each image keeps its own [`History`]. Entries describe committed edits
//! by annotation and primitive id, so replaying them never has to search
//! for geometry by coordinates.

use thiserror::Error;

use crate::geometry::Polygon;
use crate::model::{Annotation, AnnotationId, PrimitiveId};

// ============================================================================
// Edit Entries
// ============================================================================

/// One committed edit, recorded with enough data to revert and re-apply it.
#[derive(Debug, Clone, PartialEq)]
pub enum EditEntry {
    /// A bounding box was committed, creating its annotation.
    BoxCommit { annotation: Annotation },
    /// A closed polygon ring was committed onto an existing annotation.
    PolygonCommit {
        annotation: AnnotationId,
        primitive: PrimitiveId,
        polygon: Polygon,
    },
}

impl EditEntry {
    /// Human-readable description for status lines and menus.
    pub fn description(&self) -> String {
        match self {
            EditEntry::BoxCommit { annotation } => {
                format!("`{}` bounding box", annotation.label)
            }
            EditEntry::PolygonCommit { polygon, .. } => {
                format!("polygon with {} vertices", polygon.vertex_count())
            }
        }
    }

    /// Rewrite the recorded label if it matches `old`. Returns whether
    /// anything changed.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        match self {
            EditEntry::BoxCommit { annotation } => annotation.rename(old, new),
            EditEntry::PolygonCommit { .. } => false,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure modes of history navigation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    /// Undo or redo was requested with the corresponding stack empty.
    #[error("history is empty")]
    EmptyHistory,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the history system.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum number of entries to keep in history.
    pub max_history: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_history: 100 }
    }
}

// ============================================================================
// History Stacks
// ============================================================================

/// Paired undo/redo stacks for one image.
///
/// Committing a new edit always clears the redo stack: edits that were
/// undone before the commit can no longer be replayed onto the changed
/// state. Popping either stack pushes a clone onto the other, so walking
/// back and forth replays the same entries.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo_stack: Vec<EditEntry>,
    redo_stack: Vec<EditEntry>,
    config: HistoryConfig,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            config,
        }
    }

    /// Record a committed edit. Clears the redo stack unconditionally.
    pub fn commit(&mut self, entry: EditEntry) {
        log::debug!("📝 History: pushed '{}'", entry.description());
        self.undo_stack.push(entry);
        self.redo_stack.clear();

        // Trim oldest entries if over limit
        while self.undo_stack.len() > self.config.max_history {
            self.undo_stack.remove(0);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pop the newest edit for reverting. The entry moves to the redo
    /// stack.
    pub fn pop_undo(&mut self) -> Result<EditEntry, HistoryError> {
        let Some(entry) = self.undo_stack.pop() else {
            return Err(HistoryError::EmptyHistory);
        };
        log::debug!("⏪ History: undoing '{}'", entry.description());
        self.redo_stack.push(entry.clone());
        Ok(entry)
    }

    /// Pop the newest undone edit for re-applying. The entry moves back to
    /// the undo stack.
    pub fn pop_redo(&mut self) -> Result<EditEntry, HistoryError> {
        let Some(entry) = self.redo_stack.pop() else {
            return Err(HistoryError::EmptyHistory);
        };
        log::debug!("⏩ History: redoing '{}'", entry.description());
        self.undo_stack.push(entry.clone());
        Ok(entry)
    }

    /// Description of the edit the next undo would revert.
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(EditEntry::description)
    }

    /// Description of the edit the next redo would re-apply.
    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(EditEntry::description)
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        log::debug!("🗑️ History: cleared");
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Mutable walk over every recorded entry on both stacks, used by the
    /// label rename.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut EditEntry> {
        self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut())
    }
}
