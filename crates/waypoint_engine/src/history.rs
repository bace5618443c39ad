// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history for authoring sessions.
//!
//! Every committed edit stores serialized before/after snapshots of the
//! walkthrough. Undo hands back the "before" state and redo the "after"
//! state; the caller swaps it in.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use waypoint_model::Walkthrough;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Snapshot encoding error
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Serialized walkthrough state
#[derive(Debug, Clone)]
struct Snapshot {
    data: Vec<u8>,
}

impl Snapshot {
    fn capture<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_vec(value)?,
        })
    }

    fn restore<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.data)?)
    }
}

/// One undoable edit
#[derive(Debug, Clone)]
struct Edit {
    /// Human-readable description, e.g. "Reorder steps"
    description: String,
    before: Snapshot,
    after: Snapshot,
}

impl Edit {
    /// Memory held by both snapshots
    fn memory_size(&self) -> usize {
        self.before.data.len() + self.after.data.len()
    }
}

/// History statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Edits that can be undone
    pub undo_count: usize,
    /// Edits that can be redone
    pub redo_count: usize,
    /// Bytes held by the undo stack
    pub memory_used: usize,
    /// Maximum undo depth
    pub max_depth: usize,
}

/// Undo/redo stacks of walkthrough edits
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<Edit>,
    redo_stack: VecDeque<Edit>,
    max_depth: usize,
    memory_used: usize,
}

impl History {
    /// Create with a maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            memory_used: 0,
        }
    }

    /// Record a committed edit. Clears the redo stack.
    pub fn record(
        &mut self,
        description: impl Into<String>,
        before: &Walkthrough,
        after: &Walkthrough,
    ) -> Result<()> {
        let edit = Edit {
            description: description.into(),
            before: Snapshot::capture(before)?,
            after: Snapshot::capture(after)?,
        };

        self.redo_stack.clear();
        self.memory_used += edit.memory_size();
        self.undo_stack.push_back(edit);

        while self.undo_stack.len() > self.max_depth {
            if let Some(oldest) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(oldest.memory_size());
            }
        }
        Ok(())
    }

    /// Undo the last edit, returning the state before it
    pub fn undo(&mut self) -> Result<Walkthrough> {
        let edit = self.undo_stack.back().ok_or(HistoryError::NothingToUndo)?;
        let state = edit.before.restore()?;
        if let Some(edit) = self.undo_stack.pop_back() {
            self.memory_used = self.memory_used.saturating_sub(edit.memory_size());
            self.redo_stack.push_back(edit);
        }
        Ok(state)
    }

    /// Redo the last undone edit, returning the state after it
    pub fn redo(&mut self) -> Result<Walkthrough> {
        let edit = self.redo_stack.back().ok_or(HistoryError::NothingToRedo)?;
        let state = edit.after.restore()?;
        if let Some(edit) = self.redo_stack.pop_back() {
            self.memory_used += edit.memory_size();
            self.undo_stack.push_back(edit);
        }
        Ok(state)
    }

    /// Whether undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Description of the next undo
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.description.as_str())
    }

    /// Description of the next redo
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.description.as_str())
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_used = 0;
    }

    /// Current statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_max_depth(crate::config::EngineConfig::default().history_depth)
    }
}
