use crate::{Document, Selection};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub doc: Document,
    pub selection: Option<Selection>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub markup: String,
    pub snapshot: Snapshot,
}

/// Linear undo history of serialized snapshots with a cursor. Saving after
/// an undo discards the redo tail.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    index: usize,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::new(), index: 0, capacity: capacity.max(1) }
    }

    /// Returns false when the markup equals the entry under the cursor.
    pub fn save_state(&mut self, markup: String, snapshot: Snapshot) -> bool {
        if let Some(current) = self.current() {
            if current.markup == markup {
                return false;
            }
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(HistoryEntry { markup, snapshot });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
        true
    }

    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
    }
}
