use crate::{text_len, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A caret location: a cursor-holding node and a character offset in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub node: Uuid,
    pub offset: usize,
}

impl Position {
    pub fn new(node: Uuid, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn new(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(pos: Position) -> Self {
        Self { anchor: pos, focus: pos }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_attached(&self, doc: &Document) -> bool {
        doc.has_container(self.anchor.node) && doc.has_container(self.focus.node)
    }

    /// Returns (start, end) in document order.
    pub fn ordered(&self, doc: &Document) -> (Position, Position) {
        if self.anchor.node == self.focus.node {
            return if self.anchor.offset <= self.focus.offset {
                (self.anchor, self.focus)
            } else {
                (self.focus, self.anchor)
            };
        }
        let order = doc.containers();
        let a = order.iter().position(|id| *id == self.anchor.node);
        let f = order.iter().position(|id| *id == self.focus.node);
        match (a, f) {
            (Some(a), Some(f)) if f < a => (self.focus, self.anchor),
            _ => (self.anchor, self.focus),
        }
    }

    /// Same selection with offsets clamped to their containers' lengths.
    pub fn clamped(&self, doc: &Document) -> Option<Selection> {
        let clamp = |pos: Position| {
            doc.container(pos.node)
                .map(|content| Position::new(pos.node, pos.offset.min(text_len(content))))
        };
        Some(Selection::new(clamp(self.anchor)?, clamp(self.focus)?))
    }
}

/// Remembers the caret while focus leaves the editing surface, e.g. while a
/// dialog is open.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    saved: Option<Selection>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// No-op when there is no live selection; a previous save is kept.
    pub fn save(&mut self, live: Option<Selection>) {
        if let Some(sel) = live {
            self.saved = Some(sel);
        }
    }

    /// The saved range with offsets clamped, or `None` when nothing was saved
    /// or one of its containers has left the document.
    pub fn restore(&self, doc: &Document) -> Option<Selection> {
        self.saved?.clamped(doc)
    }

    pub fn has_saved(&self) -> bool {
        self.saved.is_some()
    }

    pub fn saved(&self) -> Option<Selection> {
        self.saved
    }

    pub fn clear(&mut self) {
        self.saved = None;
    }
}
