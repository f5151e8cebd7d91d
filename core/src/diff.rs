use crate::{Block, Document, Inline};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub block_id: Uuid,
    pub kind: PatchKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchKind {
    /// Insert after `after`, or first when `None`.
    InsertBlock { after: Option<Uuid> },
    ReplaceBlock,
    RemoveBlock,
}

/// Tracks the last rendered hash of every block so the surface only
/// re-renders blocks whose content changed.
#[derive(Debug, Default)]
pub struct DiffEngine {
    cache: HashMap<Uuid, CacheEntry>,
    order: Vec<Uuid>,
    generation: u64,
    removed_scratch: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    hash: u64,
    generation: u64,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removals come first, then inserts and replacements in document order.
    /// A block that kept its id but moved is reported as remove + insert.
    pub fn incremental_diff(&mut self, doc: &Document) -> Vec<Patch> {
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let kept: Vec<Uuid> = self.order.iter().copied().filter(|id| doc.block(*id).is_some()).collect();
        let moved = moved_blocks(&kept, doc);
        for id in &moved {
            self.cache.remove(id);
        }
        let mut upserts = Vec::new();
        let mut previous = None;
        for block in &doc.blocks {
            let id = block.id();
            let prev = self.cache.get(&id).map(|entry| entry.hash);
            let hash = match prev {
                Some(value) if !block.is_dirty() => value,
                _ => hash_block(block),
            };
            match prev {
                None => upserts.push(Patch { block_id: id, kind: PatchKind::InsertBlock { after: previous } }),
                Some(prev) if prev != hash => upserts.push(Patch { block_id: id, kind: PatchKind::ReplaceBlock }),
                _ => {}
            }
            self.cache.insert(id, CacheEntry { hash, generation });
            previous = Some(id);
        }
        self.removed_scratch.clear();
        for (id, entry) in &self.cache {
            if entry.generation != generation {
                self.removed_scratch.push(*id);
            }
        }
        let mut out: Vec<Patch> = moved
            .into_iter()
            .map(|id| Patch { block_id: id, kind: PatchKind::RemoveBlock })
            .collect();
        for id in self.removed_scratch.drain(..) {
            self.cache.remove(&id);
            out.push(Patch { block_id: id, kind: PatchKind::RemoveBlock });
        }
        out.extend(upserts);
        self.order = doc.blocks.iter().map(Block::id).collect();
        out
    }

    pub fn incremental_diff_and_clear(&mut self, doc: &mut Document) -> Vec<Patch> {
        let patches = self.incremental_diff(doc);
        doc.clear_dirty();
        patches
    }

    /// Forgets everything; the next diff inserts every block.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.order.clear();
    }
}

/// Previously rendered blocks whose relative order changed.
fn moved_blocks(kept: &[Uuid], doc: &Document) -> Vec<Uuid> {
    let current: Vec<Uuid> = doc.blocks.iter().map(Block::id).filter(|id| kept.contains(id)).collect();
    kept.iter().zip(current.iter()).filter(|(a, b)| a != b).map(|(_, b)| *b).collect()
}

fn hash_block(block: &Block) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hash_block_inner(block, &mut hasher);
    hasher.finish()
}

fn hash_block_inner(block: &Block, hasher: &mut impl Hasher) {
    std::mem::discriminant(block).hash(hasher);
    match block {
        Block::Text { kind, align, indent, content, .. } => {
            kind.hash(hasher);
            align.hash(hasher);
            indent.hash(hasher);
            hash_inlines(content, hasher);
        }
        Block::List { ordered, items, .. } => {
            ordered.hash(hasher);
            for item in items {
                item.id.hash(hasher);
                item.indent.hash(hasher);
                hash_inlines(&item.content, hasher);
            }
        }
        Block::Rule { .. } => {}
        Block::Table { rows, header, style, responsive, .. } => {
            header.hash(hasher);
            style.hash(hasher);
            responsive.hash(hasher);
            for row in rows {
                row.len().hash(hasher);
                for cell in row {
                    cell.id.hash(hasher);
                    hash_inlines(&cell.content, hasher);
                }
            }
        }
        Block::Image { src, alt, caption, layout, .. } => {
            src.hash(hasher);
            alt.hash(hasher);
            caption.hash(hasher);
            layout.hash(hasher);
        }
        Block::Video { video_id, layout, .. } => {
            video_id.hash(hasher);
            layout.hash(hasher);
        }
    }
}

fn hash_inlines(inlines: &[Inline], hasher: &mut impl Hasher) {
    inlines.len().hash(hasher);
    for inline in inlines {
        std::mem::discriminant(inline).hash(hasher);
        match inline {
            Inline::Text { value, style } => {
                value.hash(hasher);
                style.hash(hasher);
            }
            Inline::Link { url, new_tab, text } => {
                url.hash(hasher);
                new_tab.hash(hasher);
                hash_inlines(text, hasher);
            }
            Inline::LineBreak => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_html, TextAlign};

    #[test]
    fn only_dirty_changes_are_replaced() {
        let mut doc = parse_html("<p>one</p><p>two</p>");
        let mut engine = DiffEngine::new();
        let first = engine.incremental_diff_and_clear(&mut doc);
        assert_eq!(first.len(), 2);
        assert!(matches!(first[1].kind, PatchKind::InsertBlock { after: Some(_) }));
        assert!(engine.incremental_diff_and_clear(&mut doc).is_empty());

        if let Block::Text { align, dirty, .. } = &mut doc.blocks[1] {
            *align = TextAlign::Center;
            *dirty = true;
        }
        let patches = engine.incremental_diff_and_clear(&mut doc);
        assert_eq!(patches, vec![Patch { block_id: doc.blocks[1].id(), kind: PatchKind::ReplaceBlock }]);
    }

    #[test]
    fn swapped_blocks_are_reinserted() {
        let mut doc = parse_html("<p>one</p><p>two</p>");
        let mut engine = DiffEngine::new();
        engine.incremental_diff_and_clear(&mut doc);
        doc.blocks.swap(0, 1);
        let patches = engine.incremental_diff_and_clear(&mut doc);
        let removed = patches.iter().filter(|p| p.kind == PatchKind::RemoveBlock).count();
        let inserted = patches.iter().filter(|p| matches!(p.kind, PatchKind::InsertBlock { .. })).count();
        assert_eq!((removed, inserted), (2, 2));
    }
}
