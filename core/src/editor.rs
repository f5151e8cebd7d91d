use crate::{
    delete_range, insert_inlines, normalize, parse_html, split_inlines, style_at, text_len, to_html, Block,
    Document, EditorCommand, EditorConfig, History, HostRegion, HtmlMode, InFlight, InitializationError, Inline,
    ListItem, MediaKind, Position, ResizeGesture, Selection, SelectionTracker, Snapshot, Style, TableEditor,
    TextAlign, TextKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Which host regions were found when mounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRegions {
    pub toolbar: bool,
    pub surface: bool,
}

impl HostRegions {
    pub fn present() -> Self {
        Self { toolbar: true, surface: true }
    }

    pub fn missing(&self) -> Vec<HostRegion> {
        let mut missing = Vec::new();
        if !self.toolbar {
            missing.push(HostRegion::Toolbar);
        }
        if !self.surface {
            missing.push(HostRegion::Surface);
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    Load,
    Input,
    Blur,
    Paste,
    Submit,
    Unload,
    Command,
    Media,
    Resize,
    History,
    SetContent,
}

/// Mirror of the host form field that receives the serialized markup.
#[derive(Debug, Clone, Default)]
pub struct HiddenField {
    value: String,
    last_reason: Option<SyncReason>,
    syncs: u64,
}

impl HiddenField {
    fn write(&mut self, markup: String, reason: SyncReason) {
        self.value = markup;
        self.last_reason = Some(reason);
        self.syncs += 1;
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn last_reason(&self) -> Option<SyncReason> {
        self.last_reason
    }

    pub fn syncs(&self) -> u64 {
        self.syncs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Success, message: message.into() }
    }
}

#[derive(Debug, Clone)]
pub enum Fragment {
    Inlines(Vec<Inline>),
    Block(Block),
}

/// Weak reference to a media element, resolved by id on use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub id: Uuid,
}

#[derive(Debug)]
pub struct Editor {
    pub(crate) doc: Document,
    pub(crate) selection: Option<Selection>,
    pub(crate) tracker: SelectionTracker,
    history: History,
    pub(crate) pending_style: Option<Style>,
    hidden: HiddenField,
    pub(crate) config: EditorConfig,
    pub(crate) selected: Option<MediaRef>,
    pub(crate) in_flight: InFlight,
    pub(crate) resize: Option<ResizeGesture>,
    notifications: Vec<Notification>,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_document(config, Document::new())
    }

    pub fn with_content(config: EditorConfig, markup: &str) -> Self {
        Self::with_document(config, parse_html(markup))
    }

    fn with_document(config: EditorConfig, doc: Document) -> Self {
        let mut editor = Self {
            doc,
            selection: None,
            tracker: SelectionTracker::new(),
            history: History::new(config.history_capacity),
            pending_style: None,
            hidden: HiddenField::default(),
            config,
            selected: None,
            in_flight: InFlight::default(),
            resize: None,
            notifications: Vec::new(),
        };
        editor.doc.ensure_block();
        editor.selection = editor.start_selection();
        let markup = editor.content();
        let snapshot = editor.snapshot();
        editor.history.save_state(markup.clone(), snapshot);
        editor.hidden.write(markup, SyncReason::Load);
        editor
    }

    /// Fails when a required host region is absent; the host stays inert.
    pub fn mount(regions: HostRegions, config: EditorConfig, initial: &str) -> Result<Self, InitializationError> {
        let missing = regions.missing();
        if !missing.is_empty() {
            let err = InitializationError { missing };
            warn!(error = %err, "editor mount aborted");
            return Err(err);
        }
        let editor = if initial.trim().is_empty() {
            Self::new(config)
        } else {
            Self::with_content(config, initial)
        };
        debug!(blocks = editor.doc.blocks.len(), "editor mounted");
        Ok(editor)
    }

    pub fn execute(&mut self, command: EditorCommand) {
        match command {
            EditorCommand::InsertText(text) => self.insert_text(&text),
            EditorCommand::DeleteBackward => self.delete_backward(),
            EditorCommand::DeleteForward => self.delete_forward(),
            EditorCommand::SplitBlock => self.split_block(),
            EditorCommand::LineBreak => self.line_break(),
            EditorCommand::PasteText(text) => self.paste_text(&text),
            EditorCommand::Format(format) => {
                self.exec(format);
            }
            EditorCommand::InsertQuote => {
                self.insert_quote();
            }
            EditorCommand::InsertCode => {
                self.insert_code();
            }
            EditorCommand::TableInsertRow => self.edit_table_at_cursor(|b, r, _| TableEditor::insert_row(b, r + 1)),
            EditorCommand::TableInsertColumn => {
                self.edit_table_at_cursor(|b, _, c| TableEditor::insert_column(b, c + 1))
            }
            EditorCommand::TableDeleteRow => self.edit_table_at_cursor(|b, r, _| TableEditor::delete_row(b, r)),
            EditorCommand::TableDeleteColumn => self.edit_table_at_cursor(|b, _, c| TableEditor::delete_column(b, c)),
            EditorCommand::Undo => {
                self.undo();
            }
            EditorCommand::Redo => {
                self.redo();
            }
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn tracker(&self) -> &SelectionTracker {
        &self.tracker
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Live selection reported by the surface. Offsets are clamped; a
    /// selection outside any container is dropped.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        let next = selection.and_then(|s| s.clamped(&self.doc));
        if next != self.selection {
            self.pending_style = None;
        }
        self.selection = next;
    }

    pub fn save_selection(&mut self) {
        self.tracker.save(self.selection);
    }

    pub fn clear_dirty(&mut self) {
        self.doc.clear_dirty();
    }

    pub fn content(&self) -> String {
        to_html(&self.doc, HtmlMode::Storage)
    }

    pub fn surface_html(&self) -> String {
        to_html(&self.doc, HtmlMode::Surface)
    }

    /// Replaces the whole tree; recorded as one history step.
    pub fn set_content(&mut self, markup: &str) {
        self.doc = parse_html(markup);
        self.doc.mark_all_dirty();
        self.selection = self.start_selection();
        self.tracker.clear();
        self.pending_style = None;
        self.selected = None;
        self.resize = None;
        self.commit(SyncReason::SetContent);
    }

    pub fn clear(&mut self) {
        self.doc.blocks = vec![Block::paragraph(Vec::new())];
        self.selection = self.start_selection();
        self.pending_style = None;
        self.commit(SyncReason::Command);
    }

    pub fn text(&self) -> String {
        self.doc.plain_text()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.blocks.iter().all(|b| match b {
            Block::Text { content, .. } => crate::plain_text(content).trim().is_empty(),
            _ => false,
        })
    }

    pub fn sync(&mut self, reason: SyncReason) {
        let markup = self.content();
        self.hidden.write(markup, reason);
    }

    pub fn hidden_value(&self) -> &str {
        self.hidden.value()
    }

    pub fn hidden_field(&self) -> &HiddenField {
        &self.hidden
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot { doc: self.doc.clone(), selection: self.selection }
    }

    /// Runs after every completed mutation: history first, then the hidden
    /// field, then stale references are dropped.
    pub(crate) fn commit(&mut self, reason: SyncReason) {
        self.doc.ensure_block();
        self.doc.touch();
        let markup = self.content();
        let snapshot = self.snapshot();
        if self.history.save_state(markup.clone(), snapshot) {
            debug!(index = self.history.index(), entries = self.history.len(), ?reason, "history entry saved");
        }
        self.hidden.write(markup, reason);
        self.drop_stale();
    }

    fn drop_stale(&mut self) {
        if let Some(sel) = self.selection {
            self.selection = sel.clamped(&self.doc).or_else(|| self.start_selection());
        }
        if let Some(media) = self.selected {
            if self.doc.block(media.id).and_then(Block::media_kind) != Some(media.kind) {
                self.selected = None;
            }
        }
        if let Some(gesture) = self.resize {
            if self.doc.block(gesture.target.id).is_none() {
                self.resize = None;
            }
        }
    }

    pub(crate) fn start_selection(&self) -> Option<Selection> {
        self.doc.containers().first().map(|id| Selection::collapsed(Position::new(*id, 0)))
    }

    pub(crate) fn live_selection(&self) -> Option<Selection> {
        self.selection.and_then(|s| s.clamped(&self.doc))
    }

    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.undo() else {
            return false;
        };
        let snapshot = entry.snapshot.clone();
        self.restore_snapshot(snapshot);
        debug!(index = self.history.index(), "undo");
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.redo() else {
            return false;
        };
        let snapshot = entry.snapshot.clone();
        self.restore_snapshot(snapshot);
        debug!(index = self.history.index(), "redo");
        true
    }

    fn restore_snapshot(&mut self, snapshot: Snapshot) {
        self.doc = snapshot.doc;
        self.doc.mark_all_dirty();
        self.doc.touch();
        self.selection = snapshot.selection.and_then(|s| s.clamped(&self.doc)).or_else(|| self.start_selection());
        self.pending_style = None;
        self.resize = None;
        self.sync(SyncReason::History);
        self.drop_stale();
    }

    // ---- insertion -------------------------------------------------------

    /// Prefers the tracked selection; a detached one means "append at end".
    pub(crate) fn insertion_point(&mut self) -> Option<Selection> {
        if self.tracker.has_saved() {
            let restored = self.tracker.restore(&self.doc);
            self.tracker.clear();
            if restored.is_none() {
                warn!("saved selection is detached, appending at document end");
            }
            self.selection = restored.or(self.selection);
            return restored;
        }
        self.live_selection()
    }

    /// Deletes the range and returns the collapsed start.
    pub(crate) fn collapse_range(&mut self, sel: Selection) -> Position {
        if sel.is_collapsed() {
            return sel.focus;
        }
        let (start, end) = sel.ordered(&self.doc);
        self.delete_between(start, end);
        self.selection = Some(Selection::collapsed(start));
        start
    }

    fn delete_between(&mut self, start: Position, end: Position) {
        if start.node == end.node {
            if let Some(content) = self.doc.container_mut(start.node) {
                delete_range(content, start.offset, end.offset);
            }
            return;
        }
        let (Some(sb), Some(eb)) = (self.doc.owner_index(start.node), self.doc.owner_index(end.node)) else {
            return;
        };
        let top_level = |doc: &Document, index: usize, node: Uuid| {
            matches!(&doc.blocks[index], Block::Text { id, .. } if *id == node)
        };
        if sb < eb && top_level(&self.doc, sb, start.node) && top_level(&self.doc, eb, end.node) {
            let tail = match self.doc.container_mut(end.node) {
                Some(content) => split_inlines(std::mem::take(content), end.offset).1,
                None => Vec::new(),
            };
            if let Some(content) = self.doc.container_mut(start.node) {
                let (mut head, _) = split_inlines(std::mem::take(content), start.offset);
                head.extend(tail);
                *content = normalize(head);
            }
            self.doc.blocks.drain(sb + 1..=eb);
            return;
        }
        let order = self.doc.containers();
        let (Some(si), Some(ei)) = (
            order.iter().position(|id| *id == start.node),
            order.iter().position(|id| *id == end.node),
        ) else {
            return;
        };
        for (index, id) in order.iter().enumerate().take(ei + 1).skip(si) {
            if let Some(content) = self.doc.container_mut(*id) {
                let len = text_len(content);
                let from = if index == si { start.offset } else { 0 };
                let to = if index == ei { end.offset } else { len };
                delete_range(content, from, to);
            }
        }
        if sb + 1 < eb {
            let doomed: Vec<Uuid> = self.doc.blocks[sb + 1..eb]
                .iter()
                .filter(|b| b.inline_groups().is_empty())
                .map(Block::id)
                .collect();
            self.doc.blocks.retain(|b| !doomed.contains(&b.id()));
        }
    }

    /// Inserts at the cursor and collapses the cursor right after the
    /// fragment. Returns the id of an inserted block.
    pub(crate) fn place_fragment(&mut self, fragment: Fragment) -> Option<Uuid> {
        let sel = self.insertion_point();
        self.place_fragment_at(sel, fragment)
    }

    /// `None` appends at the end of the document.
    pub(crate) fn place_fragment_at(&mut self, sel: Option<Selection>, fragment: Fragment) -> Option<Uuid> {
        let Some(sel) = sel else {
            return self.append_fragment(fragment);
        };
        let pos = self.collapse_range(sel);
        if !self.doc.has_container(pos.node) {
            return self.append_fragment(fragment);
        }
        match fragment {
            Fragment::Inlines(inlines) => {
                let len = text_len(&inlines);
                if let Some(content) = self.doc.container_mut(pos.node) {
                    insert_inlines(content, pos.offset, inlines);
                }
                self.selection = Some(Selection::collapsed(Position::new(pos.node, pos.offset + len)));
                None
            }
            Fragment::Block(block) => self.place_block(pos, block),
        }
    }

    pub fn insert_at_cursor(&mut self, fragment: Fragment) -> Option<Uuid> {
        let id = self.place_fragment(fragment);
        self.commit(SyncReason::Command);
        id
    }

    fn place_block(&mut self, pos: Position, block: Block) -> Option<Uuid> {
        let new_id = block.id();
        let Some(index) = self.doc.owner_index(pos.node) else {
            return self.append_fragment(Fragment::Block(block));
        };
        if !self.is_top_level_text(index, pos.node) {
            self.doc.blocks.insert(index + 1, block);
            let next = self.ensure_text_after(index + 1);
            self.selection = Some(Selection::collapsed(Position::new(next, 0)));
            return Some(new_id);
        }
        let mut tail = None;
        if let Block::Text { kind, align, indent, content, dirty, .. } = &mut self.doc.blocks[index] {
            let (left, right) = split_inlines(std::mem::take(content), pos.offset);
            *dirty = true;
            if left.is_empty() {
                *content = right;
            } else {
                *content = left;
                let tail_kind = match *kind {
                    TextKind::Heading(_) if right.is_empty() => TextKind::Paragraph,
                    other => other,
                };
                tail = Some(Block::Text {
                    id: Uuid::new_v4(),
                    kind: tail_kind,
                    align: *align,
                    indent: *indent,
                    content: right,
                    dirty: true,
                });
            }
        }
        match tail {
            None => {
                self.doc.blocks.insert(index, block);
                self.selection = Some(Selection::collapsed(Position::new(pos.node, 0)));
            }
            Some(tail) => {
                let tail_id = tail.id();
                self.doc.blocks.insert(index + 1, block);
                self.doc.blocks.insert(index + 2, tail);
                self.selection = Some(Selection::collapsed(Position::new(tail_id, 0)));
            }
        }
        Some(new_id)
    }

    fn ensure_text_after(&mut self, index: usize) -> Uuid {
        if let Some(Block::Text { id, .. }) = self.doc.blocks.get(index + 1) {
            return *id;
        }
        let paragraph = Block::paragraph(Vec::new());
        let id = paragraph.id();
        self.doc.blocks.insert(index + 1, paragraph);
        id
    }

    fn append_fragment(&mut self, fragment: Fragment) -> Option<Uuid> {
        match fragment {
            Fragment::Inlines(inlines) => {
                let len = text_len(&inlines);
                let target = match self.doc.blocks.last() {
                    Some(Block::Text { id, .. }) => *id,
                    _ => {
                        let paragraph = Block::paragraph(Vec::new());
                        let id = paragraph.id();
                        self.doc.blocks.push(paragraph);
                        id
                    }
                };
                let mut at = 0;
                if let Some(content) = self.doc.container_mut(target) {
                    at = text_len(content);
                    insert_inlines(content, at, inlines);
                }
                self.selection = Some(Selection::collapsed(Position::new(target, at + len)));
                None
            }
            Fragment::Block(block) => {
                let id = block.id();
                self.doc.blocks.push(block);
                let last = self.doc.blocks.len() - 1;
                let next = self.ensure_text_after(last);
                self.selection = Some(Selection::collapsed(Position::new(next, 0)));
                Some(id)
            }
        }
    }

    pub fn selected_text(&self) -> String {
        let Some(sel) = self.live_selection() else {
            return String::new();
        };
        self.slices(sel)
            .into_iter()
            .filter_map(|(id, from, to)| {
                let content = self.doc.container(id)?;
                let (_, rest) = split_inlines(content.clone(), from);
                let (mid, _) = split_inlines(rest, to - from);
                Some(crate::plain_text(&mid))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Per-container (id, start, end) pieces of a selection in document order.
    pub(crate) fn slices(&self, sel: Selection) -> Vec<(Uuid, usize, usize)> {
        let (start, end) = sel.ordered(&self.doc);
        let order = self.doc.containers();
        let (Some(si), Some(ei)) = (
            order.iter().position(|id| *id == start.node),
            order.iter().position(|id| *id == end.node),
        ) else {
            return Vec::new();
        };
        if si > ei {
            return Vec::new();
        }
        order[si..=ei]
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                let len = text_len(self.doc.container(*id)?);
                let from = if i == 0 { start.offset.min(len) } else { 0 };
                let to = if si + i == ei { end.offset.min(len) } else { len };
                Some((*id, from, to.max(from)))
            })
            .collect()
    }

    // ---- native text edits ----------------------------------------------

    pub(crate) fn typing_style(&self, pos: Position) -> Style {
        if let Some(style) = &self.pending_style {
            return style.clone();
        }
        self.doc.container(pos.node).map(|c| style_at(c, pos.offset)).unwrap_or_default()
    }

    pub fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let Some(sel) = self.live_selection() else {
            return;
        };
        let style = self.typing_style(sel.ordered(&self.doc).0);
        let pos = self.collapse_range(sel);
        if let Some(content) = self.doc.container_mut(pos.node) {
            crate::insert_text(content, pos.offset, text, style);
        }
        self.pending_style = None;
        self.selection = Some(Selection::collapsed(Position::new(pos.node, pos.offset + text.chars().count())));
        self.commit(SyncReason::Input);
    }

    pub fn paste_text(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        if normalized.is_empty() {
            return;
        }
        let Some(sel) = self.live_selection() else {
            return;
        };
        let style = self.typing_style(sel.ordered(&self.doc).0);
        let mut inlines = Vec::new();
        for (i, line) in normalized.split('\n').enumerate() {
            if i > 0 {
                inlines.push(Inline::LineBreak);
            }
            if !line.is_empty() {
                inlines.push(Inline::styled(line, style.clone()));
            }
        }
        let pos = self.collapse_range(sel);
        let len = text_len(&inlines);
        if let Some(content) = self.doc.container_mut(pos.node) {
            insert_inlines(content, pos.offset, inlines);
        }
        self.selection = Some(Selection::collapsed(Position::new(pos.node, pos.offset + len)));
        self.commit(SyncReason::Paste);
    }

    pub fn line_break(&mut self) {
        let Some(sel) = self.live_selection() else {
            return;
        };
        let pos = self.collapse_range(sel);
        if let Some(content) = self.doc.container_mut(pos.node) {
            insert_inlines(content, pos.offset, vec![Inline::LineBreak]);
        }
        self.selection = Some(Selection::collapsed(Position::new(pos.node, pos.offset + 1)));
        self.commit(SyncReason::Input);
    }

    pub fn delete_backward(&mut self) {
        let Some(sel) = self.live_selection() else {
            return;
        };
        if !sel.is_collapsed() {
            self.collapse_range(sel);
            self.commit(SyncReason::Input);
            return;
        }
        let pos = sel.focus;
        if pos.offset > 0 {
            if let Some(content) = self.doc.container_mut(pos.node) {
                delete_range(content, pos.offset - 1, pos.offset);
            }
            self.selection = Some(Selection::collapsed(Position::new(pos.node, pos.offset - 1)));
        } else if !self.merge_backward(pos.node) {
            return;
        }
        self.commit(SyncReason::Input);
    }

    pub fn delete_forward(&mut self) {
        let Some(sel) = self.live_selection() else {
            return;
        };
        if !sel.is_collapsed() {
            self.collapse_range(sel);
            self.commit(SyncReason::Input);
            return;
        }
        let pos = sel.focus;
        let len = self.doc.container(pos.node).map(|c| text_len(c)).unwrap_or(0);
        if pos.offset < len {
            if let Some(content) = self.doc.container_mut(pos.node) {
                delete_range(content, pos.offset, pos.offset + 1);
            }
        } else if !self.merge_forward(pos.node) {
            return;
        }
        self.commit(SyncReason::Input);
    }

    fn is_top_level_text(&self, index: usize, node: Uuid) -> bool {
        matches!(self.doc.blocks.get(index), Some(Block::Text { id, .. }) if *id == node)
    }

    /// Appends `content` to a container and puts the cursor at the seam.
    fn join_into(&mut self, target: Uuid, content: Vec<Inline>) {
        let mut at = 0;
        if let Some(existing) = self.doc.container_mut(target) {
            at = text_len(existing);
            let mut merged = std::mem::take(existing);
            merged.extend(content);
            *existing = normalize(merged);
        }
        self.selection = Some(Selection::collapsed(Position::new(target, at)));
    }

    fn merge_backward(&mut self, node: Uuid) -> bool {
        let Some(index) = self.doc.owner_index(node) else {
            return false;
        };
        if !self.is_top_level_text(index, node) {
            let in_list = matches!(self.doc.blocks[index], Block::List { .. });
            return in_list && self.lift_list_item(node);
        }
        if index == 0 {
            return false;
        }
        let previous = match &self.doc.blocks[index - 1] {
            Block::Text { id, .. } => Some(*id),
            Block::List { items, .. } => items.last().map(|i| i.id),
            Block::Table { .. } => return false,
            Block::Rule { .. } | Block::Image { .. } | Block::Video { .. } => None,
        };
        match previous {
            Some(target) => {
                if let Block::Text { content, .. } = self.doc.blocks.remove(index) {
                    self.join_into(target, content);
                }
            }
            None => {
                self.doc.blocks.remove(index - 1);
            }
        }
        true
    }

    fn merge_forward(&mut self, node: Uuid) -> bool {
        let Some(index) = self.doc.owner_index(node) else {
            return false;
        };
        if !self.is_top_level_text(index, node) {
            return false;
        }
        match self.doc.blocks.get(index + 1) {
            Some(Block::Text { .. }) => {
                let offset = self.doc.container(node).map(|c| text_len(c)).unwrap_or(0);
                if let Block::Text { content, .. } = self.doc.blocks.remove(index + 1) {
                    self.join_into(node, content);
                }
                self.selection = Some(Selection::collapsed(Position::new(node, offset)));
                true
            }
            Some(Block::Rule { .. }) | Some(Block::Image { .. }) | Some(Block::Video { .. }) => {
                self.doc.blocks.remove(index + 1);
                true
            }
            _ => false,
        }
    }

    /// Outdents a nested item, or turns a top-level item into a paragraph,
    /// splitting the list around it.
    pub(crate) fn lift_list_item(&mut self, node: Uuid) -> bool {
        let Some(index) = self.doc.owner_index(node) else {
            return false;
        };
        let Block::List { id, ordered, items, dirty } = &mut self.doc.blocks[index] else {
            return false;
        };
        let Some(at) = items.iter().position(|i| i.id == node) else {
            return false;
        };
        if items[at].indent > 0 {
            items[at].indent -= 1;
            *dirty = true;
            return true;
        }
        let ordered = *ordered;
        let list_id = *id;
        let after: Vec<ListItem> = items.split_off(at + 1);
        let Some(item) = items.pop() else {
            return false;
        };
        let before = std::mem::take(items);
        let mut replacement = Vec::new();
        if !before.is_empty() {
            replacement.push(Block::List { id: list_id, ordered, items: before, dirty: true });
        }
        replacement.push(Block::Text {
            id: item.id,
            kind: TextKind::Paragraph,
            align: TextAlign::Left,
            indent: 0,
            content: item.content,
            dirty: true,
        });
        if !after.is_empty() {
            replacement.push(Block::List { id: Uuid::new_v4(), ordered, items: after, dirty: true });
        }
        self.doc.blocks.splice(index..=index, replacement);
        true
    }

    /// Enter.
    pub fn split_block(&mut self) {
        let Some(sel) = self.live_selection() else {
            return;
        };
        let pos = self.collapse_range(sel);
        let Some(index) = self.doc.owner_index(pos.node) else {
            return;
        };
        enum Split {
            Break,
            LiftItem,
            Item,
            Text,
        }
        let plan = match &self.doc.blocks[index] {
            Block::Text { kind: TextKind::Preformatted, .. } | Block::Table { .. } => Split::Break,
            Block::List { items, .. } if items.iter().any(|i| i.id == pos.node && i.content.is_empty()) => {
                Split::LiftItem
            }
            Block::List { .. } => Split::Item,
            _ => Split::Text,
        };
        let next = match plan {
            Split::Break => {
                self.line_break();
                return;
            }
            Split::LiftItem => self.lift_list_item(pos.node).then_some(pos.node),
            Split::Item => self.split_list_item(index, pos),
            Split::Text => self.split_text_block(index, pos),
        };
        let Some(next) = next else {
            return;
        };
        self.selection = Some(Selection::collapsed(Position::new(next, 0)));
        self.commit(SyncReason::Input);
    }

    fn split_text_block(&mut self, index: usize, pos: Position) -> Option<Uuid> {
        let Block::Text { kind, align, indent, content, dirty, .. } = &mut self.doc.blocks[index] else {
            return None;
        };
        let (left, right) = split_inlines(std::mem::take(content), pos.offset);
        *content = left;
        *dirty = true;
        let next_kind = match *kind {
            TextKind::Heading(_) if right.is_empty() => TextKind::Paragraph,
            other => other,
        };
        let block = Block::Text { id: Uuid::new_v4(), kind: next_kind, align: *align, indent: *indent, content: right, dirty: true };
        let next = block.id();
        self.doc.blocks.insert(index + 1, block);
        Some(next)
    }

    fn split_list_item(&mut self, index: usize, pos: Position) -> Option<Uuid> {
        let Block::List { items, dirty, .. } = &mut self.doc.blocks[index] else {
            return None;
        };
        let at = items.iter().position(|i| i.id == pos.node)?;
        let (left, right) = split_inlines(std::mem::take(&mut items[at].content), pos.offset);
        items[at].content = left;
        let item = ListItem { id: Uuid::new_v4(), indent: items[at].indent, content: right };
        let next = item.id;
        items.insert(at + 1, item);
        *dirty = true;
        Some(next)
    }

    pub fn insert_quote(&mut self) -> Option<Uuid> {
        let selected = self.selected_text();
        let text = if selected.trim().is_empty() { "Your quote here...".to_string() } else { selected };
        let block = Block::text(TextKind::Quote, vec![Inline::plain(&text)]);
        let id = self.place_fragment(Fragment::Block(block));
        self.commit(SyncReason::Command);
        id
    }

    /// Marks a selection as inline code, or inserts a code block.
    pub fn insert_code(&mut self) -> Option<Uuid> {
        let has_range = self.live_selection().map_or(false, |s| !s.is_collapsed());
        if has_range && !self.selected_text().is_empty() {
            let code = Style { code: true, ..Style::default() };
            let text = self.selected_text();
            self.place_fragment(Fragment::Inlines(vec![Inline::styled(&text, code)]));
            self.commit(SyncReason::Command);
            return None;
        }
        let block = Block::text(TextKind::Preformatted, vec![Inline::plain("Your code here...")]);
        let id = self.place_fragment(Fragment::Block(block));
        self.commit(SyncReason::Command);
        id
    }

    fn edit_table_at_cursor(&mut self, f: impl FnOnce(&mut Block, usize, usize) -> bool) {
        let Some(sel) = self.live_selection() else {
            return;
        };
        let node = sel.focus.node;
        let Some(index) = self.doc.owner_index(node) else {
            return;
        };
        let block = &mut self.doc.blocks[index];
        let coords = match block {
            Block::Table { rows, .. } => rows.iter().enumerate().find_map(|(r, row)| {
                row.iter().position(|c| c.id == node).map(|c| (r, c))
            }),
            _ => None,
        };
        let Some((row, col)) = coords else {
            return;
        };
        if f(block, row, col) {
            self.commit(SyncReason::Command);
        }
    }
}
