use crate::html::unsafe_css;
use crate::{
    map_styles, range_state, unlink_at, unlink_range, Block, Editor, FormatCommand, Fragment, ListItem,
    Mark, Selection, SharedStr, Style, SyncReason, TextAlign, TextKind, MAX_INDENT,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Trimmed CSS value, or `None` for empty and unsafe input.
fn css_value(raw: &str) -> Option<SharedStr> {
    let value = raw.trim();
    if value.is_empty() || unsafe_css(value) || value.contains(['"', ';', '<', '>', '{', '}']) {
        return None;
    }
    Some(Arc::from(value))
}

impl Editor {
    /// Runs one native formatting command. The hidden field is synced and a
    /// history entry recorded; an unchanged document does not grow history.
    pub fn exec(&mut self, command: FormatCommand) -> bool {
        debug!(?command, "exec");
        let changed = match command {
            FormatCommand::ToggleMark(mark) => self.toggle_mark(mark),
            FormatCommand::Justify(align) => self.justify(align),
            FormatCommand::InsertList { ordered } => self.toggle_list(ordered),
            FormatCommand::Indent => self.shift_indent(true),
            FormatCommand::Outdent => self.shift_indent(false),
            FormatCommand::HorizontalRule => {
                let rule = Block::Rule { id: Uuid::new_v4(), dirty: true };
                self.place_fragment(Fragment::Block(rule)).is_some()
            }
            FormatCommand::FontName(font) => {
                let font = css_value(&font);
                self.apply_style(move |s| s.font = font.clone())
            }
            FormatCommand::ForeColor(color) => {
                let color = css_value(&color);
                self.apply_style(move |s| s.color = color.clone())
            }
            FormatCommand::BackColor(color) => {
                let color = css_value(&color);
                self.apply_style(move |s| s.background = color.clone())
            }
            FormatCommand::FormatBlock(kind) => self.format_block(kind),
            FormatCommand::Unlink => self.unlink(),
            FormatCommand::RemoveFormat => self.apply_style(|s| *s = Style::default()),
        };
        self.commit(SyncReason::Command);
        changed
    }

    fn toggle_mark(&mut self, mark: Mark) -> bool {
        let Some(sel) = self.live_selection() else {
            return false;
        };
        if sel.is_collapsed() {
            let mut style = self.typing_style(sel.focus);
            let on = !style.has(mark);
            style.set(mark, on);
            self.pending_style = Some(style);
            return false;
        }
        let on = !self.range_active(sel, |s| s.has(mark));
        self.restyle_selection(sel, |s| s.set(mark, on))
    }

    /// A collapsed cursor only changes the style the next typed text gets.
    fn apply_style(&mut self, f: impl Fn(&mut Style)) -> bool {
        let Some(sel) = self.live_selection() else {
            return false;
        };
        if sel.is_collapsed() {
            let mut style = self.typing_style(sel.focus);
            f(&mut style);
            self.pending_style = Some(style);
            return false;
        }
        self.restyle_selection(sel, f)
    }

    fn restyle_selection(&mut self, sel: Selection, f: impl Fn(&mut Style)) -> bool {
        let mut changed = false;
        for (id, from, to) in self.slices(sel) {
            if to <= from {
                continue;
            }
            if let Some(content) = self.doc.container_mut(id) {
                let before = content.clone();
                map_styles(content, from, to, &f);
                changed |= *content != before;
            }
        }
        changed
    }

    /// True when every selected text character satisfies `pred`.
    fn range_active(&self, sel: Selection, pred: impl Fn(&Style) -> bool) -> bool {
        let mut seen = false;
        for (id, from, to) in self.slices(sel) {
            let Some(content) = self.doc.container(id) else {
                continue;
            };
            match range_state(content, from, to, &pred) {
                Some(false) => return false,
                Some(true) => seen = true,
                None => {}
            }
        }
        seen
    }

    /// First and last top-level block indexes touched by the selection.
    fn block_range(&self, sel: Selection) -> Option<(usize, usize)> {
        let (start, end) = sel.ordered(&self.doc);
        let first = self.doc.owner_index(start.node)?;
        let last = self.doc.owner_index(end.node)?;
        Some((first.min(last), first.max(last)))
    }

    fn justify(&mut self, target: TextAlign) -> bool {
        let Some((first, last)) = self.live_selection().and_then(|s| self.block_range(s)) else {
            return false;
        };
        let mut changed = false;
        for block in &mut self.doc.blocks[first..=last] {
            if let Block::Text { align, dirty, .. } = block {
                if *align != target {
                    *align = target;
                    *dirty = true;
                    changed = true;
                }
            }
        }
        changed
    }

    fn format_block(&mut self, target: TextKind) -> bool {
        let Some((first, last)) = self.live_selection().and_then(|s| self.block_range(s)) else {
            return false;
        };
        let mut changed = false;
        for block in &mut self.doc.blocks[first..=last] {
            if let Block::Text { kind, dirty, .. } = block {
                if *kind != target {
                    *kind = target;
                    *dirty = true;
                    changed = true;
                }
            }
        }
        changed
    }

    fn toggle_list(&mut self, ordered: bool) -> bool {
        let Some(sel) = self.live_selection() else {
            return false;
        };
        let Some((first, last)) = self.block_range(sel) else {
            return false;
        };
        let lists: Vec<Option<bool>> = self.doc.blocks[first..=last]
            .iter()
            .map(|b| match b {
                Block::List { ordered, .. } => Some(*ordered),
                _ => None,
            })
            .collect();
        if lists.iter().all(|l| *l == Some(ordered)) {
            return self.unlist(sel);
        }
        if lists.iter().all(Option::is_some) {
            for block in &mut self.doc.blocks[first..=last] {
                if let Block::List { ordered: o, dirty, .. } = block {
                    *o = ordered;
                    *dirty = true;
                }
            }
            return true;
        }
        self.listify(first, last, ordered)
    }

    /// Turns every selected list item into a paragraph with the item's id.
    fn unlist(&mut self, sel: Selection) -> bool {
        let ids: Vec<Uuid> = self.slices(sel).into_iter().map(|(id, _, _)| id).collect();
        let mut changed = false;
        for id in ids {
            let Some(index) = self.doc.owner_index(id) else {
                continue;
            };
            if let Block::List { items, .. } = &mut self.doc.blocks[index] {
                if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                    item.indent = 0;
                }
            }
            changed |= self.lift_list_item(id);
        }
        changed
    }

    /// Folds text blocks and lists in `first..=last` into one list per run;
    /// other blocks break the run.
    fn listify(&mut self, first: usize, last: usize, ordered: bool) -> bool {
        let taken: Vec<Block> = self.doc.blocks.drain(first..=last).collect();
        let mut out = Vec::with_capacity(taken.len());
        let mut run: Vec<ListItem> = Vec::new();
        let mut run_id = None;
        let flush = |out: &mut Vec<Block>, run: &mut Vec<ListItem>, run_id: &mut Option<Uuid>| {
            if !run.is_empty() {
                out.push(Block::List {
                    id: run_id.take().unwrap_or_else(Uuid::new_v4),
                    ordered,
                    items: std::mem::take(run),
                    dirty: true,
                });
            }
        };
        for block in taken {
            match block {
                Block::Text { id, content, .. } => run.push(ListItem { id, indent: 0, content }),
                Block::List { id, items, .. } => {
                    run_id.get_or_insert(id);
                    run.extend(items);
                }
                other => {
                    flush(&mut out, &mut run, &mut run_id);
                    out.push(other);
                }
            }
        }
        flush(&mut out, &mut run, &mut run_id);
        self.doc.blocks.splice(first..first, out);
        true
    }

    fn shift_indent(&mut self, increase: bool) -> bool {
        let Some(sel) = self.live_selection() else {
            return false;
        };
        let ids: Vec<Uuid> = self.slices(sel).into_iter().map(|(id, _, _)| id).collect();
        let mut changed = false;
        for id in ids {
            let Some(index) = self.doc.owner_index(id) else {
                continue;
            };
            let mut lift = false;
            match &mut self.doc.blocks[index] {
                Block::Text { indent, dirty, .. } => {
                    let next = if increase { (*indent + 1).min(MAX_INDENT) } else { indent.saturating_sub(1) };
                    if next != *indent {
                        *indent = next;
                        *dirty = true;
                        changed = true;
                    }
                }
                Block::List { items, dirty, .. } => {
                    let Some(item) = items.iter_mut().find(|i| i.id == id) else {
                        continue;
                    };
                    if increase && item.indent < MAX_INDENT {
                        item.indent += 1;
                        *dirty = true;
                        changed = true;
                    } else if !increase {
                        lift = true;
                    }
                }
                _ => {}
            }
            if lift {
                changed |= self.lift_list_item(id);
            }
        }
        changed
    }

    fn unlink(&mut self) -> bool {
        let Some(sel) = self.live_selection() else {
            return false;
        };
        if sel.is_collapsed() {
            return match self.doc.container_mut(sel.focus.node) {
                Some(content) => unlink_at(content, sel.focus.offset),
                None => false,
            };
        }
        let mut changed = false;
        for (id, from, to) in self.slices(sel) {
            if let Some(content) = self.doc.container_mut(id) {
                let before = content.clone();
                unlink_range(content, from, to);
                changed |= *content != before;
            }
        }
        changed
    }

    pub fn mark_active(&self, mark: Mark) -> bool {
        let Some(sel) = self.live_selection() else {
            return false;
        };
        if sel.is_collapsed() {
            return self.typing_style(sel.focus).has(mark);
        }
        self.range_active(sel, |s| s.has(mark))
    }

    /// Alignment of the block holding the focus; lists and tables read as
    /// left aligned.
    pub fn alignment(&self) -> Option<TextAlign> {
        let sel = self.live_selection()?;
        match self.doc.blocks.get(self.doc.owner_index(sel.focus.node)?)? {
            Block::Text { align, .. } => Some(*align),
            _ => Some(TextAlign::Left),
        }
    }

    /// `Some(ordered)` when the focus is inside a list.
    pub fn list_state(&self) -> Option<bool> {
        let sel = self.live_selection()?;
        match self.doc.blocks.get(self.doc.owner_index(sel.focus.node)?)? {
            Block::List { ordered, .. } => Some(*ordered),
            _ => None,
        }
    }

    /// Url and target of the link under the focus, for prefilling the link
    /// dialog.
    pub fn link_at_cursor(&self) -> Option<(String, bool)> {
        let sel = self.live_selection()?;
        let content = self.doc.container(sel.focus.node)?;
        crate::link_at(content, sel.focus.offset).map(|(url, new_tab)| (url.to_string(), new_tab))
    }

    pub fn link_text_at_cursor(&self) -> Option<String> {
        let sel = self.live_selection()?;
        crate::link_text_at(self.doc.container(sel.focus.node)?, sel.focus.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EditorConfig, Position};

    fn editor_with(markup: &str) -> Editor {
        Editor::with_content(EditorConfig::default(), markup)
    }

    fn first_container(editor: &Editor) -> Uuid {
        editor.document().containers()[0]
    }

    #[test]
    fn css_values_are_filtered() {
        assert_eq!(css_value(" red ").as_deref(), Some("red"));
        assert_eq!(css_value(""), None);
        assert_eq!(css_value("url(x)"), None);
        assert_eq!(css_value("red;position:fixed"), None);
    }

    #[test]
    fn range_bold_toggles_on_then_off() {
        let mut editor = editor_with("<p>Hello world</p>");
        let node = first_container(&editor);
        editor.set_selection(Some(Selection::new(Position::new(node, 0), Position::new(node, 5))));
        assert!(editor.exec(FormatCommand::ToggleMark(Mark::Bold)));
        assert_eq!(editor.content(), "<p><b>Hello</b> world</p>");
        assert!(editor.mark_active(Mark::Bold));
        assert!(editor.exec(FormatCommand::ToggleMark(Mark::Bold)));
        assert_eq!(editor.content(), "<p>Hello world</p>");
    }

    #[test]
    fn outdent_at_top_level_leaves_the_list() {
        let mut editor = editor_with("<ul><li>one</li><li>two</li></ul>");
        let second = editor.document().containers()[1];
        editor.set_selection(Some(Selection::collapsed(Position::new(second, 0))));
        assert_eq!(editor.list_state(), Some(false));
        assert!(editor.exec(FormatCommand::Outdent));
        assert_eq!(editor.content(), "<ul><li>one</li></ul><p>two</p>");
        assert_eq!(editor.list_state(), None);
    }

    #[test]
    fn unsafe_color_clears_instead_of_applying() {
        let mut editor = editor_with("<p>abc</p>");
        let node = first_container(&editor);
        editor.set_selection(Some(Selection::new(Position::new(node, 0), Position::new(node, 3))));
        assert!(!editor.exec(FormatCommand::ForeColor("expression(alert(1))".into())));
        assert_eq!(editor.content(), "<p>abc</p>");
        assert!(editor.exec(FormatCommand::ForeColor("#ff0000".into())));
        assert_eq!(editor.content(), "<p><span style=\"color:#ff0000;\">abc</span></p>");
    }

    #[test]
    fn list_items_reuse_paragraph_ids() {
        let mut editor = editor_with("<p>a</p><p>b</p>");
        let ids = editor.document().containers();
        editor.set_selection(Some(Selection::new(Position::new(ids[0], 0), Position::new(ids[1], 1))));
        assert!(editor.exec(FormatCommand::InsertList { ordered: true }));
        assert_eq!(editor.content(), "<ol><li>a</li><li>b</li></ol>");
        assert_eq!(editor.document().containers(), ids);
        assert!(editor.exec(FormatCommand::InsertList { ordered: true }));
        assert_eq!(editor.content(), "<p>a</p><p>b</p>");
    }
}
