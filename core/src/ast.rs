use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub type SharedStr = Arc<str>;

pub const MAX_INDENT: u8 = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub version: u64,
    pub blocks: Vec<Block>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Paragraph,
    Heading(u8),
    Quote,
    Preformatted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl MediaAlign {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(MediaAlign::Left),
            "center" => Some(MediaAlign::Center),
            "right" => Some(MediaAlign::Right),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaAlign::Left => "left",
            MediaAlign::Center => "center",
            MediaAlign::Right => "right",
        }
    }
}

/// Wrapper metadata shared by image and video elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MediaLayout {
    pub align: MediaAlign,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default)]
    pub responsive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStyle {
    #[default]
    Default,
    Striped,
    Bordered,
    Hover,
}

impl TableStyle {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "striped" => TableStyle::Striped,
            "bordered" => TableStyle::Bordered,
            "hover" => TableStyle::Hover,
            _ => TableStyle::Default,
        }
    }

    pub fn class_name(self) -> Option<&'static str> {
        match self {
            TableStyle::Default => None,
            TableStyle::Striped => Some("table-striped"),
            TableStyle::Bordered => Some("table-bordered"),
            TableStyle::Hover => Some("table-hover"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Table,
    Video,
    Link,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [MediaKind::Link, MediaKind::Image, MediaKind::Table, MediaKind::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Table => "table",
            MediaKind::Video => "video",
            MediaKind::Link => "link",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" => Some(MediaKind::Image),
            "table" => Some(MediaKind::Table),
            "video" => Some(MediaKind::Video),
            "link" => Some(MediaKind::Link),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        id: Uuid,
        kind: TextKind,
        align: TextAlign,
        indent: u8,
        content: Vec<Inline>,
        dirty: bool,
    },
    List {
        id: Uuid,
        ordered: bool,
        items: Vec<ListItem>,
        dirty: bool,
    },
    Rule {
        id: Uuid,
        dirty: bool,
    },
    Table {
        id: Uuid,
        rows: Vec<Vec<Cell>>,
        header: bool,
        style: TableStyle,
        responsive: bool,
        dirty: bool,
    },
    Image {
        id: Uuid,
        src: SharedStr,
        alt: SharedStr,
        caption: Option<SharedStr>,
        layout: MediaLayout,
        dirty: bool,
    },
    Video {
        id: Uuid,
        video_id: SharedStr,
        layout: MediaLayout,
        dirty: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    pub id: Uuid,
    #[serde(default)]
    pub indent: u8,
    pub content: Vec<Inline>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: Uuid,
    pub content: Vec<Inline>,
}

impl Cell {
    pub fn with_text(text: &str) -> Self {
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![Inline::plain(text)]
        };
        Self { id: Uuid::new_v4(), content }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text {
        value: SharedStr,
        #[serde(default)]
        style: Style,
    },
    Link {
        url: SharedStr,
        #[serde(default)]
        new_tab: bool,
        text: Vec<Inline>,
    },
    LineBreak,
}

impl Inline {
    pub fn plain(value: &str) -> Self {
        Inline::Text { value: Arc::from(value), style: Style::default() }
    }

    pub fn styled(value: &str, style: Style) -> Self {
        Inline::Text { value: Arc::from(value), style }
    }

    pub fn char_len(&self) -> usize {
        match self {
            Inline::Text { value, .. } => value.chars().count(),
            Inline::Link { text, .. } => text.iter().map(Inline::char_len).sum(),
            Inline::LineBreak => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Subscript,
    Superscript,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub subscript: bool,
    pub superscript: bool,
    pub code: bool,
    pub color: Option<SharedStr>,
    pub background: Option<SharedStr>,
    pub font: Option<SharedStr>,
}

impl Style {
    pub fn has(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Underline => self.underline,
            Mark::Strikethrough => self.strikethrough,
            Mark::Subscript => self.subscript,
            Mark::Superscript => self.superscript,
            Mark::Code => self.code,
        }
    }

    pub fn set(&mut self, mark: Mark, value: bool) {
        match mark {
            Mark::Bold => self.bold = value,
            Mark::Italic => self.italic = value,
            Mark::Underline => self.underline = value,
            Mark::Strikethrough => self.strikethrough = value,
            Mark::Subscript => {
                self.subscript = value;
                if value {
                    self.superscript = false;
                }
            }
            Mark::Superscript => {
                self.superscript = value;
                if value {
                    self.subscript = false;
                }
            }
            Mark::Code => self.code = value,
        }
    }

    pub fn is_plain(&self) -> bool {
        *self == Style::default()
    }

    pub fn has_span_props(&self) -> bool {
        self.color.is_some() || self.background.is_some() || self.font.is_some()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 1,
            blocks: vec![Block::paragraph(Vec::new())],
            metadata: Metadata::default(),
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut doc = Self { blocks, ..Self::new() };
        doc.ensure_block();
        doc
    }

    pub fn touch(&mut self) {
        self.version = self.version.saturating_add(1);
        self.metadata.updated_at = chrono::Utc::now().timestamp();
    }

    pub fn clear_dirty(&mut self) {
        for block in &mut self.blocks {
            block.set_dirty(false);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for block in &mut self.blocks {
            block.set_dirty(true);
        }
    }

    /// Keeps a text container reachable after the last block so the cursor
    /// always has an insertion point, even in a media-only document.
    pub fn ensure_block(&mut self) {
        let caret_after_last = match self.blocks.last() {
            None | Some(Block::Image { .. } | Block::Video { .. }) => false,
            Some(_) => !self.containers().is_empty(),
        };
        if !caret_after_last {
            self.blocks.push(Block::paragraph(Vec::new()));
        }
    }

    pub fn block(&self, id: Uuid) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id() == id)
    }

    pub fn block_mut(&mut self, id: Uuid) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id() == id)
    }

    pub fn block_index(&self, id: Uuid) -> Option<usize> {
        self.blocks.iter().position(|b| b.id() == id)
    }

    /// Ids of every cursor-holding node, in document order.
    pub fn containers(&self) -> Vec<Uuid> {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Text { id, .. } => out.push(*id),
                Block::List { items, .. } => out.extend(items.iter().map(|i| i.id)),
                Block::Table { rows, .. } => {
                    for row in rows {
                        out.extend(row.iter().map(|c| c.id));
                    }
                }
                Block::Rule { .. } | Block::Image { .. } | Block::Video { .. } => {}
            }
        }
        out
    }

    pub fn has_container(&self, id: Uuid) -> bool {
        self.container(id).is_some()
    }

    pub fn container(&self, id: Uuid) -> Option<&Vec<Inline>> {
        for block in &self.blocks {
            match block {
                Block::Text { id: bid, content, .. } if *bid == id => return Some(content),
                Block::List { items, .. } => {
                    if let Some(item) = items.iter().find(|i| i.id == id) {
                        return Some(&item.content);
                    }
                }
                Block::Table { rows, .. } => {
                    for row in rows {
                        if let Some(cell) = row.iter().find(|c| c.id == id) {
                            return Some(&cell.content);
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Mutable access to a container; the owning block is marked dirty.
    pub fn container_mut(&mut self, id: Uuid) -> Option<&mut Vec<Inline>> {
        for block in &mut self.blocks {
            match block {
                Block::Text { id: bid, content, dirty, .. } if *bid == id => {
                    *dirty = true;
                    return Some(content);
                }
                Block::List { items, dirty, .. } => {
                    if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                        *dirty = true;
                        return Some(&mut item.content);
                    }
                }
                Block::Table { rows, dirty, .. } => {
                    for row in rows.iter_mut() {
                        if let Some(cell) = row.iter_mut().find(|c| c.id == id) {
                            *dirty = true;
                            return Some(&mut cell.content);
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Index of the top-level block that owns a container.
    pub fn owner_index(&self, container: Uuid) -> Option<usize> {
        self.blocks.iter().position(|block| match block {
            Block::Text { id, .. } => *id == container,
            Block::List { items, .. } => items.iter().any(|i| i.id == container),
            Block::Table { rows, .. } => rows.iter().flatten().any(|c| c.id == container),
            _ => false,
        })
    }

    pub fn count_media(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Link => self
                .blocks
                .iter()
                .map(|b| b.inline_groups().iter().map(|g| count_links(g)).sum::<usize>())
                .sum(),
            _ => self.blocks.iter().filter(|b| b.media_kind() == Some(kind)).count(),
        }
    }

    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.blocks {
            for group in block.inline_groups() {
                lines.push(crate::plain_text(group));
            }
        }
        lines.join("\n")
    }
}

fn count_links(content: &[Inline]) -> usize {
    content.iter().filter(|i| matches!(i, Inline::Link { .. })).count()
}

impl Block {
    pub fn paragraph(content: Vec<Inline>) -> Self {
        Block::text(TextKind::Paragraph, content)
    }

    pub fn text(kind: TextKind, content: Vec<Inline>) -> Self {
        Block::Text {
            id: Uuid::new_v4(),
            kind,
            align: TextAlign::Left,
            indent: 0,
            content,
            dirty: true,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Block::Text { id, .. }
            | Block::List { id, .. }
            | Block::Rule { id, .. }
            | Block::Table { id, .. }
            | Block::Image { id, .. }
            | Block::Video { id, .. } => *id,
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            Block::Text { dirty, .. }
            | Block::List { dirty, .. }
            | Block::Rule { dirty, .. }
            | Block::Table { dirty, .. }
            | Block::Image { dirty, .. }
            | Block::Video { dirty, .. } => *dirty,
        }
    }

    pub fn set_dirty(&mut self, value: bool) {
        match self {
            Block::Text { dirty, .. }
            | Block::List { dirty, .. }
            | Block::Rule { dirty, .. }
            | Block::Table { dirty, .. }
            | Block::Image { dirty, .. }
            | Block::Video { dirty, .. } => *dirty = value,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Block::Text { .. })
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            Block::Image { .. } => Some(MediaKind::Image),
            Block::Table { .. } => Some(MediaKind::Table),
            Block::Video { .. } => Some(MediaKind::Video),
            _ => None,
        }
    }

    pub fn inline_groups(&self) -> Vec<&Vec<Inline>> {
        match self {
            Block::Text { content, .. } => vec![content],
            Block::List { items, .. } => items.iter().map(|i| &i.content).collect(),
            Block::Table { rows, .. } => rows.iter().flatten().map(|c| &c.content).collect(),
            Block::Rule { .. } | Block::Image { .. } | Block::Video { .. } => Vec::new(),
        }
    }
}
