use crate::{is_text_kind_tag, Editor, Mark, MediaKind, TextAlign, TextKind};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The native formatting command set exposed on the toolbar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCommand {
    ToggleMark(Mark),
    Justify(TextAlign),
    InsertList { ordered: bool },
    Indent,
    Outdent,
    HorizontalRule,
    FontName(String),
    FormatBlock(TextKind),
    ForeColor(String),
    BackColor(String),
    Unlink,
    RemoveFormat,
}

impl FormatCommand {
    pub fn parse(name: &str, value: Option<&str>) -> Option<Self> {
        let command = match name {
            "bold" => FormatCommand::ToggleMark(Mark::Bold),
            "italic" => FormatCommand::ToggleMark(Mark::Italic),
            "underline" => FormatCommand::ToggleMark(Mark::Underline),
            "strikeThrough" | "strikethrough" => FormatCommand::ToggleMark(Mark::Strikethrough),
            "subscript" => FormatCommand::ToggleMark(Mark::Subscript),
            "superscript" => FormatCommand::ToggleMark(Mark::Superscript),
            "justifyLeft" => FormatCommand::Justify(TextAlign::Left),
            "justifyCenter" => FormatCommand::Justify(TextAlign::Center),
            "justifyRight" => FormatCommand::Justify(TextAlign::Right),
            "justifyFull" => FormatCommand::Justify(TextAlign::Justify),
            "insertOrderedList" => FormatCommand::InsertList { ordered: true },
            "insertUnorderedList" => FormatCommand::InsertList { ordered: false },
            "indent" => FormatCommand::Indent,
            "outdent" => FormatCommand::Outdent,
            "insertHorizontalRule" => FormatCommand::HorizontalRule,
            "fontName" => FormatCommand::FontName(value?.to_string()),
            "formatBlock" => FormatCommand::FormatBlock(is_text_kind_tag(value?)?),
            "foreColor" => FormatCommand::ForeColor(value?.to_string()),
            "backColor" | "hiliteColor" => FormatCommand::BackColor(value?.to_string()),
            "unlink" => FormatCommand::Unlink,
            "removeFormat" => FormatCommand::RemoveFormat,
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    InsertText(String),
    DeleteBackward,
    DeleteForward,
    SplitBlock,
    LineBreak,
    PasteText(String),
    Format(FormatCommand),
    InsertQuote,
    InsertCode,
    TableInsertRow,
    TableInsertColumn,
    TableDeleteRow,
    TableDeleteColumn,
    Undo,
    Redo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarAction {
    Command(EditorCommand),
    OpenDialog(MediaKind),
    ToggleFullscreen,
}

impl ToolbarAction {
    /// Resolves a toolbar button's `data-command` name and optional value.
    pub fn parse(name: &str, value: Option<&str>) -> Option<Self> {
        let action = match name {
            "undo" => ToolbarAction::Command(EditorCommand::Undo),
            "redo" => ToolbarAction::Command(EditorCommand::Redo),
            "createLink" | "insertLink" => ToolbarAction::OpenDialog(MediaKind::Link),
            "insertImage" => ToolbarAction::OpenDialog(MediaKind::Image),
            "insertTable" => ToolbarAction::OpenDialog(MediaKind::Table),
            "insertVideo" => ToolbarAction::OpenDialog(MediaKind::Video),
            "insertQuote" => ToolbarAction::Command(EditorCommand::InsertQuote),
            "insertCode" => ToolbarAction::Command(EditorCommand::InsertCode),
            "tableInsertRow" => ToolbarAction::Command(EditorCommand::TableInsertRow),
            "tableInsertColumn" => ToolbarAction::Command(EditorCommand::TableInsertColumn),
            "tableDeleteRow" => ToolbarAction::Command(EditorCommand::TableDeleteRow),
            "tableDeleteColumn" => ToolbarAction::Command(EditorCommand::TableDeleteColumn),
            "fullscreen" => ToolbarAction::ToggleFullscreen,
            other => ToolbarAction::Command(EditorCommand::Format(FormatCommand::parse(other, value)?)),
        };
        Some(action)
    }
}

/// Toolbar buttons that reflect the state at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToggleCommand {
    Bold,
    Italic,
    Underline,
    StrikeThrough,
    Subscript,
    Superscript,
    JustifyLeft,
    JustifyCenter,
    JustifyRight,
    JustifyFull,
    InsertOrderedList,
    InsertUnorderedList,
}

impl ToggleCommand {
    pub const ALL: [ToggleCommand; 12] = [
        ToggleCommand::Bold,
        ToggleCommand::Italic,
        ToggleCommand::Underline,
        ToggleCommand::StrikeThrough,
        ToggleCommand::Subscript,
        ToggleCommand::Superscript,
        ToggleCommand::JustifyLeft,
        ToggleCommand::JustifyCenter,
        ToggleCommand::JustifyRight,
        ToggleCommand::JustifyFull,
        ToggleCommand::InsertOrderedList,
        ToggleCommand::InsertUnorderedList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToggleCommand::Bold => "bold",
            ToggleCommand::Italic => "italic",
            ToggleCommand::Underline => "underline",
            ToggleCommand::StrikeThrough => "strikeThrough",
            ToggleCommand::Subscript => "subscript",
            ToggleCommand::Superscript => "superscript",
            ToggleCommand::JustifyLeft => "justifyLeft",
            ToggleCommand::JustifyCenter => "justifyCenter",
            ToggleCommand::JustifyRight => "justifyRight",
            ToggleCommand::JustifyFull => "justifyFull",
            ToggleCommand::InsertOrderedList => "insertOrderedList",
            ToggleCommand::InsertUnorderedList => "insertUnorderedList",
        }
    }

    pub fn query(self, editor: &Editor) -> bool {
        match self {
            ToggleCommand::Bold => editor.mark_active(Mark::Bold),
            ToggleCommand::Italic => editor.mark_active(Mark::Italic),
            ToggleCommand::Underline => editor.mark_active(Mark::Underline),
            ToggleCommand::StrikeThrough => editor.mark_active(Mark::Strikethrough),
            ToggleCommand::Subscript => editor.mark_active(Mark::Subscript),
            ToggleCommand::Superscript => editor.mark_active(Mark::Superscript),
            ToggleCommand::JustifyLeft => editor.alignment() == Some(TextAlign::Left),
            ToggleCommand::JustifyCenter => editor.alignment() == Some(TextAlign::Center),
            ToggleCommand::JustifyRight => editor.alignment() == Some(TextAlign::Right),
            ToggleCommand::JustifyFull => editor.alignment() == Some(TextAlign::Justify),
            ToggleCommand::InsertOrderedList => editor.list_state() == Some(true),
            ToggleCommand::InsertUnorderedList => editor.list_state() == Some(false),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyChord {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    fn primary(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Keyboard shortcuts resolve to the same actions as toolbar buttons.
pub fn shortcut(chord: &KeyChord) -> Option<ToolbarAction> {
    let key = chord.key.to_ascii_lowercase();
    if chord.alt {
        return None;
    }
    if chord.primary() {
        let action = match (key.as_str(), chord.shift) {
            ("b", false) => EditorCommand::Format(FormatCommand::ToggleMark(Mark::Bold)),
            ("i", false) => EditorCommand::Format(FormatCommand::ToggleMark(Mark::Italic)),
            ("u", false) => EditorCommand::Format(FormatCommand::ToggleMark(Mark::Underline)),
            ("z", false) => EditorCommand::Undo,
            ("z", true) | ("y", false) => EditorCommand::Redo,
            _ => return None,
        };
        return Some(ToolbarAction::Command(action));
    }
    if key == "tab" {
        let command = if chord.shift { FormatCommand::Outdent } else { FormatCommand::Indent };
        return Some(ToolbarAction::Command(EditorCommand::Format(command)));
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Toggle states that changed because of the command.
    Applied(Vec<(ToggleCommand, bool)>),
    OpenDialog(MediaKind),
    Fullscreen(bool),
}

/// Routes toolbar and keyboard actions into the editor and tracks which
/// toggle buttons are active.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    active: BTreeMap<ToggleCommand, bool>,
    fullscreen: bool,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, action: ToolbarAction, editor: &mut Editor) -> Dispatched {
        debug!(?action, "dispatch");
        match action {
            ToolbarAction::Command(command) => {
                editor.execute(command);
                Dispatched::Applied(self.refresh(editor))
            }
            ToolbarAction::OpenDialog(kind) => {
                editor.save_selection();
                Dispatched::OpenDialog(kind)
            }
            ToolbarAction::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                Dispatched::Fullscreen(self.fullscreen)
            }
        }
    }

    pub fn dispatch_named(&mut self, name: &str, value: Option<&str>, editor: &mut Editor) -> Option<Dispatched> {
        let Some(action) = ToolbarAction::parse(name, value) else {
            warn!(command = name, "unknown toolbar command");
            return None;
        };
        Some(self.dispatch(action, editor))
    }

    /// `None` when the chord is not a shortcut and the key should reach the
    /// surface untouched.
    pub fn handle_key(&mut self, chord: &KeyChord, editor: &mut Editor) -> Option<Dispatched> {
        let action = shortcut(chord)?;
        Some(self.dispatch(action, editor))
    }

    /// Re-queries every toggle and returns the ones whose state changed.
    pub fn refresh(&mut self, editor: &Editor) -> Vec<(ToggleCommand, bool)> {
        let mut changed = Vec::new();
        for command in ToggleCommand::ALL {
            let now = command.query(editor);
            let before = self.active.insert(command, now).unwrap_or(false);
            if before != now {
                changed.push((command, now));
            }
        }
        changed
    }

    pub fn is_active(&self, command: ToggleCommand) -> bool {
        self.active.get(&command).copied().unwrap_or(false)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }
}
