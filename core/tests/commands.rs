use rte_core::{
    shortcut, BindingKey, CommandDispatcher, Dispatched, Editor, EditorCommand, EditorConfig, FormatCommand,
    KeyChord, ListenerRegistry, Mark, MediaKind, Position, Selection, ToggleCommand, ToolbarAction,
};
use std::cell::Cell;
use std::rc::Rc;

fn format(command: FormatCommand) -> Option<ToolbarAction> {
    Some(ToolbarAction::Command(EditorCommand::Format(command)))
}

#[test]
fn shortcuts_resolve_to_toolbar_actions() {
    assert_eq!(shortcut(&KeyChord::new("b").ctrl()), format(FormatCommand::ToggleMark(Mark::Bold)));
    assert_eq!(shortcut(&KeyChord::new("I").ctrl()), format(FormatCommand::ToggleMark(Mark::Italic)));
    let meta_u = KeyChord { meta: true, ..KeyChord::new("u") };
    assert_eq!(shortcut(&meta_u), format(FormatCommand::ToggleMark(Mark::Underline)));
    assert_eq!(shortcut(&KeyChord::new("z").ctrl()), Some(ToolbarAction::Command(EditorCommand::Undo)));
    assert_eq!(shortcut(&KeyChord::new("z").ctrl().shift()), Some(ToolbarAction::Command(EditorCommand::Redo)));
    assert_eq!(shortcut(&KeyChord::new("y").ctrl()), Some(ToolbarAction::Command(EditorCommand::Redo)));
    assert_eq!(shortcut(&KeyChord::new("Tab")), format(FormatCommand::Indent));
    assert_eq!(shortcut(&KeyChord::new("Tab").shift()), format(FormatCommand::Outdent));
    assert_eq!(shortcut(&KeyChord { alt: true, ..KeyChord::new("b").ctrl() }), None);
    assert_eq!(shortcut(&KeyChord::new("b")), None);
}

#[test]
fn toolbar_names_parse() {
    assert_eq!(ToolbarAction::parse("insertImage", None), Some(ToolbarAction::OpenDialog(MediaKind::Image)));
    assert_eq!(ToolbarAction::parse("createLink", None), Some(ToolbarAction::OpenDialog(MediaKind::Link)));
    assert_eq!(ToolbarAction::parse("foreColor", Some("#ff0000")), format(FormatCommand::ForeColor("#ff0000".into())));
    assert_eq!(ToolbarAction::parse("foreColor", None), None);
    assert_eq!(ToolbarAction::parse("fullscreen", None), Some(ToolbarAction::ToggleFullscreen));
    assert_eq!(ToolbarAction::parse("selfDestruct", None), None);
}

#[test]
fn dispatch_reports_changed_toggle_states() {
    let mut editor = Editor::with_content(EditorConfig::default(), "<p>Hello</p>");
    let node = editor.document().containers()[0];
    editor.set_selection(Some(Selection::new(Position::new(node, 0), Position::new(node, 5))));
    let mut dispatcher = CommandDispatcher::new();

    let Some(Dispatched::Applied(changed)) = dispatcher.dispatch_named("bold", None, &mut editor) else {
        panic!("bold should apply");
    };
    assert!(changed.contains(&(ToggleCommand::Bold, true)));
    assert!(changed.contains(&(ToggleCommand::JustifyLeft, true)));
    assert_eq!(editor.content(), "<p><b>Hello</b></p>");
    assert!(dispatcher.is_active(ToggleCommand::Bold));

    let Some(Dispatched::Applied(changed)) = dispatcher.dispatch_named("justifyCenter", None, &mut editor) else {
        panic!("justify should apply");
    };
    assert_eq!(changed, vec![(ToggleCommand::JustifyLeft, false), (ToggleCommand::JustifyCenter, true)]);
    assert_eq!(editor.content(), "<p style=\"text-align:center;\"><b>Hello</b></p>");

    assert_eq!(dispatcher.dispatch_named("selfDestruct", None, &mut editor), None);
}

#[test]
fn undo_shortcut_reaches_history() {
    let mut editor = Editor::with_content(EditorConfig::default(), "<p>Hello</p>");
    let node = editor.document().containers()[0];
    editor.set_selection(Some(Selection::collapsed(Position::new(node, 5))));
    editor.insert_text("!");
    let mut dispatcher = CommandDispatcher::new();
    assert!(dispatcher.handle_key(&KeyChord::new("z").ctrl(), &mut editor).is_some());
    assert_eq!(editor.content(), "<p>Hello</p>");
    assert!(dispatcher.handle_key(&KeyChord::new("y").ctrl(), &mut editor).is_some());
    assert_eq!(editor.content(), "<p>Hello!</p>");
    assert!(dispatcher.handle_key(&KeyChord::new("q"), &mut editor).is_none());
}

#[test]
fn dialog_buttons_save_the_selection() {
    let mut editor = Editor::with_content(EditorConfig::default(), "<p>Hello</p>");
    let mut dispatcher = CommandDispatcher::new();
    assert!(!editor.tracker().has_saved());
    assert_eq!(
        dispatcher.dispatch_named("insertTable", None, &mut editor),
        Some(Dispatched::OpenDialog(MediaKind::Table))
    );
    assert!(editor.tracker().has_saved());
    assert_eq!(dispatcher.dispatch(ToolbarAction::ToggleFullscreen, &mut editor), Dispatched::Fullscreen(true));
    assert_eq!(dispatcher.dispatch(ToolbarAction::ToggleFullscreen, &mut editor), Dispatched::Fullscreen(false));
}

struct Handle(Rc<Cell<usize>>);

impl Drop for Handle {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn rebinding_detaches_the_previous_listener() {
    let dropped = Rc::new(Cell::new(0));
    let mut registry = ListenerRegistry::new();
    let click = BindingKey::new("surface", "click");
    assert!(!registry.bind(click.clone(), Handle(dropped.clone())));
    assert!(registry.bind(click.clone(), Handle(dropped.clone())));
    assert_eq!(dropped.get(), 1);
    assert_eq!(registry.len(), 1);

    registry.bind(BindingKey::new("document", "keydown"), Handle(dropped.clone()));
    assert_eq!(registry.len(), 2);
    assert!(registry.unbind(&click));
    assert!(!registry.is_bound(&click));
    assert_eq!(dropped.get(), 2);
    registry.clear();
    assert!(registry.is_empty());
    assert_eq!(dropped.get(), 3);
}
