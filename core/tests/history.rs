use rte_core::{Editor, EditorConfig, FormatCommand, Mark, Position, Selection, TextAlign};

fn cursor_at_end(editor: &mut Editor) {
    let node = editor.document().containers()[0];
    let len = editor.text().chars().count();
    editor.set_selection(Some(Selection::collapsed(Position::new(node, len))));
}

#[test]
fn initial_load_seeds_exactly_one_entry() {
    let mut editor = Editor::with_content(EditorConfig::default(), "<p>draft</p>");
    assert_eq!(editor.history().len(), 1);
    assert!(!editor.undo());
    assert_eq!(editor.content(), "<p>draft</p>");
    assert_eq!(editor.hidden_value(), "<p>draft</p>");
}

#[test]
fn undo_then_redo_walks_every_state() {
    let mut editor = Editor::new(EditorConfig::default());
    let mut states = vec![editor.content()];
    for word in ["one", " two", " three", " four"] {
        cursor_at_end(&mut editor);
        editor.insert_text(word);
        states.push(editor.content());
    }
    assert_eq!(editor.history().len(), states.len());

    for expected in states.iter().rev().skip(1) {
        assert!(editor.undo());
        assert_eq!(&editor.content(), expected);
        assert_eq!(editor.hidden_value(), expected);
    }
    assert!(!editor.undo());

    for expected in states.iter().skip(1) {
        assert!(editor.redo());
        assert_eq!(&editor.content(), expected);
    }
    assert!(!editor.redo());
    assert_eq!(editor.content(), "<p>one two three four</p>");
}

#[test]
fn no_op_commands_do_not_grow_history() {
    let mut editor = Editor::with_content(EditorConfig::default(), "<p>plain</p>");
    cursor_at_end(&mut editor);
    editor.exec(FormatCommand::ToggleMark(Mark::Bold));
    editor.exec(FormatCommand::ToggleMark(Mark::Bold));
    assert_eq!(editor.history().len(), 1);
    assert!(!editor.exec(FormatCommand::Justify(TextAlign::Left)));
    assert_eq!(editor.history().len(), 1);
    assert_eq!(editor.content(), "<p>plain</p>");
}

#[test]
fn pending_bold_applies_to_typed_text() {
    let mut editor = Editor::with_content(EditorConfig::default(), "<p>a</p>");
    cursor_at_end(&mut editor);
    editor.exec(FormatCommand::ToggleMark(Mark::Bold));
    assert!(editor.mark_active(Mark::Bold));
    editor.insert_text("b");
    assert_eq!(editor.content(), "<p>a<b>b</b></p>");
    assert_eq!(editor.history().len(), 2);
}

#[test]
fn new_edit_after_undo_drops_redo_tail() {
    let mut editor = Editor::new(EditorConfig::default());
    cursor_at_end(&mut editor);
    editor.insert_text("a");
    cursor_at_end(&mut editor);
    editor.insert_text("b");
    assert!(editor.undo());
    assert!(editor.history().can_redo());
    cursor_at_end(&mut editor);
    editor.insert_text("c");
    assert!(!editor.history().can_redo());
    assert_eq!(editor.content(), "<p>ac</p>");
    assert!(!editor.redo());
}

#[test]
fn capacity_evicts_oldest_entries() {
    let config = EditorConfig { history_capacity: 3, ..EditorConfig::default() };
    let mut editor = Editor::new(config);
    for c in ["a", "b", "c", "d", "e"] {
        cursor_at_end(&mut editor);
        editor.insert_text(c);
    }
    assert_eq!(editor.history().len(), 3);
    assert!(editor.undo());
    assert!(editor.undo());
    assert!(!editor.undo());
    assert_eq!(editor.content(), "<p>abc</p>");
}

#[test]
fn set_content_is_one_undoable_step() {
    let mut editor = Editor::with_content(EditorConfig::default(), "<p>old</p>");
    editor.set_content("<h2>new</h2><p>body</p>");
    assert_eq!(editor.history().len(), 2);
    assert_eq!(editor.content(), "<h2>new</h2><p>body</p>");
    assert!(editor.undo());
    assert_eq!(editor.content(), "<p>old</p>");
}

#[test]
fn clear_leaves_one_empty_paragraph() {
    let mut editor = Editor::with_content(EditorConfig::default(), "<p>a</p><hr><p>b</p>");
    editor.clear();
    assert_eq!(editor.content(), "<p><br></p>");
    assert!(editor.is_empty());
    assert_eq!(editor.document().blocks.len(), 1);
}
