use futures::executor::block_on;
use rte_core::{
    Block, ConfirmOutcome, DeferredTask, DialogForm, DialogPhase, DialogSurface, Editor, EditorConfig,
    EditorSession, ImageForm, LinkForm, MediaAlign, MediaError, MediaKind, Notification, NotificationLevel,
    PendingUpload, Position, Preview, Selection, TableForm, UploadError, Uploader, VideoForm, FORCE_CLOSE_DELAY,
};
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Pending on the first poll, ready on the second.
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[derive(Default)]
struct FakeUploader {
    calls: Cell<usize>,
    fail: bool,
}

impl Uploader for FakeUploader {
    async fn upload(&self, file: PendingUpload) -> Result<String, UploadError> {
        self.calls.set(self.calls.get() + 1);
        YieldOnce(false).await;
        if self.fail {
            return Err(UploadError::Server("disk full".into()));
        }
        Ok(format!("https://cdn.test/{}", file.file_name))
    }
}

#[derive(Default)]
struct Recorder {
    shown: Vec<MediaKind>,
    hidden: Vec<MediaKind>,
    stripped: Vec<MediaKind>,
    backdrops: usize,
    focused: Vec<MediaKind>,
    forms: Vec<DialogForm>,
    previews: Vec<(MediaKind, Option<Preview>)>,
    confirm_states: Vec<(MediaKind, bool, bool)>,
    validations: Vec<(MediaKind, Option<String>)>,
    notifications: Vec<Notification>,
}

impl DialogSurface for Recorder {
    fn show(&mut self, kind: MediaKind) {
        self.shown.push(kind);
    }

    fn hide(&mut self, kind: MediaKind) {
        self.hidden.push(kind);
    }

    fn strip_show_state(&mut self, kind: MediaKind) {
        self.stripped.push(kind);
    }

    fn clear_backdrop(&mut self) {
        self.backdrops += 1;
    }

    fn focus_first_input(&mut self, kind: MediaKind) {
        self.focused.push(kind);
    }

    fn render_form(&mut self, form: &DialogForm) {
        self.forms.push(form.clone());
    }

    fn render_preview(&mut self, kind: MediaKind, preview: Option<&Preview>) {
        self.previews.push((kind, preview.cloned()));
    }

    fn set_confirm_state(&mut self, kind: MediaKind, enabled: bool, processing: bool) {
        self.confirm_states.push((kind, enabled, processing));
    }

    fn show_validation(&mut self, kind: MediaKind, message: Option<&str>) {
        self.validations.push((kind, message.map(str::to_string)));
    }

    fn notify(&mut self, notification: &Notification) {
        self.notifications.push(notification.clone());
    }
}

fn session(markup: &str, uploader: FakeUploader) -> EditorSession<FakeUploader, Recorder> {
    EditorSession::new(Editor::with_content(EditorConfig::default(), markup), uploader, Recorder::default())
}

fn image_form(name: &str) -> DialogForm {
    DialogForm::Image(ImageForm { file: Some(PendingUpload::new(name, vec![1, 2, 3])), ..ImageForm::default() })
}

#[test]
fn double_confirm_inserts_one_image() {
    let session = session("<p>Hi</p>", FakeUploader::default());
    session.open_dialog(MediaKind::Image, None);
    assert!(session.update_form(image_form("cat.png")));

    let (first, second) =
        block_on(async { futures::join!(session.confirm(MediaKind::Image), session.confirm(MediaKind::Image)) });

    assert!(matches!(first, ConfirmOutcome::Inserted { id: Some(_), .. }));
    assert_eq!(second, ConfirmOutcome::Ignored);
    assert_eq!(session.uploader().calls.get(), 1);
    assert_eq!(session.editor().document().count_media(MediaKind::Image), 1);
    assert!(session.editor().content().contains("src=\"https://cdn.test/cat.png\""));
    assert!(!session.editor().is_processing(MediaKind::Image));
}

#[test]
fn closing_resets_the_dialog_exactly_once() {
    let session = session("<p>Hi</p>", FakeUploader::default());
    session.open_dialog(MediaKind::Image, None);
    session.update_form(image_form("cat.png"));
    let outcome = block_on(session.confirm(MediaKind::Image));
    let ConfirmOutcome::Inserted { scheduled, .. } = outcome else {
        panic!("insert expected, got {outcome:?}");
    };
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].delay, FORCE_CLOSE_DELAY);
    assert_eq!(scheduled[0].task, DeferredTask::ForceClose(MediaKind::Image));
    assert_eq!(session.dialogs().phase(MediaKind::Image), DialogPhase::Closing);

    // native hidden event first, then the fallback timer
    assert!(session.dialog_hidden(MediaKind::Image));
    session.run_deferred(scheduled[0].task);

    let dialogs = session.dialogs();
    assert_eq!(dialogs.resets(MediaKind::Image), 1);
    assert_eq!(dialogs.phase(MediaKind::Image), DialogPhase::Closed);
    assert_eq!(dialogs.form(MediaKind::Image), Some(&DialogForm::blank(MediaKind::Image)));
    assert_eq!(session.surface().stripped, vec![MediaKind::Image]);
    assert_eq!(session.surface().backdrops, 1);
}

#[test]
fn late_force_close_does_not_reset_a_reopened_dialog() {
    let session = session("<p>Hi</p>", FakeUploader::default());
    session.open_dialog(MediaKind::Table, None);
    let scheduled = session.close_dialog(MediaKind::Table);
    assert!(session.dialog_hidden(MediaKind::Table));
    session.open_dialog(MediaKind::Table, None);
    session.update_form(DialogForm::Table(TableForm { rows: "5".into(), ..TableForm::default() }));
    session.run_deferred(scheduled[0].task);
    assert_eq!(session.dialogs().resets(MediaKind::Table), 1);
    assert_eq!(session.dialogs().phase(MediaKind::Table), DialogPhase::Open);
    match session.dialogs().form(MediaKind::Table) {
        Some(DialogForm::Table(form)) => assert_eq!(form.rows, "5"),
        other => panic!("unexpected form {other:?}"),
    };
}

#[test]
fn failed_upload_keeps_the_dialog_open() {
    let session = session("<p>Hi</p>", FakeUploader { fail: true, ..FakeUploader::default() });
    let before = session.editor().content();
    let entries = session.editor().history().len();
    session.open_dialog(MediaKind::Image, None);
    session.update_form(image_form("cat.png"));

    let outcome = block_on(session.confirm(MediaKind::Image));
    assert_eq!(outcome, ConfirmOutcome::Failed(MediaError::Upload(UploadError::Server("disk full".into()))));
    assert_eq!(session.dialogs().phase(MediaKind::Image), DialogPhase::Open);
    assert!(!session.dialogs().is_processing(MediaKind::Image));
    assert_eq!(session.editor().content(), before);
    assert_eq!(session.editor().history().len(), entries);

    let notes = session.editor_mut().take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Error);
    assert!(notes[0].message.contains("disk full"));
    assert_eq!(session.surface().notifications, notes);
    assert_eq!(session.surface().confirm_states.last(), Some(&(MediaKind::Image, true, false)));

    // a retry is accepted once the first attempt has finished
    let retry = block_on(session.confirm(MediaKind::Image));
    assert!(matches!(retry, ConfirmOutcome::Failed(_)));
    assert_eq!(session.uploader().calls.get(), 2);
}

#[test]
fn cancel_leaves_the_document_untouched() {
    let session = session("<p>Hi</p>", FakeUploader::default());
    let before = session.editor().content();
    let entries = session.editor().history().len();
    session.open_dialog(MediaKind::Video, None);
    session.update_form(DialogForm::Video(VideoForm {
        url: "https://youtu.be/dQw4w9WgXcQ".into(),
        ..VideoForm::default()
    }));
    let scheduled = session.close_dialog(MediaKind::Video);
    assert_eq!(scheduled.len(), 1);
    assert_eq!(session.surface().hidden, vec![MediaKind::Video]);
    assert_eq!(session.editor().content(), before);
    assert_eq!(session.editor().history().len(), entries);
    assert!(!session.editor().tracker().has_saved());
    assert_eq!(block_on(session.confirm(MediaKind::Video)), ConfirmOutcome::Ignored);
}

#[test]
fn escape_closes_the_most_recent_dialog() {
    let session = session("<p>Hi</p>", FakeUploader::default());
    assert_eq!(session.escape(), None);
    session.open_dialog(MediaKind::Link, None);
    session.open_dialog(MediaKind::Table, None);
    let (kind, scheduled) = session.escape().unwrap();
    assert_eq!(kind, MediaKind::Table);
    assert_eq!(scheduled[0].task, DeferredTask::ForceClose(MediaKind::Table));
    assert_eq!(session.dialogs().top_open(), Some(MediaKind::Link));
    assert_eq!(session.escape().map(|(kind, _)| kind), Some(MediaKind::Link));
    assert_eq!(session.dialogs().top_open(), None);
}

#[test]
fn link_dialog_is_prefilled_from_the_selection() {
    let session = session("<p>Say HelloLudi now</p>", FakeUploader::default());
    {
        let mut editor = session.editor_mut();
        let node = editor.document().containers()[0];
        editor.set_selection(Some(Selection::new(Position::new(node, 4), Position::new(node, 13))));
    }
    let scheduled = session.open_dialog(MediaKind::Link, None);
    assert_eq!(scheduled[0].task, DeferredTask::FocusFirstInput(MediaKind::Link));
    match session.dialogs().form(MediaKind::Link) {
        Some(DialogForm::Link(form)) => {
            assert_eq!(form.text, "HelloLudi");
            assert!(form.url.is_empty());
            assert!(form.new_tab);
        }
        other => panic!("unexpected form {other:?}"),
    }
    session.run_deferred(scheduled[0].task);
    assert_eq!(session.surface().focused, vec![MediaKind::Link]);

    // focus moves into the dialog
    session.editor_mut().set_selection(None);
    session.update_form(DialogForm::Link(LinkForm {
        text: "HelloLudi".into(),
        url: "https://example.com".into(),
        new_tab: false,
    }));
    let outcome = block_on(session.confirm(MediaKind::Link));
    assert!(matches!(outcome, ConfirmOutcome::Inserted { id: None, .. }));
    assert_eq!(session.editor().content(), "<p>Say <a href=\"https://example.com\">HelloLudi</a> now</p>");
}

#[test]
fn invalid_video_url_is_shown_inline() {
    let session = session("<p>Hi</p>", FakeUploader::default());
    session.open_dialog(MediaKind::Video, None);
    let form = DialogForm::Video(VideoForm { url: "https://example.com/notavideo".into(), ..VideoForm::default() });
    session.update_form(form);
    assert_eq!(session.dialogs().preview(MediaKind::Video), None);
    let outcome = block_on(session.confirm(MediaKind::Video));
    let expected = MediaError::InvalidVideoUrl("https://example.com/notavideo".into());
    assert_eq!(outcome, ConfirmOutcome::Invalid(expected.clone()));
    assert_eq!(session.dialogs().error(MediaKind::Video), Some(expected.to_string().as_str()));
    assert_eq!(session.dialogs().phase(MediaKind::Video), DialogPhase::Open);
    assert!(!session.editor().is_processing(MediaKind::Video));
    assert_eq!(session.editor().document().count_media(MediaKind::Video), 0);
}

#[test]
fn editing_an_existing_table_updates_it_in_place() {
    let session = session("<p>Hi</p>", FakeUploader::default());
    session.open_dialog(MediaKind::Table, None);
    let outcome = block_on(session.confirm(MediaKind::Table));
    let ConfirmOutcome::Inserted { id: Some(id), .. } = outcome else {
        panic!("insert expected, got {outcome:?}");
    };
    session.dialog_hidden(MediaKind::Table);

    session.open_dialog(MediaKind::Table, Some(id));
    assert_eq!(session.dialogs().target(MediaKind::Table), Some(id));
    match session.dialogs().form(MediaKind::Table) {
        Some(DialogForm::Table(form)) => assert_eq!((form.rows.as_str(), form.cols.as_str()), ("3", "3")),
        other => panic!("unexpected form {other:?}"),
    }
    session.update_form(DialogForm::Table(TableForm { cols: "4".into(), ..TableForm::default() }));
    let outcome = block_on(session.confirm(MediaKind::Table));
    assert!(matches!(outcome, ConfirmOutcome::Inserted { id: Some(same), .. } if same == id));
    assert_eq!(session.editor().document().count_media(MediaKind::Table), 1);
}

#[test]
fn editing_an_existing_video_updates_it_in_place() {
    let session = session("<p>Hi</p>", FakeUploader::default());
    session.open_dialog(MediaKind::Video, None);
    session.update_form(DialogForm::Video(VideoForm {
        url: "https://youtu.be/dQw4w9WgXcQ".into(),
        ..VideoForm::default()
    }));
    let outcome = block_on(session.confirm(MediaKind::Video));
    let ConfirmOutcome::Inserted { id: Some(id), .. } = outcome else {
        panic!("insert expected, got {outcome:?}");
    };
    session.dialog_hidden(MediaKind::Video);
    let index = session.editor().document().block_index(id);
    let blocks = session.editor().document().blocks.len();

    session.open_dialog(MediaKind::Video, Some(id));
    assert_eq!(session.dialogs().target(MediaKind::Video), Some(id));
    let Some(DialogForm::Video(mut form)) = session.dialogs().form(MediaKind::Video).cloned() else {
        panic!("video form expected");
    };
    assert_eq!(form.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    form.url = "https://www.youtube.com/watch?v=9bZkp7q19f0".into();
    form.align = MediaAlign::Right;
    session.update_form(DialogForm::Video(form));
    let outcome = block_on(session.confirm(MediaKind::Video));
    assert!(matches!(outcome, ConfirmOutcome::Inserted { id: Some(same), .. } if same == id));

    let editor = session.editor();
    assert_eq!(editor.document().count_media(MediaKind::Video), 1);
    assert_eq!(editor.document().block_index(id), index);
    assert_eq!(editor.document().blocks.len(), blocks);
    match editor.document().block(id) {
        Some(Block::Video { video_id, layout, .. }) => {
            assert_eq!(&**video_id, "9bZkp7q19f0");
            assert_eq!(layout.align, MediaAlign::Right);
        }
        other => panic!("unexpected block {other:?}"),
    }
}

#[test]
fn link_dialog_on_a_link_edits_that_link() {
    let session = session("<p>see <a href=\"https://a.test\">docs</a> now</p>", FakeUploader::default());
    {
        let mut editor = session.editor_mut();
        let node = editor.document().containers()[0];
        editor.set_selection(Some(Selection::collapsed(Position::new(node, 6))));
    }
    session.open_dialog(MediaKind::Link, None);
    let Some(DialogForm::Link(mut form)) = session.dialogs().form(MediaKind::Link).cloned() else {
        panic!("link form expected");
    };
    assert_eq!((form.text.as_str(), form.url.as_str(), form.new_tab), ("docs", "https://a.test", false));

    session.editor_mut().set_selection(None);
    form.url = "https://b.test".into();
    session.update_form(DialogForm::Link(form));
    let outcome = block_on(session.confirm(MediaKind::Link));
    assert!(matches!(outcome, ConfirmOutcome::Inserted { id: None, .. }));
    let content = session.editor().content();
    assert_eq!(content, "<p>see <a href=\"https://b.test\">docs</a> now</p>");
    assert_eq!(content.matches("<a ").count(), 1);
}

#[test]
fn escape_during_upload_keeps_the_insertion_point() {
    let session = session("<p>HelloWorld</p>", FakeUploader::default());
    {
        let mut editor = session.editor_mut();
        let node = editor.document().containers()[0];
        editor.set_selection(Some(Selection::collapsed(Position::new(node, 5))));
    }
    session.open_dialog(MediaKind::Image, None);
    session.update_form(image_form("cat.png"));
    session.editor_mut().set_selection(None);

    // the upload yields once, so the Escape lands while it is pending
    let (outcome, escaped) = block_on(async {
        futures::join!(session.confirm(MediaKind::Image), async { session.escape().map(|(kind, _)| kind) })
    });
    assert_eq!(escaped, Some(MediaKind::Image));
    assert!(matches!(outcome, ConfirmOutcome::Inserted { id: Some(_), .. }));

    let editor = session.editor();
    assert!(matches!(&editor.document().blocks[1], Block::Image { .. }));
    assert!(editor.content().starts_with("<p>Hello</p>"));
    assert!(editor.content().ends_with("<p>World</p>"));
    assert!(!editor.tracker().has_saved());
}
