use crate::{
    block_to_html, extract_video_id, safe_url, Block, Editor, EditorConfig, HtmlMode, ImageRequest, ImageSource,
    LinkRequest, MediaAlign, MediaError, MediaKind, MediaRequest, Notification, PendingUpload, ProcessingGuard,
    ResolvedMedia, TableEditor, TableRequest, TableStyle, VideoRequest, DEFAULT_VIDEO_SIZE,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub const FOCUS_SETTLE: Duration = Duration::from_millis(150);
pub const FORCE_CLOSE_DELAY: Duration = Duration::from_millis(100);

pub const YOUTUBE_WATCH_BASE: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogPhase {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkForm {
    pub text: String,
    pub url: String,
    pub new_tab: bool,
}

impl Default for LinkForm {
    fn default() -> Self {
        Self { text: String::new(), url: String::new(), new_tab: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageForm {
    pub file: Option<PendingUpload>,
    pub url: String,
    pub alt: String,
    pub caption: String,
    pub width: String,
    pub height: String,
    pub align: MediaAlign,
}

impl Default for ImageForm {
    fn default() -> Self {
        Self {
            file: None,
            url: String::new(),
            alt: String::new(),
            caption: String::new(),
            width: String::new(),
            height: String::new(),
            align: MediaAlign::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableForm {
    pub rows: String,
    pub cols: String,
    pub header: bool,
    pub style: TableStyle,
    pub responsive: bool,
}

impl Default for TableForm {
    fn default() -> Self {
        Self { rows: "3".into(), cols: "3".into(), header: true, style: TableStyle::Default, responsive: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoForm {
    pub url: String,
    pub width: String,
    pub height: String,
    pub align: MediaAlign,
    pub responsive: bool,
}

impl Default for VideoForm {
    fn default() -> Self {
        Self {
            url: String::new(),
            width: DEFAULT_VIDEO_SIZE.0.to_string(),
            height: DEFAULT_VIDEO_SIZE.1.to_string(),
            align: MediaAlign::Center,
            responsive: true,
        }
    }
}

/// Raw field values of one dialog, exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogForm {
    Link(LinkForm),
    Image(ImageForm),
    Table(TableForm),
    Video(VideoForm),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Table(String),
    Video { video_id: String, embed_url: String },
    ImageFile(String),
    ImageUrl(String),
}

fn parse_px(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|v| *v > 0)
}

fn px_field(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl DialogForm {
    pub fn blank(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Link => DialogForm::Link(LinkForm::default()),
            MediaKind::Image => DialogForm::Image(ImageForm::default()),
            MediaKind::Table => DialogForm::Table(TableForm::default()),
            MediaKind::Video => DialogForm::Video(VideoForm::default()),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            DialogForm::Link(_) => MediaKind::Link,
            DialogForm::Image(_) => MediaKind::Image,
            DialogForm::Table(_) => MediaKind::Table,
            DialogForm::Video(_) => MediaKind::Video,
        }
    }

    /// Validates the fields. Nothing here touches the network.
    pub fn to_request(&self, config: &EditorConfig) -> Result<MediaRequest, MediaError> {
        let request = match self {
            DialogForm::Link(form) => MediaRequest::Link(LinkRequest::new(&form.text, &form.url, form.new_tab)?),
            DialogForm::Image(form) => {
                if let Some(file) = &form.file {
                    file.validate(config)?;
                }
                MediaRequest::Image(ImageRequest {
                    source: ImageSource::choose(form.file.clone(), &form.url)?,
                    alt: form.alt.trim().to_string(),
                    caption: Some(form.caption.trim().to_string()).filter(|c| !c.is_empty()),
                    width: parse_px(&form.width),
                    height: parse_px(&form.height),
                    align: form.align,
                })
            }
            DialogForm::Table(form) => MediaRequest::Table(TableRequest::from_input(
                &form.rows,
                &form.cols,
                form.header,
                form.style,
                form.responsive,
            )),
            DialogForm::Video(form) => MediaRequest::Video(
                VideoRequest::from_url(&form.url, form.align, form.responsive)?
                    .with_size(parse_px(&form.width), parse_px(&form.height)),
            ),
        };
        Ok(request)
    }

    pub fn can_confirm(&self, config: &EditorConfig) -> bool {
        self.to_request(config).is_ok()
    }

    pub fn preview(&self) -> Option<Preview> {
        match self {
            DialogForm::Link(_) => None,
            DialogForm::Image(form) => match &form.file {
                Some(file) => Some(Preview::ImageFile(file.file_name.clone())),
                None => safe_url(&form.url).map(Preview::ImageUrl),
            },
            DialogForm::Table(form) => {
                let request = TableRequest::from_input(&form.rows, &form.cols, form.header, form.style, form.responsive);
                Some(Preview::Table(block_to_html(&TableEditor::build(&request), HtmlMode::Storage)))
            }
            DialogForm::Video(form) => extract_video_id(&form.url).map(|video_id| Preview::Video {
                embed_url: format!("{}{video_id}", crate::YOUTUBE_EMBED_BASE),
                video_id,
            }),
        }
    }
}

/// Form prefilled from an existing image, table or video.
pub fn form_for_element(editor: &Editor, id: Uuid) -> Option<DialogForm> {
    let form = match editor.document().block(id)? {
        Block::Image { src, alt, caption, layout, .. } => DialogForm::Image(ImageForm {
            file: None,
            url: src.to_string(),
            alt: alt.to_string(),
            caption: caption.as_deref().unwrap_or_default().to_string(),
            width: px_field(layout.width),
            height: px_field(layout.height),
            align: layout.align,
        }),
        Block::Table { rows, header, style, responsive, .. } => {
            let cols = rows.first().map_or(0, Vec::len);
            DialogForm::Table(TableForm {
                rows: rows.len().to_string(),
                cols: cols.to_string(),
                header: *header,
                style: *style,
                responsive: *responsive,
            })
        }
        Block::Video { video_id, layout, .. } => DialogForm::Video(VideoForm {
            url: format!("{YOUTUBE_WATCH_BASE}{video_id}"),
            width: px_field(layout.width.or(Some(DEFAULT_VIDEO_SIZE.0))),
            height: px_field(layout.height.or(Some(DEFAULT_VIDEO_SIZE.1))),
            align: layout.align,
            responsive: layout.responsive,
        }),
        _ => return None,
    };
    Some(form)
}

/// The modal widgets of the host page.
pub trait DialogSurface {
    /// The native show toggle.
    fn show(&mut self, kind: MediaKind);
    /// The native hide toggle.
    fn hide(&mut self, kind: MediaKind);
    /// Fallback: removes show classes and attributes directly.
    fn strip_show_state(&mut self, kind: MediaKind);
    fn clear_backdrop(&mut self);
    fn focus_first_input(&mut self, kind: MediaKind);
    fn render_form(&mut self, form: &DialogForm);
    fn render_preview(&mut self, kind: MediaKind, preview: Option<&Preview>);
    fn set_confirm_state(&mut self, kind: MediaKind, enabled: bool, processing: bool);
    fn show_validation(&mut self, kind: MediaKind, message: Option<&str>);
    fn notify(&mut self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    FocusFirstInput(MediaKind),
    ForceClose(MediaKind),
}

/// Work the host runs after `delay`, on the same event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub delay: Duration,
    pub task: DeferredTask,
}

impl Scheduled {
    fn focus(kind: MediaKind) -> Self {
        Self { delay: FOCUS_SETTLE, task: DeferredTask::FocusFirstInput(kind) }
    }

    fn force_close(kind: MediaKind) -> Self {
        Self { delay: FORCE_CLOSE_DELAY, task: DeferredTask::ForceClose(kind) }
    }
}

/// Proof that a confirm passed validation and holds its kind's in-flight
/// flag until dropped.
#[derive(Debug)]
pub struct ConfirmTicket {
    kind: MediaKind,
    target: Option<Uuid>,
    _guard: ProcessingGuard,
}

impl ConfirmTicket {
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn target(&self) -> Option<Uuid> {
        self.target
    }
}

#[derive(Debug)]
struct DialogState {
    phase: DialogPhase,
    form: DialogForm,
    target: Option<Uuid>,
    processing: bool,
    error: Option<String>,
    preview: Option<Preview>,
    resets: u64,
}

impl DialogState {
    fn new(kind: MediaKind) -> Self {
        let form = DialogForm::blank(kind);
        Self {
            phase: DialogPhase::Closed,
            preview: form.preview(),
            form,
            target: None,
            processing: false,
            error: None,
            resets: 0,
        }
    }
}

#[derive(Debug)]
pub struct DialogCoordinator {
    dialogs: BTreeMap<MediaKind, DialogState>,
    open_stack: Vec<MediaKind>,
}

impl Default for DialogCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogCoordinator {
    pub fn new() -> Self {
        let dialogs = MediaKind::ALL.iter().map(|kind| (*kind, DialogState::new(*kind))).collect();
        Self { dialogs, open_stack: Vec::new() }
    }

    fn state(&self, kind: MediaKind) -> Option<&DialogState> {
        self.dialogs.get(&kind)
    }

    fn state_mut(&mut self, kind: MediaKind) -> Option<&mut DialogState> {
        self.dialogs.get_mut(&kind)
    }

    /// Shows a dialog. With `existing` the form is prefilled from that
    /// element and confirming edits it in place.
    pub fn open<S: DialogSurface>(
        &mut self,
        kind: MediaKind,
        existing: Option<Uuid>,
        editor: &mut Editor,
        surface: &mut S,
    ) -> Vec<Scheduled> {
        let Some(state) = self.dialogs.get_mut(&kind) else {
            return Vec::new();
        };
        if matches!(state.phase, DialogPhase::Opening | DialogPhase::Open) {
            return vec![Scheduled::focus(kind)];
        }
        editor.save_selection();
        let prefilled = existing.and_then(|id| form_for_element(editor, id).filter(|f| f.kind() == kind));
        state.target = prefilled.as_ref().and(existing);
        state.form = match prefilled {
            Some(form) => form,
            None => DialogForm::blank(kind),
        };
        if let DialogForm::Link(form) = &mut state.form {
            form.text = editor.selected_text();
            if let Some((url, new_tab)) = editor.link_at_cursor() {
                form.url = url;
                form.new_tab = new_tab;
                if form.text.is_empty() {
                    form.text = editor.link_text_at_cursor().unwrap_or_default();
                }
            }
        }
        state.phase = DialogPhase::Opening;
        state.processing = false;
        state.error = None;
        state.preview = state.form.preview();
        surface.render_form(&state.form);
        surface.render_preview(kind, state.preview.as_ref());
        surface.show_validation(kind, None);
        surface.set_confirm_state(kind, state.form.can_confirm(editor.config()), false);
        surface.show(kind);
        state.phase = DialogPhase::Open;
        self.open_stack.retain(|k| *k != kind);
        self.open_stack.push(kind);
        debug!(%kind, target = ?state.target, "dialog opened");
        vec![Scheduled::focus(kind)]
    }

    /// Field edits from the host. Refreshes the preview and the confirm
    /// button.
    pub fn update<S: DialogSurface>(&mut self, form: DialogForm, config: &EditorConfig, surface: &mut S) -> bool {
        let kind = form.kind();
        let Some(state) = self.state_mut(kind) else {
            return false;
        };
        if state.phase != DialogPhase::Open {
            return false;
        }
        state.preview = form.preview();
        let enabled = form.can_confirm(config) && !state.processing;
        state.form = form;
        if state.error.take().is_some() {
            surface.show_validation(kind, None);
        }
        surface.render_preview(kind, state.preview.as_ref());
        surface.set_confirm_state(kind, enabled, state.processing);
        true
    }

    /// First half of a confirm: takes the in-flight flag, then validates.
    /// A click while the flag is held, or on a dialog that is not open,
    /// yields `AlreadyProcessing`.
    pub fn begin_confirm<S: DialogSurface>(
        &mut self,
        kind: MediaKind,
        editor: &Editor,
        surface: &mut S,
    ) -> Result<(MediaRequest, ConfirmTicket), MediaError> {
        let Some(state) = self.dialogs.get_mut(&kind) else {
            return Err(MediaError::AlreadyProcessing(kind));
        };
        if state.phase != DialogPhase::Open {
            return Err(MediaError::AlreadyProcessing(kind));
        }
        let guard = editor.begin_insert(kind)?;
        let request = match state.form.to_request(editor.config()) {
            Ok(request) => request,
            Err(err) => {
                let message = err.to_string();
                surface.show_validation(kind, Some(&message));
                surface.set_confirm_state(kind, false, false);
                state.error = Some(message);
                return Err(err);
            }
        };
        state.processing = true;
        surface.set_confirm_state(kind, false, true);
        let ticket = ConfirmTicket { kind, target: state.target, _guard: guard };
        Ok((request, ticket))
    }

    /// Second half: applies the resolved media and force-closes, or reports
    /// the failure and leaves the dialog open for another try.
    pub fn finish_confirm<S: DialogSurface>(
        &mut self,
        ticket: ConfirmTicket,
        resolved: Result<ResolvedMedia, MediaError>,
        editor: &mut Editor,
        surface: &mut S,
    ) -> Result<(Option<Uuid>, Vec<Scheduled>), MediaError> {
        let kind = ticket.kind;
        let media = match resolved {
            Ok(media) => media,
            Err(err) => {
                warn!(%kind, error = %err, "media insertion failed");
                let notification = Notification::error(err.to_string());
                surface.notify(&notification);
                editor.notify(notification);
                if let Some(state) = self.state_mut(kind) {
                    state.processing = false;
                    let enabled = state.form.can_confirm(editor.config());
                    surface.set_confirm_state(kind, enabled, false);
                }
                return Err(err);
            }
        };
        let id = editor.apply_media(media, ticket.target);
        drop(ticket);
        let scheduled = self.force_close(kind, surface);
        Ok((id, scheduled))
    }

    /// Native hide plus a deferred manual teardown.
    fn force_close<S: DialogSurface>(&mut self, kind: MediaKind, surface: &mut S) -> Vec<Scheduled> {
        let Some(state) = self.state_mut(kind) else {
            return Vec::new();
        };
        state.processing = false;
        if state.phase == DialogPhase::Closed {
            return Vec::new();
        }
        state.phase = DialogPhase::Closing;
        surface.hide(kind);
        debug!(%kind, "dialog closing");
        vec![Scheduled::force_close(kind)]
    }

    /// Cancel. The document and history stay as they were. A pending upload
    /// still lands at the saved selection, so that is kept until it does.
    pub fn close<S: DialogSurface>(&mut self, kind: MediaKind, editor: &mut Editor, surface: &mut S) -> Vec<Scheduled> {
        if self.state(kind).map_or(true, |s| matches!(s.phase, DialogPhase::Closed | DialogPhase::Closing)) {
            return Vec::new();
        }
        if !editor.is_processing(kind) {
            editor.tracker.clear();
        }
        self.force_close(kind, surface)
    }

    /// The host reports that the native hide finished.
    /// An open dialog hidden natively (backdrop click, close button) counts
    /// as closing.
    pub fn on_hidden<S: DialogSurface>(&mut self, kind: MediaKind, surface: &mut S) -> bool {
        if let Some(state) = self.state_mut(kind) {
            if state.phase == DialogPhase::Open {
                state.phase = DialogPhase::Closing;
            }
        }
        self.reset_once(kind, surface)
    }

    pub fn run_deferred<S: DialogSurface>(&mut self, task: DeferredTask, surface: &mut S) {
        match task {
            DeferredTask::FocusFirstInput(kind) => {
                if self.phase(kind) == DialogPhase::Open {
                    surface.focus_first_input(kind);
                }
            }
            DeferredTask::ForceClose(kind) => {
                // reopened before the timer fired
                if matches!(self.phase(kind), DialogPhase::Opening | DialogPhase::Open) {
                    return;
                }
                surface.strip_show_state(kind);
                surface.clear_backdrop();
                self.reset_once(kind, surface);
            }
        }
    }

    /// Scratch state goes back to blank. Both the native hidden event and
    /// the fallback timer land here; only the first one of a close acts.
    fn reset_once<S: DialogSurface>(&mut self, kind: MediaKind, surface: &mut S) -> bool {
        let Some(state) = self.dialogs.get_mut(&kind) else {
            return false;
        };
        if state.phase != DialogPhase::Closing {
            return false;
        }
        state.form = DialogForm::blank(kind);
        state.target = None;
        state.processing = false;
        state.error = None;
        state.preview = state.form.preview();
        state.resets += 1;
        state.phase = DialogPhase::Closed;
        surface.render_form(&state.form);
        surface.render_preview(kind, state.preview.as_ref());
        surface.show_validation(kind, None);
        surface.set_confirm_state(kind, false, false);
        self.open_stack.retain(|k| *k != kind);
        debug!(%kind, "dialog reset");
        true
    }

    /// Escape closes the most recently opened dialog that is still open.
    pub fn escape<S: DialogSurface>(&mut self, editor: &mut Editor, surface: &mut S) -> Option<(MediaKind, Vec<Scheduled>)> {
        let kind = self.top_open()?;
        let scheduled = self.close(kind, editor, surface);
        Some((kind, scheduled))
    }

    pub fn top_open(&self) -> Option<MediaKind> {
        self.open_stack.iter().rev().copied().find(|k| self.phase(*k) == DialogPhase::Open)
    }

    pub fn phase(&self, kind: MediaKind) -> DialogPhase {
        self.state(kind).map(|s| s.phase).unwrap_or_default()
    }

    pub fn form(&self, kind: MediaKind) -> Option<&DialogForm> {
        self.state(kind).map(|s| &s.form)
    }

    pub fn target(&self, kind: MediaKind) -> Option<Uuid> {
        self.state(kind).and_then(|s| s.target)
    }

    pub fn is_processing(&self, kind: MediaKind) -> bool {
        self.state(kind).map_or(false, |s| s.processing)
    }

    pub fn error(&self, kind: MediaKind) -> Option<&str> {
        self.state(kind).and_then(|s| s.error.as_deref())
    }

    pub fn preview(&self, kind: MediaKind) -> Option<&Preview> {
        self.state(kind).and_then(|s| s.preview.as_ref())
    }

    pub fn resets(&self, kind: MediaKind) -> u64 {
        self.state(kind).map_or(0, |s| s.resets)
    }
}
