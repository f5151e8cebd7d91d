use crate::{
    DeferredTask, DialogCoordinator, DialogForm, DialogSurface, Editor, MediaError, MediaKind, Scheduled, Uploader,
};
use std::cell::{Ref, RefCell, RefMut};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Inserted { id: Option<Uuid>, scheduled: Vec<Scheduled> },
    /// Shown inline in the dialog; nothing was sent.
    Invalid(MediaError),
    /// Upload failed; the dialog stays open.
    Failed(MediaError),
    /// A click while the same kind was already being inserted.
    Ignored,
}

/// One mounted editor with its dialogs, their host widgets and the upload
/// client. Event callbacks share it by reference; no borrow is held across
/// the upload await, so other events keep working while it is pending.
pub struct EditorSession<U, S> {
    editor: RefCell<Editor>,
    dialogs: RefCell<DialogCoordinator>,
    surface: RefCell<S>,
    uploader: U,
}

impl<U: Uploader, S: DialogSurface> EditorSession<U, S> {
    pub fn new(editor: Editor, uploader: U, surface: S) -> Self {
        Self {
            editor: RefCell::new(editor),
            dialogs: RefCell::new(DialogCoordinator::new()),
            surface: RefCell::new(surface),
            uploader,
        }
    }

    pub fn editor(&self) -> Ref<'_, Editor> {
        self.editor.borrow()
    }

    pub fn editor_mut(&self) -> RefMut<'_, Editor> {
        self.editor.borrow_mut()
    }

    pub fn dialogs(&self) -> Ref<'_, DialogCoordinator> {
        self.dialogs.borrow()
    }

    pub fn surface(&self) -> Ref<'_, S> {
        self.surface.borrow()
    }

    pub fn surface_mut(&self) -> RefMut<'_, S> {
        self.surface.borrow_mut()
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn open_dialog(&self, kind: MediaKind, existing: Option<Uuid>) -> Vec<Scheduled> {
        let mut editor = self.editor.borrow_mut();
        let mut surface = self.surface.borrow_mut();
        self.dialogs.borrow_mut().open(kind, existing, &mut editor, &mut *surface)
    }

    pub fn update_form(&self, form: DialogForm) -> bool {
        let editor = self.editor.borrow();
        let mut surface = self.surface.borrow_mut();
        self.dialogs.borrow_mut().update(form, editor.config(), &mut *surface)
    }

    pub async fn confirm(&self, kind: MediaKind) -> ConfirmOutcome {
        let begun = {
            let editor = self.editor.borrow();
            let mut surface = self.surface.borrow_mut();
            self.dialogs.borrow_mut().begin_confirm(kind, &editor, &mut *surface)
        };
        let (request, ticket) = match begun {
            Ok(begun) => begun,
            Err(MediaError::AlreadyProcessing(kind)) => {
                debug!(%kind, "duplicate confirm ignored");
                return ConfirmOutcome::Ignored;
            }
            Err(err) => return ConfirmOutcome::Invalid(err),
        };
        let resolved = request.resolve(&self.uploader).await;
        let mut editor = self.editor.borrow_mut();
        let mut surface = self.surface.borrow_mut();
        match self.dialogs.borrow_mut().finish_confirm(ticket, resolved, &mut editor, &mut *surface) {
            Ok((id, scheduled)) => ConfirmOutcome::Inserted { id, scheduled },
            Err(err) => ConfirmOutcome::Failed(err),
        }
    }

    pub fn close_dialog(&self, kind: MediaKind) -> Vec<Scheduled> {
        let mut editor = self.editor.borrow_mut();
        let mut surface = self.surface.borrow_mut();
        self.dialogs.borrow_mut().close(kind, &mut editor, &mut *surface)
    }

    pub fn dialog_hidden(&self, kind: MediaKind) -> bool {
        let mut surface = self.surface.borrow_mut();
        self.dialogs.borrow_mut().on_hidden(kind, &mut *surface)
    }

    pub fn run_deferred(&self, task: DeferredTask) {
        let mut surface = self.surface.borrow_mut();
        self.dialogs.borrow_mut().run_deferred(task, &mut *surface);
    }

    pub fn escape(&self) -> Option<(MediaKind, Vec<Scheduled>)> {
        let mut editor = self.editor.borrow_mut();
        let mut surface = self.surface.borrow_mut();
        self.dialogs.borrow_mut().escape(&mut editor, &mut *surface)
    }
}
