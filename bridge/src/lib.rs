use gloo_events::EventListener;
use gloo_timers::callback::Timeout;
use rte_core::{
    CommandDispatcher, DiffEngine, Dispatched, Editor, EditorConfig, EditorSession, HostRegions, HttpUploader,
    ListenerRegistry, MediaKind, Scheduled, SyncReason, ToggleCommand,
};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, error, warn};
use wasm_bindgen::prelude::*;
use web_sys::{CustomEvent, CustomEventInit, Element, HtmlElement};

mod dialogs;
mod dom;
mod events;

pub use dialogs::DomDialogs;

const READY_EVENT: &str = "richEditorready";
const FULLSCREEN_CLASS: &str = "fullscreen-editor";
const SELECTED_CLASS: &str = "selected";
const EMPTY_CLASS: &str = "is-empty";

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let level = if cfg!(debug_assertions) { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new().set_max_level(level).build(),
    );
}

/// One mounted editor: the engine session plus the page elements it drives.
pub(crate) struct Host {
    session: EditorSession<HttpUploader, DomDialogs>,
    dispatcher: RefCell<CommandDispatcher>,
    diff: RefCell<DiffEngine>,
    listeners: RefCell<ListenerRegistry<EventListener>>,
    dom: web_sys::Document,
    container: Element,
    toolbar: Element,
    surface: HtmlElement,
    drag_origin: Cell<Option<(f64, f64)>>,
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

fn read_config(options: JsValue) -> Result<EditorConfig, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(EditorConfig::default());
    }
    let mut config: EditorConfig = serde_wasm_bindgen::from_value(options).map_err(js_error)?;
    config.history_capacity = config.history_capacity.max(1);
    Ok(config)
}

impl Host {
    fn mount(container_id: &str, options: JsValue) -> Result<Rc<Host>, JsValue> {
        let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
        let dom = window.document().ok_or_else(|| js_error("no document"))?;
        let container = dom
            .get_element_by_id(container_id)
            .ok_or_else(|| js_error(format!("editor container #{container_id} not found")))?;
        let config = read_config(options)?;
        let toolbar = container.query_selector(&config.toolbar_selector)?;
        let surface = container.query_selector(&config.surface_selector)?;
        let regions = HostRegions { toolbar: toolbar.is_some(), surface: surface.is_some() };

        let hidden = dom.get_element_by_id(&config.hidden_field_id);
        let initial = hidden
            .as_ref()
            .and_then(|el| js_sys::Reflect::get(el, &"value".into()).ok())
            .and_then(|v| v.as_string())
            .filter(|v| !v.trim().is_empty())
            .or_else(|| surface.as_ref().map(Element::inner_html))
            .unwrap_or_default();

        let origin = window.location().origin().ok();
        let uploader = HttpUploader::from_config(&config, origin.as_deref());
        let editor = Editor::mount(regions, config, &initial).map_err(js_error)?;
        let (Some(toolbar), Some(surface)) = (toolbar, surface) else {
            return Err(js_error("editor regions vanished while mounting"));
        };
        let surface: HtmlElement = surface.dyn_into()?;
        surface.set_attribute("contenteditable", "true")?;
        surface.set_attribute("data-placeholder", &editor.config().placeholder)?;
        surface.style().set_property("min-height", &format!("{}px", editor.config().min_height))?;

        let host = Rc::new(Host {
            session: EditorSession::new(editor, uploader, DomDialogs::new(dom.clone())),
            dispatcher: RefCell::new(CommandDispatcher::new()),
            diff: RefCell::new(DiffEngine::new()),
            listeners: RefCell::new(ListenerRegistry::new()),
            dom,
            container,
            toolbar,
            surface,
            drag_origin: Cell::new(None),
        });
        host.render_full();
        host.session.editor_mut().sync(SyncReason::Load);
        host.write_hidden_field();
        events::bind_all(&host);
        host.refresh_toolbar();
        debug!(container = container_id, "editor ready");
        Ok(host)
    }

    /// Rebuilds the whole surface from the document.
    fn render_full(&self) {
        let html = self.session.editor().surface_html();
        self.surface.set_inner_html(&html);
        {
            let mut diff = self.diff.borrow_mut();
            diff.reset();
            let editor = self.session.editor();
            diff.incremental_diff(editor.document());
        }
        self.session.editor_mut().clear_dirty();
        self.finish_render();
    }

    /// Patches only the blocks that changed since the last render.
    fn render(&self) {
        let patches = {
            let editor = self.session.editor();
            self.diff.borrow_mut().incremental_diff(editor.document())
        };
        if !patches.is_empty() {
            let editor = self.session.editor();
            if let Err(err) = dom::apply_patches(&self.dom, &self.surface, editor.document(), &patches) {
                warn!(?err, "patching the surface failed, rebuilding");
                drop(editor);
                self.render_full();
                return;
            }
        }
        self.session.editor_mut().clear_dirty();
        self.finish_render();
    }

    fn finish_render(&self) {
        let empty = self.session.editor().is_empty();
        let _ = self.surface.class_list().toggle_with_force(EMPTY_CLASS, empty);
        self.mark_selected_media();
        self.write_hidden_field();
        let notifications = self.session.editor_mut().take_notifications();
        for notification in &notifications {
            rte_core::DialogSurface::notify(&mut *self.session.surface_mut(), notification);
        }
    }

    fn write_hidden_field(&self) {
        let editor = self.session.editor();
        if let Some(field) = self.dom.get_element_by_id(&editor.config().hidden_field_id) {
            let _ = js_sys::Reflect::set(&field, &"value".into(), &editor.hidden_value().into());
        }
    }

    fn mark_selected_media(&self) {
        if let Ok(marked) = self.surface.query_selector_all(&format!(".{SELECTED_CLASS}")) {
            for i in 0..marked.length() {
                if let Some(el) = marked.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                    let _ = el.class_list().remove_1(SELECTED_CLASS);
                }
            }
        }
        let selected = self.session.editor().selected_media();
        if let Some(el) = selected.and_then(|media| dom::block_element(&self.surface, media.id)) {
            let _ = el.class_list().add_1(SELECTED_CLASS);
        }
    }

    /// Pulls the live DOM selection into the editor.
    fn capture_selection(&self) {
        let live = {
            let editor = self.session.editor();
            dom::read_selection(&self.surface, editor.document())
        };
        if live.is_some() {
            self.session.editor_mut().set_selection(live);
        }
    }

    fn place_caret(&self) {
        let focused = self.dom.active_element().is_some_and(|el| el.is_same_node(Some(self.surface.as_ref())));
        if !focused {
            return;
        }
        let selection = self.session.editor().selection();
        if let Some(selection) = selection {
            if let Err(err) = dom::write_selection(&self.surface, selection) {
                debug!(?err, "caret placement failed");
            }
        }
    }

    fn refresh_toolbar(&self) {
        let changes = {
            let editor = self.session.editor();
            self.dispatcher.borrow_mut().refresh(&editor)
        };
        self.apply_toggles(&changes);
    }

    fn apply_toggles(&self, changes: &[(ToggleCommand, bool)]) {
        for (command, active) in changes {
            let selector = format!("[data-command=\"{}\"]", command.name());
            if let Ok(Some(button)) = self.toolbar.query_selector(&selector) {
                let _ = button.class_list().toggle_with_force("active", *active);
            }
        }
    }

    /// Re-renders after a model edit and moves the caret to match.
    fn after_edit(&self) {
        self.render();
        self.place_caret();
        self.refresh_toolbar();
    }

    fn handle_dispatched(self: &Rc<Self>, dispatched: Dispatched) {
        match dispatched {
            Dispatched::Applied(changes) => {
                self.render();
                self.place_caret();
                self.apply_toggles(&changes);
            }
            Dispatched::OpenDialog(kind) => self.open_dialog(kind, None),
            Dispatched::Fullscreen(on) => {
                let _ = self.container.class_list().toggle_with_force(FULLSCREEN_CLASS, on);
            }
        }
    }

    fn open_dialog(self: &Rc<Self>, kind: MediaKind, existing: Option<uuid::Uuid>) {
        let scheduled = self.session.open_dialog(kind, existing);
        self.schedule(scheduled);
    }

    fn close_dialog(self: &Rc<Self>, kind: MediaKind) {
        let scheduled = self.session.close_dialog(kind);
        self.schedule(scheduled);
    }

    fn confirm(self: &Rc<Self>, kind: MediaKind) {
        let host = Rc::clone(self);
        wasm_bindgen_futures::spawn_local(async move {
            match host.session.confirm(kind).await {
                rte_core::ConfirmOutcome::Inserted { id, scheduled } => {
                    debug!(%kind, ?id, "dialog confirmed");
                    host.after_edit();
                    host.schedule(scheduled);
                }
                outcome => {
                    debug!(%kind, ?outcome, "dialog confirm did not insert");
                    host.finish_render();
                }
            }
        });
    }

    /// Runs deferred dialog work on timers.
    fn schedule(self: &Rc<Self>, tasks: Vec<Scheduled>) {
        for Scheduled { delay, task } in tasks {
            let weak = Rc::downgrade(self);
            let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
            Timeout::new(millis, move || {
                if let Some(host) = weak.upgrade() {
                    host.session.run_deferred(task);
                }
            })
            .forget();
        }
    }

    fn announce_ready(self: &Rc<Self>) {
        let init = CustomEventInit::new();
        init.set_detail(&ready_detail(WasmEditor { host: Some(Rc::clone(self)) }));
        match CustomEvent::new_with_event_init_dict(READY_EVENT, &init) {
            Ok(event) => {
                let _ = self.dom.dispatch_event(&event);
            }
            Err(err) => warn!(?err, "ready event not dispatched"),
        }
    }
}

fn ready_detail(instance: WasmEditor) -> JsValue {
    let detail = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&detail, &"instance".into(), &JsValue::from(instance));
    detail.into()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stats {
    char_count: usize,
    block_count: usize,
    can_undo: bool,
    can_redo: bool,
}

/// The editor handle exposed to page scripts. A handle whose mount failed
/// stays inert: every call is a no-op and `isReady` is false.
#[wasm_bindgen]
pub struct WasmEditor {
    host: Option<Rc<Host>>,
}

#[wasm_bindgen]
impl WasmEditor {
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, options: JsValue) -> WasmEditor {
        match Host::mount(container_id, options) {
            Ok(host) => {
                host.announce_ready();
                WasmEditor { host: Some(host) }
            }
            Err(err) => {
                error!(container = container_id, ?err, "rich editor failed to start");
                WasmEditor { host: None }
            }
        }
    }

    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.host.is_some()
    }

    #[wasm_bindgen(js_name = getContent)]
    pub fn get_content(&self) -> String {
        self.host.as_ref().map(|h| h.session.editor().content()).unwrap_or_default()
    }

    #[wasm_bindgen(js_name = setContent)]
    pub fn set_content(&self, markup: &str) {
        if let Some(host) = &self.host {
            host.session.editor_mut().set_content(markup);
            host.render_full();
            host.refresh_toolbar();
        }
    }

    #[wasm_bindgen(js_name = syncContent)]
    pub fn sync_content(&self) {
        if let Some(host) = &self.host {
            host.session.editor_mut().sync(SyncReason::Command);
            host.write_hidden_field();
        }
    }

    #[wasm_bindgen(js_name = getText)]
    pub fn get_text(&self) -> String {
        self.host.as_ref().map(|h| h.session.editor().text()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Some(host) = &self.host {
            host.session.editor_mut().clear();
            host.render_full();
            host.refresh_toolbar();
        }
    }

    pub fn focus(&self) {
        if let Some(host) = &self.host {
            let _ = host.surface.focus();
            host.place_caret();
        }
    }

    /// Runs a toolbar command by its `data-command` name.
    pub fn exec(&self, name: &str, value: Option<String>) -> bool {
        let Some(host) = &self.host else {
            return false;
        };
        host.capture_selection();
        let dispatched = {
            let mut editor = host.session.editor_mut();
            host.dispatcher.borrow_mut().dispatch_named(name, value.as_deref(), &mut editor)
        };
        match dispatched {
            Some(dispatched) => {
                host.handle_dispatched(dispatched);
                true
            }
            None => false,
        }
    }

    pub fn undo(&self) -> bool {
        let Some(host) = &self.host else {
            return false;
        };
        let undone = host.session.editor_mut().undo();
        host.after_edit();
        undone
    }

    pub fn redo(&self) -> bool {
        let Some(host) = &self.host else {
            return false;
        };
        let redone = host.session.editor_mut().redo();
        host.after_edit();
        redone
    }

    #[wasm_bindgen(js_name = openDialog)]
    pub fn open_dialog(&self, kind: &str) -> bool {
        let (Some(host), Some(kind)) = (&self.host, MediaKind::parse(kind)) else {
            return false;
        };
        host.capture_selection();
        host.open_dialog(kind, None);
        true
    }

    #[wasm_bindgen(js_name = closeDialog)]
    pub fn close_dialog(&self, kind: &str) {
        if let (Some(host), Some(kind)) = (&self.host, MediaKind::parse(kind)) {
            host.close_dialog(kind);
        }
    }

    #[wasm_bindgen(js_name = confirmDialog)]
    pub fn confirm_dialog(&self, kind: &str) {
        if let (Some(host), Some(kind)) = (&self.host, MediaKind::parse(kind)) {
            host.confirm(kind);
        }
    }

    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> JsValue {
        let Some(host) = &self.host else {
            return JsValue::NULL;
        };
        let editor = host.session.editor();
        let stats = Stats {
            char_count: editor.text().chars().count(),
            block_count: editor.document().blocks.len(),
            can_undo: editor.history().can_undo(),
            can_redo: editor.history().can_redo(),
        };
        serde_wasm_bindgen::to_value(&stats).unwrap_or(JsValue::NULL)
    }

    /// Detaches every listener. The handle stays usable for reads.
    pub fn destroy(&self) {
        if let Some(host) = &self.host {
            host.listeners.borrow_mut().clear();
            debug!("editor listeners detached");
        }
    }
}
