//! Listener wiring for the surface, toolbar, dialogs and page.
//!
//! Every listener goes through the host's registry under a (target, event)
//! key, so mounting twice or re-entering a drag never stacks handlers.

use crate::dialogs::{confirm_button_id, modal_id};
use crate::{dom, Host};
use gloo_events::{EventListener, EventListenerOptions};
use gloo_timers::callback::Timeout;
use rte_core::{
    BindingKey, EditorCommand, FormatCommand, KeyChord, Mark, MediaKind, PendingUpload, Size, SyncReason, EDIT_ATTR,
};
use std::rc::Rc;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{ClipboardEvent, Element, Event, EventTarget, HtmlInputElement, InputEvent, KeyboardEvent, MouseEvent};

const DRAG_TARGET: &str = "drag";

fn bind(
    host: &Rc<Host>,
    name: &str,
    target: &EventTarget,
    event: &'static str,
    handler: impl Fn(&Rc<Host>, &Event) + 'static,
) {
    let weak = Rc::downgrade(host);
    let listener = EventListener::new_with_options(target, event, EventListenerOptions::enable_prevent_default(), move |e| {
        if let Some(host) = weak.upgrade() {
            handler(&host, e);
        }
    });
    host.listeners.borrow_mut().bind(BindingKey::new(name, event), listener);
}

fn target_element(event: &Event) -> Option<Element> {
    let target = event.target()?;
    match target.dyn_into::<Element>() {
        Ok(el) => Some(el),
        Err(other) => other.dyn_into::<web_sys::Node>().ok()?.parent_element(),
    }
}

pub(crate) fn bind_all(host: &Rc<Host>) {
    bind_surface(host);
    bind_toolbar(host);
    bind_dialogs(host);
    bind_page(host);
    debug!(listeners = host.listeners.borrow().len(), "editor listeners bound");
}

fn bind_surface(host: &Rc<Host>) {
    let surface: EventTarget = host.surface.clone().into();
    bind(host, "surface", &surface, "beforeinput", on_before_input);
    bind(host, "surface", &surface, "compositionend", |host, event| {
        let Some(data) = event.dyn_ref::<web_sys::CompositionEvent>().and_then(|e| e.data()) else {
            return;
        };
        host.capture_selection();
        host.session.editor_mut().insert_text(&data);
        host.render_full();
        host.place_caret();
    });
    bind(host, "surface", &surface, "keydown", |host, event| {
        let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        let chord = KeyChord {
            key: key.key(),
            ctrl: key.ctrl_key(),
            meta: key.meta_key(),
            shift: key.shift_key(),
            alt: key.alt_key(),
        };
        host.capture_selection();
        let dispatched = {
            let mut editor = host.session.editor_mut();
            host.dispatcher.borrow_mut().handle_key(&chord, &mut editor)
        };
        if let Some(dispatched) = dispatched {
            event.prevent_default();
            host.handle_dispatched(dispatched);
        }
    });
    bind(host, "surface", &surface, "paste", |host, event| {
        let text = event
            .dyn_ref::<ClipboardEvent>()
            .and_then(ClipboardEvent::clipboard_data)
            .and_then(|data| data.get_data("text/plain").ok());
        let Some(text) = text else {
            return;
        };
        event.prevent_default();
        host.capture_selection();
        host.session.editor_mut().paste_text(&text);
        host.after_edit();
    });
    bind(host, "surface", &surface, "click", on_surface_click);
    bind(host, "surface", &surface, "mousedown", on_resize_start);
    bind(host, "surface", &surface, "blur", |host, _| {
        host.session.editor_mut().sync(SyncReason::Blur);
        host.write_hidden_field();
    });
}

fn on_before_input(host: &Rc<Host>, event: &Event) {
    let Some(input) = event.dyn_ref::<InputEvent>() else {
        return;
    };
    let input_type = input.input_type();
    // word and line deletes remove the browser's target range
    let ranged = matches!(
        input_type.as_str(),
        "deleteWordBackward"
            | "deleteSoftLineBackward"
            | "deleteHardLineBackward"
            | "deleteWordForward"
            | "deleteSoftLineForward"
            | "deleteHardLineForward"
    );
    let command = match input_type.as_str() {
        "insertText" | "insertReplacementText" => input.data().map(EditorCommand::InsertText),
        "insertParagraph" => Some(EditorCommand::SplitBlock),
        "insertLineBreak" => Some(EditorCommand::LineBreak),
        "deleteContentBackward" | "deleteWordBackward" | "deleteSoftLineBackward" | "deleteHardLineBackward"
        | "deleteByCut" | "deleteContent" => Some(EditorCommand::DeleteBackward),
        "deleteContentForward" | "deleteWordForward" | "deleteSoftLineForward" | "deleteHardLineForward" => {
            Some(EditorCommand::DeleteForward)
        }
        "historyUndo" => Some(EditorCommand::Undo),
        "historyRedo" => Some(EditorCommand::Redo),
        "formatBold" => Some(EditorCommand::Format(FormatCommand::ToggleMark(Mark::Bold))),
        "formatItalic" => Some(EditorCommand::Format(FormatCommand::ToggleMark(Mark::Italic))),
        "formatUnderline" => Some(EditorCommand::Format(FormatCommand::ToggleMark(Mark::Underline))),
        "formatStrikeThrough" => Some(EditorCommand::Format(FormatCommand::ToggleMark(Mark::Strikethrough))),
        // composition and clipboard input arrive through their own events
        _ => None,
    };
    let Some(command) = command else {
        return;
    };
    event.prevent_default();
    host.capture_selection();
    {
        let mut editor = host.session.editor_mut();
        let range = if ranged { dom::target_range(&host.surface, editor.document(), input) } else { None };
        if let Some(range) = range {
            editor.set_selection(Some(range));
        }
        editor.execute(command);
    }
    host.after_edit();
}

fn on_surface_click(host: &Rc<Host>, event: &Event) {
    let Some(target) = target_element(event) else {
        return;
    };
    if let Ok(Some(button)) = target.closest(&format!("[{EDIT_ATTR}]")) {
        let kind = button.get_attribute(EDIT_ATTR).and_then(|raw| MediaKind::parse(&raw));
        let id = dom::top_block_id(&host.surface, &button);
        if let (Some(kind), Some(id)) = (kind, id) {
            event.prevent_default();
            host.capture_selection();
            host.open_dialog(kind, Some(id));
        }
        return;
    }
    let clicked = dom::top_block_id(&host.surface, &target);
    {
        let mut editor = host.session.editor_mut();
        let is_media = clicked
            .and_then(|id| editor.document().block(id))
            .and_then(rte_core::Block::media_kind)
            .is_some_and(|kind| kind != MediaKind::Link);
        match clicked {
            Some(id) if is_media => {
                editor.select_media(id);
            }
            _ => {
                editor.deselect_media();
            }
        }
    }
    host.mark_selected_media();
}

fn media_element(host: &Host, id: uuid::Uuid) -> Option<Element> {
    let wrapper = dom::block_element(&host.surface, id)?;
    Some(wrapper.query_selector("img, iframe").ok().flatten().unwrap_or(wrapper))
}

fn on_resize_start(host: &Rc<Host>, event: &Event) {
    let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
        return;
    };
    let Some(handle) = target_element(event).and_then(|t| t.closest(".image-resize-handle").ok().flatten()) else {
        return;
    };
    let Some(id) = dom::top_block_id(&host.surface, &handle) else {
        return;
    };
    let Some(media) = media_element(host, id) else {
        return;
    };
    let rect = media.get_bounding_client_rect();
    let surface_width = f64::from(host.surface.client_width());
    let started = host.session.editor_mut().begin_resize(id, Size::new(rect.width(), rect.height()), surface_width);
    if !started {
        return;
    }
    event.prevent_default();
    host.drag_origin.set(Some((f64::from(mouse.client_x()), f64::from(mouse.client_y()))));
    host.mark_selected_media();

    let document: EventTarget = host.dom.clone().into();
    bind(host, DRAG_TARGET, &document, "mousemove", move |host, event| {
        let (Some(mouse), Some((x0, y0))) = (event.dyn_ref::<MouseEvent>(), host.drag_origin.get()) else {
            return;
        };
        let dx = f64::from(mouse.client_x()) - x0;
        let dy = f64::from(mouse.client_y()) - y0;
        let Some(size) = host.session.editor_mut().drag_resize(dx, dy) else {
            return;
        };
        if let Some(media) = media_element(host, id).and_then(|el| el.dyn_into::<web_sys::HtmlElement>().ok()) {
            let style = media.style();
            let _ = style.set_property("width", &format!("{}px", size.width.round()));
            let _ = style.set_property("height", &format!("{}px", size.height.round()));
        }
    });
    bind(host, DRAG_TARGET, &document, "mouseup", |host, _| {
        host.drag_origin.set(None);
        let committed = host.session.editor_mut().end_resize();
        match committed {
            Some((width, height)) => {
                debug!(width, height, "resize committed");
                host.after_edit();
            }
            None => host.render_full(),
        }
        // a listener cannot be dropped while it is running
        let weak = Rc::downgrade(host);
        Timeout::new(0, move || {
            if let Some(host) = weak.upgrade() {
                let mut listeners = host.listeners.borrow_mut();
                listeners.unbind(&BindingKey::new(DRAG_TARGET, "mousemove"));
                listeners.unbind(&BindingKey::new(DRAG_TARGET, "mouseup"));
            }
        })
        .forget();
    });
}

fn bind_toolbar(host: &Rc<Host>) {
    let toolbar: EventTarget = host.toolbar.clone().into();
    bind(host, "toolbar", &toolbar, "mousedown", |_, event| {
        let on_button = target_element(event).and_then(|t| t.closest("button").ok().flatten()).is_some();
        if on_button {
            event.prevent_default();
        }
    });
    bind(host, "toolbar", &toolbar, "click", |host, event| {
        let Some(button) = target_element(event).and_then(|t| t.closest("button[data-command]").ok().flatten()) else {
            return;
        };
        event.prevent_default();
        run_toolbar_command(host, &button, button.get_attribute("data-value"));
    });
    bind(host, "toolbar", &toolbar, "change", |host, event| {
        let Some(control) = target_element(event).filter(|t| t.has_attribute("data-command")) else {
            return;
        };
        let value = js_sys::Reflect::get(&control, &"value".into()).ok().and_then(|v| v.as_string());
        run_toolbar_command(host, &control, value);
    });
}

fn run_toolbar_command(host: &Rc<Host>, control: &Element, value: Option<String>) {
    let Some(name) = control.get_attribute("data-command") else {
        return;
    };
    host.capture_selection();
    let dispatched = {
        let mut editor = host.session.editor_mut();
        host.dispatcher.borrow_mut().dispatch_named(&name, value.as_deref(), &mut editor)
    };
    if let Some(dispatched) = dispatched {
        host.handle_dispatched(dispatched);
    }
}

fn refresh_form(host: &Rc<Host>, kind: MediaKind) {
    let form = host.session.surface().read_form(kind);
    host.session.update_form(form);
}

fn on_image_file(host: &Rc<Host>, input: HtmlInputElement) {
    let Some(file) = input.files().and_then(|list| list.get(0)) else {
        host.session.surface_mut().choose_file(None, None);
        refresh_form(host, MediaKind::Image);
        return;
    };
    let weak = Rc::downgrade(host);
    wasm_bindgen_futures::spawn_local(async move {
        let buffer = match JsFuture::from(file.array_buffer()).await {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(?err, "reading the chosen image failed");
                return;
            }
        };
        let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
        let mut upload = PendingUpload::new(file.name(), bytes);
        let content_type = file.type_();
        if !content_type.is_empty() {
            upload = upload.with_content_type(content_type);
        }
        let preview = web_sys::Url::create_object_url_with_blob(&file).ok();
        let Some(host) = weak.upgrade() else {
            return;
        };
        host.session.surface_mut().choose_file(Some(upload), preview);
        refresh_form(&host, MediaKind::Image);
    });
}

fn bind_dialogs(host: &Rc<Host>) {
    for kind in MediaKind::ALL {
        let Some(modal) = host.dom.get_element_by_id(modal_id(kind)) else {
            debug!(%kind, "no modal on the page");
            continue;
        };
        let modal: EventTarget = modal.into();
        let name = modal_id(kind);
        bind(host, name, &modal, "input", move |host, event| {
            let is_file = target_element(event).is_some_and(|t| t.id() == "imageFile");
            if !is_file {
                refresh_form(host, kind);
            }
        });
        bind(host, name, &modal, "change", move |host, event| {
            let file_input = target_element(event)
                .filter(|t| t.id() == "imageFile")
                .and_then(|t| t.dyn_into::<HtmlInputElement>().ok());
            match file_input {
                Some(input) => on_image_file(host, input),
                None => refresh_form(host, kind),
            }
        });
        bind(host, name, &modal, "hidden.bs.modal", move |host, _| {
            // may fire synchronously from inside a hide call
            let weak = Rc::downgrade(host);
            Timeout::new(0, move || {
                if let Some(host) = weak.upgrade() {
                    host.session.dialog_hidden(kind);
                }
            })
            .forget();
        });
        if let Some(button) = host.dom.get_element_by_id(confirm_button_id(kind)) {
            let button: EventTarget = button.into();
            bind(host, confirm_button_id(kind), &button, "click", move |host, event| {
                event.prevent_default();
                host.confirm(kind);
            });
        }
    }
}

fn bind_page(host: &Rc<Host>) {
    let document: EventTarget = host.dom.clone().into();
    bind(host, "document", &document, "selectionchange", |host, _| {
        if host.drag_origin.get().is_some() {
            return;
        }
        host.capture_selection();
        host.refresh_toolbar();
    });
    bind(host, "document", &document, "keydown", |host, event| {
        let is_escape = event.dyn_ref::<KeyboardEvent>().is_some_and(|k| k.key() == "Escape");
        if !is_escape {
            return;
        }
        if let Some((kind, scheduled)) = host.session.escape() {
            debug!(%kind, "dialog closed by escape");
            host.schedule(scheduled);
        }
    });
    if let Ok(Some(form)) = host.container.closest("form") {
        let form: EventTarget = form.into();
        bind(host, "form", &form, "submit", |host, _| {
            host.session.editor_mut().sync(SyncReason::Submit);
            host.write_hidden_field();
        });
    }
    if let Some(window) = web_sys::window() {
        let window: EventTarget = window.into();
        bind(host, "window", &window, "beforeunload", |host, _| {
            host.session.editor_mut().sync(SyncReason::Unload);
            host.write_hidden_field();
        });
    }
}
