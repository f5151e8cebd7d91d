//! Host modals for the link, image, table and video dialogs.

use gloo_timers::callback::Timeout;
use js_sys::{Function, Reflect};
use rte_core::{
    DialogForm, DialogSurface, ImageForm, LinkForm, MediaAlign, MediaKind, Notification, NotificationLevel,
    PendingUpload, Preview, TableForm, TableStyle, VideoForm,
};
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlElement, HtmlInputElement};

const NOTIFICATION_LIFETIME_MS: u32 = 3_000;

const VALIDATION_CLASS: &str = "rte-validation";

pub fn modal_id(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Link => "linkModal",
        MediaKind::Image => "imageModal",
        MediaKind::Table => "tableModal",
        MediaKind::Video => "videoModal",
    }
}

pub fn confirm_button_id(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Link => "insertLinkBtn",
        MediaKind::Image => "insertImageBtn",
        MediaKind::Table => "insertTableBtn",
        MediaKind::Video => "insertVideoBtn",
    }
}

fn first_input_id(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Link => "linkText",
        MediaKind::Image => "imageUrl",
        MediaKind::Table => "tableRows",
        MediaKind::Video => "videoUrl",
    }
}

fn style_value(style: TableStyle) -> &'static str {
    match style {
        TableStyle::Default => "default",
        TableStyle::Striped => "striped",
        TableStyle::Bordered => "bordered",
        TableStyle::Hover => "hover",
    }
}

fn level_name(level: NotificationLevel) -> &'static str {
    match level {
        NotificationLevel::Info => "info",
        NotificationLevel::Success => "success",
        NotificationLevel::Error => "error",
    }
}

/// The page's modal elements. Uses the page's modal component when one is
/// loaded and toggles classes directly otherwise.
pub struct DomDialogs {
    dom: web_sys::Document,
    chosen_file: Option<PendingUpload>,
    file_preview: Option<String>,
}

impl DomDialogs {
    pub fn new(dom: web_sys::Document) -> Self {
        Self { dom, chosen_file: None, file_preview: None }
    }

    fn element(&self, id: &str) -> Option<Element> {
        self.dom.get_element_by_id(id)
    }

    fn input(&self, id: &str) -> Option<HtmlInputElement> {
        self.element(id).and_then(|el| el.dyn_into().ok())
    }

    fn value(&self, id: &str) -> String {
        self.input(id).map(|i| i.value()).unwrap_or_default()
    }

    fn checked(&self, id: &str) -> bool {
        self.input(id).is_some_and(|i| i.checked())
    }

    fn radio(&self, name: &str) -> Option<String> {
        let selector = format!("input[name=\"{name}\"]:checked");
        let el = self.dom.query_selector(&selector).ok().flatten()?;
        el.dyn_into::<HtmlInputElement>().ok().map(|i| i.value())
    }

    fn set_value(&self, id: &str, value: &str) {
        if let Some(input) = self.input(id) {
            input.set_value(value);
        }
    }

    fn set_checked(&self, id: &str, checked: bool) {
        if let Some(input) = self.input(id) {
            input.set_checked(checked);
        }
    }

    fn set_radio(&self, name: &str, value: &str) {
        let selector = format!("input[name=\"{name}\"][value=\"{value}\"]");
        let input = self.dom.query_selector(&selector).ok().flatten();
        if let Some(input) = input.and_then(|el| el.dyn_into::<HtmlInputElement>().ok()) {
            input.set_checked(true);
        }
    }

    /// Current field values of a dialog.
    pub fn read_form(&self, kind: MediaKind) -> DialogForm {
        match kind {
            MediaKind::Link => DialogForm::Link(LinkForm {
                text: self.value("linkText"),
                url: self.value("linkUrl"),
                new_tab: self.checked("linkTarget"),
            }),
            MediaKind::Image => DialogForm::Image(ImageForm {
                file: self.chosen_file.clone(),
                url: self.value("imageUrl"),
                alt: self.value("imageAlt"),
                caption: self.value("imageCaption"),
                width: self.value("imageWidth"),
                height: self.value("imageHeight"),
                align: self.radio("imageAlign").and_then(|v| MediaAlign::parse(&v)).unwrap_or(MediaAlign::Left),
            }),
            MediaKind::Table => DialogForm::Table(TableForm {
                rows: self.value("tableRows"),
                cols: self.value("tableCols"),
                header: self.checked("tableHeader"),
                style: self.radio("tableStyle").map(|v| TableStyle::parse(&v)).unwrap_or_default(),
                responsive: self.checked("tableResponsive"),
            }),
            MediaKind::Video => DialogForm::Video(VideoForm {
                url: self.value("videoUrl"),
                width: self.value("videoWidth"),
                height: self.value("videoHeight"),
                align: self.radio("videoAlign").and_then(|v| MediaAlign::parse(&v)).unwrap_or(MediaAlign::Center),
                responsive: self.checked("videoResponsive"),
            }),
        }
    }

    /// Stores the file picked in the image dialog. `None` clears it.
    pub fn choose_file(&mut self, file: Option<PendingUpload>, preview_url: Option<String>) {
        self.release_preview();
        self.chosen_file = file;
        self.file_preview = preview_url;
    }

    fn release_preview(&mut self) {
        if let Some(url) = self.file_preview.take() {
            let _ = web_sys::Url::revoke_object_url(&url);
        }
    }

    /// `bootstrap.Modal.getOrCreateInstance(el)`, when the page loaded it.
    fn native_modal(&self, el: &Element) -> Option<JsValue> {
        let window = web_sys::window()?;
        let bootstrap = Reflect::get(&window, &"bootstrap".into()).ok().filter(|v| !v.is_undefined())?;
        let modal = Reflect::get(&bootstrap, &"Modal".into()).ok().filter(|v| !v.is_undefined())?;
        let factory: Function = Reflect::get(&modal, &"getOrCreateInstance".into()).ok()?.dyn_into().ok()?;
        factory.call1(&modal, el).ok()
    }

    fn call_modal(&self, kind: MediaKind, method: &str) -> bool {
        let Some(el) = self.element(modal_id(kind)) else {
            warn!(%kind, "modal element missing");
            return false;
        };
        let Some(instance) = self.native_modal(&el) else {
            return false;
        };
        Reflect::get(&instance, &method.into())
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .is_some_and(|f| f.call0(&instance).is_ok())
    }

    fn validation_slot(&self, kind: MediaKind) -> Option<Element> {
        let modal = self.element(modal_id(kind))?;
        if let Some(existing) = modal.query_selector(&format!(".{VALIDATION_CLASS}")).ok().flatten() {
            return Some(existing);
        }
        let body = modal.query_selector(".modal-body").ok().flatten().unwrap_or(modal);
        let slot = self.dom.create_element("div").ok()?;
        slot.set_class_name(&format!("alert alert-danger {VALIDATION_CLASS}"));
        slot.set_attribute("role", "alert").ok()?;
        body.append_with_node_1(&slot).ok()?;
        Some(slot)
    }
}

impl DialogSurface for DomDialogs {
    fn show(&mut self, kind: MediaKind) {
        if self.call_modal(kind, "show") {
            return;
        }
        let Some(el) = self.element(modal_id(kind)) else {
            return;
        };
        let _ = el.class_list().add_1("show");
        if let Some(html) = el.dyn_ref::<HtmlElement>() {
            let _ = html.style().set_property("display", "block");
        }
        let _ = el.remove_attribute("aria-hidden");
        let _ = el.set_attribute("aria-modal", "true");
        if let Some(body) = self.dom.body() {
            let _ = body.class_list().add_1("modal-open");
        }
    }

    fn hide(&mut self, kind: MediaKind) {
        if !self.call_modal(kind, "hide") {
            self.strip_show_state(kind);
            self.clear_backdrop();
        }
    }

    fn strip_show_state(&mut self, kind: MediaKind) {
        let Some(el) = self.element(modal_id(kind)) else {
            return;
        };
        let _ = el.class_list().remove_1("show");
        if let Some(html) = el.dyn_ref::<HtmlElement>() {
            let _ = html.style().set_property("display", "none");
        }
        let _ = el.set_attribute("aria-hidden", "true");
        let _ = el.remove_attribute("aria-modal");
    }

    fn clear_backdrop(&mut self) {
        if let Ok(backdrops) = self.dom.query_selector_all(".modal-backdrop") {
            for i in 0..backdrops.length() {
                if let Some(node) = backdrops.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                    node.remove();
                }
            }
        }
        if let Some(body) = self.dom.body() {
            let _ = body.class_list().remove_1("modal-open");
            let style = body.style();
            let _ = style.remove_property("overflow");
            let _ = style.remove_property("padding-right");
        }
    }

    fn focus_first_input(&mut self, kind: MediaKind) {
        if let Some(input) = self.input(first_input_id(kind)) {
            let _ = input.focus();
        }
    }

    fn render_form(&mut self, form: &DialogForm) {
        match form {
            DialogForm::Link(link) => {
                self.set_value("linkText", &link.text);
                self.set_value("linkUrl", &link.url);
                self.set_checked("linkTarget", link.new_tab);
            }
            DialogForm::Image(image) => {
                if image.file.is_none() {
                    self.choose_file(None, None);
                    self.set_value("imageFile", "");
                }
                self.set_value("imageUrl", &image.url);
                self.set_value("imageAlt", &image.alt);
                self.set_value("imageCaption", &image.caption);
                self.set_value("imageWidth", &image.width);
                self.set_value("imageHeight", &image.height);
                self.set_radio("imageAlign", image.align.as_str());
            }
            DialogForm::Table(table) => {
                self.set_value("tableRows", &table.rows);
                self.set_value("tableCols", &table.cols);
                self.set_checked("tableHeader", table.header);
                self.set_checked("tableResponsive", table.responsive);
                self.set_radio("tableStyle", style_value(table.style));
            }
            DialogForm::Video(video) => {
                self.set_value("videoUrl", &video.url);
                self.set_value("videoWidth", &video.width);
                self.set_value("videoHeight", &video.height);
                self.set_checked("videoResponsive", video.responsive);
                self.set_radio("videoAlign", video.align.as_str());
            }
        }
    }

    fn render_preview(&mut self, kind: MediaKind, preview: Option<&Preview>) {
        match kind {
            MediaKind::Link => {}
            MediaKind::Table => {
                if let Some(el) = self.element("tablePreview") {
                    match preview {
                        Some(Preview::Table(markup)) => el.set_inner_html(markup),
                        _ => el.set_inner_html(""),
                    }
                }
            }
            MediaKind::Video => {
                if let Some(el) = self.element("videoPreview") {
                    match preview {
                        Some(Preview::Video { embed_url, .. }) => el.set_inner_html(&format!(
                            "<div class=\"ratio ratio-16x9\"><iframe src=\"{}\" frameborder=\"0\" allowfullscreen></iframe></div>",
                            html_escape::encode_double_quoted_attribute(embed_url)
                        )),
                        _ => el.set_inner_html(""),
                    }
                }
            }
            MediaKind::Image => {
                let src = match preview {
                    Some(Preview::ImageFile(_)) => self.file_preview.clone(),
                    Some(Preview::ImageUrl(url)) => Some(url.clone()),
                    _ => None,
                };
                if let Some(img) = self.element("previewImg") {
                    let _ = img.set_attribute("src", src.as_deref().unwrap_or(""));
                }
                if let Some(wrapper) = self.element("imagePreview").and_then(|el| el.dyn_into::<HtmlElement>().ok()) {
                    let display = if src.is_some() { "block" } else { "none" };
                    let _ = wrapper.style().set_property("display", display);
                }
            }
        }
    }

    fn set_confirm_state(&mut self, kind: MediaKind, enabled: bool, processing: bool) {
        let Some(button) = self.element(confirm_button_id(kind)) else {
            return;
        };
        if enabled && !processing {
            let _ = button.remove_attribute("disabled");
        } else {
            let _ = button.set_attribute("disabled", "");
        }
        if processing {
            if button.get_attribute("data-rte-label").is_none() {
                let _ = button.set_attribute("data-rte-label", &button.inner_html());
            }
            button.set_inner_html("<span class=\"spinner-border spinner-border-sm\" role=\"status\"></span> Processing...");
        } else if let Some(label) = button.get_attribute("data-rte-label") {
            button.set_inner_html(&label);
            let _ = button.remove_attribute("data-rte-label");
        }
    }

    fn show_validation(&mut self, kind: MediaKind, message: Option<&str>) {
        match message {
            Some(message) => {
                if let Some(slot) = self.validation_slot(kind) {
                    slot.set_text_content(Some(message));
                }
            }
            None => {
                if let Some(modal) = self.element(modal_id(kind)) {
                    if let Some(slot) = modal.query_selector(&format!(".{VALIDATION_CLASS}")).ok().flatten() {
                        slot.remove();
                    }
                }
            }
        }
    }

    fn notify(&mut self, notification: &Notification) {
        let Some(body) = self.dom.body() else {
            return;
        };
        let Ok(el) = self.dom.create_element("div") else {
            return;
        };
        el.set_class_name(&format!("editor-notification editor-notification-{}", level_name(notification.level)));
        let _ = el.set_attribute(
            "style",
            "position:fixed;top:20px;right:20px;z-index:9999;padding:10px 16px;border-radius:4px;",
        );
        el.set_text_content(Some(&notification.message));
        if body.append_with_node_1(&el).is_err() {
            return;
        }
        debug!(message = %notification.message, "notification shown");
        Timeout::new(NOTIFICATION_LIFETIME_MS, move || el.remove()).forget();
    }
}

impl Drop for DomDialogs {
    fn drop(&mut self) {
        self.release_preview();
    }
}
