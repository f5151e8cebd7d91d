use crate::{
    extract_video_id, normalize, unwrap_links, Block, Cell, Document, Inline, ListItem, MediaAlign, MediaLayout,
    SharedStr, Style, TableStyle, TextAlign, TextKind, DEFAULT_VIDEO_SIZE, MAX_INDENT,
};
use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

pub const EMPTY_BLOCK_MARKUP: &str = "<p><br></p>";
pub const YOUTUBE_EMBED_BASE: &str = "https://www.youtube.com/embed/";
pub const ID_ATTR: &str = "data-rte-id";
pub const EDIT_ATTR: &str = "data-rte-edit";
const INDENT_PX: u32 = 40;

/// Storage markup is what the hidden field carries. Surface markup adds node
/// ids and the resize/edit affordances used while editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlMode {
    Storage,
    Surface,
}

pub fn to_html(doc: &Document, mode: HtmlMode) -> String {
    let mut out = String::new();
    for block in &doc.blocks {
        write_block(block, mode, &mut out);
    }
    out
}

pub fn block_to_html(block: &Block, mode: HtmlMode) -> String {
    let mut out = String::new();
    write_block(block, mode, &mut out);
    out
}

/// Parses and re-serializes, which drops everything the model cannot carry:
/// scripts, event handler attributes and `javascript:` URLs.
pub fn sanitize_html(raw: &str) -> String {
    to_html(&parse_html(raw), HtmlMode::Storage)
}

fn attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&encode_double_quoted_attribute(value));
    out.push('"');
}

fn id_attr(out: &mut String, id: Uuid, mode: HtmlMode) {
    if mode == HtmlMode::Surface {
        attr(out, ID_ATTR, &id.to_string());
    }
}

fn block_style(align: TextAlign, indent: u8) -> String {
    let mut style = String::new();
    match align {
        TextAlign::Left => {}
        TextAlign::Center => style.push_str("text-align:center;"),
        TextAlign::Right => style.push_str("text-align:right;"),
        TextAlign::Justify => style.push_str("text-align:justify;"),
    }
    if indent > 0 {
        style.push_str(&format!("margin-left:{}px;", u32::from(indent) * INDENT_PX));
    }
    style
}

pub fn media_align_style(align: MediaAlign) -> &'static str {
    match align {
        MediaAlign::Left => "float:left;margin-right:15px;",
        MediaAlign::Center => "display:block;text-align:center;",
        MediaAlign::Right => "float:right;margin-left:15px;",
    }
}

fn media_align_class(align: MediaAlign) -> &'static str {
    match align {
        MediaAlign::Left => "float-left",
        MediaAlign::Center => "center",
        MediaAlign::Right => "float-right",
    }
}

fn text_tag(kind: TextKind) -> String {
    match kind {
        TextKind::Paragraph => "p".into(),
        TextKind::Heading(level) => format!("h{}", level.clamp(1, 6)),
        TextKind::Quote => "blockquote".into(),
        TextKind::Preformatted => "pre".into(),
    }
}

fn edit_button(out: &mut String, kind: &str) {
    out.push_str("<button type=\"button\" class=\"");
    out.push_str(kind);
    out.push_str("-edit-btn\" contenteditable=\"false\"");
    attr(out, EDIT_ATTR, kind);
    out.push_str(" title=\"Edit\">&#9998;</button>");
}

fn write_block(block: &Block, mode: HtmlMode, out: &mut String) {
    match block {
        Block::Text { id, kind, align, indent, content, .. } => {
            let tag = text_tag(*kind);
            out.push('<');
            out.push_str(&tag);
            let style = block_style(*align, *indent);
            if !style.is_empty() {
                attr(out, "style", &style);
            }
            id_attr(out, *id, mode);
            out.push('>');
            write_inlines(content, out);
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        Block::List { id, ordered, items, .. } => {
            let tag = if *ordered { "ol" } else { "ul" };
            out.push('<');
            out.push_str(tag);
            id_attr(out, *id, mode);
            out.push('>');
            for item in items {
                out.push_str("<li");
                if item.indent > 0 {
                    attr(out, "style", &block_style(TextAlign::Left, item.indent));
                }
                id_attr(out, item.id, mode);
                out.push('>');
                write_inlines(&item.content, out);
                out.push_str("</li>");
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Block::Rule { id, .. } => {
            out.push_str("<hr");
            id_attr(out, *id, mode);
            out.push('>');
        }
        Block::Table { id, rows, header, style, responsive, .. } => {
            out.push_str("<div class=\"table-main-wrapper\"");
            id_attr(out, *id, mode);
            out.push('>');
            if *responsive {
                out.push_str("<div class=\"table-responsive\">");
            }
            let mut class = String::from("table editor-table");
            if let Some(extra) = style.class_name() {
                class.push(' ');
                class.push_str(extra);
            }
            out.push_str("<table");
            attr(out, "class", &class);
            out.push('>');
            let body = if *header && !rows.is_empty() {
                out.push_str("<thead><tr>");
                for cell in &rows[0] {
                    write_cell(out, "th", cell, mode);
                }
                out.push_str("</tr></thead>");
                &rows[1..]
            } else {
                &rows[..]
            };
            out.push_str("<tbody>");
            for row in body {
                out.push_str("<tr>");
                for cell in row {
                    write_cell(out, "td", cell, mode);
                }
                out.push_str("</tr>");
            }
            out.push_str("</tbody></table>");
            if *responsive {
                out.push_str("</div>");
            }
            if mode == HtmlMode::Surface {
                edit_button(out, "table");
            }
            out.push_str("</div>");
        }
        Block::Image { id, src, alt, caption, layout, .. } => {
            let mut wrapper = media_align_style(layout.align).to_string();
            if mode == HtmlMode::Surface {
                wrapper.push_str("position:relative;");
            }
            out.push_str("<div class=\"image-wrapper\"");
            attr(out, "style", &wrapper);
            id_attr(out, *id, mode);
            if mode == HtmlMode::Surface {
                out.push_str(" contenteditable=\"false\"");
            }
            out.push_str("><img");
            attr(out, "src", src);
            attr(out, "alt", alt);
            let mut img_style = String::new();
            if let Some(w) = layout.width {
                img_style.push_str(&format!("width:{w}px;"));
            }
            if let Some(h) = layout.height {
                img_style.push_str(&format!("height:{h}px;"));
            }
            img_style.push_str("max-width:100%;");
            attr(out, "style", &img_style);
            out.push('>');
            if let Some(caption) = caption {
                out.push_str("<div class=\"image-caption\">");
                out.push_str(&encode_text(caption));
                out.push_str("</div>");
            }
            if mode == HtmlMode::Surface {
                out.push_str("<div class=\"image-resize-handle\"></div>");
                edit_button(out, "image");
            }
            out.push_str("</div>");
        }
        Block::Video { id, video_id, layout, .. } => {
            let mut wrapper = media_align_style(layout.align).to_string();
            if mode == HtmlMode::Surface {
                wrapper.push_str("position:relative;");
            }
            out.push_str("<div class=\"video-main-wrapper\"");
            attr(out, "style", &wrapper);
            id_attr(out, *id, mode);
            if mode == HtmlMode::Surface {
                out.push_str(" contenteditable=\"false\"");
            }
            out.push('>');
            let mut class = format!("video-wrapper {}", media_align_class(layout.align));
            let (frame_style, inner_style) = if layout.responsive {
                (
                    "position:absolute;top:0;left:0;width:100%;height:100%;".to_string(),
                    "position:relative;padding-bottom:56.25%;height:0;overflow:hidden;".to_string(),
                )
            } else {
                class.push_str(" fixed-size");
                let w = layout.width.unwrap_or(DEFAULT_VIDEO_SIZE.0);
                let h = layout.height.unwrap_or(DEFAULT_VIDEO_SIZE.1);
                ("width:100%;height:100%;".to_string(), format!("width:{w}px;height:{h}px;max-width:100%;"))
            };
            out.push_str("<div");
            attr(out, "class", &class);
            attr(out, "style", &inner_style);
            out.push_str("><iframe");
            attr(out, "src", &format!("{YOUTUBE_EMBED_BASE}{video_id}"));
            attr(out, "style", &frame_style);
            out.push_str(" frameborder=\"0\" allow=\"accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture\" allowfullscreen></iframe></div>");
            if mode == HtmlMode::Surface {
                out.push_str("<div class=\"image-resize-handle\"></div>");
                edit_button(out, "video");
            }
            out.push_str("</div>");
        }
    }
}

fn write_cell(out: &mut String, tag: &str, cell: &Cell, mode: HtmlMode) {
    out.push('<');
    out.push_str(tag);
    id_attr(out, cell.id, mode);
    out.push('>');
    write_inlines(&cell.content, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Empty containers and trailing line breaks get a filler `<br>` so the line
/// keeps its height in the browser.
fn write_inlines(content: &[Inline], out: &mut String) {
    if content.is_empty() {
        out.push_str("<br>");
        return;
    }
    for inline in content {
        write_inline(inline, out);
    }
    if matches!(content.last(), Some(Inline::LineBreak)) {
        out.push_str("<br>");
    }
}

fn write_inline(inline: &Inline, out: &mut String) {
    match inline {
        Inline::Text { value, style } => {
            if value.is_empty() {
                return;
            }
            let tags = style_tags(style);
            if style.has_span_props() {
                let mut css = String::new();
                if let Some(c) = &style.color {
                    css.push_str(&format!("color:{c};"));
                }
                if let Some(b) = &style.background {
                    css.push_str(&format!("background-color:{b};"));
                }
                if let Some(f) = &style.font {
                    css.push_str(&format!("font-family:{f};"));
                }
                out.push_str("<span");
                attr(out, "style", &css);
                out.push('>');
            }
            for tag in &tags {
                out.push('<');
                out.push_str(tag);
                out.push('>');
            }
            out.push_str(&encode_text(value));
            for tag in tags.iter().rev() {
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            if style.has_span_props() {
                out.push_str("</span>");
            }
        }
        Inline::Link { url, new_tab, text } => {
            out.push_str("<a");
            attr(out, "href", url);
            if *new_tab {
                out.push_str(" target=\"_blank\" rel=\"noopener noreferrer\"");
            }
            out.push('>');
            for inner in text {
                write_inline(inner, out);
            }
            out.push_str("</a>");
        }
        Inline::LineBreak => out.push_str("<br>"),
    }
}

fn style_tags(style: &Style) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if style.bold {
        tags.push("b");
    }
    if style.italic {
        tags.push("i");
    }
    if style.underline {
        tags.push("u");
    }
    if style.strikethrough {
        tags.push("s");
    }
    if style.subscript {
        tags.push("sub");
    }
    if style.superscript {
        tags.push("sup");
    }
    if style.code {
        tags.push("code");
    }
    tags
}

/// Rejects script-capable URL schemes. Inline image data is still allowed.
pub fn safe_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if compact.starts_with("javascript:")
        || compact.starts_with("vbscript:")
        || (compact.starts_with("data:") && !compact.starts_with("data:image/"))
    {
        return None;
    }
    Some(url.to_string())
}

// ---- tokenizer -------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class").map_or(false, |c| c.split_whitespace().any(|x| x == class))
    }

    fn css(&self, prop: &str) -> Option<&str> {
        self.attr("style")?
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(prop))
            .map(|(_, v)| v.trim())
    }

    fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        for child in &self.children {
            if let Node::Element(el) = child {
                if pred(el) {
                    return Some(el);
                }
                if let Some(hit) = el.find(pred) {
                    return Some(hit);
                }
            }
        }
        None
    }
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];
const SKIPPED_RAW: &[&str] = &["script", "style", "template", "noscript"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "div", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "ol", "p", "pre", "section", "table", "ul",
];

#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(top) => top.children.push(node),
            None => self.root.push(node),
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        self.push_node(Node::Text(decode_html_entities(raw).into_owned()));
    }

    fn pop(&mut self) {
        if let Some(el) = self.stack.pop() {
            self.push_node(Node::Element(el));
        }
    }

    fn auto_close(&mut self, tag: &str) {
        let closes: &[&str] = match tag {
            "li" => &["li", "p"],
            "td" | "th" => &["td", "th", "p"],
            "tr" => &["tr", "td", "th", "p"],
            "thead" | "tbody" | "tfoot" => &["thead", "tbody", "tfoot", "tr", "td", "th"],
            t if BLOCK_TAGS.contains(&t) => &["p"],
            _ => &[],
        };
        while let Some(top) = self.stack.last() {
            if closes.contains(&top.tag.as_str()) {
                self.pop();
            } else {
                break;
            }
        }
    }

    fn open(&mut self, tag: String, attrs: Vec<(String, String)>, void: bool) {
        self.auto_close(&tag);
        let el = Element { tag, attrs, children: Vec::new() };
        if void {
            self.push_node(Node::Element(el));
        } else {
            self.stack.push(el);
        }
    }

    fn close(&mut self, tag: &str) {
        if !self.stack.iter().any(|e| e.tag == tag) {
            return;
        }
        while let Some(el) = self.stack.pop() {
            let done = el.tag == tag;
            self.push_node(Node::Element(el));
            if done {
                break;
            }
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while !self.stack.is_empty() {
            self.pop();
        }
        self.root
    }
}

fn tag_end(rest: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in rest.bytes().enumerate().skip(1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut chars = raw.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == '/') {
            chars.next();
        }
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '=' || c == '/' {
                break;
            }
            name.push(c);
            chars.next();
        }
        if name.is_empty() {
            break;
        }
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            match chars.peek().copied() {
                Some(q) if q == '"' || q == '\'' => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == q {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() {
                            break;
                        }
                        value.push(c);
                        chars.next();
                    }
                }
            }
        }
        attrs.push((name.to_ascii_lowercase(), decode_html_entities(&value).into_owned()));
    }
    attrs
}

fn parse_tree(raw: &str) -> Vec<Node> {
    let mut tree = TreeBuilder::default();
    let mut rest = raw;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |i| &after[i + 3..]);
            continue;
        }
        if rest.starts_with('<') {
            let next = rest.as_bytes().get(1).copied().unwrap_or(b' ');
            if next == b'!' || next == b'?' {
                rest = rest.find('>').map_or("", |i| &rest[i + 1..]);
                continue;
            }
            if next == b'/' {
                let end = rest.find('>').unwrap_or(rest.len());
                let name = rest[2..end].trim().to_ascii_lowercase();
                tree.close(&name);
                rest = rest.get(end + 1..).unwrap_or("");
                continue;
            }
            if next.is_ascii_alphabetic() {
                let Some(end) = tag_end(rest) else {
                    tree.text(rest);
                    break;
                };
                let inner = rest[1..end].trim_end();
                let self_closing = inner.ends_with('/');
                let inner = inner.trim_end_matches('/');
                let name_end = inner.find(|c: char| c.is_whitespace()).unwrap_or(inner.len());
                let name = inner[..name_end].to_ascii_lowercase();
                let attrs = parse_attrs(&inner[name_end..]);
                rest = &rest[end + 1..];
                if SKIPPED_RAW.contains(&name.as_str()) {
                    let lower = rest.to_ascii_lowercase();
                    rest = match lower.find(&format!("</{name}")) {
                        Some(i) => rest[i..].find('>').map_or("", |j| &rest[i + j + 1..]),
                        None => "",
                    };
                    continue;
                }
                let void = self_closing || VOID_TAGS.contains(&name.as_str());
                tree.open(name, attrs, void);
                continue;
            }
            tree.text("<");
            rest = &rest[1..];
            continue;
        }
        let end = rest.find('<').unwrap_or(rest.len());
        tree.text(&rest[..end]);
        rest = &rest[end..];
    }
    tree.finish()
}

// ---- tree to document ------------------------------------------------------

#[derive(Default)]
struct Builder {
    seen: HashSet<Uuid>,
    strings: HashMap<String, SharedStr>,
}

#[derive(Debug, Clone, Copy)]
struct Para {
    kind: TextKind,
    align: TextAlign,
    indent: u8,
    pre: bool,
}

impl Default for Para {
    fn default() -> Self {
        Self { kind: TextKind::Paragraph, align: TextAlign::Left, indent: 0, pre: false }
    }
}

fn px(raw: &str) -> Option<u32> {
    let v = raw.trim().trim_end_matches("px").trim();
    v.parse::<f64>().ok().filter(|n| n.is_finite() && *n > 0.0).map(|n| n.round() as u32)
}

fn indent_of(el: &Element) -> Option<u8> {
    let raw = el.css("margin-left").or_else(|| el.css("padding-left"))?;
    let steps = (px(raw)? + INDENT_PX / 2) / INDENT_PX;
    Some(steps.min(u32::from(MAX_INDENT)) as u8)
}

fn align_of(el: &Element) -> Option<TextAlign> {
    let raw = el.css("text-align").or_else(|| el.attr("align"))?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "center" => Some(TextAlign::Center),
        "right" | "end" => Some(TextAlign::Right),
        "justify" => Some(TextAlign::Justify),
        "left" | "start" => Some(TextAlign::Left),
        _ => None,
    }
}

/// Float wins over centering; no float means centered.
fn media_align_of(el: &Element) -> MediaAlign {
    match el.css("float").map(|f| f.to_ascii_lowercase()) {
        Some(f) if f == "left" => return MediaAlign::Left,
        Some(f) if f == "right" => return MediaAlign::Right,
        _ => {}
    }
    if el.has_class("float-left") {
        MediaAlign::Left
    } else if el.has_class("float-right") {
        MediaAlign::Right
    } else {
        MediaAlign::Center
    }
}

fn heading_level(tag: &str) -> Option<u8> {
    tag.strip_prefix('h').and_then(|n| n.parse::<u8>().ok()).filter(|n| (1..=6).contains(n))
}

fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

pub(crate) fn unsafe_css(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.contains("javascript:") || lower.contains("expression(") || lower.contains("url(")
}

impl Builder {
    fn fresh(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.seen.insert(id);
        id
    }

    /// Reuses an element's surface id unless it was already claimed.
    fn id(&mut self, el: &Element) -> Uuid {
        match el.attr(ID_ATTR).and_then(|raw| Uuid::parse_str(raw).ok()) {
            Some(id) if self.seen.insert(id) => id,
            _ => self.fresh(),
        }
    }

    fn shared(&mut self, s: &str) -> SharedStr {
        if let Some(hit) = self.strings.get(s) {
            return hit.clone();
        }
        let shared: SharedStr = Arc::from(s);
        self.strings.insert(s.to_string(), shared.clone());
        shared
    }

    fn style_for(&mut self, el: &Element, base: &Style) -> Style {
        let mut style = base.clone();
        match el.tag.as_str() {
            "b" | "strong" => style.bold = true,
            "i" | "em" => style.italic = true,
            "u" | "ins" => style.underline = true,
            "s" | "strike" | "del" => style.strikethrough = true,
            "sub" => style.set(crate::Mark::Subscript, true),
            "sup" => style.set(crate::Mark::Superscript, true),
            "code" | "kbd" | "tt" => style.code = true,
            "font" => {
                if let Some(c) = el.attr("color").filter(|c| !unsafe_css(c)) {
                    style.color = Some(self.shared(c.trim()));
                }
                if let Some(f) = el.attr("face").filter(|f| !unsafe_css(f)) {
                    style.font = Some(self.shared(f.trim()));
                }
            }
            _ => {}
        }
        if let Some(css) = el.attr("style") {
            for (prop, value) in css.split(';').filter_map(|d| d.split_once(':')) {
                let value = value.trim();
                if value.is_empty() || unsafe_css(value) {
                    continue;
                }
                let lower = value.to_ascii_lowercase();
                match prop.trim().to_ascii_lowercase().as_str() {
                    "font-weight" => {
                        style.bold = lower == "bold" || lower == "bolder" || lower.parse::<u32>().map_or(false, |w| w >= 600)
                    }
                    "font-style" => style.italic = lower == "italic" || lower == "oblique",
                    "text-decoration" | "text-decoration-line" => {
                        if lower.contains("underline") {
                            style.underline = true;
                        }
                        if lower.contains("line-through") {
                            style.strikethrough = true;
                        }
                    }
                    "vertical-align" if lower == "sub" => style.set(crate::Mark::Subscript, true),
                    "vertical-align" if lower == "super" => style.set(crate::Mark::Superscript, true),
                    "color" if lower != "inherit" => style.color = Some(self.shared(value)),
                    "background-color" | "background" if lower != "inherit" && lower != "transparent" => {
                        style.background = Some(self.shared(value))
                    }
                    "font-family" => style.font = Some(self.shared(value)),
                    _ => {}
                }
            }
        }
        style
    }

    fn inline_content<'n>(&mut self, nodes: impl IntoIterator<Item = &'n Node>) -> Vec<Inline> {
        let mut flow = Flow::new(self, Para::default(), None);
        flow.walk(nodes, &Style::default());
        let mut content = Vec::new();
        for block in flow.finish(false) {
            if let Block::Text { content: part, .. } = block {
                if !content.is_empty() {
                    content.push(Inline::LineBreak);
                }
                content.extend(part);
            }
        }
        strip_filler(normalize(content))
    }

    fn collect_items(&mut self, list: &Element, indent: u8, items: &mut Vec<ListItem>) {
        for child in &list.children {
            let Node::Element(el) = child else {
                continue;
            };
            match el.tag.as_str() {
                "li" => {
                    let id = self.id(el);
                    let own = indent.saturating_add(indent_of(el).unwrap_or(0)).min(MAX_INDENT);
                    let (nested, rest): (Vec<&Node>, Vec<&Node>) = el
                        .children
                        .iter()
                        .partition(|n| matches!(n, Node::Element(e) if e.tag == "ul" || e.tag == "ol"));
                    let content = self.inline_content(rest);
                    items.push(ListItem { id, indent: own, content });
                    for node in nested {
                        if let Node::Element(sub) = node {
                            self.collect_items(sub, own.saturating_add(1).min(MAX_INDENT), items);
                        }
                    }
                }
                "ul" | "ol" => self.collect_items(el, indent.saturating_add(1).min(MAX_INDENT), items),
                _ => {}
            }
        }
    }

    fn list_block(&mut self, el: &Element) -> Block {
        let id = self.id(el);
        let mut items = Vec::new();
        self.collect_items(el, 0, &mut items);
        if items.is_empty() {
            items.push(ListItem { id: self.fresh(), indent: 0, content: Vec::new() });
        }
        Block::List { id, ordered: el.tag == "ol", items, dirty: true }
    }

    fn collect_rows<'e>(el: &'e Element, in_head: bool, out: &mut Vec<(&'e Element, bool)>) {
        for child in &el.children {
            if let Node::Element(c) = child {
                match c.tag.as_str() {
                    "tr" => out.push((c, in_head)),
                    "thead" => Self::collect_rows(c, true, out),
                    "tbody" | "tfoot" => Self::collect_rows(c, false, out),
                    _ => {}
                }
            }
        }
    }

    fn table_block(&mut self, wrapper: Option<&Element>, table: &Element) -> Block {
        let id = match wrapper {
            Some(w) => self.id(w),
            None => self.id(table),
        };
        let responsive = wrapper.map_or(false, |w| {
            w.has_class("table-responsive") || w.find(&|e| e.has_class("table-responsive")).is_some()
        });
        let style = if table.has_class("table-striped") {
            TableStyle::Striped
        } else if table.has_class("table-bordered") {
            TableStyle::Bordered
        } else if table.has_class("table-hover") {
            TableStyle::Hover
        } else {
            TableStyle::Default
        };
        let mut tr = Vec::new();
        Self::collect_rows(table, false, &mut tr);
        let mut header = false;
        let mut rows: Vec<Vec<Cell>> = Vec::new();
        for (index, (row, in_head)) in tr.into_iter().enumerate() {
            let cells: Vec<&Element> = row
                .children
                .iter()
                .filter_map(|n| match n {
                    Node::Element(c) if c.tag == "td" || c.tag == "th" => Some(c),
                    _ => None,
                })
                .collect();
            if cells.is_empty() {
                continue;
            }
            if index == 0 {
                header = in_head || cells.iter().all(|c| c.tag == "th");
            }
            let mut out = Vec::with_capacity(cells.len());
            for cell in cells {
                let cell_id = self.id(cell);
                let content = self.inline_content(&cell.children);
                out.push(Cell { id: cell_id, content });
            }
            rows.push(out);
        }
        if rows.is_empty() {
            rows.push(vec![Cell { id: self.fresh(), content: Vec::new() }]);
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(1);
        for row in &mut rows {
            while row.len() < width {
                row.push(Cell { id: self.fresh(), content: Vec::new() });
            }
        }
        Block::Table { id, rows, header, style, responsive, dirty: true }
    }

    fn image_block(&mut self, wrapper: Option<&Element>, img: &Element) -> Option<Block> {
        let src = img.attr("src").and_then(safe_url)?;
        let id = match wrapper {
            Some(w) => self.id(w),
            None => self.id(img),
        };
        let width = img.css("width").and_then(px).or_else(|| img.attr("width").and_then(px));
        let height = img.css("height").and_then(px).or_else(|| img.attr("height").and_then(px));
        let caption = wrapper
            .and_then(|w| w.find(&|e| e.has_class("image-caption") || e.tag == "figcaption"))
            .map(|c| crate::plain_text(&self.inline_content(&c.children)).trim().to_string())
            .filter(|c| !c.is_empty())
            .map(|c| Arc::from(c.as_str()));
        let align = media_align_of(wrapper.unwrap_or(img));
        Some(Block::Image {
            id,
            src: Arc::from(src.as_str()),
            alt: Arc::from(img.attr("alt").unwrap_or("")),
            caption,
            layout: MediaLayout { align, width, height, responsive: false },
            dirty: true,
        })
    }

    fn video_block(&mut self, wrapper: Option<&Element>, iframe: &Element) -> Option<Block> {
        let video_id = extract_video_id(iframe.attr("src")?)?;
        let id = match wrapper {
            Some(w) => self.id(w),
            None => self.id(iframe),
        };
        let inner = wrapper.and_then(|w| w.find(&|e| e.has_class("video-wrapper")));
        let responsive = inner.map_or(false, |w| !w.has_class("fixed-size") && w.css("padding-bottom").is_some());
        let (width, height) = if responsive {
            (None, None)
        } else {
            let w = inner
                .and_then(|w| w.css("width").and_then(px))
                .or_else(|| iframe.attr("width").and_then(px))
                .unwrap_or(DEFAULT_VIDEO_SIZE.0);
            let h = inner
                .and_then(|w| w.css("height").and_then(px))
                .or_else(|| iframe.attr("height").and_then(px))
                .unwrap_or(DEFAULT_VIDEO_SIZE.1);
            (Some(w), Some(h))
        };
        let align = match (wrapper, inner) {
            (Some(w), _) if w.css("float").is_some() => media_align_of(w),
            (_, Some(i)) => media_align_of(i),
            (Some(w), None) => media_align_of(w),
            (None, None) => MediaAlign::Center,
        };
        Some(Block::Video {
            id,
            video_id: Arc::from(video_id.as_str()),
            layout: MediaLayout { align, width, height, responsive },
            dirty: true,
        })
    }
}

fn strip_filler(mut content: Vec<Inline>) -> Vec<Inline> {
    if matches!(content.last(), Some(Inline::LineBreak)) {
        content.pop();
    }
    content
}

struct Flow<'a> {
    b: &'a mut Builder,
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
    para: Para,
    pending_id: Option<Uuid>,
}

impl<'a> Flow<'a> {
    fn new(b: &'a mut Builder, para: Para, pending_id: Option<Uuid>) -> Self {
        Self { b, blocks: Vec::new(), inlines: Vec::new(), para, pending_id }
    }

    fn flush(&mut self, keep_empty: bool) {
        let content = strip_filler(normalize(std::mem::take(&mut self.inlines)));
        let blank = !self.para.pre
            && content.iter().all(|i| matches!(i, Inline::Text { value, .. } if value.trim().is_empty()));
        let content = if blank { Vec::new() } else { content };
        if content.is_empty() && !keep_empty {
            return;
        }
        let id = match self.pending_id.take() {
            Some(id) => id,
            None => self.b.fresh(),
        };
        self.blocks.push(Block::Text {
            id,
            kind: self.para.kind,
            align: self.para.align,
            indent: self.para.indent,
            content,
            dirty: true,
        });
    }

    fn finish(mut self, keep_empty: bool) -> Vec<Block> {
        let keep = keep_empty && self.blocks.is_empty();
        self.flush(keep);
        self.blocks
    }

    fn push_block(&mut self, block: Block) {
        self.flush(false);
        self.blocks.push(block);
    }

    fn walk<'n>(&mut self, nodes: impl IntoIterator<Item = &'n Node>, style: &Style) {
        for node in nodes {
            match node {
                Node::Text(raw) => self.text(raw, style),
                Node::Element(el) => self.element(el, style),
            }
        }
    }

    fn text(&mut self, raw: &str, style: &Style) {
        let value = if self.para.pre { raw.to_string() } else { collapse_whitespace(raw) };
        if value.is_empty() || (!self.para.pre && self.inlines.is_empty() && value.trim().is_empty()) {
            return;
        }
        self.inlines.push(Inline::Text { value: Arc::from(value.as_str()), style: style.clone() });
    }

    fn nested(&mut self, el: &Element, style: &Style) {
        let mut para = self.para;
        match el.tag.as_str() {
            "p" => para.kind = TextKind::Paragraph,
            "blockquote" => para.kind = TextKind::Quote,
            "pre" => {
                para.kind = TextKind::Preformatted;
                para.pre = true;
            }
            tag => {
                if let Some(level) = heading_level(tag) {
                    para.kind = TextKind::Heading(level);
                }
            }
        }
        if let Some(align) = align_of(el) {
            para.align = align;
        }
        if let Some(indent) = indent_of(el) {
            para.indent = indent;
        }
        self.flush(false);
        let id = self.b.id(el);
        let mut inner = Flow::new(&mut *self.b, para, Some(id));
        inner.walk(&el.children, style);
        let blocks = inner.finish(true);
        self.blocks.extend(blocks);
    }

    fn element(&mut self, el: &Element, style: &Style) {
        match el.tag.as_str() {
            "head" | "title" | "link" | "meta" | "object" | "embed" | "button" | "input" | "select" | "textarea"
            | "svg" | "canvas" | "form" => {}
            "br" => self.inlines.push(Inline::LineBreak),
            "hr" => {
                let id = self.b.id(el);
                self.push_block(Block::Rule { id, dirty: true });
            }
            "img" => {
                if let Some(block) = self.b.image_block(None, el) {
                    self.push_block(block);
                }
            }
            "iframe" => {
                if let Some(block) = self.b.video_block(None, el) {
                    self.push_block(block);
                }
            }
            "ul" | "ol" => {
                let block = self.b.list_block(el);
                self.push_block(block);
            }
            "table" => {
                let block = self.b.table_block(None, el);
                self.push_block(block);
            }
            "div" | "figure" if el.has_class("image-wrapper") || el.tag == "figure" => {
                if let Some(img) = el.find(&|e| e.tag == "img") {
                    if let Some(block) = self.b.image_block(Some(el), img) {
                        self.push_block(block);
                    }
                }
            }
            "div" if el.has_class("video-main-wrapper") || el.has_class("video-wrapper") => {
                if let Some(frame) = el.find(&|e| e.tag == "iframe") {
                    if let Some(block) = self.b.video_block(Some(el), frame) {
                        self.push_block(block);
                    }
                }
            }
            "div" if el.has_class("table-main-wrapper") || el.has_class("table-responsive") => {
                if let Some(table) = el.find(&|e| e.tag == "table") {
                    let block = self.b.table_block(Some(el), table);
                    self.push_block(block);
                }
            }
            "div" if el.has_class("image-resize-handle") || el.attr(EDIT_ATTR).is_some() => {}
            "a" => {
                let Some(url) = el.attr("href").and_then(safe_url) else {
                    self.walk(&el.children, style);
                    return;
                };
                let new_tab = el.attr("target") == Some("_blank");
                let start = self.inlines.len();
                self.walk(&el.children, style);
                let at = start.min(self.inlines.len());
                let text = unwrap_links(self.inlines.split_off(at));
                if !text.is_empty() {
                    let url = self.b.shared(&url);
                    self.inlines.push(Inline::Link { url, new_tab, text });
                }
            }
            "p" | "div" | "blockquote" | "pre" | "section" | "article" | "header" | "footer" | "address"
            | "li" | "dd" | "dt" | "figcaption" => self.nested(el, style),
            tag if heading_level(tag).is_some() => self.nested(el, style),
            _ => {
                let inner = self.b.style_for(el, style);
                self.walk(&el.children, &inner);
            }
        }
    }
}

/// Parses editor markup into a document. Never fails; unknown markup
/// degrades to its text content.
pub fn parse_html(raw: &str) -> Document {
    let nodes = parse_tree(raw);
    let mut builder = Builder::default();
    let mut flow = Flow::new(&mut builder, Para::default(), None);
    flow.walk(&nodes, &Style::default());
    let blocks = flow.finish(false);
    Document::from_blocks(blocks)
}

/// Parses markup that will be spliced into an existing document.
pub fn parse_fragment(raw: &str) -> Vec<Block> {
    let nodes = parse_tree(raw);
    let mut builder = Builder::default();
    let mut flow = Flow::new(&mut builder, Para::default(), None);
    flow.walk(&nodes, &Style::default());
    flow.finish(false)
}

pub fn is_text_kind_tag(tag: &str) -> Option<TextKind> {
    match tag.trim().trim_matches(|c| c == '<' || c == '>').to_ascii_lowercase().as_str() {
        "p" => Some(TextKind::Paragraph),
        "blockquote" => Some(TextKind::Quote),
        "pre" => Some(TextKind::Preformatted),
        other => heading_level(other).map(TextKind::Heading),
    }
}
