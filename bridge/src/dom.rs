//! Surface rendering and DOM selection mapping.
//!
//! The surface only ever holds markup produced by the engine, so every
//! cursor-holding element carries its node id and offsets can be counted in
//! characters the same way the document model counts them.

use rte_core::{block_to_html, Document, HtmlMode, Patch, PatchKind, Position, Selection, ID_ATTR};
use uuid::Uuid;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlTemplateElement, InputEvent, Node};

const TEXT_NODE: u16 = 3;

pub fn block_element(surface: &Element, id: Uuid) -> Option<Element> {
    surface
        .query_selector(&format!(":scope > [{ID_ATTR}=\"{id}\"]"))
        .ok()
        .flatten()
}

/// Id of the top-level block that contains `node`.
pub fn top_block_id(surface: &Element, node: &Node) -> Option<Uuid> {
    let mut current = node.clone();
    loop {
        let parent = current.parent_node()?;
        if parent.is_same_node(Some(surface.as_ref())) {
            let el = current.dyn_ref::<Element>()?;
            return el.get_attribute(ID_ATTR).and_then(|raw| Uuid::parse_str(&raw).ok());
        }
        current = parent;
    }
}

fn build_element(dom: &web_sys::Document, markup: &str) -> Result<Option<Element>, JsValue> {
    let template: HtmlTemplateElement = dom.create_element("template")?.dyn_into()?;
    template.set_inner_html(markup);
    Ok(template.content().first_element_child())
}

/// Applies diff patches to the surface. Removals come first in `patches`,
/// so every `after` anchor is already in place when an insert runs.
pub fn apply_patches(
    dom: &web_sys::Document,
    surface: &Element,
    doc: &Document,
    patches: &[Patch],
) -> Result<(), JsValue> {
    for patch in patches {
        match patch.kind {
            PatchKind::RemoveBlock => {
                if let Some(el) = block_element(surface, patch.block_id) {
                    el.remove();
                }
            }
            PatchKind::ReplaceBlock | PatchKind::InsertBlock { .. } => {
                let Some(block) = doc.block(patch.block_id) else {
                    continue;
                };
                let Some(fresh) = build_element(dom, &block_to_html(block, HtmlMode::Surface))? else {
                    continue;
                };
                match patch.kind {
                    PatchKind::ReplaceBlock => match block_element(surface, patch.block_id) {
                        Some(old) => old.replace_with_with_node_1(&fresh)?,
                        None => surface.append_with_node_1(&fresh)?,
                    },
                    PatchKind::InsertBlock { after: Some(prev) } => match block_element(surface, prev) {
                        Some(anchor) => anchor.after_with_node_1(&fresh)?,
                        None => surface.append_with_node_1(&fresh)?,
                    },
                    _ => surface.prepend_with_node_1(&fresh)?,
                }
            }
        }
    }
    Ok(())
}

fn char_len(node: &Node) -> usize {
    if node.node_type() == TEXT_NODE {
        return node.text_content().map_or(0, |t| t.chars().count());
    }
    if node.node_name().eq_ignore_ascii_case("br") {
        return 1;
    }
    let children = node.child_nodes();
    (0..children.length()).filter_map(|i| children.item(i)).map(|c| char_len(&c)).sum()
}

fn utf16_to_chars(text: &str, units: u32) -> usize {
    let prefix: Vec<u16> = text.encode_utf16().take(units as usize).collect();
    String::from_utf16_lossy(&prefix).chars().count()
}

fn chars_to_utf16(text: &str, chars: usize) -> u32 {
    text.chars().take(chars).map(char::len_utf16).sum::<usize>() as u32
}

/// Characters before (`target`, `offset`) inside `node`. Returns true once
/// the target was reached.
fn count_until(node: &Node, target: &Node, offset: u32, total: &mut usize) -> bool {
    if node.is_same_node(Some(target)) {
        if node.node_type() == TEXT_NODE {
            *total += utf16_to_chars(&node.text_content().unwrap_or_default(), offset);
        } else {
            let children = node.child_nodes();
            for i in 0..offset.min(children.length()) {
                if let Some(child) = children.item(i) {
                    *total += char_len(&child);
                }
            }
        }
        return true;
    }
    if node.node_type() == TEXT_NODE || node.node_name().eq_ignore_ascii_case("br") {
        *total += char_len(node);
        return false;
    }
    let children = node.child_nodes();
    for i in 0..children.length() {
        if let Some(child) = children.item(i) {
            if count_until(&child, target, offset, total) {
                return true;
            }
        }
    }
    false
}

/// Nearest enclosing element that is a cursor container of `doc`.
fn container_for(node: &Node, surface: &Element, doc: &Document) -> Option<(Element, Uuid)> {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if n.is_same_node(Some(surface.as_ref())) {
            return None;
        }
        if let Some(el) = n.dyn_ref::<Element>() {
            let id = el.get_attribute(ID_ATTR).and_then(|raw| Uuid::parse_str(&raw).ok());
            if let Some(id) = id.filter(|id| doc.has_container(*id)) {
                return Some((el.clone(), id));
            }
        }
        current = n.parent_node();
    }
    None
}

fn position_of(node: &Node, offset: u32, surface: &Element, doc: &Document) -> Option<Position> {
    let (container, id) = container_for(node, surface, doc)?;
    let mut chars = 0;
    count_until(container.as_ref(), node, offset, &mut chars);
    Some(Position::new(id, chars))
}

/// The live DOM selection mapped onto the document, when it lies inside the
/// surface.
pub fn read_selection(surface: &Element, doc: &Document) -> Option<Selection> {
    let selection = web_sys::window()?.get_selection().ok()??;
    let anchor = selection.anchor_node()?;
    let focus = selection.focus_node()?;
    if !surface.contains(Some(&anchor)) || !surface.contains(Some(&focus)) {
        return None;
    }
    let anchor = position_of(&anchor, selection.anchor_offset(), surface, doc)?;
    let focus = position_of(&focus, selection.focus_offset(), surface, doc)?;
    Some(Selection::new(anchor, focus))
}

fn js_prop(target: &JsValue, name: &str) -> Option<JsValue> {
    js_sys::Reflect::get(target, &JsValue::from_str(name)).ok()
}

/// What a word or line delete would remove, taken from the first of the
/// event's target ranges.
pub fn target_range(surface: &Element, doc: &Document, input: &InputEvent) -> Option<Selection> {
    let this: &JsValue = input.as_ref();
    let method: js_sys::Function = js_prop(this, "getTargetRanges")?.dyn_into().ok()?;
    let ranges: js_sys::Array = method.call0(this).ok()?.dyn_into().ok()?;
    let range = ranges.get(0);
    let point = |container: &str, offset: &str| -> Option<Position> {
        let node: Node = js_prop(&range, container)?.dyn_into().ok()?;
        let offset = js_prop(&range, offset)?.as_f64()? as u32;
        if !surface.contains(Some(&node)) {
            return None;
        }
        position_of(&node, offset, surface, doc)
    };
    let start = point("startContainer", "startOffset")?;
    let end = point("endContainer", "endOffset")?;
    Some(Selection::new(start, end))
}

fn locate(node: &Node, remaining: &mut usize) -> Option<(Node, u32)> {
    if node.node_type() == TEXT_NODE {
        let text = node.text_content().unwrap_or_default();
        let len = text.chars().count();
        if *remaining <= len {
            return Some((node.clone(), chars_to_utf16(&text, *remaining)));
        }
        *remaining -= len;
        return None;
    }
    let children = node.child_nodes();
    for i in 0..children.length() {
        let Some(child) = children.item(i) else {
            continue;
        };
        if child.node_name().eq_ignore_ascii_case("br") {
            if *remaining == 0 {
                return Some((node.clone(), i));
            }
            *remaining -= 1;
            continue;
        }
        if let Some(found) = locate(&child, remaining) {
            return Some(found);
        }
    }
    None
}

fn dom_point(surface: &Element, pos: Position) -> Option<(Node, u32)> {
    let el = surface
        .query_selector(&format!("[{ID_ATTR}=\"{}\"]", pos.node))
        .ok()
        .flatten()?;
    let mut remaining = pos.offset;
    let node: &Node = el.as_ref();
    locate(node, &mut remaining).or_else(|| Some((node.clone(), node.child_nodes().length())))
}

/// Moves the DOM selection to `sel`.
pub fn write_selection(surface: &Element, sel: Selection) -> Result<(), JsValue> {
    let Some(window) = web_sys::window() else {
        return Ok(());
    };
    let Some(selection) = window.get_selection()? else {
        return Ok(());
    };
    let (Some((anchor, a_off)), Some((focus, f_off))) = (dom_point(surface, sel.anchor), dom_point(surface, sel.focus))
    else {
        return Ok(());
    };
    selection.set_base_and_extent(&anchor, a_off, &focus, f_off)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_offsets_map_to_chars() {
        assert_eq!(utf16_to_chars("a😀b", 3), 2);
        assert_eq!(chars_to_utf16("a😀b", 2), 3);
        assert_eq!(chars_to_utf16("abc", 9), 3);
    }
}
