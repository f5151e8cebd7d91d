use crate::{Inline, Style};
use std::sync::Arc;

pub fn text_len(content: &[Inline]) -> usize {
    content.iter().map(Inline::char_len).sum()
}

pub fn plain_text(content: &[Inline]) -> String {
    let mut out = String::new();
    push_plain(content, &mut out);
    out
}

fn push_plain(content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text { value, .. } => out.push_str(value),
            Inline::Link { text, .. } => push_plain(text, out),
            Inline::LineBreak => out.push('\n'),
        }
    }
}

fn byte_offset(value: &str, chars: usize) -> usize {
    value.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(value.len())
}

/// Splits a run list at a character offset. Links straddling the offset are
/// split into two links with the same target.
pub fn split_inlines(content: Vec<Inline>, offset: usize) -> (Vec<Inline>, Vec<Inline>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut remaining = offset;
    for inline in content {
        if remaining == 0 {
            right.push(inline);
            continue;
        }
        let len = inline.char_len();
        if len <= remaining {
            remaining -= len;
            left.push(inline);
            continue;
        }
        match inline {
            Inline::Text { value, style } => {
                let at = byte_offset(&value, remaining);
                left.push(Inline::Text { value: Arc::from(&value[..at]), style: style.clone() });
                right.push(Inline::Text { value: Arc::from(&value[at..]), style });
            }
            Inline::Link { url, new_tab, text } => {
                let (l, r) = split_inlines(text, remaining);
                left.push(Inline::Link { url: url.clone(), new_tab, text: l });
                right.push(Inline::Link { url, new_tab, text: r });
            }
            Inline::LineBreak => right.push(Inline::LineBreak),
        }
        remaining = 0;
    }
    (left, right)
}

fn split3(content: Vec<Inline>, start: usize, end: usize) -> (Vec<Inline>, Vec<Inline>, Vec<Inline>) {
    let (left, rest) = split_inlines(content, start);
    let (mid, right) = split_inlines(rest, end.saturating_sub(start));
    (left, mid, right)
}

fn join3(left: Vec<Inline>, mid: Vec<Inline>, right: Vec<Inline>) -> Vec<Inline> {
    let mut out = left;
    out.extend(mid);
    out.extend(right);
    normalize(out)
}

/// Merges adjacent runs with equal style, merges adjacent links with the same
/// target and drops empty runs.
pub fn normalize(content: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(content.len());
    for inline in content {
        match inline {
            Inline::Text { value, .. } if value.is_empty() => {}
            Inline::Text { value, style } => {
                if let Some(Inline::Text { value: prev, style: prev_style }) = out.last_mut() {
                    if *prev_style == style {
                        *prev = Arc::from(format!("{prev}{value}"));
                        continue;
                    }
                }
                out.push(Inline::Text { value, style });
            }
            Inline::Link { url, new_tab, text } => {
                let text = normalize(text);
                if text.is_empty() {
                    continue;
                }
                if let Some(Inline::Link { url: prev_url, new_tab: prev_tab, text: prev_text }) = out.last_mut() {
                    if *prev_url == url && *prev_tab == new_tab {
                        let mut merged = std::mem::take(prev_text);
                        merged.extend(text);
                        *prev_text = normalize(merged);
                        continue;
                    }
                }
                out.push(Inline::Link { url, new_tab, text });
            }
            Inline::LineBreak => out.push(Inline::LineBreak),
        }
    }
    out
}

pub fn delete_range(content: &mut Vec<Inline>, start: usize, end: usize) {
    if end <= start {
        return;
    }
    let (left, _, right) = split3(std::mem::take(content), start, end);
    *content = join3(left, Vec::new(), right);
}

pub fn insert_inlines(content: &mut Vec<Inline>, offset: usize, fragment: Vec<Inline>) {
    let (left, right) = split_inlines(std::mem::take(content), offset);
    *content = join3(left, fragment, right);
}

pub fn insert_text(content: &mut Vec<Inline>, offset: usize, text: &str, style: Style) {
    insert_inlines(content, offset, vec![Inline::styled(text, style)]);
}

fn restyle(content: &mut [Inline], f: &impl Fn(&mut Style)) {
    for inline in content {
        match inline {
            Inline::Text { style, .. } => f(style),
            Inline::Link { text, .. } => restyle(text, f),
            Inline::LineBreak => {}
        }
    }
}

pub fn map_styles(content: &mut Vec<Inline>, start: usize, end: usize, f: impl Fn(&mut Style)) {
    if end <= start {
        return;
    }
    let (left, mut mid, right) = split3(std::mem::take(content), start, end);
    restyle(&mut mid, &f);
    *content = join3(left, mid, right);
}

pub fn unwrap_links(content: Vec<Inline>) -> Vec<Inline> {
    let mut out = Vec::with_capacity(content.len());
    for inline in content {
        match inline {
            Inline::Link { text, .. } => out.extend(unwrap_links(text)),
            other => out.push(other),
        }
    }
    out
}

/// Wraps a range in a single link. Links already inside the range are
/// replaced, never nested.
pub fn wrap_link(content: &mut Vec<Inline>, start: usize, end: usize, url: &str, new_tab: bool) -> bool {
    if end <= start {
        return false;
    }
    let (left, mid, right) = split3(std::mem::take(content), start, end);
    let mid = unwrap_links(mid);
    if mid.is_empty() {
        *content = join3(left, Vec::new(), right);
        return false;
    }
    let link = Inline::Link { url: Arc::from(url), new_tab, text: mid };
    *content = join3(left, vec![link], right);
    true
}

pub fn unlink_range(content: &mut Vec<Inline>, start: usize, end: usize) {
    if end <= start {
        return;
    }
    let (left, mid, right) = split3(std::mem::take(content), start, end);
    *content = join3(left, unwrap_links(mid), right);
}

/// Removes the whole link that contains the character at `offset`.
pub fn unlink_at(content: &mut Vec<Inline>, offset: usize) -> bool {
    let mut pos = 0;
    let mut found = None;
    for (index, inline) in content.iter().enumerate() {
        let len = inline.char_len();
        if matches!(inline, Inline::Link { .. }) && offset >= pos && offset <= pos + len {
            found = Some(index);
            break;
        }
        pos += len;
    }
    let Some(index) = found else {
        return false;
    };
    let inline = content.remove(index);
    if let Inline::Link { text, .. } = inline {
        let tail = content.split_off(index);
        let mut out = std::mem::take(content);
        out.extend(unwrap_links(text));
        out.extend(tail);
        *content = normalize(out);
    }
    true
}

fn style_of_char(content: &[Inline], index: usize) -> Option<Style> {
    let mut pos = 0;
    for inline in content {
        let len = inline.char_len();
        if index < pos + len {
            return match inline {
                Inline::Text { style, .. } => Some(style.clone()),
                Inline::Link { text, .. } => style_of_char(text, index - pos),
                Inline::LineBreak => None,
            };
        }
        pos += len;
    }
    None
}

/// Style a character typed at `offset` would inherit.
pub fn style_at(content: &[Inline], offset: usize) -> Style {
    let before = if offset > 0 { offset - 1 } else { 0 };
    style_of_char(content, before).unwrap_or_default()
}

fn visit_chars(content: &[Inline], pos: &mut usize, start: usize, end: usize, f: &mut impl FnMut(&Style)) {
    for inline in content {
        match inline {
            Inline::Text { value, style } => {
                for _ in value.chars() {
                    if *pos >= start && *pos < end {
                        f(style);
                    }
                    *pos += 1;
                }
            }
            Inline::Link { text, .. } => visit_chars(text, pos, start, end, f),
            Inline::LineBreak => *pos += 1,
        }
    }
}

/// `Some(true)` when every text character in the range satisfies `pred`,
/// `None` when the range holds no text characters.
pub fn range_state(content: &[Inline], start: usize, end: usize, pred: impl Fn(&Style) -> bool) -> Option<bool> {
    let mut seen = false;
    let mut all = true;
    let mut pos = 0;
    visit_chars(content, &mut pos, start, end, &mut |style| {
        seen = true;
        if !pred(style) {
            all = false;
        }
    });
    seen.then_some(all)
}

pub fn all_in_range(content: &[Inline], start: usize, end: usize, pred: impl Fn(&Style) -> bool) -> bool {
    range_state(content, start, end, pred) == Some(true)
}

/// Index and start offset of the link holding `offset`. A caret right after
/// the last character still counts as inside.
fn link_index(content: &[Inline], offset: usize) -> Option<(usize, usize)> {
    let mut pos = 0;
    for (index, inline) in content.iter().enumerate() {
        let len = inline.char_len();
        if matches!(inline, Inline::Link { .. })
            && ((offset > pos && offset <= pos + len) || (offset == 0 && pos == 0 && len > 0))
        {
            return Some((index, pos));
        }
        pos += len;
    }
    None
}

pub fn link_at(content: &[Inline], offset: usize) -> Option<(&str, bool)> {
    let (index, _) = link_index(content, offset)?;
    match &content[index] {
        Inline::Link { url, new_tab, .. } => Some((url, *new_tab)),
        _ => None,
    }
}

pub fn link_text_at(content: &[Inline], offset: usize) -> Option<String> {
    let (index, _) = link_index(content, offset)?;
    match &content[index] {
        Inline::Link { text, .. } => Some(plain_text(text)),
        _ => None,
    }
}

/// Points the link holding `offset` at a new target. A non-empty `label`
/// that differs from the current text replaces it. Returns the offset just
/// past the link.
pub fn retarget_link(content: &mut [Inline], offset: usize, url: &str, new_tab: bool, label: &str) -> Option<usize> {
    let (index, start) = link_index(content, offset)?;
    let Inline::Link { url: target, new_tab: tab, text } = &mut content[index] else {
        return None;
    };
    *target = Arc::from(url);
    *tab = new_tab;
    if !label.is_empty() && plain_text(text) != label {
        *text = vec![Inline::plain(label)];
    }
    Some(start + text_len(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> Style {
        Style { bold: true, ..Style::default() }
    }

    #[test]
    fn split_inside_link_keeps_target() {
        let content = vec![Inline::Link {
            url: Arc::from("https://a.test"),
            new_tab: true,
            text: vec![Inline::plain("abcd")],
        }];
        let (l, r) = split_inlines(content, 2);
        assert_eq!(plain_text(&l), "ab");
        assert_eq!(plain_text(&r), "cd");
        assert!(matches!(&r[0], Inline::Link { url, .. } if &**url == "https://a.test"));
    }

    #[test]
    fn map_styles_merges_runs() {
        let mut content = vec![Inline::plain("Hello world")];
        map_styles(&mut content, 0, 5, |s| s.bold = true);
        assert_eq!(content.len(), 2);
        map_styles(&mut content, 5, 11, |s| s.bold = true);
        assert_eq!(content, vec![Inline::styled("Hello world", bold())]);
    }

    #[test]
    fn wrap_link_replaces_inner_links() {
        let mut content = vec![
            Inline::plain("ab"),
            Inline::Link { url: Arc::from("https://old.test"), new_tab: false, text: vec![Inline::plain("cd")] },
        ];
        assert!(wrap_link(&mut content, 0, 4, "https://new.test", true));
        assert_eq!(content.len(), 1);
        match &content[0] {
            Inline::Link { url, text, .. } => {
                assert_eq!(&**url, "https://new.test");
                assert_eq!(plain_text(text), "abcd");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unlink_at_flattens_link() {
        let mut content = vec![
            Inline::plain("see "),
            Inline::Link { url: Arc::from("https://x.test"), new_tab: false, text: vec![Inline::plain("here")] },
        ];
        assert!(unlink_at(&mut content, 6));
        assert_eq!(content, vec![Inline::plain("see here")]);
    }

    #[test]
    fn retarget_link_keeps_one_anchor() {
        let mut content = vec![
            Inline::plain("see "),
            Inline::Link { url: Arc::from("https://a.test"), new_tab: false, text: vec![Inline::styled("docs", bold())] },
            Inline::plain(" now"),
        ];
        assert_eq!(retarget_link(&mut content, 6, "https://b.test", true, "docs"), Some(8));
        assert_eq!(content.len(), 3);
        assert_eq!(link_at(&content, 8), Some(("https://b.test", true)));
        // same label keeps the styled runs
        assert!(matches!(&content[1], Inline::Link { text, .. } if text[0] == Inline::styled("docs", bold())));

        assert_eq!(retarget_link(&mut content, 5, "https://b.test", true, "manual"), Some(10));
        assert_eq!(link_text_at(&content, 5).as_deref(), Some("manual"));
        assert_eq!(retarget_link(&mut content, 2, "https://c.test", false, "x"), None);
    }

    #[test]
    fn range_without_text_is_not_active() {
        let content = vec![Inline::LineBreak];
        assert!(!all_in_range(&content, 0, 1, |s| s.bold));
    }

    #[test]
    fn multibyte_offsets_count_chars() {
        let mut content = vec![Inline::plain("héllo")];
        delete_range(&mut content, 1, 2);
        assert_eq!(plain_text(&content), "hllo");
    }
}
