use rte_core::{
    parse_html, sanitize_html, to_html, Block, Editor, EditorConfig, HtmlMode, MediaAlign, MediaKind, TableStyle,
    ID_ATTR,
};

#[test]
fn scripts_and_handlers_are_dropped() {
    let dirty = "<p>Hi<script>alert(1)</script></p><p onclick=\"steal()\">there</p><style>p{}</style>";
    assert_eq!(sanitize_html(dirty), "<p>Hi</p><p>there</p>");
}

#[test]
fn script_links_keep_only_their_text() {
    assert_eq!(sanitize_html("<p><a href=\"javascript:alert(1)\">click</a> me</p>"), "<p>click me</p>");
    assert_eq!(
        sanitize_html("<p><a href=\" JaVaScRiPt:alert(1)\">x</a><a href=\"https://ok.test\">y</a></p>"),
        "<p>x<a href=\"https://ok.test\">y</a></p>"
    );
}

#[test]
fn legacy_tags_map_onto_marks() {
    assert_eq!(
        sanitize_html("<p><strong>a</strong><em>b</em><span style=\"text-decoration: underline\">c</span></p>"),
        "<p><b>a</b><i>b</i><u>c</u></p>"
    );
    assert_eq!(
        sanitize_html("<p><span style=\"color: red; background: url(x)\">r</span></p>"),
        "<p><span style=\"color:red;\">r</span></p>"
    );
}

#[test]
fn empty_markup_becomes_one_empty_paragraph() {
    let editor = Editor::with_content(EditorConfig::default(), "   ");
    assert_eq!(editor.content(), "<p><br></p>");
    assert!(editor.is_empty());
}

#[test]
fn storage_markup_is_stable() {
    let markup = concat!(
        "<h2 style=\"text-align:center;\">Title</h2>",
        "<blockquote>Quoted</blockquote>",
        "<ul><li>one</li><li style=\"margin-left:40px;\">two</li></ul>",
        "<hr>",
        "<div class=\"image-wrapper\" style=\"float:right;margin-left:15px;\">",
        "<img src=\"https://img.test/a.png\" alt=\"A &amp; B\" style=\"width:320px;height:200px;max-width:100%;\">",
        "<div class=\"image-caption\">Caption</div></div>",
        "<div class=\"table-main-wrapper\"><div class=\"table-responsive\">",
        "<table class=\"table editor-table table-striped\"><thead><tr><th>H</th></tr></thead>",
        "<tbody><tr><td>C</td></tr></tbody></table></div></div>",
        "<p>end</p>",
    );
    let doc = parse_html(markup);
    assert_eq!(to_html(&doc, HtmlMode::Storage), markup);

    match &doc.blocks[4] {
        Block::Image { alt, caption, layout, .. } => {
            assert_eq!(&**alt, "A & B");
            assert_eq!(caption.as_deref(), Some("Caption"));
            assert_eq!(layout.align, MediaAlign::Right);
            assert_eq!((layout.width, layout.height), (Some(320), Some(200)));
        }
        other => panic!("unexpected block {other:?}"),
    }
    match &doc.blocks[5] {
        Block::Table { header, style, responsive, .. } => {
            assert!(*header);
            assert_eq!(*style, TableStyle::Striped);
            assert!(*responsive);
        }
        other => panic!("unexpected block {other:?}"),
    }
}

#[test]
fn surface_markup_carries_ids_that_survive_a_reparse() {
    let mut editor = Editor::with_content(
        EditorConfig::default(),
        "<p>a</p><div class=\"video-main-wrapper\"><iframe src=\"https://www.youtube.com/embed/dQw4w9WgXcQ\"></iframe></div>",
    );
    let surface = editor.surface_html();
    assert!(surface.contains(ID_ATTR));
    assert!(surface.contains("video-edit-btn"));
    assert!(!editor.content().contains(ID_ATTR));
    assert!(!editor.content().contains("edit-btn"));

    let ids: Vec<_> = editor.document().blocks.iter().map(Block::id).collect();
    let reparsed: Vec<_> = parse_html(&surface).blocks.iter().map(Block::id).collect();
    assert_eq!(ids, reparsed);

    // edit controls never leak into stored content
    editor.set_content(&surface);
    assert_eq!(editor.document().count_media(MediaKind::Video), 1);
    assert!(!editor.content().contains("edit-btn"));
}
