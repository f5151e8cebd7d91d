use futures::executor::block_on;
use rte_core::{
    extract_video_id, form_for_element, resize_preserving_aspect, Block, DialogForm, Editor, EditorConfig,
    ImageRequest, ImageSource, MediaAlign, MediaKind, MediaRequest, PendingUpload, Position, ResolvedImage,
    ResolvedMedia, Selection, Size, TableEditor, TableRequest, TableStyle, UploadError, Uploader, VideoRequest,
};

struct NoUploads;

impl Uploader for NoUploads {
    async fn upload(&self, _file: PendingUpload) -> Result<String, UploadError> {
        Err(UploadError::Server("uploads disabled".into()))
    }
}

fn image(src: &str, align: MediaAlign) -> ResolvedMedia {
    ResolvedMedia::Image(ResolvedImage {
        src: src.into(),
        alt: "alt".into(),
        caption: None,
        layout: rte_core::MediaLayout { align, width: Some(400), height: Some(300), responsive: false },
    })
}

fn editor_at(markup: &str, offset: usize) -> Editor {
    let mut editor = Editor::with_content(EditorConfig::default(), markup);
    let node = editor.document().containers()[0];
    editor.set_selection(Some(Selection::collapsed(Position::new(node, offset))));
    editor
}

#[test]
fn video_ids_from_every_accepted_shape() {
    for input in [
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "https://youtu.be/dQw4w9WgXcQ",
        "https://www.youtube.com/embed/dQw4w9WgXcQ",
        "dQw4w9WgXcQ",
        "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
        "  https://youtu.be/dQw4w9WgXcQ?t=42  ",
    ] {
        assert_eq!(extract_video_id(input).as_deref(), Some("dQw4w9WgXcQ"), "{input}");
    }
    assert_eq!(extract_video_id("https://example.com/notavideo"), None);
    assert_eq!(extract_video_id(""), None);
    let once = extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap();
    assert_eq!(extract_video_id(&once), Some(once.clone()));
}

#[test]
fn invalid_video_url_is_reported() {
    let err = VideoRequest::from_url("https://example.com/notavideo", MediaAlign::Center, true).unwrap_err();
    assert_eq!(err, rte_core::MediaError::InvalidVideoUrl("https://example.com/notavideo".into()));
}

#[test]
fn resize_keeps_aspect_ratio() {
    let size = resize_preserving_aspect(Size::new(400.0, 300.0), 200.0, 0.0, 1000.0);
    assert_eq!(size.rounded(), (600, 450));
    let small = resize_preserving_aspect(Size::new(400.0, 300.0), -390.0, -290.0, 1000.0);
    assert_eq!(small.width, 50.0);
    assert!((small.height - 37.5).abs() < 1.0);
    let wide = resize_preserving_aspect(Size::new(400.0, 300.0), 900.0, 0.0, 800.0);
    assert_eq!(wide.rounded(), (800, 600));
}

#[test]
fn table_dimensions_default_and_clamp() {
    let req = TableRequest::from_input("abc", "-2", true, TableStyle::Striped, false);
    assert_eq!((req.rows, req.cols), (3, 3));
    let req = TableRequest::from_input("1000", "1000", false, TableStyle::Default, false);
    assert_eq!((req.rows, req.cols), (50, 20));
    let req = TableRequest::from_input("0", "1", false, TableStyle::Default, false);
    assert_eq!((req.rows, req.cols), (3, 1));
}

#[test]
fn built_table_counts_header_in_rows() {
    let block = TableEditor::build(&TableRequest::default());
    assert_eq!(TableEditor::dimensions(&block), Some((3, 3)));
    let html = rte_core::block_to_html(&block, rte_core::HtmlMode::Storage);
    assert!(html.contains("<thead><tr><th>Header 1</th>"));
    assert!(html.contains("<td>Cell 1-1</td>"));
    assert!(html.starts_with("<div class=\"table-main-wrapper\"><table class=\"table editor-table\">"));
}

#[test]
fn block_insert_splits_the_paragraph_around_the_cursor() {
    let mut editor = editor_at("<p>HelloWorld</p>", 5);
    let id = editor.apply_media(ResolvedMedia::Table(TableRequest::default()), None).unwrap();
    let blocks = &editor.document().blocks;
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[1].id(), id);
    assert_eq!(rte_core::plain_text(blocks[0].inline_groups()[0]), "Hello");
    assert_eq!(rte_core::plain_text(blocks[2].inline_groups()[0]), "World");
    let cursor = editor.selection().unwrap();
    assert!(cursor.is_collapsed());
    assert_eq!(cursor.focus, Position::new(blocks[2].id(), 0));
}

#[test]
fn media_at_document_end_gets_a_trailing_paragraph() {
    let mut editor = editor_at("<p>Hi</p>", 2);
    editor.apply_media(image("https://img.test/a.png", MediaAlign::Left), None).unwrap();
    let blocks = &editor.document().blocks;
    assert!(matches!(blocks.last(), Some(Block::Text { .. })));
    assert_eq!(editor.document().count_media(MediaKind::Image), 1);
    assert!(editor.content().contains("style=\"float:left;margin-right:15px;\""));
    assert!(editor.content().contains("width:400px;height:300px;max-width:100%;"));
}

#[test]
fn re_editing_an_image_keeps_a_single_node() {
    let mut editor = editor_at("<p>Text</p>", 4);
    let id = editor.apply_media(image("https://img.test/a.png", MediaAlign::Left), None).unwrap();
    let blocks_before = editor.document().blocks.len();

    let Some(DialogForm::Image(mut form)) = form_for_element(&editor, id) else {
        panic!("image form expected");
    };
    assert_eq!(form.align, MediaAlign::Left);
    assert_eq!(form.width, "400");
    form.align = MediaAlign::Center;
    let request = DialogForm::Image(form).to_request(editor.config()).unwrap();
    let resolved = block_on(request.resolve(&NoUploads)).unwrap();
    assert_eq!(editor.apply_media(resolved, Some(id)), Some(id));

    assert_eq!(editor.document().count_media(MediaKind::Image), 1);
    assert_eq!(editor.document().blocks.len(), blocks_before);
    match editor.document().block(id) {
        Some(Block::Image { layout, src, .. }) => {
            assert_eq!(layout.align, MediaAlign::Center);
            assert_eq!(&**src, "https://img.test/a.png");
        }
        other => panic!("unexpected block {other:?}"),
    }
    assert!(editor.content().contains("display:block;text-align:center;"));
}

#[test]
fn re_editing_a_table_keeps_cell_content() {
    let mut editor = Editor::with_content(
        EditorConfig::default(),
        "<table><thead><tr><th>Name</th><th>Age</th></tr></thead><tbody><tr><td>Ada</td><td>36</td></tr></tbody></table><p>x</p>",
    );
    let id = editor.document().blocks[0].id();
    let request = TableRequest { rows: 3, cols: 3, header: true, style: TableStyle::Bordered, responsive: true };
    assert_eq!(editor.apply_media(ResolvedMedia::Table(request), Some(id)), Some(id));
    let table = editor.document().block(id).unwrap();
    assert_eq!(TableEditor::dimensions(table), Some((3, 3)));
    let html = rte_core::block_to_html(table, rte_core::HtmlMode::Storage);
    assert!(html.contains("<th>Name</th><th>Age</th><th>Header 3</th>"));
    assert!(html.contains("<td>Ada</td><td>36</td>"));
    assert!(html.contains("table-bordered"));
    assert!(html.contains("<div class=\"table-responsive\">"));
    assert_eq!(editor.document().count_media(MediaKind::Table), 1);
}

#[test]
fn image_file_wins_over_url_and_url_needs_no_upload() {
    let file = PendingUpload::new("cat.png", vec![1, 2, 3]);
    let source = ImageSource::choose(Some(file.clone()), "https://img.test/url.png").unwrap();
    assert_eq!(source, ImageSource::Upload(file));
    let request = MediaRequest::Image(ImageRequest {
        source: ImageSource::choose(None, "https://img.test/url.png").unwrap(),
        alt: String::new(),
        caption: Some("  ".into()),
        width: None,
        height: None,
        align: MediaAlign::Right,
    });
    match block_on(request.resolve(&NoUploads)).unwrap() {
        ResolvedMedia::Image(image) => {
            assert_eq!(image.src, "https://img.test/url.png");
            assert_eq!(image.caption, None);
            assert_eq!(image.layout.align, MediaAlign::Right);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn drag_resize_commits_on_release() {
    let mut editor = editor_at("<p>Hi</p>", 2);
    let id = editor.apply_media(image("https://img.test/a.png", MediaAlign::Center), None).unwrap();
    let entries = editor.history().len();
    assert!(editor.begin_resize(id, Size::new(400.0, 300.0), 900.0));
    assert_eq!(editor.selected_media().map(|m| m.id), Some(id));
    editor.drag_resize(100.0, 0.0);
    let last = editor.drag_resize(200.0, 10.0).unwrap();
    assert_eq!(last.rounded(), (600, 450));
    assert_eq!(editor.history().len(), entries);
    assert_eq!(editor.end_resize(), Some((600, 450)));
    assert!(!editor.is_resizing());
    assert_eq!(editor.history().len(), entries + 1);
    assert!(editor.hidden_value().contains("width:600px;height:450px;"));
}

#[test]
fn selection_is_exclusive_across_kinds() {
    let mut editor = editor_at("<p>Hi</p>", 2);
    let img = editor.apply_media(image("https://img.test/a.png", MediaAlign::Center), None).unwrap();
    let table = editor.apply_media(ResolvedMedia::Table(TableRequest::default()), None).unwrap();
    editor.select_media(img).unwrap();
    let selected = editor.select_media(table).unwrap();
    assert_eq!(selected.kind, MediaKind::Table);
    assert_eq!(editor.selected_media(), Some(selected));
    assert_eq!(editor.deselect_media(), Some(selected));
    assert_eq!(editor.selected_media(), None);
}

#[test]
fn video_markup_uses_embed_url_and_layout() {
    let mut editor = editor_at("<p>Hi</p>", 2);
    let video = VideoRequest::from_url("https://youtu.be/dQw4w9WgXcQ", MediaAlign::Right, false)
        .unwrap()
        .with_size(Some(640), Some(360));
    let id = editor.apply_media(ResolvedMedia::Video(video), None).unwrap();
    let html = editor.content();
    assert!(html.contains("src=\"https://www.youtube.com/embed/dQw4w9WgXcQ\""));
    assert!(html.contains("video-wrapper float-right fixed-size"));
    assert!(html.contains("width:640px;height:360px;"));
    let reparsed = rte_core::parse_html(&html);
    let block = reparsed.blocks.iter().find(|b| b.media_kind() == Some(MediaKind::Video)).unwrap();
    match block {
        Block::Video { video_id, layout, .. } => {
            assert_eq!(&**video_id, "dQw4w9WgXcQ");
            assert_eq!(layout.align, MediaAlign::Right);
            assert_eq!((layout.width, layout.height), (Some(640), Some(360)));
        }
        _ => unreachable!(),
    }
    assert_ne!(block.id(), id);
}
