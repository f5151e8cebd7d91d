use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rte_core::{
    parse_html, sanitize_html, to_html, Block, DiffEngine, Document, Editor, EditorCommand, EditorConfig, HtmlMode,
    Inline, TextAlign, TextKind,
};

fn paragraph(text: &str) -> Block {
    Block::Text {
        id: uuid::Uuid::new_v4(),
        kind: TextKind::Paragraph,
        align: TextAlign::Left,
        indent: 0,
        content: vec![Inline::plain(text)],
        dirty: false,
    }
}

fn build_large_doc(blocks: usize) -> Document {
    let blocks = (0..blocks).map(|i| paragraph(&format!("{i} Grüße, a paragraph used for render timing."))).collect();
    Document::from_blocks(blocks)
}

fn pasted_markup(blocks: usize) -> String {
    let mut raw = String::new();
    for i in 0..blocks {
        raw.push_str(&format!(
            "<p style=\"color:red;background:url(x)\" onclick=\"x()\"><strong>{i}</strong> text <a href=\"javascript:x\">bad</a> \
             <span style=\"text-decoration: underline\">under</span></p><script>alert(1)</script>"
        ));
    }
    raw
}

fn sanitize_pasted(c: &mut Criterion) {
    let raw = pasted_markup(200);
    c.bench_function("sanitize_200_blocks", |b| b.iter(|| sanitize_html(&raw)));
}

fn parse_storage(c: &mut Criterion) {
    let markup = to_html(&build_large_doc(1000), HtmlMode::Storage);
    c.bench_function("parse_1000_blocks", |b| b.iter(|| parse_html(&markup)));
}

fn serialize_storage(c: &mut Criterion) {
    let doc = build_large_doc(1000);
    c.bench_function("serialize_1000_blocks", |b| b.iter(|| to_html(&doc, HtmlMode::Storage)));
}

fn serialize_surface(c: &mut Criterion) {
    let doc = build_large_doc(1000);
    c.bench_function("serialize_surface_1000_blocks", |b| b.iter(|| to_html(&doc, HtmlMode::Surface)));
}

fn diff_10k_blocks_1_changed(c: &mut Criterion) {
    let mut doc = build_large_doc(10_000);
    let mut diff = DiffEngine::new();
    let _ = diff.incremental_diff(&doc);
    if let Some(Block::Text { content, dirty, .. }) = doc.blocks.get_mut(5000) {
        content.push(Inline::plain("x"));
        *dirty = true;
    }
    c.bench_function("diff_10k_blocks_1_changed", |b| b.iter(|| diff.incremental_diff(&doc)));
}

fn typing_latency(c: &mut Criterion) {
    let markup = to_html(&build_large_doc(200), HtmlMode::Storage);
    let mut editor = Editor::with_content(EditorConfig::default(), &markup);
    c.bench_function("typing_latency_200_blocks", |b| {
        b.iter(|| editor.execute(EditorCommand::InsertText("a".to_string())))
    });
}

fn undo_100_ops(c: &mut Criterion) {
    c.bench_function("undo_100_ops", |b| {
        b.iter_batched(
            || {
                let mut editor = Editor::new(EditorConfig::default());
                for _ in 0..100 {
                    editor.execute(EditorCommand::InsertText("?".to_string()));
                }
                editor
            },
            |mut editor| {
                for _ in 0..100 {
                    editor.execute(EditorCommand::Undo);
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    sanitize_pasted,
    parse_storage,
    serialize_storage,
    serialize_surface,
    diff_10k_blocks_1_changed,
    typing_latency,
    undo_100_ops
);
criterion_main!(benches);
