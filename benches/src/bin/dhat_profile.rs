use rte_core::{parse_html, to_html, Editor, EditorCommand, EditorConfig, HtmlMode};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing_subscriber::filter::LevelFilter::WARN).init();
    let _profiler = dhat::Profiler::new_heap();
    let mut markup = String::new();
    for i in 0..2000 {
        markup.push_str(&format!("<p>Paragraph {i}: <b>{}</b></p>", "text ".repeat(10)));
    }
    let doc = parse_html(&markup);
    let _ = to_html(&doc, HtmlMode::Surface);

    let mut editor = Editor::with_content(EditorConfig::default(), &markup);
    for _ in 0..500 {
        editor.execute(EditorCommand::InsertText("x".to_string()));
    }
    let _ = editor.content();
}
