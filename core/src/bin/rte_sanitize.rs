use std::path::PathBuf;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: rte_sanitize <input_html> <output_html>");
        std::process::exit(2);
    }
    let input = PathBuf::from(&args[1]);
    let output = PathBuf::from(&args[2]);
    let raw = match std::fs::read_to_string(&input) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("read failed: {:?}", err);
            std::process::exit(1);
        }
    };
    let doc = rte_core::parse_html(&raw);
    let html = rte_core::to_html(&doc, rte_core::HtmlMode::Storage);
    if let Err(err) = std::fs::write(&output, html) {
        eprintln!("write failed: {:?}", err);
        std::process::exit(1);
    }
    eprintln!("{} blocks written to {}", doc.blocks.len(), output.display());
}
