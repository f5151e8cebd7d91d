mod ast;
mod commands;
mod config;
mod diff;
mod dialog;
mod editor;
mod error;
mod format;
mod history;
mod html;
mod listeners;
mod media;
mod resize;
mod selection;
mod session;
mod table;
mod text;
mod upload;

pub use ast::*;
pub use commands::*;
pub use config::*;
pub use diff::*;
pub use dialog::*;
pub use editor::*;
pub use error::*;
pub use history::*;
pub use html::*;
pub use listeners::*;
pub use media::*;
pub use resize::*;
pub use selection::*;
pub use session::*;
pub use table::*;
pub use text::*;
pub use upload::*;
