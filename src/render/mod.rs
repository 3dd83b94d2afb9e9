//! Rendering of page element trees to Markdown.

mod inline;
mod json;
mod markdown;
mod media;
mod options;
mod result;
mod state;

pub use inline::{convert_text, plain_text};
pub use json::{to_manifest_json, JsonFormat};
pub use markdown::MarkdownRenderer;
pub use media::{decode_inline_data, RenderContext};
pub use options::{CancellationToken, RenderOptions, DEFAULT_IO_TIMEOUT};
pub use result::RenderStats;
pub use state::{ImageState, PathContext, RenderState, TableState};
