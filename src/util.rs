//! Path helpers shared by the renderer and the file-system sink.

use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use unicode_normalization::UnicodeNormalization;

/// Stem used when a page or section has no usable name.
pub const UNTITLED: &str = "Untitled";

/// Characters escaped in `file://` link targets. `/` and `:` stay literal.
const FILE_URL: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'(')
    .add(b')')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'^');

/// Turn a page title or section name into a safe file name.
///
/// Unicode is NFC-normalized, characters that are reserved on common file
/// systems become `_`, surrounding whitespace and dots are trimmed.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .nfc()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build a `file://` link target with forward slashes and percent-encoding.
pub fn file_url(path: &Path) -> String {
    let slashed = path.to_string_lossy().replace('\\', "/");
    format!("file://{}", utf8_percent_encode(&slashed, FILE_URL))
}
