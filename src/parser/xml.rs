//! Page XML reader built on quick-xml.

use std::borrow::Cow;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::model::DocumentNode;

use super::{ErrorMode, ParseOptions};

/// Parses OneNote page or hierarchy XML into a [`DocumentNode`] tree.
///
/// Namespace prefixes are removed from element and attribute names, and
/// `xmlns` declarations are dropped.
#[derive(Debug, Clone, Default)]
pub struct XmlParser {
    options: ParseOptions,
}

impl XmlParser {
    /// Create a parser with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with custom options.
    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Parse a file.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<DocumentNode> {
        let bytes = std::fs::read(path)?;
        self.parse_bytes(&bytes)
    }

    /// Parse raw bytes (UTF-8, optional BOM).
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<DocumentNode> {
        let content = std::str::from_utf8(strip_bom(bytes))
            .map_err(|e| Error::MalformedXml(format!("invalid UTF-8: {}", e)))?;
        self.parse_str(content)
    }

    /// Parse an XML string.
    pub fn parse_str(&self, content: &str) -> Result<DocumentNode> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<DocumentNode> = Vec::new();
        let mut root: Option<DocumentNode> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    stack.push(element(&e)?);
                }
                Event::Empty(e) => {
                    let node = element(&e)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let mut node = stack
                        .pop()
                        .ok_or_else(|| Error::MalformedXml("unbalanced end tag".into()))?;
                    self.finish_text(&mut node);
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(e) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e);
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Event::GeneralRef(e) => {
                    let name = String::from_utf8_lossy(&e);
                    let resolved = unescape(&format!("&{};", name)).into_owned();
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&resolved);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            match self.options.error_mode {
                ErrorMode::Strict => {
                    return Err(Error::MalformedXml(format!(
                        "{} unclosed element(s) at end of input",
                        stack.len()
                    )));
                }
                ErrorMode::Lenient => {
                    log::warn!("Closing {} unterminated element(s)", stack.len());
                    while let Some(mut node) = stack.pop() {
                        self.finish_text(&mut node);
                        attach(&mut stack, &mut root, node)?;
                    }
                }
            }
        }

        root.ok_or_else(|| Error::MalformedXml("document has no root element".into()))
    }

    /// Drop the collected text of a closed element when it is nothing but
    /// whitespace. Text is only judged as a whole, since quick-xml reports
    /// the text around entity references as separate events.
    fn finish_text(&self, node: &mut DocumentNode) {
        if self.options.strip_whitespace_text && node.text.trim().is_empty() {
            node.text.clear();
        }
    }
}

/// Parse an XML string with default options.
pub fn parse_xml(content: &str) -> Result<DocumentNode> {
    XmlParser::new().parse_str(content)
}

fn element(start: &BytesStart<'_>) -> Result<DocumentNode> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut node = DocumentNode::new(name);

    for attr in start.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        node.attributes.insert(local, unescape(&raw).into_owned());
    }

    Ok(node)
}

fn attach(
    stack: &mut [DocumentNode],
    root: &mut Option<DocumentNode>,
    node: DocumentNode,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(node);
            Ok(())
        }
        None => Err(Error::MalformedXml("multiple root elements".into())),
    }
}

/// Resolve predefined and numeric XML entities, keeping unknown ones verbatim.
fn unescape(raw: &str) -> Cow<'_, str> {
    match quick_xml::escape::unescape(raw) {
        Ok(text) => text,
        Err(_) => Cow::Borrowed(raw),
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}
