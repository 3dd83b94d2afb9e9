//! Quick style and tag definitions declared at the top of a page.

use super::{DocumentNode, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Heading style names that stop list indentation.
const HEADING_STYLES: [&str; 5] = ["h1", "h2", "h3", "h4", "h5"];

/// A quick style declaration (`QuickStyleDef`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDef {
    /// Index referenced by `quickStyleIndex` attributes
    pub index: String,

    /// Style name (e.g. "PageTitle", "h1", "p", "cite")
    pub name: String,
}

impl StyleDef {
    /// Create a new style definition.
    pub fn new(index: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            name: name.into(),
        }
    }

    /// Check if this style is one of the `h1`-`h5` heading styles.
    pub fn is_heading(&self) -> bool {
        HEADING_STYLES.contains(&self.name.as_str())
    }

    /// Markdown wrapper for paragraphs carrying this style.
    pub fn markdown(&self) -> MarkdownWrapper {
        match self.name.as_str() {
            "PageTitle" => MarkdownWrapper::heading(1),
            "h1" => MarkdownWrapper::heading(1),
            "h2" => MarkdownWrapper::heading(2),
            "h3" => MarkdownWrapper::heading(3),
            "h4" => MarkdownWrapper::heading(4),
            "h5" => MarkdownWrapper::heading(5),
            "h6" => MarkdownWrapper::heading(6),
            "cite" => MarkdownWrapper::inline("*"),
            "code" => MarkdownWrapper::inline("`"),
            "blockquote" | "quote" => MarkdownWrapper::new("> ", "", false),
            _ => MarkdownWrapper::plain(),
        }
    }
}

/// Opening and closing markup resolved from a quick style.
///
/// The opening half is written where the styled paragraph starts; the
/// closing half waits in the renderer's pending slot until the next
/// paragraph (or table, or the end of the page) begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownWrapper {
    /// Markup emitted at the paragraph position
    pub open: String,

    /// Markup committed when the paragraph scope is flushed
    pub close: String,

    /// True when `open` already starts on a fresh line
    pub opens_line: bool,
}

impl MarkdownWrapper {
    /// Create a wrapper.
    pub fn new(open: impl Into<String>, close: impl Into<String>, opens_line: bool) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            opens_line,
        }
    }

    /// ATX heading with a blank line before it.
    pub fn heading(level: usize) -> Self {
        Self::new(format!("\n\n{} ", "#".repeat(level)), "\n", true)
    }

    /// Symmetric inline marker such as `*` or a backtick.
    pub fn inline(marker: &str) -> Self {
        Self::new(marker, marker, false)
    }

    /// Plain paragraph: only a line break.
    pub fn plain() -> Self {
        Self::new("", "", false)
    }
}

/// Tag type, decided by the numeric `type` attribute of a `TagDef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagType {
    /// Built-in "To Do" checkbox
    ToDo,
    /// Prioritized "To Do" checkboxes
    ToDo2,
    /// Any other symbol tag
    Other(u32),
    /// Type attribute missing or not numeric
    Unknown,
}

impl TagType {
    /// Parse the `type` attribute value.
    pub fn parse(value: Option<&str>) -> Self {
        match value.and_then(|v| v.trim().parse::<u32>().ok()) {
            Some(0) => TagType::ToDo,
            Some(26) | Some(27) => TagType::ToDo2,
            Some(n) => TagType::Other(n),
            None => TagType::Unknown,
        }
    }

    /// Check if this tag renders as a checkbox.
    pub fn is_todo(&self) -> bool {
        matches!(self, TagType::ToDo | TagType::ToDo2)
    }
}

/// A tag declaration (`TagDef`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDef {
    /// Index referenced by `Tag` occurrences
    pub index: String,

    /// Display name (e.g. "Important")
    pub name: String,

    /// Symbol identifier
    pub symbol: String,

    /// Tag type
    pub tag_type: TagType,
}

impl TagDef {
    /// Create a new tag definition.
    pub fn new(
        index: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        tag_type: TagType,
    ) -> Self {
        Self {
            index: index.into(),
            name: name.into(),
            symbol: symbol.into(),
            tag_type,
        }
    }

    /// Label text used for non-checkbox tags.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.symbol
        } else {
            &self.name
        }
    }

    /// Markdown emitted after the `- ` marker for non-checkbox tags.
    pub fn markdown(&self) -> String {
        format!("{}: ", self.label())
    }
}

/// Per-page lookup tables for style and tag definitions.
#[derive(Debug, Clone, Default)]
pub struct StyleCatalog {
    styles: HashMap<String, StyleDef>,
    tags: HashMap<String, TagDef>,
}

impl StyleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the declarations found anywhere in a page tree.
    ///
    /// Definitions without an `index` attribute are skipped. Index
    /// collisions keep the last declaration.
    pub fn from_page(page: &DocumentNode) -> Self {
        let mut catalog = Self::new();

        for node in page.descendants() {
            match node.kind {
                NodeKind::QuickStyleDef => match node.attr("index") {
                    Some(index) => catalog.add_style(StyleDef::new(
                        index,
                        node.attr("name").unwrap_or_default(),
                    )),
                    None => log::debug!("QuickStyleDef without index skipped"),
                },
                NodeKind::TagDef => match node.attr("index") {
                    Some(index) => catalog.add_tag(TagDef::new(
                        index,
                        node.attr("name").unwrap_or_default(),
                        node.attr("symbol").unwrap_or_default(),
                        TagType::parse(node.attr("type")),
                    )),
                    None => log::debug!("TagDef without index skipped"),
                },
                _ => {}
            }
        }

        catalog
    }

    /// Register a style definition.
    pub fn add_style(&mut self, def: StyleDef) {
        self.styles.insert(def.index.clone(), def);
    }

    /// Register a tag definition.
    pub fn add_tag(&mut self, def: TagDef) {
        self.tags.insert(def.index.clone(), def);
    }

    /// Look up a style by index.
    pub fn style(&self, index: &str) -> Option<&StyleDef> {
        self.styles.get(index)
    }

    /// Look up a tag by index.
    pub fn tag(&self, index: &str) -> Option<&TagDef> {
        self.tags.get(index)
    }

    /// Number of style definitions.
    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    /// Number of tag definitions.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}
