//! Element tree for OneNote page XML.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a page element, resolved once from its local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Page root
    Page,
    /// Page title block
    Title,
    /// Body outline container
    Outline,
    /// Children group (`OEChildren`), drives list indentation
    OeChildren,
    /// Paragraph container (`OE`), carries the quick style index
    Oe,
    /// Text run (`T`)
    Text,
    /// List marker group
    List,
    /// Unordered list marker
    Bullet,
    /// Ordered list marker
    Number,
    /// Tag occurrence (checkbox or symbol)
    Tag,
    /// Table
    Table,
    /// Column declaration group
    Columns,
    /// Column declaration
    Column,
    /// Table row
    Row,
    /// Table cell
    Cell,
    /// Image declaration
    Image,
    /// Image size declaration
    Size,
    /// Binary content reference (`CallbackID`)
    CallbackId,
    /// Inline base64 binary payload
    Data,
    /// OCR payload
    OcrData,
    /// Inserted file reference
    InsertedFile,
    /// Quick style declaration
    QuickStyleDef,
    /// Tag declaration
    TagDef,
    /// Anything else
    Other,
}

impl NodeKind {
    /// Resolve a namespace-stripped element name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Page" => NodeKind::Page,
            "Title" => NodeKind::Title,
            "Outline" => NodeKind::Outline,
            "OEChildren" => NodeKind::OeChildren,
            "OE" => NodeKind::Oe,
            "T" => NodeKind::Text,
            "List" => NodeKind::List,
            "Bullet" => NodeKind::Bullet,
            "Number" => NodeKind::Number,
            "Tag" => NodeKind::Tag,
            "Table" => NodeKind::Table,
            "Columns" => NodeKind::Columns,
            "Column" => NodeKind::Column,
            "Row" => NodeKind::Row,
            "Cell" => NodeKind::Cell,
            "Image" => NodeKind::Image,
            "Size" => NodeKind::Size,
            "CallbackID" => NodeKind::CallbackId,
            "Data" => NodeKind::Data,
            "OCRData" => NodeKind::OcrData,
            "InsertedFile" => NodeKind::InsertedFile,
            "QuickStyleDef" => NodeKind::QuickStyleDef,
            "TagDef" => NodeKind::TagDef,
            _ => NodeKind::Other,
        }
    }
}

/// One element of a page tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Local element name (namespace prefix removed)
    pub name: String,

    /// Resolved element kind
    pub kind: NodeKind,

    /// Attributes keyed by local name
    pub attributes: HashMap<String, String>,

    /// Direct text and CDATA content
    pub text: String,

    /// Child elements in document order
    pub children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: NodeKind::from_name(&name),
            name,
            attributes: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the direct text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: DocumentNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child elements.
    pub fn with_children(mut self, children: impl IntoIterator<Item = DocumentNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Get an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Get an attribute value, treating empty strings as absent.
    pub fn non_empty_attr(&self, key: &str) -> Option<&str> {
        self.attr(key).filter(|v| !v.is_empty())
    }

    /// Check whether this element is of the given kind.
    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind == kind
    }

    /// Check if the element has child elements.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Concatenated text of this element and all descendants.
    pub fn value(&self) -> String {
        let mut out = String::new();
        self.collect_value(&mut out);
        out
    }

    fn collect_value(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_value(out);
        }
    }

    /// Iterate over this element and all descendants, depth first.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// All descendants (including self) of the given kind, in document order.
    pub fn find_all(&self, kind: NodeKind) -> impl Iterator<Item = &DocumentNode> {
        self.descendants().filter(move |n| n.kind == kind)
    }

    /// First descendant (including self) of the given kind.
    pub fn find_first(&self, kind: NodeKind) -> Option<&DocumentNode> {
        self.descendants().find(|n| n.kind == kind)
    }

    /// Indented outline of the tree, one element per line.
    ///
    /// Text runs are shown with their content, e.g. `T [Hello]`.
    pub fn outline_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.collect_outline(0, &mut lines);
        lines
    }

    fn collect_outline(&self, depth: usize, lines: &mut Vec<String>) {
        let mut line = " ".repeat(depth * 3);
        line.push_str(&self.name);
        if self.kind == NodeKind::Text && !self.text.is_empty() {
            line.push_str(&format!(" [{}]", self.text));
        }
        lines.push(line);

        for child in &self.children {
            child.collect_outline(depth + 1, lines);
        }
    }
}

/// Depth-first, document-order iterator over a subtree.
pub struct Descendants<'a> {
    stack: Vec<&'a DocumentNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a DocumentNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
