//! Document model types for OneNote page content.
//!
//! A page arrives as an element tree ([`DocumentNode`]) whose element kinds
//! are resolved once at parse time. Style and tag declarations are gathered
//! per page into a [`StyleCatalog`], and a finished render is packaged as a
//! [`PageArtifact`].

mod catalog;
mod node;
mod page;

pub use catalog::{MarkdownWrapper, StyleCatalog, StyleDef, TagDef, TagType};
pub use node::{Descendants, DocumentNode, NodeKind};
pub use page::{PageArtifact, PageMetadata};
