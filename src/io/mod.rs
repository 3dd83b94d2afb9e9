//! Collaborators around the renderer: notebook navigation, binary payloads,
//! attachment import and output persistence.
//!
//! The renderer only talks to these traits. File-system backed
//! implementations live in [`fs`], an in-memory sink in [`memory`].

pub mod fs;
pub mod memory;
mod timeout;

pub use fs::{DirectoryProvider, FsFileImporter, FsSink, NullProvider, XmlHierarchy};
pub use memory::MemorySink;
pub(crate) use timeout::with_timeout;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{DocumentNode, PageArtifact};

/// Kind of an entry in the notebook hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyKind {
    /// Notebook
    Notebook,
    /// Section group
    SectionGroup,
    /// Section
    Section,
    /// Page
    Page,
}

impl HierarchyKind {
    /// Element name used by hierarchy XML.
    pub fn element_name(&self) -> &'static str {
        match self {
            HierarchyKind::Notebook => "Notebook",
            HierarchyKind::SectionGroup => "SectionGroup",
            HierarchyKind::Section => "Section",
            HierarchyKind::Page => "Page",
        }
    }
}

impl std::fmt::Display for HierarchyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HierarchyKind::Notebook => write!(f, "notebook"),
            HierarchyKind::SectionGroup => write!(f, "section group"),
            HierarchyKind::Section => write!(f, "section"),
            HierarchyKind::Page => write!(f, "page"),
        }
    }
}

/// One notebook, section group, section or page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    /// Source identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Entry kind
    pub kind: HierarchyKind,
}

/// Supplies the notebook structure and page trees.
pub trait HierarchyNavigator: Send + Sync {
    /// Direct children of `container_id` (or top-level entries when `None`)
    /// of the requested kind, in document order.
    fn list_children(
        &self,
        container_id: Option<&str>,
        kind: HierarchyKind,
    ) -> Result<Vec<HierarchyEntry>>;

    /// Find the identifier of the first entry of `kind` named `name`.
    fn resolve_id(&self, kind: HierarchyKind, name: &str) -> Result<Option<String>>;

    /// Load the full element tree of a page.
    fn page_tree(&self, page_id: &str) -> Result<DocumentNode>;
}

/// Resolves `CallbackID` references to binary payloads.
///
/// Implementations must be idempotent and safe to retry.
pub trait BinaryContentProvider: Send + Sync {
    /// Fetch the bytes behind `reference_id` on page `page_id`.
    fn fetch(&self, page_id: &str, reference_id: &str) -> Result<Vec<u8>>;
}

/// Copies inserted files next to the rendered page.
pub trait FileImporter: Send + Sync {
    /// Copy `source` to `dest`.
    fn copy(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Remove a copy made earlier. A missing `dest` is not an error.
    fn remove(&self, dest: &Path) -> Result<()>;
}

/// Output destination for pages and media.
///
/// The directory stack namespaces output by section hierarchy; use
/// [`DirectoryScope`] so that every push is matched by a pop.
pub trait Sink: Send + Sync {
    /// Directory pages and media are currently written to.
    fn output_dir(&self) -> PathBuf;

    /// Enter a sub-directory.
    fn push_directory(&self, name: &str) -> Result<()>;

    /// Leave the most recently entered sub-directory.
    fn pop_directory(&self);

    /// Write a media file at an absolute path inside the output tree.
    fn write_media_file(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Remove a media file written earlier. Missing files are not an error.
    fn remove_media_file(&self, path: &Path) -> Result<()>;

    /// Persist a rendered page at its `output_path`.
    fn write_page_artifact(&self, artifact: &PageArtifact) -> Result<()>;
}

/// Pushes a sink directory and pops it again when dropped.
pub struct DirectoryScope<'a> {
    sink: &'a dyn Sink,
}

impl<'a> DirectoryScope<'a> {
    /// Enter `name` on `sink`.
    pub fn enter(sink: &'a dyn Sink, name: &str) -> Result<Self> {
        sink.push_directory(name)?;
        Ok(Self { sink })
    }
}

impl Drop for DirectoryScope<'_> {
    fn drop(&mut self) {
        self.sink.pop_directory();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_directory_scope_pops_on_error() {
        let sink = MemorySink::new("/out");

        let result: Result<()> = (|| {
            let _outer = DirectoryScope::enter(&sink, "Work")?;
            let _inner = DirectoryScope::enter(&sink, "Meetings")?;
            assert_eq!(sink.output_dir(), PathBuf::from("/out/Work/Meetings"));
            Err(Error::Other("boom".into()))
        })();

        assert!(result.is_err());
        assert_eq!(sink.output_dir(), PathBuf::from("/out"));
    }

    #[test]
    fn test_hierarchy_kind_names() {
        assert_eq!(HierarchyKind::SectionGroup.element_name(), "SectionGroup");
        assert_eq!(HierarchyKind::Section.to_string(), "section");
    }
}
