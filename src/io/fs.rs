//! File-system backed collaborators.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::model::{DocumentNode, PageArtifact};
use crate::parser::XmlParser;
use crate::util::sanitize_file_name;

use super::{
    BinaryContentProvider, FileImporter, HierarchyEntry, HierarchyKind, HierarchyNavigator, Sink,
};

/// Writes pages and media below a root directory.
///
/// Page files are staged next to their destination and renamed into place,
/// so a failed or cancelled render never leaves a half-written page.
#[derive(Debug)]
pub struct FsSink {
    root: PathBuf,
    stack: Mutex<Vec<String>>,
}

impl FsSink {
    /// Create a sink rooted at `root`. The directory is created on demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stack: Mutex::new(Vec::new()),
        }
    }

    /// Root output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stack(&self) -> MutexGuard<'_, Vec<String>> {
        self.stack.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sink for FsSink {
    fn output_dir(&self) -> PathBuf {
        let mut dir = self.root.clone();
        for name in self.stack().iter() {
            dir.push(name);
        }
        dir
    }

    fn push_directory(&self, name: &str) -> Result<()> {
        self.stack().push(sanitize_file_name(name));
        let dir = self.output_dir();
        if let Err(e) = fs::create_dir_all(&dir) {
            self.stack().pop();
            return Err(e.into());
        }
        log::debug!("Entered output directory {}", dir.display());
        Ok(())
    }

    fn pop_directory(&self) {
        self.stack().pop();
    }

    fn write_media_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        ensure_parent(path)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn remove_media_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_page_artifact(&self, artifact: &PageArtifact) -> Result<()> {
        let path = &artifact.output_path;
        ensure_parent(path)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Other(format!("invalid page path {}", path.display())))?;
        let staging = path.with_file_name(format!(".{}.tmp", file_name));

        fs::write(&staging, artifact.content.as_bytes())?;
        if let Err(e) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Copies attachments with `std::fs::copy`, creating parent directories.
#[derive(Debug, Clone, Default)]
pub struct FsFileImporter;

impl FsFileImporter {
    /// Create a new importer.
    pub fn new() -> Self {
        Self
    }
}

impl FileImporter for FsFileImporter {
    fn copy(&self, source: &Path, dest: &Path) -> Result<()> {
        ensure_parent(dest)?;
        fs::copy(source, dest)?;
        Ok(())
    }

    fn remove(&self, dest: &Path) -> Result<()> {
        match fs::remove_file(dest) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads binary payloads exported as files.
///
/// Looks for `<root>/<page id>/<reference id>` first, then
/// `<root>/<reference id>`.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    /// Create a provider reading from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BinaryContentProvider for DirectoryProvider {
    fn fetch(&self, page_id: &str, reference_id: &str) -> Result<Vec<u8>> {
        if !self.root.is_dir() {
            return Err(Error::SourceUnavailable(format!(
                "binary directory {} does not exist",
                self.root.display()
            )));
        }

        let candidates = [
            self.root
                .join(sanitize_file_name(page_id))
                .join(sanitize_file_name(reference_id)),
            self.root.join(sanitize_file_name(reference_id)),
        ];

        for candidate in &candidates {
            if candidate.is_file() {
                return Ok(fs::read(candidate)?);
            }
        }

        Err(Error::NotFound(format!(
            "binary content {} for page {}",
            reference_id, page_id
        )))
    }
}

/// Provider for sources without binary content; every fetch fails.
#[derive(Debug, Clone, Default)]
pub struct NullProvider;

impl BinaryContentProvider for NullProvider {
    fn fetch(&self, page_id: &str, reference_id: &str) -> Result<Vec<u8>> {
        Err(Error::NotFound(format!(
            "no binary source configured for {} on page {}",
            reference_id, page_id
        )))
    }
}

/// Navigator over an exported hierarchy document and a directory of pages.
///
/// The hierarchy document uses the `Notebooks > Notebook > SectionGroup >
/// Section > Page` layout with `ID` and `name` attributes. Page trees are
/// read from `<pages dir>/<page id>.xml`.
#[derive(Debug, Clone)]
pub struct XmlHierarchy {
    tree: DocumentNode,
    pages_dir: PathBuf,
    parser: XmlParser,
}

impl XmlHierarchy {
    /// Load the hierarchy file.
    pub fn open(hierarchy: impl AsRef<Path>, pages_dir: impl Into<PathBuf>) -> Result<Self> {
        let hierarchy = hierarchy.as_ref();
        let bytes = fs::read(hierarchy).map_err(|e| {
            Error::SourceUnavailable(format!("{}: {}", hierarchy.display(), e))
        })?;
        let parser = XmlParser::new();
        let tree = parser.parse_bytes(&bytes)?;
        Ok(Self::from_tree(tree, pages_dir))
    }

    /// Build a navigator from an already parsed hierarchy tree.
    pub fn from_tree(tree: DocumentNode, pages_dir: impl Into<PathBuf>) -> Self {
        Self {
            tree,
            pages_dir: pages_dir.into(),
            parser: XmlParser::new(),
        }
    }

    fn find_by_id(&self, id: &str) -> Option<&DocumentNode> {
        self.tree.descendants().find(|n| n.attr("ID") == Some(id))
    }
}

fn is_recycled(node: &DocumentNode) -> bool {
    node.attr("isRecycleBin") == Some("true") || node.attr("isInRecycleBin") == Some("true")
}

impl HierarchyNavigator for XmlHierarchy {
    fn list_children(
        &self,
        container_id: Option<&str>,
        kind: HierarchyKind,
    ) -> Result<Vec<HierarchyEntry>> {
        let element = kind.element_name();

        let entries: Vec<&DocumentNode> = match container_id {
            Some(id) => {
                let container = self
                    .find_by_id(id)
                    .ok_or_else(|| Error::NotFound(format!("container {}", id)))?;
                container
                    .children
                    .iter()
                    .filter(|n| n.name == element)
                    .collect()
            }
            None => self.tree.descendants().filter(|n| n.name == element).collect(),
        };

        Ok(entries
            .into_iter()
            .filter(|n| !is_recycled(n))
            .filter_map(|n| {
                let id = n.non_empty_attr("ID")?;
                Some(HierarchyEntry {
                    id: id.to_string(),
                    name: n.attr("name").unwrap_or_default().to_string(),
                    kind,
                })
            })
            .collect())
    }

    fn resolve_id(&self, kind: HierarchyKind, name: &str) -> Result<Option<String>> {
        let element = kind.element_name();
        Ok(self
            .tree
            .descendants()
            .find(|n| n.name == element && n.attr("name") == Some(name))
            .and_then(|n| n.attr("ID"))
            .map(str::to_string))
    }

    fn page_tree(&self, page_id: &str) -> Result<DocumentNode> {
        let path = self
            .pages_dir
            .join(format!("{}.xml", sanitize_file_name(page_id)));
        if !path.is_file() {
            return Err(Error::NotFound(format!("page {} ({})", page_id, path.display())));
        }
        self.parser.parse_file(&path)
    }
}
