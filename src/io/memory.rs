//! In-memory sink, used for previews and tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;
use crate::model::PageArtifact;
use crate::util::sanitize_file_name;

use super::Sink;

#[derive(Debug, Default)]
struct Inner {
    stack: Vec<String>,
    media: BTreeMap<PathBuf, Vec<u8>>,
    pages: Vec<PageArtifact>,
}

/// Sink that keeps every page and media file in memory.
#[derive(Debug)]
pub struct MemorySink {
    root: PathBuf,
    inner: Mutex<Inner>,
}

impl MemorySink {
    /// Create a sink that pretends to write below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Written media files keyed by path.
    pub fn media_files(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.inner().media.clone()
    }

    /// Check if a media file is present.
    pub fn has_media(&self, path: &Path) -> bool {
        self.inner().media.contains_key(path)
    }

    /// Written pages in write order.
    pub fn pages(&self) -> Vec<PageArtifact> {
        self.inner().pages.clone()
    }

    /// Find a written page by its identifier.
    pub fn page(&self, page_id: &str) -> Option<PageArtifact> {
        self.inner()
            .pages
            .iter()
            .find(|p| p.page_id == page_id)
            .cloned()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new("")
    }
}

impl Sink for MemorySink {
    fn output_dir(&self) -> PathBuf {
        let inner = self.inner();
        let mut dir = self.root.clone();
        for name in &inner.stack {
            dir.push(name);
        }
        dir
    }

    fn push_directory(&self, name: &str) -> Result<()> {
        self.inner().stack.push(sanitize_file_name(name));
        Ok(())
    }

    fn pop_directory(&self) {
        self.inner().stack.pop();
    }

    fn write_media_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.inner().media.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn remove_media_file(&self, path: &Path) -> Result<()> {
        self.inner().media.remove(path);
        Ok(())
    }

    fn write_page_artifact(&self, artifact: &PageArtifact) -> Result<()> {
        let mut inner = self.inner();
        // Rewriting a page replaces the earlier artifact.
        inner.pages.retain(|p| p.output_path != artifact.output_path);
        inner.pages.push(artifact.clone());
        Ok(())
    }
}
