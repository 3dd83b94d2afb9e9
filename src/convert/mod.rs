//! Page assembly and notebook export.
//!
//! [`PageAssembler`] turns one page tree into a [`PageArtifact`];
//! [`Exporter`] walks notebooks, section groups and sections and writes
//! every page through a [`Sink`].
//!
//! # Example
//!
//! ```no_run
//! use onemd::convert::PageAssembler;
//! use onemd::io::FsSink;
//! use std::sync::Arc;
//!
//! fn main() -> onemd::Result<()> {
//!     let tree = onemd::parse_file("page.xml")?;
//!     let assembler = PageAssembler::new(Arc::new(FsSink::new("out")));
//!     let artifact = assembler.write("page-1", &tree)?;
//!     println!("{}", artifact.output_path.display());
//!     Ok(())
//! }
//! ```

mod export;

pub use export::{ExportOptions, Exporter};

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::io::{BinaryContentProvider, FileImporter, FsFileImporter, NullProvider, Sink};
use crate::model::{DocumentNode, NodeKind, PageArtifact, PageMetadata, StyleCatalog};
use crate::render::{
    plain_text, MarkdownRenderer, PathContext, RenderContext, RenderOptions, RenderState,
    RenderStats,
};
use crate::util::{sanitize_file_name, UNTITLED};

/// Renders single pages.
///
/// Every call builds a fresh catalog and render state, so one assembler can
/// be shared between threads. File names are unique per output directory:
/// a second page with the same title gets a ` (2)` suffix, while the same
/// page id always gets back the name it was given first.
#[derive(Clone)]
pub struct PageAssembler {
    sink: Arc<dyn Sink>,
    provider: Arc<dyn BinaryContentProvider>,
    importer: Arc<dyn FileImporter>,
    options: RenderOptions,
    names: Arc<Mutex<StemRegistry>>,
}

impl PageAssembler {
    /// Create an assembler writing to `sink`, without a binary source and
    /// with file-system attachment import.
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self {
            sink,
            provider: Arc::new(NullProvider),
            importer: Arc::new(FsFileImporter::new()),
            options: RenderOptions::default(),
            names: Arc::new(Mutex::new(StemRegistry::default())),
        }
    }

    /// Set the source of image payloads.
    pub fn with_provider(mut self, provider: Arc<dyn BinaryContentProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Set the attachment importer.
    pub fn with_importer(mut self, importer: Arc<dyn FileImporter>) -> Self {
        self.importer = importer;
        self
    }

    /// Set render options.
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Render options in use.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Output sink.
    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    /// File stem for `page_id` titled `title` in the sink's current
    /// directory, claimed for that page.
    pub fn reserve_stem(&self, page_id: &str, title: &str) -> String {
        let base = sanitize_file_name(title);
        let stem = self
            .names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .claim(self.sink.output_dir(), &base, page_id);
        if stem != base {
            log::debug!("Page {} renamed to {} to avoid a clash", page_id, stem);
        }
        stem
    }

    /// Render a page without writing the Markdown file.
    ///
    /// Media are written to the sink. On failure, media written for this
    /// page are removed again.
    pub fn assemble(&self, page_id: &str, tree: &DocumentNode) -> Result<PageArtifact> {
        self.render(page_id, tree).map(|rendered| rendered.artifact)
    }

    /// Render a page and return its statistics.
    pub fn assemble_with_stats(
        &self,
        page_id: &str,
        tree: &DocumentNode,
    ) -> Result<(PageArtifact, RenderStats)> {
        self.render(page_id, tree)
            .map(|rendered| (rendered.artifact, rendered.stats))
    }

    /// Render a page and write it through the sink.
    pub fn write(&self, page_id: &str, tree: &DocumentNode) -> Result<PageArtifact> {
        self.write_with_stats(page_id, tree).map(|(artifact, _)| artifact)
    }

    /// Render a page, write it and return its statistics.
    pub fn write_with_stats(
        &self,
        page_id: &str,
        tree: &DocumentNode,
    ) -> Result<(PageArtifact, RenderStats)> {
        let rendered = self.render(page_id, tree)?;

        if self.options.cancellation.is_cancelled() {
            self.rollback(page_id, &rendered.media);
            return Err(Error::Cancelled);
        }

        if let Err(e) = self.sink.write_page_artifact(&rendered.artifact) {
            self.rollback(page_id, &rendered.media);
            return Err(e);
        }

        log::info!("Wrote {}", rendered.artifact.output_path.display());
        Ok((rendered.artifact, rendered.stats))
    }

    fn render(&self, page_id: &str, tree: &DocumentNode) -> Result<Rendered> {
        let catalog = StyleCatalog::from_page(tree);
        let title = page_title(tree);
        let stem = self.reserve_stem(page_id, &title);
        let paths = PathContext::with_stem(&title, stem, self.sink.output_dir());
        let output_path = paths.page_path.clone();

        let context = RenderContext {
            page_id,
            provider: Arc::clone(&self.provider),
            importer: Arc::clone(&self.importer),
            sink: self.sink.as_ref(),
        };
        let mut renderer =
            MarkdownRenderer::new(&catalog, &self.options, context, RenderState::new(paths));

        let rendered = render_page(&mut renderer, tree);
        let (state, mut stats) = renderer.finish();

        let body = match rendered {
            Ok(body) => body,
            Err(e) => {
                self.rollback(page_id, &state.written_media);
                return Err(e);
            }
        };

        let mut metadata = PageMetadata::from_page(tree);
        if metadata.title.is_none() {
            metadata.title = Some(title.clone());
        }

        let mut content = String::new();
        if self.options.include_frontmatter {
            content.push_str(&metadata.to_yaml_frontmatter());
        }
        content.push_str(body.trim_start_matches('\n'));

        if self.options.collect_stats {
            stats.add_page();
        }

        log::debug!(
            "Rendered page {} ({} bytes, {} media)",
            page_id,
            content.len(),
            state.written_media.len()
        );

        Ok(Rendered {
            artifact: PageArtifact {
                page_id: page_id.to_string(),
                title,
                content,
                output_path,
                metadata,
            },
            stats,
            media: state.written_media,
        })
    }

    fn rollback(&self, page_id: &str, media: &[PathBuf]) {
        if media.is_empty() {
            return;
        }
        log::debug!("Removing {} media file(s) of page {}", media.len(), page_id);
        for path in media {
            if let Err(e) = self.sink.remove_media_file(path) {
                log::warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

/// File stems handed out per output directory, keyed case-insensitively.
#[derive(Debug, Default)]
struct StemRegistry {
    claimed: HashMap<PathBuf, HashMap<String, String>>,
}

impl StemRegistry {
    fn claim(&mut self, dir: PathBuf, base: &str, page_id: &str) -> String {
        let taken = self.claimed.entry(dir).or_default();
        let mut n = 1;
        loop {
            let candidate = if n == 1 {
                base.to_string()
            } else {
                format!("{} ({})", base, n)
            };
            match taken.entry(candidate.to_lowercase()) {
                Entry::Vacant(slot) => {
                    slot.insert(page_id.to_string());
                    return candidate;
                }
                Entry::Occupied(owner) if owner.get() == page_id => return candidate,
                Entry::Occupied(_) => n += 1,
            }
        }
    }
}

/// A rendered page before it is written.
struct Rendered {
    artifact: PageArtifact,
    stats: RenderStats,
    media: Vec<PathBuf>,
}

impl std::fmt::Debug for PageAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageAssembler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn render_page(renderer: &mut MarkdownRenderer<'_>, tree: &DocumentNode) -> Result<String> {
    let mut content = String::new();
    if let Some(title) = tree.find_first(NodeKind::Title) {
        content.push_str(&renderer.render_root(title)?);
    }
    content.push_str(&renderer.render_body(tree)?);
    Ok(content)
}

/// Display title: the first paragraph of the title block, as plain text.
pub fn page_title(tree: &DocumentNode) -> String {
    tree.find_first(NodeKind::Title)
        .and_then(|title| title.find_first(NodeKind::Oe))
        .map(|oe| plain_text(&oe.value()))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}
