//! # onemd
//!
//! OneNote page XML to Markdown conversion.
//!
//! Pages are parsed into an element tree, rendered with their quick style
//! and tag definitions, and written together with their images and
//! inserted files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use onemd::{parse_file, Onemd};
//!
//! fn main() -> onemd::Result<()> {
//!     // Render a single exported page
//!     let markdown = onemd::to_markdown("page.xml")?;
//!     println!("{}", markdown);
//!
//!     // Or write it next to its media
//!     let artifact = Onemd::new()
//!         .with_frontmatter()
//!         .parse("page.xml")?
//!         .write_to("./out")?;
//!     println!("{}", artifact.output_path.display());
//!
//!     let tree = parse_file("page.xml")?;
//!     for line in tree.outline_lines() {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Styles**: headings, citations, code and quotes from quick styles
//! - **Lists and tags**: nested bullets, numbered items, to-do checkboxes
//! - **Tables**: pipe tables with a header separator
//! - **Media**: images from a binary source or inline data, copied attachments
//! - **Hierarchy export**: notebooks, section groups and sections, optionally in parallel

pub mod convert;
pub mod error;
pub mod io;
pub mod model;
pub mod parser;
pub mod render;
mod util;

// Re-export commonly used types
pub use convert::{page_title, ExportOptions, Exporter, PageAssembler};
pub use error::{Error, Result};
pub use io::{
    BinaryContentProvider, DirectoryProvider, FileImporter, FsFileImporter, FsSink,
    HierarchyEntry, HierarchyKind, HierarchyNavigator, MemorySink, NullProvider, Sink,
    XmlHierarchy,
};
pub use model::{
    DocumentNode, NodeKind, PageArtifact, PageMetadata, StyleCatalog, StyleDef, TagDef, TagType,
};
pub use parser::{parse_xml, ParseOptions, XmlParser};
pub use render::{
    to_manifest_json, CancellationToken, JsonFormat, RenderOptions, RenderStats,
};
pub use util::{file_url, sanitize_file_name};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Parse a page XML file into an element tree.
///
/// # Example
///
/// ```no_run
/// use onemd::parse_file;
///
/// let tree = parse_file("page.xml").unwrap();
/// println!("{}", tree.name);
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<DocumentNode> {
    XmlParser::new().parse_file(path)
}

/// Parse a page XML file with custom options.
///
/// # Example
///
/// ```no_run
/// use onemd::{parse_file_with_options, ParseOptions};
///
/// let options = ParseOptions::new().lenient();
/// let tree = parse_file_with_options("page.xml", options).unwrap();
/// ```
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    options: ParseOptions,
) -> Result<DocumentNode> {
    XmlParser::with_options(options).parse_file(path)
}

/// Parse page XML from bytes.
pub fn parse_bytes(data: &[u8]) -> Result<DocumentNode> {
    XmlParser::new().parse_bytes(data)
}

/// Convert a page XML file to Markdown.
///
/// Images are not resolved and attachments are not copied; use [`Onemd`]
/// or [`PageAssembler`] for that.
///
/// # Example
///
/// ```no_run
/// let markdown = onemd::to_markdown("page.xml").unwrap();
/// std::fs::write("page.md", markdown).unwrap();
/// ```
pub fn to_markdown<P: AsRef<Path>>(path: P) -> Result<String> {
    Onemd::new().parse(path)?.to_markdown()
}

/// Builder for parsing and converting single pages.
///
/// # Example
///
/// ```no_run
/// use onemd::{DirectoryProvider, Onemd};
/// use std::sync::Arc;
///
/// let artifact = Onemd::new()
///     .with_provider(Arc::new(DirectoryProvider::new("./binaries")))
///     .with_image_format("jpg")
///     .lenient()
///     .parse("page.xml")?
///     .write_to("./out")?;
/// # Ok::<(), onemd::Error>(())
/// ```
pub struct Onemd {
    parse_options: ParseOptions,
    render_options: RenderOptions,
    provider: Arc<dyn BinaryContentProvider>,
    importer: Arc<dyn FileImporter>,
}

impl Onemd {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::default(),
            render_options: RenderOptions::default(),
            provider: Arc::new(NullProvider),
            importer: Arc::new(FsFileImporter::new()),
        }
    }

    /// Enable lenient parsing mode.
    pub fn lenient(mut self) -> Self {
        self.parse_options = self.parse_options.lenient();
        self
    }

    /// Keep whitespace-only text nodes.
    pub fn keep_whitespace(mut self) -> Self {
        self.parse_options = self.parse_options.with_whitespace_text(true);
        self
    }

    /// Enable frontmatter in output.
    pub fn with_frontmatter(mut self) -> Self {
        self.render_options = self.render_options.with_frontmatter(true);
        self
    }

    /// Set the fallback image format.
    pub fn with_image_format(mut self, format: impl Into<String>) -> Self {
        self.render_options = self.render_options.with_image_format(format);
        self
    }

    /// Set the timeout for binary fetches and attachment copies.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.render_options = self.render_options.with_io_timeout(timeout);
        self
    }

    /// Collect render statistics.
    pub fn with_stats(mut self) -> Self {
        self.render_options = self.render_options.with_stats(true);
        self
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

    /// Parse a page file.
    ///
    /// The page id is taken from the page's `ID` attribute, or the file
    /// stem when there is none.
    pub fn parse<P: AsRef<Path>>(self, path: P) -> Result<OnemdPage> {
        let path = path.as_ref();
        let tree = XmlParser::with_options(self.parse_options.clone()).parse_file(path)?;
        let fallback_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.into_page(tree, fallback_id))
    }

    /// Parse page XML from a string.
    pub fn parse_str(self, xml: &str) -> Result<OnemdPage> {
        let tree = XmlParser::with_options(self.parse_options.clone()).parse_str(xml)?;
        Ok(self.into_page(tree, String::new()))
    }

    fn into_page(self, tree: DocumentNode, fallback_id: String) -> OnemdPage {
        let page_id = tree
            .non_empty_attr("ID")
            .map(str::to_string)
            .unwrap_or(fallback_id);
        OnemdPage {
            page_id,
            tree,
            render_options: self.render_options,
            provider: self.provider,
            importer: self.importer,
        }
    }
}

impl Default for Onemd {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed page, ready to render.
pub struct OnemdPage {
    page_id: String,
    tree: DocumentNode,
    render_options: RenderOptions,
    provider: Arc<dyn BinaryContentProvider>,
    importer: Arc<dyn FileImporter>,
}

impl OnemdPage {
    fn assembler(&self, sink: Arc<dyn Sink>) -> PageAssembler {
        PageAssembler::new(sink)
            .with_provider(Arc::clone(&self.provider))
            .with_importer(Arc::clone(&self.importer))
            .with_options(self.render_options.clone())
    }

    /// Render to Markdown. Media are kept in memory and discarded.
    pub fn to_markdown(&self) -> Result<String> {
        let sink = Arc::new(MemorySink::default());
        let artifact = self.assembler(sink).assemble(&self.page_id, &self.tree)?;
        Ok(artifact.content)
    }

    /// Render with statistics. Media are kept in memory and discarded.
    pub fn to_markdown_with_stats(&self) -> Result<(String, RenderStats)> {
        let sink = Arc::new(MemorySink::default());
        let mut options = self.render_options.clone();
        options.collect_stats = true;
        let assembler = self.assembler(sink).with_options(options);
        let (artifact, stats) = assembler.assemble_with_stats(&self.page_id, &self.tree)?;
        Ok((artifact.content, stats))
    }

    /// Write the page and its media below `dir`.
    pub fn write_to(&self, dir: impl Into<PathBuf>) -> Result<PageArtifact> {
        let sink = Arc::new(FsSink::new(dir));
        self.assembler(sink).write(&self.page_id, &self.tree)
    }

    /// Display title.
    pub fn title(&self) -> String {
        page_title(&self.tree)
    }

    /// Page identifier.
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Indented element outline, one line per element.
    pub fn outline(&self) -> Vec<String> {
        self.tree.outline_lines()
    }

    /// Get the element tree.
    pub fn tree(&self) -> &DocumentNode {
        &self.tree
    }
}
