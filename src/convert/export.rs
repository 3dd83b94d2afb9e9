//! Notebook, section group and section export.

use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::io::{
    BinaryContentProvider, DirectoryScope, FileImporter, HierarchyEntry, HierarchyKind,
    HierarchyNavigator, Sink,
};
use crate::model::{DocumentNode, PageArtifact};
use crate::render::{CancellationToken, RenderOptions, RenderStats};

use super::{page_title, PageAssembler};

/// Callback invoked after every written page.
pub type ProgressFn = dyn Fn(&PageArtifact) + Send + Sync;

/// Options for exporting a hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Rendering options applied to every page
    pub render: RenderOptions,

    /// Render the pages of a section in parallel
    pub parallel: bool,
}

impl ExportOptions {
    /// Create new export options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }

    /// Enable or disable parallel page rendering.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Use an existing cancellation token for every page.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.render.cancellation = token;
        self
    }

    /// Cancellation token shared by all pages of the export.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.render.cancellation
    }
}

/// Writes whole notebooks, section groups and sections.
///
/// Section groups and sections get their own output directories; a
/// notebook does not. A page that fails is logged and skipped; errors that
/// make the whole run pointless (unavailable source, cancellation) stop
/// the export.
pub struct Exporter {
    navigator: Arc<dyn HierarchyNavigator>,
    assembler: PageAssembler,
    parallel: bool,
    stats: Mutex<RenderStats>,
    progress: Option<Arc<ProgressFn>>,
}

impl Exporter {
    /// Create an exporter over `navigator`, writing to `sink`.
    pub fn new(navigator: Arc<dyn HierarchyNavigator>, sink: Arc<dyn Sink>) -> Self {
        Self {
            navigator,
            assembler: PageAssembler::new(sink),
            parallel: false,
            stats: Mutex::new(RenderStats::new()),
            progress: None,
        }
    }

    /// Set the source of image payloads.
    pub fn with_provider(mut self, provider: Arc<dyn BinaryContentProvider>) -> Self {
        self.assembler = self.assembler.with_provider(provider);
        self
    }

    /// Set the attachment importer.
    pub fn with_importer(mut self, importer: Arc<dyn FileImporter>) -> Self {
        self.assembler = self.assembler.with_importer(importer);
        self
    }

    /// Set export options.
    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.parallel = options.parallel;
        self.assembler = self.assembler.with_options(options.render);
        self
    }

    /// Report every written page to `progress`.
    pub fn with_progress(mut self, progress: impl Fn(&PageArtifact) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Statistics accumulated over all pages written so far.
    pub fn stats(&self) -> RenderStats {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Render and write one page.
    pub fn export_page(&self, page_id: &str) -> Result<PageArtifact> {
        let tree = self.navigator.page_tree(page_id)?;
        self.write_tree(page_id, &tree)
    }

    fn write_tree(&self, page_id: &str, tree: &DocumentNode) -> Result<PageArtifact> {
        let (artifact, stats) = self.assembler.write_with_stats(page_id, tree)?;

        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .merge(&stats);
        if let Some(progress) = &self.progress {
            progress(&artifact);
        }
        Ok(artifact)
    }

    /// Render one page without writing the Markdown file.
    ///
    /// Media still go to the sink.
    pub fn preview_page(&self, page_id: &str) -> Result<PageArtifact> {
        let tree = self.navigator.page_tree(page_id)?;
        self.assembler.assemble(page_id, &tree)
    }

    /// Write every page of a section into a directory named after it.
    pub fn export_section(&self, section_id: &str, name: &str) -> Result<Vec<PageArtifact>> {
        if section_id.is_empty() {
            return Ok(Vec::new());
        }
        let pages = self
            .navigator
            .list_children(Some(section_id), HierarchyKind::Page)?;

        let _scope = DirectoryScope::enter(self.assembler.sink(), name)?;
        log::info!("Exporting section {} ({} pages)", name, pages.len());
        self.export_pages(&pages)
    }

    /// Look up a section by name and export it.
    pub fn export_section_by_name(&self, name: &str) -> Result<Vec<PageArtifact>> {
        let id = self
            .navigator
            .resolve_id(HierarchyKind::Section, name)?
            .ok_or_else(|| Error::NotFound(format!("section {}", name)))?;
        self.export_section(&id, name)
    }

    /// Write a section group: nested groups first, then its sections.
    pub fn export_section_group(&self, group_id: &str, name: &str) -> Result<Vec<PageArtifact>> {
        if group_id.is_empty() {
            return Ok(Vec::new());
        }
        let _scope = DirectoryScope::enter(self.assembler.sink(), name)?;
        self.export_container(group_id)
    }

    /// Look up a notebook by name and write all of its groups and sections.
    pub fn export_notebook(&self, name: &str) -> Result<Vec<PageArtifact>> {
        let id = self
            .navigator
            .resolve_id(HierarchyKind::Notebook, name)?
            .ok_or_else(|| Error::NotFound(format!("notebook {}", name)))?;
        log::info!("Exporting notebook {}", name);
        self.export_container(&id)
    }

    fn export_container(&self, container_id: &str) -> Result<Vec<PageArtifact>> {
        let mut written = Vec::new();

        for group in self
            .navigator
            .list_children(Some(container_id), HierarchyKind::SectionGroup)?
        {
            written.extend(self.export_section_group(&group.id, &group.name)?);
        }
        for section in self
            .navigator
            .list_children(Some(container_id), HierarchyKind::Section)?
        {
            written.extend(self.export_section(&section.id, &section.name)?);
        }

        Ok(written)
    }

    fn export_pages(&self, pages: &[HierarchyEntry]) -> Result<Vec<PageArtifact>> {
        let results: Vec<Result<PageArtifact>> = if self.parallel {
            let trees: Vec<Result<DocumentNode>> = pages
                .par_iter()
                .map(|page| self.navigator.page_tree(&page.id))
                .collect();

            // Claim file names in section order so clashes resolve the same
            // way as in a sequential export.
            for (page, tree) in pages.iter().zip(&trees) {
                if let Ok(tree) = tree {
                    self.assembler.reserve_stem(&page.id, &page_title(tree));
                }
            }

            pages
                .par_iter()
                .zip(trees)
                .map(|(page, tree)| tree.and_then(|tree| self.write_tree(&page.id, &tree)))
                .collect()
        } else {
            let mut results = Vec::with_capacity(pages.len());
            for page in pages {
                let result = self.export_page(&page.id);
                let stop = matches!(&result, Err(e) if e.is_fatal_to_run());
                results.push(result);
                if stop {
                    break;
                }
            }
            results
        };

        let mut written = Vec::with_capacity(results.len());
        for (page, result) in pages.iter().zip(results) {
            match result {
                Ok(artifact) => written.push(artifact),
                Err(e) if e.is_fatal_to_run() => return Err(e),
                Err(e) => log::warn!("Skipping page {} ({}): {}", page.name, page.id, e),
            }
        }
        Ok(written)
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("assembler", &self.assembler)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemorySink, XmlHierarchy};
    use crate::parser::parse_xml;
    use std::path::PathBuf;

    const HIERARCHY: &str = r#"<Notebooks>
  <Notebook name="Home" ID="nb">
    <SectionGroup name="Archive" ID="sg">
      <Section name="2020" ID="s-old"><Page ID="p-old" name="Old" /></Section>
    </SectionGroup>
    <Section name="Inbox" ID="s-in">
      <Page ID="p-a" name="A" />
      <Page ID="p-b" name="B" />
    </Section>
  </Notebook>
</Notebooks>"#;

    fn page_xml(title: &str) -> String {
        format!(
            r#"<Page><QuickStyleDef index="0" name="PageTitle" /><Title><OE quickStyleIndex="0"><T>{0}</T></OE></Title><Outline><OEChildren><OE><T>body of {0}</T></OE></OEChildren></Outline></Page>"#,
            title
        )
    }

    fn fixture(dir: &std::path::Path) -> XmlHierarchy {
        for (id, title) in [("p-old", "Old"), ("p-a", "A"), ("p-b", "B")] {
            std::fs::write(dir.join(format!("{}.xml", id)), page_xml(title)).unwrap();
        }
        XmlHierarchy::from_tree(parse_xml(HIERARCHY).unwrap(), dir)
    }

    #[test]
    fn test_export_notebook_layout() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new("/out"));
        let exporter = Exporter::new(Arc::new(fixture(dir.path())), sink.clone());

        let written = exporter.export_notebook("Home").unwrap();
        let paths: Vec<PathBuf> = written.iter().map(|a| a.output_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/out/Archive/2020/Old.md"),
                PathBuf::from("/out/Inbox/A.md"),
                PathBuf::from("/out/Inbox/B.md"),
            ]
        );
        assert_eq!(sink.pages().len(), 3);
        assert_eq!(sink.output_dir(), PathBuf::from("/out"));
    }

    #[test]
    fn test_parallel_section_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new("/out"));
        let exporter = Exporter::new(Arc::new(fixture(dir.path())), sink)
            .with_options(ExportOptions::new().with_parallel(true));

        let written = exporter.export_section_by_name("Inbox").unwrap();
        let titles: Vec<&str> = written.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_missing_page_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let nav = fixture(dir.path());
        std::fs::remove_file(dir.path().join("p-a.xml")).unwrap();

        let sink = Arc::new(MemorySink::new("/out"));
        let exporter = Exporter::new(Arc::new(nav), sink);
        let written = exporter.export_section("s-in", "Inbox").unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].title, "B");
    }

    #[test]
    fn test_unknown_notebook() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(
            Arc::new(fixture(dir.path())),
            Arc::new(MemorySink::new("/out")),
        );
        assert!(matches!(
            exporter.export_notebook("Work"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_cancelled_export_stops() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new("/out"));
        let token = CancellationToken::new();
        token.cancel();
        let exporter = Exporter::new(Arc::new(fixture(dir.path())), sink.clone())
            .with_options(ExportOptions::new().with_cancellation(token));

        assert!(matches!(
            exporter.export_notebook("Home"),
            Err(Error::Cancelled)
        ));
        assert!(sink.pages().is_empty());
        assert_eq!(sink.output_dir(), PathBuf::from("/out"));
    }

    #[test]
    fn test_progress_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_callback = Arc::clone(&seen);
        let exporter = Exporter::new(
            Arc::new(fixture(dir.path())),
            Arc::new(MemorySink::new("/out")),
        )
        .with_options(
            ExportOptions::new().with_render_options(RenderOptions::new().with_stats(true)),
        )
        .with_progress(move |artifact| {
            seen_in_callback.lock().unwrap().push(artifact.title.clone());
        });

        exporter.export_section_by_name("Inbox").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(exporter.stats().page_count, 2);
    }
}
