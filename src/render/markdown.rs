//! Markdown rendering of page element trees.

use crate::error::{Error, Result};
use crate::model::{DocumentNode, NodeKind, StyleCatalog};

use super::inline::convert_text;
use super::media::decode_inline_data;
use super::options::is_image_extension;
use super::{RenderContext, RenderOptions, RenderState, RenderStats};

/// Indentation unit for nested lists and tags.
const INDENT: &str = "  ";

/// An ancestor on the current render path.
#[derive(Clone, Copy)]
struct Frame<'t> {
    node: &'t DocumentNode,
    /// Position of `node` among its parent's children
    index: usize,
}

/// Markdown renderer for one page.
///
/// Owns the page's [`RenderState`]; create a new renderer for every page.
pub struct MarkdownRenderer<'a> {
    catalog: &'a StyleCatalog,
    options: &'a RenderOptions,
    context: RenderContext<'a>,
    state: RenderState,
    stats: RenderStats,
}

impl<'a> MarkdownRenderer<'a> {
    /// Create a renderer.
    pub fn new(
        catalog: &'a StyleCatalog,
        options: &'a RenderOptions,
        context: RenderContext<'a>,
        state: RenderState,
    ) -> Self {
        Self {
            catalog,
            options,
            context,
            state,
            stats: RenderStats::new(),
        }
    }

    /// Current render state.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Statistics collected so far.
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Consume the renderer, returning its state and statistics.
    pub fn finish(self) -> (RenderState, RenderStats) {
        (self.state, self.stats)
    }

    /// Render the children of `root` and flush the pending fragment.
    pub fn render_root(&mut self, root: &DocumentNode) -> Result<String> {
        let mut output = String::new();
        let mut ancestors = vec![Frame {
            node: root,
            index: 0,
        }];
        self.render_children(root, 0, &mut ancestors, &mut output)?;
        self.state.flush_pending(&mut output);
        Ok(output)
    }

    /// Render the children of an `Image` element used as a fallback root.
    ///
    /// The image declaration is applied first so its format is honoured.
    pub fn render_image_root(&mut self, image: &DocumentNode) -> Result<String> {
        self.arm_image(image);
        let output = self.render_root(image);
        self.state.image.reset();
        output
    }

    /// Render the page body: every `Outline`, or every `Image` when the
    /// outlines produce nothing but whitespace.
    pub fn render_body(&mut self, page: &DocumentNode) -> Result<String> {
        let mut body = String::new();
        for outline in page.find_all(NodeKind::Outline) {
            body.push_str(&self.render_root(outline)?);
        }

        if body.trim().is_empty() {
            let mut fallback = String::new();
            for image in page.find_all(NodeKind::Image) {
                fallback.push_str(&self.render_image_root(image)?);
            }
            if !fallback.trim().is_empty() {
                log::debug!("Page {} rendered from its image fallback", self.context.page_id);
                return Ok(fallback);
            }
        }

        Ok(body)
    }

    fn render_children<'t>(
        &mut self,
        node: &'t DocumentNode,
        level: usize,
        ancestors: &mut Vec<Frame<'t>>,
        output: &mut String,
    ) -> Result<()> {
        for (index, child) in node.children.iter().enumerate() {
            if self.options.cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }
            ancestors.push(Frame { node: child, index });
            let result = self.render_node(child, level, ancestors, output);
            ancestors.pop();
            result?;
        }
        Ok(())
    }

    /// Render one element. `ancestors` ends with the element itself.
    fn render_node<'t>(
        &mut self,
        node: &'t DocumentNode,
        level: usize,
        ancestors: &mut Vec<Frame<'t>>,
        output: &mut String,
    ) -> Result<()> {
        log::trace!("{}{}", " ".repeat(level), node.name);

        match node.kind {
            NodeKind::Oe => self.open_paragraph(node, output),
            NodeKind::Text => output.push_str(&convert_text(&node.text)),
            NodeKind::Bullet => output.push_str(&self.bullet_prefix(ancestors)),
            NodeKind::Number => output.push_str("1. "),
            NodeKind::Tag => self.render_tag(node, ancestors, output),
            NodeKind::Table => return self.render_table(node, level, ancestors, output),
            NodeKind::Row if self.state.table.in_table => {
                return self.render_row(node, level, ancestors, output);
            }
            NodeKind::Column => self.state.table.column_count += 1,
            NodeKind::Cell if self.state.table.in_table => output.push_str(" | "),
            NodeKind::Image => self.arm_image(node),
            NodeKind::Size => self.apply_size(node),
            NodeKind::CallbackId => {
                self.render_callback(node, output)?;
                return Ok(());
            }
            NodeKind::Data => {
                self.render_inline_data(node, output);
                return Ok(());
            }
            NodeKind::OcrData => return Ok(()),
            NodeKind::InsertedFile => {
                if let Some(link) =
                    self.context
                        .import_file(&mut self.state, node, self.options.io_timeout)?
                {
                    if self.options.collect_stats {
                        self.stats.add_attachment();
                    }
                    output.push_str(&link);
                }
            }
            _ => {}
        }

        self.render_children(node, level + 1, ancestors, output)
    }

    fn open_paragraph(&mut self, node: &DocumentNode, output: &mut String) {
        self.state.flush_pending(output);
        if self.options.collect_stats {
            self.stats.add_paragraph();
        }
        if self.state.table.in_table {
            return;
        }
        let Some(index) = node.attr("quickStyleIndex") else {
            return;
        };
        let Some(style) = self.catalog.style(index) else {
            log::debug!("Quick style {} is not declared on the page", index);
            if self.options.collect_stats {
                self.stats.add_missing_definition();
            }
            return;
        };

        let wrapper = style.markdown();
        if !wrapper.opens_line {
            output.push('\n');
        }
        output.push_str(&wrapper.open);
        self.state.set_pending(wrapper.close, output);
    }

    /// Indentation and marker for a bullet.
    ///
    /// Counts `OEChildren` ancestors up to the nearest heading paragraph.
    /// The marker is left out when a tag already started the line.
    fn bullet_prefix(&self, ancestors: &[Frame<'_>]) -> String {
        // ancestors: [.., grandparent, parent, bullet]
        let path = &ancestors[..ancestors.len().saturating_sub(1)];

        let mut depth = 0;
        for frame in path.iter().rev() {
            if self.is_heading_paragraph(frame.node) {
                break;
            }
            if frame.node.is(NodeKind::OeChildren) {
                depth += 1;
            }
        }

        let preceded_by_tag = match path {
            [.., grandparent, parent] if parent.index > 0 => grandparent
                .node
                .children
                .get(parent.index - 1)
                .is_some_and(|sibling| sibling.is(NodeKind::Tag)),
            _ => false,
        };

        if preceded_by_tag {
            INDENT.repeat(depth)
        } else {
            format!("{}- ", INDENT.repeat(depth.saturating_sub(1)))
        }
    }

    fn is_heading_paragraph(&self, node: &DocumentNode) -> bool {
        node.attr("quickStyleIndex")
            .and_then(|index| self.catalog.style(index))
            .is_some_and(|style| style.is_heading())
    }

    /// Indentation is written before the definition is resolved, so an
    /// undeclared tag still keeps its paragraph at the right depth.
    fn render_tag(&mut self, node: &DocumentNode, ancestors: &[Frame<'_>], output: &mut String) {
        let depth = ancestors
            .iter()
            .filter(|frame| frame.node.is(NodeKind::OeChildren))
            .count();
        output.push_str(&INDENT.repeat(depth));

        let Some(index) = node.attr("index") else {
            return;
        };
        let Some(tag) = self.catalog.tag(index) else {
            log::debug!("Tag {} is not declared on the page", index);
            if self.options.collect_stats {
                self.stats.add_missing_definition();
            }
            return;
        };

        if tag.tag_type.is_todo() {
            if node.attr("completed") == Some("true") {
                output.push_str("- [x] ");
            } else {
                output.push_str("- [ ] ");
            }
        } else {
            output.push_str("- ");
            output.push_str(&tag.markdown());
        }

        if self.options.collect_stats {
            self.stats.add_tag();
        }
    }

    fn render_table<'t>(
        &mut self,
        node: &'t DocumentNode,
        level: usize,
        ancestors: &mut Vec<Frame<'t>>,
        output: &mut String,
    ) -> Result<()> {
        self.state.flush_pending(output);
        if self.options.collect_stats {
            self.stats.add_table();
        }

        // Nested tables restore the enclosing table's counters on exit.
        let outer = std::mem::take(&mut self.state.table);
        self.state.table.in_table = true;

        let result = self.render_children(node, level + 1, ancestors, output);
        output.push('\n');
        self.state.table = outer;
        result
    }

    fn render_row<'t>(
        &mut self,
        node: &'t DocumentNode,
        level: usize,
        ancestors: &mut Vec<Frame<'t>>,
        output: &mut String,
    ) -> Result<()> {
        if !self.state.table.header_emitted() {
            output.push('\n');
            output.push_str(&"| - ".repeat(self.state.table.column_count));
            output.push('|');
        }
        output.push('\n');
        self.state.table.row_index += 1;

        self.render_children(node, level + 1, ancestors, output)?;
        output.push_str(" |");
        Ok(())
    }

    fn arm_image(&mut self, node: &DocumentNode) {
        let declared = node
            .non_empty_attr("format")
            .map(|format| format.trim().to_ascii_lowercase());
        let format = match declared {
            Some(format) if is_image_extension(&format) => format,
            Some(format) => {
                log::debug!("Ignoring image format {:?}", format);
                if self.options.collect_stats {
                    self.stats.add_malformed_attribute();
                }
                self.options.default_image_format.clone()
            }
            None => self.options.default_image_format.clone(),
        };
        self.state.image.arm(&format);
    }

    fn apply_size(&mut self, node: &DocumentNode) {
        for (key, slot) in [
            ("width", &mut self.state.image.width),
            ("height", &mut self.state.image.height),
        ] {
            let Some(raw) = node.attr(key) else {
                continue;
            };
            match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => *slot = Some(value),
                _ => {
                    log::debug!("Ignoring malformed image {} {:?}", key, raw);
                    if self.options.collect_stats {
                        self.stats.add_malformed_attribute();
                    }
                }
            }
        }
    }

    fn render_callback(&mut self, node: &DocumentNode, output: &mut String) -> Result<()> {
        let Some(reference) = node.non_empty_attr("callbackID") else {
            log::debug!("CallbackID without reference skipped");
            if self.options.collect_stats {
                self.stats.add_malformed_attribute();
            }
            self.state.image.reset();
            return Ok(());
        };

        if !self.state.image.within_image {
            let format = self.options.default_image_format.clone();
            self.state.image.arm(&format);
        }

        let fetched = self.context.fetch(reference, self.options.io_timeout);
        let stored = fetched.and_then(|bytes| {
            self.context
                .store_image(&mut self.state, &bytes, &self.options.default_image_format)
        });
        self.state.image.reset();

        match stored {
            Ok(markdown) => {
                if self.options.collect_stats {
                    self.stats.add_image();
                }
                output.push_str(&markdown);
                Ok(())
            }
            Err(e) if e.is_fatal_to_run() => Err(e),
            Err(e) => {
                log::warn!(
                    "Skipping image {} on page {}: {}",
                    reference,
                    self.context.page_id,
                    e
                );
                if self.options.collect_stats {
                    self.stats.add_failed_media();
                }
                Ok(())
            }
        }
    }

    fn render_inline_data(&mut self, node: &DocumentNode, output: &mut String) {
        if !self.state.image.within_image {
            let format = self.options.default_image_format.clone();
            self.state.image.arm(&format);
        }

        let stored = decode_inline_data(&node.text).and_then(|bytes| {
            self.context
                .store_image(&mut self.state, &bytes, &self.options.default_image_format)
        });
        self.state.image.reset();

        match stored {
            Ok(markdown) => {
                if self.options.collect_stats {
                    self.stats.add_image();
                }
                output.push_str(&markdown);
            }
            Err(e) => {
                log::warn!(
                    "Skipping inline image on page {}: {}",
                    self.context.page_id,
                    e
                );
                if self.options.collect_stats {
                    self.stats.add_failed_media();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{FsFileImporter, MemorySink, NullProvider};
    use crate::model::{StyleDef, TagDef, TagType};
    use crate::render::PathContext;
    use std::sync::Arc;

    fn node(name: &str) -> DocumentNode {
        DocumentNode::new(name)
    }

    fn text(value: &str) -> DocumentNode {
        node("T").with_text(value)
    }

    fn oe(children: Vec<DocumentNode>) -> DocumentNode {
        node("OE").with_children(children)
    }

    fn render(root: &DocumentNode, catalog: &StyleCatalog) -> String {
        let sink = MemorySink::new("/out");
        let options = RenderOptions::new().with_stats(true);
        let context = RenderContext {
            page_id: "p1",
            provider: Arc::new(NullProvider),
            importer: Arc::new(FsFileImporter::new()),
            sink: &sink,
        };
        let state = RenderState::new(PathContext::new("Page", "/out"));
        let mut renderer = MarkdownRenderer::new(catalog, &options, context, state);
        renderer.render_root(root).unwrap()
    }

    fn catalog() -> StyleCatalog {
        let mut catalog = StyleCatalog::new();
        catalog.add_style(StyleDef::new("0", "h1"));
        catalog.add_style(StyleDef::new("1", "p"));
        catalog.add_style(StyleDef::new("2", "cite"));
        catalog.add_tag(TagDef::new("0", "To Do", "3", TagType::ToDo));
        catalog.add_tag(TagDef::new("1", "Important", "13", TagType::Other(13)));
        catalog
    }

    #[test]
    fn test_heading_paragraph() {
        let root = node("Outline").with_child(
            node("OEChildren").with_child(
                oe(vec![text("Title")]).with_attr("quickStyleIndex", "0"),
            ),
        );
        assert_eq!(render(&root, &catalog()), "\n\n# Title\n");
    }

    #[test]
    fn test_pending_flushed_by_next_paragraph() {
        let root = node("OEChildren")
            .with_child(oe(vec![text("quote")]).with_attr("quickStyleIndex", "2"))
            .with_child(oe(vec![text("body")]).with_attr("quickStyleIndex", "1"));
        assert_eq!(render(&root, &catalog()), "\n*quote*\nbody");
    }

    #[test]
    fn test_unresolved_style_is_plain() {
        let root = node("OEChildren")
            .with_child(oe(vec![text("hello")]).with_attr("quickStyleIndex", "42"));
        assert_eq!(render(&root, &catalog()), "hello");
    }

    #[test]
    fn test_number_marker() {
        let root = oe(vec![node("List").with_child(node("Number")), text("first")]);
        assert_eq!(render(&node("Outline").with_child(root), &catalog()), "1. first");
    }

    #[test]
    fn test_nested_bullets() {
        let inner = oe(vec![node("List").with_child(node("Bullet")), text("child")]);
        let outer = oe(vec![
            node("List").with_child(node("Bullet")),
            text("parent"),
            node("OEChildren").with_child(inner),
        ]);
        let root = node("Outline").with_child(node("OEChildren").with_child(outer));
        assert_eq!(render(&root, &catalog()), "- parent  - child");
    }

    #[test]
    fn test_bullet_depth_stops_at_heading() {
        let item = oe(vec![node("List").with_child(node("Bullet")), text("item")]);
        let heading = oe(vec![text("Head"), node("OEChildren").with_child(item)])
            .with_attr("quickStyleIndex", "0");
        let root = node("Outline").with_child(node("OEChildren").with_child(heading));
        // Only the OEChildren below the heading counts.
        assert_eq!(render(&root, &catalog()), "\n\n# Head\n- item");
    }

    #[test]
    fn test_bullet_after_tag_skips_marker() {
        let item = oe(vec![
            node("Tag").with_attr("index", "0").with_attr("completed", "true"),
            node("List").with_child(node("Bullet")),
            text("done"),
        ]);
        let root = node("Outline").with_child(node("OEChildren").with_child(item));
        assert_eq!(render(&root, &catalog()), "  - [x]   done");
    }

    #[test]
    fn test_tags() {
        let root = node("OEChildren")
            .with_child(oe(vec![
                node("Tag").with_attr("index", "0").with_attr("completed", "false"),
                text("open"),
            ]))
            .with_child(oe(vec![node("Tag").with_attr("index", "1"), text("flag")]))
            .with_child(oe(vec![node("Tag").with_attr("index", "9"), text("lost")]));
        assert_eq!(
            render(&root, &catalog()),
            "  - [ ] open  - Important: flag  lost"
        );
    }

    #[test]
    fn test_undeclared_tag_keeps_indentation() {
        let nested = node("OEChildren")
            .with_child(oe(vec![node("Tag").with_attr("index", "9"), text("x")]));
        let root = node("OEChildren").with_child(oe(vec![text("top"), nested]));
        assert_eq!(render(&root, &catalog()), "top    x");
    }

    #[test]
    fn test_table() {
        let cell = |value: &str| {
            node("Cell").with_child(node("OEChildren").with_child(oe(vec![text(value)])))
        };
        let table = node("Table")
            .with_child(
                node("Columns")
                    .with_child(node("Column"))
                    .with_child(node("Column")),
            )
            .with_child(node("Row").with_child(cell("a")).with_child(cell("b")))
            .with_child(node("Row").with_child(cell("c")).with_child(cell("d")));
        let root = node("Outline").with_child(table);
        assert_eq!(
            render(&root, &catalog()),
            "\n| - | - |\n | a | b |\n | c | d |\n"
        );
    }

    #[test]
    fn test_nested_table_restores_outer_rows() {
        let inner = node("Table")
            .with_child(node("Columns").with_child(node("Column")))
            .with_child(node("Row").with_child(
                node("Cell").with_child(node("OEChildren").with_child(oe(vec![text("i")]))),
            ));
        let outer = node("Table")
            .with_child(node("Columns").with_child(node("Column")))
            .with_child(node("Row").with_child(node("Cell").with_child(inner)))
            .with_child(node("Row").with_child(
                node("Cell").with_child(node("OEChildren").with_child(oe(vec![text("b")]))),
            ));
        let root = node("Outline").with_child(outer);
        assert_eq!(
            render(&root, &catalog()),
            "\n| - |\n | \n| - |\n | i |\n |\n | b |\n"
        );
    }

    #[test]
    fn test_table_flushes_pending() {
        let root = node("OEChildren")
            .with_child(oe(vec![text("q")]).with_attr("quickStyleIndex", "2"))
            .with_child(node("Table"));
        assert_eq!(render(&root, &catalog()), "\n*q*\n");
    }

    #[test]
    fn test_ocr_data_not_visited() {
        let root = node("Outline")
            .with_child(node("OCRData").with_child(text("recognized")))
            .with_child(text("visible"));
        assert_eq!(render(&root, &catalog()), "visible");
    }

    #[test]
    fn test_failed_fetch_is_swallowed() {
        let image = node("Image")
            .with_attr("format", "jpg")
            .with_child(node("Size").with_attr("width", "abc"))
            .with_child(node("CallbackID").with_attr("callbackID", "{X}"));
        let root = node("Outline").with_child(image).with_child(text("after"));
        assert_eq!(render(&root, &catalog()), "after");
    }

    #[test]
    fn test_unsafe_image_format_falls_back() {
        let sink = MemorySink::new("/out");
        let options = RenderOptions::new().with_stats(true);
        let context = RenderContext {
            page_id: "p1",
            provider: Arc::new(NullProvider),
            importer: Arc::new(FsFileImporter::new()),
            sink: &sink,
        };
        let catalog = catalog();
        let state = RenderState::new(PathContext::new("Page", "/out"));
        let mut renderer = MarkdownRenderer::new(&catalog, &options, context, state);

        let image = node("Image")
            .with_attr("format", "/../../../escaped")
            .with_child(node("Data").with_text("aGVsbG8="));
        let markdown = renderer
            .render_root(&node("Outline").with_child(image))
            .unwrap();
        let (state, stats) = renderer.finish();

        assert_eq!(markdown, "![image1.png](file://Page_files/image1.png)");
        assert_eq!(
            state.written_media,
            vec![std::path::PathBuf::from("/out/Page_files/image1.png")]
        );
        assert!(sink.has_media(std::path::Path::new("/out/Page_files/image1.png")));
        assert_eq!(stats.malformed_attributes, 1);
    }

    #[test]
    fn test_cancelled_render() {
        let sink = MemorySink::new("/out");
        let options = RenderOptions::new();
        options.cancellation.cancel();
        let context = RenderContext {
            page_id: "p1",
            provider: Arc::new(NullProvider),
            importer: Arc::new(FsFileImporter::new()),
            sink: &sink,
        };
        let catalog = catalog();
        let state = RenderState::new(PathContext::new("Page", "/out"));
        let mut renderer = MarkdownRenderer::new(&catalog, &options, context, state);

        let root = node("Outline").with_child(text("x"));
        assert!(matches!(renderer.render_root(&root), Err(Error::Cancelled)));
    }
}
