//! Images and inserted files.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Error, Result};
use crate::io::{with_timeout, BinaryContentProvider, FileImporter, Sink};
use crate::model::DocumentNode;
use crate::util::{file_url, sanitize_file_name};

use super::RenderState;

/// Collaborators a page render talks to.
#[derive(Clone)]
pub struct RenderContext<'a> {
    /// Identifier of the page being rendered
    pub page_id: &'a str,
    /// Source of `CallbackID` payloads
    pub provider: Arc<dyn BinaryContentProvider>,
    /// Copier for inserted files
    pub importer: Arc<dyn FileImporter>,
    /// Output destination
    pub sink: &'a dyn Sink,
}

impl std::fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("page_id", &self.page_id)
            .finish_non_exhaustive()
    }
}

impl<'a> RenderContext<'a> {
    /// Fetch the payload behind a `CallbackID`, bounded by `timeout`.
    pub fn fetch(&self, reference_id: &str, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let provider = Arc::clone(&self.provider);
        let page_id = self.page_id.to_string();
        let reference_id = reference_id.to_string();
        with_timeout(timeout, "binary fetch", move || {
            provider.fetch(&page_id, &reference_id)
        })
    }

    /// Write image bytes as the next `image<N>` file of the page.
    ///
    /// Returns the Markdown image reference.
    pub fn store_image(
        &self,
        state: &mut RenderState,
        bytes: &[u8],
        default_format: &str,
    ) -> Result<String> {
        let format = if state.image.format.is_empty() {
            default_format
        } else {
            state.image.format.as_str()
        };
        let number = state.paths.image_counter + 1;
        let file_name = format!("image{}.{}", number, format);
        let path = state.paths.media_path(&file_name);

        self.sink.write_media_file(&path, bytes)?;
        state.paths.image_counter = number;
        state.written_media.push(path);

        let link = file_url(&state.paths.relative_media_path(&file_name));
        Ok(format!("![{}]({})", file_name, link))
    }

    /// Copy an inserted file next to the page.
    ///
    /// Returns `Ok(None)` when the element has no `pathCache`. Copy failures
    /// are reported as [`Error::AttachmentCopy`].
    pub fn import_file(
        &self,
        state: &mut RenderState,
        node: &DocumentNode,
        timeout: Option<Duration>,
    ) -> Result<Option<String>> {
        let Some(source) = node.non_empty_attr("pathCache") else {
            log::debug!("InsertedFile without pathCache skipped");
            return Ok(None);
        };

        let name = node
            .non_empty_attr("preferredName")
            .unwrap_or_else(|| source_file_name(source));
        let name = sanitize_file_name(name);

        let source_path = PathBuf::from(source);
        let dest = state.paths.media_path(&name);

        // Recorded up front so a failed render rolls back a partial copy.
        state.written_media.push(dest.clone());

        // A copy that outlives its timeout removes its own output.
        let abandoned = Arc::new(AtomicBool::new(false));
        let importer = Arc::clone(&self.importer);
        let (from, to) = (source_path.clone(), dest);
        let flag = Arc::clone(&abandoned);
        let copied = with_timeout(timeout, "attachment copy", move || {
            let result = importer.copy(&from, &to);
            if flag.load(Ordering::SeqCst) {
                if let Err(e) = importer.remove(&to) {
                    log::warn!("Could not remove abandoned copy {}: {}", to.display(), e);
                }
            }
            result
        });
        if let Err(e) = copied {
            abandoned.store(true, Ordering::SeqCst);
            return Err(Error::AttachmentCopy {
                source_path,
                reason: e.to_string(),
            });
        }

        let link = file_url(&state.paths.relative_media_path(&name));
        Ok(Some(format!("[{}]({})", name, link)))
    }
}

/// Last component of a path that may use either separator.
fn source_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(path)
}

/// Decode an inline base64 payload, ignoring embedded whitespace.
pub fn decode_inline_data(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::Render("empty inline image payload".into()));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::Render(format!("invalid inline image payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{FsFileImporter, MemorySink, NullProvider};
    use crate::render::PathContext;

    fn context<'a>(sink: &'a MemorySink) -> RenderContext<'a> {
        RenderContext {
            page_id: "p1",
            provider: Arc::new(NullProvider),
            importer: Arc::new(FsFileImporter::new()),
            sink,
        }
    }

    #[test]
    fn test_store_image_numbers_files() {
        let sink = MemorySink::new("/out");
        let ctx = context(&sink);
        let mut state = RenderState::new(PathContext::new("My Page", "/out"));

        state.image.arm("jpg");
        let first = ctx.store_image(&mut state, b"a", "png").unwrap();
        state.image.reset();
        let second = ctx.store_image(&mut state, b"b", "png").unwrap();

        assert_eq!(first, "![image1.jpg](file://My%20Page_files/image1.jpg)");
        assert_eq!(second, "![image2.png](file://My%20Page_files/image2.png)");
        assert!(sink.has_media(&PathBuf::from("/out/My Page_files/image1.jpg")));
        assert_eq!(state.written_media.len(), 2);
    }

    #[test]
    fn test_import_file_missing_path_cache() {
        let sink = MemorySink::new("/out");
        let ctx = context(&sink);
        let mut state = RenderState::new(PathContext::new("P", "/out"));
        let node = DocumentNode::new("InsertedFile").with_attr("preferredName", "a.pdf");

        assert_eq!(ctx.import_file(&mut state, &node, None).unwrap(), None);
    }

    #[test]
    fn test_import_file_copy_failure_is_attachment_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new(dir.path());
        let ctx = context(&sink);
        let mut state = RenderState::new(PathContext::new("P", dir.path()));
        let node = DocumentNode::new("InsertedFile")
            .with_attr("pathCache", dir.path().join("gone.pdf").to_string_lossy());

        let err = ctx.import_file(&mut state, &node, None).unwrap_err();
        assert!(matches!(err, Error::AttachmentCopy { .. }));
        assert_eq!(state.written_media, vec![dir.path().join("P_files/gone.pdf")]);
    }

    /// Copies after a delay, like a slow network share.
    struct SlowImporter(Duration);

    impl FileImporter for SlowImporter {
        fn copy(&self, source: &std::path::Path, dest: &std::path::Path) -> Result<()> {
            std::thread::sleep(self.0);
            FsFileImporter::new().copy(source, dest)
        }

        fn remove(&self, dest: &std::path::Path) -> Result<()> {
            FsFileImporter::new().remove(dest)
        }
    }

    #[test]
    fn test_timed_out_copy_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("report.pdf");
        std::fs::write(&source, b"%PDF").unwrap();
        let sink = MemorySink::new(dir.path());
        let ctx = RenderContext {
            importer: Arc::new(SlowImporter(Duration::from_millis(300))),
            ..context(&sink)
        };
        let mut state = RenderState::new(PathContext::new("P", dir.path()));
        let node = DocumentNode::new("InsertedFile")
            .with_attr("pathCache", source.to_string_lossy());

        let err = ctx
            .import_file(&mut state, &node, Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, Error::AttachmentCopy { .. }));

        std::thread::sleep(Duration::from_millis(900));
        let dest = dir.path().join("P_files/report.pdf");
        assert_eq!(state.written_media, vec![dest.clone()]);
        assert!(!dest.exists());
    }

    #[test]
    fn test_source_file_name() {
        assert_eq!(source_file_name(r"C:\Users\me\report.docx"), "report.docx");
        assert_eq!(source_file_name("/tmp/notes.txt"), "notes.txt");
        assert_eq!(source_file_name("plain"), "plain");
    }

    #[test]
    fn test_decode_inline_data() {
        assert_eq!(decode_inline_data("aGVs\n bG8=").unwrap(), b"hello");
        assert!(decode_inline_data("not base64!").is_err());
        assert!(decode_inline_data("  ").is_err());
    }
}
