//! Integration tests for page rendering.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use onemd::error::{Error, Result};
use onemd::{
    parse_xml, BinaryContentProvider, CancellationToken, DirectoryProvider, FsSink, MemorySink,
    PageAssembler, RenderOptions, Sink,
};

/// Provider serving fixed payloads by reference id.
struct StubProvider {
    payloads: HashMap<String, Vec<u8>>,
}

impl StubProvider {
    fn with(reference: &str, bytes: &[u8]) -> Self {
        let mut payloads = HashMap::new();
        payloads.insert(reference.to_string(), bytes.to_vec());
        Self { payloads }
    }
}

impl BinaryContentProvider for StubProvider {
    fn fetch(&self, _page_id: &str, reference_id: &str) -> Result<Vec<u8>> {
        self.payloads
            .get(reference_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(reference_id.to_string()))
    }
}

/// Provider whose fetches always fail.
struct FailingProvider;

impl BinaryContentProvider for FailingProvider {
    fn fetch(&self, _page_id: &str, _reference_id: &str) -> Result<Vec<u8>> {
        Err(Error::Other("binary source rejected the request".into()))
    }
}

/// Provider that cancels the render while serving its payload.
struct CancellingProvider {
    token: CancellationToken,
}

impl BinaryContentProvider for CancellingProvider {
    fn fetch(&self, _page_id: &str, _reference_id: &str) -> Result<Vec<u8>> {
        self.token.cancel();
        Ok(vec![1, 2, 3])
    }
}

fn memory_assembler() -> (Arc<MemorySink>, PageAssembler) {
    let sink = Arc::new(MemorySink::new("/out"));
    let assembler = PageAssembler::new(sink.clone());
    (sink, assembler)
}

#[test]
fn test_image_only_page_uses_fallback() {
    let page = r#"<Page ID="p1">
  <Image format="png"><CallbackID callbackID="{img}" /></Image>
</Page>"#;
    let (sink, assembler) = memory_assembler();
    let assembler = assembler.with_provider(Arc::new(StubProvider::with("{img}", b"PNG")));

    let artifact = assembler.write("p1", &parse_xml(page).unwrap()).unwrap();

    assert_eq!(
        artifact.content,
        "![image1.png](file://Untitled_files/image1.png)"
    );
    assert_eq!(artifact.output_path, PathBuf::from("/out/Untitled.md"));
    assert!(sink.has_media(Path::new("/out/Untitled_files/image1.png")));
}

#[test]
fn test_single_row_table() {
    let page = r#"<Page ID="p1">
  <Outline><OEChildren><OE>
    <Table>
      <Columns><Column index="0" /><Column index="1" /></Columns>
      <Row>
        <Cell><OEChildren><OE><T>cell1</T></OE></OEChildren></Cell>
        <Cell><OEChildren><OE><T>cell2</T></OE></OEChildren></Cell>
      </Row>
    </Table>
  </OE></OEChildren></Outline>
</Page>"#;
    let (_, assembler) = memory_assembler();

    let artifact = assembler.assemble("p1", &parse_xml(page).unwrap()).unwrap();

    assert_eq!(artifact.content, "| - | - |\n | cell1 | cell2 |\n");
}

#[test]
fn test_unresolved_style_renders_plain_text() {
    let page = r#"<Page ID="p1">
  <QuickStyleDef index="0" name="h1" />
  <Outline><OEChildren>
    <OE quickStyleIndex="7"><T>just text</T></OE>
  </OEChildren></Outline>
</Page>"#;
    let (_, assembler) = memory_assembler();
    let assembler = assembler.with_options(RenderOptions::new().with_stats(true));

    let (artifact, stats) = assembler
        .assemble_with_stats("p1", &parse_xml(page).unwrap())
        .unwrap();

    assert_eq!(artifact.content, "just text");
    assert_eq!(stats.missing_definitions, 1);
}

#[test]
fn test_failed_fetch_still_writes_page() {
    let page = r#"<Page ID="p1">
  <Title><OE><T>Photos</T></OE></Title>
  <Outline><OEChildren>
    <OE><T>before</T></OE>
    <OE><Image><CallbackID callbackID="{gone}" /></Image></OE>
    <OE><T>after</T></OE>
  </OEChildren></Outline>
</Page>"#;
    let (sink, assembler) = memory_assembler();
    let assembler = assembler
        .with_provider(Arc::new(FailingProvider))
        .with_options(RenderOptions::new().with_stats(true));

    let (artifact, stats) = assembler
        .write_with_stats("p1", &parse_xml(page).unwrap())
        .unwrap();

    assert!(artifact.content.contains("before"));
    assert!(artifact.content.contains("after"));
    assert!(!artifact.content.contains("!["));
    assert_eq!(stats.failed_media, 1);
    assert_eq!(sink.pages().len(), 1);
    assert!(sink.media_files().is_empty());
}

#[test]
fn test_nested_bullets() {
    let page = r#"<Page ID="p1">
  <Outline><OEChildren>
    <OE>
      <List><Bullet bullet="2" /></List>
      <T>parent</T>
      <OEChildren>
        <OE><List><Bullet bullet="2" /></List><T>child</T></OE>
      </OEChildren>
    </OE>
  </OEChildren></Outline>
</Page>"#;
    let (_, assembler) = memory_assembler();

    let artifact = assembler.assemble("p1", &parse_xml(page).unwrap()).unwrap();

    assert_eq!(artifact.content, "- parent  - child");
}

#[test]
fn test_todo_and_symbol_tags() {
    let page = r#"<Page ID="p1">
  <TagDef index="0" type="0" name="To Do" />
  <TagDef index="1" type="13" name="Important" />
  <Outline><OEChildren>
    <OE><Tag index="0" completed="true" /><T>ship it</T></OE>
    <OE><Tag index="1" /><T>call back</T></OE>
  </OEChildren></Outline>
</Page>"#;
    let (_, assembler) = memory_assembler();

    let artifact = assembler.assemble("p1", &parse_xml(page).unwrap()).unwrap();

    assert_eq!(
        artifact.content,
        "  - [x] ship it  - Important: call back"
    );
}

#[test]
fn test_render_is_idempotent() {
    let page = r#"<Page ID="p1">
  <QuickStyleDef index="0" name="PageTitle" />
  <QuickStyleDef index="1" name="code" />
  <Title><OE quickStyleIndex="0"><T>Snippets</T></OE></Title>
  <Outline><OEChildren>
    <OE quickStyleIndex="1"><T>let x = 1;</T></OE>
    <OE><Image><CallbackID callbackID="{img}" /></Image></OE>
  </OEChildren></Outline>
</Page>"#;
    let tree = parse_xml(page).unwrap();
    let (sink, assembler) = memory_assembler();
    let assembler = assembler.with_provider(Arc::new(StubProvider::with("{img}", b"GIF89a")));

    let first = assembler.write("p1", &tree).unwrap();
    let second = assembler.write("p1", &tree).unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(sink.pages().len(), 1);
    assert_eq!(sink.media_files().len(), 1);
}

// Image fetch failures are swallowed while attachment copy failures abort
// the page. Both behaviors are pinned here.
#[test]
fn test_attachment_copy_failure_is_fatal() {
    let page = r#"<Page ID="p1">
  <Outline><OEChildren>
    <OE><Image><Data>aGVsbG8=</Data></Image></OE>
    <OE><InsertedFile pathCache="/definitely/missing/report.pdf" preferredName="report.pdf" /></OE>
  </OEChildren></Outline>
</Page>"#;
    let (sink, assembler) = memory_assembler();

    let err = assembler
        .write("p1", &parse_xml(page).unwrap())
        .unwrap_err();

    match err {
        Error::AttachmentCopy { source_path, .. } => {
            assert_eq!(source_path, PathBuf::from("/definitely/missing/report.pdf"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sink.pages().is_empty());
    assert!(sink.media_files().is_empty());
}

#[test]
fn test_cancellation_removes_written_media() {
    let page = r#"<Page ID="p1">
  <Outline><OEChildren>
    <OE><Image><CallbackID callbackID="{img}" /></Image></OE>
    <OE><T>never rendered</T></OE>
  </OEChildren></Outline>
</Page>"#;
    let token = CancellationToken::new();
    let (sink, assembler) = memory_assembler();
    let assembler = assembler
        .with_provider(Arc::new(CancellingProvider {
            token: token.clone(),
        }))
        .with_options(RenderOptions::new().with_cancellation(token));

    let err = assembler
        .write("p1", &parse_xml(page).unwrap())
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(sink.pages().is_empty());
    assert!(sink.media_files().is_empty());
}

#[test]
fn test_write_to_file_system() {
    let out = tempfile::tempdir().unwrap();
    let binaries = tempfile::tempdir().unwrap();
    std::fs::write(binaries.path().join("img1"), b"JPEG").unwrap();
    let attachment = binaries.path().join("notes.txt");
    std::fs::write(&attachment, "attached").unwrap();

    let page = format!(
        r#"<Page ID="p1">
  <Title><OE><T>Trip Notes</T></OE></Title>
  <Outline><OEChildren>
    <OE><Image format="JPG"><Size width="640" height="480" /><CallbackID callbackID="img1" /></Image></OE>
    <OE><InsertedFile pathCache="{}" preferredName="notes.txt" /></OE>
  </OEChildren></Outline>
</Page>"#,
        attachment.display()
    );

    let sink = Arc::new(FsSink::new(out.path()));
    let assembler = PageAssembler::new(sink.clone())
        .with_provider(Arc::new(DirectoryProvider::new(binaries.path())));
    let artifact = assembler.write("p1", &parse_xml(&page).unwrap()).unwrap();

    assert_eq!(artifact.output_path, out.path().join("Trip Notes.md"));
    assert!(artifact
        .content
        .contains("![image1.jpg](file://Trip%20Notes_files/image1.jpg)"));
    assert!(artifact
        .content
        .contains("[notes.txt](file://Trip%20Notes_files/notes.txt)"));

    let media = out.path().join("Trip Notes_files");
    assert_eq!(std::fs::read(media.join("image1.jpg")).unwrap(), b"JPEG");
    assert_eq!(
        std::fs::read_to_string(media.join("notes.txt")).unwrap(),
        "attached"
    );
    assert_eq!(
        std::fs::read_to_string(&artifact.output_path).unwrap(),
        artifact.content
    );
    assert_eq!(sink.output_dir(), out.path());
}
