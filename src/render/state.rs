//! Mutable per-page render state.

use std::path::{Path, PathBuf};

use crate::util::{sanitize_file_name, UNTITLED};

/// Table bookkeeping. Counters are only meaningful while `in_table` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableState {
    /// Inside a table subtree
    pub in_table: bool,
    /// Number of `Column` declarations seen
    pub column_count: usize,
    /// Number of rows emitted so far
    pub row_index: usize,
}

impl TableState {
    /// True once the header separator row has been written.
    pub fn header_emitted(&self) -> bool {
        self.row_index > 0
    }
}

/// Image bookkeeping between an `Image` element and its payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageState {
    /// An image declaration is waiting for its payload
    pub within_image: bool,
    /// File extension of the pending image
    pub format: String,
    /// Declared width
    pub width: Option<f64>,
    /// Declared height
    pub height: Option<f64>,
}

impl ImageState {
    /// Start a new image with the given format.
    pub fn arm(&mut self, format: &str) {
        *self = Self {
            within_image: true,
            format: format.to_string(),
            ..Self::default()
        };
    }

    /// Forget the pending image.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Where the page and its media go.
#[derive(Debug, Clone, PartialEq)]
pub struct PathContext {
    /// Display title
    pub title: String,
    /// Sanitized title used for file names
    pub stem: String,
    /// Directory the page file is written to
    pub output_dir: PathBuf,
    /// Markdown file path
    pub page_path: PathBuf,
    /// Directory for images and attachments
    pub media_dir: PathBuf,
    /// Images written so far
    pub image_counter: usize,
}

impl PathContext {
    /// Build the paths for a page titled `title` inside `output_dir`.
    pub fn new(title: &str, output_dir: impl Into<PathBuf>) -> Self {
        let stem = sanitize_file_name(title);
        Self::with_stem(title, stem, output_dir)
    }

    /// Build the paths for a page whose file stem was already chosen.
    pub fn with_stem(
        title: &str,
        stem: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let output_dir = output_dir.into();
        let title = if title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            title.to_string()
        };
        let stem = stem.into();
        Self {
            page_path: output_dir.join(format!("{}.md", stem)),
            media_dir: output_dir.join(media_dir_name(&stem)),
            title,
            stem,
            output_dir,
            image_counter: 0,
        }
    }

    /// Name of the media directory, relative to the page file.
    pub fn media_dir_name(&self) -> String {
        media_dir_name(&self.stem)
    }

    /// Absolute path of a media file.
    pub fn media_path(&self, file_name: &str) -> PathBuf {
        self.media_dir.join(file_name)
    }

    /// Path of a media file as referenced from the page.
    pub fn relative_media_path(&self, file_name: &str) -> PathBuf {
        Path::new(&self.media_dir_name()).join(file_name)
    }
}

fn media_dir_name(stem: &str) -> String {
    format!("{}_files", stem)
}

/// Everything that changes while one page renders.
#[derive(Debug, Clone)]
pub struct RenderState {
    /// Closing half of the most recently opened style wrapper
    pub pending: Option<String>,
    /// Table bookkeeping
    pub table: TableState,
    /// Image bookkeeping
    pub image: ImageState,
    /// Output locations
    pub paths: PathContext,
    /// Media written for this page, removed again on cancellation
    pub written_media: Vec<PathBuf>,
}

impl RenderState {
    /// Fresh state for one page.
    pub fn new(paths: PathContext) -> Self {
        Self {
            pending: None,
            table: TableState::default(),
            image: ImageState::default(),
            paths,
            written_media: Vec::new(),
        }
    }

    /// Commit the pending fragment (if any) to `output`.
    pub fn flush_pending(&mut self, output: &mut String) {
        if let Some(fragment) = self.pending.take() {
            output.push_str(&fragment);
        }
    }

    /// Replace the pending fragment. Any earlier fragment is flushed first.
    pub fn set_pending(&mut self, fragment: String, output: &mut String) {
        self.flush_pending(output);
        self.pending = Some(fragment);
    }
}
