//! Rendering options and configuration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default wait for a single binary fetch or attachment copy.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for rendering a page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Image format used when an `Image` declares none
    pub default_image_format: String,

    /// Upper bound for each binary fetch and attachment copy (`None` waits forever)
    pub io_timeout: Option<Duration>,

    /// Include YAML frontmatter with page metadata
    pub include_frontmatter: bool,

    /// Collect render statistics
    pub collect_stats: bool,

    /// Cooperative cancellation flag, checked between sibling nodes
    pub cancellation: CancellationToken,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback image format (e.g. "png", "jpg").
    pub fn with_image_format(mut self, format: impl Into<String>) -> Self {
        let format = format.into();
        let format = format.trim().trim_start_matches('.').to_ascii_lowercase();
        if is_image_extension(&format) {
            self.default_image_format = format;
        } else if !format.is_empty() {
            log::warn!("Ignoring invalid image format {:?}", format);
        }
        self
    }

    /// Set the I/O timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Wait for collaborators without a timeout.
    pub fn without_io_timeout(mut self) -> Self {
        self.io_timeout = None;
        self
    }

    /// Enable or disable frontmatter.
    pub fn with_frontmatter(mut self, include: bool) -> Self {
        self.include_frontmatter = include;
        self
    }

    /// Enable statistics collection during rendering.
    pub fn with_stats(mut self, collect: bool) -> Self {
        self.collect_stats = collect;
        self
    }

    /// Use an existing cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            default_image_format: "png".to_string(),
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            include_frontmatter: false,
            collect_stats: false,
            cancellation: CancellationToken::new(),
        }
    }
}

/// Shared flag used to stop a render or export in progress.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Whether `format` can be used as a media file extension: a short run of
/// lowercase ASCII letters and digits.
pub(crate) fn is_image_extension(format: &str) -> bool {
    !format.is_empty()
        && format.len() <= 8
        && format
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}
