//! Error types for onemd library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for onemd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting notebook pages.
///
/// Only failures that abort a page (or the whole run) surface here.
/// Recoverable data problems such as unknown style indexes or broken
/// image payloads are logged and counted in
/// [`RenderStats`](crate::render::RenderStats) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The page XML could not be parsed.
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The page XML is structurally unusable (no root element, bad attribute).
    #[error("Malformed page XML: {0}")]
    MalformedXml(String),

    /// An inserted file could not be copied next to the page.
    #[error("Failed to copy attachment {source_path}: {reason}")]
    AttachmentCopy {
        /// Original location of the attachment
        source_path: PathBuf,
        /// Underlying failure description
        reason: String,
    },

    /// The notebook source (hierarchy, page content, binary store) is gone.
    #[error("Notebook source unavailable: {0}")]
    SourceUnavailable(String),

    /// A notebook, section or page could not be found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An external call did not finish within the configured timeout.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Rendering was cancelled through a cancellation token.
    #[error("Rendering cancelled")]
    Cancelled,

    /// Error during rendering or serialization of output.
    #[error("Rendering error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::MalformedXml(err.to_string())
    }
}

impl From<quick_xml::encoding::EncodingError> for Error {
    fn from(err: quick_xml::encoding::EncodingError) -> Self {
        Error::MalformedXml(err.to_string())
    }
}

impl Error {
    /// Whether this error should stop the whole export rather than one page.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Error::SourceUnavailable(_) | Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Cancelled;
        assert_eq!(err.to_string(), "Rendering cancelled");

        let err = Error::AttachmentCopy {
            source_path: PathBuf::from("/tmp/report.pdf"),
            reason: "denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to copy attachment /tmp/report.pdf: denied"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_fatal_to_run() {
        assert!(Error::SourceUnavailable("closed".into()).is_fatal_to_run());
        assert!(Error::Cancelled.is_fatal_to_run());
        assert!(!Error::NotFound("page".into()).is_fatal_to_run());
    }
}
