//! JSON manifest of exported pages.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::PageArtifact;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    page_id: &'a str,
    title: &'a str,
    output_path: &'a Path,
    bytes: usize,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct Manifest<'a> {
    page_count: usize,
    pages: Vec<ManifestEntry<'a>>,
}

/// Describe exported pages as JSON, without their content.
pub fn to_manifest_json(pages: &[PageArtifact], format: JsonFormat) -> Result<String> {
    let manifest = Manifest {
        page_count: pages.len(),
        pages: pages
            .iter()
            .map(|page| ManifestEntry {
                page_id: &page.page_id,
                title: &page.title,
                output_path: &page.output_path,
                bytes: page.content_len(),
                created: page.metadata.created,
                modified: page.metadata.modified,
            })
            .collect(),
    };

    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(&manifest),
        JsonFormat::Compact => serde_json::to_string(&manifest),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}
