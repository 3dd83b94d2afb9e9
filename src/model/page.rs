//! Page-level types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::DocumentNode;

/// A rendered page, ready to be persisted by a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageArtifact {
    /// Identifier of the page in the notebook source
    pub page_id: String,

    /// Display title
    pub title: String,

    /// Full Markdown body
    pub content: String,

    /// Where the Markdown file is written
    pub output_path: PathBuf,

    /// Page timestamps
    pub metadata: PageMetadata,
}

impl PageArtifact {
    /// Get the content length in bytes.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }

    /// Check if the rendered body is blank.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Page metadata taken from the page root attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Page title
    pub title: Option<String>,

    /// Creation time (`dateTime`)
    pub created: Option<DateTime<Utc>>,

    /// Last modification time (`lastModifiedTime`)
    pub modified: Option<DateTime<Utc>>,
}

impl PageMetadata {
    /// Read timestamps from a page root element.
    ///
    /// Unparseable timestamps are dropped.
    pub fn from_page(page: &DocumentNode) -> Self {
        Self {
            title: page.non_empty_attr("name").map(str::to_string),
            created: page.attr("dateTime").and_then(parse_timestamp),
            modified: page.attr("lastModifiedTime").and_then(parse_timestamp),
        }
    }

    /// Convert metadata to YAML frontmatter format.
    pub fn to_yaml_frontmatter(&self) -> String {
        let mut lines = vec!["---".to_string()];

        if let Some(ref title) = self.title {
            lines.push(format!("title: \"{}\"", escape_yaml(title)));
        }
        if let Some(ref created) = self.created {
            lines.push(format!("created: {}", created.to_rfc3339()));
        }
        if let Some(ref modified) = self.modified {
            lines.push(format!("modified: {}", modified.to_rfc3339()));
        }

        lines.push("---".to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            log::debug!("Ignoring malformed timestamp {:?}: {}", value, e);
            None
        }
    }
}

/// Escape special characters for YAML strings.
fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
