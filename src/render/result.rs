//! Render statistics.

use serde::{Deserialize, Serialize};

/// Counters collected while rendering pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Number of pages rendered
    pub page_count: u32,

    /// Number of paragraph containers visited
    pub paragraph_count: u32,

    /// Number of tables rendered
    pub table_count: u32,

    /// Number of images written
    pub image_count: u32,

    /// Number of images whose payload could not be resolved
    pub failed_media: u32,

    /// Number of inserted files copied
    pub attachment_count: u32,

    /// Number of tag markers rendered
    pub tag_count: u32,

    /// Style or tag references missing from the page catalog
    pub missing_definitions: u32,

    /// Attributes that could not be parsed
    pub malformed_attributes: u32,
}

impl RenderStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment page count.
    pub fn add_page(&mut self) {
        self.page_count += 1;
    }

    /// Increment paragraph count.
    pub fn add_paragraph(&mut self) {
        self.paragraph_count += 1;
    }

    /// Increment table count.
    pub fn add_table(&mut self) {
        self.table_count += 1;
    }

    /// Increment image count.
    pub fn add_image(&mut self) {
        self.image_count += 1;
    }

    /// Increment failed media count.
    pub fn add_failed_media(&mut self) {
        self.failed_media += 1;
    }

    /// Increment attachment count.
    pub fn add_attachment(&mut self) {
        self.attachment_count += 1;
    }

    /// Increment tag count.
    pub fn add_tag(&mut self) {
        self.tag_count += 1;
    }

    /// Increment missing definition count.
    pub fn add_missing_definition(&mut self) {
        self.missing_definitions += 1;
    }

    /// Increment malformed attribute count.
    pub fn add_malformed_attribute(&mut self) {
        self.malformed_attributes += 1;
    }

    /// Check if any data problem was recovered from.
    pub fn has_warnings(&self) -> bool {
        self.failed_media > 0 || self.missing_definitions > 0 || self.malformed_attributes > 0
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &RenderStats) {
        self.page_count += other.page_count;
        self.paragraph_count += other.paragraph_count;
        self.table_count += other.table_count;
        self.image_count += other.image_count;
        self.failed_media += other.failed_media;
        self.attachment_count += other.attachment_count;
        self.tag_count += other.tag_count;
        self.missing_definitions += other.missing_definitions;
        self.malformed_attributes += other.malformed_attributes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_stats_merge() {
        let mut stats1 = RenderStats::new();
        stats1.paragraph_count = 5;
        stats1.table_count = 2;

        let stats2 = RenderStats {
            paragraph_count: 3,
            table_count: 1,
            failed_media: 4,
            ..Default::default()
        };

        stats1.merge(&stats2);

        assert_eq!(stats1.paragraph_count, 8);
        assert_eq!(stats1.table_count, 3);
        assert_eq!(stats1.failed_media, 4);
        assert!(stats1.has_warnings());
    }

    #[test]
    fn test_clean_stats_have_no_warnings() {
        let mut stats = RenderStats::new();
        stats.add_page();
        stats.add_image();
        assert!(!stats.has_warnings());
    }
}
