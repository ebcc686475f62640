//! Document-level completeness check.

use serde::Serialize;

use crate::model::{table_is_empty, ContentItem, Page};

/// Which content categories a result contains, across all pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub text: bool,
    pub table: bool,
    pub image: bool,
}

impl Coverage {
    /// Scan every page. Charts do not count as images.
    pub fn of(pages: &[Page]) -> Self {
        let mut coverage = Coverage::default();
        for item in pages.iter().flat_map(|p| p.content.iter()) {
            match item {
                ContentItem::Paragraph { text, .. } => coverage.text |= !text.is_empty(),
                ContentItem::Table { table_data, .. } => {
                    coverage.table |= !table_is_empty(table_data)
                }
                ContentItem::Image(image) => coverage.image |= !image.image_path.is_empty(),
                ContentItem::Chart(_) => {}
            }
        }
        coverage
    }

    pub fn is_complete(&self) -> bool {
        self.text && self.table && self.image
    }

    /// Names of the missing categories, for logging.
    pub fn missing(&self) -> Vec<&'static str> {
        [("text", self.text), ("table", self.table), ("image", self.image)]
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect()
    }
}

/// `true` when the pages hold at least one paragraph, one table and one image.
pub fn is_complete(pages: &[Page]) -> bool {
    Coverage::of(pages).is_complete()
}
