//! Page-level types.

use super::ContentItem;
use serde::{Deserialize, Serialize};

/// A single page of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// Content items in discovery order: text, then tables, then images.
    pub content: Vec<ContentItem>,
}

impl Page {
    /// Create an empty page.
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            content: Vec::new(),
        }
    }

    /// Append an item to the page.
    pub fn push(&mut self, item: ContentItem) {
        self.content.push(item);
    }

    /// Append several items, keeping their order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = ContentItem>) {
        self.content.extend(items);
    }

    /// Check if the page has no content.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Iterate over the tables on this page.
    pub fn tables(&self) -> impl Iterator<Item = &ContentItem> {
        self.content.iter().filter(|item| item.is_table())
    }
}
