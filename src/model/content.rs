//! Content item types.

use serde::{Deserialize, Serialize};

/// A table as a row-major matrix of optional cell strings.
///
/// Rows may have different lengths; extractors are not required to pad them.
pub type TableData = Vec<Vec<Option<String>>>;

/// Returns `true` if the table has no row containing at least one cell.
pub fn table_is_empty(data: &TableData) -> bool {
    data.iter().all(|row| row.is_empty())
}

/// Reference to an image asset written to the document's assets directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Section heading the image belongs to, if known.
    pub section: Option<String>,
    /// Free-form description (e.g. `"page_snapshot"`).
    pub description: Option<String>,
    /// Path of the asset file.
    pub image_path: String,
}

/// One typed unit of page content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// A block of text.
    Paragraph {
        section: Option<String>,
        sub_section: Option<String>,
        text: String,
    },

    /// A table produced by one of the table extractors.
    Table {
        section: Option<String>,
        description: String,
        table_data: TableData,
    },

    /// A raster image or page snapshot.
    Image(ImageRef),

    /// An image whose file name marks it as a chart.
    Chart(ImageRef),
}

impl ContentItem {
    /// Create a paragraph without section information.
    pub fn paragraph(text: impl Into<String>) -> Self {
        ContentItem::Paragraph {
            section: None,
            sub_section: None,
            text: text.into(),
        }
    }

    /// Create a table without section information.
    pub fn table(description: impl Into<String>, table_data: TableData) -> Self {
        ContentItem::Table {
            section: None,
            description: description.into(),
            table_data,
        }
    }

    /// Create an image item.
    pub fn image(image_path: impl Into<String>, description: Option<String>) -> Self {
        ContentItem::Image(ImageRef {
            section: None,
            description,
            image_path: image_path.into(),
        })
    }

    /// Create a chart item.
    pub fn chart(image_path: impl Into<String>, description: Option<String>) -> Self {
        ContentItem::Chart(ImageRef {
            section: None,
            description,
            image_path: image_path.into(),
        })
    }

    /// Check if this item is a paragraph.
    pub fn is_paragraph(&self) -> bool {
        matches!(self, ContentItem::Paragraph { .. })
    }

    /// Check if this item is a table.
    pub fn is_table(&self) -> bool {
        matches!(self, ContentItem::Table { .. })
    }

    /// Check if this item is an image (charts excluded).
    pub fn is_image(&self) -> bool {
        matches!(self, ContentItem::Image(_))
    }

    /// Check if this item is a chart.
    pub fn is_chart(&self) -> bool {
        matches!(self, ContentItem::Chart(_))
    }

    /// The asset path of an image or chart item.
    pub fn image_path(&self) -> Option<&str> {
        match self {
            ContentItem::Image(r) | ContentItem::Chart(r) => Some(&r.image_path),
            ContentItem::Paragraph { .. } | ContentItem::Table { .. } => None,
        }
    }

    /// Short type name, as written in the `type` JSON field.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentItem::Paragraph { .. } => "paragraph",
            ContentItem::Table { .. } => "table",
            ContentItem::Image(_) => "image",
            ContentItem::Chart(_) => "chart",
        }
    }
}
