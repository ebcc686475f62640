//! Content normalizer: raw backend output to typed content items.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::model::{table_is_empty, ContentItem, TableData};

/// File name substrings that mark an image as a chart.
pub const CHART_KEYWORDS: [&str; 3] = ["chart", "graph", "plot"];

/// Description of the full-page image emitted on the OCR path.
pub const PAGE_SNAPSHOT: &str = "page_snapshot";

/// Description of tables recovered from embedded images.
pub const IMAGE_TABLE_DESCRIPTION: &str = "Extracted from image";

fn blank_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t\u{a0}]*\n\s*").unwrap())
}

/// Join the non-empty trimmed lines of one block with single spaces and
/// normalize to NFC. `None` when nothing is left.
pub fn clean_block(block: &str) -> Option<String> {
    let joined = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        return None;
    }
    Some(joined.nfc().collect())
}

/// Split raw page text into cleaned paragraphs on blank-line boundaries.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    blank_line_regex()
        .split(&text)
        .filter_map(clean_block)
        .collect()
}

/// One paragraph item per non-empty block of `text`.
pub fn paragraph_items(text: &str) -> Vec<ContentItem> {
    split_paragraphs(text)
        .into_iter()
        .map(ContentItem::paragraph)
        .collect()
}

/// `"Extracted by <method>"`.
pub fn table_description(method: &str) -> String {
    format!("Extracted by {}", method)
}

/// Table items for the non-empty tables, in order.
pub fn table_items(description: &str, tables: Vec<TableData>) -> Vec<ContentItem> {
    tables
        .into_iter()
        .filter(|t| !table_is_empty(t))
        .map(|t| ContentItem::table(description, t))
        .collect()
}

/// Drop secondary tables that equal, cell for cell, one of `primary`.
///
/// Only exact structural equality counts: a single differing cell (or a
/// `None` against an empty string) keeps the table.
pub fn dedup_tables(primary: &[TableData], secondary: Vec<TableData>) -> Vec<TableData> {
    secondary
        .into_iter()
        .filter(|t| !primary.contains(t))
        .collect()
}

/// Whether an asset file name marks the image as a chart.
pub fn is_chart_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    CHART_KEYWORDS.iter().any(|k| name.contains(k))
}

/// An image item, or a chart item if the file name says so.
pub fn image_item(path: &Path, description: Option<String>) -> ContentItem {
    let image_path = path.to_string_lossy().into_owned();
    if is_chart_file(path) {
        ContentItem::chart(image_path, description)
    } else {
        ContentItem::image(image_path, description)
    }
}

/// The page snapshot item of the OCR path. Never classified as a chart.
pub fn snapshot_item(path: &Path) -> ContentItem {
    ContentItem::image(path.to_string_lossy(), Some(PAGE_SNAPSHOT.to_string()))
}
