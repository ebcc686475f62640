//! Parse results.

use super::Page;
use serde::{Deserialize, Serialize};

/// The canonical success shape: `{"pages": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub pages: Vec<Page>,
}

impl ParsedDocument {
    /// Create a document from its pages.
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total number of content items over all pages.
    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|p| p.content.len()).sum()
    }
}

/// Outcome of one parse.
///
/// Serializes to exactly one of the two top-level shapes: a success object
/// with `pages`, or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParseResult {
    /// Result built by the rule-based or OCR path.
    Parsed(ParsedDocument),

    /// Result returned by the structure refiner. It carries a `pages` array
    /// but may hold extra structure beyond the canonical schema.
    Refined(serde_json::Value),

    /// Top-level failure.
    Failed { error: String },
}

impl ParseResult {
    /// Build the error shape.
    pub fn failed(error: impl ToString) -> Self {
        ParseResult::Failed {
            error: error.to_string(),
        }
    }

    /// Check if this is the error shape.
    pub fn is_error(&self) -> bool {
        matches!(self, ParseResult::Failed { .. })
    }

    /// The error message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            ParseResult::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// The canonical document, if this result was not refined or failed.
    pub fn document(&self) -> Option<&ParsedDocument> {
        match self {
            ParseResult::Parsed(doc) => Some(doc),
            _ => None,
        }
    }
}

impl From<ParsedDocument> for ParseResult {
    fn from(doc: ParsedDocument) -> Self {
        ParseResult::Parsed(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentItem;

    #[test]
    fn test_parsed_shape() {
        let mut page = Page::new(1);
        page.push(ContentItem::paragraph("Hello world"));
        let result = ParseResult::from(ParsedDocument::new(vec![page]));

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"pages":[{"page_number":1,"content":[{"type":"paragraph","section":null,"sub_section":null,"text":"Hello world"}]}]}"#
        );
        assert!(!result.is_error());
        assert_eq!(result.document().map(|d| d.item_count()), Some(1));
    }

    #[test]
    fn test_failed_shape() {
        let result = ParseResult::failed("boom");
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"error":"boom"}"#);
        assert_eq!(result.error(), Some("boom"));
        assert!(result.document().is_none());
    }

    #[test]
    fn test_refined_passthrough() {
        let value = serde_json::json!({"pages": [], "title": "Report"});
        let result = ParseResult::Refined(value.clone());
        assert_eq!(serde_json::to_value(&result).unwrap(), value);
    }
}
