//! # hybridpdf
//!
//! Hybrid PDF to structured JSON extraction.
//!
//! Each document is classified as scanned or digital. Scanned documents go
//! through OCR; digital ones through rule-based text, table and image
//! extraction. Digital results missing text, tables or images are escalated
//! to an optional structure-refinement service, falling back to the
//! rule-based result when that fails.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hybridpdf::{parse_file, render, ParseOptions, RefineOptions};
//!
//! fn main() -> hybridpdf::Result<()> {
//!     let options = ParseOptions::new()
//!         .with_output_dir("outputs")
//!         .with_refine(RefineOptions::from_env());
//!
//!     let result = parse_file("document.pdf", options)?;
//!     println!("{}", render::to_json(&result, render::JsonFormat::Pretty)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Output
//!
//! - `{"pages": [{"page_number": 1, "content": [...]}]}` on success
//! - `{"error": "..."}` on failure
//!
//! Extracted images and page snapshots are written to
//! `<output_dir>/<base_name>_assets/`.

pub mod backend;
pub mod detect;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use detect::{is_pdf, PdfVersion};
pub use error::{Error, Result};
pub use model::{ContentItem, ImageRef, Page, ParseResult, ParsedDocument, SourceDocument, TableData};
pub use parser::{
    DocumentKind, Escalation, HybridParser, ImageTablePolicy, OcrPolicy, ParseOptions,
    ParseReport, ParseState, RefineError, RefineOptions, RefineProvider,
};
pub use render::JsonFormat;

use std::path::{Path, PathBuf};

/// Parse a PDF with the default backends and export the result.
///
/// Returns the result together with the path of the written
/// `<base_name>_parsed.json`. The `Err` case only covers the export itself;
/// parse failures are part of the returned [`ParseResult`].
///
/// # Example
///
/// ```no_run
/// use hybridpdf::{parse_and_export, ParseOptions};
///
/// let (result, path) = parse_and_export("document.pdf", ParseOptions::default()).unwrap();
/// println!("{} -> {}", if result.is_error() { "failed" } else { "ok" }, path.display());
/// ```
pub fn parse_and_export<P: AsRef<Path>>(
    path: P,
    options: ParseOptions,
) -> Result<(ParseResult, PathBuf)> {
    let path = path.as_ref();
    let doc = SourceDocument::describe(path, &options.output_dir)?;
    let result = HybridParser::new(options).parse(path);
    let written = render::export_json(&result, &doc, JsonFormat::Pretty)?;
    Ok((result, written))
}

/// Parse a PDF with the default backends.
///
/// Unlike [`HybridParser::parse`], a failed parse is returned as `Err`.
///
/// # Example
///
/// ```no_run
/// use hybridpdf::{parse_file, ParseOptions};
///
/// let result = parse_file("document.pdf", ParseOptions::default()).unwrap();
/// println!("{} pages", result.document().map_or(0, |d| d.page_count()));
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<ParseResult> {
    let result = HybridParser::new(options).parse(path);
    match result.error() {
        Some(message) => Err(Error::Other(message.to_string())),
        None => Ok(result),
    }
}

/// Classify a PDF as scanned or digital with the default backends.
pub fn classify_file<P: AsRef<Path>>(path: P) -> Result<DocumentKind> {
    HybridParser::new(ParseOptions::default().with_refine(RefineOptions::default().disabled()))
        .classify(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_non_pdf_is_err() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fake.pdf");
        std::fs::write(&input, b"<!DOCTYPE html><html></html>").unwrap();

        let options = ParseOptions::new()
            .with_output_dir(dir.path().join("out"))
            .with_refine(RefineOptions::default().disabled());
        assert!(parse_file(&input, options).is_err());
    }

    #[test]
    fn test_parse_and_export_writes_error_shape() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing.pdf");

        let options = ParseOptions::new()
            .with_output_dir(dir.path().join("out"))
            .with_refine(RefineOptions::default().disabled());
        let (result, path) = parse_and_export(&input, options).unwrap();

        assert!(result.is_error());
        assert_eq!(path, dir.path().join("out").join("missing_parsed.json"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(json["error"].is_string());
    }

    #[test]
    fn test_classify_missing_file() {
        assert!(classify_file("/nonexistent/file.pdf").is_err());
    }
}
