//! Error types for the hybridpdf library.

use std::io;
use thiserror::Error;

/// Result type alias for hybridpdf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while parsing a document.
///
/// Only [`Error::Classification`] and [`Error::Unhandled`] ever reach the
/// caller of [`crate::HybridParser::parse`] (as the `{"error": ...}` shape);
/// extraction errors are recovered per page and per method.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// One extraction method failed for one page (or for the whole document
    /// when `page` is `None`).
    #[error("{method} extraction failed{}: {message}", page_suffix(.page))]
    Extraction {
        /// Name of the failing method (e.g. "stream", "delimited", "images").
        method: String,
        /// 1-based page number, if the failure is page-scoped.
        page: Option<u32>,
        /// Underlying failure message.
        message: String,
    },

    /// Both the primary and the secondary text probe failed.
    #[error("Classification failed: primary probe: {primary}; secondary probe: {secondary}")]
    Classification {
        /// Failure reported by the primary extraction backend.
        primary: String,
        /// Failure reported by the secondary text source (or why it was absent).
        secondary: String,
    },

    /// The OCR engine failed.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Rendering a page to an image failed.
    #[error("Page rendering error: {0}")]
    Render(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A backend panicked; caught at the parser boundary.
    #[error("Unhandled failure: {0}")]
    Unhandled(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

fn page_suffix(page: &Option<u32>) -> String {
    page.map(|p| format!(" on page {}", p)).unwrap_or_default()
}

impl Error {
    /// Build an [`Error::Extraction`] scoped to a 1-based page.
    pub fn extraction(method: impl Into<String>, page: u32, message: impl ToString) -> Self {
        Error::Extraction {
            method: method.into(),
            page: Some(page),
            message: message.to_string(),
        }
    }

    /// Build an [`Error::Extraction`] that covers the whole document.
    pub fn document_extraction(method: impl Into<String>, message: impl ToString) -> Self {
        Error::Extraction {
            method: method.into(),
            page: None,
            message: message.to_string(),
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<pdf_extract::OutputError> for Error {
    fn from(err: pdf_extract::OutputError) -> Self {
        Error::PdfParse(err.to_string())
    }
}
