//! Extraction backend abstraction layer.
//!
//! The orchestrator treats every extraction primitive as a black box behind
//! one of the traits below. Each method reports failure through its `Result`;
//! deciding whether a failure is fatal is left to the caller.
//!
//! Default implementations:
//!
//! | trait | implementation | built on |
//! |---|---|---|
//! | [`ExtractionBackend`] | [`LopdfBackend`] | `lopdf` + [`StreamTableDetector`] |
//! | [`PageTextSource`] (secondary probe) | [`PdfExtractText`] | `pdf-extract` |
//! | [`SecondaryTableExtractor`] | [`DelimitedTableExtractor`] | text layer |
//! | [`PageRenderer`] | [`PdftoppmRenderer`] | `pdftoppm` |
//! | [`OcrEngine`] | [`TesseractEngine`] | `tesseract` |
//! | [`ImageTableDetector`] | [`OcrImageTableDetector`] | any [`OcrEngine`] |
//! | [`StructureRefiner`] | [`GeminiRefiner`] | Gemini REST API |

mod command;
mod gemini;
mod image_table;
mod lopdf_backend;
mod pdf_extract_text;
mod table_detector;

pub use self::command::{PdftoppmRenderer, TesseractEngine};
pub use self::gemini::GeminiRefiner;
pub use self::image_table::OcrImageTableDetector;
pub use self::lopdf_backend::LopdfBackend;
pub use self::pdf_extract_text::PdfExtractText;
pub use self::table_detector::{DelimitedTableExtractor, StreamTableDetector, TableDetectorConfig};

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::model::TableData;
use crate::parser::RefineError;

/// Identity of a file on disk, used to key per-document caches so a file
/// rewritten between two parses is loaded again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileStamp {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    pub(crate) fn of(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// An embedded raster image pulled out of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// 0-based index of the page the image is drawn on.
    pub page_index: u32,
    /// Encoded image bytes, ready to be written as-is.
    pub data: Vec<u8>,
    /// File extension without the dot (e.g. `jpg`, `png`).
    pub extension: String,
}

impl ExtractedImage {
    pub fn new(page_index: u32, data: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            page_index,
            data,
            extension: extension.into(),
        }
    }
}

/// Anything that can report a page count and per-page plain text.
///
/// The classifier probes documents through this trait; the primary
/// [`ExtractionBackend`] implements it, and so does the secondary probe.
pub trait PageTextSource {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Number of pages in the document.
    fn page_count(&self, path: &Path) -> Result<u32>;

    /// Plain text of one page (0-based index). Empty when the page has no
    /// text layer.
    fn extract_page_text(&self, path: &Path, page_index: u32) -> Result<String>;
}

/// The primary document extraction backend.
pub trait ExtractionBackend: PageTextSource {
    /// Name of the table method, used in `"Extracted by <method>"`.
    fn table_method(&self) -> &str;

    /// Tables found on one page (0-based index).
    fn extract_page_tables(&self, path: &Path, page_index: u32) -> Result<Vec<TableData>>;

    /// All embedded raster images of the document, in page order.
    fn extract_all_images(&self, path: &Path) -> Result<Vec<ExtractedImage>>;
}

/// An independent table extractor run after the primary one.
pub trait SecondaryTableExtractor {
    /// Name of the method, used in `"Extracted by <method>"`.
    fn name(&self) -> &str;

    /// Tables found on one page (0-based index).
    fn extract_tables_for_page(&self, path: &Path, page_index: u32) -> Result<Vec<TableData>>;
}

/// Detects tables drawn inside a raster image.
pub trait ImageTableDetector {
    fn detect_tables(&self, image_path: &Path) -> Result<Vec<TableData>>;
}

/// Renders a page to a PNG file.
pub trait PageRenderer {
    /// Render page `page_index` (0-based) of `path` into `dest`.
    fn render_page(&self, path: &Path, page_index: u32, dest: &Path) -> Result<()>;
}

/// Image-to-text recognition.
pub trait OcrEngine {
    /// Recognize the text in `image_path` using `language` (e.g. `eng`).
    fn recognize(&self, image_path: &Path, language: &str) -> Result<String>;
}

/// The structure-refinement capability: prompt in, JSON text out.
pub trait StructureRefiner {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Send the prompts and payload; return the raw response text, which is
    /// expected (but not guaranteed) to parse as JSON.
    fn refine(
        &self,
        system_prompt: &str,
        reasoning_prompt: &str,
        payload_json: &str,
    ) -> std::result::Result<String, RefineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stamp_changes_when_file_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4\none").unwrap();
        let first = FileStamp::of(&path).unwrap();
        assert_eq!(FileStamp::of(&path).unwrap(), first);

        std::fs::write(&path, b"%PDF-1.4\none two three").unwrap();
        assert_ne!(FileStamp::of(&path).unwrap(), first);
    }

    #[test]
    fn test_file_stamp_missing_file() {
        assert!(FileStamp::of(Path::new("/nonexistent/doc.pdf")).is_err());
    }
}
