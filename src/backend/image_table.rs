//! Table detection inside raster images.

use std::path::Path;

use crate::error::Result;
use crate::model::TableData;

use super::table_detector::StreamTableDetector;
use super::{ImageTableDetector, OcrEngine};

/// Finds tables in an image by recognizing its text and running the
/// whitespace-alignment detector over the recognized lines.
///
/// Only as good as the engine's spacing: with tesseract, keep
/// `preserve_interword_spaces` enabled.
pub struct OcrImageTableDetector<E> {
    engine: E,
    language: String,
    detector: StreamTableDetector,
}

impl<E: OcrEngine> OcrImageTableDetector<E> {
    /// Detect with `engine` using English.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            language: "eng".to_string(),
            detector: StreamTableDetector::new(),
        }
    }

    /// Set the OCR language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Use a custom detector.
    pub fn with_detector(mut self, detector: StreamTableDetector) -> Self {
        self.detector = detector;
        self
    }
}

impl<E: OcrEngine> ImageTableDetector for OcrImageTableDetector<E> {
    fn detect_tables(&self, image_path: &Path) -> Result<Vec<TableData>> {
        let text = self.engine.recognize(image_path, &self.language)?;
        Ok(self.detector.detect(&text))
    }
}
