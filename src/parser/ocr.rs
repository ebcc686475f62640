//! OCR path for scanned documents.

use std::path::Path;

use crate::backend::{OcrEngine, PageRenderer};
use crate::error::Result;
use crate::model::{Page, SourceDocument};

use super::normalize;
use super::options::OcrPolicy;

/// Renders every page, recognizes its text and emits paragraphs plus one
/// page snapshot image per page. Never produces tables or charts.
pub struct OcrPath<'a> {
    renderer: &'a dyn PageRenderer,
    engine: &'a dyn OcrEngine,
    languages: &'a [String],
    policy: OcrPolicy,
    min_chars: usize,
}

impl<'a> OcrPath<'a> {
    pub fn new(
        renderer: &'a dyn PageRenderer,
        engine: &'a dyn OcrEngine,
        languages: &'a [String],
        policy: OcrPolicy,
        min_chars: usize,
    ) -> Self {
        Self {
            renderer,
            engine,
            languages,
            policy,
            min_chars,
        }
    }

    /// Run the OCR path over `page_count` pages.
    ///
    /// A page that cannot be rendered fails the whole path; a language that
    /// fails to recognize counts as an empty attempt.
    pub fn extract(&self, doc: &SourceDocument, page_count: u32) -> Result<Vec<Page>> {
        let mut pages = Vec::with_capacity(page_count as usize);

        for index in 0..page_count {
            let page_number = index + 1;
            let snapshot = doc.page_snapshot_path(page_number);
            self.renderer.render_page(doc.path(), index, &snapshot)?;

            let text = self.recognize(&snapshot, page_number);

            let mut page = Page::new(page_number);
            page.extend(normalize::paragraph_items(&text));
            page.push(normalize::snapshot_item(&snapshot));

            log::debug!(
                "OCR: page {} -> {} items",
                page_number,
                page.content.len()
            );
            pages.push(page);
        }

        Ok(pages)
    }

    /// Recognize one rendered page according to the language policy.
    pub fn recognize(&self, image: &Path, page_number: u32) -> String {
        let mut chosen = String::new();

        for language in self.languages {
            let text = match self.engine.recognize(image, language) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("OCR: {} failed on page {}: {}", language, page_number, e);
                    String::new()
                }
            };
            let length = text.trim().chars().count();

            match self.policy {
                OcrPolicy::FirstAcceptable => {
                    if length > self.min_chars {
                        log::debug!("OCR: page {} accepted {}", page_number, language);
                        return text;
                    }
                    chosen = text;
                }
                OcrPolicy::Longest => {
                    if length > chosen.trim().chars().count() {
                        chosen = text;
                    }
                }
            }
        }

        chosen
    }
}
