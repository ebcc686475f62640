//! Rule-based path for documents with a text layer.

use std::fs;

use crate::backend::{
    ExtractedImage, ExtractionBackend, ImageTableDetector, SecondaryTableExtractor,
};
use crate::error::{Error, Result};
use crate::model::{table_is_empty, Page, SourceDocument, TableData};

use super::normalize;
use super::options::ImageTablePolicy;

/// Extracts text, tables and images per page and merges them into one
/// ordered content list per page: paragraphs, primary tables, secondary
/// tables, then image tables and images.
///
/// Every extraction method is independent; one that fails contributes
/// nothing for that page and is logged.
pub struct DigitalPath<'a> {
    backend: &'a dyn ExtractionBackend,
    secondary: Option<&'a dyn SecondaryTableExtractor>,
    image_tables: Option<&'a dyn ImageTableDetector>,
    policy: ImageTablePolicy,
}

impl<'a> DigitalPath<'a> {
    pub fn new(backend: &'a dyn ExtractionBackend) -> Self {
        Self {
            backend,
            secondary: None,
            image_tables: None,
            policy: ImageTablePolicy::Both,
        }
    }

    pub fn with_secondary(mut self, secondary: Option<&'a dyn SecondaryTableExtractor>) -> Self {
        self.secondary = secondary;
        self
    }

    pub fn with_image_tables(
        mut self,
        detector: Option<&'a dyn ImageTableDetector>,
        policy: ImageTablePolicy,
    ) -> Self {
        self.image_tables = detector;
        self.policy = policy;
        self
    }

    /// Run the rule-based path. Only a failure to count pages is fatal.
    pub fn extract(&self, doc: &SourceDocument) -> Result<Vec<Page>> {
        let page_count = self.backend.page_count(doc.path())?;
        let mut pages: Vec<Page> = (1..=page_count).map(Page::new).collect();

        for (index, page) in pages.iter_mut().enumerate() {
            self.extract_page(doc, index as u32, page);
        }

        self.attach_images(doc, &mut pages);

        for page in &pages {
            log::debug!(
                "Digital: page {} -> {} items",
                page.page_number,
                page.content.len()
            );
        }
        Ok(pages)
    }

    fn extract_page(&self, doc: &SourceDocument, index: u32, page: &mut Page) {
        let path = doc.path();
        let page_number = index + 1;

        let text = self
            .backend
            .extract_page_text(path, index)
            .unwrap_or_else(|e| suppressed(Error::extraction("text", page_number, e)));
        page.extend(normalize::paragraph_items(&text));

        let method = self.backend.table_method();
        let primary: Vec<TableData> = self
            .backend
            .extract_page_tables(path, index)
            .unwrap_or_else(|e| suppressed(Error::extraction(method, page_number, e)))
            .into_iter()
            .filter(|t| !table_is_empty(t))
            .collect();
        page.extend(normalize::table_items(
            &normalize::table_description(method),
            primary.clone(),
        ));

        if let Some(secondary) = self.secondary {
            let tables = secondary
                .extract_tables_for_page(path, index)
                .unwrap_or_else(|e| {
                    suppressed(Error::extraction(secondary.name(), page_number, e))
                });
            let unique = normalize::dedup_tables(&primary, tables);
            page.extend(normalize::table_items(
                &normalize::table_description(secondary.name()),
                unique,
            ));
        }
    }

    /// Extract every embedded image once, persist it and route it to its page.
    fn attach_images(&self, doc: &SourceDocument, pages: &mut [Page]) {
        let images = self
            .backend
            .extract_all_images(doc.path())
            .unwrap_or_else(|e| suppressed(Error::document_extraction("images", e)));

        let mut per_page = vec![0usize; pages.len()];

        for ExtractedImage {
            page_index,
            data,
            extension,
        } in images
        {
            let Some(page) = pages.get_mut(page_index as usize) else {
                log::warn!(
                    "Digital: image on page index {} outside a {}-page document, skipped",
                    page_index,
                    per_page.len()
                );
                continue;
            };

            let index = per_page[page_index as usize];
            per_page[page_index as usize] += 1;

            let asset = doc.embedded_image_path(page.page_number, index, &extension);
            if let Err(e) = fs::write(&asset, &data) {
                log::warn!("Digital: failed to write {}: {}", asset.display(), e);
                continue;
            }

            let tables = match (self.policy, self.image_tables) {
                (ImageTablePolicy::Skip, _) | (_, None) => Vec::new(),
                (_, Some(detector)) => detector.detect_tables(&asset).unwrap_or_else(|e| {
                    suppressed(Error::extraction("image table", page.page_number, e))
                }),
            };
            let table_items = normalize::table_items(normalize::IMAGE_TABLE_DESCRIPTION, tables);
            let found_tables = !table_items.is_empty();
            page.extend(table_items);

            if !(found_tables && self.policy == ImageTablePolicy::TablesOnly) {
                page.push(normalize::image_item(&asset, None));
            }
        }
    }
}

fn suppressed<T: Default>(err: Error) -> T {
    log::warn!("{}", err);
    T::default()
}
