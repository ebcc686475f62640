//! Scanned vs digital document classification.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::backend::PageTextSource;
use crate::error::{Error, Result};

/// Which extraction path a document takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// No usable text layer; OCR only.
    Scanned,
    /// Has a text layer; rule-based extraction.
    Digital,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Scanned => write!(f, "scanned"),
            DocumentKind::Digital => write!(f, "digital"),
        }
    }
}

/// Classifies a document by probing the text of its leading pages.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    sample_pages: u32,
    min_text_chars: usize,
}

impl Classifier {
    pub fn new(sample_pages: u32, min_text_chars: usize) -> Self {
        Self {
            sample_pages,
            min_text_chars,
        }
    }

    /// Classify with `primary`, retrying once with `secondary` if the
    /// primary probe fails.
    pub fn classify<P: PageTextSource + ?Sized>(
        &self,
        primary: &P,
        secondary: Option<&dyn PageTextSource>,
        path: &Path,
    ) -> Result<DocumentKind> {
        let primary_err = match self.probe(primary, path) {
            Ok(kind) => return Ok(kind),
            Err(e) => e,
        };
        log::warn!(
            "Classifier: {} probe failed ({}), retrying with secondary source",
            primary.name(),
            primary_err
        );

        let Some(secondary) = secondary else {
            return Err(Error::Classification {
                primary: primary_err.to_string(),
                secondary: "no secondary text source configured".to_string(),
            });
        };

        self.probe(secondary, path)
            .map_err(|secondary_err| Error::Classification {
                primary: primary_err.to_string(),
                secondary: secondary_err.to_string(),
            })
    }

    /// Count the leading pages whose trimmed text is longer than the
    /// threshold; none means scanned.
    pub fn probe<S: PageTextSource + ?Sized>(&self, source: &S, path: &Path) -> Result<DocumentKind> {
        let pages = source.page_count(path)?.min(self.sample_pages);

        let mut with_text = 0;
        for index in 0..pages {
            let text = source.extract_page_text(path, index)?;
            if text.trim().chars().count() > self.min_text_chars {
                with_text += 1;
            }
        }

        log::debug!(
            "Classifier: {} of {} probed pages have text ({})",
            with_text,
            pages,
            source.name()
        );

        Ok(if with_text == 0 {
            DocumentKind::Scanned
        } else {
            DocumentKind::Digital
        })
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(2, 50)
    }
}
