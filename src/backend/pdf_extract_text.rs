//! Secondary text probe backed by `pdf-extract`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};

use super::{FileStamp, PageTextSource};

/// [`PageTextSource`] over `pdf_extract::extract_text_from_mem_by_pages`.
///
/// Uses a different text decoder than [`super::LopdfBackend`], which is what
/// makes it useful as the classifier's fallback probe and as the text feed of
/// [`super::DelimitedTableExtractor`]. `pdf-extract` panics on some malformed
/// files; those panics are converted to errors here.
#[derive(Default)]
pub struct PdfExtractText {
    cache: Mutex<Option<(FileStamp, Vec<String>)>>,
}

impl PdfExtractText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` over the page texts of `path`, extracting them on first use.
    fn with_pages<T>(&self, path: &Path, f: impl FnOnce(&[String]) -> T) -> Result<T> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Other("pdf-extract page cache poisoned".into()))?;

        let stamp = FileStamp::of(path)?;
        match cache.as_ref() {
            Some((cached, pages)) if *cached == stamp => return Ok(f(pages)),
            _ => {}
        }

        let pages = extract_pages(path)?;
        let out = f(&pages);
        *cache = Some((stamp, pages));
        Ok(out)
    }
}

fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let data = std::fs::read(path)?;
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(&data)
    })) {
        Ok(Ok(pages)) => {
            log::debug!("PdfExtractText: {} pages from {}", pages.len(), path.display());
            Ok(pages)
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(Error::PdfParse(format!(
            "pdf-extract panicked on {}",
            path.display()
        ))),
    }
}

impl PageTextSource for PdfExtractText {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    fn page_count(&self, path: &Path) -> Result<u32> {
        self.with_pages(path, |pages| pages.len() as u32)
    }

    fn extract_page_text(&self, path: &Path, page_index: u32) -> Result<String> {
        self.with_pages(path, |pages| pages.get(page_index as usize).cloned())?
            .ok_or_else(|| {
                Error::PdfParse(format!("Page {} is out of range", page_index + 1))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_is_io_error() {
        let probe = PdfExtractText::new();
        let result = probe.page_count(Path::new("/nonexistent/doc.pdf"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_garbage_is_error_not_panic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4\nthis is not really a pdf").unwrap();

        let probe = PdfExtractText::new();
        assert!(probe.extract_page_text(file.path(), 0).is_err());
    }
}
