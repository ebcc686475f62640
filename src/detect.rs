//! PDF header sniffing.
//!
//! The orchestrator rejects non-PDF input up front so that a text file or an
//! image never reaches the classifier's probe backends.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Readers accept the header anywhere in the first 1024 bytes.
const HEADER_WINDOW: usize = 1024;

/// Version declared in a PDF header, e.g. `1.7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Read the header of the file at `path` and return its PDF version.
pub fn sniff_path<P: AsRef<Path>>(path: P) -> Result<PdfVersion> {
    let mut header = Vec::with_capacity(HEADER_WINDOW);
    File::open(path)?
        .take(HEADER_WINDOW as u64)
        .read_to_end(&mut header)?;
    sniff_bytes(&header)
}

/// Return the PDF version declared by the `%PDF-x.y` header in the first
/// 1024 bytes of `data`. Leading bytes such as a BOM are skipped.
pub fn sniff_bytes(data: &[u8]) -> Result<PdfVersion> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let start = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;
    let rest = &data[start + PDF_MAGIC.len()..];
    let version = rest.get(..VERSION_LEN).ok_or(Error::UnknownFormat)?;

    match version {
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Ok(PdfVersion {
                major: major - b'0',
                minor: minor - b'0',
            })
        }
        _ => Err(Error::UnsupportedVersion(
            String::from_utf8_lossy(version).into_owned(),
        )),
    }
}

/// Check whether the file at `path` looks like a PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    sniff_path(path).is_ok()
}
