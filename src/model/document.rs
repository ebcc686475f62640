//! The input document and its on-disk output layout.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One input PDF, scoped to a single parse.
///
/// Owns the output directory and the `<base_name>_assets/` directory that
/// extracted images and page snapshots are written into. Both directories are
/// created by [`SourceDocument::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    path: PathBuf,
    base_name: String,
    output_dir: PathBuf,
    assets_dir: PathBuf,
}

impl SourceDocument {
    /// Derive the base name from `path` and create the output and assets
    /// directories under `output_dir`.
    pub fn prepare(path: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<Self> {
        let doc = Self::describe(path, output_dir)?;
        fs::create_dir_all(&doc.output_dir)?;
        fs::create_dir_all(&doc.assets_dir)?;
        Ok(doc)
    }

    /// Like [`SourceDocument::prepare`] but without touching the filesystem.
    pub fn describe(path: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Other(format!("No file name in {}", path.display())))?;

        let output_dir = output_dir.as_ref().to_path_buf();
        let assets_dir = output_dir.join(format!("{}_assets", base_name));

        Ok(Self {
            path,
            base_name,
            output_dir,
            assets_dir,
        })
    }

    /// Path of the input PDF.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without extension.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Output root.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory holding extracted images and page snapshots.
    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// Asset path of the full-page snapshot for a 1-based page: `page_<n>.png`.
    pub fn page_snapshot_path(&self, page_number: u32) -> PathBuf {
        self.assets_dir.join(format!("page_{}.png", page_number))
    }

    /// Asset path of the `index`-th embedded image on a 1-based page:
    /// `page_<n>_img_<k>.<ext>`.
    pub fn embedded_image_path(&self, page_number: u32, index: usize, extension: &str) -> PathBuf {
        self.assets_dir
            .join(format!("page_{}_img_{}.{}", page_number, index, extension))
    }

    /// Path of the exported JSON: `<output_dir>/<base_name>_parsed.json`.
    pub fn json_output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_parsed.json", self.base_name))
    }
}
