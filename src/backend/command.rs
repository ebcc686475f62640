//! Adapters over the poppler and tesseract command-line tools.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{Error, Result};

use super::{OcrEngine, PageRenderer};

/// Default rendering resolution (dots per inch).
pub const DEFAULT_DPI: u32 = 200;

fn run(cmd: &mut Command, program: &str) -> std::io::Result<Output> {
    log::debug!("running {:?}", cmd);
    cmd.output().map_err(|e| {
        std::io::Error::new(e.kind(), format!("failed to run {}: {}", program, e))
    })
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Renders pages with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    program: PathBuf,
    dpi: u32,
}

impl PdftoppmRenderer {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("pdftoppm"),
            dpi: DEFAULT_DPI,
        }
    }

    /// Use a specific `pdftoppm` binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the rendering resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Check whether the binary can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program).arg("-v").output().is_ok()
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render_page(&self, path: &Path, page_index: u32, dest: &Path) -> Result<()> {
        let page = (page_index + 1).to_string();
        // -singlefile writes exactly <prefix>.png
        let prefix = dest.with_extension("");

        let output = run(
            Command::new(&self.program)
                .arg("-png")
                .args(["-r", &self.dpi.to_string()])
                .args(["-f", &page, "-l", &page])
                .arg("-singlefile")
                .arg(path)
                .arg(&prefix),
            "pdftoppm",
        )
        .map_err(|e| Error::Render(e.to_string()))?;

        if !output.status.success() {
            return Err(Error::Render(format!(
                "pdftoppm failed on page {}: {}",
                page,
                stderr_of(&output)
            )));
        }

        let written = prefix.with_extension("png");
        if written != dest {
            std::fs::rename(&written, dest)?;
        }
        if !dest.is_file() {
            return Err(Error::Render(format!(
                "pdftoppm produced no image for page {}",
                page
            )));
        }
        Ok(())
    }
}

/// OCR through the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: PathBuf,
    page_seg_mode: Option<u8>,
    preserve_interword_spaces: bool,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            page_seg_mode: None,
            preserve_interword_spaces: false,
        }
    }

    /// Use a specific `tesseract` binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Set tesseract's `--psm` page segmentation mode.
    pub fn with_page_seg_mode(mut self, psm: u8) -> Self {
        self.page_seg_mode = Some(psm);
        self
    }

    /// Keep runs of spaces between words. Column gaps survive recognition,
    /// which the image table detector relies on.
    pub fn with_preserve_interword_spaces(mut self, preserve: bool) -> Self {
        self.preserve_interword_spaces = preserve;
        self
    }

    /// Check whether the binary can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program).arg("--version").output().is_ok()
    }

    fn command(&self, image_path: &Path, language: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(image_path).arg("stdout").args(["-l", language]);
        if let Some(psm) = self.page_seg_mode {
            cmd.args(["--psm", &psm.to_string()]);
        }
        if self.preserve_interword_spaces {
            cmd.args(["-c", "preserve_interword_spaces=1"]);
        }
        cmd
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image_path: &Path, language: &str) -> Result<String> {
        let output = run(&mut self.command(image_path, language), "tesseract")
            .map_err(|e| Error::Ocr(e.to_string()))?;

        if !output.status.success() {
            return Err(Error::Ocr(format!(
                "tesseract ({}) failed on {}: {}",
                language,
                image_path.display(),
                stderr_of(&output)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
