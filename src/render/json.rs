//! JSON rendering and export of parse results.

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::{ParseResult, SourceDocument};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with two-space indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a parse result to JSON. Non-ASCII text is written as UTF-8.
pub fn to_json(result: &ParseResult, format: JsonFormat) -> Result<String> {
    let json = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(result),
        JsonFormat::Compact => serde_json::to_string(result),
    };

    json.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

/// Write `result` to `<output_dir>/<base_name>_parsed.json` and return the
/// path. Error results are exported too.
pub fn export_json(
    result: &ParseResult,
    doc: &SourceDocument,
    format: JsonFormat,
) -> Result<PathBuf> {
    let json = to_json(result, format)?;
    fs::create_dir_all(doc.output_dir())?;

    let path = doc.json_output_path();
    fs::write(&path, json)?;
    log::debug!("Exported {}", path.display());
    Ok(path)
}
