//! Refinement escalator.
//!
//! Sends an incomplete rule-based result to a [`StructureRefiner`] and
//! validates what comes back. Failures are returned as [`RefineError`] so
//! the caller can fall back to the unrefined pages; they are never fatal.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::backend::StructureRefiner;
use crate::model::Page;

/// Why a refinement attempt produced no usable result.
#[derive(Error, Debug)]
pub enum RefineError {
    /// No provider or API key.
    #[error("no structure refiner configured")]
    Unconfigured,

    /// The request could not be sent or the response not read.
    #[error("refinement request failed: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("refinement service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("refinement service returned an empty response")]
    EmptyResponse,

    /// The response text is not JSON.
    #[error("refiner did not return valid JSON: {0}")]
    MalformedJson(String),

    /// The response is JSON but not a `{"pages": [...]}` object.
    #[error("refined result has an unexpected shape: {0}")]
    InvalidShape(String),

    /// The refiner panicked.
    #[error("refiner panicked: {0}")]
    Panicked(String),
}

/// A refiner answer checked against the page schema. Top-level keys other
/// than `pages` are kept as-is.
#[derive(Debug, Deserialize, Serialize)]
struct RefinedDocument {
    pages: Vec<Page>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Outcome of the escalation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Escalation {
    /// The rule-based result was already complete.
    NotNeeded,
    /// The refined result replaced the rule-based one.
    Refined,
    /// Refinement was attempted or skipped and the rule-based result kept.
    FellBack(String),
    /// OCR results are never escalated.
    NotApplicable,
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Escalation::NotNeeded => write!(f, "not needed"),
            Escalation::Refined => write!(f, "refined"),
            Escalation::FellBack(reason) => write!(f, "fell back ({})", reason),
            Escalation::NotApplicable => write!(f, "not applicable"),
        }
    }
}

/// Packages pages for the refiner and validates its answer.
pub struct Escalator<'a> {
    refiner: Option<&'a dyn StructureRefiner>,
    system_prompt: &'a str,
    reasoning_prompt: &'a str,
}

impl<'a> Escalator<'a> {
    pub fn new(
        refiner: Option<&'a dyn StructureRefiner>,
        system_prompt: &'a str,
        reasoning_prompt: &'a str,
    ) -> Self {
        Self {
            refiner,
            system_prompt,
            reasoning_prompt,
        }
    }

    /// The `{"pages": [...], "assets_dir": "..."}` payload, pretty printed.
    pub fn payload(pages: &[Page], assets_dir: &Path) -> Result<String, RefineError> {
        let payload = json!({
            "pages": pages,
            "assets_dir": assets_dir.to_string_lossy(),
        });
        serde_json::to_string_pretty(&payload).map_err(|e| RefineError::InvalidShape(e.to_string()))
    }

    /// Single-shot refinement. Returns the refined JSON object.
    pub fn escalate(&self, pages: &[Page], assets_dir: &Path) -> Result<Value, RefineError> {
        let refiner = self.refiner.ok_or(RefineError::Unconfigured)?;
        let payload = Self::payload(pages, assets_dir)?;

        log::info!(
            "Escalating {} pages to {} ({} bytes)",
            pages.len(),
            refiner.name(),
            payload.len()
        );
        let text = panic::catch_unwind(AssertUnwindSafe(|| {
            refiner.refine(self.system_prompt, self.reasoning_prompt, &payload)
        }))
        .map_err(|payload| RefineError::Panicked(panic_message(payload.as_ref())))??;
        validate(&text)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Parse a refiner response and check it has the success shape.
///
/// Every page must deserialize as a [`Page`]; the returned value is the
/// re-serialized document, so unset optional fields come back as `null`.
pub fn validate(text: &str) -> Result<Value, RefineError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|_| RefineError::MalformedJson(text.chars().take(500).collect()))?;

    let Some(object) = value.as_object() else {
        return Err(RefineError::InvalidShape("not a JSON object".to_string()));
    };
    if object.contains_key("error") {
        return Err(RefineError::InvalidShape("contains an error key".to_string()));
    }
    if !object.get("pages").is_some_and(Value::is_array) {
        return Err(RefineError::InvalidShape("missing pages array".to_string()));
    }

    let document: RefinedDocument = serde_json::from_value(value)
        .map_err(|e| RefineError::InvalidShape(format!("pages do not match the schema: {}", e)))?;
    serde_json::to_value(&document).map_err(|e| RefineError::InvalidShape(e.to_string()))
}
