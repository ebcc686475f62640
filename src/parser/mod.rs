//! Hybrid parsing pipeline.
//!
//! ```text
//! Start -> Classifying -> OcrPath ----------------------------------------> Done
//!                      \-> DigitalPath -> CheckingCompleteness -> [Escalating] -> Done
//! ```
//!
//! Any failure that escapes a state ends the run in `Failed`.

mod classifier;
mod completeness;
mod digital;
mod normalize;
mod ocr;
mod options;
mod orchestrator;
mod refine;

pub use classifier::{Classifier, DocumentKind};
pub use completeness::{is_complete, Coverage};
pub use digital::DigitalPath;
pub use normalize::{
    dedup_tables, is_chart_file, paragraph_items, split_paragraphs, CHART_KEYWORDS,
    IMAGE_TABLE_DESCRIPTION, PAGE_SNAPSHOT,
};
pub use ocr::OcrPath;
pub use options::{
    ImageTablePolicy, OcrPolicy, ParseOptions, RefineOptions, RefineProvider,
    DEFAULT_REASONING_PROMPT, DEFAULT_SYSTEM_PROMPT,
};
pub use orchestrator::{HybridParser, ParseReport, ParseState};
pub use refine::{validate as validate_refined, Escalation, Escalator, RefineError};
