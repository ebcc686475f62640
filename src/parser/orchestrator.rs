//! The hybrid parser: classification, extraction, completeness check and
//! escalation as one single-pass state machine.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::Serialize;

use crate::backend::{
    DelimitedTableExtractor, ExtractionBackend, GeminiRefiner, ImageTableDetector, LopdfBackend,
    OcrEngine, OcrImageTableDetector, PageRenderer, PageTextSource, PdfExtractText,
    PdftoppmRenderer, SecondaryTableExtractor, StructureRefiner, TesseractEngine,
};
use crate::detect;
use crate::error::{Error, Result};
use crate::model::{ParseResult, ParsedDocument, SourceDocument};

use super::classifier::{Classifier, DocumentKind};
use super::completeness::Coverage;
use super::digital::DigitalPath;
use super::ocr::OcrPath;
use super::options::ParseOptions;
use super::refine::{Escalation, Escalator};

/// States of a parse run, in the order they can be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseState {
    Start,
    Classifying,
    OcrPath,
    DigitalPath,
    CheckingCompleteness,
    Escalating,
    Done,
    Failed,
}

impl fmt::Display for ParseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseState::Start => "start",
            ParseState::Classifying => "classifying",
            ParseState::OcrPath => "ocr_path",
            ParseState::DigitalPath => "digital_path",
            ParseState::CheckingCompleteness => "checking_completeness",
            ParseState::Escalating => "escalating",
            ParseState::Done => "done",
            ParseState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A parse result together with how it was produced.
#[derive(Debug, Clone)]
pub struct ParseReport {
    pub result: ParseResult,
    /// `None` when the run failed before classification finished.
    pub kind: Option<DocumentKind>,
    /// Visited states, starting with `Start` and ending with `Done` or `Failed`.
    pub states: Vec<ParseState>,
    /// `None` when the run failed before reaching the escalation decision.
    pub escalation: Option<Escalation>,
}

#[derive(Default)]
struct Trace {
    states: Vec<ParseState>,
    kind: Option<DocumentKind>,
    escalation: Option<Escalation>,
}

impl Trace {
    fn enter(&mut self, state: ParseState) {
        log::debug!("HybridParser: -> {}", state);
        self.states.push(state);
    }
}

/// Hybrid PDF parser.
///
/// Every collaborator is injectable; [`HybridParser::new`] wires the default
/// ones (lopdf, pdf-extract, pdftoppm, tesseract, and Gemini when an API key
/// is configured).
///
/// # Example
///
/// ```no_run
/// use hybridpdf::{HybridParser, ParseOptions};
///
/// let parser = HybridParser::new(ParseOptions::default().with_output_dir("out"));
/// let result = parser.parse("report.pdf");
/// println!("{}", serde_json::to_string_pretty(&result).unwrap());
/// ```
pub struct HybridParser {
    options: ParseOptions,
    backend: Box<dyn ExtractionBackend>,
    secondary_text: Option<Box<dyn PageTextSource>>,
    secondary_tables: Option<Box<dyn SecondaryTableExtractor>>,
    image_tables: Option<Box<dyn ImageTableDetector>>,
    renderer: Box<dyn PageRenderer>,
    ocr: Box<dyn OcrEngine>,
    refiner: Option<Box<dyn StructureRefiner>>,
}

impl HybridParser {
    /// Create a parser with the default backends.
    pub fn new(options: ParseOptions) -> Self {
        let image_language = options
            .ocr_languages
            .first()
            .cloned()
            .unwrap_or_else(|| "eng".to_string());

        let refiner: Option<Box<dyn StructureRefiner>> =
            match GeminiRefiner::from_options(&options.refine) {
                Ok(Some(refiner)) => Some(Box::new(refiner)),
                Ok(None) => None,
                Err(e) => {
                    log::warn!("Refiner unavailable: {}", e);
                    None
                }
            };

        Self {
            backend: Box::new(LopdfBackend::new()),
            secondary_text: Some(Box::new(PdfExtractText::new())),
            secondary_tables: Some(Box::new(DelimitedTableExtractor::new(PdfExtractText::new()))),
            image_tables: Some(Box::new(
                OcrImageTableDetector::new(
                    TesseractEngine::new().with_preserve_interword_spaces(true),
                )
                .with_language(image_language),
            )),
            renderer: Box::new(PdftoppmRenderer::new()),
            ocr: Box::new(TesseractEngine::new()),
            refiner,
            options,
        }
    }

    /// Replace the primary extraction backend.
    pub fn with_backend(mut self, backend: impl ExtractionBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    /// Replace (or remove) the classifier's fallback text probe.
    pub fn with_secondary_text(mut self, source: Option<Box<dyn PageTextSource>>) -> Self {
        self.secondary_text = source;
        self
    }

    /// Replace (or remove) the secondary table extractor.
    pub fn with_secondary_tables(
        mut self,
        extractor: Option<Box<dyn SecondaryTableExtractor>>,
    ) -> Self {
        self.secondary_tables = extractor;
        self
    }

    /// Replace (or remove) the table-in-image detector.
    pub fn with_image_table_detector(
        mut self,
        detector: Option<Box<dyn ImageTableDetector>>,
    ) -> Self {
        self.image_tables = detector;
        self
    }

    /// Replace the page renderer used by the OCR path.
    pub fn with_renderer(mut self, renderer: impl PageRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Replace the OCR engine.
    pub fn with_ocr_engine(mut self, engine: impl OcrEngine + 'static) -> Self {
        self.ocr = Box::new(engine);
        self
    }

    /// Replace (or remove) the structure refiner.
    pub fn with_refiner(mut self, refiner: Option<Box<dyn StructureRefiner>>) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Whether incomplete digital results will be sent to a refiner.
    pub fn has_refiner(&self) -> bool {
        self.refiner.is_some()
    }

    /// Parse a document. Never panics and never returns `Err`: failures come
    /// back as the `{"error": ...}` result.
    pub fn parse(&self, path: impl AsRef<Path>) -> ParseResult {
        self.parse_with_report(path).result
    }

    /// Parse a document and report the path taken.
    pub fn parse_with_report(&self, path: impl AsRef<Path>) -> ParseReport {
        let path = path.as_ref();
        let mut trace = Trace::default();
        trace.enter(ParseState::Start);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(path, &mut trace)));

        let result = match outcome {
            Ok(Ok(result)) => {
                trace.enter(ParseState::Done);
                result
            }
            Ok(Err(e)) => {
                log::error!("Parsing {} failed: {}", path.display(), e);
                trace.enter(ParseState::Failed);
                ParseResult::failed(e)
            }
            Err(payload) => {
                let e = Error::Unhandled(panic_message(payload.as_ref()));
                log::error!("Parsing {} failed: {}", path.display(), e);
                trace.enter(ParseState::Failed);
                ParseResult::failed(e)
            }
        };

        ParseReport {
            result,
            kind: trace.kind,
            states: trace.states,
            escalation: trace.escalation,
        }
    }

    /// Classify a document without extracting it.
    pub fn classify(&self, path: impl AsRef<Path>) -> Result<DocumentKind> {
        let path = path.as_ref();
        detect::sniff_path(path)?;
        self.classifier()
            .classify(self.backend.as_ref(), self.secondary_text.as_deref(), path)
    }

    fn classifier(&self) -> Classifier {
        Classifier::new(self.options.sample_pages, self.options.min_text_chars)
    }

    fn run(&self, path: &Path, trace: &mut Trace) -> Result<ParseResult> {
        let version = detect::sniff_path(path)?;
        log::debug!("HybridParser: {} is PDF {}", path.display(), version);
        let doc = SourceDocument::prepare(path, &self.options.output_dir)?;

        trace.enter(ParseState::Classifying);
        let kind = self.classifier().classify(
            self.backend.as_ref(),
            self.secondary_text.as_deref(),
            path,
        )?;
        trace.kind = Some(kind);
        log::info!("{} classified as {}", doc.base_name(), kind);

        match kind {
            DocumentKind::Scanned => {
                trace.enter(ParseState::OcrPath);
                let pages = self.ocr_path(&doc)?;
                trace.escalation = Some(Escalation::NotApplicable);
                Ok(ParsedDocument::new(pages).into())
            }
            DocumentKind::Digital => {
                trace.enter(ParseState::DigitalPath);
                let pages = DigitalPath::new(self.backend.as_ref())
                    .with_secondary(self.secondary_tables.as_deref())
                    .with_image_tables(self.image_tables.as_deref(), self.options.image_tables)
                    .extract(&doc)?;

                trace.enter(ParseState::CheckingCompleteness);
                let coverage = Coverage::of(&pages);
                if coverage.is_complete() {
                    trace.escalation = Some(Escalation::NotNeeded);
                    return Ok(ParsedDocument::new(pages).into());
                }
                log::info!(
                    "{}: rule-based result lacks {}",
                    doc.base_name(),
                    coverage.missing().join(", ")
                );

                trace.enter(ParseState::Escalating);
                let refine = &self.options.refine;
                let escalator = Escalator::new(
                    self.refiner.as_deref(),
                    &refine.system_prompt,
                    &refine.reasoning_prompt,
                );
                match escalator.escalate(&pages, doc.assets_dir()) {
                    Ok(refined) => {
                        log::info!("{}: using refined result", doc.base_name());
                        trace.escalation = Some(Escalation::Refined);
                        Ok(ParseResult::Refined(refined))
                    }
                    Err(e) => {
                        log::warn!("{}: refinement skipped: {}", doc.base_name(), e);
                        trace.escalation = Some(Escalation::FellBack(e.to_string()));
                        Ok(ParsedDocument::new(pages).into())
                    }
                }
            }
        }
    }

    fn ocr_path(&self, doc: &SourceDocument) -> Result<Vec<crate::model::Page>> {
        let page_count = match self.backend.page_count(doc.path()) {
            Ok(count) => count,
            Err(primary) => match &self.secondary_text {
                Some(secondary) => {
                    log::warn!("OCR: page count via {} failed: {}", self.backend.name(), primary);
                    secondary.page_count(doc.path())?
                }
                None => return Err(primary),
            },
        };

        OcrPath::new(
            self.renderer.as_ref(),
            self.ocr.as_ref(),
            &self.options.ocr_languages,
            self.options.ocr_policy,
            self.options.ocr_min_chars,
        )
        .extract(doc, page_count)
    }
}

impl Default for HybridParser {
    fn default() -> Self {
        Self::new(ParseOptions::default())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "backend panicked".to_string()
    }
}
