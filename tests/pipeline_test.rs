//! End-to-end tests of the hybrid parser with mock backends.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hybridpdf::backend::{
    ExtractedImage, ExtractionBackend, OcrEngine, PageRenderer, PageTextSource,
    SecondaryTableExtractor, StructureRefiner,
};
use hybridpdf::render::{to_json, JsonFormat};
use hybridpdf::{
    ContentItem, DocumentKind, Error, Escalation, HybridParser, ParseOptions, ParseResult,
    ParseState, RefineError, RefineOptions, Result, TableData,
};

fn row(cells: &[&str]) -> Vec<Option<String>> {
    cells.iter().map(|c| Some(c.to_string())).collect()
}

fn sample_table() -> TableData {
    vec![row(&["Region", "Sales"]), row(&["North", "120"])]
}

fn long_text() -> String {
    "This page has a real text layer with more than fifty characters in it.".to_string()
}

#[derive(Clone, Default)]
struct MockPdf {
    texts: Vec<String>,
    tables: Vec<Vec<TableData>>,
    images: Vec<ExtractedImage>,
    fail_probe: bool,
    panic_on_tables: bool,
    /// Page text reads after this many come back blank.
    blank_after_reads: Option<usize>,
    reads: Arc<AtomicUsize>,
}

impl MockPdf {
    fn with_pages(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl PageTextSource for MockPdf {
    fn name(&self) -> &str {
        "mock-pdf"
    }

    fn page_count(&self, _path: &Path) -> Result<u32> {
        if self.fail_probe {
            return Err(Error::PdfParse("unreadable cross-reference table".into()));
        }
        Ok(self.texts.len() as u32)
    }

    fn extract_page_text(&self, _path: &Path, page_index: u32) -> Result<String> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.blank_after_reads.is_some_and(|limit| read >= limit) {
            return Ok(String::new());
        }
        Ok(self.texts[page_index as usize].clone())
    }
}

impl ExtractionBackend for MockPdf {
    fn table_method(&self) -> &str {
        "stream"
    }

    fn extract_page_tables(&self, _path: &Path, page_index: u32) -> Result<Vec<TableData>> {
        if self.panic_on_tables {
            panic!("table extractor exploded");
        }
        Ok(self.tables.get(page_index as usize).cloned().unwrap_or_default())
    }

    fn extract_all_images(&self, _path: &Path) -> Result<Vec<ExtractedImage>> {
        Ok(self.images.clone())
    }
}

struct MockText(Vec<String>);

impl PageTextSource for MockText {
    fn name(&self) -> &str {
        "mock-text"
    }

    fn page_count(&self, _path: &Path) -> Result<u32> {
        Ok(self.0.len() as u32)
    }

    fn extract_page_text(&self, _path: &Path, page_index: u32) -> Result<String> {
        Ok(self.0[page_index as usize].clone())
    }
}

struct MockSecondary(Vec<TableData>);

impl SecondaryTableExtractor for MockSecondary {
    fn name(&self) -> &str {
        "delimited"
    }

    fn extract_tables_for_page(&self, _path: &Path, page_index: u32) -> Result<Vec<TableData>> {
        Ok(if page_index == 0 { self.0.clone() } else { Vec::new() })
    }
}

struct MockRenderer;

impl PageRenderer for MockRenderer {
    fn render_page(&self, _path: &Path, page_index: u32, dest: &Path) -> Result<()> {
        std::fs::write(dest, format!("page {}", page_index))?;
        Ok(())
    }
}

struct MockOcr(&'static str);

impl OcrEngine for MockOcr {
    fn recognize(&self, _image_path: &Path, _language: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

#[derive(Clone)]
struct MockRefiner {
    reply: String,
    calls: Arc<AtomicUsize>,
    payloads: Arc<Mutex<Vec<String>>>,
}

impl MockRefiner {
    fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StructureRefiner for MockRefiner {
    fn name(&self) -> &str {
        "mock-refiner"
    }

    fn refine(
        &self,
        _system_prompt: &str,
        _reasoning_prompt: &str,
        payload_json: &str,
    ) -> std::result::Result<String, RefineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload_json.to_string());
        Ok(self.reply.clone())
    }
}

struct Workspace {
    dir: tempfile::TempDir,
    input: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("report.pdf");
        std::fs::write(&input, b"%PDF-1.7\n%mock body\n").unwrap();
        Self { dir, input }
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    fn assets_dir(&self) -> PathBuf {
        self.output_dir().join("report_assets")
    }

    fn options(&self) -> ParseOptions {
        ParseOptions::new()
            .with_output_dir(self.output_dir())
            .with_refine(RefineOptions::default().disabled())
    }

    fn parser(&self, backend: MockPdf) -> HybridParser {
        self.parser_with(backend, self.options())
    }

    fn parser_with(&self, backend: MockPdf, options: ParseOptions) -> HybridParser {
        HybridParser::new(options)
            .with_backend(backend)
            .with_secondary_text(None)
            .with_secondary_tables(None)
            .with_image_table_detector(None)
            .with_renderer(MockRenderer)
            .with_ocr_engine(MockOcr("Recognized scanned text\n\nSecond block"))
            .with_refiner(None)
    }
}

/// Text, one table and one image: nothing missing.
fn complete_backend() -> MockPdf {
    let text = long_text();
    MockPdf {
        tables: vec![vec![sample_table()]],
        images: vec![ExtractedImage::new(0, b"\x89PNG".to_vec(), "png")],
        ..MockPdf::with_pages(&[text.as_str()])
    }
}

// ==================== Classification ====================

#[test]
fn test_classifier_threshold() {
    let ws = Workspace::new();

    let fifty = "z".repeat(50);
    let report = ws
        .parser(MockPdf::with_pages(&[fifty.as_str(), ""]))
        .parse_with_report(&ws.input);
    assert_eq!(report.kind, Some(DocumentKind::Scanned));

    let fifty_one = "z".repeat(51);
    let report = ws
        .parser(MockPdf::with_pages(&["", fifty_one.as_str()]))
        .parse_with_report(&ws.input);
    assert_eq!(report.kind, Some(DocumentKind::Digital));
}

#[test]
fn test_classification_falls_back_to_secondary_text() {
    let ws = Workspace::new();
    let backend = MockPdf {
        fail_probe: true,
        ..MockPdf::with_pages(&[""])
    };
    let parser = ws
        .parser(backend)
        .with_secondary_text(Some(Box::new(MockText(vec![String::new()]))));

    let report = parser.parse_with_report(&ws.input);
    assert_eq!(report.kind, Some(DocumentKind::Scanned));
    assert!(!report.result.is_error());
    assert_eq!(report.result.document().unwrap().page_count(), 1);
}

#[test]
fn test_classification_failure_is_error_shape() {
    let ws = Workspace::new();
    let backend = MockPdf {
        fail_probe: true,
        ..Default::default()
    };
    let report = ws.parser(backend).parse_with_report(&ws.input);

    let error = report.result.error().unwrap();
    assert!(error.starts_with("Classification failed"));
    assert_eq!(
        report.states,
        [ParseState::Start, ParseState::Classifying, ParseState::Failed]
    );
    assert_eq!(
        to_json(&report.result, JsonFormat::Compact).unwrap(),
        serde_json::json!({ "error": error }).to_string()
    );
}

// ==================== Digital path ====================

#[test]
fn test_dedup_identical_tables() {
    let ws = Workspace::new();
    let parser = ws
        .parser(complete_backend())
        .with_secondary_tables(Some(Box::new(MockSecondary(vec![sample_table()]))));

    let result = parser.parse(&ws.input);
    let page = &result.document().unwrap().pages[0];
    assert_eq!(page.tables().count(), 1);
}

#[test]
fn test_dedup_keeps_table_differing_in_one_cell() {
    let ws = Workspace::new();
    let mut other = sample_table();
    other[1][1] = Some("121".to_string());
    let parser = ws
        .parser(complete_backend())
        .with_secondary_tables(Some(Box::new(MockSecondary(vec![other.clone()]))));

    let result = parser.parse(&ws.input);
    let tables: Vec<_> = result.document().unwrap().pages[0].tables().cloned().collect();
    assert_eq!(
        tables,
        [
            ContentItem::table("Extracted by stream", sample_table()),
            ContentItem::table("Extracted by delimited", other),
        ]
    );
}

#[test]
fn test_digital_page_order_and_assets() {
    let ws = Workspace::new();
    let text = format!("{}\n\nClosing paragraph", long_text());
    let backend = MockPdf {
        tables: vec![vec![sample_table()]],
        images: vec![
            ExtractedImage::new(0, b"jpeg".to_vec(), "jpg"),
            ExtractedImage::new(0, b"png".to_vec(), "png"),
        ],
        ..MockPdf::with_pages(&[text.as_str()])
    };

    let result = ws.parser(backend).parse(&ws.input);
    let page = &result.document().unwrap().pages[0];
    let kinds: Vec<_> = page.content.iter().map(ContentItem::kind).collect();
    assert_eq!(kinds, ["paragraph", "paragraph", "table", "image", "image"]);

    let first = ws.assets_dir().join("page_1_img_0.jpg");
    let second = ws.assets_dir().join("page_1_img_1.png");
    assert_eq!(page.content[3].image_path(), Some(first.to_str().unwrap()));
    assert_eq!(page.content[4].image_path(), Some(second.to_str().unwrap()));
    assert_eq!(std::fs::read(first).unwrap(), b"jpeg");
}

#[test]
fn test_backend_panic_is_error_shape() {
    let ws = Workspace::new();
    let text = long_text();
    let backend = MockPdf {
        panic_on_tables: true,
        ..MockPdf::with_pages(&[text.as_str()])
    };

    let report = ws.parser(backend).parse_with_report(&ws.input);
    assert_eq!(
        report.result.error(),
        Some("Unhandled failure: table extractor exploded")
    );
    assert_eq!(report.states.last(), Some(&ParseState::Failed));
}

// ==================== Completeness and escalation ====================

#[test]
fn test_missing_tables_trigger_escalation() {
    let ws = Workspace::new();
    let backend = MockPdf {
        tables: Vec::new(),
        ..complete_backend()
    };
    let refiner = MockRefiner::replying("not json");
    let parser = ws
        .parser(backend)
        .with_refiner(Some(Box::new(refiner.clone())));

    let report = parser.parse_with_report(&ws.input);
    assert_eq!(refiner.calls(), 1);
    assert!(report.states.contains(&ParseState::Escalating));

    let payload: serde_json::Value =
        serde_json::from_str(&refiner.payloads.lock().unwrap()[0]).unwrap();
    assert_eq!(payload["assets_dir"], ws.assets_dir().to_str().unwrap());
    assert_eq!(payload["pages"][0]["page_number"], 1);
}

#[test]
fn test_missing_images_trigger_escalation() {
    let ws = Workspace::new();
    let backend = MockPdf {
        images: Vec::new(),
        ..complete_backend()
    };
    let refiner = MockRefiner::replying("not json");
    let report = ws
        .parser(backend)
        .with_refiner(Some(Box::new(refiner.clone())))
        .parse_with_report(&ws.input);

    assert_eq!(refiner.calls(), 1);
    assert!(matches!(report.escalation, Some(Escalation::FellBack(_))));
    let kinds: Vec<_> = report.result.document().unwrap().pages[0]
        .content
        .iter()
        .map(ContentItem::kind)
        .collect();
    assert_eq!(kinds, ["paragraph", "table"]);
}

#[test]
fn test_missing_text_triggers_escalation() {
    let ws = Workspace::new();
    // The classifier sees a text layer; extraction then finds none.
    let backend = MockPdf {
        blank_after_reads: Some(1),
        ..complete_backend()
    };
    let refiner = MockRefiner::replying("not json");
    let report = ws
        .parser(backend)
        .with_refiner(Some(Box::new(refiner.clone())))
        .parse_with_report(&ws.input);

    assert_eq!(report.kind, Some(DocumentKind::Digital));
    assert_eq!(refiner.calls(), 1);
    let kinds: Vec<_> = report.result.document().unwrap().pages[0]
        .content
        .iter()
        .map(ContentItem::kind)
        .collect();
    assert_eq!(kinds, ["table", "image"]);
}

#[test]
fn test_chart_only_result_is_incomplete() {
    use hybridpdf::parser::Coverage;
    use hybridpdf::Page;

    // Asset names on the digital path never carry chart keywords, so the
    // chart case is checked against the gate directly.
    let mut page = Page::new(1);
    page.extend([
        ContentItem::paragraph(long_text()),
        ContentItem::table("Extracted by stream", sample_table()),
        ContentItem::chart("quarterly_chart.png", None),
    ]);
    let coverage = Coverage::of(std::slice::from_ref(&page));
    assert!(!coverage.is_complete());
    assert_eq!(coverage.missing(), ["image"]);

    page.push(ContentItem::image("page_1_img_0.png", None));
    assert!(Coverage::of(&[page]).is_complete());
}

#[test]
fn test_refiner_panic_falls_back() {
    struct Exploding;

    impl StructureRefiner for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn refine(&self, _: &str, _: &str, _: &str) -> std::result::Result<String, RefineError> {
            panic!("Cannot drop a runtime in a context where blocking is not allowed");
        }
    }

    let ws = Workspace::new();
    let backend = MockPdf::with_pages(&[long_text().as_str()]);
    let raw = ws.parser(backend.clone()).parse(&ws.input);

    let report = ws
        .parser(backend)
        .with_refiner(Some(Box::new(Exploding)))
        .parse_with_report(&ws.input);

    assert_eq!(report.result, raw);
    assert_eq!(report.states.last(), Some(&ParseState::Done));
    match report.escalation {
        Some(Escalation::FellBack(reason)) => assert!(reason.starts_with("refiner panicked")),
        other => panic!("expected a fallback, got {:?}", other),
    }
}

#[test]
fn test_refined_pages_outside_schema_fall_back() {
    let ws = Workspace::new();
    let backend = MockPdf::with_pages(&[long_text().as_str()]);
    let raw = ws.parser(backend.clone()).parse(&ws.input);

    let refiner = MockRefiner::replying(r#"{"pages": [42, "nonsense"]}"#);
    let report = ws
        .parser(backend)
        .with_refiner(Some(Box::new(refiner.clone())))
        .parse_with_report(&ws.input);

    assert_eq!(refiner.calls(), 1);
    assert_eq!(report.result, raw);
    assert!(matches!(report.escalation, Some(Escalation::FellBack(_))));
}

#[test]
fn test_complete_result_is_not_escalated() {
    let ws = Workspace::new();
    let refiner = MockRefiner::replying(r#"{"pages": []}"#);
    let parser = ws
        .parser(complete_backend())
        .with_refiner(Some(Box::new(refiner.clone())));

    let report = parser.parse_with_report(&ws.input);
    assert_eq!(refiner.calls(), 0);
    assert_eq!(report.escalation, Some(Escalation::NotNeeded));
    assert_eq!(
        report.states,
        [
            ParseState::Start,
            ParseState::Classifying,
            ParseState::DigitalPath,
            ParseState::CheckingCompleteness,
            ParseState::Done,
        ]
    );
}

#[test]
fn test_escalation_fallback_on_malformed_json() {
    let ws = Workspace::new();
    let backend = MockPdf::with_pages(&[long_text().as_str()]);

    let raw = ws.parser(backend.clone()).parse(&ws.input);

    let refiner = MockRefiner::replying("Here is your JSON: {pages: oops");
    let report = ws
        .parser(backend)
        .with_refiner(Some(Box::new(refiner.clone())))
        .parse_with_report(&ws.input);

    assert_eq!(refiner.calls(), 1);
    assert!(!report.result.is_error());
    assert_eq!(report.result, raw);
    assert!(matches!(report.escalation, Some(Escalation::FellBack(_))));
}

#[test]
fn test_refined_result_replaces_raw() {
    let ws = Workspace::new();
    let refined = r#"{"pages": [{"page_number": 1, "content": [{"type": "paragraph", "section": "Intro", "sub_section": null, "text": "Refined"}]}]}"#;
    let refiner = MockRefiner::replying(refined);
    let report = ws
        .parser(MockPdf::with_pages(&[long_text().as_str()]))
        .with_refiner(Some(Box::new(refiner)))
        .parse_with_report(&ws.input);

    assert_eq!(report.escalation, Some(Escalation::Refined));
    assert_eq!(
        report.result,
        ParseResult::Refined(serde_json::from_str(refined).unwrap())
    );
}

#[test]
fn test_refined_result_with_wrong_shape_falls_back() {
    let ws = Workspace::new();
    let refiner = MockRefiner::replying(r#"{"error": "quota exceeded"}"#);
    let report = ws
        .parser(MockPdf::with_pages(&[long_text().as_str()]))
        .with_refiner(Some(Box::new(refiner)))
        .parse_with_report(&ws.input);

    assert!(report.result.document().is_some());
    assert!(matches!(report.escalation, Some(Escalation::FellBack(_))));
}

// ==================== OCR path ====================

#[test]
fn test_ocr_path_never_escalates() {
    let ws = Workspace::new();
    let refiner = MockRefiner::replying(r#"{"pages": []}"#);
    let report = ws
        .parser(MockPdf::with_pages(&["", "", ""]))
        .with_refiner(Some(Box::new(refiner.clone())))
        .parse_with_report(&ws.input);

    assert_eq!(refiner.calls(), 0);
    assert_eq!(report.kind, Some(DocumentKind::Scanned));
    assert_eq!(report.escalation, Some(Escalation::NotApplicable));
    assert!(!report.states.contains(&ParseState::CheckingCompleteness));

    let doc = report.result.document().unwrap();
    assert_eq!(doc.page_count(), 3);
    for page in &doc.pages {
        let kinds: Vec<_> = page.content.iter().map(ContentItem::kind).collect();
        assert_eq!(kinds, ["paragraph", "paragraph", "image"]);
    }
    assert!(ws.assets_dir().join("page_3.png").is_file());
    assert_eq!(
        doc.pages[0].content[2],
        ContentItem::image(
            ws.assets_dir().join("page_1.png").to_string_lossy(),
            Some("page_snapshot".to_string())
        )
    );
}

// ==================== Output ====================

#[test]
fn test_parse_is_idempotent() {
    let ws = Workspace::new();
    let backend = MockPdf {
        tables: Vec::new(),
        ..complete_backend()
    };

    let first = to_json(&ws.parser(backend.clone()).parse(&ws.input), JsonFormat::Pretty).unwrap();
    let second = to_json(&ws.parser(backend).parse(&ws.input), JsonFormat::Pretty).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_end_to_end_hello_world() {
    let ws = Workspace::new();
    // "Hello world" is below the default probe threshold.
    let options = ws.options().with_min_text_chars(5);
    let report = ws
        .parser_with(MockPdf::with_pages(&["Hello world"]), options)
        .parse_with_report(&ws.input);

    assert_eq!(report.kind, Some(DocumentKind::Digital));
    assert!(report.states.contains(&ParseState::Escalating));
    assert_eq!(
        to_json(&report.result, JsonFormat::Compact).unwrap(),
        r#"{"pages":[{"page_number":1,"content":[{"type":"paragraph","section":null,"sub_section":null,"text":"Hello world"}]}]}"#
    );
}

#[test]
fn test_export_writes_parsed_json() {
    let ws = Workspace::new();
    let result = ws.parser(complete_backend()).parse(&ws.input);
    let doc = hybridpdf::SourceDocument::describe(&ws.input, ws.output_dir()).unwrap();

    let path = hybridpdf::render::export_json(&result, &doc, JsonFormat::Pretty).unwrap();
    assert_eq!(path, ws.output_dir().join("report_parsed.json"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written["pages"][0]["content"][1]["type"], "table");
    assert_eq!(written["pages"][0]["content"][2]["type"], "image");
}
