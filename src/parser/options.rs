//! Parser configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Default system instruction sent to the structure refiner.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You convert raw PDF extraction output into structured hierarchical JSON.
Return only a JSON object of the form
{\"pages\": [{\"page_number\": <int>, \"content\": [<item>, ...]}, ...]}.
Each item has a \"type\" of \"paragraph\", \"table\", \"image\" or \"chart\".
Paragraphs carry \"section\", \"sub_section\" and \"text\".
Tables carry \"section\", \"description\" and \"table_data\" (rows of cells, null for empty cells).
Images and charts carry \"section\", \"description\" and \"image_path\".
Never invent text, numbers or image paths that are not present in the input.";

/// Default reasoning instruction sent to the structure refiner.
pub const DEFAULT_REASONING_PROMPT: &str = "\
The input is a rule-based extraction that missed some content categories.
Infer section and sub_section headings from the paragraph text where they are evident.
Recover tables that were flattened into paragraphs as table items.
Keep image_path values exactly as given; they point into assets_dir.
Preserve page numbers and the order of content within each page.";

/// Options for the hybrid parser.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Output root; assets go to `<output_dir>/<base_name>_assets/`
    pub output_dir: PathBuf,

    /// OCR languages in priority order
    pub ocr_languages: Vec<String>,

    /// How an OCR result is chosen among languages
    pub ocr_policy: OcrPolicy,

    /// Trimmed length an OCR result must exceed to be accepted
    pub ocr_min_chars: usize,

    /// Number of leading pages the classifier probes
    pub sample_pages: u32,

    /// Trimmed text length a probed page must exceed to count as digital
    pub min_text_chars: usize,

    /// What to emit for embedded images that contain tables
    pub image_tables: ImageTablePolicy,

    /// Structure refinement settings
    pub refine: RefineOptions,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output root.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the OCR language priority list. An empty list keeps the default.
    pub fn with_ocr_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let languages: Vec<String> = languages.into_iter().map(Into::into).collect();
        if !languages.is_empty() {
            self.ocr_languages = languages;
        }
        self
    }

    /// Set the OCR language selection policy.
    pub fn with_ocr_policy(mut self, policy: OcrPolicy) -> Self {
        self.ocr_policy = policy;
        self
    }

    /// Set the OCR acceptance threshold.
    pub fn with_ocr_min_chars(mut self, chars: usize) -> Self {
        self.ocr_min_chars = chars;
        self
    }

    /// Set the number of pages probed by the classifier.
    pub fn with_sample_pages(mut self, pages: u32) -> Self {
        self.sample_pages = pages;
        self
    }

    /// Set the per-page text threshold used by the classifier.
    pub fn with_min_text_chars(mut self, chars: usize) -> Self {
        self.min_text_chars = chars;
        self
    }

    /// Set the image table policy.
    pub fn with_image_tables(mut self, policy: ImageTablePolicy) -> Self {
        self.image_tables = policy;
        self
    }

    /// Set refinement options.
    pub fn with_refine(mut self, refine: RefineOptions) -> Self {
        self.refine = refine;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            ocr_languages: vec!["eng".to_string()],
            ocr_policy: OcrPolicy::FirstAcceptable,
            ocr_min_chars: 10,
            sample_pages: 2,
            min_text_chars: 50,
            image_tables: ImageTablePolicy::Both,
            refine: RefineOptions::default(),
        }
    }
}

/// How the OCR path picks one result among the configured languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcrPolicy {
    /// Stop at the first language whose result exceeds the threshold; if
    /// none does, keep the last attempt.
    #[default]
    FirstAcceptable,
    /// Try every language and keep the longest trimmed result.
    Longest,
}

/// What to emit for an embedded image in which tables were detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageTablePolicy {
    /// Emit the detected tables and the image item.
    #[default]
    Both,
    /// Emit only the detected tables; images without tables are still emitted.
    TablesOnly,
    /// Do not run image table detection.
    Skip,
}

/// Which structure-refinement service to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefineProvider {
    #[default]
    Gemini,
    /// Never escalate to a service; incomplete results fall back at once.
    Disabled,
}

impl std::str::FromStr for RefineProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GEMINI" => Ok(RefineProvider::Gemini),
            "NONE" | "DISABLED" | "" => Ok(RefineProvider::Disabled),
            other => Err(format!("unknown LLM provider: {}", other)),
        }
    }
}

/// Structure refinement settings.
#[derive(Debug, Clone)]
pub struct RefineOptions {
    pub provider: RefineProvider,
    pub api_key: Option<String>,
    pub model: String,
    /// Request timeout for the refinement call
    pub timeout: Duration,
    pub system_prompt: String,
    pub reasoning_prompt: String,
}

impl RefineOptions {
    /// Read `LLM_PROVIDER` and `GEMINI_API_KEY` from the environment.
    ///
    /// An unknown provider name disables refinement.
    pub fn from_env() -> Self {
        let provider = std::env::var("LLM_PROVIDER")
            .ok()
            .map(|p| {
                p.parse().unwrap_or_else(|e| {
                    log::warn!("{}; refinement disabled", e);
                    RefineProvider::Disabled
                })
            })
            .unwrap_or_default();
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Self {
            provider,
            api_key,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_provider(mut self, provider: RefineProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Disable refinement.
    pub fn disabled(self) -> Self {
        self.with_provider(RefineProvider::Disabled)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_prompts(
        mut self,
        system_prompt: impl Into<String>,
        reasoning_prompt: impl Into<String>,
    ) -> Self {
        self.system_prompt = system_prompt.into();
        self.reasoning_prompt = reasoning_prompt.into();
        self
    }

    /// Load `system.txt` and `reasoning.txt` from `dir`.
    pub fn with_prompt_dir(self, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let system = std::fs::read_to_string(dir.join("system.txt"))?;
        let reasoning = std::fs::read_to_string(dir.join("reasoning.txt"))?;
        Ok(self.with_prompts(system, reasoning))
    }

    /// Whether a refiner can be built from these options.
    pub fn is_configured(&self) -> bool {
        self.provider == RefineProvider::Gemini
            && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            provider: RefineProvider::Gemini,
            api_key: None,
            model: "gemini-1.5-pro".to_string(),
            timeout: Duration::from_secs(120),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reasoning_prompt: DEFAULT_REASONING_PROMPT.to_string(),
        }
    }
}
