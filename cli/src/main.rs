//! hybridpdf CLI - PDF to structured JSON

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use hybridpdf::{
    render, Escalation, HybridParser, ImageTablePolicy, JsonFormat, OcrPolicy, ParseOptions,
    RefineOptions, RefineProvider, SourceDocument,
};

#[derive(Parser)]
#[command(name = "hybridpdf")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Convert PDF documents to structured hierarchical JSON", long_about = None)]
struct Cli {
    /// Input PDF file (same as `hybridpdf parse FILE`)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a PDF and export <name>_parsed.json
    Parse(ParseArgs),

    /// Report whether a PDF is scanned or digital
    Classify {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Number of leading pages to probe
        #[arg(long, default_value_t = 2)]
        sample_pages: u32,
    },

    /// Show version information
    Version,
}

/// `hybridpdf FILE`: the parse options with their defaults and environment.
#[derive(Parser)]
#[command(name = "hybridpdf")]
struct BareParse {
    #[command(flatten)]
    args: ParseArgs,
}

#[derive(Args)]
struct ParseArgs {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = "outputs")]
    output: PathBuf,

    /// OCR language, in priority order (repeatable)
    #[arg(long = "lang", value_name = "LANG")]
    languages: Vec<String>,

    /// OCR language selection
    #[arg(long, value_enum, default_value = "first")]
    ocr_policy: OcrChoice,

    /// What to emit for images that contain tables
    #[arg(long, value_enum, default_value = "both")]
    image_tables: ImageTables,

    /// Output compact JSON
    #[arg(long)]
    compact: bool,

    /// Print the JSON instead of writing <name>_parsed.json
    #[arg(long)]
    stdout: bool,

    /// Print the parse report (kind, states, escalation) to stderr
    #[arg(long)]
    report: bool,

    /// Never call the refinement service
    #[arg(long)]
    no_refine: bool,

    /// Refinement provider
    #[arg(long, env = "LLM_PROVIDER", value_enum, ignore_case = true, default_value = "gemini")]
    provider: Provider,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model
    #[arg(long, default_value = "gemini-1.5-pro")]
    model: String,

    /// Refinement request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    timeout: u64,

    /// Directory containing system.txt and reasoning.txt prompts
    #[arg(long, value_name = "DIR")]
    prompt_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OcrChoice {
    /// First language with a usable result
    First,
    /// Longest result across all languages
    Longest,
}

impl From<OcrChoice> for OcrPolicy {
    fn from(choice: OcrChoice) -> Self {
        match choice {
            OcrChoice::First => OcrPolicy::FirstAcceptable,
            OcrChoice::Longest => OcrPolicy::Longest,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ImageTables {
    /// Emit detected tables and the image
    Both,
    /// Emit only the detected tables
    TablesOnly,
    /// Do not look for tables in images
    Skip,
}

impl From<ImageTables> for ImageTablePolicy {
    fn from(mode: ImageTables) -> Self {
        match mode {
            ImageTables::Both => ImageTablePolicy::Both,
            ImageTables::TablesOnly => ImageTablePolicy::TablesOnly,
            ImageTables::Skip => ImageTablePolicy::Skip,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Provider {
    Gemini,
    None,
}

impl From<Provider> for RefineProvider {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Gemini => RefineProvider::Gemini,
            Provider::None => RefineProvider::Disabled,
        }
    }
}

impl ParseArgs {
    /// Options for `hybridpdf FILE`, resolved by clap like `hybridpdf parse FILE`.
    fn for_input(input: PathBuf) -> Result<Self, clap::Error> {
        let argv = [OsString::from("hybridpdf"), OsString::from("--"), input.into_os_string()];
        BareParse::try_parse_from(argv).map(|bare| bare.args)
    }

    fn to_options(&self) -> Result<ParseOptions, Box<dyn std::error::Error>> {
        let mut refine = RefineOptions::default()
            .with_provider(self.provider.into())
            .with_model(&self.model)
            .with_timeout(Duration::from_secs(self.timeout));

        if let Some(key) = &self.api_key {
            refine = refine.with_api_key(key);
        }
        if let Some(dir) = &self.prompt_dir {
            refine = refine.with_prompt_dir(dir)?;
        }
        if self.no_refine {
            refine = refine.disabled();
        }

        Ok(ParseOptions::new()
            .with_output_dir(&self.output)
            .with_ocr_languages(self.languages.iter().cloned())
            .with_ocr_policy(self.ocr_policy.into())
            .with_image_tables(self.image_tables.into())
            .with_refine(refine))
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Parse(args)) => cmd_parse(&args),
        Some(Commands::Classify {
            input,
            sample_pages,
        }) => cmd_classify(&input, sample_pages),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            if let Some(input) = cli.input {
                ParseArgs::for_input(input)
                    .map_err(Into::into)
                    .and_then(|args| cmd_parse(&args))
            } else {
                println!("{}", "Usage: hybridpdf <FILE>".yellow());
                println!("       hybridpdf --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn cmd_parse(args: &ParseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.to_options()?;
    let doc = SourceDocument::describe(&args.input, &options.output_dir)?;
    let parser = HybridParser::new(options);

    if !args.no_refine && !parser.has_refiner() {
        log::info!("No refinement service configured; incomplete results are kept as-is");
    }

    let pb = spinner(&format!("Parsing {}...", args.input.display()));
    let report = parser.parse_with_report(&args.input);
    pb.finish_and_clear();

    if args.report {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "kind": report.kind,
                "states": report.states,
                "escalation": report.escalation,
            }))?
        );
    }

    let format = if args.compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    if args.stdout {
        println!("{}", render::to_json(&report.result, format)?);
    } else {
        let path = render::export_json(&report.result, &doc, format)?;
        println!("{} {}", "Saved to".green(), path.display());
        if !report.result.is_error() {
            println!("{} {}", "Assets in".green(), doc.assets_dir().display());
        }
    }

    if let Some(error) = report.result.error() {
        return Err(error.into());
    }

    if let Some(kind) = report.kind {
        let pages = report.result.document().map(|d| d.page_count());
        println!(
            "{}: {}{}",
            "Document".bold(),
            kind,
            pages.map(|n| format!(", {} pages", n)).unwrap_or_default()
        );
    }
    if let Some(escalation) = &report.escalation {
        let line = format!("{}: {}", "Refinement".bold(), escalation);
        match escalation {
            Escalation::FellBack(_) => println!("{}", line.yellow()),
            _ => println!("{}", line),
        }
    }

    Ok(())
}

fn cmd_classify(input: &Path, sample_pages: u32) -> Result<(), Box<dyn std::error::Error>> {
    let options = ParseOptions::new()
        .with_sample_pages(sample_pages)
        .with_refine(RefineOptions::default().disabled());
    let kind = HybridParser::new(options).classify(input)?;

    println!("{}: {}", input.display().to_string().bold(), kind.to_string().cyan());
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "hybridpdf".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Hybrid PDF to structured JSON parser");
    println!();
    println!("License: MIT");
}
