//! CLI binary for edgequake-contracts.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs a batch, and writes the tables.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_contracts::export::write_batch;
use edgequake_contracts::pipeline::input;
use edgequake_contracts::{
    BatchProgressCallback, Extractor, OcrMode, PipelineConfig, ProgressCallback,
    RecognizerBackend, Vocabulary,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per document. Documents finish out of
/// order, so start times are tracked per identifier.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    recognized: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading contracts…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            recognized: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, id: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(id))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} contracts  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_documents} contracts…"))
        ));
    }

    fn on_document_start(&self, id: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(id.to_string(), Instant::now());
        }
        self.bar.set_message(id.to_string());
    }

    fn on_document_complete(&self, id: &str, used_ocr: bool) {
        let secs = self.elapsed_secs(id);
        if used_ocr {
            self.recognized.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.println(format!(
            "  {} {:<40}  {:<5}  {}",
            green("✓"),
            id,
            dim(if used_ocr { "ocr" } else { "text" }),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, id: &str, error: &str) {
        let secs = self.elapsed_secs(id);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            red("✗"),
            id,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();
        let ocr = self.recognized.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} contracts extracted  {}",
                green("✔"),
                bold(&success_count.to_string()),
                dim(&format!("({ocr} via OCR)"))
            );
        } else {
            eprintln!(
                "{} {}/{} contracts extracted  ({} unreadable)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every PDF in a directory, tables written to ./output
  contract2tables contracts/

  # Several files, custom output directory
  contract2tables a.pdf b.pdf -o tables/

  # Text layer only, no OCR (no API key needed)
  contract2tables --ocr never contracts/

  # Local Tesseract instead of a vision model (build with --features tesseract)
  contract2tables --recognizer tesseract contracts/

  # Extend the curated vocabulary
  contract2tables --vocabulary my_vocab.toml contracts/

  # Whole batch as JSON on stdout
  contract2tables --json contracts/ > batch.json

OUTPUT FILES:
  Records.csv              one row per contract, canonical columns + Source File
  records.json             the same records with provenance
  Dim_Buyer.csv            deduplicated buyers
  Dim_Seller.csv           deduplicated sellers
  Dim_Product.csv          deduplicated products
  Fact_Contract_Sales.csv  one row per contract, keys + measures
  failures.json            documents that could not be opened, with reasons

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (vision OCR)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Extract procurement contracts into records and star-schema tables.
#[derive(Parser, Debug)]
#[command(
    name = "contract2tables",
    version,
    about = "Extract procurement-contract PDFs into records and star-schema tables",
    long_about = "Read procurement-contract PDFs (digital or scanned), extract a fixed set of \
contract fields, and write a records table plus Dim_Buyer, Dim_Seller, Dim_Product and \
Fact_Contract_Sales. Pages without a usable text layer are transcribed by a vision model \
or a local Tesseract engine.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files and/or directories of PDFs.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the tables are written to.
    #[arg(short, long, env = "CONTRACTS_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// When to run optical recognition.
    #[arg(long, env = "CONTRACTS_OCR", value_enum, default_value = "auto")]
    ocr: OcrArg,

    /// Recognition engine.
    #[arg(long, env = "CONTRACTS_RECOGNIZER", value_enum, default_value = "vision")]
    recognizer: RecognizerArg,

    /// Vision model ID (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI for OCR (72–400).
    #[arg(long, env = "CONTRACTS_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Contracts processed concurrently.
    #[arg(short, long, env = "CONTRACTS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Recognition budget per contract, in seconds.
    #[arg(long, env = "CONTRACTS_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// Text layers shorter than this many characters are treated as missing.
    #[arg(long, env = "CONTRACTS_MIN_TEXT_CHARS", default_value_t = 50)]
    min_text_chars: usize,

    /// TOML file overriding tables of the built-in vocabulary.
    #[arg(long, env = "CONTRACTS_VOCABULARY")]
    vocabulary: Option<PathBuf>,

    /// Placeholder written for absent values.
    #[arg(long, env = "CONTRACTS_SENTINEL", default_value = "NA")]
    sentinel: String,

    /// Path to the pdfium library (file or directory).
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,

    /// Tesseract language codes, e.g. eng or eng+hin.
    #[arg(long, env = "CONTRACTS_TESSERACT_LANG", default_value = "eng")]
    tesseract_lang: String,

    /// Path to a text file containing a custom transcription prompt.
    #[arg(long, env = "CONTRACTS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Retries per page on a recognizer failure.
    #[arg(long, env = "CONTRACTS_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Print the whole batch (records, failures, tables) as JSON instead of writing files.
    #[arg(long, env = "CONTRACTS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CONTRACTS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CONTRACTS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CONTRACTS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OcrArg {
    Auto,
    Never,
    Always,
}

impl From<OcrArg> for OcrMode {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Auto => OcrMode::Auto,
            OcrArg::Never => OcrMode::Never,
            OcrArg::Always => OcrMode::Always,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum RecognizerArg {
    Vision,
    Tesseract,
}

impl From<RecognizerArg> for RecognizerBackend {
    fn from(v: RecognizerArg) -> Self {
        match v {
            RecognizerArg::Vision => RecognizerBackend::Vision,
            RecognizerArg::Tesseract => RecognizerBackend::Tesseract,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load inputs ──────────────────────────────────────────────────────
    let files = input::collect_inputs(&cli.inputs).context("Failed to collect inputs")?;
    let docs = input::load_documents(&files)
        .await
        .context("Failed to read inputs")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let extractor = Extractor::new(&config).context("Failed to start extraction")?;
    let output = extractor.extract_batch(&docs).await;

    if output.stats.total_documents > 0 && output.stats.succeeded == 0 {
        let first = output
            .failures
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        anyhow::bail!(
            "None of the {} contracts could be read. First error: {}",
            output.stats.total_documents,
            first
        );
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let written = tokio::task::block_in_place(|| write_batch(&cli.output_dir, &output))
        .context("Failed to write tables")?;

    if !cli.quiet {
        let m = &output.model;
        eprintln!(
            "{}  {}/{} contracts  {}ms  →  {}",
            if output.stats.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.succeeded,
            output.stats.total_documents,
            output.stats.total_duration_ms,
            bold(&cli.output_dir.display().to_string()),
        );
        eprintln!(
            "   {}",
            dim(&format!(
                "{} buyers  /  {} sellers  /  {} products  /  {} facts  ({} files)",
                m.buyers.len(),
                m.sellers.len(),
                m.products.len(),
                m.facts.len(),
                written.len()
            ))
        );
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = PipelineConfig::builder()
        .ocr_mode(cli.ocr.clone().into())
        .recognizer(cli.recognizer.clone().into())
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .ocr_timeout_secs(cli.ocr_timeout)
        .min_text_chars(cli.min_text_chars)
        .sentinel(cli.sentinel.clone())
        .tesseract_language(cli.tesseract_lang.clone())
        .max_retries(cli.max_retries);

    if let Some(ref path) = cli.vocabulary {
        let vocabulary = Vocabulary::load(path)
            .with_context(|| format!("Failed to load vocabulary from {:?}", path))?;
        builder = builder.vocabulary(vocabulary);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library(path.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
