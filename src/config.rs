//! Configuration types for contract extraction.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. One struct holds every knob so a run can be
//! shared across tasks, logged, and compared with another run.

use crate::error::ContractError;
use crate::progress::ProgressCallback;
use crate::record::DEFAULT_SENTINEL;
use crate::vocabulary::Vocabulary;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a contract-extraction run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_contracts::{OcrMode, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .dpi(300)
///     .concurrency(8)
///     .ocr_mode(OcrMode::Auto)
///     .ocr_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    // ── Text acquisition ─────────────────────────────────────────────────
    /// When to fall back to optical recognition. Default: [`OcrMode::Auto`].
    pub ocr_mode: OcrMode,

    /// Rendering DPI for pages sent to the recognizer. Range: 72–400. Default: 300.
    pub dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 3500.
    ///
    /// Independent of DPI: an oversized page at 300 DPI would otherwise
    /// allocate hundreds of megabytes.
    pub max_rendered_pixels: u32,

    /// A text layer with fewer non-whitespace characters than this is treated
    /// as missing. Default: 50.
    pub min_text_chars: usize,

    /// A text layer where more than this share of non-whitespace characters
    /// falls outside [`PipelineConfig::target_script`] is treated as corrupted.
    /// Range: 0.0–1.0. Default: 0.30.
    pub max_non_target_ratio: f32,

    /// Recognition budget per document, in seconds. Default: 120.
    ///
    /// When the budget runs out the document keeps whatever pages were
    /// already recognised.
    pub ocr_timeout_secs: u64,

    /// Which recognizer performs optical recognition. Default: [`RecognizerBackend::Vision`].
    pub recognizer: RecognizerBackend,

    /// Path to the pdfium shared library (file or directory). If None, the
    /// `PDFIUM_LIB_PATH` environment variable and then the system loader are used.
    pub pdfium_library: Option<PathBuf>,

    // ── Vision recognizer ─────────────────────────────────────────────────
    /// Vision model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for transcription. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries per page on a transient recognizer failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom transcription prompt. If None, uses the built-in prompt.
    pub system_prompt: Option<String>,

    // ── Tesseract recognizer ──────────────────────────────────────────────
    /// Tesseract language codes, e.g. "eng" or "eng+hin". Default: "eng".
    pub tesseract_language: String,

    // ── Normalisation ─────────────────────────────────────────────────────
    /// Characters kept by the normaliser; everything else becomes a space.
    /// Default: printable ASCII.
    pub target_script: Vec<ScriptRange>,

    /// Boilerplate phrases; the first occurrence of each (case-insensitive)
    /// is removed together with all text after it.
    pub stop_phrases: Vec<String>,

    // ── Extraction ────────────────────────────────────────────────────────
    /// Zone boundaries used to scope field search.
    pub zones: ZoneSet,

    /// Curated vocabulary (states, departments, name fragments).
    pub vocabulary: Arc<Vocabulary>,

    /// Placeholder written for absent text values. Default: "NA".
    pub sentinel: String,

    /// Shortest token the doubled-character repair will touch, unless the
    /// token contains a doubled separator. Default: 8.
    pub doubled_repair_min_len: usize,

    // ── Batch ─────────────────────────────────────────────────────────────
    /// Documents processed concurrently. Default: 4.
    pub concurrency: usize,

    /// Optional progress callback for batch events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_mode: OcrMode::default(),
            dpi: 300,
            max_rendered_pixels: 3500,
            min_text_chars: 50,
            max_non_target_ratio: 0.30,
            ocr_timeout_secs: 120,
            recognizer: RecognizerBackend::default(),
            pdfium_library: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            tesseract_language: "eng".to_string(),
            target_script: vec![ScriptRange::PRINTABLE_ASCII],
            stop_phrases: default_stop_phrases(),
            zones: ZoneSet::default(),
            vocabulary: Arc::new(Vocabulary::default()),
            sentinel: DEFAULT_SENTINEL.to_string(),
            doubled_repair_min_len: 8,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

/// Boilerplate that closes a contract: legal terms and signature notices.
pub fn default_stop_phrases() -> Vec<String> {
    [
        "General Terms and Conditions",
        "This is a system generated",
        "does not require any signature",
        "Digitally signed by",
        "Disclaimer:",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("ocr_mode", &self.ocr_mode)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("min_text_chars", &self.min_text_chars)
            .field("max_non_target_ratio", &self.max_non_target_ratio)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("recognizer", &self.recognizer)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("stop_phrases", &self.stop_phrases)
            .field("sentinel", &self.sentinel)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when `c` is inside one of the target-script ranges.
    pub fn is_target_char(&self, c: char) -> bool {
        self.target_script.iter().any(|r| r.contains(c))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn ocr_mode(mut self, mode: OcrMode) -> Self {
        self.config.ocr_mode = mode;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn max_non_target_ratio(mut self, ratio: f32) -> Self {
        self.config.max_non_target_ratio = ratio;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn recognizer(mut self, backend: RecognizerBackend) -> Self {
        self.config.recognizer = backend;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn tesseract_language(mut self, lang: impl Into<String>) -> Self {
        self.config.tesseract_language = lang.into();
        self
    }

    pub fn target_script(mut self, ranges: Vec<ScriptRange>) -> Self {
        self.config.target_script = ranges;
        self
    }

    pub fn stop_phrases(mut self, phrases: Vec<String>) -> Self {
        self.config.stop_phrases = phrases;
        self
    }

    pub fn add_stop_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.config.stop_phrases.push(phrase.into());
        self
    }

    pub fn zones(mut self, zones: ZoneSet) -> Self {
        self.config.zones = zones;
        self
    }

    pub fn vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.config.vocabulary = Arc::new(vocabulary);
        self
    }

    pub fn sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.config.sentinel = sentinel.into();
        self
    }

    pub fn doubled_repair_min_len(mut self, n: usize) -> Self {
        self.config.doubled_repair_min_len = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ContractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ContractError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if !(0.0..=1.0).contains(&c.max_non_target_ratio) {
            return Err(ContractError::InvalidConfig(format!(
                "max_non_target_ratio must be 0.0–1.0, got {}",
                c.max_non_target_ratio
            )));
        }
        if c.concurrency == 0 {
            return Err(ContractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.sentinel.trim().is_empty() {
            return Err(ContractError::InvalidConfig(
                "Sentinel must not be blank".into(),
            ));
        }
        if c.target_script.is_empty() {
            return Err(ContractError::InvalidConfig(
                "target_script needs at least one range".into(),
            ));
        }
        if let Some(r) = c.target_script.iter().find(|r| r.start > r.end) {
            return Err(ContractError::InvalidConfig(format!(
                "Script range {:?}..={:?} is reversed",
                r.start, r.end
            )));
        }
        if c.doubled_repair_min_len < 4 {
            return Err(ContractError::InvalidConfig(format!(
                "doubled_repair_min_len must be ≥ 4, got {}",
                c.doubled_repair_min_len
            )));
        }
        Ok(self.config)
    }
}

// ── Enums and small types ────────────────────────────────────────────────

/// When text acquisition runs optical recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    /// Only when the text layer is empty, too short, or corrupted. (default)
    #[default]
    Auto,
    /// Never; documents without a usable text layer yield sentinel fields.
    Never,
    /// Always, ignoring the text layer unless recognition yields nothing.
    Always,
}

/// Which engine performs optical recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerBackend {
    /// A vision-capable LLM transcribes each page image. (default)
    #[default]
    Vision,
    /// Local Tesseract engine; requires the `tesseract` feature.
    Tesseract,
}

/// An inclusive range of characters the normaliser keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRange {
    pub start: char,
    pub end: char,
}

impl ScriptRange {
    /// Space through tilde: ASCII punctuation, digits, and letters.
    pub const PRINTABLE_ASCII: ScriptRange = ScriptRange {
        start: ' ',
        end: '~',
    };

    pub const fn new(start: char, end: char) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, c: char) -> bool {
        self.start <= c && c <= self.end
    }
}

/// A logical zone of a contract: the text strictly between `start` and the
/// nearest following `ends` label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub start: String,
    pub ends: Vec<String>,
}

impl ZoneDefinition {
    pub fn new(start: impl Into<String>, ends: &[&str]) -> Self {
        Self {
            start: start.into(),
            ends: ends.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The zones the field catalog scopes its searches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSet {
    pub organisation: ZoneDefinition,
    pub buyer: ZoneDefinition,
    pub seller: ZoneDefinition,
    pub product: ZoneDefinition,
}

impl Default for ZoneSet {
    fn default() -> Self {
        Self {
            organisation: ZoneDefinition::new(
                "Organisation Details",
                &["Buyer Details", "Financial Approval Detail", "Seller Details"],
            ),
            buyer: ZoneDefinition::new(
                "Buyer Details",
                &[
                    "Financial Approval Detail",
                    "Paying Authority Details",
                    "Seller Details",
                    "Product Details",
                ],
            ),
            seller: ZoneDefinition::new(
                "Seller Details",
                &["Product Details", "Consignee Detail", "Specification", "Epbg Detail"],
            ),
            product: ZoneDefinition::new(
                "Product Details",
                &["Consignee Detail", "Specification", "Epbg Detail", "Terms and Conditions"],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = PipelineConfig::builder().build().unwrap();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.min_text_chars, 50);
        assert_eq!(c.sentinel, "NA");
        assert_eq!(c.ocr_mode, OcrMode::Auto);
        assert!(c.is_target_char('A'));
        assert!(c.is_target_char(':'));
        assert!(!c.is_target_char('\u{0915}'));
    }

    #[test]
    fn dpi_is_clamped_by_setter() {
        let c = PipelineConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(c.dpi, 400);
    }

    #[test]
    fn invalid_ratio_is_rejected() {
        let err = PipelineConfig::builder()
            .max_non_target_ratio(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidConfig(_)));
    }

    #[test]
    fn blank_sentinel_is_rejected() {
        assert!(PipelineConfig::builder().sentinel("  ").build().is_err());
    }

    #[test]
    fn reversed_script_range_is_rejected() {
        let err = PipelineConfig::builder()
            .target_script(vec![ScriptRange::new('z', 'a')])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("reversed"));
    }

    #[test]
    fn custom_script_range_extends_target() {
        let c = PipelineConfig::builder()
            .target_script(vec![
                ScriptRange::PRINTABLE_ASCII,
                ScriptRange::new('\u{0900}', '\u{097F}'),
            ])
            .build()
            .unwrap();
        assert!(c.is_target_char('\u{0915}'));
    }

    #[test]
    fn ocr_mode_serde_names() {
        assert_eq!(serde_json::to_string(&OcrMode::Never).unwrap(), "\"never\"");
        let m: OcrMode = serde_json::from_str("\"always\"").unwrap();
        assert_eq!(m, OcrMode::Always);
    }
}
