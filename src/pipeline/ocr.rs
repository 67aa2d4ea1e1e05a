//! Optical recognition of rendered pages.
//!
//! A [`Recognizer`] turns one page image into plain text. Two engines exist:
//!
//! * [`VisionRecognizer`] sends the page to a vision-capable LLM through
//!   `edgequake-llm` and asks for a verbatim transcription.
//! * `TesseractRecognizer` (feature `tesseract`) runs the local Tesseract
//!   engine through `leptess`.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 responses from LLM APIs are transient under concurrent
//! load. Each page is retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`); with 500 ms base and 2 retries the waits
//! are 500 ms then 1 s. A page that still fails contributes no text.

use crate::config::{PipelineConfig, RecognizerBackend};
use crate::error::{ContractError, RecognitionError};
use crate::pipeline::encode;
use crate::prompts::{page_instruction, DEFAULT_TRANSCRIPTION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Turns one rendered page into text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short engine name for logs and provenance.
    fn name(&self) -> &str;

    /// Recognise one page. `page_num` is 1-based.
    async fn recognize(
        &self,
        page_num: usize,
        image: &DynamicImage,
    ) -> Result<String, RecognitionError>;
}

/// Construct the recognizer selected by `config.recognizer`.
///
/// Returns [`ContractError::RecognizerUnavailable`] when the engine cannot be
/// set up (no LLM credentials, feature not compiled, missing language data).
/// The batch treats that as "no recognizer" rather than aborting.
pub fn resolve_recognizer(config: &PipelineConfig) -> Result<Arc<dyn Recognizer>, ContractError> {
    match config.recognizer {
        RecognizerBackend::Vision => {
            let provider = resolve_provider(config)?;
            info!(
                "Vision recognizer ready (model: {})",
                config.model.as_deref().unwrap_or("provider default")
            );
            Ok(Arc::new(VisionRecognizer::new(provider, config)))
        }
        RecognizerBackend::Tesseract => tesseract_recognizer(config),
    }
}

#[cfg(feature = "tesseract")]
fn tesseract_recognizer(config: &PipelineConfig) -> Result<Arc<dyn Recognizer>, ContractError> {
    Ok(Arc::new(TesseractRecognizer::new(&config.tesseract_language)?))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_recognizer(_config: &PipelineConfig) -> Result<Arc<dyn Recognizer>, ContractError> {
    Err(ContractError::RecognizerUnavailable {
        backend: "tesseract".into(),
        hint: "This build does not include Tesseract. Rebuild with `--features tesseract`.".into(),
    })
}

// ── Vision recognizer ────────────────────────────────────────────────────

/// Transcribes pages with a vision-capable LLM.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }
}

#[async_trait]
impl Recognizer for VisionRecognizer {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(
        &self,
        page_num: usize,
        image: &DynamicImage,
    ) -> Result<String, RecognitionError> {
        let start = Instant::now();
        let attachment = encode::vision_attachment(page_num, image)?;
        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user_with_images(&page_instruction(page_num), vec![attachment]),
        ];

        let mut last_err: Option<String> = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page_num, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens, {:?}",
                        page_num,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(strip_code_fence(&response.content));
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(RecognitionError::Failed {
            page: page_num,
            retries: self.max_retries.min(u8::MAX as u32) as u8,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Vision models sometimes wrap a transcription in a fence despite the prompt.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
        return body.trim_end().trim_end_matches("```").trim_end().to_string();
    }
    trimmed.to_string()
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ContractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ContractError::RecognizerUnavailable {
            backend: format!("vision ({provider_name})"),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. a pre-built `config.provider`;
/// 2. `config.provider_name` with `config.model`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. OpenAI when `OPENAI_API_KEY` is set;
/// 5. whatever `ProviderFactory::from_env` detects.
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, ContractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ContractError::RecognizerUnavailable {
            backend: "vision (auto)".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or choose --recognizer tesseract.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Tesseract recognizer ─────────────────────────────────────────────────

/// Recognises pages with a local Tesseract installation.
#[cfg(feature = "tesseract")]
pub struct TesseractRecognizer {
    language: String,
}

#[cfg(feature = "tesseract")]
impl TesseractRecognizer {
    /// Verify Tesseract initialises with `language` before any page is sent.
    pub fn new(language: &str) -> Result<Self, ContractError> {
        leptess::LepTess::new(None, language).map_err(|e| {
            ContractError::RecognizerUnavailable {
                backend: "tesseract".into(),
                hint: format!(
                    "Failed to initialise Tesseract with language '{}': {}. \
                     Make sure the traineddata file is installed.",
                    language, e
                ),
            }
        })?;
        Ok(Self {
            language: language.to_string(),
        })
    }
}

#[cfg(feature = "tesseract")]
#[async_trait]
impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(
        &self,
        page_num: usize,
        image: &DynamicImage,
    ) -> Result<String, RecognitionError> {
        let png = encode::png_bytes(page_num, image)?;
        let language = self.language.clone();
        let failed = move |detail: String| RecognitionError::Failed {
            page: page_num,
            retries: 0,
            detail,
        };

        // LepTess is not Send-safe across awaits; run it on a blocking thread.
        tokio::task::spawn_blocking(move || {
            let mut lt = leptess::LepTess::new(None, &language)
                .map_err(|e| format!("Tesseract init failed: {e}"))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| format!("Tesseract rejected page image: {e}"))?;
            lt.get_utf8_text()
                .map_err(|e| format!("Tesseract produced invalid UTF-8: {e}"))
        })
        .await
        .map_err(|e| failed(format!("recognition task panicked: {e}")))?
        .map_err(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_follow_config() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn code_fences_are_removed() {
        assert_eq!(
            strip_code_fence("```text\nContract No: GEMC-511687\n```"),
            "Contract No: GEMC-511687"
        );
        assert_eq!(strip_code_fence("  plain  "), "plain");
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn tesseract_without_feature_is_unavailable() {
        let config = PipelineConfig::builder()
            .recognizer(RecognizerBackend::Tesseract)
            .build()
            .unwrap();
        match resolve_recognizer(&config) {
            Err(ContractError::RecognizerUnavailable { backend, .. }) => {
                assert_eq!(backend, "tesseract")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("tesseract should be unavailable"),
        }
    }
}
