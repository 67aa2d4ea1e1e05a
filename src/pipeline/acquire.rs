//! Text acquisition: best-effort text for one document.
//!
//! The embedded text layer is read first. It is only replaced by optical
//! recognition when it is unusable:
//!
//! * **empty**: no non-whitespace characters at all (a scanned document);
//! * **too short**: fewer than `min_text_chars` non-whitespace characters;
//! * **corrupted**: font-substitution markers such as `(cid:123)`, or more than
//!   `max_non_target_ratio` of the characters outside the target script.
//!
//! Recognition runs page by page against a per-document deadline that covers
//! rasterisation as well as recognition. When the deadline passes, the pages
//! recognised so far are kept. A page is rendered only when its turn comes, so
//! at most one page image per document is alive, and it is dropped on every
//! return path.
//!
//! The only error is [`DocumentError`]: the payload could not be opened.

use crate::config::{OcrMode, PipelineConfig};
use crate::error::DocumentError;
use crate::pipeline::input::RawDocument;
use crate::pipeline::ocr::Recognizer;
use crate::pipeline::render::DocumentBackend;
use crate::record::TextSource;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CID_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(cid:\d+\)").unwrap());

/// Text obtained for one document, with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredText {
    /// Page texts joined with newlines; not yet normalised.
    pub text: String,
    pub source: TextSource,
    /// Why recognition was attempted, if it was.
    pub ocr_reason: Option<String>,
    pub ocr_timed_out: bool,
    pub page_count: usize,
}

impl AcquiredText {
    /// True when the returned text came from optical recognition.
    pub fn used_ocr(&self) -> bool {
        self.source == TextSource::Recognition
    }
}

/// Quality assessment of a text layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerVerdict {
    Usable,
    Empty,
    TooShort { chars: usize },
    Corrupted { reason: String },
}

impl LayerVerdict {
    pub fn needs_ocr(&self) -> bool {
        !matches!(self, LayerVerdict::Usable)
    }

    /// Human-readable reason, recorded in provenance.
    pub fn describe(&self) -> String {
        match self {
            LayerVerdict::Usable => "usable".to_string(),
            LayerVerdict::Empty => "text layer is empty".to_string(),
            LayerVerdict::TooShort { chars } => {
                format!("text layer too short ({chars} characters)")
            }
            LayerVerdict::Corrupted { reason } => format!("text layer corrupted: {reason}"),
        }
    }
}

/// Decide whether a text layer can be used as-is.
pub fn assess_text_layer(text: &str, config: &PipelineConfig) -> LayerVerdict {
    let mut total = 0usize;
    let mut foreign = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if !config.is_target_char(c) {
            foreign += 1;
        }
    }

    if total == 0 {
        return LayerVerdict::Empty;
    }

    let markers = CID_MARKER.find_iter(text).count();
    if markers > 0 {
        return LayerVerdict::Corrupted {
            reason: format!("{markers} font-substitution markers"),
        };
    }

    let ratio = foreign as f32 / total as f32;
    if ratio > config.max_non_target_ratio {
        return LayerVerdict::Corrupted {
            reason: format!(
                "{:.0}% of characters outside the target script",
                ratio * 100.0
            ),
        };
    }

    if total < config.min_text_chars {
        return LayerVerdict::TooShort { chars: total };
    }

    LayerVerdict::Usable
}

/// Acquire text for one document.
///
/// `recognizer` is `None` when no recognition engine is available; documents
/// that need recognition then keep their (possibly empty) text layer.
pub async fn acquire_text(
    doc: &RawDocument,
    backend: Arc<dyn DocumentBackend>,
    recognizer: Option<&Arc<dyn Recognizer>>,
    config: &PipelineConfig,
) -> Result<AcquiredText, DocumentError> {
    doc.check_magic()?;

    let pages = {
        let backend = Arc::clone(&backend);
        let owned = doc.clone();
        blocking(&doc.id, move || backend.text_layer(&owned)).await?
    };
    let page_count = pages.len();
    let layer = pages.join("\n");
    let verdict = assess_text_layer(&layer, config);

    let ocr_reason = match config.ocr_mode {
        OcrMode::Never => None,
        OcrMode::Always => Some("recognition forced".to_string()),
        OcrMode::Auto if verdict.needs_ocr() => Some(verdict.describe()),
        OcrMode::Auto => None,
    };

    let Some(reason) = ocr_reason else {
        debug!("{}: using text layer ({})", doc.id, verdict.describe());
        return Ok(layer_only(layer, None, page_count));
    };

    let Some(recognizer) = recognizer else {
        warn!(
            "{}: {}, but no recognizer is available; keeping the text layer",
            doc.id, reason
        );
        return Ok(layer_only(layer, Some(reason), page_count));
    };

    info!("{}: {} → recognising with {}", doc.id, reason, recognizer.name());

    let budget = Duration::from_secs(config.ocr_timeout_secs);
    let (recognised, timed_out) =
        recognize_pages(doc, backend, page_count, recognizer, config, budget).await;

    let (text, source) = if !recognised.trim().is_empty() {
        (recognised, TextSource::Recognition)
    } else if !layer.trim().is_empty() {
        warn!("{}: recognition produced no text; keeping the text layer", doc.id);
        (layer, TextSource::TextLayerAfterFailedRecognition)
    } else {
        warn!("{}: no text from either path", doc.id);
        (String::new(), TextSource::Empty)
    };

    Ok(AcquiredText {
        text,
        source,
        ocr_reason: Some(reason),
        ocr_timed_out: timed_out,
        page_count,
    })
}

fn layer_only(layer: String, ocr_reason: Option<String>, page_count: usize) -> AcquiredText {
    let source = if layer.trim().is_empty() {
        TextSource::Empty
    } else {
        TextSource::TextLayer
    };
    AcquiredText {
        text: layer,
        source,
        ocr_reason,
        ocr_timed_out: false,
        page_count,
    }
}

/// Render and recognise pages in order until done or until `budget` is spent.
///
/// Rendering counts against the budget, and only one page image is alive at
/// a time: each is dropped before the next page is rasterised. Pages that fail
/// to render or to recognise contribute nothing.
async fn recognize_pages(
    doc: &RawDocument,
    backend: Arc<dyn DocumentBackend>,
    page_count: usize,
    recognizer: &Arc<dyn Recognizer>,
    config: &PipelineConfig,
    budget: Duration,
) -> (String, bool) {
    let deadline = Instant::now() + budget;
    let (dpi, max_px) = (config.dpi, config.max_rendered_pixels);
    let mut texts = Vec::with_capacity(page_count);
    let mut timed_out = false;

    for idx in 0..page_count {
        let page_num = idx + 1;
        let page = async {
            let image = {
                let backend = Arc::clone(&backend);
                let owned = doc.clone();
                blocking(&doc.id, move || backend.render_page(&owned, idx, dpi, max_px))
                    .await
                    .map_err(|e| e.to_string())?
            };
            let text = recognizer
                .recognize(page_num, &image)
                .await
                .map_err(|e| e.to_string());
            drop(image);
            text
        };
        match tokio::time::timeout_at(deadline, page).await {
            Ok(Ok(text)) => {
                debug!("{}: page {}/{} → {} chars", doc.id, page_num, page_count, text.len());
                texts.push(text);
            }
            Ok(Err(e)) => warn!("{}: page {}: {}", doc.id, page_num, e),
            Err(_) => {
                warn!(
                    "{}: recognition budget of {:?} exhausted after {}/{} pages",
                    doc.id, budget, idx, page_count
                );
                timed_out = true;
                break;
            }
        }
    }

    (texts.join("\n"), timed_out)
}

async fn blocking<T, F>(id: &str, f: F) -> Result<T, DocumentError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DocumentError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DocumentError::Internal {
            id: id.to_string(),
            detail: format!("document task panicked: {e}"),
        })?
}
