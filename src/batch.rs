//! Eager (whole-batch) extraction entry points.
//!
//! Documents are processed concurrently (`config.concurrency` at a time) with
//! no shared mutable state between them. Only after every document has
//! finished does the star-schema reduction run, sequentially, over the
//! collected records. Use [`crate::stream::extract_stream`] instead to receive
//! records as they complete.

use crate::config::{OcrMode, PipelineConfig};
use crate::error::{ContractError, DocumentError};
use crate::model::DimensionalModel;
use crate::pipeline::acquire::{acquire_text, AcquiredText};
use crate::pipeline::assemble::assemble_record;
use crate::pipeline::fields::FieldCatalog;
use crate::pipeline::input::{self, RawDocument};
use crate::pipeline::normalize::Normalizer;
use crate::pipeline::ocr::{resolve_recognizer, Recognizer};
use crate::pipeline::render::{DocumentBackend, PdfiumBackend};
use crate::record::{ExtractedRecord, Provenance, TextSource};
use crate::vocabulary::Vocabulary;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a batch run.
///
/// A batch succeeds even when some documents fail: those are listed in
/// `failures` and have no record, no fact row, and no dimension rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    /// One record per readable document, sorted by source identifier.
    pub records: Vec<ExtractedRecord>,
    /// Documents that could not be opened, with the reason.
    pub failures: Vec<DocumentError>,
    /// Star-schema tables derived from `records`.
    pub model: DimensionalModel,
    pub stats: BatchStats,
}

/// Counters for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_documents: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Documents whose text came from optical recognition.
    pub recognized: usize,
    /// Documents whose recognition ran out of time.
    pub timed_out: usize,
    pub total_duration_ms: u64,
}

/// Everything a run needs, compiled once and shared by every document.
pub struct Extractor {
    config: PipelineConfig,
    backend: Arc<dyn DocumentBackend>,
    recognizer: Option<Arc<dyn Recognizer>>,
    normalizer: Normalizer,
    catalog: FieldCatalog,
}

impl Extractor {
    /// Bind pdfium and set up the configured recognizer.
    ///
    /// A recognizer that cannot be constructed (no API key, feature not
    /// compiled) is logged and skipped: documents then keep their text layer.
    pub fn new(config: &PipelineConfig) -> Result<Self, ContractError> {
        let backend: Arc<dyn DocumentBackend> =
            Arc::new(PdfiumBackend::new(config.pdfium_library.clone())?);
        let recognizer = match config.ocr_mode {
            OcrMode::Never => None,
            OcrMode::Auto | OcrMode::Always => match resolve_recognizer(config) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("Optical recognition disabled: {}", e);
                    None
                }
            },
        };
        Self::with_backends(config, backend, recognizer)
    }

    /// Use caller-supplied document and recognition backends.
    pub fn with_backends(
        config: &PipelineConfig,
        backend: Arc<dyn DocumentBackend>,
        recognizer: Option<Arc<dyn Recognizer>>,
    ) -> Result<Self, ContractError> {
        Ok(Self {
            config: config.clone(),
            backend,
            recognizer,
            normalizer: Normalizer::new(config)?,
            catalog: FieldCatalog::new(config)?,
        })
    }

    /// Stand-alone text processing for callers that already hold the text.
    pub fn text_only(config: &PipelineConfig) -> Result<TextExtractor, ContractError> {
        Ok(TextExtractor {
            sentinel: config.sentinel.clone(),
            vocabulary: Arc::clone(&config.vocabulary),
            normalizer: Normalizer::new(config)?,
            catalog: FieldCatalog::new(config)?,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Acquire, normalise, and extract one document.
    pub async fn extract_document(
        &self,
        doc: &RawDocument,
    ) -> Result<ExtractedRecord, DocumentError> {
        let acquired = acquire_text(
            doc,
            Arc::clone(&self.backend),
            self.recognizer.as_ref(),
            &self.config,
        )
        .await?;
        Ok(self.record_from_acquired(&doc.id, acquired))
    }

    fn record_from_acquired(&self, id: &str, acquired: AcquiredText) -> ExtractedRecord {
        let normalized = self.normalizer.normalize(&acquired.text);
        let matches = self.catalog.extract(&normalized);
        let provenance = Provenance {
            source_id: id.to_string(),
            text_source: acquired.source,
            ocr_reason: acquired.ocr_reason,
            ocr_timed_out: acquired.ocr_timed_out,
            page_count: acquired.page_count,
            normalized_chars: normalized.chars().count(),
        };
        assemble_record(
            &matches,
            provenance,
            &self.config.sentinel,
            &self.config.vocabulary,
        )
    }

    /// [`Extractor::extract_document`] with progress events.
    pub(crate) async fn extract_reported(
        &self,
        doc: &RawDocument,
    ) -> Result<ExtractedRecord, DocumentError> {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_document_start(&doc.id);
        }
        let result = self.extract_document(doc).await;
        match (&result, cb) {
            (Ok(record), Some(cb)) => cb.on_document_complete(
                &doc.id,
                record.provenance.text_source == TextSource::Recognition,
            ),
            (Err(e), Some(cb)) => cb.on_document_error(&doc.id, &e.to_string()),
            _ => {}
        }
        if let Err(ref e) = result {
            warn!("{}", e);
        }
        result
    }

    /// Process every document, then build the star schema.
    pub async fn extract_batch(&self, docs: &[RawDocument]) -> BatchOutput {
        let start = Instant::now();
        let total = docs.len();
        info!(
            "Starting batch: {} documents, concurrency {}",
            total, self.config.concurrency
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let results: Vec<Result<ExtractedRecord, DocumentError>> =
            stream::iter(docs.iter().map(|doc| self.extract_reported(doc)))
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await;

        let mut records = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(e) => failures.push(e),
            }
        }
        records.sort_by(|a, b| a.provenance.source_id.cmp(&b.provenance.source_id));
        failures.sort_by(|a, b| a.document_id().cmp(b.document_id()));

        // Sequential reduction, after every document is done.
        let model = DimensionalModel::build(&records, &self.config.sentinel);

        let stats = BatchStats {
            total_documents: total,
            succeeded: records.len(),
            failed: failures.len(),
            recognized: records
                .iter()
                .filter(|r| r.provenance.text_source == TextSource::Recognition)
                .count(),
            timed_out: records.iter().filter(|r| r.provenance.ocr_timed_out).count(),
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Batch complete: {}/{} documents, {} via recognition, {}ms",
            stats.succeeded, stats.total_documents, stats.recognized, stats.total_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, stats.succeeded);
        }

        BatchOutput {
            records,
            failures,
            model,
            stats,
        }
    }
}

/// Normaliser and field catalog without any document backend.
pub struct TextExtractor {
    sentinel: String,
    vocabulary: Arc<Vocabulary>,
    normalizer: Normalizer,
    catalog: FieldCatalog,
}

impl TextExtractor {
    /// Run normalisation, zoning, field extraction, and assembly on `text`.
    pub fn extract(&self, text: &str, source_id: &str) -> ExtractedRecord {
        let normalized = self.normalizer.normalize(text);
        let matches = self.catalog.extract(&normalized);
        debug!("{}: {} fields matched", source_id, matches.len());
        let provenance = Provenance {
            source_id: source_id.to_string(),
            text_source: if normalized.is_empty() {
                TextSource::Empty
            } else {
                TextSource::TextLayer
            },
            normalized_chars: normalized.chars().count(),
            ..Default::default()
        };
        assemble_record(&matches, provenance, &self.sentinel, &self.vocabulary)
    }
}

/// Extract records from in-memory payloads and build the star schema.
///
/// # Errors
/// Only run-level failures: invalid configuration or pdfium not loadable.
/// Unreadable documents are reported in [`BatchOutput::failures`].
///
/// # Example
/// ```rust,no_run
/// use edgequake_contracts::{extract_batch, PipelineConfig, RawDocument};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("contract.pdf")?;
/// let docs = vec![RawDocument::new("contract.pdf", bytes)];
/// let output = extract_batch(&docs, &PipelineConfig::default()).await?;
/// println!("{} fact rows", output.model.facts.len());
/// # Ok(())
/// # }
/// ```
pub async fn extract_batch(
    docs: &[RawDocument],
    config: &PipelineConfig,
) -> Result<BatchOutput, ContractError> {
    let extractor = Extractor::new(config)?;
    Ok(extractor.extract_batch(docs).await)
}

/// Load files and directories of PDFs, then run [`extract_batch`].
pub async fn extract_paths(
    paths: &[PathBuf],
    config: &PipelineConfig,
) -> Result<BatchOutput, ContractError> {
    let files = input::collect_inputs(paths)?;
    let docs = input::load_documents(&files).await?;
    extract_batch(&docs, config).await
}

/// Synchronous wrapper around [`extract_paths`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_paths_sync(
    paths: &[PathBuf],
    config: &PipelineConfig,
) -> Result<BatchOutput, ContractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ContractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_paths(paths, config))
}

/// Extract one record from already-acquired text.
///
/// Needs neither pdfium nor a recognizer.
pub fn extract_record_from_text(
    text: &str,
    source_id: &str,
    config: &PipelineConfig,
) -> Result<ExtractedRecord, ContractError> {
    Ok(Extractor::text_only(config)?.extract(text, source_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_entry_point_fills_sentinels() {
        let rec =
            extract_record_from_text("nothing to see", "x.pdf", &PipelineConfig::default())
                .unwrap();
        assert_eq!(rec.contract_no, "NA");
        assert_eq!(rec.total_order_value, 0.0);
        assert_eq!(rec.provenance.source_id, "x.pdf");
        assert_eq!(rec.provenance.text_source, TextSource::TextLayer);
    }

    #[test]
    fn empty_text_is_marked_empty() {
        let rec = extract_record_from_text("", "blank.pdf", &PipelineConfig::default()).unwrap();
        assert_eq!(rec.provenance.text_source, TextSource::Empty);
        assert_eq!(rec.provenance.normalized_chars, 0);
    }

    #[test]
    fn custom_sentinel_is_used() {
        let config = PipelineConfig::builder().sentinel("-").build().unwrap();
        let rec = extract_record_from_text("nothing", "x.pdf", &config).unwrap();
        assert_eq!(rec.seller_gstin, "-");
    }
}
