//! Streaming extraction API: emit records as documents complete.
//!
//! A large batch with recognition fallbacks can take minutes. The stream lets
//! callers show partial results, write records incrementally, or stop early
//! without waiting for [`crate::batch::extract_batch`].
//!
//! Records arrive in completion order, not input order. The star schema needs
//! the whole batch, so it is not built here: collect the records and call
//! [`crate::model::DimensionalModel::build`] once the stream ends.

use crate::batch::Extractor;
use crate::config::PipelineConfig;
use crate::error::{ContractError, DocumentError};
use crate::pipeline::input::RawDocument;
use crate::record::ExtractedRecord;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document outcomes.
pub type RecordStream =
    Pin<Box<dyn Stream<Item = Result<ExtractedRecord, DocumentError>> + Send>>;

/// Extract records from `docs`, yielding each as soon as it is ready.
///
/// # Returns
/// - `Ok(RecordStream)`: one item per document, `Err` for unreadable ones
/// - `Err(ContractError)`: the run could not start (configuration, pdfium)
///
/// # Example
/// ```rust,no_run
/// use edgequake_contracts::{extract_stream, PipelineConfig, RawDocument};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let docs = vec![RawDocument::new("a.pdf", std::fs::read("a.pdf")?)];
/// let mut records = extract_stream(docs, &PipelineConfig::default())?;
/// while let Some(item) = records.next().await {
///     match item {
///         Ok(r) => println!("{}: {}", r.provenance.source_id, r.contract_no),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn extract_stream(
    docs: Vec<RawDocument>,
    config: &PipelineConfig,
) -> Result<RecordStream, ContractError> {
    let extractor = Arc::new(Extractor::new(config)?);
    Ok(stream_with(extractor, docs))
}

/// Stream through an already-constructed [`Extractor`].
pub fn stream_with(extractor: Arc<Extractor>, docs: Vec<RawDocument>) -> RecordStream {
    info!("Starting streaming extraction: {} documents", docs.len());
    let concurrency = extractor.config().concurrency;
    let s = stream::iter(docs.into_iter().map(move |doc| {
        let extractor = Arc::clone(&extractor);
        async move { extractor.extract_reported(&doc).await }
    }))
    .buffer_unordered(concurrency);
    Box::pin(s)
}
