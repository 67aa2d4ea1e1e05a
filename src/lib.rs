//! # edgequake-contracts
//!
//! Turn procurement-contract PDFs into normalised records and a star schema.
//!
//! ## Why this crate?
//!
//! Government e-marketplace contracts look alike but are not alike: some
//! have a clean text layer, some are scans, some carry font-substitution
//! garbage (`(cid:123)`) or every digit printed twice. Labels drift between
//! variants (`Contact No.`, `Mobile`, `Phone`). This crate reads each
//! document as best it can, extracts a fixed set of fields through ordered
//! fallback chains, and reduces a batch into deduplicated buyer, seller and
//! product dimensions plus one fact row per contract.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Acquire    text layer via pdfium; OCR fallback when empty/short/corrupted
//!  ├─ 2. Normalise  strip artifacts and boilerplate, canonical lines
//!  ├─ 3. Sections   organisation / buyer / seller / product zones
//!  ├─ 4. Fields     strategy chains + validation + doubled-digit repair
//!  ├─ 5. Assemble   one ExtractedRecord, sentinel for absent values
//!  └─ 6. Model      Dim_Buyer, Dim_Seller, Dim_Product, Fact_Contract_Sales
//! ```
//!
//! Steps 1–5 run per document, concurrently. Step 6 runs once, after the
//! whole batch is in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_contracts::{extract_paths, PipelineConfig};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let output = extract_paths(&[PathBuf::from("contracts/")], &config).await?;
//!     eprintln!(
//!         "{} records, {} failed, {} sellers",
//!         output.records.len(),
//!         output.failures.len(),
//!         output.model.sellers.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Already have the text? Skip pdfium entirely:
//!
//! ```rust
//! use edgequake_contracts::{extract_record_from_text, PipelineConfig};
//!
//! let text = "Contract No: GEMC-511687781234567\nTotal Order Value (in INR) 9,920";
//! let record = extract_record_from_text(text, "c1.pdf", &PipelineConfig::default()).unwrap();
//! assert_eq!(record.contract_no, "GEMC-511687781234567");
//! assert_eq!(record.total_order_value, 9920.0);
//! assert_eq!(record.seller_gstin, "NA");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `contract2tables` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `tesseract` | off     | Local Tesseract recognizer via `leptess` as an alternative to the vision model |
//!
//! ## Optical recognition
//!
//! By default pages without a usable text layer are transcribed by a vision
//! LLM (`gpt-4.1-nano` unless configured otherwise; provider auto-detected
//! from `OPENAI_API_KEY` and friends). With no provider available the
//! pipeline still runs: such documents keep their text layer and yield
//! sentinel values for whatever cannot be read.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod stream;
pub mod vocabulary;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    extract_batch, extract_paths, extract_paths_sync, extract_record_from_text, BatchOutput,
    BatchStats, Extractor,
};
pub use config::{
    OcrMode, PipelineConfig, PipelineConfigBuilder, RecognizerBackend, ScriptRange,
    ZoneDefinition, ZoneSet,
};
pub use error::{ContractError, DocumentError, RecognitionError};
pub use model::{
    BuyerRow, CompositeKey, DimensionalModel, FactRow, ProductRow, SellerRow, TableRow,
};
pub use pipeline::input::RawDocument;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{CanonicalField, ExtractedRecord, Provenance, TextSource};
pub use stream::extract_stream;
pub use vocabulary::Vocabulary;
