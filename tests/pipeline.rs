//! Integration tests for the contract pipeline.
//!
//! No pdfium library and no LLM credentials are needed: text-only entry
//! points run the normaliser and field catalog directly, and the batch tests
//! plug fake document and recognition backends into an `Extractor`.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use edgequake_contracts::error::RecognitionError;
use edgequake_contracts::pipeline::ocr::Recognizer;
use edgequake_contracts::pipeline::render::DocumentBackend;
use edgequake_contracts::{
    extract_record_from_text, DimensionalModel, DocumentError, ExtractedRecord, Extractor,
    PipelineConfig, RawDocument, TextSource,
};
use image::{DynamicImage, GrayImage, Luma};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn contract_text(contract_no: &str, seller_email: &str, total: &str) -> String {
    format!(
        "Contract\n\
         Contract No: {contract_no}\n\
         Generated Date : 12-Jan-2024\n\
         Organisation Details\n\
         Organisation Name : District Hospital Sultanpur\n\
         Buyer Details\n\
         Designation : Chief Medical Superintendent\n\
         Contact No. : 05362-240213\n\
         Email ID : cms-sul@up.gov.in\n\
         State : Uttar Pradesh\n\
         Seller Details\n\
         Company Name : Medico Traders\n\
         Email ID : {seller_email}\n\
         GSTIN : 09ABCDE1234F1Z5\n\
         Product Details\n\
         Product Name : Malaria Antigen Test Kit\n\
         Brand : Acme Diagnostics\n\
         Ordered Quantity : 400\n\
         Unit : Tests\n\
         Unit Price (INR) : 24.8\n\
         Total Order Value (in INR) {total}\n\
         Consignee Detail\n"
    )
}

fn records_for(texts: &[(&str, String)]) -> Vec<ExtractedRecord> {
    let config = PipelineConfig::default();
    texts
        .iter()
        .map(|(id, text)| extract_record_from_text(text, id, &config).unwrap())
        .collect()
}

/// Routes pipeline logs through the test harness; `RUST_LOG` overrides the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn pdf(id: &str) -> RawDocument {
    RawDocument::new(id, b"%PDF-1.7\n...".to_vec())
}

/// Serves canned page texts per document id; every page renders as a blank tile.
struct FakeBackend {
    layers: HashMap<String, Vec<String>>,
}

impl DocumentBackend for FakeBackend {
    fn text_layer(&self, doc: &RawDocument) -> Result<Vec<String>, DocumentError> {
        self.layers
            .get(&doc.id)
            .cloned()
            .ok_or_else(|| DocumentError::Unreadable {
                id: doc.id.clone(),
                detail: "unknown fixture".into(),
            })
    }

    fn render_page(
        &self,
        doc: &RawDocument,
        _page_index: usize,
        _dpi: u32,
        _max_pixels: u32,
    ) -> Result<DynamicImage, DocumentError> {
        self.text_layer(doc)?;
        Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([255]))))
    }
}

struct ScriptedRecognizer {
    text: String,
    calls: AtomicUsize,
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(
        &self,
        _page_num: usize,
        _image: &DynamicImage,
    ) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

// ── Text-only extraction ─────────────────────────────────────────────────────

#[test]
fn test_organisation_and_department_without_colons() {
    let text = "Contract No: GEMC-511687781234567\n\
                Organisation Details\n\
                Organisation Name\n\
                District Hospital Sultanpur\n\
                Department\n\
                Health & Family Welfare Department Uttar Pradesh\n\
                Buyer Details\n";
    let rec = extract_record_from_text(text, "org.pdf", &PipelineConfig::default()).unwrap();
    assert_eq!(rec.organisation_name, "District Hospital Sultanpur");
    assert_eq!(rec.department, "Health & Family Welfare Department");
}

#[test]
fn test_missing_total_becomes_zero() {
    let text = "Contract No: GEMC-1234567\nProduct Details\nProduct Name : Gloves\n";
    let rec = extract_record_from_text(text, "nt.pdf", &PipelineConfig::default()).unwrap();
    assert_eq!(rec.total_order_value, 0.0);
    assert_eq!(rec.quantity, 0.0);
    assert_eq!(rec.seller_email, "NA");
}

#[test]
fn test_typical_contract_measures() {
    let rec = extract_record_from_text(
        &contract_text("GEMC-511687781234567", "sales@medico.in", "9,920"),
        "c1.pdf",
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(rec.contract_no, "GEMC-511687781234567");
    assert_eq!(rec.year, "2024");
    assert_eq!(rec.quantity, 400.0);
    assert_eq!(rec.unit_price, 24.8);
    assert_eq!(rec.total_order_value, 9920.0);
    assert_eq!(rec.seller_gstin, "09ABCDE1234F1Z5");
}

#[test]
fn test_measures_on_the_line_after_their_labels() {
    let text = "Contract No: GEMC-511687781234567\n\
                Product Details\n\
                Product Name : Malaria Antigen Test Kit\n\
                Ordered Quantity\n\
                400\n\
                Unit Price (INR)\n\
                24.8\n\
                Total Order Value (in INR)\n\
                9,920\n\
                Consignee Detail\n";
    let rec = extract_record_from_text(text, "nl.pdf", &PipelineConfig::default()).unwrap();
    assert_eq!(rec.quantity, 400.0);
    assert_eq!(rec.unit_price, 24.8);
    assert_eq!(rec.total_order_value, 9920.0);
}

// ── Star schema ──────────────────────────────────────────────────────────────

#[test]
fn test_same_seller_email_shares_one_dimension_row() {
    let records = records_for(&[
        ("a.pdf", contract_text("GEMC-1000001", "a@x.com", "100")),
        ("b.pdf", contract_text("GEMC-1000002", "a@x.com", "200")),
    ]);
    let model = DimensionalModel::build(&records, "NA");

    assert_eq!(model.sellers.len(), 1);
    assert_eq!(model.facts.len(), 2);
    assert_eq!(model.facts[0].seller_key, model.facts[1].seller_key);
    assert_eq!(model.facts[0].seller_key, model.sellers[0].seller_key);
    assert!(model.sellers[0].seller_key.starts_with("S_"));
}

#[test]
fn test_keys_are_stable_across_runs_and_batches() {
    let first = records_for(&[("a.pdf", contract_text("GEMC-1000001", "a@x.com", "100"))]);
    let second = records_for(&[
        ("z.pdf", contract_text("GEMC-1000009", "other@y.com", "50")),
        ("a.pdf", contract_text("GEMC-1000001", "a@x.com", "100")),
    ]);
    let m1 = DimensionalModel::build(&first, "NA");
    let m2 = DimensionalModel::build(&second, "NA");

    let fact = |m: &DimensionalModel| {
        m.facts
            .iter()
            .find(|f| f.contract_no == "GEMC-1000001")
            .cloned()
            .unwrap()
    };
    assert_eq!(fact(&m1).buyer_key, fact(&m2).buyer_key);
    assert_eq!(fact(&m1).seller_key, fact(&m2).seller_key);
    assert_eq!(fact(&m1).product_key, fact(&m2).product_key);
}

#[test]
fn test_one_fact_per_record() {
    let records = records_for(&[
        ("a.pdf", contract_text("GEMC-1", "a@x.com", "1")),
        ("b.pdf", contract_text("GEMC-2", "b@x.com", "2")),
        ("c.pdf", contract_text("GEMC-3", "c@x.com", "3")),
    ]);
    let model = DimensionalModel::build(&records, "NA");
    assert_eq!(model.facts.len(), records.len());
    assert_eq!(model.sellers.len(), 3);
    assert_eq!(model.buyers.len(), 1);
    assert_eq!(model.products.len(), 1);
}

// ── Batch with fake backends ─────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_routes_failures_and_skips_ocr_for_good_layers() {
    init_tracing();
    let good = contract_text("GEMC-2000001", "a@x.com", "9,920");
    let mut layers = HashMap::new();
    layers.insert("good.pdf".to_string(), vec![good.clone()]);
    layers.insert("scan.pdf".to_string(), vec![String::new()]);

    let recognizer = Arc::new(ScriptedRecognizer {
        text: contract_text("GEMC-2000002", "a@x.com", "100"),
        calls: AtomicUsize::new(0),
    });
    let config = PipelineConfig::builder().concurrency(2).build().unwrap();
    let extractor = Extractor::with_backends(
        &config,
        Arc::new(FakeBackend { layers }),
        Some(recognizer.clone() as Arc<dyn Recognizer>),
    )
    .unwrap();

    let docs = vec![
        pdf("scan.pdf"),
        RawDocument::new("notes.txt", b"Hello, not a PDF".to_vec()),
        pdf("good.pdf"),
    ];
    let output = extractor.extract_batch(&docs).await;

    assert_eq!(output.stats.total_documents, 3);
    assert_eq!(output.stats.succeeded, 2);
    assert_eq!(output.failures.len(), 1);
    assert!(matches!(
        &output.failures[0],
        DocumentError::NotAPdf { id, .. } if id == "notes.txt"
    ));

    // Sorted by source id.
    assert_eq!(output.records[0].provenance.source_id, "good.pdf");
    assert_eq!(output.records[1].provenance.source_id, "scan.pdf");

    assert_eq!(output.records[0].provenance.text_source, TextSource::TextLayer);
    assert_eq!(output.records[1].provenance.text_source, TextSource::Recognition);
    assert_eq!(output.records[1].contract_no, "GEMC-2000002");
    // Only the scanned page went to the recognizer.
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(output.stats.recognized, 1);

    // Failed documents contribute no fact rows.
    assert_eq!(output.model.facts.len(), 2);
    assert_eq!(output.model.sellers.len(), 1);
}

#[tokio::test]
async fn test_batch_without_recognizer_keeps_empty_layer() {
    init_tracing();
    let mut layers = HashMap::new();
    layers.insert("scan.pdf".to_string(), vec!["   ".to_string()]);
    let extractor = Extractor::with_backends(
        &PipelineConfig::default(),
        Arc::new(FakeBackend { layers }),
        None,
    )
    .unwrap();

    let output = extractor.extract_batch(&[pdf("scan.pdf")]).await;
    assert_eq!(output.records.len(), 1);
    let rec = &output.records[0];
    assert_eq!(rec.provenance.text_source, TextSource::Empty);
    assert_eq!(rec.contract_no, "NA");
    assert_eq!(rec.total_order_value, 0.0);
    assert_eq!(output.model.facts.len(), 1);
}

#[test]
fn test_extractor_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Extractor>();
}
