//! Serialisation of a batch to delimited text and JSON.
//!
//! Column order and names come from [`ExtractedRecord::headers`] and each
//! table's [`TableRow::HEADERS`]; downstream consumers bind to them by
//! position. Every file is written to a temporary file in the target
//! directory and renamed into place, so a crash never leaves a half-written
//! table behind.

use crate::batch::BatchOutput;
use crate::error::ContractError;
use crate::model::{BuyerRow, FactRow, ProductRow, SellerRow, TableRow};
use crate::record::ExtractedRecord;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RECORDS_TABLE: &str = "Records";
pub const RECORDS_JSON: &str = "records.json";
pub const FAILURES_JSON: &str = "failures.json";

/// Render a header row plus data rows as CSV.
pub fn render_csv<I>(table: &str, headers: &[&str], rows: I) -> Result<Vec<u8>, ContractError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let fail = |e: csv::Error| ContractError::SerializationFailed {
        table: table.to_string(),
        detail: e.to_string(),
    };
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(headers).map_err(fail)?;
    for row in rows {
        wtr.write_record(&row).map_err(fail)?;
    }
    wtr.into_inner()
        .map_err(|e| ContractError::SerializationFailed {
            table: table.to_string(),
            detail: e.to_string(),
        })
}

/// CSV for one star-schema table.
pub fn table_csv<R: TableRow>(rows: &[R]) -> Result<Vec<u8>, ContractError> {
    render_csv(R::TABLE, R::HEADERS, rows.iter().map(R::cells))
}

/// CSV for the records table: canonical fields then the source column.
pub fn records_csv(records: &[ExtractedRecord]) -> Result<Vec<u8>, ContractError> {
    render_csv(
        RECORDS_TABLE,
        &ExtractedRecord::headers(),
        records.iter().map(ExtractedRecord::to_row),
    )
}

/// Write `bytes` to `path` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ContractError> {
    let write_failed = |source: std::io::Error| ContractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_failed)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.flush().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn json_bytes<T: Serialize + ?Sized>(table: &str, value: &T) -> Result<Vec<u8>, ContractError> {
    serde_json::to_vec_pretty(value).map_err(|e| ContractError::SerializationFailed {
        table: table.to_string(),
        detail: e.to_string(),
    })
}

/// Write every output of a batch into `dir`, returning the written paths.
///
/// Files: `Records.csv`, `records.json`, `Dim_Buyer.csv`, `Dim_Seller.csv`,
/// `Dim_Product.csv`, `Fact_Contract_Sales.csv`, and `failures.json`.
pub fn write_batch(dir: &Path, output: &BatchOutput) -> Result<Vec<PathBuf>, ContractError> {
    let files: Vec<(String, Vec<u8>)> = vec![
        (format!("{RECORDS_TABLE}.csv"), records_csv(&output.records)?),
        (RECORDS_JSON.to_string(), json_bytes(RECORDS_TABLE, &output.records)?),
        (format!("{}.csv", BuyerRow::TABLE), table_csv(&output.model.buyers)?),
        (format!("{}.csv", SellerRow::TABLE), table_csv(&output.model.sellers)?),
        (format!("{}.csv", ProductRow::TABLE), table_csv(&output.model.products)?),
        (format!("{}.csv", FactRow::TABLE), table_csv(&output.model.facts)?),
        (FAILURES_JSON.to_string(), json_bytes("failures", &output.failures)?),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let path = dir.join(name);
        write_atomic(&path, &bytes)?;
        written.push(path);
    }
    info!("Wrote {} files to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DimensionalModel;
    use crate::record::Provenance;

    fn record(source: &str, total: f64) -> ExtractedRecord {
        let mut r = ExtractedRecord::empty(
            "NA",
            Provenance {
                source_id: source.into(),
                ..Default::default()
            },
        );
        r.total_order_value = total;
        r.seller_name = "Medico, Traders".into();
        r
    }

    #[test]
    fn records_csv_has_fixed_header_and_quotes_commas() {
        let csv = String::from_utf8(records_csv(&[record("a.pdf", 9920.0)]).unwrap()).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Contract No,Contract Date,Year,"));
        assert!(header.ends_with("Total Order Value,Source File"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Medico, Traders\""));
        assert!(row.ends_with(",9920,a.pdf"));
    }

    #[test]
    fn fact_table_header() {
        let model = DimensionalModel::build(&[record("a.pdf", 1.0)], "NA");
        let csv = String::from_utf8(table_csv(&model.facts).unwrap()).unwrap();
        assert_eq!(
            csv.lines().next().unwrap(),
            "Contract_No,Contract_Date,Buyer_Key,Seller_Key,Product_Key,Quantity,Unit_Price,Total_Order_Value"
        );
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn empty_table_still_has_header() {
        let csv = String::from_utf8(table_csv::<BuyerRow>(&[]).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("Buyer_Key,"));
    }

    #[test]
    fn write_batch_creates_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("a.pdf", 5.0), record("b.pdf", 7.0)];
        let model = DimensionalModel::build(&records, "NA");
        let output = BatchOutput {
            records,
            failures: vec![crate::error::DocumentError::NotAPdf {
                id: "c.txt".into(),
                magic: b"Hell".to_vec(),
            }],
            model,
            stats: Default::default(),
        };
        let written = write_batch(dir.path(), &output).unwrap();
        assert_eq!(written.len(), 7);
        for path in &written {
            assert!(path.exists(), "{} missing", path.display());
        }
        let failures = std::fs::read_to_string(dir.path().join(FAILURES_JSON)).unwrap();
        assert!(failures.contains("c.txt"));
        let facts = std::fs::read_to_string(dir.path().join("Fact_Contract_Sales.csv")).unwrap();
        assert_eq!(facts.lines().count(), 3);
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}
