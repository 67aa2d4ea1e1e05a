//! The canonical record produced for every document.
//!
//! [`ExtractedRecord`] carries the full canonical field set as named struct
//! fields, so a field can never be "missing": absent text is the sentinel
//! (default `"NA"`), absent numbers are `0.0`. [`CanonicalField`] fixes the
//! column names and their order, which downstream display and export code
//! binds to positionally.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for genuinely absent data.
pub const DEFAULT_SENTINEL: &str = "NA";

/// Header of the provenance column appended to the records table.
pub const SOURCE_COLUMN: &str = "Source File";

/// Every canonical field, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalField {
    ContractNo,
    ContractDate,
    Year,
    OrganisationName,
    Department,
    BuyerName,
    BuyerDesignation,
    BuyerEmail,
    BuyerPhone,
    BuyerAddress,
    BuyerState,
    SellerName,
    SellerShopName,
    SellerEmail,
    SellerPhone,
    SellerAddress,
    SellerGstin,
    SellerState,
    SellerId,
    ProductName,
    ProductCategory,
    Brand,
    Unit,
    Quantity,
    UnitPrice,
    TotalOrderValue,
}

impl CanonicalField {
    /// All fields in column order.
    pub const ALL: [CanonicalField; 26] = [
        CanonicalField::ContractNo,
        CanonicalField::ContractDate,
        CanonicalField::Year,
        CanonicalField::OrganisationName,
        CanonicalField::Department,
        CanonicalField::BuyerName,
        CanonicalField::BuyerDesignation,
        CanonicalField::BuyerEmail,
        CanonicalField::BuyerPhone,
        CanonicalField::BuyerAddress,
        CanonicalField::BuyerState,
        CanonicalField::SellerName,
        CanonicalField::SellerShopName,
        CanonicalField::SellerEmail,
        CanonicalField::SellerPhone,
        CanonicalField::SellerAddress,
        CanonicalField::SellerGstin,
        CanonicalField::SellerState,
        CanonicalField::SellerId,
        CanonicalField::ProductName,
        CanonicalField::ProductCategory,
        CanonicalField::Brand,
        CanonicalField::Unit,
        CanonicalField::Quantity,
        CanonicalField::UnitPrice,
        CanonicalField::TotalOrderValue,
    ];

    /// Column header for this field.
    pub fn label(self) -> &'static str {
        match self {
            CanonicalField::ContractNo => "Contract No",
            CanonicalField::ContractDate => "Contract Date",
            CanonicalField::Year => "Year",
            CanonicalField::OrganisationName => "Organisation Name",
            CanonicalField::Department => "Department",
            CanonicalField::BuyerName => "Buyer Name",
            CanonicalField::BuyerDesignation => "Buyer Designation",
            CanonicalField::BuyerEmail => "Buyer Email",
            CanonicalField::BuyerPhone => "Buyer Phone",
            CanonicalField::BuyerAddress => "Buyer Address",
            CanonicalField::BuyerState => "Buyer State",
            CanonicalField::SellerName => "Seller Name",
            CanonicalField::SellerShopName => "Seller Shop Name",
            CanonicalField::SellerEmail => "Seller Email",
            CanonicalField::SellerPhone => "Seller Phone",
            CanonicalField::SellerAddress => "Seller Address",
            CanonicalField::SellerGstin => "Seller GSTIN",
            CanonicalField::SellerState => "Seller State",
            CanonicalField::SellerId => "Seller ID",
            CanonicalField::ProductName => "Product Name",
            CanonicalField::ProductCategory => "Product Category",
            CanonicalField::Brand => "Brand",
            CanonicalField::Unit => "Unit",
            CanonicalField::Quantity => "Quantity",
            CanonicalField::UnitPrice => "Unit Price",
            CanonicalField::TotalOrderValue => "Total Order Value",
        }
    }

    /// Fields whose value is a number rather than text.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            CanonicalField::Quantity | CanonicalField::UnitPrice | CanonicalField::TotalOrderValue
        )
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Embedded text layer, used as-is.
    #[default]
    TextLayer,
    /// Optical recognition of rendered pages.
    Recognition,
    /// Recognition was attempted but produced nothing; the text layer was kept.
    TextLayerAfterFailedRecognition,
    /// Neither path produced any text.
    Empty,
}

/// Tracing information attached to a record. Never part of any composite key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// Filename or source token supplied with the payload.
    pub source_id: String,
    /// Which acquisition path produced the text.
    pub text_source: TextSource,
    /// Why recognition was attempted, if it was.
    pub ocr_reason: Option<String>,
    /// True when the recognition budget ran out before every page was read.
    pub ocr_timed_out: bool,
    /// Pages in the document.
    pub page_count: usize,
    /// Characters of normalised text the fields were extracted from.
    pub normalized_chars: usize,
}

/// One document's canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub contract_no: String,
    pub contract_date: String,
    pub year: String,
    pub organisation_name: String,
    pub department: String,
    pub buyer_name: String,
    pub buyer_designation: String,
    pub buyer_email: String,
    pub buyer_phone: String,
    pub buyer_address: String,
    pub buyer_state: String,
    pub seller_name: String,
    pub seller_shop_name: String,
    pub seller_email: String,
    pub seller_phone: String,
    pub seller_address: String,
    pub seller_gstin: String,
    pub seller_state: String,
    pub seller_id: String,
    pub product_name: String,
    pub product_category: String,
    pub brand: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_order_value: f64,
    /// Provenance; not a canonical field.
    pub provenance: Provenance,
}

/// A canonical field's value, borrowed from a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", format_number(*n)),
        }
    }
}

/// Render a measure without a spurious `.0` on whole numbers.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl ExtractedRecord {
    /// A record with every text field set to `sentinel` and every measure `0.0`.
    pub fn empty(sentinel: &str, provenance: Provenance) -> Self {
        let s = || sentinel.to_string();
        Self {
            contract_no: s(),
            contract_date: s(),
            year: s(),
            organisation_name: s(),
            department: s(),
            buyer_name: s(),
            buyer_designation: s(),
            buyer_email: s(),
            buyer_phone: s(),
            buyer_address: s(),
            buyer_state: s(),
            seller_name: s(),
            seller_shop_name: s(),
            seller_email: s(),
            seller_phone: s(),
            seller_address: s(),
            seller_gstin: s(),
            seller_state: s(),
            seller_id: s(),
            product_name: s(),
            product_category: s(),
            brand: s(),
            unit: s(),
            quantity: 0.0,
            unit_price: 0.0,
            total_order_value: 0.0,
            provenance,
        }
    }

    /// Read one canonical field.
    pub fn get(&self, field: CanonicalField) -> FieldValue<'_> {
        use CanonicalField as F;
        match field {
            F::ContractNo => FieldValue::Text(&self.contract_no),
            F::ContractDate => FieldValue::Text(&self.contract_date),
            F::Year => FieldValue::Text(&self.year),
            F::OrganisationName => FieldValue::Text(&self.organisation_name),
            F::Department => FieldValue::Text(&self.department),
            F::BuyerName => FieldValue::Text(&self.buyer_name),
            F::BuyerDesignation => FieldValue::Text(&self.buyer_designation),
            F::BuyerEmail => FieldValue::Text(&self.buyer_email),
            F::BuyerPhone => FieldValue::Text(&self.buyer_phone),
            F::BuyerAddress => FieldValue::Text(&self.buyer_address),
            F::BuyerState => FieldValue::Text(&self.buyer_state),
            F::SellerName => FieldValue::Text(&self.seller_name),
            F::SellerShopName => FieldValue::Text(&self.seller_shop_name),
            F::SellerEmail => FieldValue::Text(&self.seller_email),
            F::SellerPhone => FieldValue::Text(&self.seller_phone),
            F::SellerAddress => FieldValue::Text(&self.seller_address),
            F::SellerGstin => FieldValue::Text(&self.seller_gstin),
            F::SellerState => FieldValue::Text(&self.seller_state),
            F::SellerId => FieldValue::Text(&self.seller_id),
            F::ProductName => FieldValue::Text(&self.product_name),
            F::ProductCategory => FieldValue::Text(&self.product_category),
            F::Brand => FieldValue::Text(&self.brand),
            F::Unit => FieldValue::Text(&self.unit),
            F::Quantity => FieldValue::Number(self.quantity),
            F::UnitPrice => FieldValue::Number(self.unit_price),
            F::TotalOrderValue => FieldValue::Number(self.total_order_value),
        }
    }

    /// Mutable access to a text field; `None` for numeric fields.
    pub fn text_mut(&mut self, field: CanonicalField) -> Option<&mut String> {
        use CanonicalField as F;
        Some(match field {
            F::ContractNo => &mut self.contract_no,
            F::ContractDate => &mut self.contract_date,
            F::Year => &mut self.year,
            F::OrganisationName => &mut self.organisation_name,
            F::Department => &mut self.department,
            F::BuyerName => &mut self.buyer_name,
            F::BuyerDesignation => &mut self.buyer_designation,
            F::BuyerEmail => &mut self.buyer_email,
            F::BuyerPhone => &mut self.buyer_phone,
            F::BuyerAddress => &mut self.buyer_address,
            F::BuyerState => &mut self.buyer_state,
            F::SellerName => &mut self.seller_name,
            F::SellerShopName => &mut self.seller_shop_name,
            F::SellerEmail => &mut self.seller_email,
            F::SellerPhone => &mut self.seller_phone,
            F::SellerAddress => &mut self.seller_address,
            F::SellerGstin => &mut self.seller_gstin,
            F::SellerState => &mut self.seller_state,
            F::SellerId => &mut self.seller_id,
            F::ProductName => &mut self.product_name,
            F::ProductCategory => &mut self.product_category,
            F::Brand => &mut self.brand,
            F::Unit => &mut self.unit,
            F::Quantity | F::UnitPrice | F::TotalOrderValue => return None,
        })
    }

    /// Mutable access to a measure; `None` for text fields.
    pub fn number_mut(&mut self, field: CanonicalField) -> Option<&mut f64> {
        match field {
            CanonicalField::Quantity => Some(&mut self.quantity),
            CanonicalField::UnitPrice => Some(&mut self.unit_price),
            CanonicalField::TotalOrderValue => Some(&mut self.total_order_value),
            _ => None,
        }
    }

    /// Column headers of the records table: canonical fields then provenance.
    pub fn headers() -> Vec<&'static str> {
        CanonicalField::ALL
            .iter()
            .map(|f| f.label())
            .chain(std::iter::once(SOURCE_COLUMN))
            .collect()
    }

    /// This record as one records-table row, matching [`ExtractedRecord::headers`].
    pub fn to_row(&self) -> Vec<String> {
        CanonicalField::ALL
            .iter()
            .map(|f| self.get(*f).to_string())
            .chain(std::iter::once(self.provenance.source_id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_fields_have_distinct_labels() {
        let mut labels: Vec<&str> = CanonicalField::ALL.iter().map(|f| f.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), CanonicalField::ALL.len());
    }

    #[test]
    fn empty_record_uses_sentinel_everywhere() {
        let rec = ExtractedRecord::empty("NA", Provenance::default());
        for f in CanonicalField::ALL {
            match rec.get(f) {
                FieldValue::Text(s) => assert_eq!(s, "NA", "{f}"),
                FieldValue::Number(n) => {
                    assert!(f.is_numeric());
                    assert_eq!(n, 0.0)
                }
            }
        }
    }

    #[test]
    fn row_matches_headers() {
        let mut rec = ExtractedRecord::empty("NA", Provenance::default());
        rec.provenance.source_id = "c1.pdf".into();
        rec.total_order_value = 9920.0;
        rec.unit_price = 24.8;
        let headers = ExtractedRecord::headers();
        let row = rec.to_row();
        assert_eq!(headers.len(), row.len());
        assert_eq!(headers.last(), Some(&SOURCE_COLUMN));
        assert_eq!(row.last().map(String::as_str), Some("c1.pdf"));
        let total_idx = headers.iter().position(|h| *h == "Total Order Value").unwrap();
        assert_eq!(row[total_idx], "9920");
        let price_idx = headers.iter().position(|h| *h == "Unit Price").unwrap();
        assert_eq!(row[price_idx], "24.8");
    }

    #[test]
    fn text_and_number_accessors_are_disjoint() {
        let mut rec = ExtractedRecord::empty("NA", Provenance::default());
        for f in CanonicalField::ALL {
            let is_text = rec.text_mut(f).is_some();
            let is_number = rec.number_mut(f).is_some();
            assert_ne!(is_text, is_number, "{f}");
        }
    }
}
