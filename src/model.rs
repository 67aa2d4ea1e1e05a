//! Star-schema builder: deduplicated dimensions plus one fact row per record.
//!
//! Every dimension has a named composite-key function ([`buyer_key`],
//! [`seller_key`], [`product_key`]). The surrogate key is derived from the
//! composite key alone ([`surrogate_key`]), so the same entity receives the
//! same key in every run, whatever else the batch contains.
//!
//! [`DimensionalModel::build`] is a sequential reduction over a finished
//! batch. It sorts its input by source identifier first, so row order does
//! not depend on the order documents completed in.

use crate::record::{format_number, ExtractedRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Hex characters of the SHA-256 digest kept in a surrogate key.
pub const SURROGATE_HEX_LEN: usize = 12;

pub const BUYER_TAG: &str = "B";
pub const SELLER_TAG: &str = "S";
pub const PRODUCT_TAG: &str = "P";

// ── Composite keys ───────────────────────────────────────────────────────

/// The attribute tuple that decides whether two entities are the same.
///
/// Components are trimmed and lowercased; the string form is
/// `kind:c1|c2|…`. A `\` or `|` inside a component is escaped with `\`, so
/// distinct component tuples never share a string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(kind: &str, parts: &[&str]) -> Self {
        let parts: Vec<String> = parts
            .iter()
            .map(|p| {
                p.trim()
                    .to_lowercase()
                    .replace('\\', "\\\\")
                    .replace('|', "\\|")
            })
            .collect();
        Self(format!("{kind}:{}", parts.join("|")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Buyer: designation + email + phone.
pub fn buyer_key(r: &ExtractedRecord) -> CompositeKey {
    CompositeKey::new(
        "buyer",
        &[&r.buyer_designation, &r.buyer_email, &r.buyer_phone],
    )
}

/// Seller: the GeM seller ID when present, otherwise name + email.
pub fn seller_key(r: &ExtractedRecord, sentinel: &str) -> CompositeKey {
    let id = r.seller_id.trim();
    if id.is_empty() || id == sentinel {
        CompositeKey::new("seller", &[&r.seller_name, &r.seller_email])
    } else {
        CompositeKey::new("seller-id", &[id])
    }
}

/// Product: name + brand + unit.
pub fn product_key(r: &ExtractedRecord) -> CompositeKey {
    CompositeKey::new("product", &[&r.product_name, &r.brand, &r.unit])
}

/// `TAG_` followed by the first [`SURROGATE_HEX_LEN`] hex characters of the
/// SHA-256 of the composite key.
pub fn surrogate_key(tag: &str, key: &CompositeKey) -> String {
    let digest = Sha256::digest(key.as_str().as_bytes());
    let hex: String = digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>();
    format!("{tag}_{}", &hex[..SURROGATE_HEX_LEN])
}

// ── Table rows ───────────────────────────────────────────────────────────

/// A row of an exported table with a fixed column schema.
pub trait TableRow {
    /// Table name, also the export file stem.
    const TABLE: &'static str;
    /// Column names, in output order.
    const HEADERS: &'static [&'static str];

    /// Cell values matching [`TableRow::HEADERS`].
    fn cells(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerRow {
    pub buyer_key: String,
    pub organisation_name: String,
    pub department: String,
    pub buyer_name: String,
    pub buyer_designation: String,
    pub buyer_email: String,
    pub buyer_phone: String,
    pub buyer_address: String,
    pub buyer_state: String,
}

impl BuyerRow {
    fn from_record(key: String, r: &ExtractedRecord) -> Self {
        Self {
            buyer_key: key,
            organisation_name: r.organisation_name.clone(),
            department: r.department.clone(),
            buyer_name: r.buyer_name.clone(),
            buyer_designation: r.buyer_designation.clone(),
            buyer_email: r.buyer_email.clone(),
            buyer_phone: r.buyer_phone.clone(),
            buyer_address: r.buyer_address.clone(),
            buyer_state: r.buyer_state.clone(),
        }
    }
}

impl TableRow for BuyerRow {
    const TABLE: &'static str = "Dim_Buyer";
    const HEADERS: &'static [&'static str] = &[
        "Buyer_Key",
        "Organisation_Name",
        "Department",
        "Buyer_Name",
        "Buyer_Designation",
        "Buyer_Email",
        "Buyer_Phone",
        "Buyer_Address",
        "Buyer_State",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.buyer_key.clone(),
            self.organisation_name.clone(),
            self.department.clone(),
            self.buyer_name.clone(),
            self.buyer_designation.clone(),
            self.buyer_email.clone(),
            self.buyer_phone.clone(),
            self.buyer_address.clone(),
            self.buyer_state.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerRow {
    pub seller_key: String,
    pub seller_id: String,
    pub seller_name: String,
    pub seller_shop_name: String,
    pub seller_email: String,
    pub seller_phone: String,
    pub seller_address: String,
    pub seller_gstin: String,
    pub seller_state: String,
}

impl SellerRow {
    fn from_record(key: String, r: &ExtractedRecord) -> Self {
        Self {
            seller_key: key,
            seller_id: r.seller_id.clone(),
            seller_name: r.seller_name.clone(),
            seller_shop_name: r.seller_shop_name.clone(),
            seller_email: r.seller_email.clone(),
            seller_phone: r.seller_phone.clone(),
            seller_address: r.seller_address.clone(),
            seller_gstin: r.seller_gstin.clone(),
            seller_state: r.seller_state.clone(),
        }
    }
}

impl TableRow for SellerRow {
    const TABLE: &'static str = "Dim_Seller";
    const HEADERS: &'static [&'static str] = &[
        "Seller_Key",
        "Seller_ID",
        "Seller_Name",
        "Seller_Shop_Name",
        "Seller_Email",
        "Seller_Phone",
        "Seller_Address",
        "Seller_GSTIN",
        "Seller_State",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.seller_key.clone(),
            self.seller_id.clone(),
            self.seller_name.clone(),
            self.seller_shop_name.clone(),
            self.seller_email.clone(),
            self.seller_phone.clone(),
            self.seller_address.clone(),
            self.seller_gstin.clone(),
            self.seller_state.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub product_key: String,
    pub product_name: String,
    pub product_category: String,
    pub brand: String,
    pub unit: String,
}

impl ProductRow {
    fn from_record(key: String, r: &ExtractedRecord) -> Self {
        Self {
            product_key: key,
            product_name: r.product_name.clone(),
            product_category: r.product_category.clone(),
            brand: r.brand.clone(),
            unit: r.unit.clone(),
        }
    }
}

impl TableRow for ProductRow {
    const TABLE: &'static str = "Dim_Product";
    const HEADERS: &'static [&'static str] =
        &["Product_Key", "Product_Name", "Product_Category", "Brand", "Unit"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.product_key.clone(),
            self.product_name.clone(),
            self.product_category.clone(),
            self.brand.clone(),
            self.unit.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub contract_no: String,
    pub contract_date: String,
    pub buyer_key: String,
    pub seller_key: String,
    pub product_key: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_order_value: f64,
}

impl TableRow for FactRow {
    const TABLE: &'static str = "Fact_Contract_Sales";
    const HEADERS: &'static [&'static str] = &[
        "Contract_No",
        "Contract_Date",
        "Buyer_Key",
        "Seller_Key",
        "Product_Key",
        "Quantity",
        "Unit_Price",
        "Total_Order_Value",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.contract_no.clone(),
            self.contract_date.clone(),
            self.buyer_key.clone(),
            self.seller_key.clone(),
            self.product_key.clone(),
            format_number(self.quantity),
            format_number(self.unit_price),
            format_number(self.total_order_value),
        ]
    }
}

// ── Reduction ────────────────────────────────────────────────────────────

/// Composite key → surrogate key, plus the rows in first-seen order.
struct Dimension<R> {
    tag: &'static str,
    keys: HashMap<CompositeKey, String>,
    rows: Vec<R>,
}

impl<R> Dimension<R> {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            keys: HashMap::new(),
            rows: Vec::new(),
        }
    }

    /// Surrogate key for `key`; the first sighting also emits a row.
    fn resolve(&mut self, key: CompositeKey, make_row: impl FnOnce(String) -> R) -> String {
        if let Some(existing) = self.keys.get(&key) {
            return existing.clone();
        }
        let surrogate = surrogate_key(self.tag, &key);
        self.rows.push(make_row(surrogate.clone()));
        self.keys.insert(key, surrogate.clone());
        surrogate
    }
}

/// The four star-schema tables for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionalModel {
    pub buyers: Vec<BuyerRow>,
    pub sellers: Vec<SellerRow>,
    pub products: Vec<ProductRow>,
    pub facts: Vec<FactRow>,
}

impl DimensionalModel {
    /// Reduce a finished batch of records into the star schema.
    ///
    /// Emits exactly one fact row per record. `sentinel` is the placeholder
    /// the records were assembled with; a seller ID equal to it counts as
    /// absent.
    pub fn build(records: &[ExtractedRecord], sentinel: &str) -> Self {
        let mut ordered: Vec<&ExtractedRecord> = records.iter().collect();
        ordered.sort_by(|a, b| {
            a.provenance
                .source_id
                .cmp(&b.provenance.source_id)
                .then_with(|| a.contract_no.cmp(&b.contract_no))
        });

        let mut buyers = Dimension::new(BUYER_TAG);
        let mut sellers = Dimension::new(SELLER_TAG);
        let mut products = Dimension::new(PRODUCT_TAG);
        let mut facts = Vec::with_capacity(ordered.len());

        for r in ordered {
            let buyer = buyers.resolve(buyer_key(r), |k| BuyerRow::from_record(k, r));
            let seller = sellers.resolve(seller_key(r, sentinel), |k| SellerRow::from_record(k, r));
            let product = products.resolve(product_key(r), |k| ProductRow::from_record(k, r));
            facts.push(FactRow {
                contract_no: r.contract_no.clone(),
                contract_date: r.contract_date.clone(),
                buyer_key: buyer,
                seller_key: seller,
                product_key: product,
                quantity: r.quantity,
                unit_price: r.unit_price,
                total_order_value: r.total_order_value,
            });
        }

        debug!(
            "Star schema: {} buyers, {} sellers, {} products, {} facts",
            buyers.rows.len(),
            sellers.rows.len(),
            products.rows.len(),
            facts.len()
        );

        Self {
            buyers: buyers.rows,
            sellers: sellers.rows,
            products: products.rows,
            facts,
        }
    }
}
