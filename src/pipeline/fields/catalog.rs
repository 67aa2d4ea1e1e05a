//! The per-field extraction chains for GeM-style procurement contracts.

use super::strategies::{
    InlineLabel, MaskedEmail, NextLine, Pattern, StopTokens, VocabularyMatch, VocabularyMode,
    YearOf,
};
use super::{FieldMatches, FieldRule, Transform, Validator, ValueContext};
use crate::config::PipelineConfig;
use crate::error::ContractError;
use crate::pipeline::sections::{Scope, Zones};
use crate::record::CanonicalField as F;
use crate::vocabulary::Vocabulary;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

// ── Labels ───────────────────────────────────────────────────────────────

const CONTRACT_NO: &[&str] = &["Contract No", "Contract No.", "Contract Number"];
const CONTRACT_DATE: &[&str] = &["Contract Date", "Generated Date", "Order Date", "Dated"];
const ORGANISATION: &[&str] = &["Organisation Name", "Organization Name", "Office Name"];
const DEPARTMENT: &[&str] = &["Department Name", "Department"];
const BUYER_NAME: &[&str] = &["Buyer Name", "Name"];
const DESIGNATION: &[&str] = &["Designation"];
const EMAIL: &[&str] = &["Email ID", "E-mail ID", "Email"];
const PHONE: &[&str] = &[
    "Contact No.",
    "Contact No",
    "Contact Number",
    "Mobile No.",
    "Mobile No",
    "Mobile",
    "Phone No.",
    "Phone",
];
const ADDRESS: &[&str] = &["Address"];
const STATE: &[&str] = &["State"];
const SELLER_NAME: &[&str] = &["Seller Name", "Contact Person", "Name"];
const SHOP_NAME: &[&str] = &["Company Name", "Shop Name", "Firm Name", "Trade Name"];
const GSTIN: &[&str] = &["GSTIN", "GST No.", "GST Number"];
const SELLER_ID: &[&str] = &["GeM Seller ID", "Seller ID"];
const PRODUCT_NAME: &[&str] = &["Product Name", "Item Description", "Item Name"];
const CATEGORY: &[&str] = &[
    "Category Name & Quadrant",
    "Category Name",
    "Product Category",
    "Category",
];
const BRAND: &[&str] = &["Brand"];
const UNIT: &[&str] = &["Unit of Measure", "Unit"];
const QUANTITY: &[&str] = &["Ordered Quantity", "Quantity", "Qty"];
const UNIT_PRICE: &[&str] = &["Unit Price (INR)", "Unit Price", "Rate"];
const TOTAL: &[&str] = &["Total Order Value (in INR)", "Total Order Value"];

/// Labels that are never extracted but still end the value before them.
const OTHER_LABELS: &[&str] = &[
    "Type",
    "Brand Type",
    "Ministry",
    "Office Zone",
    "Model",
    "HSN Code",
    "Catalogue Status",
    "Selling As",
    "MSME Registration number",
    "Payment Mode",
    "Role",
];

fn known_labels() -> Vec<&'static str> {
    [
        CONTRACT_NO,
        CONTRACT_DATE,
        ORGANISATION,
        DEPARTMENT,
        BUYER_NAME,
        DESIGNATION,
        EMAIL,
        PHONE,
        ADDRESS,
        STATE,
        SELLER_NAME,
        SHOP_NAME,
        GSTIN,
        SELLER_ID,
        PRODUCT_NAME,
        CATEGORY,
        BRAND,
        UNIT,
        QUANTITY,
        UNIT_PRICE,
        TOTAL,
        OTHER_LABELS,
    ]
    .concat()
}

// ── Fixed formats ────────────────────────────────────────────────────────

static RE_CONTRACT_NO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(GEMC-\d+)").unwrap());
static RE_CONTRACT_NO_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-/]{4,}$").unwrap());
static RE_DATE_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}-[A-Za-z]{3}-\d{4})\b").unwrap());
static RE_DATE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());
static RE_DATE_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d{1,2}-[A-Za-z]{3}-\d{4}|\d{4}-\d{2}-\d{2}|\d{1,2}[/.]\d{1,2}[/.]\d{4})$")
        .unwrap()
});
static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());
static RE_YEAR_IN_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());
static RE_YEAR_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").unwrap());
static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());
static RE_EMAIL_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$").unwrap());
static RE_MOBILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([6-9]\d{9})\b").unwrap());
static RE_PHONE_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10,12}$").unwrap());
static RE_GSTIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{2}[A-Z]{5}\d{4}[A-Z][1-9A-Z]Z[0-9A-Z])\b").unwrap());
static RE_GSTIN_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}[A-Z]{5}\d{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").unwrap());
static RE_SELLER_ID_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-]{3,}$").unwrap());
static RE_TEST_KIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([A-Za-z0-9 ]+Test[A-Za-z0-9 ]+Kit)").unwrap());
static RE_QTY_UNITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,6})\s+(?:Tests?|Nos|Units?|Pieces|Pcs|Kits?)\b").unwrap()
});
static RE_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Total\s*Order\s*Value[^0-9\n]*([0-9][0-9,.]*)").unwrap()
});
static RE_INR_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"INR[:\s]*([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());
static RE_NUMBER_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d[\d,]*(?:\.\d+)?$").unwrap());

/// Every field's extraction chain, compiled once per run.
#[derive(Debug)]
pub struct FieldCatalog {
    zones: Zones,
    rules: Vec<FieldRule>,
    vocabulary: Arc<Vocabulary>,
    repair_min_len: usize,
}

impl FieldCatalog {
    pub fn new(config: &PipelineConfig) -> Result<Self, ContractError> {
        let vocabulary = Arc::clone(&config.vocabulary);
        let rules = build_rules(&vocabulary)?;
        debug!("Field catalog ready: {} rules", rules.len());
        Ok(Self {
            zones: Zones::new(&config.zones)?,
            rules,
            vocabulary,
            repair_min_len: config.doubled_repair_min_len,
        })
    }

    /// Run every field's chain over one document's normalised text.
    ///
    /// Fields are resolved in column order, so the contract date is known by
    /// the time the year is looked for.
    pub fn extract(&self, text: &str) -> FieldMatches {
        let sections = self.zones.slice(text);
        let ctx = ValueContext {
            vocabulary: &self.vocabulary,
            repair_min_len: self.repair_min_len,
        };
        let mut matches = FieldMatches::default();
        for rule in &self.rules {
            let date = matches.value(F::ContractDate).map(str::to_string);
            if let Some(found) = rule.attempt(&sections, date.as_deref(), &ctx) {
                matches.insert(rule.field, found);
            }
        }
        matches
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }
}

/// A labelled value inline, then on the following line.
fn labelled(
    rule: FieldRule,
    labels: &[&str],
    stop: &Arc<StopTokens>,
) -> Result<FieldRule, ContractError> {
    Ok(rule
        .then(InlineLabel::new(labels, Arc::clone(stop))?)
        .then(NextLine::new(labels, Arc::clone(stop))?))
}

fn person() -> Validator {
    Validator::new()
        .min_len(2)
        .max_len(100)
        .forbid(&["@"])
        .reject_state()
}

fn phone(field: F, scope: Scope, stop: &Arc<StopTokens>) -> Result<FieldRule, ContractError> {
    Ok(FieldRule::new(field, scope)
        .then(InlineLabel::new(PHONE, Arc::clone(stop))?)
        .then(Pattern::new(&RE_MOBILE))
        .transform(Transform::RepairDoubled(Some(13)))
        .transform(Transform::FirstToken)
        .transform(Transform::DigitsOnly)
        .validate(Validator::new().pattern(&RE_PHONE_VALUE)))
}

fn email(field: F, scope: Scope, stop: &Arc<StopTokens>) -> Result<FieldRule, ContractError> {
    Ok(FieldRule::new(field, scope)
        .then(InlineLabel::new(EMAIL, Arc::clone(stop))?)
        .then(MaskedEmail::new(&RE_EMAIL))
        .transform(Transform::UnmaskEmail)
        .validate(Validator::new().pattern(&RE_EMAIL_VALUE)))
}

fn address(field: F, scope: Scope, stop: &Arc<StopTokens>) -> Result<FieldRule, ContractError> {
    Ok(labelled(FieldRule::new(field, scope), ADDRESS, stop)?.validate(
        Validator::new()
            .min_len(5)
            .max_len(250)
            .forbid(&["@"])
            .reject_state(),
    ))
}

fn state(
    field: F,
    scope: Scope,
    stop: &Arc<StopTokens>,
    vocabulary: &Vocabulary,
) -> Result<FieldRule, ContractError> {
    Ok(FieldRule::new(field, scope)
        .then(InlineLabel::new(STATE, Arc::clone(stop))?)
        .then(VocabularyMatch::new(
            &vocabulary.states,
            VocabularyMode::Exact,
        )?)
        .validate(Validator::new().require_state()))
}

fn measure(rule: FieldRule) -> FieldRule {
    rule.transform(Transform::RepairDoubled(None))
        .transform(Transform::LeadingNumber)
        .validate(Validator::new().pattern(&RE_NUMBER_VALUE))
}

fn build_rules(vocabulary: &Vocabulary) -> Result<Vec<FieldRule>, ContractError> {
    let stop = Arc::new(StopTokens::new(&known_labels())?);
    let stop = &stop;

    let rules = vec![
        FieldRule::new(F::ContractNo, Scope::Full)
            .then(Pattern::new(&RE_CONTRACT_NO))
            .then(InlineLabel::new(CONTRACT_NO, Arc::clone(stop))?)
            .transform(Transform::FirstToken)
            .validate(Validator::new().pattern(&RE_CONTRACT_NO_VALUE)),
        FieldRule::new(F::ContractDate, Scope::Full)
            .then(InlineLabel::anywhere(CONTRACT_DATE, Arc::clone(stop))?)
            .then(Pattern::new(&RE_DATE_DMY))
            .then(Pattern::new(&RE_DATE_ISO))
            .transform(Transform::FirstToken)
            .validate(Validator::new().pattern(&RE_DATE_VALUE)),
        FieldRule::new(F::Year, Scope::Full)
            .then(YearOf::new(&RE_YEAR))
            .then(Pattern::new(&RE_YEAR_IN_TEXT))
            .validate(Validator::new().pattern(&RE_YEAR_VALUE)),
        labelled(FieldRule::new(F::OrganisationName, Scope::Organisation), ORGANISATION, stop)?
            .then(VocabularyMatch::new(
                &vocabulary.organisation_fragments,
                VocabularyMode::Line,
            )?)
            .validate(
                Validator::new()
                    .min_len(3)
                    .max_len(150)
                    .forbid(&["address", "pin code", "pincode", "email", "@", "contact no", "gstin"])
                    .reject_state(),
            ),
        labelled(FieldRule::new(F::Department, Scope::Organisation), DEPARTMENT, stop)?
            .then(VocabularyMatch::new(
                &vocabulary.departments,
                VocabularyMode::Exact,
            )?)
            .transform(Transform::StripStateSuffix)
            .validate(
                Validator::new()
                    .min_len(3)
                    .max_len(150)
                    .forbid(&["address", "@"])
                    .reject_state(),
            ),
        FieldRule::new(F::BuyerName, Scope::Buyer)
            .then(InlineLabel::new(BUYER_NAME, Arc::clone(stop))?)
            .validate(person()),
        labelled(FieldRule::new(F::BuyerDesignation, Scope::Buyer), DESIGNATION, stop)?
            .validate(Validator::new().min_len(2).max_len(100).forbid(&["@"])),
        email(F::BuyerEmail, Scope::Buyer, stop)?,
        phone(F::BuyerPhone, Scope::Buyer, stop)?,
        address(F::BuyerAddress, Scope::Buyer, stop)?,
        state(F::BuyerState, Scope::Buyer, stop, vocabulary)?,
        FieldRule::new(F::SellerName, Scope::Seller)
            .then(InlineLabel::new(SELLER_NAME, Arc::clone(stop))?)
            .validate(person()),
        labelled(FieldRule::new(F::SellerShopName, Scope::Seller), SHOP_NAME, stop)?
            .validate(Validator::new().min_len(2).max_len(150).forbid(&["@"]).reject_state()),
        email(F::SellerEmail, Scope::Seller, stop)?,
        phone(F::SellerPhone, Scope::Seller, stop)?,
        address(F::SellerAddress, Scope::Seller, stop)?,
        FieldRule::new(F::SellerGstin, Scope::Seller)
            .then(InlineLabel::anywhere(GSTIN, Arc::clone(stop))?)
            .then(Pattern::new(&RE_GSTIN))
            .transform(Transform::FirstToken)
            .transform(Transform::Uppercase)
            .validate(Validator::new().pattern(&RE_GSTIN_VALUE)),
        state(F::SellerState, Scope::Seller, stop, vocabulary)?,
        FieldRule::new(F::SellerId, Scope::Seller)
            .then(InlineLabel::anywhere(SELLER_ID, Arc::clone(stop))?)
            .transform(Transform::FirstToken)
            .validate(Validator::new().pattern(&RE_SELLER_ID_VALUE)),
        labelled(FieldRule::new(F::ProductName, Scope::Product), PRODUCT_NAME, stop)?
            .then(VocabularyMatch::new(
                &vocabulary.product_fragments,
                VocabularyMode::Line,
            )?)
            .then(Pattern::new(&RE_TEST_KIT))
            .validate(
                Validator::new()
                    .min_len(3)
                    .max_len(200)
                    .forbid(&["@"])
                    .reject_state(),
            ),
        FieldRule::new(F::ProductCategory, Scope::Product)
            .then(InlineLabel::new(CATEGORY, Arc::clone(stop))?)
            .validate(Validator::new().min_len(2).max_len(150)),
        FieldRule::new(F::Brand, Scope::Product)
            .then(InlineLabel::new(BRAND, Arc::clone(stop))?)
            .validate(Validator::new().max_len(100).forbid_prefix(&["type"])),
        FieldRule::new(F::Unit, Scope::Product)
            .then(InlineLabel::new(UNIT, Arc::clone(stop))?)
            .validate(Validator::new().max_len(40).forbid_prefix(&["price"])),
        measure(
            labelled(FieldRule::new(F::Quantity, Scope::Product), QUANTITY, stop)?
                .then(Pattern::new(&RE_QTY_UNITS)),
        ),
        measure(labelled(
            FieldRule::new(F::UnitPrice, Scope::Product),
            UNIT_PRICE,
            stop,
        )?),
        measure(
            labelled(
                FieldRule::new(F::TotalOrderValue, Scope::Full).then(Pattern::new(&RE_TOTAL)),
                TOTAL,
                stop,
            )?
            .then(Pattern::new(&RE_INR_AMOUNT)),
        ),
    ];
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(&PipelineConfig::default()).unwrap()
    }

    const CONTRACT: &str = "Contract\n\
        Contract No: GEMC-511687781234567\n\
        Generated Date : 12-Jan-2024\n\
        Organisation Details\n\
        Type : State Government\n\
        Ministry : Uttar Pradesh\n\
        Department : Health & Family Welfare Department Uttar Pradesh\n\
        Organisation Name : District Hospital Sultanpur\n\
        Office Zone : Sultanpur\n\
        Buyer Details\n\
        Designation : Chief Medical Superintendent\n\
        Contact No. : 05362-240213\n\
        Email ID : cms-sul[at]up[dot]gov[dot]in\n\
        Address : District Hospital, Sultanpur, Uttar Pradesh-228001\n\
        State : Uttar Pradesh\n\
        Financial Approval Detail\n\
        IFD Concurrence : No\n\
        Seller Details\n\
        GeM Seller ID : 5AB7C9D\n\
        Company Name : Medico Traders\n\
        Contact No. : 9876543210\n\
        Email ID : sales@medico.in\n\
        Address : 12 Civil Lines, Lucknow, Uttar Pradesh-226001\n\
        GSTIN : 09ABCDE1234F1Z5\n\
        Product Details\n\
        Product Name : Malaria Antigen Test Kit\n\
        Brand : Acme Diagnostics Brand Type : Registered Brand\n\
        Category Name & Quadrant : Rapid Diagnostic Kits\n\
        Ordered Quantity : 400\n\
        Unit : Tests\n\
        Unit Price (INR) : 24.8\n\
        Total Order Value (in INR) 9,920\n\
        Consignee Detail\n\
        Delivery within 30 days";

    #[test]
    fn typical_contract() {
        let m = catalog().extract(CONTRACT);
        let v = |f| m.value(f).unwrap_or("<absent>");
        assert_eq!(v(F::ContractNo), "GEMC-511687781234567");
        assert_eq!(v(F::ContractDate), "12-Jan-2024");
        assert_eq!(v(F::Year), "2024");
        assert_eq!(v(F::OrganisationName), "District Hospital Sultanpur");
        assert_eq!(v(F::Department), "Health & Family Welfare Department");
        assert_eq!(v(F::BuyerDesignation), "Chief Medical Superintendent");
        assert_eq!(v(F::BuyerEmail), "cms-sul@up.gov.in");
        assert_eq!(v(F::BuyerPhone), "05362240213");
        assert_eq!(v(F::BuyerState), "Uttar Pradesh");
        assert_eq!(v(F::SellerId), "5AB7C9D");
        assert_eq!(v(F::SellerShopName), "Medico Traders");
        assert_eq!(v(F::SellerPhone), "9876543210");
        assert_eq!(v(F::SellerEmail), "sales@medico.in");
        assert_eq!(v(F::SellerGstin), "09ABCDE1234F1Z5");
        assert_eq!(v(F::SellerState), "Uttar Pradesh");
        assert_eq!(v(F::ProductName), "Malaria Antigen Test Kit");
        assert_eq!(v(F::Brand), "Acme Diagnostics");
        assert_eq!(v(F::ProductCategory), "Rapid Diagnostic Kits");
        assert_eq!(v(F::Unit), "Tests");
        assert_eq!(v(F::Quantity), "400");
        assert_eq!(v(F::UnitPrice), "24.8");
        assert_eq!(v(F::TotalOrderValue), "9,920");
    }

    #[test]
    fn organisation_block_without_colons() {
        let text = "Organisation Details\nOrganisation Name\nDistrict Hospital Sultanpur\n\
                    Department\nHealth & Family Welfare Department Uttar Pradesh\nBuyer Details";
        let m = catalog().extract(text);
        assert_eq!(
            m.value(F::OrganisationName),
            Some("District Hospital Sultanpur")
        );
        assert_eq!(
            m.value(F::Department),
            Some("Health & Family Welfare Department")
        );
    }

    #[test]
    fn missing_labels_leave_fields_absent() {
        let m = catalog().extract("Nothing useful here at all");
        assert!(m.get(F::ContractNo).is_none());
        assert!(m.get(F::TotalOrderValue).is_none());
        assert!(m.get(F::SellerGstin).is_none());
    }

    #[test]
    fn year_falls_back_to_text_without_date() {
        let m = catalog().extract("Order placed during 2023 for the district");
        assert!(m.get(F::ContractDate).is_none());
        assert_eq!(m.value(F::Year), Some("2023"));
    }

    #[test]
    fn doubled_total_is_repaired() {
        let m = catalog().extract("Total Order Value (in INR) 9933,,552200");
        assert_eq!(m.value(F::TotalOrderValue), Some("93,520"));
    }

    #[test]
    fn brand_type_line_is_not_a_brand() {
        let m = catalog().extract("Product Details\nBrand Type : Registered Brand\n");
        assert!(m.get(F::Brand).is_none());
    }

    #[test]
    fn unit_price_is_not_a_unit() {
        let m = catalog().extract("Product Details\nUnit Price (INR) : 24.8\n");
        assert!(m.get(F::Unit).is_none());
        assert_eq!(m.value(F::UnitPrice), Some("24.8"));
    }

    #[test]
    fn quantity_from_units_pattern() {
        let m = catalog().extract("Product Details\nSupply of 250 Tests of dengue kit\n");
        assert_eq!(m.value(F::Quantity), Some("250"));
    }

    #[test]
    fn measures_on_the_line_below_their_labels() {
        let m = catalog().extract(
            "Product Details\nOrdered Quantity\n400\nUnit Price (INR)\n24.8\n\
             Total Order Value (in INR)\n9,920\nConsignee Detail",
        );
        assert_eq!(m.value(F::Quantity), Some("400"));
        assert_eq!(m.value(F::UnitPrice), Some("24.8"));
        assert_eq!(m.value(F::TotalOrderValue), Some("9,920"));
        assert_eq!(m.get(F::UnitPrice).unwrap().strategy, "next-line");
        assert_eq!(m.get(F::TotalOrderValue).unwrap().strategy, "next-line");
    }

    #[test]
    fn state_name_alone_is_not_an_organisation() {
        let m = catalog().extract("Organisation Details\nOrganisation Name : Bihar\nBuyer Details");
        assert!(m.get(F::OrganisationName).is_none());
    }

    #[test]
    fn winning_strategy_is_recorded() {
        let m = catalog().extract("Contract No: GEMC-1234");
        assert_eq!(m.get(F::ContractNo).unwrap().strategy, "pattern");
    }
}
