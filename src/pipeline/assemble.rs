//! Record assembly: field matches → one [`ExtractedRecord`].

use crate::pipeline::fields::repair::coerce_number;
use crate::pipeline::fields::FieldMatches;
use crate::record::{CanonicalField, ExtractedRecord, Provenance};
use crate::vocabulary::Vocabulary;
use tracing::debug;

/// Rewrite "no value" text to `sentinel`: blank, punctuation-only, or one of
/// the vocabulary's not-available tokens.
pub fn normalize_empty(value: &str, sentinel: &str, vocabulary: &Vocabulary) -> String {
    let v = value.trim();
    if v.is_empty() || !v.chars().any(|c| c.is_alphanumeric()) || vocabulary.is_non_value(v) {
        sentinel.to_string()
    } else {
        v.to_string()
    }
}

/// Build the canonical record for one document.
///
/// Every text field not in `matches` becomes `sentinel`; every measure not in
/// `matches` (or not parsable) becomes `0.0`.
pub fn assemble_record(
    matches: &FieldMatches,
    provenance: Provenance,
    sentinel: &str,
    vocabulary: &Vocabulary,
) -> ExtractedRecord {
    let mut record = ExtractedRecord::empty(sentinel, provenance);
    for field in CanonicalField::ALL {
        let Some(found) = matches.get(field) else {
            continue;
        };
        if let Some(slot) = record.number_mut(field) {
            *slot = coerce_number(&found.value);
        } else if let Some(slot) = record.text_mut(field) {
            *slot = normalize_empty(&found.value, sentinel, vocabulary);
        }
    }
    debug!(
        "{}: {}/{} fields found",
        record.provenance.source_id,
        matches.len(),
        CanonicalField::ALL.len()
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fields::FieldMatch;

    fn found(value: &str) -> FieldMatch {
        FieldMatch {
            value: value.to_string(),
            strategy: "test",
        }
    }

    #[test]
    fn empty_values_become_sentinel() {
        let v = Vocabulary::builtin();
        assert_eq!(normalize_empty("  ", "NA", v), "NA");
        assert_eq!(normalize_empty("--", "NA", v), "NA");
        assert_eq!(normalize_empty("n/a", "NA", v), "NA");
        assert_eq!(normalize_empty(" Medico ", "NA", v), "Medico");
    }

    #[test]
    fn missing_fields_get_defaults() {
        let rec = assemble_record(
            &FieldMatches::default(),
            Provenance::default(),
            "NA",
            Vocabulary::builtin(),
        );
        assert_eq!(rec.contract_no, "NA");
        assert_eq!(rec.seller_id, "NA");
        assert_eq!(rec.total_order_value, 0.0);
    }

    #[test]
    fn measures_are_coerced() {
        let mut m = FieldMatches::default();
        m.insert(CanonicalField::TotalOrderValue, found("9,920"));
        m.insert(CanonicalField::Quantity, found("four hundred"));
        m.insert(CanonicalField::BuyerEmail, found("a@x.com"));
        let rec = assemble_record(
            &m,
            Provenance {
                source_id: "c1.pdf".into(),
                ..Default::default()
            },
            "NA",
            Vocabulary::builtin(),
        );
        assert_eq!(rec.total_order_value, 9920.0);
        assert_eq!(rec.quantity, 0.0);
        assert_eq!(rec.buyer_email, "a@x.com");
        assert_eq!(rec.provenance.source_id, "c1.pdf");
    }
}
