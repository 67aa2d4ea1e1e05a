//! Value repair and coercion helpers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Undo doubled-character corruption in one token.
///
/// Some render and OCR paths emit every character of a numeric token twice
/// (`"9933,,552200"` for `"93,520"`). A token is repaired only when its length
/// is even, every consecutive pair is identical, and either it is at least
/// `min_len` characters long or it contains a doubled `,` or `.` (a genuine
/// number never has two separators in a row). Anything else is returned
/// unchanged.
pub fn repair_doubled(token: &str, min_len: usize) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 2 || chars.len() % 2 != 0 {
        return token.to_string();
    }
    if !chars.chunks(2).all(|pair| pair[0] == pair[1]) {
        return token.to_string();
    }
    let doubled_separator = chars.chunks(2).any(|pair| matches!(pair[0], ',' | '.'));
    if chars.len() < min_len && !doubled_separator {
        return token.to_string();
    }
    chars.iter().step_by(2).collect()
}

/// Apply [`repair_doubled`] to every whitespace-separated token of `value`.
pub fn repair_tokens(value: &str, min_len: usize) -> String {
    value
        .split_whitespace()
        .map(|t| repair_doubled(t, min_len))
        .collect::<Vec<_>>()
        .join(" ")
}

static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static RE_LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());

/// Parse a quantity or money value; `0.0` when nothing numeric is present.
///
/// Grouping commas and currency words are ignored: `"INR 9,920"` → `9920.0`.
pub fn coerce_number(value: &str) -> f64 {
    let cleaned = value.replace(',', "");
    RE_NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// The first number in `value`, keeping its grouping commas.
pub fn leading_number(value: &str) -> Option<String> {
    RE_LEADING_NUMBER
        .find(value)
        .map(|m| m.as_str().trim_end_matches(',').to_string())
}

static RE_MASK_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[\[\(\{]\s*at\s*[\]\)\}]\s*").unwrap());
static RE_MASK_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[\[\(\{]\s*dot\s*[\]\)\}]\s*").unwrap());

/// Unmask addresses printed as `name[at]domain[dot]gov[dot]in`.
pub fn deobfuscate_email(text: &str) -> String {
    let s = RE_MASK_AT.replace_all(text, "@");
    RE_MASK_DOT.replace_all(&s, ".").into_owned()
}

/// Keep only ASCII digits.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubled_digits_with_separator_are_repaired() {
        assert_eq!(repair_doubled("9933,,552200", 8), "93,520");
        assert_eq!(repair_doubled("2244..88", 8), "24.8");
    }

    #[test]
    fn short_doubled_token_with_separator_is_repaired() {
        assert_eq!(repair_doubled("44..00", 8), "4.0");
    }

    #[test]
    fn long_doubled_token_is_repaired() {
        assert_eq!(repair_doubled("99887766554433221100", 8), "9876543210");
        assert_eq!(repair_doubled("99331122", 8), "9312");
    }

    #[test]
    fn plain_values_are_unchanged() {
        for v in ["9920", "1100", "93,520", "24.80", "GEMC-511687", "400", "7", ""] {
            assert_eq!(repair_doubled(v, 8), v);
        }
    }

    #[test]
    fn odd_or_partial_doubling_is_unchanged() {
        assert_eq!(repair_doubled("199933.355.22200000", 8), "199933.355.22200000");
        assert_eq!(repair_doubled("99331123", 8), "99331123");
    }

    #[test]
    fn repair_tokens_works_per_token() {
        assert_eq!(repair_tokens("INR  9933,,552200", 8), "INR 93,520");
    }

    #[test]
    fn coercion() {
        assert_eq!(coerce_number("9,920"), 9920.0);
        assert_eq!(coerce_number("INR 24.80"), 24.8);
        assert_eq!(coerce_number("Rs. 1,10,000.50 only"), 110000.5);
        assert_eq!(coerce_number("NA"), 0.0);
        assert_eq!(coerce_number(""), 0.0);
    }

    #[test]
    fn leading_number_keeps_grouping() {
        assert_eq!(leading_number("400 Tests").as_deref(), Some("400"));
        assert_eq!(leading_number("INR 9,920, inclusive").as_deref(), Some("9,920"));
        assert_eq!(leading_number("none"), None);
    }

    #[test]
    fn masked_email_is_unmasked() {
        assert_eq!(
            deobfuscate_email("cms-sul[at]up[dot]gov[dot]in"),
            "cms-sul@up.gov.in"
        );
        assert_eq!(deobfuscate_email("a (AT) x (DOT) com"), "a@x.com");
    }

    #[test]
    fn digits() {
        assert_eq!(digits_only("+91 98765-43210"), "919876543210");
    }
}
