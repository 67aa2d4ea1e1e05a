//! Candidate cleanup and validation.
//!
//! Every candidate a strategy proposes goes through the same three steps:
//! generic trimming, the field's [`Transform`]s in order, then the field's
//! [`Validator`]. The first candidate that survives all three wins.

use super::repair;
use crate::vocabulary::Vocabulary;
use regex::Regex;

/// Settings shared by every field of one extraction run.
#[derive(Debug, Clone, Copy)]
pub struct ValueContext<'a> {
    pub vocabulary: &'a Vocabulary,
    pub repair_min_len: usize,
}

/// A field-specific rewrite applied before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Drop a trailing state name: `"Health Department Bihar"` → `"Health Department"`.
    StripStateSuffix,
    /// Unmask `[at]`/`[dot]`, drop inner spaces, lowercase.
    UnmaskEmail,
    /// Doubled-character repair per token. `Some(n)` overrides the run's
    /// minimum length for this field.
    RepairDoubled(Option<usize>),
    DigitsOnly,
    /// Keep the first number only; rejects the candidate if there is none.
    LeadingNumber,
    Uppercase,
    /// Keep only the first whitespace-separated token.
    FirstToken,
}

impl Transform {
    pub fn apply(&self, value: &str, ctx: &ValueContext<'_>) -> Option<String> {
        let out = match self {
            Transform::StripStateSuffix => ctx.vocabulary.strip_state_suffix(value).to_string(),
            Transform::UnmaskEmail => repair::deobfuscate_email(value)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase(),
            Transform::RepairDoubled(min_len) => {
                repair::repair_tokens(value, min_len.unwrap_or(ctx.repair_min_len))
            }
            Transform::DigitsOnly => repair::digits_only(value),
            Transform::LeadingNumber => repair::leading_number(value)?,
            Transform::Uppercase => value.to_uppercase(),
            Transform::FirstToken => value.split_whitespace().next()?.to_string(),
        };
        Some(out)
    }
}

/// Strip whitespace and stray separators left around a captured value.
pub fn trim_candidate(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | ';' | '|'))
        .trim_start_matches(['-', '.'])
        .trim()
}

/// Acceptance rules for one field.
///
/// Blank values, punctuation-only values, and "no value" tokens are always
/// rejected; everything else is opt-in.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    min_len: usize,
    max_len: Option<usize>,
    forbidden: Vec<String>,
    forbidden_prefixes: Vec<String>,
    reject_state: bool,
    require_state: bool,
    pattern: Option<Regex>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_len(mut self, n: usize) -> Self {
        self.min_len = n;
        self
    }

    pub fn max_len(mut self, n: usize) -> Self {
        self.max_len = Some(n);
        self
    }

    /// Reject values containing any of `subs` (case-insensitive). Used to
    /// catch matches that bled into a neighbouring field.
    pub fn forbid(mut self, subs: &[&str]) -> Self {
        self.forbidden
            .extend(subs.iter().map(|s| s.to_lowercase()));
        self
    }

    /// Reject values starting with any of `prefixes` (case-insensitive).
    pub fn forbid_prefix(mut self, prefixes: &[&str]) -> Self {
        self.forbidden_prefixes
            .extend(prefixes.iter().map(|s| s.to_lowercase()));
        self
    }

    /// Reject a value that is nothing but a state name.
    pub fn reject_state(mut self) -> Self {
        self.reject_state = true;
        self
    }

    /// Accept only state names.
    pub fn require_state(mut self) -> Self {
        self.require_state = true;
        self
    }

    /// Accept only values the regex matches.
    pub fn pattern(mut self, re: &Regex) -> Self {
        self.pattern = Some(re.clone());
        self
    }

    /// Why `value` is rejected, or `None` when it is acceptable.
    pub fn rejection(&self, value: &str, vocabulary: &Vocabulary) -> Option<&'static str> {
        let len = value.chars().count();
        if len == 0 {
            return Some("empty");
        }
        if !value.chars().any(|c| c.is_alphanumeric()) {
            return Some("punctuation only");
        }
        if vocabulary.is_non_value(value) {
            return Some("not-available token");
        }
        if len < self.min_len {
            return Some("too short");
        }
        if self.max_len.is_some_and(|max| len > max) {
            return Some("too long");
        }
        if self.reject_state && vocabulary.is_state(value) {
            return Some("state name alone");
        }
        if self.require_state && !vocabulary.is_state(value) {
            return Some("not a state name");
        }
        let lower = value.to_lowercase();
        if self.forbidden.iter().any(|f| lower.contains(f.as_str())) {
            return Some("contains a forbidden substring");
        }
        if self
            .forbidden_prefixes
            .iter()
            .any(|p| lower.starts_with(p.as_str()))
        {
            return Some("starts with a forbidden prefix");
        }
        if let Some(re) = &self.pattern {
            if !re.is_match(value) {
                return Some("wrong format");
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ValueContext<'static> {
        ValueContext {
            vocabulary: Vocabulary::builtin(),
            repair_min_len: 8,
        }
    }

    #[test]
    fn trim_candidate_strips_separators() {
        assert_eq!(trim_candidate(" : - Medico Traders ,"), "Medico Traders");
        assert_eq!(trim_candidate("Dr. Singh"), "Dr. Singh");
    }

    #[test]
    fn always_rejected_values() {
        let v = Validator::new();
        let vocab = Vocabulary::builtin();
        assert_eq!(v.rejection("", vocab), Some("empty"));
        assert_eq!(v.rejection("--", vocab), Some("punctuation only"));
        assert_eq!(v.rejection("N/A", vocab), Some("not-available token"));
        assert_eq!(v.rejection("Nil", vocab), Some("not-available token"));
        assert_eq!(v.rejection("Medico Traders", vocab), None);
    }

    #[test]
    fn state_rules() {
        let vocab = Vocabulary::builtin();
        let reject = Validator::new().reject_state();
        assert!(reject.rejection("Uttar Pradesh", vocab).is_some());
        assert!(reject.rejection("Lucknow, Uttar Pradesh", vocab).is_none());
        let require = Validator::new().require_state();
        assert!(require.rejection("uttar pradesh", vocab).is_none());
        assert!(require.rejection("Lucknow", vocab).is_some());
    }

    #[test]
    fn forbidden_substrings_and_prefixes() {
        let vocab = Vocabulary::builtin();
        let v = Validator::new().forbid(&["address"]).forbid_prefix(&["type"]);
        assert!(v.rejection("12 Civil Lines Address", vocab).is_some());
        assert!(v.rejection("Type : Registered Brand", vocab).is_some());
        assert!(v.rejection("Acme Type-A", vocab).is_none());
    }

    #[test]
    fn length_bounds() {
        let vocab = Vocabulary::builtin();
        let v = Validator::new().min_len(3).max_len(5);
        assert_eq!(v.rejection("ab", vocab), Some("too short"));
        assert_eq!(v.rejection("abcdef", vocab), Some("too long"));
        assert_eq!(v.rejection("abcd", vocab), None);
    }

    #[test]
    fn transforms() {
        let c = ctx();
        assert_eq!(
            Transform::StripStateSuffix
                .apply("Health & Family Welfare Department Uttar Pradesh", &c)
                .as_deref(),
            Some("Health & Family Welfare Department")
        );
        assert_eq!(
            Transform::UnmaskEmail.apply("CMS [at] UP [dot] gov [dot] in", &c).as_deref(),
            Some("cms@up.gov.in")
        );
        assert_eq!(
            Transform::RepairDoubled(None).apply("9933,,552200", &c).as_deref(),
            Some("93,520")
        );
        assert_eq!(Transform::LeadingNumber.apply("Tests", &c), None);
        assert_eq!(
            Transform::FirstToken.apply("5AB7C9 (verified)", &c).as_deref(),
            Some("5AB7C9")
        );
        assert_eq!(
            Transform::DigitsOnly.apply("05362 240 213", &c).as_deref(),
            Some("05362240213")
        );
        assert_eq!(
            Transform::Uppercase.apply("09abcde1234f1z5", &c).as_deref(),
            Some("09ABCDE1234F1Z5")
        );
    }
}
