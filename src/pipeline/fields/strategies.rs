//! Extraction strategies.
//!
//! A strategy proposes candidate values for a field from a piece of text,
//! best candidate first. It does not judge them; the field's transforms and
//! validator do. Kinds:
//!
//! * [`InlineLabel`]: `Label : value` on one line
//! * [`NextLine`]: `Label` alone on a line, value on the next one
//! * [`VocabularyMatch`]: curated canonical strings found in the text
//! * [`Pattern`]: fixed-format tokens (contract numbers, dates, GSTINs)
//! * [`MaskedEmail`]: e-mail addresses, including `[at]`/`[dot]` masking
//! * [`YearOf`]: the year of the already-extracted contract date

use super::repair;
use super::SearchInput;
use crate::error::ContractError;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One way of finding a field's value.
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Short name recorded with the winning value.
    fn name(&self) -> &'static str;

    /// Candidate values in preference order.
    fn candidates(&self, input: &SearchInput<'_>) -> Vec<String>;
}

/// Alternation of escaped labels, longest first, words joined by horizontal
/// whitespace.
fn label_alternation(labels: &[&str]) -> String {
    let mut sorted: Vec<&str> = labels.to_vec();
    sorted.sort_by_key(|l| std::cmp::Reverse(l.len()));
    sorted
        .iter()
        .map(|l| {
            let words: Vec<String> = l.split_whitespace().map(regex::escape).collect();
            let body = words.join(r"[ \t]+");
            // `\b` only makes sense after a word character.
            if l.ends_with(|c: char| c.is_alphanumeric()) {
                format!(r"{body}\b")
            } else {
                body
            }
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn build(pattern: &str) -> Result<Regex, ContractError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|e| ContractError::InvalidConfig(format!("field pattern {pattern:?}: {e}")))
}

/// Matches any known label followed by a colon: the start of the next field.
#[derive(Debug, Clone)]
pub struct StopTokens(Option<Regex>);

impl StopTokens {
    pub fn new(labels: &[&str]) -> Result<Self, ContractError> {
        if labels.is_empty() {
            return Ok(Self(None));
        }
        Ok(Self(Some(build(&format!(
            r"(?:{})[ \t]*:",
            label_alternation(labels)
        ))?)))
    }

    /// `value` cut before the first following label.
    pub fn truncate<'a>(&self, value: &'a str) -> &'a str {
        match self.0.as_ref().and_then(|re| re.find(value)) {
            Some(m) => &value[..m.start()],
            None => value,
        }
    }
}

// ── Inline label ─────────────────────────────────────────────────────────

/// `Label [:-] value` on a single line.
///
/// By default the label must start its line, which keeps short labels such
/// as `Name` from matching inside `Organisation Name`. Distinctive labels can
/// use [`InlineLabel::anywhere`].
#[derive(Debug, Clone)]
pub struct InlineLabel {
    re: Regex,
    stop: Arc<StopTokens>,
}

impl InlineLabel {
    pub fn new(labels: &[&str], stop: Arc<StopTokens>) -> Result<Self, ContractError> {
        let re = build(&format!(
            r"^[ \t]*(?:{})[ \t]*[:\-]*[ \t]*([^\n]+)",
            label_alternation(labels)
        ))?;
        Ok(Self { re, stop })
    }

    /// Match the label anywhere on a line; a `:` or `-` separator is then required.
    pub fn anywhere(labels: &[&str], stop: Arc<StopTokens>) -> Result<Self, ContractError> {
        let re = build(&format!(
            r"(?:{})[ \t]*[:\-]+[ \t]*([^\n]+)",
            label_alternation(labels)
        ))?;
        Ok(Self { re, stop })
    }
}

impl Strategy for InlineLabel {
    fn name(&self) -> &'static str {
        "inline-label"
    }

    fn candidates(&self, input: &SearchInput<'_>) -> Vec<String> {
        self.re
            .captures_iter(input.text)
            .filter_map(|c| c.get(1))
            .map(|m| self.stop.truncate(m.as_str()).to_string())
            .collect()
    }
}

// ── Next line ────────────────────────────────────────────────────────────

/// `Label` alone on its line; the value is the next non-blank line.
#[derive(Debug, Clone)]
pub struct NextLine {
    re: Regex,
    stop: Arc<StopTokens>,
}

impl NextLine {
    pub fn new(labels: &[&str], stop: Arc<StopTokens>) -> Result<Self, ContractError> {
        let re = build(&format!(
            r"^[ \t]*(?:{})[ \t]*[:\-]*[ \t]*$",
            label_alternation(labels)
        ))?;
        Ok(Self { re, stop })
    }
}

impl Strategy for NextLine {
    fn name(&self) -> &'static str {
        "next-line"
    }

    fn candidates(&self, input: &SearchInput<'_>) -> Vec<String> {
        let lines: Vec<&str> = input.text.lines().collect();
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.re.is_match(line))
            .filter_map(|(i, _)| lines[i + 1..].iter().find(|l| !l.trim().is_empty()))
            .map(|next| self.stop.truncate(next).to_string())
            .collect()
    }
}

// ── Vocabulary ───────────────────────────────────────────────────────────

/// What a [`VocabularyMatch`] returns for a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabularyMode {
    /// The canonical vocabulary entry itself.
    Exact,
    /// The whole line the entry occurs on.
    Line,
}

/// Curated canonical strings found anywhere in the text.
///
/// Hits are proposed in text order; at one position the longest entry wins.
#[derive(Debug, Clone)]
pub struct VocabularyMatch {
    re: Option<Regex>,
    canonical: HashMap<String, String>,
    mode: VocabularyMode,
}

impl VocabularyMatch {
    pub fn new(entries: &[String], mode: VocabularyMode) -> Result<Self, ContractError> {
        let entries: Vec<&str> = entries
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .collect();
        let re = if entries.is_empty() {
            None
        } else {
            Some(build(&format!(
                r"\b(?:{})",
                label_alternation(&entries)
            ))?)
        };
        let canonical = entries
            .iter()
            .map(|e| (fold(e), e.to_string()))
            .collect();
        Ok(Self {
            re,
            canonical,
            mode,
        })
    }
}

/// Case- and whitespace-insensitive lookup key.
fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Strategy for VocabularyMatch {
    fn name(&self) -> &'static str {
        match self.mode {
            VocabularyMode::Exact => "vocabulary",
            VocabularyMode::Line => "vocabulary-line",
        }
    }

    fn candidates(&self, input: &SearchInput<'_>) -> Vec<String> {
        let Some(re) = &self.re else {
            return Vec::new();
        };
        let text = input.text;
        re.find_iter(text)
            .filter_map(|m| match self.mode {
                VocabularyMode::Exact => self.canonical.get(&fold(m.as_str())).cloned(),
                VocabularyMode::Line => {
                    let start = text[..m.start()].rfind('\n').map_or(0, |i| i + 1);
                    let end = text[m.end()..].find('\n').map_or(text.len(), |i| m.end() + i);
                    Some(text[start..end].to_string())
                }
            })
            .collect()
    }
}

// ── Pattern ──────────────────────────────────────────────────────────────

/// A fixed-format token, independent of labels.
#[derive(Debug, Clone)]
pub struct Pattern {
    re: Regex,
    group: usize,
}

impl Pattern {
    /// Capture group 1 of `re` (or the whole match if it has no groups).
    pub fn new(re: &Regex) -> Self {
        let group = if re.captures_len() > 1 { 1 } else { 0 };
        Self {
            re: re.clone(),
            group,
        }
    }
}

impl Strategy for Pattern {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn candidates(&self, input: &SearchInput<'_>) -> Vec<String> {
        self.re
            .captures_iter(input.text)
            .filter_map(|c| c.get(self.group))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

// ── E-mail ───────────────────────────────────────────────────────────────

/// E-mail addresses, unmasking `name[at]domain[dot]in` first.
#[derive(Debug, Clone)]
pub struct MaskedEmail {
    re: Regex,
}

impl MaskedEmail {
    pub fn new(re: &Regex) -> Self {
        Self { re: re.clone() }
    }
}

impl Strategy for MaskedEmail {
    fn name(&self) -> &'static str {
        "email"
    }

    fn candidates(&self, input: &SearchInput<'_>) -> Vec<String> {
        let unmasked = repair::deobfuscate_email(input.text);
        self.re
            .find_iter(&unmasked)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

// ── Derived: year ────────────────────────────────────────────────────────

/// The four-digit year inside the contract date extracted earlier.
#[derive(Debug, Clone)]
pub struct YearOf {
    re: Regex,
}

impl YearOf {
    pub fn new(year: &Regex) -> Self {
        Self { re: year.clone() }
    }
}

impl Strategy for YearOf {
    fn name(&self) -> &'static str {
        "year-of-date"
    }

    fn candidates(&self, input: &SearchInput<'_>) -> Vec<String> {
        input
            .contract_date
            .and_then(|d| self.re.find(d))
            .map(|m| vec![m.as_str().to_string()])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str) -> SearchInput<'_> {
        SearchInput {
            text,
            contract_date: None,
        }
    }

    fn stops() -> Arc<StopTokens> {
        Arc::new(StopTokens::new(&["Email ID", "Contact No.", "GSTIN", "Brand"]).unwrap())
    }

    #[test]
    fn inline_label_with_and_without_separator() {
        let s = InlineLabel::new(&["Designation"], stops()).unwrap();
        assert_eq!(
            s.candidates(&input("Designation : Chief Medical Superintendent")),
            vec!["Chief Medical Superintendent"]
        );
        assert_eq!(
            s.candidates(&input("Designation Store Officer")),
            vec!["Store Officer"]
        );
    }

    #[test]
    fn inline_label_stops_at_next_label() {
        let s = InlineLabel::new(&["Contact No."], stops()).unwrap();
        assert_eq!(
            s.candidates(&input("Contact No. : 9876543210 Email ID : a@x.com")),
            vec!["9876543210 "]
        );
    }

    #[test]
    fn inline_label_is_line_anchored() {
        let s = InlineLabel::new(&["Name"], stops()).unwrap();
        assert!(s.candidates(&input("Organisation Name : District Hospital")).is_empty());
        assert_eq!(s.candidates(&input("  Name : Dr. A Singh")), vec!["Dr. A Singh"]);
    }

    #[test]
    fn inline_label_prefers_longest_label() {
        let s = InlineLabel::new(&["Unit", "Unit Price (INR)"], stops()).unwrap();
        assert_eq!(s.candidates(&input("Unit Price (INR) : 24.8")), vec!["24.8"]);
    }

    #[test]
    fn inline_anywhere_needs_separator() {
        let s = InlineLabel::anywhere(&["GSTIN"], stops()).unwrap();
        assert_eq!(
            s.candidates(&input("Seller GSTIN: 09ABCDE1234F1Z5")),
            vec!["09ABCDE1234F1Z5"]
        );
        assert!(s.candidates(&input("GSTIN details follow")).is_empty());
    }

    #[test]
    fn next_line_takes_following_line() {
        let s = NextLine::new(&["Organisation Name"], stops()).unwrap();
        assert_eq!(
            s.candidates(&input("Organisation Name\nDistrict Hospital Sultanpur\n")),
            vec!["District Hospital Sultanpur"]
        );
        assert!(s
            .candidates(&input("Organisation Name : X\nY"))
            .is_empty());
        assert!(s.candidates(&input("Organisation Name")).is_empty());
    }

    #[test]
    fn vocabulary_exact_returns_canonical_entry() {
        let entries = vec!["Uttar Pradesh".to_string(), "Bihar".to_string()];
        let s = VocabularyMatch::new(&entries, VocabularyMode::Exact).unwrap();
        assert_eq!(
            s.candidates(&input("Address: Gaya, BIHAR-823001, near UTTAR  PRADESH border")),
            vec!["Bihar", "Uttar Pradesh"]
        );
    }

    #[test]
    fn vocabulary_line_returns_whole_line() {
        let entries = vec!["District Hospital".to_string()];
        let s = VocabularyMatch::new(&entries, VocabularyMode::Line).unwrap();
        assert_eq!(
            s.candidates(&input("Office Zone : Sultanpur\nDistrict Hospital Sultanpur\nX")),
            vec!["District Hospital Sultanpur"]
        );
    }

    #[test]
    fn empty_vocabulary_never_matches() {
        let s = VocabularyMatch::new(&[], VocabularyMode::Exact).unwrap();
        assert!(s.candidates(&input("anything")).is_empty());
    }

    #[test]
    fn pattern_uses_first_group() {
        let re = Regex::new(r"(GEMC-\d+)").unwrap();
        let s = Pattern::new(&re);
        assert_eq!(
            s.candidates(&input("Contract No: GEMC-511687781234567 dated")),
            vec!["GEMC-511687781234567"]
        );
    }

    #[test]
    fn masked_email_is_found() {
        let re = Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap();
        let s = MaskedEmail::new(&re);
        assert_eq!(
            s.candidates(&input("Email ID : cms-sul[at]up[dot]gov[dot]in")),
            vec!["cms-sul@up.gov.in"]
        );
    }

    #[test]
    fn year_of_date() {
        let s = YearOf::new(&Regex::new(r"(?:19|20)\d{2}").unwrap());
        let with_date = SearchInput {
            text: "",
            contract_date: Some("12-Jan-2024"),
        };
        assert_eq!(s.candidates(&with_date), vec!["2024"]);
        assert!(s.candidates(&input("2023")).is_empty());
    }
}
