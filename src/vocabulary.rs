//! Curated domain vocabulary: state names, department names, organisation and
//! product name fragments, and "no value" tokens.
//!
//! The lists are configuration data, not pipeline logic. A built-in copy is
//! compiled from `data/vocabulary.toml`; callers can replace any table with
//! their own via [`Vocabulary::from_toml_str`] or [`Vocabulary::load`].
//! Tables missing from an override file keep their built-in entries.

use crate::error::ContractError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

const BUILTIN_TOML: &str = include_str!("../data/vocabulary.toml");

static BUILTIN: Lazy<Vocabulary> = Lazy::new(|| match parse_file(BUILTIN_TOML) {
    Ok(file) => file.into_vocabulary(&Vocabulary::empty()),
    Err(e) => {
        warn!("Built-in vocabulary is malformed, using an empty one: {}", e);
        Vocabulary::empty()
    }
});

/// Domain vocabulary consulted by the field extractor and record assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// State and union-territory names.
    pub states: Vec<String>,
    /// Canonical department names.
    pub departments: Vec<String>,
    /// Fragments identifying an organisation-name line.
    pub organisation_fragments: Vec<String>,
    /// Fragments identifying a product-name line.
    pub product_fragments: Vec<String>,
    /// Tokens that stand for "no value".
    pub non_values: Vec<String>,
}

/// On-disk shape: every table optional so overrides can be partial.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VocabularyFile {
    states: Option<Vec<String>>,
    departments: Option<Vec<String>>,
    organisation_fragments: Option<Vec<String>>,
    product_fragments: Option<Vec<String>>,
    non_values: Option<Vec<String>>,
}

impl VocabularyFile {
    fn into_vocabulary(self, base: &Vocabulary) -> Vocabulary {
        Vocabulary {
            states: self.states.unwrap_or_else(|| base.states.clone()),
            departments: self.departments.unwrap_or_else(|| base.departments.clone()),
            organisation_fragments: self
                .organisation_fragments
                .unwrap_or_else(|| base.organisation_fragments.clone()),
            product_fragments: self
                .product_fragments
                .unwrap_or_else(|| base.product_fragments.clone()),
            non_values: self.non_values.unwrap_or_else(|| base.non_values.clone()),
        }
    }
}

fn parse_file(s: &str) -> Result<VocabularyFile, toml::de::Error> {
    toml::from_str(s)
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

impl Vocabulary {
    /// The vocabulary shipped with the crate.
    pub fn builtin() -> &'static Vocabulary {
        &BUILTIN
    }

    /// A vocabulary with every table empty.
    pub fn empty() -> Self {
        Self {
            states: Vec::new(),
            departments: Vec::new(),
            organisation_fragments: Vec::new(),
            product_fragments: Vec::new(),
            non_values: Vec::new(),
        }
    }

    /// Parse a TOML override. Tables absent from `s` keep the built-in entries.
    pub fn from_toml_str(s: &str) -> Result<Self, ContractError> {
        let file = parse_file(s).map_err(|e| ContractError::InvalidVocabulary {
            source_name: "<string>".into(),
            detail: e.to_string(),
        })?;
        Ok(file.into_vocabulary(Self::builtin()))
    }

    /// Read and parse a TOML override from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ContractError::InputNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ContractError::InvalidVocabulary {
                    source_name: path.display().to_string(),
                    detail: e.to_string(),
                }
            }
        })?;
        let file = parse_file(&contents).map_err(|e| ContractError::InvalidVocabulary {
            source_name: path.display().to_string(),
            detail: e.to_string(),
        })?;
        debug!("Loaded vocabulary override from {}", path.display());
        Ok(file.into_vocabulary(Self::builtin()))
    }

    /// True when `value` is exactly a state name (case-insensitive).
    pub fn is_state(&self, value: &str) -> bool {
        let v = value.trim();
        self.states.iter().any(|s| s.eq_ignore_ascii_case(v))
    }

    /// True when `value` is one of the "no value" tokens (case-insensitive).
    pub fn is_non_value(&self, value: &str) -> bool {
        let v = value.trim();
        self.non_values.iter().any(|n| n.eq_ignore_ascii_case(v))
    }

    /// Remove one trailing state name (and separating punctuation) from `value`.
    ///
    /// `"Health & Family Welfare Department Uttar Pradesh"` becomes
    /// `"Health & Family Welfare Department"`. A value that *is* a state name
    /// is returned unchanged.
    pub fn strip_state_suffix<'a>(&self, value: &'a str) -> &'a str {
        let trimmed = value.trim_end();
        let lower = trimmed.to_ascii_lowercase();
        // Longest first so "West Bengal" wins over a hypothetical "Bengal".
        let mut states: Vec<&String> = self.states.iter().collect();
        states.sort_by_key(|s| std::cmp::Reverse(s.len()));
        for state in states {
            let st = state.to_ascii_lowercase();
            if lower.len() > st.len() && lower.ends_with(&st) {
                let head = &trimmed[..trimmed.len() - st.len()];
                // Only a whole-word suffix counts.
                if head.ends_with(|c: char| c.is_whitespace() || c == ',' || c == '-') {
                    return head.trim_end_matches(|c: char| {
                        c.is_whitespace() || c == ',' || c == '-'
                    });
                }
            }
        }
        trimmed
    }
}
