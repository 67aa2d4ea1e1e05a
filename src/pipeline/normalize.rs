//! Text normalisation: raw acquired text → canonical line-oriented text.
//!
//! Rules (applied in order):
//! 1. Normalise line endings (CRLF and lone CR → LF)
//! 2. Strip font-substitution markers such as `(cid:72)`
//! 3. Replace characters outside the target script with a space
//! 4. Truncate at the earliest stop phrase (legal terms, signature notices)
//! 5. Collapse runs of horizontal whitespace to one space; trim each line
//! 6. Collapse blank-line runs to a single newline
//! 7. Trim the whole text
//!
//! Every rule only removes material or shrinks whitespace, and none can
//! create input for an earlier rule, so normalising twice equals normalising
//! once.

use crate::config::PipelineConfig;
use crate::error::ContractError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::ops::Deref;
use tracing::debug;

/// Normalised document text. Immutable once built; derive new strings from it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for NormalizedText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compiled normalisation rules for one configuration.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: PipelineConfig,
    stop_phrases: Vec<Regex>,
}

impl Normalizer {
    /// Compile the stop phrases of `config`.
    ///
    /// Phrase words are matched case-insensitively with any run of whitespace
    /// between them, so a phrase broken across lines still matches.
    pub fn new(config: &PipelineConfig) -> Result<Self, ContractError> {
        let stop_phrases = config
            .stop_phrases
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|phrase| {
                let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
                Regex::new(&format!("(?i){}", words.join(r"\s+"))).map_err(|e| {
                    ContractError::InvalidConfig(format!("stop phrase {phrase:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            config: config.clone(),
            stop_phrases,
        })
    }

    /// Apply all rules to `input`.
    pub fn normalize(&self, input: &str) -> NormalizedText {
        let s = normalise_line_endings(input);
        let s = strip_cid_markers(&s);
        let s = self.strip_foreign_chars(&s);
        let s = self.truncate_at_stop_phrase(&s);
        let s = collapse_horizontal_whitespace(&s);
        let s = collapse_blank_lines(&s);
        NormalizedText(s.trim().to_string())
    }

    // ── Rule 3: Foreign characters ───────────────────────────────────────

    fn strip_foreign_chars(&self, input: &str) -> String {
        input
            .chars()
            .map(|c| {
                if c == '\n' || c == ' ' || self.config.is_target_char(c) {
                    c
                } else {
                    ' '
                }
            })
            .collect()
    }

    // ── Rule 4: Stop phrases ─────────────────────────────────────────────

    fn truncate_at_stop_phrase(&self, input: &str) -> String {
        let cut = self
            .stop_phrases
            .iter()
            .filter_map(|re| re.find(input))
            .min_by_key(|m| m.start());
        match cut {
            Some(m) => {
                debug!(
                    "Stop phrase {:?} at byte {}; dropping {} trailing bytes",
                    m.as_str(),
                    m.start(),
                    input.len() - m.start()
                );
                input[..m.start()].to_string()
            }
            None => input.to_string(),
        }
    }
}

/// Normalise `input` with the rules derived from `config`.
pub fn normalize(input: &str, config: &PipelineConfig) -> Result<NormalizedText, ContractError> {
    Ok(Normalizer::new(config)?.normalize(input))
}

// ── Rule 1: Line endings ─────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Font-substitution markers ────────────────────────────────────

static RE_CID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(cid:\d+\)").unwrap());

fn strip_cid_markers(input: &str) -> String {
    RE_CID.replace_all(input, " ").into_owned()
}

// ── Rule 5: Horizontal whitespace ────────────────────────────────────────

static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());

fn collapse_horizontal_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| RE_HSPACE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Blank lines ──────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n").into_owned()
}
