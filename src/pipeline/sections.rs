//! Section extraction: slice normalised text into labelled zones.
//!
//! A zone is the text strictly between the first occurrence of its start
//! label and the nearest following occurrence of any of its end labels.
//! Labels match case-insensitively and with any whitespace between words.

use crate::config::{ZoneDefinition, ZoneSet};
use crate::error::ContractError;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

/// Compiled matcher for one [`ZoneDefinition`].
#[derive(Debug, Clone)]
pub struct Zone {
    name: String,
    start: Regex,
    ends: Vec<Regex>,
}

impl Zone {
    pub fn new(def: &ZoneDefinition) -> Result<Self, ContractError> {
        Ok(Self {
            name: def.start.clone(),
            start: label_regex(&def.start)?,
            ends: def
                .ends
                .iter()
                .map(|e| label_regex(e))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Slice of `text` inside this zone; empty when the start label is absent.
    ///
    /// When no end label follows, the zone runs to the end of the text.
    pub fn extract<'t>(&self, text: &'t str) -> &'t str {
        let Some(start) = self.start.find(text) else {
            debug!("Zone '{}': start label absent", self.name);
            return "";
        };
        let rest = &text[start.end()..];
        let end = self
            .ends
            .iter()
            .filter_map(|re| re.find(rest))
            .map(|m| m.start())
            .min()
            .unwrap_or(rest.len());
        rest[..end].trim()
    }
}

/// Extract one zone without keeping the compiled matcher.
pub fn extract_zone<'t>(text: &'t str, def: &ZoneDefinition) -> &'t str {
    match Zone::new(def) {
        Ok(zone) => zone.extract(text),
        Err(e) => {
            warn!("{}", e);
            ""
        }
    }
}

/// Matchers for the four contract zones.
#[derive(Debug, Clone)]
pub struct Zones {
    pub organisation: Zone,
    pub buyer: Zone,
    pub seller: Zone,
    pub product: Zone,
}

impl Zones {
    pub fn new(set: &ZoneSet) -> Result<Self, ContractError> {
        Ok(Self {
            organisation: Zone::new(&set.organisation)?,
            buyer: Zone::new(&set.buyer)?,
            seller: Zone::new(&set.seller)?,
            product: Zone::new(&set.product)?,
        })
    }

    /// Slice `text` into all four zones at once.
    pub fn slice<'t>(&self, text: &'t str) -> Sections<'t> {
        Sections {
            full: text,
            organisation: self.organisation.extract(text),
            buyer: self.buyer.extract(text),
            seller: self.seller.extract(text),
            product: self.product.extract(text),
        }
    }
}

/// One document's zones, borrowed from its normalised text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sections<'t> {
    pub full: &'t str,
    pub organisation: &'t str,
    pub buyer: &'t str,
    pub seller: &'t str,
    pub product: &'t str,
}

/// Which slice of the document a field is searched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Full,
    Organisation,
    Buyer,
    Seller,
    Product,
}

impl<'t> Sections<'t> {
    /// Text for `scope`, falling back to the full document when the zone is
    /// empty.
    pub fn scoped(&self, scope: Scope) -> &'t str {
        let zone = match scope {
            Scope::Full => return self.full,
            Scope::Organisation => self.organisation,
            Scope::Buyer => self.buyer,
            Scope::Seller => self.seller,
            Scope::Product => self.product,
        };
        if zone.is_empty() {
            self.full
        } else {
            zone
        }
    }
}

fn label_regex(label: &str) -> Result<Regex, ContractError> {
    let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return Err(ContractError::InvalidConfig(
            "zone labels must not be blank".into(),
        ));
    }
    RegexBuilder::new(&words.join(r"\s+"))
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|e| ContractError::InvalidConfig(format!("zone label {label:?}: {e}")))
}
