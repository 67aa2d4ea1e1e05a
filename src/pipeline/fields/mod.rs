//! Field extraction: ordered fallback chains of strategies per field.
//!
//! Each canonical field has one [`FieldRule`]: a list of strategies tried in
//! order, the transforms applied to every candidate, and a validator. The
//! first candidate that survives wins; when none does, the field is simply
//! absent from [`FieldMatches`] and the record assembler writes the sentinel.
//!
//! Changing how a field is found means editing its chain in [`catalog`],
//! not the evaluation loop here.

pub mod catalog;
pub mod repair;
pub mod strategies;
pub mod validate;

pub use catalog::FieldCatalog;
pub use strategies::Strategy;
pub use validate::{Transform, Validator, ValueContext};

use crate::pipeline::sections::{Scope, Sections};
use crate::record::CanonicalField;
use std::collections::BTreeMap;
use tracing::trace;

/// What a strategy searches: a slice of the document, plus fields that were
/// already extracted and that later fields may depend on.
#[derive(Debug, Clone, Copy)]
pub struct SearchInput<'a> {
    pub text: &'a str,
    pub contract_date: Option<&'a str>,
}

/// A validated value and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub value: String,
    pub strategy: &'static str,
}

/// Validated values found in one document, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMatches {
    values: BTreeMap<CanonicalField, FieldMatch>,
}

impl FieldMatches {
    pub fn get(&self, field: CanonicalField) -> Option<&FieldMatch> {
        self.values.get(&field)
    }

    pub fn value(&self, field: CanonicalField) -> Option<&str> {
        self.values.get(&field).map(|m| m.value.as_str())
    }

    pub fn insert(&mut self, field: CanonicalField, found: FieldMatch) {
        self.values.insert(field, found);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalField, &FieldMatch)> {
        self.values.iter()
    }
}

#[derive(Debug)]
struct ScopedStrategy {
    scope: Scope,
    strategy: Box<dyn Strategy>,
}

/// The extraction chain for one canonical field.
#[derive(Debug)]
pub struct FieldRule {
    pub field: CanonicalField,
    scope: Scope,
    strategies: Vec<ScopedStrategy>,
    transforms: Vec<Transform>,
    validator: Validator,
}

impl FieldRule {
    /// A rule whose strategies search `scope` unless told otherwise.
    pub fn new(field: CanonicalField, scope: Scope) -> Self {
        Self {
            field,
            scope,
            strategies: Vec::new(),
            transforms: Vec::new(),
            validator: Validator::new(),
        }
    }

    /// Append a strategy searching the rule's scope.
    pub fn then(self, strategy: impl Strategy + 'static) -> Self {
        let scope = self.scope;
        self.then_in(scope, strategy)
    }

    /// Append a strategy searching another scope.
    pub fn then_in(mut self, scope: Scope, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(ScopedStrategy {
            scope,
            strategy: Box::new(strategy),
        });
        self
    }

    pub fn transform(mut self, t: Transform) -> Self {
        self.transforms.push(t);
        self
    }

    pub fn validate(mut self, v: Validator) -> Self {
        self.validator = v;
        self
    }

    /// Run the chain: the first candidate that survives cleanup and
    /// validation wins.
    pub fn attempt(
        &self,
        sections: &Sections<'_>,
        contract_date: Option<&str>,
        ctx: &ValueContext<'_>,
    ) -> Option<FieldMatch> {
        for entry in &self.strategies {
            let input = SearchInput {
                text: sections.scoped(entry.scope),
                contract_date,
            };
            for raw in entry.strategy.candidates(&input) {
                let Some(value) = self.clean(&raw, ctx) else {
                    continue;
                };
                match self.validator.rejection(&value, ctx.vocabulary) {
                    None => {
                        return Some(FieldMatch {
                            value,
                            strategy: entry.strategy.name(),
                        })
                    }
                    Some(reason) => trace!(
                        "{}: {} candidate {:?} rejected ({})",
                        self.field,
                        entry.strategy.name(),
                        value,
                        reason
                    ),
                }
            }
        }
        None
    }

    fn clean(&self, raw: &str, ctx: &ValueContext<'_>) -> Option<String> {
        let mut value = validate::trim_candidate(raw).to_string();
        for t in &self.transforms {
            value = validate::trim_candidate(&t.apply(&value, ctx)?).to_string();
        }
        Some(value)
    }
}
