//! # Referential Tier
//!
//! Existence checks of column values against reference sets the caller
//! supplies at run time (locality codes, MAC identifiers, and the like).
//!
//! A contract may name a set the caller did not supply. That is a run-level
//! warning, logged once per set, and never a row finding: the check is
//! skipped rather than failing every row.

use std::collections::{BTreeMap, BTreeSet};

use cmsref_core::ValidationFinding;
use cmsref_ingest::ParsedRecord;
use cmsref_schema::SchemaContract;
use serde::{Deserialize, Serialize};

/// A non-null value is absent from its reference set.
pub const RULE_UNKNOWN_VALUE: &str = "referential.unknown_value";

/// Named sets of permitted values, keyed by reference-set name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceSets(BTreeMap<String, BTreeSet<String>>);

impl ReferenceSets {
    /// No sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a set.
    pub fn insert<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(name.into(), values.into_iter().map(Into::into).collect());
    }

    /// The named set.
    pub fn get(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.0.get(name)
    }

    /// Whether `value` is in the named set. `None` when the set is absent.
    pub fn contains(&self, name: &str, value: &str) -> Option<bool> {
        self.0.get(name).map(|set| set.contains(value))
    }

    /// Number of sets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no sets.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Run the referential tier.
///
/// `missing` collects the names of sets the contract references but
/// `sets` lacks; each is logged the first time it is added.
pub fn check_referential(
    record: &ParsedRecord,
    contract: &SchemaContract,
    sets: &ReferenceSets,
    missing: &mut BTreeSet<String>,
) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    for reference in &contract.references {
        let Some(value) = record.value(&reference.column) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let text = value.key_text();
        match sets.contains(&reference.reference_set, &text) {
            Some(true) => {}
            Some(false) => findings.push(
                ValidationFinding::referential(
                    RULE_UNKNOWN_VALUE,
                    format!("{text:?} is not in reference set {}", reference.reference_set),
                    record.row_num,
                )
                .with_column(reference.column.as_str()),
            ),
            None => {
                if missing.insert(reference.reference_set.clone()) {
                    tracing::warn!(
                        dataset = %contract.dataset_name,
                        reference_set = %reference.reference_set,
                        column = %reference.column,
                        "reference set not supplied; referential check skipped"
                    );
                }
            }
        }
    }
    findings
}
