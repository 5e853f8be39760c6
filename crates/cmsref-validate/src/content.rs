//! # Content Tier
//!
//! Cross-field rules declared by the contract, exclusive plausibility
//! bounds, and duplicate natural keys within one run.
//!
//! ## Invariant
//!
//! Duplicate detection is first-seen-wins: the first row to present a
//! natural key is kept and every later row with the same key is flagged.
//! A key is registered for every row that reaches this tier, including rows
//! that fail a content rule, so a rejected first occurrence still shadows
//! later ones.

use std::collections::BTreeMap;

use cmsref_core::{FieldValue, ValidationFinding};
use cmsref_ingest::ParsedRecord;
use cmsref_schema::SchemaContract;
use rust_decimal::Decimal;

/// A value is at or beyond an exclusive bound.
pub const RULE_BOUNDS: &str = "content.bounds";
/// A natural key was already seen earlier in the run.
pub const RULE_DUPLICATE_KEY: &str = "content.duplicate_natural_key";

/// Natural keys seen so far in a run, with the row that first presented each.
#[derive(Debug, Clone, Default)]
pub struct NaturalKeyIndex {
    first_seen: BTreeMap<Vec<String>, usize>,
}

impl NaturalKeyIndex {
    /// Register `key` for `row_num`. Returns the earlier row if the key was
    /// already present.
    pub fn observe(&mut self, key: Vec<String>, row_num: usize) -> Option<usize> {
        match self.first_seen.get(&key) {
            Some(first) => Some(*first),
            None => {
                self.first_seen.insert(key, row_num);
                None
            }
        }
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    /// Whether no key has been seen.
    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}

/// The natural key of `record`, one entry per key column.
pub fn natural_key(record: &ParsedRecord, contract: &SchemaContract) -> Vec<String> {
    contract
        .natural_keys
        .iter()
        .map(|column| record.value(column).map(FieldValue::key_text).unwrap_or_default())
        .collect()
}

/// Run the content tier and register the record's natural key.
pub fn check_content(
    record: &ParsedRecord,
    contract: &SchemaContract,
    keys: &mut NaturalKeyIndex,
) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    let row_num = record.row_num;

    for rule in &contract.content_rules {
        let Some(indicator) = record.value(&rule.indicator_column) else {
            continue;
        };
        if indicator.is_null() {
            continue;
        }
        let indicator = indicator.key_text();
        if !rule.indicator_values.iter().any(|v| *v == indicator) {
            continue;
        }
        for dependent in &rule.dependent_columns {
            if !record.is_null(dependent) {
                findings.push(
                    ValidationFinding::content(
                        rule.rule_id.as_str(),
                        format!(
                            "{dependent} must be null when {} is {indicator:?}",
                            rule.indicator_column
                        ),
                        row_num,
                    )
                    .with_column(dependent.as_str()),
                );
            }
        }
    }

    for (name, spec) in contract.ordered_columns() {
        if spec.exclusive_minimum.is_none() && spec.exclusive_maximum.is_none() {
            continue;
        }
        let value = match record.value(name) {
            Some(FieldValue::Decimal(d)) => *d,
            Some(FieldValue::Integer(i)) => Decimal::from(*i),
            _ => continue,
        };
        if let Some(lo) = spec.exclusive_minimum {
            if value <= lo {
                findings.push(
                    ValidationFinding::content(
                        RULE_BOUNDS,
                        format!("{value} is not greater than {lo}"),
                        row_num,
                    )
                    .with_column(name),
                );
            }
        }
        if let Some(hi) = spec.exclusive_maximum {
            if value >= hi {
                findings.push(
                    ValidationFinding::content(
                        RULE_BOUNDS,
                        format!("{value} is not less than {hi}"),
                        row_num,
                    )
                    .with_column(name),
                );
            }
        }
    }

    if !contract.natural_keys.is_empty() {
        let key = natural_key(record, contract);
        let shown = key.join("|");
        if let Some(first) = keys.observe(key, row_num) {
            findings.push(ValidationFinding::content(
                RULE_DUPLICATE_KEY,
                format!("natural key {shown} first seen at row {first}"),
                row_num,
            ));
        }
    }

    findings
}
