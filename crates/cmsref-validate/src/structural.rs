//! # Structural Tier
//!
//! Per-column conformance: nullability, control characters, regex
//! patterns, enum whitelists, and decimal scale/precision/`multipleOf`.
//!
//! Decimals are conformed in place. A value written at a finer scale than
//! the contract is rounded only when the column's `rounding_mode` allows it;
//! a coarser value is rescaled up, so `1.5` at scale 2 becomes `1.50`.
//!
//! Columns that already carry a decode or normalize finding are not checked
//! again, and a row rejected before field extraction gets no per-column
//! checks at all.

use std::collections::{BTreeMap, BTreeSet};

use cmsref_core::{FieldValue, ValidationFinding};
use cmsref_ingest::ParsedRecord;
use cmsref_schema::{ColumnSpec, SchemaContract};
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{Result, ValidateError};

/// Required value is null.
pub const RULE_NULL: &str = "structural.null";
/// Value contains a control character (including the hash delimiter).
pub const RULE_CONTROL_CHARACTER: &str = "structural.control_character";
/// Value does not match the column pattern.
pub const RULE_PATTERN: &str = "structural.pattern";
/// Value is outside the column enum.
pub const RULE_ENUM: &str = "structural.enum";
/// Decimal has more places than the contract scale and may not be rounded.
pub const RULE_DECIMAL_SCALE: &str = "structural.decimal_scale";
/// Decimal has more digits than the contract precision.
pub const RULE_DECIMAL_PRECISION: &str = "structural.decimal_precision";
/// Value is not a multiple of `multipleOf`.
pub const RULE_MULTIPLE_OF: &str = "structural.multiple_of";

/// Column patterns compiled once per run.
#[derive(Debug, Clone, Default)]
pub struct CompiledPatterns {
    by_column: BTreeMap<String, Regex>,
}

impl CompiledPatterns {
    /// Compile every column pattern in `contract`.
    ///
    /// # Errors
    ///
    /// [`ValidateError::Pattern`] for a pattern that does not compile.
    pub fn compile(contract: &SchemaContract) -> Result<Self> {
        let mut by_column = BTreeMap::new();
        for (name, spec) in &contract.columns {
            if let Some(pattern) = &spec.pattern {
                let regex = Regex::new(pattern).map_err(|source| ValidateError::Pattern {
                    column: name.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                by_column.insert(name.clone(), regex);
            }
        }
        Ok(Self { by_column })
    }

    /// Pattern for `column`, if it has one.
    pub fn get(&self, column: &str) -> Option<&Regex> {
        self.by_column.get(column)
    }
}

/// Run the structural tier, conforming decimals in `record` as it goes.
///
/// The result starts with the record's own decode and normalize findings.
pub fn check_structural(
    record: &mut ParsedRecord,
    contract: &SchemaContract,
    patterns: &CompiledPatterns,
) -> Vec<ValidationFinding> {
    let mut findings = record.findings.clone();
    if !record.extracted {
        return findings;
    }

    let flagged: BTreeSet<String> = findings.iter().filter_map(|f| f.column.clone()).collect();
    let mut check = ColumnCheck {
        row_num: record.row_num,
        findings: &mut findings,
    };

    for (name, spec) in contract.ordered_columns() {
        if flagged.contains(name) {
            continue;
        }
        let Some(value) = record.value(name).cloned() else {
            continue;
        };
        if let Some(conformed) = check.column(name, spec, &value, patterns.get(name)) {
            record.set_value(name, conformed);
        }
    }
    findings
}

struct ColumnCheck<'a> {
    row_num: usize,
    findings: &'a mut Vec<ValidationFinding>,
}

impl ColumnCheck<'_> {
    fn push(&mut self, rule_id: &str, column: &str, message: String) {
        self.findings.push(
            ValidationFinding::structural(rule_id, message, self.row_num).with_column(column),
        );
    }

    /// Check one value; returns the conformed value when it changed form.
    fn column(
        &mut self,
        name: &str,
        spec: &ColumnSpec,
        value: &FieldValue,
        pattern: Option<&Regex>,
    ) -> Option<FieldValue> {
        let blank = match value {
            FieldValue::Null => true,
            FieldValue::Modifiers(set) => set.is_empty(),
            _ => false,
        };
        if blank {
            if !spec.nullable {
                self.push(RULE_NULL, name, "required value is null".to_string());
            }
            return None;
        }

        match value {
            FieldValue::Text(text) => self.text(name, spec, text, pattern),
            FieldValue::Modifiers(set) => {
                for token in set.modifiers() {
                    self.text(name, spec, token, pattern);
                }
            }
            FieldValue::Decimal(d) => return self.decimal(name, spec, *d),
            FieldValue::Integer(i) => {
                self.allowed(name, spec, &i.to_string());
                self.multiple_of(name, spec, Decimal::from(*i));
            }
            FieldValue::Date(_) | FieldValue::Null => {}
        }
        None
    }

    fn text(&mut self, name: &str, spec: &ColumnSpec, text: &str, pattern: Option<&Regex>) {
        if let Some(c) = text.chars().find(|c| c.is_control()) {
            self.push(
                RULE_CONTROL_CHARACTER,
                name,
                format!("value contains control character U+{:04X}", u32::from(c)),
            );
            return;
        }
        if let Some(regex) = pattern {
            if !regex.is_match(text) {
                self.push(
                    RULE_PATTERN,
                    name,
                    format!("{text:?} does not match {}", regex.as_str()),
                );
            }
        }
        self.allowed(name, spec, text);
    }

    fn allowed(&mut self, name: &str, spec: &ColumnSpec, text: &str) {
        if let Some(values) = &spec.allowed_values {
            if !values.iter().any(|v| v == text) {
                self.push(RULE_ENUM, name, format!("{text:?} is not a permitted value"));
            }
        }
    }

    fn multiple_of(&mut self, name: &str, spec: &ColumnSpec, value: Decimal) {
        if let Some(step) = spec.multiple_of {
            if !value.checked_rem(step).is_some_and(|r| r.is_zero()) {
                self.push(
                    RULE_MULTIPLE_OF,
                    name,
                    format!("{value} is not a multiple of {step}"),
                );
            }
        }
    }

    fn decimal(&mut self, name: &str, spec: &ColumnSpec, value: Decimal) -> Option<FieldValue> {
        let scale = spec.scale?;
        let mut conformed = value;

        if conformed.scale() > scale {
            match spec.rounding().strategy() {
                Some(strategy) => conformed = conformed.round_dp_with_strategy(scale, strategy),
                None => {
                    self.push(
                        RULE_DECIMAL_SCALE,
                        name,
                        format!(
                            "{value} has {} decimal places; contract scale is {scale} and rounding is not permitted",
                            value.scale()
                        ),
                    );
                    return None;
                }
            }
        }
        conformed.rescale(scale);

        if let Some(precision) = spec.precision {
            let digits = conformed.mantissa().unsigned_abs().to_string().len();
            if digits > precision as usize {
                self.push(
                    RULE_DECIMAL_PRECISION,
                    name,
                    format!("{conformed} has {digits} digits; contract precision is {precision}"),
                );
            }
        }
        self.multiple_of(name, spec, conformed);

        Some(FieldValue::Decimal(conformed))
    }
}
