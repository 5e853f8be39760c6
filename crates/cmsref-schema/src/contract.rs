//! # Schema Contracts
//!
//! A contract is the formal definition of one dataset version: column
//! types, numeric precision, natural keys, and which columns take part in
//! the row content hash.
//!
//! ## Invariant
//!
//! `column_order` is exactly `columns − hash_metadata_exclusions`, in hash
//! order, with no duplicates. [`SchemaContract::well_formedness_problems`]
//! checks this together with the other cross-field rules; the store refuses
//! to hand out a contract that fails.

use std::collections::{BTreeMap, BTreeSet};

use cmsref_core::{sha256_digest, CanonicalBytes, ContentDigest, CoreError};
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Free or coded text.
    String,
    /// Exact decimal rendered at the contract scale.
    Decimal,
    /// Signed integer.
    Integer,
    /// Calendar date, rendered `YYYY-MM-DD`.
    Date,
    /// Comma-separated, order-preserving modifier codes.
    ModifierList,
}

impl ColumnType {
    /// Decimal or integer.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Decimal | Self::Integer)
    }

    /// Wire name, as written in definition files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Decimal => "decimal",
            Self::Integer => "integer",
            Self::Date => "date",
            Self::ModifierList => "modifier_list",
        }
    }
}

/// What to do with a decimal written at a finer scale than the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Excess scale is a structural finding.
    #[default]
    Unnecessary,
    /// Round half away from zero.
    HalfUp,
    /// Banker's rounding.
    HalfEven,
    /// Truncate toward zero.
    Down,
}

impl RoundingMode {
    /// The `rust_decimal` strategy, or `None` when rounding is forbidden.
    pub fn strategy(self) -> Option<RoundingStrategy> {
        match self {
            Self::Unnecessary => None,
            Self::HalfUp => Some(RoundingStrategy::MidpointAwayFromZero),
            Self::HalfEven => Some(RoundingStrategy::MidpointNearestEven),
            Self::Down => Some(RoundingStrategy::ToZero),
        }
    }
}

/// Case normalization applied to coded text before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Casing {
    /// `"ab12"` → `"AB12"`
    Upper,
    /// `"AB12"` → `"ab12"`
    Lower,
    /// `"NEW  YORK"` → `"New York"`
    Title,
}

/// Per-column rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    /// Logical type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether null (blank) is permitted.
    #[serde(default)]
    pub nullable: bool,
    /// Regex every non-null value must match. For modifier lists it applies
    /// to each modifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Closed whitelist of permitted values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    /// Case normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casing: Option<Casing>,
    /// Maximum total digits at contract scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Digits after the decimal point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Handling of excess scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding_mode: Option<RoundingMode>,
    /// Step every value must be an exact multiple of.
    #[serde(rename = "multipleOf", default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Decimal>,
    /// Plausibility floor (exclusive).
    #[serde(rename = "exclusiveMinimum", default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Decimal>,
    /// Plausibility ceiling (exclusive).
    #[serde(rename = "exclusiveMaximum", default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Decimal>,
}

impl ColumnSpec {
    /// A bare column of the given type.
    pub fn new(column_type: ColumnType, nullable: bool) -> Self {
        Self {
            column_type,
            nullable,
            pattern: None,
            allowed_values: None,
            casing: None,
            precision: None,
            scale: None,
            rounding_mode: None,
            multiple_of: None,
            exclusive_minimum: None,
            exclusive_maximum: None,
        }
    }

    /// Declared rounding mode, defaulting to [`RoundingMode::Unnecessary`].
    pub fn rounding(&self) -> RoundingMode {
        self.rounding_mode.unwrap_or_default()
    }

    /// Whether any numeric-only attribute is set.
    fn has_numeric_attributes(&self) -> bool {
        self.precision.is_some()
            || self.multiple_of.is_some()
            || self.exclusive_minimum.is_some()
            || self.exclusive_maximum.is_some()
    }
}

/// Indicator-gated nullability: when `indicator_column` holds one of
/// `indicator_values`, every column in `dependent_columns` must be null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRule {
    /// Finding rule id, e.g. `content.na_indicator_requires_null_pe`.
    pub rule_id: String,
    /// Column carrying the indicator.
    pub indicator_column: String,
    /// Values that trigger the rule.
    pub indicator_values: Vec<String>,
    /// Columns that must then be null.
    pub dependent_columns: Vec<String>,
}

/// Referential existence check against a caller-injected value set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceCheck {
    /// Column whose non-null values must exist in the set.
    pub column: String,
    /// Name of the reference set supplied at run time.
    pub reference_set: String,
}

/// One dataset version's contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaContract {
    /// Dataset identifier, e.g. `cms_pprrvu`.
    pub dataset_name: String,
    /// Contract version, e.g. `1.1`.
    pub version: String,
    /// Version of the hash composition rules.
    pub hash_spec_version: String,
    /// Every column, data and metadata.
    pub columns: BTreeMap<String, ColumnSpec>,
    /// Data columns in hash order.
    pub column_order: Vec<String>,
    /// Columns identifying a row within a release.
    pub natural_keys: Vec<String>,
    /// Pipeline-injected columns left out of the row hash.
    pub hash_metadata_exclusions: BTreeSet<String>,
    /// Version notes, oldest first.
    pub changelog: Vec<String>,
    /// Indicator-gated nullability rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_rules: Vec<ContentRule>,
    /// Referential existence checks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ReferenceCheck>,
}

impl SchemaContract {
    /// Look up a column.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.get(name)
    }

    /// Whether `name` is a pipeline-injected metadata column.
    pub fn is_metadata(&self, name: &str) -> bool {
        self.hash_metadata_exclusions.contains(name)
    }

    /// Data columns (`columns − hash_metadata_exclusions`), sorted by name.
    pub fn data_columns(&self) -> BTreeSet<&str> {
        self.columns
            .keys()
            .map(String::as_str)
            .filter(|name| !self.is_metadata(name))
            .collect()
    }

    /// Data columns paired with their specs, in hash order.
    ///
    /// Names in `column_order` with no spec are skipped; a well-formed
    /// contract has none.
    pub fn ordered_columns(&self) -> impl Iterator<Item = (&str, &ColumnSpec)> {
        self.column_order
            .iter()
            .filter_map(|name| self.columns.get(name).map(|spec| (name.as_str(), spec)))
    }

    /// Fingerprint of the contract: SHA-256 over its JCS canonical JSON.
    ///
    /// # Errors
    ///
    /// Only if serialization fails, which the contract types never cause.
    pub fn digest(&self) -> std::result::Result<ContentDigest, CoreError> {
        let canonical = CanonicalBytes::from_json(self)?;
        Ok(sha256_digest(&canonical))
    }

    /// Every cross-field rule this contract breaks. Empty when well-formed.
    pub fn well_formedness_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let data = self.data_columns();

        let mut seen = BTreeSet::new();
        for name in &self.column_order {
            if !seen.insert(name.as_str()) {
                problems.push(format!("column_order lists '{name}' more than once"));
            }
            if self.is_metadata(name) {
                problems.push(format!(
                    "column_order includes metadata column '{name}' from hash_metadata_exclusions"
                ));
            } else if !self.columns.contains_key(name) {
                problems.push(format!("column_order names undeclared column '{name}'"));
            }
        }
        for name in &data {
            if !seen.contains(name) {
                problems.push(format!("data column '{name}' is missing from column_order"));
            }
        }
        for name in &self.hash_metadata_exclusions {
            if !self.columns.contains_key(name) {
                problems.push(format!(
                    "hash_metadata_exclusions names undeclared column '{name}'"
                ));
            }
        }

        for key in &self.natural_keys {
            if !data.contains(key.as_str()) {
                problems.push(format!("natural key '{key}' is not a data column"));
            }
        }

        for (name, spec) in &self.columns {
            column_problems(name, spec, &mut problems);
        }
        let modifier_columns = self
            .columns
            .values()
            .filter(|spec| spec.column_type == ColumnType::ModifierList)
            .count();
        if modifier_columns > 1 {
            problems.push(format!(
                "{modifier_columns} modifier_list columns declared; at most one is supported"
            ));
        }

        for rule in &self.content_rules {
            if !data.contains(rule.indicator_column.as_str()) {
                problems.push(format!(
                    "content rule {} uses unknown indicator column '{}'",
                    rule.rule_id, rule.indicator_column
                ));
            }
            for dep in &rule.dependent_columns {
                match self.columns.get(dep) {
                    Some(spec) if !self.is_metadata(dep) && !spec.nullable => {
                        problems.push(format!(
                            "content rule {} requires non-nullable column '{dep}' to be null",
                            rule.rule_id
                        ));
                    }
                    Some(_) if !self.is_metadata(dep) => {}
                    _ => problems.push(format!(
                        "content rule {} uses unknown dependent column '{dep}'",
                        rule.rule_id
                    )),
                }
            }
        }

        for reference in &self.references {
            if !data.contains(reference.column.as_str()) {
                problems.push(format!(
                    "reference check against '{}' uses unknown column '{}'",
                    reference.reference_set, reference.column
                ));
            }
        }

        problems
    }

    /// Fail with [`SchemaError::MalformedContract`] unless well-formed.
    pub fn check_well_formed(&self) -> Result<()> {
        let problems = self.well_formedness_problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MalformedContract {
                dataset: self.dataset_name.clone(),
                version: self.version.clone(),
                problems,
            })
        }
    }
}

fn column_problems(name: &str, spec: &ColumnSpec, problems: &mut Vec<String>) {
    let ty = spec.column_type;

    if spec.has_numeric_attributes() && !ty.is_numeric() {
        problems.push(format!(
            "column '{name}' is {} but carries numeric attributes",
            ty.as_str()
        ));
    }
    if (spec.scale.is_some() || spec.rounding_mode.is_some()) && ty != ColumnType::Decimal {
        problems.push(format!(
            "column '{name}' is {} but declares scale or rounding_mode",
            ty.as_str()
        ));
    }
    if ty == ColumnType::Decimal && spec.scale.is_none() {
        problems.push(format!("decimal column '{name}' must declare a scale"));
    }
    if let (Some(precision), Some(scale)) = (spec.precision, spec.scale) {
        if scale > precision {
            problems.push(format!(
                "column '{name}' has scale {scale} greater than precision {precision}"
            ));
        }
    }
    if let Some(step) = spec.multiple_of {
        if step <= Decimal::ZERO {
            problems.push(format!("column '{name}' has non-positive multipleOf {step}"));
        }
    }
    if let (Some(lo), Some(hi)) = (spec.exclusive_minimum, spec.exclusive_maximum) {
        if lo >= hi {
            problems.push(format!(
                "column '{name}' has empty bounds: exclusiveMinimum {lo} >= exclusiveMaximum {hi}"
            ));
        }
    }
    if let Some(pattern) = &spec.pattern {
        if let Err(e) = Regex::new(pattern) {
            problems.push(format!("column '{name}' pattern does not compile: {e}"));
        }
    }
    if let Some(values) = &spec.allowed_values {
        if values.is_empty() {
            problems.push(format!("column '{name}' has an empty enum"));
        }
    }
}
