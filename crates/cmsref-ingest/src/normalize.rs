//! # Normalizers
//!
//! Pure conversions from raw decoded text to typed [`FieldValue`]s.
//!
//! ## Invariants
//!
//! - Decimals are exact and keep their literal scale: `"0.00"` parses to a
//!   value with scale 2. Conformance to the contract scale happens in the
//!   structural validation tier, not here.
//! - Modifier lists keep source order; the key of an empty list is
//!   `"null"`.
//! - A value that fails to parse becomes a structural finding and the field
//!   is recorded as null, so the remaining checks still run.

use std::str::FromStr;

use cmsref_core::{parse_date, FieldValue, ModifierSet, ValidationFinding};
use cmsref_schema::{Casing, ColumnSpec, ColumnType, SchemaContract};
use rust_decimal::Decimal;

use crate::decode::DecodedRow;
use crate::error::NormalizeError;

/// Parse an exact decimal. Blank input is `Ok(None)`.
///
/// A leading `+` and surrounding whitespace are accepted; exponents and
/// thousands separators are not.
pub fn parse_decimal(s: &str) -> Result<Option<Decimal>, NormalizeError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let well_formed = !body.is_empty()
        && body
            .strip_prefix('-')
            .unwrap_or(body)
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.')
        && body.chars().filter(|&c| c == '.').count() <= 1
        && body.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(NormalizeError::InvalidDecimal(s.to_string()));
    }
    if !fits_exactly(body) {
        return Err(NormalizeError::DecimalOverflow(s.to_string()));
    }
    Decimal::from_str(body)
        .map(Some)
        .map_err(|_| NormalizeError::InvalidDecimal(s.to_string()))
}

/// Digits a [`Decimal`] literal may carry without `from_str` rounding it.
const MAX_DECIMAL_DIGITS: usize = 28;

/// Whether a well-formed literal parses without rounding: at most 28
/// significant digits and at most 28 decimal places.
fn fits_exactly(body: &str) -> bool {
    let unsigned = body.strip_prefix('-').unwrap_or(body);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits = format!("{int_part}{frac_part}");
    frac_part.len() <= MAX_DECIMAL_DIGITS && digits.trim_start_matches('0').len() <= MAX_DECIMAL_DIGITS
}

/// Parse a base-10 integer. Blank input is `Ok(None)`.
pub fn parse_integer(s: &str) -> Result<Option<i64>, NormalizeError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| NormalizeError::InvalidInteger(s.to_string()))
}

/// Split a comma-separated modifier list, trimming tokens and dropping
/// empty ones. Order is preserved.
pub fn normalize_modifiers(s: &str) -> ModifierSet {
    let tokens: Vec<String> = s
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    ModifierSet::from_tokens(tokens)
}

/// Collapse whitespace runs and apply `casing`. Empty stays empty.
pub fn normalize_casing(s: &str, casing: Casing) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    match casing {
        Casing::Upper => collapsed.to_uppercase(),
        Casing::Lower => collapsed.to_lowercase(),
        Casing::Title => title_case(&collapsed),
    }
}

/// Uppercase each letter that follows a non-alphanumeric, lowercase the rest:
/// `"WINSTON-SALEM"` → `"Winston-Salem"`, `"ST. LOUIS"` → `"St. Louis"`.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = !c.is_numeric();
        }
    }
    out
}

fn normalize_field(raw: Option<&str>, spec: &ColumnSpec) -> Result<FieldValue, NormalizeError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());

    let value = match (spec.column_type, raw) {
        (ColumnType::ModifierList, raw) => {
            let set = raw.map(normalize_modifiers).unwrap_or_else(ModifierSet::empty);
            FieldValue::Modifiers(match spec.casing {
                Some(casing) => ModifierSet::from_tokens(
                    set.modifiers()
                        .iter()
                        .map(|m| normalize_casing(m, casing))
                        .collect(),
                ),
                None => set,
            })
        }
        (_, None) => FieldValue::Null,
        (ColumnType::String, Some(raw)) => FieldValue::Text(match spec.casing {
            Some(casing) => normalize_casing(raw, casing),
            None => raw.to_string(),
        }),
        (ColumnType::Decimal, Some(raw)) => {
            parse_decimal(raw)?.map_or(FieldValue::Null, FieldValue::Decimal)
        }
        (ColumnType::Integer, Some(raw)) => {
            parse_integer(raw)?.map_or(FieldValue::Null, FieldValue::Integer)
        }
        (ColumnType::Date, Some(raw)) => FieldValue::Date(
            parse_date(raw).map_err(|_| NormalizeError::InvalidDate(raw.to_string()))?,
        ),
    };
    Ok(value)
}

/// Convert a decoded row into typed values in `column_order`.
///
/// Returns the values plus the decode findings followed by one structural
/// finding per value that failed to parse.
pub fn normalize_row(
    row: &DecodedRow,
    contract: &SchemaContract,
) -> (Vec<(String, FieldValue)>, Vec<ValidationFinding>) {
    let mut findings = row.findings.clone();
    let mut values = Vec::with_capacity(contract.column_order.len());

    for (name, spec) in contract.ordered_columns() {
        let value = match normalize_field(row.field(name), spec) {
            Ok(value) => value,
            Err(e) => {
                findings.push(
                    ValidationFinding::structural(e.rule_id(), e.to_string(), row.row_num)
                        .with_column(name),
                );
                FieldValue::Null
            }
        };
        values.push((name.to_string(), value));
    }
    (values, findings)
}
