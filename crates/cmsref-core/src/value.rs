//! # Field Values
//!
//! Typed values produced by normalization. Decimals are exact and keep the
//! scale they were written with; the row hasher later renders them at the
//! contract-declared scale.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// Natural-key text of an empty modifier list.
pub const NULL_MODIFIER_KEY: &str = "null";

/// An ordered list of procedure modifiers and its natural-key form.
///
/// Order is preserved exactly as written in the source: `"26,TC"` and
/// `"TC,26"` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModifierSet {
    modifiers: Vec<String>,
    modifier_key: String,
}

impl ModifierSet {
    /// The empty modifier list, keyed as `"null"`.
    pub fn empty() -> Self {
        Self {
            modifiers: Vec::new(),
            modifier_key: NULL_MODIFIER_KEY.to_string(),
        }
    }

    /// Build from already-trimmed, non-empty tokens in source order.
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        if tokens.is_empty() {
            return Self::empty();
        }
        let modifier_key = tokens.join(",");
        Self {
            modifiers: tokens,
            modifier_key,
        }
    }

    /// Modifiers in source order.
    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    /// Comma-joined key, or `"null"` when empty.
    pub fn modifier_key(&self) -> &str {
        &self.modifier_key
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }
}

impl Serialize for ModifierSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.modifiers.len()))?;
        for m in &self.modifiers {
            seq.serialize_element(m)?;
        }
        seq.end()
    }
}

/// A decoded, normalized column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Absent or blank.
    Null,
    /// Free or coded text, already right-trimmed and case-normalized.
    Text(String),
    /// Exact decimal with its literal (or conformed) scale.
    Decimal(Decimal),
    /// Whole number.
    Integer(i64),
    /// Calendar date.
    Date(NaiveDate),
    /// Ordered modifier list.
    Modifiers(ModifierSet),
}

impl FieldValue {
    /// Whether the value is null. An empty modifier list is not null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Decimal content, if this is a decimal value.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Modifier list, if this is a modifier value.
    pub fn as_modifiers(&self) -> Option<&ModifierSet> {
        match self {
            Self::Modifiers(m) => Some(m),
            _ => None,
        }
    }

    /// Text used when this value takes part in a natural key or a
    /// reference-set lookup.
    pub fn key_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Decimal(d) => d.normalize().to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Modifiers(m) => m.modifier_key().to_string(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            // Strings keep the scale: 0.00 stays "0.00".
            Self::Decimal(d) => serializer.serialize_str(&d.to_string()),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Self::Modifiers(m) => m.serialize(serializer),
        }
    }
}
