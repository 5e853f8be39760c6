//! # Canonical Serialization: Deterministic Byte Production
//!
//! Defines `CanonicalBytes`, the sole construction path for bytes used in
//! digest computation across cmsref.
//!
//! ## Invariant
//!
//! The inner `Vec<u8>` is private. There are exactly two constructors:
//!
//! - [`CanonicalBytes::from_fields`]: row content. Already-rendered column
//!   values are joined with [`FIELD_DELIMITER`] (U+001F, ASCII unit
//!   separator). A value that itself contains the delimiter is rejected, so
//!   two different rows can never produce the same byte sequence by shifting
//!   content across a field boundary.
//! - [`CanonicalBytes::from_json`]: structured documents (schema contracts).
//!   Serialized with `serde_jcs` (RFC 8785): sorted keys, compact separators.
//!   Floats are rejected; exact numbers must travel as strings or integers.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Separator placed between rendered column values in a row's canonical form.
///
/// The structural validation tier rejects any text value containing this
/// character, so it can never be produced by a column value.
pub const FIELD_DELIMITER: char = '\u{1f}';

/// Bytes produced exclusively by the canonical rendering paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Join rendered column values into canonical row bytes.
    ///
    /// Field order is the caller's responsibility; the row hasher always
    /// passes values in `column_order`.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::DelimiterInValue` if any value contains
    /// [`FIELD_DELIMITER`].
    pub fn from_fields<I, S>(fields: I) -> Result<Self, CanonicalizationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = String::new();
        for (index, field) in fields.into_iter().enumerate() {
            let field = field.as_ref();
            if field.contains(FIELD_DELIMITER) {
                return Err(CanonicalizationError::DelimiterInValue { index });
            }
            if index > 0 {
                out.push(FIELD_DELIMITER);
            }
            out.push_str(field);
        }
        Ok(Self(out.into_bytes()))
    }

    /// Canonicalize any serializable value as RFC 8785 JSON.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::FloatRejected` if the value contains a
    /// non-integer number, or `SerializationFailed` if serialization fails.
    pub fn from_json(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Joining is deterministic for any delimiter-free input.
        #[test]
        fn from_fields_deterministic(fields in prop::collection::vec("[a-zA-Z0-9 .,_-]{0,12}", 0..16)) {
            let a = CanonicalBytes::from_fields(&fields).unwrap();
            let b = CanonicalBytes::from_fields(&fields).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        /// Splitting the canonical bytes on the delimiter recovers the fields.
        #[test]
        fn from_fields_is_injective(fields in prop::collection::vec("[a-zA-Z0-9 .,_-]{0,12}", 1..16)) {
            let cb = CanonicalBytes::from_fields(&fields).unwrap();
            let text = std::str::from_utf8(cb.as_bytes()).unwrap();
            let split: Vec<&str> = text.split(FIELD_DELIMITER).collect();
            prop_assert_eq!(split, fields.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
