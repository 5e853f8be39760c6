//! # Error Types
//!
//! Decoding is infallible on row content: bad rows become findings. The
//! errors here cover input that cannot be read as a table at all, and the
//! per-value failures the normalizers turn into findings.

use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Input that cannot be decoded.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The delimited input has no header line.
    #[error("delimited input has no header row")]
    MissingHeader,

    /// No header column maps to a contract column.
    #[error("no header column matches contract {dataset}; saw [{}]", .headers.join(", "))]
    NoMatchingColumns {
        /// Contract dataset.
        dataset: String,
        /// Canonicalized header names.
        headers: Vec<String>,
    },

    /// The CSV reader failed on the header.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// A single value that could not be converted to its column type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Not an exact decimal literal.
    #[error("not a decimal: {0:?}")]
    InvalidDecimal(String),

    /// A decimal literal with more digits than an exact decimal can hold.
    #[error("decimal has more than 28 significant digits or decimal places: {0:?}")]
    DecimalOverflow(String),

    /// Not a base-10 integer.
    #[error("not an integer: {0:?}")]
    InvalidInteger(String),

    /// Not a date in any accepted format.
    #[error("not a date (YYYY-MM-DD, YYYYMMDD, or MM/DD/YYYY): {0:?}")]
    InvalidDate(String),
}

impl NormalizeError {
    /// Structural finding rule id for this failure.
    pub fn rule_id(&self) -> &'static str {
        match self {
            Self::InvalidDecimal(_) => "structural.decimal_parse",
            Self::DecimalOverflow(_) => "structural.decimal_overflow",
            Self::InvalidInteger(_) => "structural.integer_parse",
            Self::InvalidDate(_) => "structural.date_parse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_errors_have_distinct_rules() {
        let rules = [
            NormalizeError::InvalidDecimal("x".into()).rule_id(),
            NormalizeError::DecimalOverflow("x".into()).rule_id(),
            NormalizeError::InvalidInteger("x".into()).rule_id(),
            NormalizeError::InvalidDate("x".into()).rule_id(),
        ];
        assert_eq!(rules.len(), rules.iter().collect::<std::collections::BTreeSet<_>>().len());
    }

    #[test]
    fn no_matching_columns_lists_headers() {
        let err = IngestError::NoMatchingColumns {
            dataset: "cms_gpci".into(),
            headers: vec!["foo".into(), "bar".into()],
        };
        assert!(err.to_string().ends_with("[foo, bar]"));
    }
}
