//! # Error Types
//!
//! Errors raised by the foundational types. Row-level validation problems are
//! never errors; they are [`crate::ValidationFinding`] values.

use thiserror::Error;

/// Top-level error type for `cmsref-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Date or timestamp handling failed.
    #[error("temporal error: {0}")]
    Temporal(#[from] TemporalError),

    /// A digest string was not 64 lowercase hex characters.
    #[error("invalid SHA-256 digest: {0:?} (expected 64 lowercase hex chars)")]
    InvalidDigest(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// A rendered value contained the canonical field delimiter.
    #[error("field {index} contains the canonical field delimiter U+001F")]
    DelimiterInValue {
        /// Zero-based position of the offending field.
        index: usize,
    },

    /// Float values are not permitted in canonical JSON.
    #[error("float values are not permitted in canonical representations; use a string: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in date, cycle, or timestamp handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemporalError {
    /// Cycle letter outside A–D.
    #[error("unknown release cycle {0:?} (expected A, B, C, or D)")]
    UnknownCycle(String),

    /// Quarter outside 1–4.
    #[error("quarter must be 1-4, got {0}")]
    InvalidQuarter(u32),

    /// Year outside the supported range.
    #[error("year {0} is out of range")]
    InvalidYear(i32),

    /// A mid-quarter correction date that does not fall inside the quarter.
    #[error("correction date {correction} is outside quarter {start}..={end}")]
    CorrectionOutsideQuarter {
        /// Supplied correction date.
        correction: String,
        /// Quarter start.
        start: String,
        /// Quarter end.
        end: String,
    },

    /// A date string that matched none of the accepted formats.
    #[error("unparseable date {0:?}")]
    InvalidDate(String),

    /// A timestamp string that is not RFC 3339 UTC.
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp {
        /// Input text.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}
