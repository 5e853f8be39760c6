//! Setup errors for the validation engine.

use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, ValidateError>;

/// The engine could not be built for a contract.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// A column pattern does not compile.
    #[error("column '{column}' pattern {pattern:?} does not compile: {source}")]
    Pattern {
        /// Column name.
        column: String,
        /// Pattern text.
        pattern: String,
        /// Compiler error.
        #[source]
        source: regex::Error,
    },
}
