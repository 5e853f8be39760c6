//! # Error Types
//!
//! Setup-time failures: a definition that cannot be found, read, parsed, or
//! trusted. All of these are fatal at run start.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Error loading or checking a contract, layout, or mapping.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// No contract (or layout) exists for the requested dataset.
    #[error("no {kind} found for dataset '{dataset}': {detail}")]
    ContractNotFound {
        /// `"contract"`, `"layout"`, or `"mapping"`.
        kind: &'static str,
        /// Requested dataset.
        dataset: String,
        /// What was looked for and where.
        detail: String,
    },

    /// A contract that parses but violates its own invariants.
    #[error("contract {dataset} v{version} is malformed: {}", .problems.join("; "))]
    MalformedContract {
        /// Dataset name.
        dataset: String,
        /// Contract version.
        version: String,
        /// Every problem found.
        problems: Vec<String>,
    },

    /// A layout that parses but has impossible column positions.
    #[error("layout {dataset} {vintage} is malformed: {}", .problems.join("; "))]
    MalformedLayout {
        /// Dataset name.
        dataset: String,
        /// Layout vintage.
        vintage: String,
        /// Every problem found.
        problems: Vec<String>,
    },

    /// A definition file failed meta-schema validation.
    #[error("{document} does not conform to {schema_name}:\n{}", fmt_violations(.violations))]
    MetaSchemaViolation {
        /// Name or path of the document.
        document: String,
        /// Meta-schema it was checked against.
        schema_name: &'static str,
        /// Individual violations.
        violations: Vec<Violation>,
    },

    /// An embedded meta-schema could not be compiled.
    #[error("meta-schema {schema_name} could not be built: {reason}")]
    MetaSchemaBuild {
        /// Meta-schema name.
        schema_name: &'static str,
        /// Underlying reason.
        reason: String,
    },

    /// A definition file is not valid JSON or does not deserialize.
    #[error("invalid definition {path}: {source}")]
    InvalidJson {
        /// Path or name of the document.
        path: String,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem error reading a definition.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A single meta-schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer to the violating value.
    pub instance_path: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

fn fmt_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
