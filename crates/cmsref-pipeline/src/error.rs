//! Errors that end or block a pipeline run.
//!
//! Row-level validation problems are findings, not errors; nothing here is
//! raised for an individual bad row.

use std::path::PathBuf;

use cmsref_core::{CanonicalizationError, CoreError, RunId};
use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Run-level failure.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Contract fingerprinting failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Contract, layout, or mapping could not be loaded.
    #[error(transparent)]
    Schema(#[from] cmsref_schema::SchemaError),

    /// The source has no usable table shape.
    #[error(transparent)]
    Ingest(#[from] cmsref_ingest::IngestError),

    /// The validation engine could not be built.
    #[error(transparent)]
    Validate(#[from] cmsref_validate::ValidateError),

    /// Vintage patterns failed to compile.
    #[error("vintage extractor: {0}")]
    Vintage(#[from] regex::Error),

    /// A value reached the hasher containing the field delimiter.
    #[error("row {row_num}: {source}")]
    Canonicalization {
        /// Row being hashed.
        row_num: usize,
        /// Underlying error.
        #[source]
        source: CanonicalizationError,
    },

    /// Recomputing a row hash gave a different answer.
    #[error("row {row_num}: content hash is not deterministic (stored {stored}, recomputed {recomputed})")]
    HashDeterminism {
        /// Row whose hash differed.
        row_num: usize,
        /// Hash attached to the record.
        stored: String,
        /// Hash from an independent second pass over the same source, or a
        /// note that the row was not accepted on that pass.
        recomputed: String,
    },

    /// Too many rows were quarantined to publish the accepted ones.
    #[error("{run_id}: quarantine rate {rate:.4} exceeds threshold {threshold:.4} ({quarantined} of {total} rows)")]
    QuarantineRateExceeded {
        /// Run that was blocked.
        run_id: RunId,
        /// Quarantined fraction of all rows.
        rate: f64,
        /// Configured maximum.
        threshold: f64,
        /// Rows quarantined.
        quarantined: usize,
        /// Rows seen.
        total: usize,
    },

    /// The caller cancelled the run; partial output was dropped.
    #[error("{run_id}: cancelled after {rows_processed} rows")]
    Cancelled {
        /// Run that was cancelled.
        run_id: RunId,
        /// Rows fully processed before the cancel was observed.
        rows_processed: usize,
    },

    /// A row made an illegal state transition.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file is not valid YAML for [`crate::PipelineConfig`].
    #[error("config {path}: {source}")]
    ConfigParse {
        /// Config file.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Filesystem error.
    #[error("{path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
