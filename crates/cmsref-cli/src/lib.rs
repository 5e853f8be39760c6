//! # cmsref-cli: Command Handlers
//!
//! Each subcommand is a module exposing an `Args` struct and a
//! `run_*` handler returning the process exit code:
//!
//! - `0`: success.
//! - `1`: the gate refused: alignment errors, or too many rows quarantined.
//!
//! Operational failures (missing files, unreadable definitions) are `Err`
//! and exit with `2`.

pub mod audit;
pub mod ingest;

use std::path::Path;

use anyhow::Result;
use cmsref_pipeline::PipelineConfig;

/// Load `--config` if given, else defaults relative to the working
/// directory.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::from_yaml_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}
