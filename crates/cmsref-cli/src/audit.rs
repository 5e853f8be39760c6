//! # Audit Subcommand
//!
//! Runs the alignment gate over the configured contract, layout, and
//! mapping directories and prints the report.

use anyhow::{Context, Result};
use clap::Args;
use cmsref_pipeline::PipelineConfig;
use cmsref_schema::{audit_all, LayoutRegistry};

/// Arguments for the audit subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Audit the layouts compiled into the binary instead of the layouts
    /// directory.
    #[arg(long)]
    pub builtin_layouts: bool,
}

/// Run the alignment gate. Exit code 1 when any error is found.
pub fn run_audit(args: &AuditArgs, config: &PipelineConfig) -> Result<u8> {
    let store = config.store();
    let registry = if args.builtin_layouts {
        LayoutRegistry::builtin().context("loading builtin layouts")?
    } else {
        store.layout_registry().with_context(|| {
            format!("loading layouts from {}", store.layouts_dir().display())
        })?
    };

    let report = audit_all(&store, &registry).context("loading definitions for audit")?;
    println!("{report}");

    if report.is_clean() {
        tracing::info!(datasets = report.datasets.len(), "alignment gate passed");
        Ok(0)
    } else {
        tracing::error!(errors = report.errors.len(), "alignment gate failed");
        Ok(1)
    }
}
