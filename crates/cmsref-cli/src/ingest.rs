//! # Ingest Subcommand
//!
//! Ingests one source file and writes, under `--out`:
//!
//! - `quarantine.jsonl`: every rejected row with its findings (always).
//! - `accepted.jsonl`: hashed records, only when the run passes the
//!   quarantine-rate gate.
//! - `summary.json`: run id, release metadata, counts, and warnings.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use cmsref_core::Timestamp;
use cmsref_pipeline::{build_decoder, IngestPipeline, PipelineConfig, PipelineError, SourceFile};
use cmsref_schema::{LayoutDefinition, LayoutRegistry, SchemaContract};
use cmsref_validate::ReferenceSets;
use serde::Serialize;

/// Source format.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    /// `.csv`, `.tsv`, `.psv`, and `.tab` are delimited; anything else is
    /// fixed-width.
    Auto,
    /// Column positions from a layout.
    FixedWidth,
    /// Header row plus delimited records.
    Delimited,
}

/// Arguments for the ingest subcommand.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Dataset name, e.g. `cms_pprrvu`.
    #[arg(long)]
    pub dataset: String,

    /// Source file to ingest.
    pub input: PathBuf,

    /// Contract version (default: highest available).
    #[arg(long)]
    pub contract_version: Option<String>,

    /// Layout vintage for fixed-width sources, read from the layouts
    /// directory (default: latest layout on disk, or builtin when the
    /// directory does not exist).
    #[arg(long)]
    pub vintage: Option<String>,

    /// Source format.
    #[arg(long, value_enum, default_value_t = SourceFormat::Auto)]
    pub format: SourceFormat,

    /// Field delimiter for delimited sources (overrides config).
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Explicit release id used for vintage extraction.
    #[arg(long)]
    pub release_id: Option<String>,

    /// Release manifest JSON file.
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Reference sets JSON file: `{"set_name": ["value", ...]}`.
    #[arg(long)]
    pub reference_sets: Option<PathBuf>,

    /// Maximum quarantined fraction (overrides config).
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Recompute every row hash before publishing (overrides config).
    #[arg(long)]
    pub verify_determinism: bool,

    /// Output directory.
    #[arg(long, default_value = "out")]
    pub out: PathBuf,
}

impl IngestArgs {
    /// Whether the input should be decoded as delimited text.
    pub fn is_delimited(&self) -> bool {
        match self.format {
            SourceFormat::FixedWidth => false,
            SourceFormat::Delimited => true,
            SourceFormat::Auto => self
                .input
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "tsv" | "psv" | "tab")),
        }
    }

    /// Apply command-line overrides to a loaded config.
    pub fn apply_overrides(&self, config: &mut PipelineConfig) -> Result<()> {
        if let Some(threshold) = self.threshold {
            config.quarantine_rate_threshold = threshold;
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        } else if self.input.extension().is_some_and(|e| e.eq_ignore_ascii_case("tsv") || e.eq_ignore_ascii_case("tab")) {
            config.delimiter = '\t';
        }
        if self.verify_determinism {
            config.verify_determinism = true;
        }
        config.validate()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct RunSummary<'a> {
    run_id: String,
    dataset: &'a str,
    contract_version: &'a str,
    contract_digest: &'a str,
    release_id: &'a str,
    quarter_vintage: &'a str,
    metadata_degraded: bool,
    total: usize,
    accepted: usize,
    quarantined: usize,
    quarantine_rate: f64,
    threshold: f64,
    published: bool,
    rule_counts: &'a std::collections::BTreeMap<String, usize>,
    warnings: &'a [String],
}

fn resolve_layout(args: &IngestArgs, config: &PipelineConfig) -> Result<LayoutDefinition> {
    let store = config.store();
    if let Some(vintage) = &args.vintage {
        return Ok(store.load_layout(&args.dataset, vintage)?);
    }
    let registry = if config.layouts_dir.is_dir() {
        store
            .layout_registry()
            .with_context(|| format!("loading layouts from {}", config.layouts_dir.display()))?
    } else {
        tracing::debug!(dir = %config.layouts_dir.display(), "no layouts directory; using builtin layouts");
        LayoutRegistry::builtin().context("loading builtin layouts")?
    };
    Ok(registry.resolve(&args.dataset, None)?.clone())
}

/// Manifest text, or `None` with a run warning when it cannot be read.
fn read_manifest(path: &Path, warnings: &mut Vec<String>) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "manifest unreadable; falling back to release id or filename");
            warnings.push(format!("manifest {} unreadable ({e}); vintage taken from release id or filename", path.display()));
            None
        }
    }
}

fn read_reference_sets(path: &Path) -> Result<ReferenceSets> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading reference sets: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing reference sets: {}", path.display()))
}

fn write_jsonl<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<usize> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let mut count = 0;
    for row in rows {
        serde_json::to_writer(&mut out, &row)?;
        out.write_all(b"\n")?;
        count += 1;
    }
    out.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(count)
}

/// Ingest one file. Exit code 1 when the publish gate refuses the run.
pub fn run_ingest(args: &IngestArgs, config: &PipelineConfig) -> Result<u8> {
    let mut config = config.clone();
    args.apply_overrides(&mut config)?;

    let contract: SchemaContract = config
        .store()
        .load_contract(&args.dataset, args.contract_version.as_deref())
        .with_context(|| format!("loading contract for {}", args.dataset))?;
    let layout = if args.is_delimited() {
        None
    } else {
        Some(resolve_layout(args, &config)?)
    };
    let decoder = build_decoder(&config, &contract, layout);

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("reading source: {}", args.input.display()))?;
    let mut warnings = Vec::new();
    let manifest = args
        .manifest
        .as_deref()
        .and_then(|path| read_manifest(path, &mut warnings));
    let reference_sets = match &args.reference_sets {
        Some(path) => read_reference_sets(path)?,
        None => ReferenceSets::new(),
    };
    let filename = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let source = SourceFile {
        filename: &filename,
        bytes: &bytes,
        release_id: args.release_id.as_deref(),
        manifest: manifest.as_deref(),
        timestamp: Timestamp::now(),
    };
    let report = IngestPipeline::new(&config, &contract)
        .with_reference_sets(reference_sets)
        .run(decoder.as_ref(), &source, &AtomicBool::new(false))?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory: {}", args.out.display()))?;
    write_jsonl(&args.out.join("quarantine.jsonl"), &report.quarantined)?;

    warnings.extend(report.warnings.iter().cloned());
    let gate = report.gate();
    let published = gate.is_ok();
    let summary = RunSummary {
        run_id: report.run_id.to_string(),
        dataset: &report.dataset,
        contract_version: &report.contract_version,
        contract_digest: &report.contract_digest,
        release_id: &report.vintage.release_id,
        quarter_vintage: &report.vintage.quarter_vintage,
        metadata_degraded: report.vintage.degraded,
        total: report.summary.total,
        accepted: report.accepted().len(),
        quarantined: report.summary.quarantined,
        quarantine_rate: report.summary.rate,
        threshold: config.quarantine_rate_threshold,
        published,
        rule_counts: &report.summary.rule_counts,
        warnings: &warnings,
    };
    let summary_path = args.out.join("summary.json");
    std::fs::write(&summary_path, serde_json::to_vec_pretty(&summary)?)
        .with_context(|| format!("writing {}", summary_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    match gate {
        Ok(()) => {
            let accepted = report.publish()?;
            let written = write_jsonl(&args.out.join("accepted.jsonl"), &accepted)?;
            tracing::info!(rows = written, out = %args.out.display(), "accepted rows published");
            Ok(0)
        }
        Err(e @ PipelineError::QuarantineRateExceeded { .. }) => {
            tracing::error!("{e}");
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
