//! # Ingestion Run
//!
//! One [`IngestPipeline::run`] turns one source file into accepted, hashed
//! records and quarantined rows.
//!
//! ## Invariants
//!
//! - Every run gets a fresh [`RunId`]; runs share no mutable state.
//! - Rows are processed in source order on the calling thread. The natural
//!   key index and the quarantine counters have a single writer.
//! - Cancellation is all-or-nothing: the flag is checked between rows, and
//!   once it is observed every partial result is dropped.
//! - Accepted rows are only handed out through [`RunReport::publish`], which
//!   enforces the quarantine-rate threshold.
//! - With `verify_determinism`, the source bytes are decoded, normalized,
//!   validated, and hashed a second time from scratch. Every accepted row
//!   must come out of that pass accepted with the same hash.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use cmsref_core::{RunId, Tier, Timestamp, ValidationFinding};
use cmsref_ingest::{
    extract_vintage, Decoder, DelimitedDecoder, FixedWidthDecoder, HashedRecord, ParsedRecord,
    RecordMetadata, VintageInputs, VintageMetadata,
};
use cmsref_schema::{LayoutDefinition, SchemaContract};
use cmsref_validate::{ReferenceSets, ValidationEngine};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::hasher::{compute_row_hash, hash_record};
use crate::lifecycle::{RowLifecycle, RowState};
use crate::quarantine::{QuarantineManager, QuarantineRecord, QuarantineSummary};

/// A source file and what the caller knows about its release.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    /// Filename as received, used for vintage extraction and provenance.
    pub filename: &'a str,
    /// Raw bytes.
    pub bytes: &'a [u8],
    /// Release id supplied by the caller, if any.
    pub release_id: Option<&'a str>,
    /// Release manifest JSON, if any.
    pub manifest: Option<&'a str>,
    /// Release timestamp rendered into the release id.
    pub timestamp: Timestamp,
}

/// Pick the decoder for a source: fixed-width when a layout is given,
/// delimited otherwise. Both skip the configured line prefixes.
pub fn build_decoder(
    config: &PipelineConfig,
    contract: &SchemaContract,
    layout: Option<LayoutDefinition>,
) -> Box<dyn Decoder> {
    match layout {
        Some(layout) => Box::new(FixedWidthDecoder::new(layout).with_filter(config.line_filter())),
        None => Box::new(
            DelimitedDecoder::new(contract)
                .with_delimiter(config.delimiter_byte())
                .with_filter(config.line_filter()),
        ),
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Dataset ingested.
    pub dataset: String,
    /// Contract version applied.
    pub contract_version: String,
    /// Hex fingerprint of the contract applied.
    pub contract_digest: String,
    /// Release metadata stamped on every row.
    pub vintage: VintageMetadata,
    /// Quarantined rows in source order.
    pub quarantined: Vec<QuarantineRecord>,
    /// Quarantine statistics.
    pub summary: QuarantineSummary,
    /// Run-level warnings: dropped headers, degraded metadata, skipped
    /// reference checks.
    pub warnings: Vec<String>,
    /// Lines skipped by the line filter.
    pub skipped_lines: usize,
    accepted: Vec<HashedRecord>,
    threshold: f64,
}

impl RunReport {
    /// Accepted rows, for inspection. Use [`Self::publish`] to hand them on.
    pub fn accepted(&self) -> &[HashedRecord] {
        &self.accepted
    }

    /// Whether the quarantine rate is within the threshold.
    pub fn gate(&self) -> Result<()> {
        if self.summary.rate > self.threshold {
            return Err(PipelineError::QuarantineRateExceeded {
                run_id: self.run_id,
                rate: self.summary.rate,
                threshold: self.threshold,
                quarantined: self.summary.quarantined,
                total: self.summary.total,
            });
        }
        Ok(())
    }

    /// Release the accepted rows if the run passes the gate.
    ///
    /// # Errors
    ///
    /// [`PipelineError::QuarantineRateExceeded`]; the accepted rows are
    /// dropped.
    pub fn publish(self) -> Result<Vec<HashedRecord>> {
        self.gate()?;
        Ok(self.accepted)
    }
}

/// Runs sources against one contract.
#[derive(Debug)]
pub struct IngestPipeline<'a> {
    config: &'a PipelineConfig,
    contract: &'a SchemaContract,
    reference_sets: ReferenceSets,
}

impl<'a> IngestPipeline<'a> {
    /// A pipeline with no reference sets.
    pub fn new(config: &'a PipelineConfig, contract: &'a SchemaContract) -> Self {
        Self {
            config,
            contract,
            reference_sets: ReferenceSets::new(),
        }
    }

    /// Supply reference sets for the referential tier.
    pub fn with_reference_sets(mut self, reference_sets: ReferenceSets) -> Self {
        self.reference_sets = reference_sets;
        self
    }

    /// Ingest one source file.
    ///
    /// # Errors
    ///
    /// Setup failures (undecodable table shape, bad patterns), a hashing or
    /// lifecycle failure, a determinism mismatch when verification is on,
    /// and [`PipelineError::Cancelled`]. Bad rows are never errors.
    pub fn run(
        &self,
        decoder: &dyn Decoder,
        source: &SourceFile<'_>,
        cancel: &AtomicBool,
    ) -> Result<RunReport> {
        let run_id = RunId::new();
        let contract = self.contract;
        tracing::info!(
            run_id = %run_id,
            dataset = %contract.dataset_name,
            contract_version = %contract.version,
            format = decoder.format(),
            source = source.filename,
            bytes = source.bytes.len(),
            "ingestion run started"
        );

        let vintage = extract_vintage(&VintageInputs {
            dataset: &contract.dataset_name,
            filename: source.filename,
            release_id: source.release_id,
            manifest: source.manifest,
            timestamp: source.timestamp,
        })?;
        let mut warnings: Vec<String> = vintage.warnings.iter().map(ToString::to_string).collect();
        if vintage.degraded {
            tracing::warn!(
                run_id = %run_id,
                product_year = %vintage.product_year,
                "release metadata degraded to defaults"
            );
        }
        let metadata = RecordMetadata::new(&vintage, source.filename, source.bytes, Timestamp::now());

        let batch = decoder.decode(source.bytes)?;
        warnings.extend(batch.warnings);

        let mut engine = ValidationEngine::new(contract, self.reference_sets.clone())?;
        let mut quarantine = QuarantineManager::new();
        let mut accepted = Vec::new();

        for (processed, row) in batch.rows.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!(run_id = %run_id, rows_processed = processed, "ingestion run cancelled");
                return Err(PipelineError::Cancelled {
                    run_id,
                    rows_processed: processed,
                });
            }

            let mut lifecycle = RowLifecycle::new(row.row_num);
            let record = ParsedRecord::from_decoded(row, contract, metadata.clone());
            lifecycle.transition(RowState::Normalized)?;

            match run_tiers(&mut engine, &mut lifecycle, record)? {
                Verdict::Rejected(record, findings) => quarantine.intake(record, findings, run_id),
                Verdict::Passed(record) => {
                    let hashed = hash_record(record, contract)?;
                    lifecycle.transition(RowState::Accepted)?;
                    quarantine.observe_accepted(run_id);
                    accepted.push(hashed);
                }
            }
        }

        if self.config.verify_determinism {
            let replayed = self.replay_hashes(decoder, source.bytes, &metadata, cancel, run_id)?;
            check_replay(&accepted, &replayed)?;
            tracing::debug!(run_id = %run_id, rows = accepted.len(), "row hashes reproduced");
        }

        warnings.extend(engine.warnings());
        let summary = quarantine.summary(run_id);
        let report = RunReport {
            run_id,
            dataset: contract.dataset_name.clone(),
            contract_version: contract.version.clone(),
            contract_digest: contract.digest()?.to_hex(),
            vintage,
            quarantined: quarantine.drain(),
            summary,
            warnings,
            skipped_lines: batch.skipped_lines,
            accepted,
            threshold: self.config.quarantine_rate_threshold,
        };
        tracing::info!(
            run_id = %run_id,
            total = report.summary.total,
            accepted = report.accepted.len(),
            quarantined = report.summary.quarantined,
            rate = report.summary.rate,
            "ingestion run finished"
        );
        Ok(report)
    }
}

impl IngestPipeline<'_> {
    /// Decode, validate, and hash `bytes` again with fresh state, returning
    /// the hash of every row accepted on this pass by row number.
    fn replay_hashes(
        &self,
        decoder: &dyn Decoder,
        bytes: &[u8],
        metadata: &RecordMetadata,
        cancel: &AtomicBool,
        run_id: RunId,
    ) -> Result<BTreeMap<usize, String>> {
        let contract = self.contract;
        let batch = decoder.decode(bytes)?;
        let mut engine = ValidationEngine::new(contract, self.reference_sets.clone())?;
        let mut hashes = BTreeMap::new();
        for (processed, row) in batch.rows.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                return Err(PipelineError::Cancelled {
                    run_id,
                    rows_processed: processed,
                });
            }
            let mut lifecycle = RowLifecycle::new(row.row_num);
            let record = ParsedRecord::from_decoded(row, contract, metadata.clone());
            lifecycle.transition(RowState::Normalized)?;
            if let Verdict::Passed(record) = run_tiers(&mut engine, &mut lifecycle, record)? {
                hashes.insert(record.row_num, compute_row_hash(&record, contract)?);
            }
        }
        Ok(hashes)
    }
}

/// Every accepted row must reappear in `replayed` with the same hash.
fn check_replay(accepted: &[HashedRecord], replayed: &BTreeMap<usize, String>) -> Result<()> {
    for hashed in accepted {
        let recomputed = match replayed.get(&hashed.row_num()) {
            Some(hash) if hash == hashed.row_content_hash() => continue,
            Some(hash) => hash.clone(),
            None => "<not accepted on replay>".to_string(),
        };
        tracing::error!(row_num = hashed.row_num(), "row hash differs between passes");
        return Err(PipelineError::HashDeterminism {
            row_num: hashed.row_num(),
            stored: hashed.row_content_hash().to_string(),
            recomputed,
        });
    }
    Ok(())
}

enum Verdict {
    Passed(ParsedRecord),
    Rejected(ParsedRecord, Vec<ValidationFinding>),
}

/// Drive one record through the tiers, advancing its lifecycle.
fn run_tiers(
    engine: &mut ValidationEngine<'_>,
    lifecycle: &mut RowLifecycle,
    mut record: ParsedRecord,
) -> Result<Verdict> {
    for tier in Tier::ALL {
        let findings = engine.run_tier(tier, &mut record);
        let passed = findings.is_empty();
        lifecycle.complete_tier(tier, passed)?;
        if !passed {
            return Ok(Verdict::Rejected(record, findings));
        }
    }
    Ok(Verdict::Passed(record))
}
