//! # Quarantine Manager
//!
//! Append-only store of rejected rows with their findings, plus the
//! counters behind the publish gate.
//!
//! Intake never fails and never blocks: a row handed to quarantine is
//! recorded, counted, and logged at `debug`. Counters are kept per run so
//! that one manager may serve several sequential runs without mixing their
//! rates.

use std::collections::BTreeMap;

use cmsref_core::{RunId, Timestamp, ValidationFinding};
use cmsref_ingest::ParsedRecord;
use serde::Serialize;

/// A rejected row with the reasons it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantineRecord {
    /// Run that rejected the row.
    pub run_id: RunId,
    /// When the row was quarantined.
    pub timestamp: Timestamp,
    /// Findings of the failing tier.
    pub findings: Vec<ValidationFinding>,
    /// The record as it stood when rejected; never hashed.
    pub record: ParsedRecord,
}

/// Per-run quarantine statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuarantineSummary {
    /// Rows seen (accepted plus quarantined).
    pub total: usize,
    /// Rows quarantined.
    pub quarantined: usize,
    /// `quarantined / total`, zero for an empty run.
    pub rate: f64,
    /// Findings per rule id across quarantined rows.
    pub rule_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
struct RunCounters {
    accepted: usize,
    quarantined: usize,
    rule_counts: BTreeMap<String, usize>,
}

/// Collects quarantined rows and counts outcomes per run.
#[derive(Debug, Default)]
pub struct QuarantineManager {
    records: Vec<QuarantineRecord>,
    counters: BTreeMap<RunId, RunCounters>,
}

impl QuarantineManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Quarantine a row.
    pub fn intake(&mut self, record: ParsedRecord, findings: Vec<ValidationFinding>, run_id: RunId) {
        let counters = self.counters.entry(run_id).or_default();
        counters.quarantined += 1;
        for finding in &findings {
            *counters.rule_counts.entry(finding.rule_id.clone()).or_default() += 1;
        }
        tracing::debug!(
            run_id = %run_id,
            row_num = record.row_num,
            findings = findings.len(),
            first_rule = findings.first().map(|f| f.rule_id.as_str()).unwrap_or(""),
            "row quarantined"
        );
        self.records.push(QuarantineRecord {
            run_id,
            timestamp: Timestamp::now(),
            findings,
            record,
        });
    }

    /// Count an accepted row toward `run_id`'s total.
    pub fn observe_accepted(&mut self, run_id: RunId) {
        self.counters.entry(run_id).or_default().accepted += 1;
    }

    /// Statistics for `run_id`. Unknown runs summarize as empty.
    pub fn summary(&self, run_id: RunId) -> QuarantineSummary {
        let Some(c) = self.counters.get(&run_id) else {
            return QuarantineSummary::default();
        };
        let total = c.accepted + c.quarantined;
        let rate = if total == 0 {
            0.0
        } else {
            c.quarantined as f64 / total as f64
        };
        QuarantineSummary {
            total,
            quarantined: c.quarantined,
            rate,
            rule_counts: c.rule_counts.clone(),
        }
    }

    /// All quarantined rows, in intake order.
    pub fn records(&self) -> &[QuarantineRecord] {
        &self.records
    }

    /// Quarantined rows of one run.
    pub fn records_for(&self, run_id: RunId) -> impl Iterator<Item = &QuarantineRecord> {
        self.records.iter().filter(move |r| r.run_id == run_id)
    }

    /// Take every quarantined row, leaving the counters in place.
    pub fn drain(&mut self) -> Vec<QuarantineRecord> {
        std::mem::take(&mut self.records)
    }

    /// Forget a run entirely: its rows and its counters.
    pub fn discard_run(&mut self, run_id: RunId) {
        self.records.retain(|r| r.run_id != run_id);
        self.counters.remove(&run_id);
    }
}
