//! # Validation Engine
//!
//! Holds the per-run state the tiers need (compiled patterns, the natural
//! key index, reference sets) and runs the tiers in order. One engine
//! validates one source file; reusing it across files would carry duplicate
//! keys from one file into the next.

use std::collections::BTreeSet;

use cmsref_core::{Tier, ValidationFinding};
use cmsref_ingest::ParsedRecord;
use cmsref_schema::SchemaContract;

use crate::content::{check_content, NaturalKeyIndex};
use crate::error::Result;
use crate::referential::{check_referential, ReferenceSets};
use crate::structural::{check_structural, CompiledPatterns};

/// Result of validating one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Findings of the first failing tier; empty when accepted.
    pub findings: Vec<ValidationFinding>,
    /// The tier that failed, if any.
    pub failed_tier: Option<Tier>,
}

impl ValidationOutcome {
    /// Whether every tier passed.
    pub fn is_accepted(&self) -> bool {
        self.failed_tier.is_none()
    }
}

/// Contract-driven validator for the rows of one source file.
#[derive(Debug)]
pub struct ValidationEngine<'c> {
    contract: &'c SchemaContract,
    patterns: CompiledPatterns,
    reference_sets: ReferenceSets,
    keys: NaturalKeyIndex,
    skipped_reference_sets: BTreeSet<String>,
}

impl<'c> ValidationEngine<'c> {
    /// Build an engine for `contract`.
    ///
    /// # Errors
    ///
    /// [`crate::ValidateError::Pattern`] when a column pattern does not
    /// compile.
    pub fn new(contract: &'c SchemaContract, reference_sets: ReferenceSets) -> Result<Self> {
        Ok(Self {
            contract,
            patterns: CompiledPatterns::compile(contract)?,
            reference_sets,
            keys: NaturalKeyIndex::default(),
            skipped_reference_sets: BTreeSet::new(),
        })
    }

    /// The contract this engine validates against.
    pub fn contract(&self) -> &'c SchemaContract {
        self.contract
    }

    /// Run a single tier. The structural tier may conform decimals in
    /// `record`.
    pub fn run_tier(&mut self, tier: Tier, record: &mut ParsedRecord) -> Vec<ValidationFinding> {
        match tier {
            Tier::Structural => check_structural(record, self.contract, &self.patterns),
            Tier::Content => check_content(record, self.contract, &mut self.keys),
            Tier::Referential => check_referential(
                record,
                self.contract,
                &self.reference_sets,
                &mut self.skipped_reference_sets,
            ),
        }
    }

    /// Run every tier in order, stopping at the first that reports findings.
    pub fn validate(&mut self, record: &mut ParsedRecord) -> ValidationOutcome {
        for tier in Tier::ALL {
            let findings = self.run_tier(tier, record);
            if !findings.is_empty() {
                tracing::debug!(
                    row_num = record.row_num,
                    tier = %tier,
                    count = findings.len(),
                    "row failed validation"
                );
                return ValidationOutcome {
                    findings,
                    failed_tier: Some(tier),
                };
            }
        }
        ValidationOutcome::default()
    }

    /// Run-level warnings: one per reference set the contract needed but the
    /// caller did not supply.
    pub fn warnings(&self) -> Vec<String> {
        self.skipped_reference_sets
            .iter()
            .map(|name| format!("reference set '{name}' not supplied; referential check skipped"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cmsref_core::{FieldValue, Timestamp};
    use cmsref_ingest::RecordMetadata;
    use cmsref_schema::{ColumnSpec, ColumnType, ReferenceCheck};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn contract() -> SchemaContract {
        let mut columns = BTreeMap::new();
        columns.insert(
            "code".to_string(),
            ColumnSpec {
                pattern: Some("^[0-9]{2}$".into()),
                ..ColumnSpec::new(ColumnType::String, false)
            },
        );
        columns.insert(
            "factor".to_string(),
            ColumnSpec {
                precision: Some(5),
                scale: Some(3),
                exclusive_minimum: Some(Decimal::from_str("0.1").unwrap()),
                ..ColumnSpec::new(ColumnType::Decimal, false)
            },
        );
        SchemaContract {
            dataset_name: "cms_tiny".into(),
            version: "1.0".into(),
            hash_spec_version: "1".into(),
            columns,
            column_order: vec!["code".into(), "factor".into()],
            natural_keys: vec!["code".into()],
            hash_metadata_exclusions: BTreeSet::new(),
            changelog: Vec::new(),
            content_rules: Vec::new(),
            references: vec![ReferenceCheck {
                column: "code".into(),
                reference_set: "codes".into(),
            }],
        }
    }

    fn record(row_num: usize, code: &str, factor: &str) -> ParsedRecord {
        ParsedRecord {
            row_num,
            values: vec![
                ("code".into(), FieldValue::Text(code.into())),
                ("factor".into(), FieldValue::Decimal(Decimal::from_str(factor).unwrap())),
            ],
            metadata: RecordMetadata {
                release_id: "r".into(),
                vintage_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                product_year: "2025".into(),
                quarter_vintage: "2025Q1".into(),
                source_filename: "f".into(),
                source_file_sha256: "0".repeat(64),
                parsed_at: Timestamp::parse("2025-01-01T00:00:00Z").unwrap(),
            },
            findings: Vec::new(),
            extracted: true,
        }
    }

    fn sets() -> ReferenceSets {
        let mut sets = ReferenceSets::new();
        sets.insert("codes", ["01", "02"]);
        sets
    }

    #[test]
    fn accepted_row_is_conformed() {
        let c = contract();
        let mut engine = ValidationEngine::new(&c, sets()).unwrap();
        let mut r = record(1, "01", "1.2");
        let outcome = engine.validate(&mut r);
        assert!(outcome.is_accepted());
        assert_eq!(
            r.value("factor").and_then(FieldValue::as_decimal).map(|d| d.to_string()),
            Some("1.200".to_string())
        );
    }

    #[test]
    fn structural_failure_stops_later_tiers() {
        let c = contract();
        let mut engine = ValidationEngine::new(&c, sets()).unwrap();
        // bad pattern and out of bounds: only the structural tier reports
        let outcome = engine.validate(&mut record(1, "1", "0.05"));
        assert_eq!(outcome.failed_tier, Some(Tier::Structural));
        assert!(outcome.findings.iter().all(|f| f.tier == Tier::Structural));
    }

    #[test]
    fn content_then_referential() {
        let c = contract();
        let mut engine = ValidationEngine::new(&c, sets()).unwrap();
        let outcome = engine.validate(&mut record(1, "03", "0.1"));
        assert_eq!(outcome.failed_tier, Some(Tier::Content));

        let outcome = engine.validate(&mut record(2, "04", "1.0"));
        assert_eq!(outcome.failed_tier, Some(Tier::Referential));
        assert_eq!(outcome.findings[0].rule_id, "referential.unknown_value");
    }

    #[test]
    fn missing_reference_set_becomes_a_warning() {
        let c = contract();
        let mut engine = ValidationEngine::new(&c, ReferenceSets::new()).unwrap();
        assert!(engine.validate(&mut record(1, "42", "1.0")).is_accepted());
        assert!(engine.validate(&mut record(2, "43", "1.0")).is_accepted());
        assert_eq!(engine.warnings().len(), 1);
    }

    #[test]
    fn bad_pattern_fails_engine_construction() {
        let mut c = contract();
        if let Some(spec) = c.columns.get_mut("code") {
            spec.pattern = Some("([".into());
        }
        assert!(ValidationEngine::new(&c, ReferenceSets::new()).is_err());
    }
}
