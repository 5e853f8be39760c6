//! # Alignment Auditors
//!
//! Static checks that keep contract, layout, and API mapping consistent.
//! Each auditor returns its complete list of errors instead of stopping at
//! the first, so one CI run shows every drift.
//!
//! Metadata columns (`hash_metadata_exclusions`) are injected by the
//! pipeline and never appear in a layout; they are left out of the
//! layout comparison.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::contract::SchemaContract;
use crate::error::Result;
use crate::layout::{LayoutDefinition, LayoutRegistry};
use crate::store::{ApiMapping, ContractStore};

/// A disagreement between two definitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    /// Contract data column absent from the layout.
    #[error("{dataset} layout {vintage}: contract column '{column}' is missing from the layout")]
    MissingLayoutColumn {
        /// Dataset.
        dataset: String,
        /// Layout vintage.
        vintage: String,
        /// Column name.
        column: String,
    },

    /// Layout column the contract does not declare.
    #[error("{dataset} layout {vintage}: layout column '{column}' is not in the contract")]
    ExtraLayoutColumn {
        /// Dataset.
        dataset: String,
        /// Layout vintage.
        vintage: String,
        /// Column name.
        column: String,
    },

    /// Natural key the layout cannot supply.
    #[error("{dataset} layout {vintage}: natural key '{column}' is not in the layout")]
    NaturalKeyNotInLayout {
        /// Dataset.
        dataset: String,
        /// Layout vintage.
        vintage: String,
        /// Column name.
        column: String,
    },

    /// Layout and contract disagree on a column's type.
    #[error("{dataset} layout {vintage}: column '{column}' is {layout_type} in the layout but {contract_type} in the contract")]
    TypeMismatch {
        /// Dataset.
        dataset: String,
        /// Layout vintage.
        vintage: String,
        /// Column name.
        column: String,
        /// Type declared by the layout.
        layout_type: &'static str,
        /// Type declared by the contract.
        contract_type: &'static str,
    },

    /// API mapping key that is not a contract column.
    #[error("{dataset} mapping: '{column}' (→ '{api_field}') is not a contract column")]
    UnknownMappingColumn {
        /// Dataset.
        dataset: String,
        /// Mapping key.
        column: String,
        /// Mapped API field.
        api_field: String,
    },

    /// A contract invariant violation.
    #[error("{dataset} v{version}: {problem}")]
    MalformedContract {
        /// Dataset.
        dataset: String,
        /// Contract version.
        version: String,
        /// What is wrong.
        problem: String,
    },

    /// A definition file that failed to load or meta-validate.
    #[error("{dataset} {definition}: {problem}")]
    Unloadable {
        /// Dataset.
        dataset: String,
        /// Which definition, e.g. `contract v1.0` or `mapping`.
        definition: String,
        /// The load error.
        problem: String,
    },

    /// A contract with no registered layout.
    #[error("{dataset}: no layout registered")]
    MissingLayout {
        /// Dataset.
        dataset: String,
    },

    /// A registered layout with no contract.
    #[error("{dataset} layout {vintage}: no contract exists for this dataset")]
    OrphanLayout {
        /// Dataset.
        dataset: String,
        /// Layout vintage.
        vintage: String,
    },
}

/// Compare a contract's data columns with a layout.
///
/// Reports `missing = contract − layout`, `extra = layout − contract`,
/// natural keys the layout lacks, and type disagreements.
pub fn audit_layout_schema(
    contract: &SchemaContract,
    layout: &LayoutDefinition,
) -> Vec<AlignmentError> {
    let mut errors = Vec::new();
    let dataset = &contract.dataset_name;
    let vintage = &layout.vintage;
    let data = contract.data_columns();
    let laid_out: BTreeSet<&str> = layout.columns.keys().map(String::as_str).collect();

    for column in data.difference(&laid_out) {
        errors.push(AlignmentError::MissingLayoutColumn {
            dataset: dataset.clone(),
            vintage: vintage.clone(),
            column: column.to_string(),
        });
    }
    for column in laid_out.difference(&data) {
        errors.push(AlignmentError::ExtraLayoutColumn {
            dataset: dataset.clone(),
            vintage: vintage.clone(),
            column: column.to_string(),
        });
    }
    for key in &contract.natural_keys {
        if !laid_out.contains(key.as_str()) {
            errors.push(AlignmentError::NaturalKeyNotInLayout {
                dataset: dataset.clone(),
                vintage: vintage.clone(),
                column: key.clone(),
            });
        }
    }
    for (name, col) in &layout.columns {
        if let Some(spec) = contract.column(name) {
            if spec.column_type != col.column_type {
                errors.push(AlignmentError::TypeMismatch {
                    dataset: dataset.clone(),
                    vintage: vintage.clone(),
                    column: name.clone(),
                    layout_type: col.column_type.as_str(),
                    contract_type: spec.column_type.as_str(),
                });
            }
        }
    }
    errors
}

/// Every mapping key must be a contract column. Unmapped columns are fine.
pub fn audit_schema_api_mapping(
    contract: &SchemaContract,
    mapping: &ApiMapping,
) -> Vec<AlignmentError> {
    mapping
        .iter()
        .filter(|(column, _)| !contract.columns.contains_key(column.as_str()))
        .map(|(column, api_field)| AlignmentError::UnknownMappingColumn {
            dataset: contract.dataset_name.clone(),
            column: column.clone(),
            api_field: api_field.clone(),
        })
        .collect()
}

/// Contract invariant violations as alignment errors.
pub fn audit_contract(contract: &SchemaContract) -> Vec<AlignmentError> {
    contract
        .well_formedness_problems()
        .into_iter()
        .map(|problem| AlignmentError::MalformedContract {
            dataset: contract.dataset_name.clone(),
            version: contract.version.clone(),
            problem,
        })
        .collect()
}

/// What the gate looked at for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditedDataset {
    /// Dataset.
    pub dataset: String,
    /// Contract versions checked.
    pub versions: Vec<String>,
    /// Layout vintages checked against every version.
    pub vintages: Vec<String>,
    /// Whether an API mapping was checked.
    pub mapping_checked: bool,
}

/// Result of [`audit_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Datasets audited.
    pub datasets: Vec<AuditedDataset>,
    /// Every error found.
    pub errors: Vec<AlignmentError>,
}

impl AuditReport {
    /// No errors.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.datasets {
            writeln!(
                f,
                "{}: contracts [{}] × layouts [{}]{}",
                d.dataset,
                d.versions.join(", "),
                d.vintages.join(", "),
                if d.mapping_checked { " + api mapping" } else { "" }
            )?;
        }
        for e in &self.errors {
            writeln!(f, "  ✗ {e}")?;
        }
        if self.is_clean() {
            write!(f, "alignment OK ({} datasets)", self.datasets.len())
        } else {
            write!(f, "alignment FAILED: {} error(s)", self.errors.len())
        }
    }
}

/// Run every auditor over every contract version in `store`, every layout
/// in `registry`, and each dataset's API mapping.
///
/// A contract or mapping that fails to load is recorded in the report as
/// [`AlignmentError::Unloadable`] and the audit carries on.
///
/// # Errors
///
/// Only when the definition directories themselves cannot be listed.
pub fn audit_all(store: &ContractStore, registry: &LayoutRegistry) -> Result<AuditReport> {
    let mut report = AuditReport::default();
    let datasets = store.datasets()?;

    for dataset in &datasets {
        let versions = store.versions(dataset)?;
        let vintages: Vec<String> = registry
            .vintages(dataset)
            .into_iter()
            .map(String::from)
            .collect();
        let mapping = match store.load_mapping(dataset) {
            Ok(mapping) => mapping,
            Err(e) => {
                report.errors.push(AlignmentError::Unloadable {
                    dataset: dataset.clone(),
                    definition: "mapping".to_string(),
                    problem: e.to_string(),
                });
                None
            }
        };

    if vintages.is_empty() {
            report.errors.push(AlignmentError::MissingLayout {
                dataset: dataset.clone(),
            });
        }

        for version in &versions {
            let contract = match store.load_contract(dataset, Some(version)) {
                Ok(contract) => contract,
                Err(e) => {
                    tracing::warn!(dataset = %dataset, version = %version, error = %e, "contract failed to load");
                    report.errors.push(AlignmentError::Unloadable {
                        dataset: dataset.clone(),
                        definition: format!("contract v{version}"),
                        problem: e.to_string(),
                    });
                    continue;
                }
            };
            report.errors.extend(audit_contract(&contract));
            for layout in registry.iter().filter(|l| &l.dataset_name == dataset) {
                report.errors.extend(audit_layout_schema(&contract, layout));
            }
            if let Some(mapping) = &mapping {
                report
                    .errors
                    .extend(audit_schema_api_mapping(&contract, mapping));
            }
        }

        report.datasets.push(AuditedDataset {
            dataset: dataset.clone(),
            versions,
            vintages,
            mapping_checked: mapping.is_some(),
        });
    }

    for layout in registry.iter() {
        if !datasets.contains(&layout.dataset_name) {
            report.errors.push(AlignmentError::OrphanLayout {
                dataset: layout.dataset_name.clone(),
                vintage: layout.vintage.clone(),
            });
        }
    }

    if report.is_clean() {
        tracing::info!(datasets = report.datasets.len(), "alignment audit passed");
    } else {
        tracing::warn!(errors = report.errors.len(), "alignment audit failed");
    }
    Ok(report)
}
