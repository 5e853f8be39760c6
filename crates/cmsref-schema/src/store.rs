//! # Contract Store
//!
//! Loads contracts, layouts, and API mappings from their directories.
//!
//! File naming:
//!
//! - `contracts/{dataset}_v{version}.json`
//! - `layouts/{dataset}_{vintage}.json`
//! - `mappings/{dataset}.json`
//!
//! Every file is meta-validated, deserialized, and checked for
//! well-formedness before it is returned. Nothing is cached or mutated.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::contract::SchemaContract;
use crate::error::{Result, SchemaError};
use crate::layout::{LayoutDefinition, LayoutRegistry};
use crate::validate::{parse_document, DocumentKind};

/// Schema column name → API field name.
pub type ApiMapping = BTreeMap<String, String>;

/// Compare dotted version strings numerically, so `1.10 > 1.9`.
///
/// Components that are not integers compare as text. A version that is a
/// prefix of another sorts first (`1 < 1.0`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Read-only view over the definition directories.
#[derive(Debug, Clone)]
pub struct ContractStore {
    contracts_dir: PathBuf,
    layouts_dir: PathBuf,
    mappings_dir: PathBuf,
}

impl ContractStore {
    /// A store over three explicit directories.
    pub fn new(
        contracts_dir: impl Into<PathBuf>,
        layouts_dir: impl Into<PathBuf>,
        mappings_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            contracts_dir: contracts_dir.into(),
            layouts_dir: layouts_dir.into(),
            mappings_dir: mappings_dir.into(),
        }
    }

    /// A store over `root/contracts`, `root/layouts`, and `root/mappings`.
    pub fn at_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(
            root.join("contracts"),
            root.join("layouts"),
            root.join("mappings"),
        )
    }

    /// Contract directory.
    pub fn contracts_dir(&self) -> &Path {
        &self.contracts_dir
    }

    /// Layout directory.
    pub fn layouts_dir(&self) -> &Path {
        &self.layouts_dir
    }

    /// Mapping directory.
    pub fn mappings_dir(&self) -> &Path {
        &self.mappings_dir
    }

    /// `(dataset, version)` for every contract file, by dataset then version.
    fn contract_files(&self) -> Result<Vec<(String, String)>> {
        let entries = std::fs::read_dir(&self.contracts_dir).map_err(|source| SchemaError::Io {
            path: self.contracts_dir.clone(),
            source,
        })?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SchemaError::Io {
                path: self.contracts_dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Some((dataset, version)) = stem.rsplit_once("_v") {
                if !dataset.is_empty() && !version.is_empty() {
                    found.push((dataset.to_string(), version.to_string()));
                }
            }
        }
        found.sort_by(|(da, va), (db, vb)| da.cmp(db).then_with(|| compare_versions(va, vb)));
        Ok(found)
    }

    /// Datasets with at least one contract.
    pub fn datasets(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .contract_files()?
            .into_iter()
            .map(|(dataset, _)| dataset)
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Contract versions for `dataset`, lowest first.
    pub fn versions(&self, dataset: &str) -> Result<Vec<String>> {
        Ok(self
            .contract_files()?
            .into_iter()
            .filter(|(d, _)| d == dataset)
            .map(|(_, v)| v)
            .collect())
    }

    /// Load a contract. Without a version, the highest available version
    /// wins.
    ///
    /// # Errors
    ///
    /// [`SchemaError::ContractNotFound`] if no matching file exists;
    /// meta-schema, JSON, or well-formedness errors otherwise.
    pub fn load_contract(&self, dataset: &str, version: Option<&str>) -> Result<SchemaContract> {
        let version = match version {
            Some(v) => v.to_string(),
            None => self
                .versions(dataset)?
                .pop()
                .ok_or_else(|| SchemaError::ContractNotFound {
                    kind: "contract",
                    dataset: dataset.to_string(),
                    detail: format!(
                        "no files matching {dataset}_v*.json in {}",
                        self.contracts_dir.display()
                    ),
                })?,
        };

        let path = self.contracts_dir.join(format!("{dataset}_v{version}.json"));
        let text = read_definition(&path, "contract", dataset)?;
        let document = path.display().to_string();
        let value = parse_document(DocumentKind::Contract, &text, &document)?;
        let contract: SchemaContract =
            serde_json::from_value(value).map_err(|source| SchemaError::InvalidJson {
                path: document.clone(),
                source,
            })?;

        if contract.dataset_name != dataset || contract.version != version {
            return Err(SchemaError::MalformedContract {
                dataset: dataset.to_string(),
                version,
                problems: vec![format!(
                    "{document} declares {} v{}",
                    contract.dataset_name, contract.version
                )],
            });
        }
        contract.check_well_formed()?;

        tracing::debug!(dataset, version = %contract.version, "loaded schema contract");
        Ok(contract)
    }

    /// Load the layout for `(dataset, vintage)` from disk.
    ///
    /// # Errors
    ///
    /// [`SchemaError::ContractNotFound`] if the file is missing;
    /// [`SchemaError::MalformedLayout`] if its `version` disagrees with the
    /// filename or its positions are impossible.
    pub fn load_layout(&self, dataset: &str, vintage: &str) -> Result<LayoutDefinition> {
        let path = self.layouts_dir.join(format!("{dataset}_{vintage}.json"));
        let text = read_definition(&path, "layout", dataset)?;
        let layout = LayoutDefinition::from_json_str(dataset, &text, &path.display().to_string())?;
        if layout.vintage != vintage {
            return Err(SchemaError::MalformedLayout {
                dataset: dataset.to_string(),
                vintage: vintage.to_string(),
                problems: vec![format!(
                    "{} declares version {}",
                    path.display(),
                    layout.vintage
                )],
            });
        }
        Ok(layout)
    }

    /// Vintages with a layout file for `dataset`, in string order.
    ///
    /// A vintage never contains `_`, so `cms_gpci_2025.json` is not read as a
    /// layout of `cms`.
    pub fn layout_vintages(&self, dataset: &str) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.layouts_dir).map_err(|source| SchemaError::Io {
            path: self.layouts_dir.clone(),
            source,
        })?;
        let prefix = format!("{dataset}_");
        let mut vintages = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| SchemaError::Io {
                path: self.layouts_dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let vintage = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.strip_prefix(prefix.as_str()));
            if let Some(v) = vintage.filter(|v| !v.is_empty() && !v.contains('_')) {
                vintages.insert(v.to_string());
            }
        }
        Ok(vintages.into_iter().collect())
    }

    /// A registry holding every layout on disk for every stored dataset.
    ///
    /// # Errors
    ///
    /// I/O errors and any layout that fails to load.
    pub fn layout_registry(&self) -> Result<LayoutRegistry> {
        let mut registry = LayoutRegistry::new();
        for dataset in self.datasets()? {
            for vintage in self.layout_vintages(&dataset)? {
                registry.register(self.load_layout(&dataset, &vintage)?);
            }
        }
        Ok(registry)
    }

    /// Load the API mapping for `dataset`, or `None` if it has none.
    ///
    /// # Errors
    ///
    /// I/O, JSON, or meta-schema errors for a file that exists.
    pub fn load_mapping(&self, dataset: &str) -> Result<Option<ApiMapping>> {
        let path = self.mappings_dir.join(format!("{dataset}.json"));
        if !path.exists() {
            return Ok(None);
        }
        let text = read_definition(&path, "mapping", dataset)?;
        let document = path.display().to_string();
        let value = parse_document(DocumentKind::ApiMapping, &text, &document)?;
        let mapping = serde_json::from_value(value)
            .map_err(|source| SchemaError::InvalidJson { path: document, source })?;
        Ok(Some(mapping))
    }
}

fn read_definition(path: &Path, kind: &'static str, dataset: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SchemaError::ContractNotFound {
                kind,
                dataset: dataset.to_string(),
                detail: format!("{} does not exist", path.display()),
            }
        } else {
            SchemaError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
