//! # Fixed-Width Layouts
//!
//! Column positions for one dataset vintage, and the registry that serves
//! them.
//!
//! Positions are zero-based character offsets with an exclusive end; an
//! `end` of `null` reads to the end of the line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::contract::ColumnType;
use crate::error::{Result, SchemaError};
use crate::validate::{parse_document, DocumentKind};

/// Position and type of one fixed-width column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutColumn {
    /// First character (zero-based).
    pub start: usize,
    /// One past the last character, or `None` for end of line.
    pub end: Option<usize>,
    /// Logical type, mirrored from the contract.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether a blank field is permitted.
    pub nullable: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutFile {
    version: String,
    min_line_length: usize,
    columns: BTreeMap<String, LayoutColumn>,
}

/// Layout of one dataset vintage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDefinition {
    /// Dataset identifier.
    pub dataset_name: String,
    /// Release vintage, e.g. `2025D`.
    pub vintage: String,
    /// Lines shorter than this are rejected without field extraction.
    pub min_line_length: usize,
    /// Column name → position.
    pub columns: BTreeMap<String, LayoutColumn>,
}

impl LayoutDefinition {
    /// Parse and check a layout file for `dataset`. The vintage comes from
    /// the file's `version` field.
    ///
    /// # Errors
    ///
    /// Meta-schema violations, JSON errors, or [`SchemaError::MalformedLayout`].
    pub fn from_json_str(dataset: &str, text: &str, document: &str) -> Result<Self> {
        let value = parse_document(DocumentKind::Layout, text, document)?;
        let file: LayoutFile =
            serde_json::from_value(value).map_err(|source| SchemaError::InvalidJson {
                path: document.to_string(),
                source,
            })?;
        let layout = Self {
            dataset_name: dataset.to_string(),
            vintage: file.version,
            min_line_length: file.min_line_length,
            columns: file.columns,
        };
        layout.check_well_formed()?;
        Ok(layout)
    }

    /// Column positions that cannot be extracted.
    pub fn well_formedness_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut open_ended = Vec::new();
        for (name, col) in &self.columns {
            match col.end {
                Some(end) if end <= col.start => problems.push(format!(
                    "column '{name}' ends at {end}, not after its start {}",
                    col.start
                )),
                Some(_) => {}
                None => open_ended.push((name, col.start)),
            }
        }
        if open_ended.len() > 1 {
            problems.push("more than one column reads to end of line".to_string());
        }
        for (name, start) in open_ended {
            if let Some((other, _)) = self.columns.iter().find(|(_, c)| c.start > start) {
                problems.push(format!(
                    "column '{name}' reads to end of line but '{other}' starts after it"
                ));
            }
        }
        problems
    }

    fn check_well_formed(&self) -> Result<()> {
        let problems = self.well_formedness_problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MalformedLayout {
                dataset: self.dataset_name.clone(),
                vintage: self.vintage.clone(),
                problems,
            })
        }
    }

    /// Columns sorted by start position.
    pub fn columns_by_position(&self) -> Vec<(&str, &LayoutColumn)> {
        let mut cols: Vec<_> = self.columns.iter().map(|(n, c)| (n.as_str(), c)).collect();
        cols.sort_by_key(|(_, c)| c.start);
        cols
    }
}

/// Explicit `(dataset, vintage) → layout` registry.
///
/// Populated only through [`LayoutRegistry::register`]; nothing is
/// discovered by name.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    layouts: BTreeMap<(String, String), LayoutDefinition>,
}

impl LayoutRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The layouts shipped in this repository's `layouts/` directory.
    ///
    /// # Errors
    ///
    /// Only if a shipped layout is invalid, which the alignment tests catch.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(LayoutDefinition::from_json_str(
            "cms_pprrvu",
            include_str!("../../../layouts/cms_pprrvu_2025D.json"),
            "layouts/cms_pprrvu_2025D.json",
        )?);
        registry.register(LayoutDefinition::from_json_str(
            "cms_gpci",
            include_str!("../../../layouts/cms_gpci_2025.json"),
            "layouts/cms_gpci_2025.json",
        )?);
        registry.register(LayoutDefinition::from_json_str(
            "cms_locco",
            include_str!("../../../layouts/cms_locco_2025.json"),
            "layouts/cms_locco_2025.json",
        )?);
        Ok(registry)
    }

    /// Add a layout, returning any layout it replaced.
    pub fn register(&mut self, layout: LayoutDefinition) -> Option<LayoutDefinition> {
        let key = (layout.dataset_name.clone(), layout.vintage.clone());
        let replaced = self.layouts.insert(key, layout);
        if let Some(old) = &replaced {
            tracing::warn!(
                dataset = %old.dataset_name,
                vintage = %old.vintage,
                "layout registration replaced an existing entry"
            );
        }
        replaced
    }

    /// Exact lookup.
    pub fn get(&self, dataset: &str, vintage: &str) -> Option<&LayoutDefinition> {
        self.layouts
            .get(&(dataset.to_string(), vintage.to_string()))
    }

    /// The exact vintage when given, otherwise the latest registered one.
    ///
    /// # Errors
    ///
    /// [`SchemaError::ContractNotFound`] when nothing matches.
    pub fn resolve(&self, dataset: &str, vintage: Option<&str>) -> Result<&LayoutDefinition> {
        let found = match vintage {
            Some(v) => self.get(dataset, v),
            None => self.vintages(dataset).last().and_then(|v| self.get(dataset, v)),
        };
        found.ok_or_else(|| SchemaError::ContractNotFound {
            kind: "layout",
            dataset: dataset.to_string(),
            detail: match vintage {
                Some(v) => format!("vintage {v} is not registered"),
                None => "no layouts registered".to_string(),
            },
        })
    }

    /// Registered vintages for `dataset`, oldest first.
    pub fn vintages(&self, dataset: &str) -> Vec<&str> {
        self.layouts
            .keys()
            .filter(|(d, _)| d == dataset)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Every registered layout, ordered by dataset then vintage.
    pub fn iter(&self) -> impl Iterator<Item = &LayoutDefinition> {
        self.layouts.values()
    }

    /// Number of registered layouts.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &str = r#"{
        "version": "2024A",
        "min_line_length": 7,
        "columns": {
            "code": {"start": 0, "end": 5, "type": "string", "nullable": false},
            "mods": {"start": 5, "end": 7, "type": "modifier_list", "nullable": true},
            "note": {"start": 7, "end": null, "type": "string", "nullable": true}
        }
    }"#;

    #[test]
    fn parses_layout_with_open_end() {
        let layout = LayoutDefinition::from_json_str("cms_tiny", TINY, "tiny.json").unwrap();
        assert_eq!(layout.vintage, "2024A");
        assert_eq!(layout.columns["note"].end, None);
        let names: Vec<_> = layout.columns_by_position().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["code", "mods", "note"]);
    }

    #[test]
    fn end_before_start_is_malformed() {
        let text = TINY.replace(r#""start": 5, "end": 7"#, r#""start": 5, "end": 5"#);
        let err = LayoutDefinition::from_json_str("cms_tiny", &text, "tiny.json").unwrap_err();
        assert!(matches!(err, SchemaError::MalformedLayout { .. }));
    }

    #[test]
    fn open_end_must_be_last() {
        let text = TINY.replace(r#""start": 7, "end": null"#, r#""start": 3, "end": null"#);
        let err = LayoutDefinition::from_json_str("cms_tiny", &text, "tiny.json").unwrap_err();
        assert!(err.to_string().contains("reads to end of line"));
    }

    #[test]
    fn builtin_registers_shipped_layouts() {
        let registry = LayoutRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("cms_pprrvu", "2025D").is_some());
        assert_eq!(registry.vintages("cms_gpci"), ["2025"]);
    }

    #[test]
    fn resolve_picks_latest_vintage() {
        let mut registry = LayoutRegistry::new();
        let base = LayoutDefinition::from_json_str("cms_tiny", TINY, "tiny.json").unwrap();
        let mut newer = base.clone();
        newer.vintage = "2024C".into();
        registry.register(base);
        registry.register(newer);

        assert_eq!(registry.resolve("cms_tiny", None).unwrap().vintage, "2024C");
        assert_eq!(
            registry.resolve("cms_tiny", Some("2024A")).unwrap().vintage,
            "2024A"
        );
    }

    #[test]
    fn resolve_missing_is_contract_not_found() {
        let registry = LayoutRegistry::new();
        let err = registry.resolve("cms_tiny", Some("2024A")).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::ContractNotFound { kind: "layout", .. }
        ));
    }

    #[test]
    fn register_returns_replaced_layout() {
        let mut registry = LayoutRegistry::new();
        let layout = LayoutDefinition::from_json_str("cms_tiny", TINY, "tiny.json").unwrap();
        assert!(registry.register(layout.clone()).is_none());
        assert!(registry.register(layout).is_some());
        assert_eq!(registry.len(), 1);
    }
}
