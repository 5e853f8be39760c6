//! # Definition Meta-Validation
//!
//! Contract, layout, and mapping files are checked against embedded JSON
//! Schema (Draft 2020-12) meta-schemas before they are deserialized.
//!
//! ## Invariant
//!
//! Definition files are a trust boundary: a file that fails meta-validation
//! is rejected with every violation and its JSON Pointer, never partially
//! loaded.

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{Result, SchemaError, Violation};

const CONTRACT_SCHEMA: &str = include_str!("../schemas/contract.schema.json");
const LAYOUT_SCHEMA: &str = include_str!("../schemas/layout.schema.json");
const MAPPING_SCHEMA: &str = include_str!("../schemas/mapping.schema.json");

/// The kinds of definition document this crate loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// `contracts/{dataset}_v{version}.json`
    Contract,
    /// `layouts/{dataset}_{vintage}.json`
    Layout,
    /// `mappings/{dataset}.json`
    ApiMapping,
}

impl DocumentKind {
    /// Filename of the embedded meta-schema.
    pub fn schema_name(self) -> &'static str {
        match self {
            Self::Contract => "contract.schema.json",
            Self::Layout => "layout.schema.json",
            Self::ApiMapping => "mapping.schema.json",
        }
    }

    fn schema_source(self) -> &'static str {
        match self {
            Self::Contract => CONTRACT_SCHEMA,
            Self::Layout => LAYOUT_SCHEMA,
            Self::ApiMapping => MAPPING_SCHEMA,
        }
    }

    /// Compile the meta-schema for this kind.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MetaSchemaBuild`] if the embedded schema is
    /// not valid JSON or not a valid Draft 2020-12 schema.
    pub fn build_validator(self) -> Result<Validator> {
        let schema_name = self.schema_name();
        let schema: Value = serde_json::from_str(self.schema_source()).map_err(|e| {
            SchemaError::MetaSchemaBuild {
                schema_name,
                reason: format!("invalid JSON: {e}"),
            }
        })?;

        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        opts.build(&schema).map_err(|e| SchemaError::MetaSchemaBuild {
            schema_name,
            reason: e.to_string(),
        })
    }

    /// Validate a parsed document against this kind's meta-schema.
    ///
    /// `document` names the file in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MetaSchemaViolation`] listing every violation.
    pub fn validate(self, instance: &Value, document: &str) -> Result<()> {
        let validator = self.build_validator()?;

        let violations: Vec<Violation> = validator
            .iter_errors(instance)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MetaSchemaViolation {
                document: document.to_string(),
                schema_name: self.schema_name(),
                violations,
            })
        }
    }
}

/// Parse `text` as JSON and validate it as a `kind` document.
///
/// # Errors
///
/// [`SchemaError::InvalidJson`] for unparseable text, otherwise whatever
/// [`DocumentKind::validate`] reports.
pub fn parse_document(kind: DocumentKind, text: &str, document: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(text).map_err(|source| SchemaError::InvalidJson {
        path: document.to_string(),
        source,
    })?;
    kind.validate(&value, document)?;
    Ok(value)
}
