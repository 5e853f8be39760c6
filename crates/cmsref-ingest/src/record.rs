//! # Parsed Records
//!
//! A [`ParsedRecord`] is created once per source row, carries typed data
//! values plus the release metadata shared by every row of the file, and
//! moves by value through validation. Hashing consumes it and yields a
//! [`HashedRecord`], which has no mutators.
//!
//! Both serialize to the output record shape: metadata fields first, then
//! data columns in `column_order`, with `modifier_key` emitted right after
//! the modifier list column.

use chrono::NaiveDate;
use cmsref_core::{source_sha256_hex, FieldValue, Timestamp, ValidationFinding};
use cmsref_schema::SchemaContract;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::decode::DecodedRow;
use crate::normalize::normalize_row;
use crate::vintage::VintageMetadata;

/// Release metadata stamped on every record of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMetadata {
    /// Release identifier.
    pub release_id: String,
    /// First effective day of the release.
    pub vintage_date: NaiveDate,
    /// Four-digit product year.
    pub product_year: String,
    /// `2025Q4` or `2025_annual`.
    pub quarter_vintage: String,
    /// Source filename.
    pub source_filename: String,
    /// SHA-256 of the raw source bytes.
    pub source_file_sha256: String,
    /// When the file was parsed.
    pub parsed_at: Timestamp,
}

impl RecordMetadata {
    /// Metadata for a source file whose vintage has been extracted.
    pub fn new(
        vintage: &VintageMetadata,
        source_filename: impl Into<String>,
        source_bytes: &[u8],
        parsed_at: Timestamp,
    ) -> Self {
        Self {
            release_id: vintage.release_id.clone(),
            vintage_date: vintage.vintage_date,
            product_year: vintage.product_year.clone(),
            quarter_vintage: vintage.quarter_vintage.clone(),
            source_filename: source_filename.into(),
            source_file_sha256: source_sha256_hex(source_bytes),
            parsed_at,
        }
    }
}

/// A decoded, normalized row awaiting validation and hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// 1-based data-row number within the source file.
    pub row_num: usize,
    /// Data values in `column_order`.
    pub values: Vec<(String, FieldValue)>,
    /// Release metadata.
    pub metadata: RecordMetadata,
    /// Structural findings from decoding and normalization.
    pub findings: Vec<ValidationFinding>,
    /// False when the row was rejected before field extraction.
    pub extracted: bool,
}

impl ParsedRecord {
    /// Normalize a decoded row against `contract`.
    pub fn from_decoded(row: &DecodedRow, contract: &SchemaContract, metadata: RecordMetadata) -> Self {
        let (values, findings) = normalize_row(row, contract);
        Self {
            row_num: row.row_num,
            values,
            metadata,
            findings,
            extracted: row.extracted,
        }
    }

    /// Value of a data column.
    pub fn value(&self, column: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Replace a data column's value. Returns false if the column is unknown.
    pub fn set_value(&mut self, column: &str, value: FieldValue) -> bool {
        match self.values.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Whether the named column is null (or absent).
    pub fn is_null(&self, column: &str) -> bool {
        self.value(column).map_or(true, FieldValue::is_null)
    }
}

/// A validated record with its content hash attached. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedRecord {
    record: ParsedRecord,
    row_content_hash: String,
}

impl HashedRecord {
    /// Attach a content hash, consuming the record.
    pub fn seal(record: ParsedRecord, row_content_hash: String) -> Self {
        Self {
            record,
            row_content_hash,
        }
    }

    /// The underlying record.
    pub fn record(&self) -> &ParsedRecord {
        &self.record
    }

    /// 64-char lowercase hex content hash.
    pub fn row_content_hash(&self) -> &str {
        &self.row_content_hash
    }

    /// Value of a data column.
    pub fn value(&self, column: &str) -> Option<&FieldValue> {
        self.record.value(column)
    }

    /// 1-based data-row number.
    pub fn row_num(&self) -> usize {
        self.record.row_num
    }
}

fn serialize_record<S: Serializer>(
    serializer: S,
    record: &ParsedRecord,
    row_content_hash: Option<&str>,
) -> Result<S::Ok, S::Error> {
    let m = &record.metadata;
    let mut map = serializer.serialize_map(None)?;
    map.serialize_entry("release_id", &m.release_id)?;
    map.serialize_entry("vintage_date", &m.vintage_date.format("%Y-%m-%d").to_string())?;
    map.serialize_entry("product_year", &m.product_year)?;
    map.serialize_entry("quarter_vintage", &m.quarter_vintage)?;
    map.serialize_entry("source_filename", &m.source_filename)?;
    map.serialize_entry("source_file_sha256", &m.source_file_sha256)?;
    map.serialize_entry("parsed_at", &m.parsed_at.to_iso8601())?;
    if let Some(hash) = row_content_hash {
        map.serialize_entry("row_content_hash", hash)?;
    }
    map.serialize_entry("row_num", &record.row_num)?;
    for (name, value) in &record.values {
        map.serialize_entry(name, value)?;
        if let FieldValue::Modifiers(set) = value {
            map.serialize_entry("modifier_key", set.modifier_key())?;
        }
    }
    map.end()
}

impl Serialize for ParsedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_record(serializer, self, None)
    }
}

impl Serialize for HashedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_record(serializer, &self.record, Some(&self.row_content_hash))
    }
}
