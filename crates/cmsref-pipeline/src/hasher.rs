//! # Row Hasher
//!
//! Computes `row_content_hash` from a record's data columns.
//!
//! ## Invariant
//!
//! The hash is a pure function of the record's values and the contract:
//! columns are visited in `column_order` (never map order), each value is
//! rendered to one canonical text form, the renderings are joined into
//! [`CanonicalBytes`], and SHA-256 runs over those bytes. Metadata columns
//! are not in `column_order` and so never affect the hash; two releases
//! carrying the same row produce the same hash.
//!
//! | Type | Rendering |
//! |---|---|
//! | decimal | contract scale, trailing zeros kept (`0.00`) |
//! | integer | base 10 |
//! | date | `YYYY-MM-DD` |
//! | modifier list | `modifier_key` (`null` when empty) |
//! | text | as is |
//! | null | empty string |

use cmsref_core::{sha256_hex, CanonicalBytes, FieldValue};
use cmsref_ingest::{HashedRecord, ParsedRecord};
use cmsref_schema::{ColumnSpec, SchemaContract};

use crate::error::{PipelineError, Result};

/// Canonical text of one value under its column spec.
pub fn render_value(value: &FieldValue, spec: Option<&ColumnSpec>) -> String {
    match value {
        FieldValue::Decimal(d) => {
            let mut d = *d;
            if let Some(scale) = spec.and_then(|s| s.scale) {
                d.rescale(scale);
            }
            d.to_string()
        }
        other => other.key_text(),
    }
}

/// Canonical bytes of a record's data columns.
///
/// # Errors
///
/// [`PipelineError::Canonicalization`] when a value contains the field
/// delimiter. The structural tier rejects such rows, so this only fires for
/// records that bypassed validation.
pub fn canonical_row(record: &ParsedRecord, contract: &SchemaContract) -> Result<CanonicalBytes> {
    let fields = contract.column_order.iter().map(|column| {
        record
            .value(column)
            .map(|v| render_value(v, contract.column(column)))
            .unwrap_or_default()
    });
    CanonicalBytes::from_fields(fields).map_err(|source| PipelineError::Canonicalization {
        row_num: record.row_num,
        source,
    })
}

/// 64-character lowercase hex content hash of a record.
///
/// # Errors
///
/// As [`canonical_row`].
pub fn compute_row_hash(record: &ParsedRecord, contract: &SchemaContract) -> Result<String> {
    Ok(sha256_hex(&canonical_row(record, contract)?))
}

/// Hash a validated record and seal it.
///
/// # Errors
///
/// As [`canonical_row`].
pub fn hash_record(record: ParsedRecord, contract: &SchemaContract) -> Result<HashedRecord> {
    let hash = compute_row_hash(&record, contract)?;
    Ok(HashedRecord::seal(record, hash))
}

/// Recompute a sealed record's hash and compare.
///
/// # Errors
///
/// [`PipelineError::HashDeterminism`] on mismatch.
pub fn verify_hash(record: &HashedRecord, contract: &SchemaContract) -> Result<()> {
    let recomputed = compute_row_hash(record.record(), contract)?;
    if recomputed != record.row_content_hash() {
        return Err(PipelineError::HashDeterminism {
            row_num: record.row_num(),
            stored: record.row_content_hash().to_string(),
            recomputed,
        });
    }
    Ok(())
}
