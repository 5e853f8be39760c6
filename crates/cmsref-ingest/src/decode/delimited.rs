//! Delimited (CSV, TSV, pipe) decoding against a contract's data columns.

use std::collections::{BTreeMap, BTreeSet};

use cmsref_core::ValidationFinding;
use cmsref_schema::SchemaContract;

use super::{decode_text, DecodedBatch, DecodedRow, Decoder, LineFilter, FALLBACK_ENCODING_WARNING};
use crate::error::{IngestError, Result};

/// Canonical column name for a header cell.
///
/// Case is folded, camel-case boundaries and whitespace runs become a
/// single underscore, and other non-alphanumerics are dropped:
/// `"HCPCS Code"`, `"HCPCS_CODE"`, and `"HcpcsCode"` all give `hcpcs_code`.
pub fn canonicalize_header(raw: &str) -> String {
    let chars: Vec<char> = raw.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() || c == '_' {
            out.push('_');
            continue;
        }
        if !c.is_ascii_alphanumeric() {
            continue;
        }
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            // fooBar, or the end of an acronym: HCPCSCode
            if prev.is_ascii_lowercase() || prev.is_ascii_digit() || (prev.is_ascii_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '_' && (collapsed.is_empty() || collapsed.ends_with('_')) {
            continue;
        }
        collapsed.push(c);
    }
    while collapsed.ends_with('_') {
        collapsed.pop();
    }
    collapsed
}

/// Maps header columns onto contract data columns by canonical name.
#[derive(Debug)]
pub struct DelimitedDecoder {
    dataset: String,
    columns: BTreeSet<String>,
    delimiter: u8,
    filter: LineFilter,
}

impl DelimitedDecoder {
    /// Comma-delimited decoder for `contract`'s data columns.
    pub fn new(contract: &SchemaContract) -> Self {
        Self {
            dataset: contract.dataset_name.clone(),
            columns: contract.data_columns().into_iter().map(String::from).collect(),
            delimiter: b',',
            filter: LineFilter::none(),
        }
    }

    /// Use another single-byte delimiter, e.g. `b'\t'` or `b'|'`.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Drop physical lines matched by `filter` before parsing.
    pub fn with_filter(mut self, filter: LineFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Header index → contract column, plus warnings for dropped headers.
    fn map_headers(&self, headers: &csv::StringRecord) -> (Vec<Option<String>>, Vec<String>) {
        let mut mapping = Vec::with_capacity(headers.len());
        let mut warnings = Vec::new();
        let mut seen = BTreeSet::new();

        for raw in headers {
            let name = canonicalize_header(raw);
            if !self.columns.contains(&name) {
                tracing::warn!(dataset = %self.dataset, header = raw, canonical = %name, "dropping unmatched header");
                warnings.push(format!("dropped header {raw:?}: no contract column {name:?}"));
                mapping.push(None);
            } else if !seen.insert(name.clone()) {
                tracing::warn!(dataset = %self.dataset, header = raw, "dropping duplicate header");
                warnings.push(format!("dropped header {raw:?}: duplicate of column {name:?}"));
                mapping.push(None);
            } else {
                mapping.push(Some(name));
            }
        }

        for column in self.columns.difference(&seen) {
            warnings.push(format!("column {column:?} is absent from the header; decoded as null"));
        }
        (mapping, warnings)
    }
}

impl Decoder for DelimitedDecoder {
    fn format(&self) -> &'static str {
        "delimited"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedBatch> {
        let (text, fallback) = decode_text(bytes);
        let mut batch = DecodedBatch::default();
        if fallback {
            batch.warnings.push(FALLBACK_ENCODING_WARNING.to_string());
        }

        let mut kept = String::with_capacity(text.len());
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if self.filter.should_skip(line) {
                batch.skipped_lines += 1;
            } else {
                kept.push_str(line);
                kept.push('\n');
            }
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(kept.as_bytes());

        let headers = reader.headers()?.clone();
        if headers.iter().all(str::is_empty) {
            return Err(IngestError::MissingHeader);
        }
        let (mapping, warnings) = self.map_headers(&headers);
        if mapping.iter().all(Option::is_none) {
            return Err(IngestError::NoMatchingColumns {
                dataset: self.dataset.clone(),
                headers: headers.iter().map(canonicalize_header).collect(),
            });
        }
        batch.warnings.extend(warnings);

        for (i, result) in reader.records().enumerate() {
            let row_num = i + 1;
            let mut fields: BTreeMap<String, Option<String>> =
                self.columns.iter().map(|c| (c.clone(), None)).collect();

            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    batch.rows.push(DecodedRow {
                        row_num,
                        fields: BTreeMap::new(),
                        findings: vec![ValidationFinding::structural(
                            "structural.malformed_record",
                            format!("unreadable record: {e}"),
                            row_num,
                        )],
                        extracted: false,
                    });
                    continue;
                }
            };

            let mut findings = Vec::new();
            if record.len() != headers.len() {
                findings.push(ValidationFinding::structural(
                    "structural.field_count",
                    format!("row has {} fields, header has {}", record.len(), headers.len()),
                    row_num,
                ));
            }
            for (idx, column) in mapping.iter().enumerate() {
                let (Some(column), Some(value)) = (column, record.get(idx)) else {
                    continue;
                };
                if !value.is_empty() {
                    fields.insert(column.clone(), Some(value.to_string()));
                }
            }

            batch.rows.push(DecodedRow {
                row_num,
                fields,
                findings,
                extracted: true,
            });
        }

        tracing::debug!(
            dataset = %self.dataset,
            rows = batch.rows.len(),
            warnings = batch.warnings.len(),
            "decoded delimited input"
        );
        Ok(batch)
    }
}
