//! Fixed-width decoding driven by a [`LayoutDefinition`].

use std::collections::BTreeMap;

use cmsref_core::ValidationFinding;
use cmsref_schema::{LayoutColumn, LayoutDefinition};

use super::{decode_text, DecodedBatch, DecodedRow, Decoder, LineFilter, FALLBACK_ENCODING_WARNING};
use crate::error::Result;

/// Slices each line at the layout's column positions.
#[derive(Debug)]
pub struct FixedWidthDecoder {
    layout: LayoutDefinition,
    filter: LineFilter,
}

impl FixedWidthDecoder {
    /// A decoder for `layout` that skips nothing.
    pub fn new(layout: LayoutDefinition) -> Self {
        Self {
            layout,
            filter: LineFilter::none(),
        }
    }

    /// Skip header, separator, and trailer lines matched by `filter`.
    pub fn with_filter(mut self, filter: LineFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The layout in use.
    pub fn layout(&self) -> &LayoutDefinition {
        &self.layout
    }

    fn decode_line(&self, line: &str, row_num: usize) -> DecodedRow {
        let chars: Vec<char> = line.chars().collect();

        if chars.len() < self.layout.min_line_length {
            return DecodedRow {
                row_num,
                fields: BTreeMap::new(),
                findings: vec![ValidationFinding::structural(
                    "structural.short_line",
                    format!(
                        "line has {} characters, layout {} {} requires at least {}",
                        chars.len(),
                        self.layout.dataset_name,
                        self.layout.vintage,
                        self.layout.min_line_length
                    ),
                    row_num,
                )],
                extracted: false,
            };
        }

        let mut fields = BTreeMap::new();
        let mut findings = Vec::new();
        for (name, col) in &self.layout.columns {
            let value = slice_column(&chars, col);
            if value.is_none() && !col.nullable {
                findings.push(
                    ValidationFinding::structural(
                        "structural.unexpected_blank",
                        format!(
                            "unexpected blank in non-nullable column at [{}, {})",
                            col.start,
                            col.end.map_or_else(|| "eol".to_string(), |e| e.to_string())
                        ),
                        row_num,
                    )
                    .with_column(name.as_str()),
                );
            }
            fields.insert(name.clone(), value);
        }

        DecodedRow {
            row_num,
            fields,
            findings,
            extracted: true,
        }
    }
}

/// `line[start:end)`, right-trimmed; `None` when blank or past the end.
fn slice_column(chars: &[char], col: &LayoutColumn) -> Option<String> {
    let start = col.start.min(chars.len());
    let end = col.end.unwrap_or(chars.len()).min(chars.len()).max(start);
    let value: String = chars[start..end].iter().collect();
    let trimmed = value.trim_end();
    if trimmed.trim_start().is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Decoder for FixedWidthDecoder {
    fn format(&self) -> &'static str {
        "fixed_width"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedBatch> {
        let (text, fallback) = decode_text(bytes);
        let mut batch = DecodedBatch::default();
        if fallback {
            batch.warnings.push(FALLBACK_ENCODING_WARNING.to_string());
        }

        let mut row_num = 0;
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            if self.filter.should_skip(line) {
                batch.skipped_lines += 1;
                continue;
            }
            row_num += 1;
            batch.rows.push(self.decode_line(line, row_num));
        }

        tracing::debug!(
            dataset = %self.layout.dataset_name,
            vintage = %self.layout.vintage,
            rows = batch.rows.len(),
            skipped = batch.skipped_lines,
            "decoded fixed-width input"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmsref_schema::ColumnType;

    fn layout() -> LayoutDefinition {
        let mut columns = BTreeMap::new();
        let mut add = |name: &str, start, end, column_type, nullable| {
            columns.insert(
                name.to_string(),
                LayoutColumn {
                    start,
                    end,
                    column_type,
                    nullable,
                },
            );
        };
        add("code", 0, Some(5), ColumnType::String, false);
        add("mods", 5, Some(7), ColumnType::ModifierList, true);
        add("rvu", 7, Some(13), ColumnType::Decimal, true);
        add("note", 13, None, ColumnType::String, true);
        LayoutDefinition {
            dataset_name: "cms_tiny".into(),
            vintage: "2025".into(),
            min_line_length: 13,
            columns,
        }
    }

    fn decode(input: &str) -> DecodedBatch {
        FixedWidthDecoder::new(layout())
            .with_filter(LineFilter::prefixes(["HDR"]))
            .decode(input.as_bytes())
            .unwrap()
    }

    #[test]
    fn extracts_and_right_trims() {
        let batch = decode("0010026  1.50trailing text  \n");
        let row = &batch.rows[0];
        assert_eq!(row.row_num, 1);
        assert_eq!(row.field("code"), Some("00100"));
        assert_eq!(row.field("mods"), Some("26"));
        assert_eq!(row.field("rvu"), Some("  1.50"));
        assert_eq!(row.field("note"), Some("trailing text"));
        assert!(row.findings.is_empty());
    }

    #[test]
    fn blank_nullable_is_none() {
        let batch = decode("00100    0.00\n");
        let row = &batch.rows[0];
        assert_eq!(row.fields["mods"], None);
        assert_eq!(row.fields["note"], None);
        assert!(row.findings.is_empty());
    }

    #[test]
    fn blank_required_is_structural_finding() {
        let batch = decode("         0.00\n");
        let row = &batch.rows[0];
        assert_eq!(row.findings.len(), 1);
        assert_eq!(row.findings[0].rule_id, "structural.unexpected_blank");
        assert_eq!(row.findings[0].column.as_deref(), Some("code"));
    }

    #[test]
    fn short_line_gets_one_finding_and_no_fields() {
        let batch = decode("00100\n");
        let row = &batch.rows[0];
        assert!(!row.extracted);
        assert!(row.fields.is_empty());
        assert_eq!(row.findings.len(), 1);
        assert_eq!(row.findings[0].rule_id, "structural.short_line");
    }

    #[test]
    fn skipped_and_blank_lines_do_not_count() {
        let batch = decode("HDR 2025\r\n0010026  1.50\r\n\r\n0010126  2.00\r\n");
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.skipped_lines, 1);
        assert_eq!(batch.rows[1].row_num, 2);
        assert_eq!(batch.rows[1].field("code"), Some("00101"));
    }

    #[test]
    fn positions_are_characters_not_bytes() {
        let batch = decode("ÑÑÑÑÑ26  1.50x\n");
        let row = &batch.rows[0];
        assert_eq!(row.field("code"), Some("ÑÑÑÑÑ"));
        assert_eq!(row.field("mods"), Some("26"));
        assert_eq!(row.field("note"), Some("x"));
    }
}
