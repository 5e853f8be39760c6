//! # Format Decoders
//!
//! A [`Decoder`] turns the raw bytes of one source file into one raw field
//! map per data row. Per-dataset differences (column positions, header
//! names, delimiter) are data handed to the decoder, not code.
//!
//! ## Invariants
//!
//! - `row_num` is 1-based and counts data rows only; skipped and blank
//!   lines do not advance it.
//! - A field is `None` exactly when the source value is blank or absent.
//! - Problems with a row are structural findings on that row. A decoder
//!   returns `Err` only when the input has no usable table shape.

mod delimited;
mod fixed_width;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use cmsref_core::ValidationFinding;

use crate::error::Result;

pub use delimited::{canonicalize_header, DelimitedDecoder};
pub use fixed_width::FixedWidthDecoder;

/// Raw fields of one data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRow {
    /// 1-based data-row number within the source file.
    pub row_num: usize,
    /// Column name → trimmed value, `None` for blank or absent.
    pub fields: BTreeMap<String, Option<String>>,
    /// Structural problems found while decoding.
    pub findings: Vec<ValidationFinding>,
    /// False when the row was rejected before any field was extracted.
    pub extracted: bool,
}

impl DecodedRow {
    /// Borrow a field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_deref())
    }
}

/// Everything a decoder produced for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBatch {
    /// Data rows in source order.
    pub rows: Vec<DecodedRow>,
    /// File-level notices: dropped headers, encoding fallback.
    pub warnings: Vec<String>,
    /// Lines skipped by the line filter.
    pub skipped_lines: usize,
}

/// Decodes one source file.
pub trait Decoder {
    /// Short format name for logs.
    fn format(&self) -> &'static str;

    /// Decode raw file bytes.
    ///
    /// # Errors
    ///
    /// Only when the input has no usable table shape.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedBatch>;
}

/// Decode source bytes as UTF-8, falling back to Windows-1252.
///
/// A leading UTF-8 byte-order mark is dropped. The flag is true when the
/// Windows-1252 fallback was used. Bytes 0x80-0x9F map through the cp1252
/// table (0x92 is U+2019), never to C1 controls.
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), false),
        Err(_) => (encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes).0, true),
    }
}

/// File-level notice recorded when [`decode_text`] used its fallback.
pub const FALLBACK_ENCODING_WARNING: &str = "input is not valid UTF-8; decoded as Windows-1252";

/// Decides which physical lines are headers, separators, or trailers.
pub struct LineFilter {
    prefixes: Vec<String>,
    predicate: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl LineFilter {
    /// Skip nothing.
    pub fn none() -> Self {
        Self {
            prefixes: Vec::new(),
            predicate: None,
        }
    }

    /// Skip lines starting with any of `prefixes`.
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
            predicate: None,
        }
    }

    /// Also skip lines for which `predicate` returns true.
    pub fn with_predicate(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Whether `line` should be skipped.
    pub fn should_skip(&self, line: &str) -> bool {
        self.prefixes.iter().any(|p| line.starts_with(p.as_str()))
            || self.predicate.as_ref().is_some_and(|f| f(line))
    }
}

impl Default for LineFilter {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for LineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineFilter")
            .field("prefixes", &self.prefixes)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
