//! # cmsref-ingest: Decoding, Normalization & Vintage Metadata
//!
//! Turns raw release bytes into typed, pre-validation [`ParsedRecord`]s.
//!
//! - [`decode`]: one [`Decoder`] trait with fixed-width and delimited
//!   implementations. Decoders emit raw field maps plus structural findings;
//!   they never fail on row content.
//! - [`normalize`]: decimals, modifier lists, casing, dates, and the
//!   per-row conversion into [`cmsref_core::FieldValue`]s.
//! - [`vintage`]: product year, quarter, release id, and vintage date from
//!   manifest, release id, or filename, with warnings instead of errors.
//! - [`record`]: the record that flows through validation and hashing.

pub mod decode;
pub mod error;
pub mod normalize;
pub mod record;
pub mod vintage;

pub use decode::{
    canonicalize_header, decode_text, DecodedBatch, DecodedRow, Decoder, DelimitedDecoder,
    FixedWidthDecoder, LineFilter,
};
pub use error::{IngestError, NormalizeError, Result};
pub use normalize::{
    normalize_casing, normalize_modifiers, normalize_row, parse_decimal, parse_integer,
};
pub use record::{HashedRecord, ParsedRecord, RecordMetadata};
pub use vintage::{
    extract_vintage, MetadataExtractionError, MetadataSource, VintageExtractor, VintageInputs,
    VintageMetadata, DEFAULT_PRODUCT_YEAR,
};

/// Effective-date arithmetic lives in `cmsref-core`; re-exported here with
/// the rest of the normalizers.
pub use cmsref_core::calculate_effective_dates;
