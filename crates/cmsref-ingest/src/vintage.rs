//! # Vintage & Release Metadata
//!
//! Derives product year, quarter, release id, and vintage date for a source
//! file. Sources are tried in priority order: a parseable manifest, then an
//! explicit release id, then the filename.
//!
//! Extraction never fails. Anything missing falls back to a default and is
//! reported in [`VintageMetadata::warnings`]; a defaulted year also sets
//! [`VintageMetadata::degraded`].

use chrono::NaiveDate;
use cmsref_core::{Cycle, Quarter, TemporalError, Timestamp};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Product year used when no source names one.
pub const DEFAULT_PRODUCT_YEAR: &str = "2025";

/// Which input supplied the vintage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// `release_id` or `vintage` in the release manifest.
    Manifest,
    /// Caller-supplied release id.
    ReleaseId,
    /// Source filename.
    Filename,
}

/// A recoverable metadata problem. Recorded, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetadataExtractionError {
    /// The manifest is not JSON.
    #[error("manifest is not valid JSON: {reason}")]
    UnparseableManifest {
        /// Parser message.
        reason: String,
    },

    /// The manifest is JSON but names no vintage.
    #[error("manifest has no string \"release_id\" or \"vintage\" field")]
    ManifestWithoutVintage,

    /// No four-digit 20xx year anywhere in the winning source.
    #[error("no product year in {input:?}; defaulted to {DEFAULT_PRODUCT_YEAR}")]
    YearNotFound {
        /// Text searched.
        input: String,
    },
}

/// Inputs to [`extract_vintage`].
#[derive(Debug, Clone, Copy)]
pub struct VintageInputs<'a> {
    /// Dataset name, the release id prefix.
    pub dataset: &'a str,
    /// Source filename (no directory needed).
    pub filename: &'a str,
    /// Explicit release id from the caller, if any.
    pub release_id: Option<&'a str>,
    /// Release manifest JSON text, if any.
    pub manifest: Option<&'a str>,
    /// Release timestamp, rendered compactly into the release id.
    pub timestamp: Timestamp,
}

/// Derived release metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VintageMetadata {
    /// Four-digit year.
    pub product_year: String,
    /// Quarter, or `None` for an annual release.
    pub quarter: Option<Quarter>,
    /// `2025Q4` or `2025_annual`.
    pub quarter_vintage: String,
    /// `{dataset}_{year}_{Qn|annual}_{YYYYMMDDTHHMMSSZ}`.
    pub release_id: String,
    /// First day of the quarter, or January 1 for annual releases.
    pub vintage_date: NaiveDate,
    /// Which input won.
    pub source: MetadataSource,
    /// True when the year was defaulted.
    pub degraded: bool,
    /// Everything that fell back.
    pub warnings: Vec<MetadataExtractionError>,
}

/// Compiled vintage patterns.
#[derive(Debug, Clone)]
pub struct VintageExtractor {
    year: Regex,
    quarter: Regex,
    revision: Regex,
}

impl VintageExtractor {
    /// Compile the year, quarter, and revision-letter patterns.
    ///
    /// # Errors
    ///
    /// Only if a built-in pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            year: Regex::new(r"20\d{2}")?,
            quarter: Regex::new(r"(?:^|[^A-Za-z])[Qq]([1-4])(?:[^0-9]|$)")?,
            revision: Regex::new(r"(?i)(?:20\d{2}|\d{2})[_\-]?([a-d])(?:[^a-z]|$)")?,
        })
    }

    /// Derive release metadata from `inputs`.
    pub fn extract(&self, inputs: &VintageInputs<'_>) -> VintageMetadata {
        let mut warnings = Vec::new();
        let (text, source) = pick_source(inputs, &mut warnings);
        let text = text.as_str();

        let (product_year, degraded) = match self.year.find(text) {
            Some(m) => (m.as_str().to_string(), false),
            None => {
                tracing::warn!(input = text, "no product year found; using default");
                warnings.push(MetadataExtractionError::YearNotFound {
                    input: text.to_string(),
                });
                (DEFAULT_PRODUCT_YEAR.to_string(), true)
            }
        };

        let quarter = self.quarter_of(text);
        let period = quarter.map_or_else(|| "annual".to_string(), |q| q.to_string());
        let quarter_vintage = match quarter {
            Some(q) => format!("{product_year}{q}"),
            None => format!("{product_year}_annual"),
        };
        let release_id = format!(
            "{}_{product_year}_{period}_{}",
            inputs.dataset,
            inputs.timestamp.to_compact()
        );
        let vintage_date = first_day(&product_year, quarter).unwrap_or_default();

        VintageMetadata {
            product_year,
            quarter,
            quarter_vintage,
            release_id,
            vintage_date,
            source,
            degraded,
            warnings,
        }
    }

    /// Explicit `Qn`, else a revision letter A–D mapped to its quarter.
    fn quarter_of(&self, text: &str) -> Option<Quarter> {
        if let Some(n) = self
            .quarter
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            return Quarter::from_number(n).ok();
        }
        self.revision
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| Cycle::parse(m.as_str()).ok())
            .map(|cycle| cycle.quarter())
    }
}

fn pick_source(
    inputs: &VintageInputs<'_>,
    warnings: &mut Vec<MetadataExtractionError>,
) -> (String, MetadataSource) {
    if let Some(manifest) = inputs.manifest {
        match serde_json::from_str::<serde_json::Value>(manifest) {
            Ok(value) => {
                let named = ["release_id", "vintage"]
                    .iter()
                    .find_map(|key| value.get(key).and_then(|v| v.as_str()))
                    .filter(|s| !s.trim().is_empty());
                if let Some(named) = named {
                    return (named.to_string(), MetadataSource::Manifest);
                }
                warnings.push(MetadataExtractionError::ManifestWithoutVintage);
            }
            Err(e) => warnings.push(MetadataExtractionError::UnparseableManifest {
                reason: e.to_string(),
            }),
        }
        tracing::warn!("release manifest unusable; falling back");
    }
    match inputs.release_id.filter(|r| !r.trim().is_empty()) {
        Some(release_id) => (release_id.to_string(), MetadataSource::ReleaseId),
        None => (inputs.filename.to_string(), MetadataSource::Filename),
    }
}

fn first_day(year: &str, quarter: Option<Quarter>) -> Result<NaiveDate, TemporalError> {
    let year: i32 = year
        .parse()
        .map_err(|_| TemporalError::InvalidDate(year.to_string()))?;
    match quarter {
        Some(q) => q.bounds(year).map(|(start, _)| start),
        None => NaiveDate::from_ymd_opt(year, 1, 1).ok_or(TemporalError::InvalidYear(year)),
    }
}

/// Derive release metadata with a freshly compiled [`VintageExtractor`].
///
/// # Errors
///
/// Only if a built-in pattern fails to compile. Missing metadata is never
/// an error.
pub fn extract_vintage(inputs: &VintageInputs<'_>) -> Result<VintageMetadata, regex::Error> {
    Ok(VintageExtractor::new()?.extract(inputs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> Timestamp {
        Timestamp::parse("2025-10-01T12:00:00Z").unwrap()
    }

    fn inputs<'a>(
        filename: &'a str,
        release_id: Option<&'a str>,
        manifest: Option<&'a str>,
    ) -> VintageInputs<'a> {
        VintageInputs {
            dataset: "cms_pprrvu",
            filename,
            release_id,
            manifest,
            timestamp: ts(),
        }
    }

    fn extract(i: VintageInputs<'_>) -> VintageMetadata {
        extract_vintage(&i).unwrap()
    }

    #[test]
    fn filename_with_explicit_quarter() {
        let m = extract(inputs("PPRRVU2025_Q4.txt", None, None));
        assert_eq!(m.product_year, "2025");
        assert_eq!(m.quarter, Some(Quarter::Q4));
        assert_eq!(m.quarter_vintage, "2025Q4");
        assert_eq!(m.release_id, "cms_pprrvu_2025_Q4_20251001T120000Z");
        assert_eq!(m.vintage_date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(m.source, MetadataSource::Filename);
        assert!(!m.degraded);
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn revision_letter_maps_to_quarter() {
        let m = extract(inputs("RVU2024B.zip", None, None));
        assert_eq!(m.quarter, Some(Quarter::Q2));
        assert_eq!(m.vintage_date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }

    #[test]
    fn no_quarter_is_annual() {
        let m = extract(inputs("GPCI2026.csv", None, None));
        assert_eq!(m.quarter, None);
        assert_eq!(m.quarter_vintage, "2026_annual");
        assert_eq!(m.release_id, "cms_pprrvu_2026_annual_20251001T120000Z");
        assert_eq!(m.vintage_date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }

    #[test]
    fn missing_year_defaults_and_degrades() {
        let m = extract(inputs("RVU25D.txt", None, None));
        assert_eq!(m.product_year, DEFAULT_PRODUCT_YEAR);
        assert!(m.degraded);
        assert_eq!(m.quarter, Some(Quarter::Q4));
        assert!(matches!(
            m.warnings.as_slice(),
            [MetadataExtractionError::YearNotFound { .. }]
        ));
    }

    #[test]
    fn manifest_outranks_release_id_and_filename() {
        let m = extract(inputs(
            "x_2023.txt",
            Some("2025Q3"),
            Some(r#"{"release_id": "RVU2024A", "files": []}"#),
        ));
        assert_eq!(m.source, MetadataSource::Manifest);
        assert_eq!(m.product_year, "2024");
        assert_eq!(m.quarter, Some(Quarter::Q1));
    }

    #[test]
    fn manifest_vintage_field_is_accepted() {
        let m = extract(inputs("x.txt", None, Some(r#"{"vintage": "2025 Q2"}"#)));
        assert_eq!(m.source, MetadataSource::Manifest);
        assert_eq!(m.quarter_vintage, "2025Q2");
    }

    #[test]
    fn unparseable_manifest_falls_back_with_warning() {
        let m = extract(inputs("x_2023.txt", Some("2025Q3"), Some("{oops")));
        assert_eq!(m.source, MetadataSource::ReleaseId);
        assert_eq!(m.quarter_vintage, "2025Q3");
        assert!(matches!(
            m.warnings.as_slice(),
            [MetadataExtractionError::UnparseableManifest { .. }]
        ));
    }

    #[test]
    fn manifest_without_vintage_falls_back_to_filename() {
        let m = extract(inputs("PPRRVU2025_Q1.txt", None, Some(r#"{"files": []}"#)));
        assert_eq!(m.source, MetadataSource::Filename);
        assert_eq!(m.warnings, [MetadataExtractionError::ManifestWithoutVintage]);
    }

    #[test]
    fn letters_inside_words_are_not_revisions() {
        let m = extract(inputs("cms_2025_data.csv", None, None));
        assert_eq!(m.quarter, None);
        let m = extract(inputs("FAQ1_2025.csv", None, None));
        assert_eq!(m.quarter, None);
    }
}
