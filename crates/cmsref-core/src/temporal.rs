//! # Temporal Types: Timestamps, Quarters, Effective Dates
//!
//! `Timestamp` is UTC-only and truncated to seconds so that `parsed_at` and
//! release identifiers have one textual form. `Quarter` and `Cycle` model the
//! quarterly release cadence of the reference data: a release cycle letter
//! A–D maps onto calendar quarters Q1–Q4 of the release year.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TemporalError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 timestamp. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, TemporalError> {
        if !s.ends_with('Z') {
            return Err(TemporalError::InvalidTimestamp {
                input: s.to_string(),
                reason: "must use Z suffix (UTC only)".to_string(),
            });
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| TemporalError::InvalidTimestamp {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// ISO 8601 with Z suffix, e.g. `2025-10-01T12:00:00Z`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Compact basic-format form used inside release identifiers,
    /// e.g. `20251001T120000Z`.
    pub fn to_compact(&self) -> String {
        self.0.format("%Y%m%dT%H%M%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

// ─── Quarters & Cycles ───────────────────────────────────────────────

/// A calendar quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// Quarter from its number (1–4).
    pub fn from_number(n: u32) -> Result<Self, TemporalError> {
        match n {
            1 => Ok(Self::Q1),
            2 => Ok(Self::Q2),
            3 => Ok(Self::Q3),
            4 => Ok(Self::Q4),
            other => Err(TemporalError::InvalidQuarter(other)),
        }
    }

    /// Quarter number (1–4).
    pub fn number(&self) -> u32 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 2,
            Self::Q3 => 3,
            Self::Q4 => 4,
        }
    }

    /// First and last calendar day of this quarter in `year`.
    pub fn bounds(&self, year: i32) -> Result<(NaiveDate, NaiveDate), TemporalError> {
        let (start_month, end_month, end_day) = match self {
            Self::Q1 => (1, 3, 31),
            Self::Q2 => (4, 6, 30),
            Self::Q3 => (7, 9, 30),
            Self::Q4 => (10, 12, 31),
        };
        let start = NaiveDate::from_ymd_opt(year, start_month, 1).ok_or(TemporalError::InvalidYear(year))?;
        let end = NaiveDate::from_ymd_opt(year, end_month, end_day).ok_or(TemporalError::InvalidYear(year))?;
        Ok((start, end))
    }
}

impl std::fmt::Display for Quarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

/// A release cycle letter. Each cycle covers one calendar quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cycle {
    A,
    B,
    C,
    D,
}

impl Cycle {
    /// Parse a cycle letter, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, TemporalError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            _ => Err(TemporalError::UnknownCycle(s.to_string())),
        }
    }

    /// The calendar quarter this cycle covers.
    pub fn quarter(&self) -> Quarter {
        match self {
            Self::A => Quarter::Q1,
            Self::B => Quarter::Q2,
            Self::C => Quarter::Q3,
            Self::D => Quarter::Q4,
        }
    }
}

/// Effective window `(start, end)` of a quarterly release.
///
/// A mid-quarter correction replaces the start date only; the corrected
/// release still expires at quarter end.
///
/// # Errors
///
/// Unknown cycle letters, unrepresentable years, and correction dates that
/// fall outside the quarter are rejected.
pub fn calculate_effective_dates(
    year: i32,
    cycle: &str,
    correction_date: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), TemporalError> {
    let (start, end) = Cycle::parse(cycle)?.quarter().bounds(year)?;
    match correction_date {
        None => Ok((start, end)),
        Some(corrected) if corrected >= start && corrected <= end => Ok((corrected, end)),
        Some(corrected) => Err(TemporalError::CorrectionOutsideQuarter {
            correction: corrected.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        }),
    }
}

/// Date formats accepted in source files, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"];

/// Parse a source-file date in any accepted format.
pub fn parse_date(s: &str) -> Result<NaiveDate, TemporalError> {
    let trimmed = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .filter(|d| d.year() >= 1900)
        .ok_or_else(|| TemporalError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn cycle_d_covers_fourth_quarter() {
        let (start, end) = calculate_effective_dates(2025, "D", None).unwrap();
        assert_eq!(start, date("2025-10-01"));
        assert_eq!(end, date("2025-12-31"));
    }

    #[test]
    fn all_cycles_map_to_quarters() {
        let expected = [
            ("A", "2025-01-01", "2025-03-31"),
            ("B", "2025-04-01", "2025-06-30"),
            ("C", "2025-07-01", "2025-09-30"),
            ("D", "2025-10-01", "2025-12-31"),
        ];
        for (cycle, start, end) in expected {
            let (s, e) = calculate_effective_dates(2025, cycle, None).unwrap();
            assert_eq!((s, e), (date(start), date(end)), "cycle {cycle}");
        }
    }

    #[test]
    fn correction_moves_start_only() {
        let (start, end) = calculate_effective_dates(2025, "D", Some(date("2025-11-15"))).unwrap();
        assert_eq!(start, date("2025-11-15"));
        assert_eq!(end, date("2025-12-31"));
    }

    #[test]
    fn correction_outside_quarter_rejected() {
        let err = calculate_effective_dates(2025, "D", Some(date("2025-09-30"))).unwrap_err();
        assert!(matches!(err, TemporalError::CorrectionOutsideQuarter { .. }));
    }

    #[test]
    fn lowercase_cycle_accepted_unknown_rejected() {
        assert!(calculate_effective_dates(2025, "b", None).is_ok());
        assert!(matches!(
            calculate_effective_dates(2025, "E", None),
            Err(TemporalError::UnknownCycle(_))
        ));
    }

    #[test]
    fn quarter_from_number_bounds() {
        assert_eq!(Quarter::from_number(3).unwrap(), Quarter::Q3);
        assert!(Quarter::from_number(0).is_err());
        assert!(Quarter::from_number(5).is_err());
        assert_eq!(Quarter::Q2.to_string(), "Q2");
    }

    #[test]
    fn parse_date_accepts_three_formats() {
        assert_eq!(parse_date("2025-01-31").unwrap(), date("2025-01-31"));
        assert_eq!(parse_date("20250131").unwrap(), date("2025-01-31"));
        assert_eq!(parse_date("01/31/2025").unwrap(), date("2025-01-31"));
        assert!(parse_date("31.01.2025").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn timestamp_forms() {
        let dt = Utc.with_ymd_and_hms(2025, 10, 1, 12, 30, 5).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(999).unwrap());
        assert_eq!(ts.to_iso8601(), "2025-10-01T12:30:05Z");
        assert_eq!(ts.to_compact(), "20251001T123005Z");
        assert_eq!(format!("{ts}"), ts.to_iso8601());
    }

    #[test]
    fn timestamp_parse_requires_z() {
        assert!(Timestamp::parse("2025-10-01T12:00:00Z").is_ok());
        assert!(Timestamp::parse("2025-10-01T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2025-10-01").is_err());
    }
}
