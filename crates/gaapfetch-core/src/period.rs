//! Reporting period definitions.
//!
//! A [`Period`] pairs a [`PeriodKind`] (annual or quarterly) with a
//! [`PeriodSpan`] (an instant or a start/end duration). Periods render to and
//! parse from the provider's calendar frame tokens: `CY2024` (annual duration),
//! `CY2024Q1` (quarterly duration) and `CY2024Q1I` (quarter-end instant).

use chrono::{Datelike, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, Result};

/// Reporting cadence of a period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodKind {
    /// Annual reporting period.
    #[default]
    Annual,
    /// Quarterly reporting period.
    Quarterly,
}

impl PeriodKind {
    /// Single-letter code used in storage.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Annual => "A",
            Self::Quarterly => "Q",
        }
    }

    /// Parses a storage code produced by [`PeriodKind::code`].
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "A" => Ok(Self::Annual),
            "Q" => Ok(Self::Quarterly),
            _ => Err(DataError::Parse(format!("Invalid period kind: {code}"))),
        }
    }
}

/// The time shape of a period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSpan {
    /// A point in time (balance-sheet items).
    Instant(NaiveDate),
    /// An interval, both ends inclusive (flow items).
    Duration {
        /// First day of the interval.
        start: NaiveDate,
        /// Last day of the interval.
        end: NaiveDate,
    },
}

/// A reporting interval descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    /// Annual or quarterly.
    pub kind: PeriodKind,
    /// Instant or duration.
    pub span: PeriodSpan,
}

impl Period {
    /// Creates an instant period.
    #[must_use]
    pub const fn instant(kind: PeriodKind, date: NaiveDate) -> Self {
        Self {
            kind,
            span: PeriodSpan::Instant(date),
        }
    }

    /// Creates a duration period.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] if `start` is after `end`.
    pub fn duration(kind: PeriodKind, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DataError::Configuration(format!(
                "Period start {start} is after end {end}"
            )));
        }
        Ok(Self {
            kind,
            span: PeriodSpan::Duration { start, end },
        })
    }

    /// Calendar year as a duration (`CY<year>`).
    pub fn annual(year: i32) -> Result<Self> {
        let (start, _) = quarter_bounds(year, 1)?;
        let (_, end) = quarter_bounds(year, 4)?;
        Self::duration(PeriodKind::Annual, start, end)
    }

    /// Calendar quarter as a duration (`CY<year>Q<n>`).
    pub fn quarter(year: i32, quarter: u32) -> Result<Self> {
        let (start, end) = quarter_bounds(year, quarter)?;
        Self::duration(PeriodKind::Quarterly, start, end)
    }

    /// Last day of a calendar quarter as an instant (`CY<year>Q<n>I`).
    pub fn quarter_end(year: i32, quarter: u32) -> Result<Self> {
        let (_, end) = quarter_bounds(year, quarter)?;
        Ok(Self::instant(PeriodKind::Quarterly, end))
    }

    /// Last day of a calendar year as an annual instant (`CY<year>Q4I`).
    pub fn year_end(year: i32) -> Result<Self> {
        let (_, end) = quarter_bounds(year, 4)?;
        Ok(Self::instant(PeriodKind::Annual, end))
    }

    /// Returns a copy with a different kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: PeriodKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns true if this period is a point in time.
    #[must_use]
    pub const fn is_instant(&self) -> bool {
        matches!(self.span, PeriodSpan::Instant(_))
    }

    /// Start date, `None` for instants.
    #[must_use]
    pub const fn start(&self) -> Option<NaiveDate> {
        match self.span {
            PeriodSpan::Instant(_) => None,
            PeriodSpan::Duration { start, .. } => Some(start),
        }
    }

    /// End date (the instant itself for instants).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        match self.span {
            PeriodSpan::Instant(date) => date,
            PeriodSpan::Duration { end, .. } => end,
        }
    }

    /// The provider's calendar frame token for this period.
    ///
    /// Durations are placed by their midpoint, so a fiscal year ending in
    /// September maps to the calendar year it mostly overlaps. Instants map to
    /// the nearest calendar quarter end.
    #[must_use]
    pub fn frame_token(&self) -> String {
        match self.span {
            PeriodSpan::Instant(date) => {
                let (year, quarter) = nearest_quarter_end(date);
                format!("CY{year}Q{quarter}I")
            }
            PeriodSpan::Duration { start, end } => {
                let mid = start + TimeDelta::days((end - start).num_days() / 2);
                match self.kind {
                    PeriodKind::Annual => format!("CY{}", mid.year()),
                    PeriodKind::Quarterly => format!("CY{}Q{}", mid.year(), mid.month0() / 3 + 1),
                }
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.frame_token())
    }
}

impl FromStr for Period {
    type Err = DataError;

    /// Parses a calendar frame token. Instant tokens yield quarterly periods;
    /// use [`Period::with_kind`] to re-tag a year-end instant as annual.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DataError::Parse(format!("Invalid period token: {s}"));
        let rest = s.strip_prefix("CY").ok_or_else(invalid)?;
        let (rest, instant) = match rest.strip_suffix('I') {
            Some(rest) => (rest, true),
            None => (rest, false),
        };

        match rest.split_once('Q') {
            None if !instant => {
                let year = rest.parse::<i32>().map_err(|_| invalid())?;
                Self::annual(year)
            }
            None => Err(invalid()),
            Some((year, quarter)) => {
                let year = year.parse::<i32>().map_err(|_| invalid())?;
                let quarter = quarter.parse::<u32>().map_err(|_| invalid())?;
                if instant {
                    Self::quarter_end(year, quarter)
                } else {
                    Self::quarter(year, quarter)
                }
            }
        }
    }
}

/// First and last day of a calendar quarter.
fn quarter_bounds(year: i32, quarter: u32) -> Result<(NaiveDate, NaiveDate)> {
    if !(1..=4).contains(&quarter) {
        return Err(DataError::Configuration(format!(
            "Quarter must be between 1 and 4, got {quarter}"
        )));
    }
    let first_month = (quarter - 1) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(year, first_month, 1)
        .ok_or_else(|| DataError::Configuration(format!("Invalid year: {year}")))?;
    let end = if quarter == 4 {
        NaiveDate::from_ymd_opt(year, 12, 31)
    } else {
        NaiveDate::from_ymd_opt(year, first_month + 3, 1).and_then(|d| d.pred_opt())
    }
    .ok_or_else(|| DataError::Configuration(format!("Invalid year: {year}")))?;
    Ok((start, end))
}

/// Calendar (year, quarter) whose last day is closest to `date`.
fn nearest_quarter_end(date: NaiveDate) -> (i32, u32) {
    let year = date.year();
    let mut best = (year, date.month0() / 3 + 1);
    let mut best_distance = i64::MAX;
    for (y, q) in [(year - 1, 4), (year, 1), (year, 2), (year, 3), (year, 4)] {
        if let Ok((_, end)) = quarter_bounds(y, q) {
            let distance = (date - end).num_days().abs();
            if distance < best_distance {
                best = (y, q);
                best_distance = distance;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_calendar_tokens() {
        assert_eq!(Period::annual(2024).unwrap().frame_token(), "CY2024");
        assert_eq!(Period::quarter(2024, 2).unwrap().frame_token(), "CY2024Q2");
        assert_eq!(Period::quarter_end(2024, 1).unwrap().frame_token(), "CY2024Q1I");
        assert_eq!(Period::year_end(2023).unwrap().frame_token(), "CY2023Q4I");
    }

    #[test]
    fn test_quarter_bounds() {
        let q1 = Period::quarter(2024, 1).unwrap();
        assert_eq!(q1.start(), Some(date(2024, 1, 1)));
        assert_eq!(q1.end(), date(2024, 3, 31));
        assert!(Period::quarter(2024, 5).is_err());
        assert!(Period::quarter(2024, 0).is_err());
    }

    #[test]
    fn test_fiscal_periods_map_to_overlapping_calendar_frame() {
        let fiscal = Period::duration(PeriodKind::Annual, date(2023, 10, 1), date(2024, 9, 28)).unwrap();
        assert_eq!(fiscal.frame_token(), "CY2024");

        let instant = Period::instant(PeriodKind::Quarterly, date(2024, 9, 28));
        assert_eq!(instant.frame_token(), "CY2024Q3I");

        let early_january = Period::instant(PeriodKind::Annual, date(2024, 1, 2));
        assert_eq!(early_january.frame_token(), "CY2023Q4I");
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!("CY2024".parse::<Period>().unwrap(), Period::annual(2024).unwrap());
        assert_eq!("CY2024Q3".parse::<Period>().unwrap(), Period::quarter(2024, 3).unwrap());
        assert_eq!(
            "CY2024Q4I".parse::<Period>().unwrap(),
            Period::quarter_end(2024, 4).unwrap()
        );
        assert!("2024".parse::<Period>().is_err());
        assert!("CY2024I".parse::<Period>().is_err());
        assert!("CY2024Q9".parse::<Period>().is_err());
    }

    #[test]
    fn test_duration_rejects_reversed_dates() {
        assert!(Period::duration(PeriodKind::Annual, date(2024, 2, 1), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(PeriodKind::from_code(PeriodKind::Annual.code()).unwrap(), PeriodKind::Annual);
        assert_eq!(
            PeriodKind::from_code(PeriodKind::Quarterly.code()).unwrap(),
            PeriodKind::Quarterly
        );
        assert!(PeriodKind::from_code("X").is_err());
    }
}
