//! Core data types.
//!
//! - [`Cik`] - SEC Central Index Key
//! - [`Entity`] - The company a value belongs to
//! - [`FetchRequest`] - One (entity, concept, period) to resolve
//! - [`ValueRecord`] - A normalized resolved value
//! - [`FetchError`] - One entry of the append-only error log
//! - [`BatchSummary`] / [`BatchRun`] - Outcome of a batch invocation

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, ErrorKind, Result};
use crate::period::Period;

/// A Central Index Key, always stored zero-padded to 10 digits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cik(String);

impl Cik {
    /// Parses a CIK, accepting an optional `CIK` prefix and missing leading zeros.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] for empty, non-numeric or overlong input.
    pub fn new(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("CIK")
            .or_else(|| trimmed.strip_prefix("cik"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DataError::Configuration(format!("Invalid CIK: {s:?}")));
        }
        Ok(Self(format!("{digits:0>10}")))
    }

    /// Returns the zero-padded 10 digit form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value, as the provider reports it in bulk responses.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.0.parse().unwrap_or_default()
    }
}

impl From<u64> for Cik {
    fn from(n: u64) -> Self {
        Self(format!("{n:0>10}"))
    }
}

impl TryFrom<String> for Cik {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(&s)
    }
}

impl From<Cik> for String {
    fn from(cik: Cik) -> Self {
        cik.0
    }
}

impl FromStr for Cik {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An identified subject of financial data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Registry identifier.
    pub cik: Cik,
    /// Registered name, if known.
    pub name: Option<String>,
    /// Primary ticker, if known.
    pub ticker: Option<String>,
}

impl Entity {
    /// Creates an entity with only its identifier.
    #[must_use]
    pub const fn new(cik: Cik) -> Self {
        Self {
            cik,
            name: None,
            ticker: None,
        }
    }

    /// Sets the registered name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the ticker, uppercased.
    #[must_use]
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into().to_uppercase());
        self
    }
}

/// A single (entity, concept, period) to resolve.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Entity identifier.
    pub entity: Cik,
    /// Canonical concept name (e.g. `NetIncomeLoss`).
    pub concept: String,
    /// Requested period.
    pub period: Period,
}

impl FetchRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(entity: Cik, concept: impl Into<String>, period: Period) -> Self {
        Self {
            entity,
            concept: concept.into(),
            period,
        }
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.entity, self.concept, self.period)
    }
}

/// Where a resolved value was reported.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRef {
    /// Accession number of the filing.
    pub accession: Option<String>,
    /// Form type (`10-K`, `10-Q`, ...).
    pub form: Option<String>,
    /// Date the filing was submitted.
    pub filed: Option<NaiveDate>,
    /// Fiscal year the filer assigned.
    pub fiscal_year: Option<i32>,
    /// Fiscal period the filer assigned (`FY`, `Q1`, ...).
    pub fiscal_period: Option<String>,
}

/// A normalized value for one (entity, concept, period, source).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    /// Entity identifier.
    pub entity: Cik,
    /// Canonical concept name.
    pub concept: String,
    /// Requested period.
    pub period: Period,
    /// Value exactly as reported.
    pub value: f64,
    /// Unit exactly as reported (`USD`, `USD/shares`, `shares`, ...).
    pub unit: String,
    /// Provider identifier; part of the uniqueness key.
    pub source: String,
    /// Filing the value was taken from.
    pub filing: FilingRef,
    /// When the value was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl ValueRecord {
    /// The request this record answers.
    #[must_use]
    pub fn request(&self) -> FetchRequest {
        FetchRequest::new(self.entity.clone(), self.concept.clone(), self.period)
    }
}

/// One failed resolution attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchError {
    /// Entity identifier.
    pub entity: Cik,
    /// Concept name as requested.
    pub concept: String,
    /// Requested period.
    pub period: Period,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Human readable detail.
    pub message: String,
    /// When the failure was recorded.
    pub occurred_at: DateTime<Utc>,
}

impl FetchError {
    /// Builds a log entry for `request` failing with `error`, stamped now.
    #[must_use]
    pub fn from_error(request: &FetchRequest, error: &DataError) -> Self {
        Self {
            entity: request.entity.clone(),
            concept: request.concept.clone(),
            period: request.period,
            kind: error.kind(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// Counts produced by a batch run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items resolved and stored.
    pub succeeded: usize,
    /// Items not attempted because of skip options.
    pub skipped: usize,
    /// Items not attempted because the batch was stopped.
    pub cancelled: usize,
    /// Failed items by kind.
    pub failed: BTreeMap<ErrorKind, usize>,
}

impl BatchSummary {
    /// Counts one failure of `kind`.
    pub fn record_failure(&mut self, kind: ErrorKind) {
        *self.failed.entry(kind).or_default() += 1;
    }

    /// Number of failures of `kind`.
    #[must_use]
    pub fn failed_of(&self, kind: ErrorKind) -> usize {
        self.failed.get(&kind).copied().unwrap_or_default()
    }

    /// Total failures across kinds.
    #[must_use]
    pub fn failed_total(&self) -> usize {
        self.failed.values().sum()
    }

    /// Total items accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.cancelled + self.failed_total()
    }

    /// Adds another summary's counts into this one.
    pub fn merge(&mut self, other: &Self) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.cancelled += other.cancelled;
        for (kind, count) in &other.failed {
            *self.failed.entry(*kind).or_default() += count;
        }
    }
}

/// A recorded batch invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRun {
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the batch finished.
    pub finished_at: DateTime<Utc>,
    /// Number of requests handed to the runner.
    pub requested: usize,
    /// Outcome counts.
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cik_padding() {
        let cik = Cik::new("320193").unwrap();
        assert_eq!(cik.as_str(), "0000320193");
        assert_eq!(cik.number(), 320_193);
        assert_eq!(Cik::new("CIK0000320193").unwrap(), cik);
        assert_eq!(Cik::from(320_193), cik);
    }

    #[test]
    fn test_cik_rejects_garbage() {
        assert!(Cik::new("").is_err());
        assert!(Cik::new("AAPL").is_err());
        assert!(Cik::new("12345678901").is_err());
    }

    #[test]
    fn test_cik_serde_as_string() {
        let cik = Cik::new("789019").unwrap();
        let json = serde_json::to_string(&cik).unwrap();
        assert_eq!(json, "\"0000789019\"");
        let back: Cik = serde_json::from_str("\"789019\"").unwrap();
        assert_eq!(back, cik);
    }

    #[test]
    fn test_summary_merge() {
        let mut a = BatchSummary {
            succeeded: 2,
            ..Default::default()
        };
        a.record_failure(ErrorKind::NotFound);

        let mut b = BatchSummary {
            succeeded: 1,
            skipped: 1,
            ..Default::default()
        };
        b.record_failure(ErrorKind::NotFound);
        b.record_failure(ErrorKind::Network);

        a.merge(&b);
        assert_eq!(a.succeeded, 3);
        assert_eq!(a.skipped, 1);
        assert_eq!(a.failed_of(ErrorKind::NotFound), 2);
        assert_eq!(a.failed_total(), 3);
        assert_eq!(a.total(), 7);
    }

    #[test]
    fn test_entity_builder() {
        let entity = Entity::new(Cik::from(320_193))
            .with_name("Apple Inc.")
            .with_ticker("aapl");
        assert_eq!(entity.ticker.as_deref(), Some("AAPL"));
        assert_eq!(entity.name.as_deref(), Some("Apple Inc."));
    }
}
