//! Error types for fetch, resolution and storage operations.
//!
//! [`DataError`] carries the details of a single failure. [`ErrorKind`] is the
//! flat, copyable classification of it that is written to the error log and
//! counted in batch summaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while fetching, resolving or storing values.
#[derive(Error, Debug)]
pub enum DataError {
    /// Invalid construction parameters (rate, timeout, user agent, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure: DNS, connection refused, timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered HTTP 429.
    #[error("Rate limited by provider: {url}")]
    RateLimited {
        /// The URL that was throttled.
        url: String,
    },

    /// The provider answered with a 5xx status.
    #[error("Server error (HTTP {status}) for {url}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// The provider answered HTTP 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider answered with a 4xx status other than 404 and 429.
    #[error("Client error (HTTP {status}) for {url}")]
    ClientError {
        /// HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// The concept is not part of the loaded dictionary.
    #[error("Unknown concept: {0}")]
    UnknownConcept(String),

    /// The period shape does not fit the concept (e.g. a duration for a
    /// balance-sheet item).
    #[error("Period {period} is not valid for concept {concept}: {reason}")]
    InvalidPeriodForConcept {
        /// Concept name.
        concept: String,
        /// Period frame token.
        period: String,
        /// Why the pairing was rejected.
        reason: String,
    },

    /// The provider returned no observation matching the requested period.
    #[error("No data for {concept} of CIK {cik} in period {period}")]
    NoDataForPeriod {
        /// Entity identifier.
        cik: String,
        /// Concept name.
        concept: String,
        /// Period frame token.
        period: String,
    },

    /// The provider response could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The local store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DataError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Network(_) => ErrorKind::Network,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ClientError { .. } => ErrorKind::ClientError,
            Self::UnknownConcept(_) => ErrorKind::UnknownConcept,
            Self::InvalidPeriodForConcept { .. } => ErrorKind::InvalidPeriodForConcept,
            Self::NoDataForPeriod { .. } => ErrorKind::NoDataForPeriod,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Flat classification of a [`DataError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`DataError::Configuration`].
    Configuration,
    /// See [`DataError::Network`].
    Network,
    /// See [`DataError::RateLimited`].
    RateLimited,
    /// See [`DataError::ServerError`].
    ServerError,
    /// See [`DataError::NotFound`].
    NotFound,
    /// See [`DataError::ClientError`].
    ClientError,
    /// See [`DataError::UnknownConcept`].
    UnknownConcept,
    /// See [`DataError::InvalidPeriodForConcept`].
    InvalidPeriodForConcept,
    /// See [`DataError::NoDataForPeriod`].
    NoDataForPeriod,
    /// See [`DataError::Parse`].
    Parse,
    /// See [`DataError::Storage`].
    Storage,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Configuration,
        Self::Network,
        Self::RateLimited,
        Self::ServerError,
        Self::NotFound,
        Self::ClientError,
        Self::UnknownConcept,
        Self::InvalidPeriodForConcept,
        Self::NoDataForPeriod,
        Self::Parse,
        Self::Storage,
    ];

    /// Stable string code, as stored in the error log.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Network => "network",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::NotFound => "not_found",
            Self::ClientError => "client_error",
            Self::UnknownConcept => "unknown_concept",
            Self::InvalidPeriodForConcept => "invalid_period_for_concept",
            Self::NoDataForPeriod => "no_data_for_period",
            Self::Parse => "parse",
            Self::Storage => "storage",
        }
    }

    /// Returns true for failures that may succeed when the same request is
    /// sent again later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::ServerError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DataError::Parse(format!("Invalid error kind: {s}")))
    }
}
