//! Client configuration.
//!
//! [`FetchConfig`] is built by the caller and validated once when a fetcher is
//! constructed. Nothing is discovered from the environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{DataError, ErrorKind, Result};

/// Default SEC data API host.
pub const DEFAULT_BASE_URL: &str = "https://data.sec.gov";

/// Default location of the SEC ticker to CIK map.
pub const DEFAULT_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// SEC fair-access ceiling.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 10.0;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which provider endpoint the resolver queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    /// One request per (entity, concept) returning every reported observation.
    #[default]
    CompanyConcept,
    /// One request per (concept, unit, frame) returning one value per entity.
    Frames,
}

/// Uniform retry policy for transient failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
    /// Failure kinds that trigger a retry.
    pub retry_on: BTreeSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_secs(1),
            retry_on: [ErrorKind::RateLimited, ErrorKind::ServerError, ErrorKind::Network]
                .into_iter()
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
            retry_on: BTreeSet::new(),
        }
    }

    /// Sets the number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay between attempts.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns true if a failure of `kind` on attempt `attempt` (0-based)
    /// should be retried.
    #[must_use]
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        attempt < self.max_retries && self.retry_on.contains(&kind)
    }
}

/// Settings for the HTTP fetcher and resolver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Identifying `User-Agent`; SEC requires a name and contact address.
    pub user_agent: String,
    /// Upper bound on request rate.
    pub requests_per_second: f64,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryPolicy,
    /// Data API host, without trailing slash.
    pub base_url: String,
    /// Ticker map location.
    pub tickers_url: String,
    /// Resolver endpoint strategy.
    pub strategy: QueryStrategy,
}

impl FetchConfig {
    /// Creates a configuration with defaults and the given user agent.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            tickers_url: DEFAULT_TICKERS_URL.to_string(),
            strategy: QueryStrategy::default(),
        }
    }

    /// Sets the request rate.
    #[must_use]
    pub const fn with_requests_per_second(mut self, rate: f64) -> Self {
        self.requests_per_second = rate;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the data API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the ticker map location.
    #[must_use]
    pub fn with_tickers_url(mut self, tickers_url: impl Into<String>) -> Self {
        self.tickers_url = tickers_url.into();
        self
    }

    /// Sets the resolver strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: QueryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Checks every field.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(DataError::Configuration(
                "User agent must not be empty".to_string(),
            ));
        }
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(DataError::Configuration(format!(
                "Requests per second must be positive, got {}",
                self.requests_per_second
            )));
        }
        if self.timeout.is_zero() {
            return Err(DataError::Configuration(
                "Timeout must be greater than zero".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(DataError::Configuration(
                "Base URL must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The first email address in the user agent, if any.
    ///
    /// The SEC asks clients to identify themselves with a contact address.
    /// Its absence is not an error; callers decide whether to warn.
    #[must_use]
    pub fn contact_address(&self) -> Option<&str> {
        self.user_agent
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| "()<>[],;:\"'".contains(c)))
            .find(|word| is_email(word))
    }
}

fn is_email(word: &str) -> bool {
    let Some((local, domain)) = word.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty()
        && !host.is_empty()
        && !domain.contains('@')
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::new("research bot admin@example.com");
        assert_eq!(config.requests_per_second, 10.0);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.backoff, Duration::from_secs(1));
        assert_eq!(config.strategy, QueryStrategy::CompanyConcept);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let base = FetchConfig::new("agent a@b.c");
        assert!(FetchConfig::new("  ").validate().is_err());
        assert!(base.clone().with_requests_per_second(0.0).validate().is_err());
        assert!(base.clone().with_requests_per_second(-1.0).validate().is_err());
        assert!(base.clone().with_requests_per_second(f64::NAN).validate().is_err());
        assert!(base.clone().with_timeout(Duration::ZERO).validate().is_err());
        assert!(matches!(
            base.with_base_url("").validate(),
            Err(DataError::Configuration(_))
        ));
    }

    #[test]
    fn test_retry_decisions() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(ErrorKind::ServerError, 0));
        assert!(!policy.should_retry(ErrorKind::ServerError, 1));
        assert!(!policy.should_retry(ErrorKind::NotFound, 0));
        assert!(!RetryPolicy::none().should_retry(ErrorKind::Network, 0));
    }

    #[test]
    fn test_contact_address() {
        let config = FetchConfig::new("Research Bot (ops@acme.io)");
        assert_eq!(config.contact_address(), Some("ops@acme.io"));
        assert_eq!(
            FetchConfig::new("MyApp/1.0 <jane.doe@mail.example.org>").contact_address(),
            Some("jane.doe@mail.example.org")
        );

        assert!(FetchConfig::new("MyApp/1.0").contact_address().is_none());
        assert!(FetchConfig::new("bot @acme.io").contact_address().is_none());
        assert!(FetchConfig::new("bot ops@localhost").contact_address().is_none());
        assert!(FetchConfig::new("bot ops@acme.io2").contact_address().is_none());

        // Advisory only
        assert!(FetchConfig::new("MyApp/1.0").validate().is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = FetchConfig::new("agent").with_base_url("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
    }
}
