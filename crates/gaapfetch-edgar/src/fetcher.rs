//! Rate-limited, retrying HTTP GET.
//!
//! [`HttpFetcher`] owns the request policy: pacing through a shared
//! [`RateLimiter`], identifying headers, the timeout, status classification
//! and the retry loop. The actual I/O goes through the [`Transport`] seam so
//! the policy can be exercised without a network.

use async_trait::async_trait;
use gaapfetch_core::{DataError, FetchConfig, Result, RetryPolicy};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::rate_limit::RateLimiter;

/// Value sent in the `Accept-Encoding` header.
pub const ACCEPT_ENCODING: &str = "gzip, deflate";

/// An outbound GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Value of the first header named `name`, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as received, before status classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded body text.
    pub body: String,
}

impl RawResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs one GET and returns whatever the server answered.
///
/// Implementations report transport failures (DNS, refused connection,
/// timeout) as [`DataError::Network`] and return every HTTP status as a
/// [`RawResponse`].
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends `request`.
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with the configured user agent and timeout.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] if the client cannot be built.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| DataError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps a pre-configured client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

/// Maps a response status to the error it represents, if any.
///
/// 200 is success. 404, 429, 5xx and the remaining 4xx each have their own
/// variant; any other non-200 status is a client error.
pub fn classify_status(status: u16, url: &str) -> Option<DataError> {
    match status {
        200 => None,
        404 => Some(DataError::NotFound(url.to_string())),
        429 => Some(DataError::RateLimited {
            url: url.to_string(),
        }),
        500..=599 => Some(DataError::ServerError {
            status,
            url: url.to_string(),
        }),
        _ => Some(DataError::ClientError {
            status,
            url: url.to_string(),
        }),
    }
}

/// Paced, retrying GET client.
#[derive(Debug)]
pub struct HttpFetcher {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    user_agent: String,
    timeout: Duration,
    retry: RetryPolicy,
    requests: AtomicU64,
}

impl HttpFetcher {
    /// Creates a fetcher using `reqwest` and a private rate limiter.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] for invalid settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Self::with_transport(config, transport)
    }

    /// Creates a fetcher over a custom transport and a private rate limiter.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] for invalid settings.
    pub fn with_transport(config: &FetchConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        if config.contact_address().is_none() {
            warn!(
                user_agent = %config.user_agent,
                "User agent has no contact email; the SEC may block unidentified clients"
            );
        }
        let limiter = Arc::new(RateLimiter::new(config.requests_per_second)?);
        Ok(Self {
            transport,
            limiter,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout,
            retry: config.retry.clone(),
            requests: AtomicU64::new(0),
        })
    }

    /// Replaces the limiter, so several fetchers can share one budget.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// The limiter pacing this fetcher.
    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The retry policy in force.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Number of requests handed to the transport so far, retries included.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Fetches `url` and returns the body of a 200 response.
    ///
    /// Failures whose kind is in the retry policy are retried after the
    /// policy's backoff, up to `max_retries` times. Everything else fails on
    /// the first attempt.
    pub async fn get(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(e) if self.retry.should_retry(e.kind(), attempt) => {
                    attempt += 1;
                    warn!(url, attempt, error = %e, "Request failed, retrying");
                    sleep(self.retry.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetches `url` and decodes the body as JSON.
    ///
    /// # Errors
    /// Fetch errors as for [`HttpFetcher::get`]; a body that does not decode
    /// into `T` is [`DataError::Parse`].
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get(url).await?;
        serde_json::from_str(&body)
            .map_err(|e| DataError::Parse(format!("Failed to parse response from {url}: {e}")))
    }

    async fn attempt(&self, url: &str) -> Result<String> {
        self.limiter.acquire().await;
        self.requests.fetch_add(1, Ordering::Relaxed);

        let request = HttpRequest {
            url: url.to_string(),
            headers: vec![
                ("User-Agent".to_string(), self.user_agent.clone()),
                ("Accept-Encoding".to_string(), ACCEPT_ENCODING.to_string()),
            ],
            timeout: self.timeout,
        };

        debug!(url, "GET");
        let response = timeout(self.timeout, self.transport.send(&request))
            .await
            .map_err(|_| {
                DataError::Network(format!("Request to {url} timed out after {:?}", self.timeout))
            })??;

        match classify_status(response.status, url) {
            None => Ok(response.body),
            Some(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubTransport;
    use gaapfetch_core::ErrorKind;

    const URL: &str = "https://data.sec.gov/api/xbrl/companyconcept/CIK0000320193/us-gaap/Assets.json";

    fn fetcher(stub: &Arc<StubTransport>) -> HttpFetcher {
        let config = FetchConfig::new("gaapfetch tests test@example.com");
        HttpFetcher::with_transport(&config, stub.clone()).unwrap()
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(200, URL).is_none());
        assert_eq!(classify_status(404, URL).unwrap().kind(), ErrorKind::NotFound);
        assert_eq!(classify_status(429, URL).unwrap().kind(), ErrorKind::RateLimited);
        assert_eq!(classify_status(500, URL).unwrap().kind(), ErrorKind::ServerError);
        assert_eq!(classify_status(503, URL).unwrap().kind(), ErrorKind::ServerError);
        assert_eq!(classify_status(403, URL).unwrap().kind(), ErrorKind::ClientError);
        assert_eq!(classify_status(301, URL).unwrap().kind(), ErrorKind::ClientError);
    }

    #[test]
    fn test_construction_validates_config() {
        let stub = Arc::new(StubTransport::new());
        let empty_agent = FetchConfig::new("");
        assert!(matches!(
            HttpFetcher::with_transport(&empty_agent, stub.clone()),
            Err(DataError::Configuration(_))
        ));
        let zero_rate = FetchConfig::new("agent").with_requests_per_second(0.0);
        assert!(HttpFetcher::with_transport(&zero_rate, stub.clone()).is_err());
        let zero_timeout = FetchConfig::new("agent").with_timeout(Duration::ZERO);
        assert!(HttpFetcher::with_transport(&zero_timeout, stub).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_server_error_once() {
        let stub = Arc::new(StubTransport::new());
        stub.push(URL, 503, "unavailable");
        stub.push(URL, 200, "{\"ok\":true}");

        let fetcher = fetcher(&stub);
        let start = tokio::time::Instant::now();
        let body = fetcher.get(URL).await.unwrap();
        assert_eq!(body, "{\"ok\":true}");
        assert_eq!(stub.calls_to(URL), 2);
        assert_eq!(fetcher.request_count(), 2);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[derive(Debug)]
    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn send(&self, _request: &HttpRequest) -> Result<RawResponse> {
            sleep(Duration::from_secs(3600)).await;
            Ok(RawResponse::new(200, ""))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_network_error_and_retried() {
        let config = FetchConfig::new("gaapfetch tests test@example.com")
            .with_timeout(Duration::from_secs(5));
        let fetcher = HttpFetcher::with_transport(&config, Arc::new(StalledTransport)).unwrap();

        let start = tokio::time::Instant::now();
        let err = fetcher.get(URL).await.unwrap_err();
        let elapsed = start.elapsed();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(fetcher.request_count(), 2);
        // Two timeouts plus one backoff.
        assert!(elapsed >= Duration::from_secs(11));
        assert!(elapsed < Duration::from_secs(60));
    }

    #[test]
    fn test_missing_contact_address_is_advisory() {
        let stub = Arc::new(StubTransport::new());
        let config = FetchConfig::new("MyApp/1.0");
        assert!(config.contact_address().is_none());
        assert!(HttpFetcher::with_transport(&config, stub).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let stub = Arc::new(StubTransport::new());
        stub.push(URL, 404, "");

        let fetcher = fetcher(&stub);
        let err = fetcher.get(URL).await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
        assert_eq!(stub.calls_to(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_gives_up_after_max_retries() {
        let stub = Arc::new(StubTransport::new());
        stub.push(URL, 429, "");

        let fetcher = fetcher(&stub);
        let err = fetcher.get(URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(stub.calls_to(URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_is_retried() {
        let stub = Arc::new(StubTransport::new());
        stub.push_network_error(URL, "connection refused");
        stub.push(URL, 200, "[]");

        let fetcher = fetcher(&stub);
        assert_eq!(fetcher.get(URL).await.unwrap(), "[]");
        assert_eq!(stub.calls_to(URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_policy_fails_fast() {
        let stub = Arc::new(StubTransport::new());
        stub.push(URL, 503, "");

        let config = FetchConfig::new("agent a@b.c").with_retry(RetryPolicy::none());
        let fetcher = HttpFetcher::with_transport(&config, stub.clone()).unwrap();
        assert_eq!(fetcher.get(URL).await.unwrap_err().kind(), ErrorKind::ServerError);
        assert_eq!(stub.calls_to(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_identifying_headers() {
        let stub = Arc::new(StubTransport::new());
        stub.push(URL, 200, "{}");

        let fetcher = fetcher(&stub);
        fetcher.get(URL).await.unwrap();

        let sent = stub.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("user-agent"), Some("gaapfetch tests test@example.com"));
        assert_eq!(sent[0].header("Accept-Encoding"), Some(ACCEPT_ENCODING));
        assert_eq!(sent[0].timeout, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_json_parse_error() {
        let stub = Arc::new(StubTransport::new());
        stub.push(URL, 200, "not json");

        let fetcher = fetcher(&stub);
        let err = fetcher.get_json::<serde_json::Value>(URL).await.unwrap_err();
        assert!(matches!(err, DataError::Parse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_limiter() {
        let stub = Arc::new(StubTransport::new());
        stub.push(URL, 200, "{}");

        let a = fetcher(&stub);
        let b = fetcher(&stub).with_limiter(Arc::clone(a.limiter()));
        assert!(Arc::ptr_eq(a.limiter(), b.limiter()));

        let start = tokio::time::Instant::now();
        for _ in 0..5 {
            a.get(URL).await.unwrap();
            b.get(URL).await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
