//! Request pacing.

use gaapfetch_core::{DataError, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Spaces request releases at least `1 / rate` seconds apart.
///
/// Every fetcher sharing one limiter (through an `Arc`) is paced together.
/// Waiters queue on a fair mutex, so they are released in arrival order.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing at most `requests_per_second` releases per second.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] if the rate is not a positive
    /// finite number.
    pub fn new(requests_per_second: f64) -> Result<Self> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(DataError::Configuration(format!(
                "Requests per second must be positive, got {requests_per_second}"
            )));
        }
        // Round up so R releases never fit inside one second.
        let nanos = (1e9 / requests_per_second).ceil() as u64;
        Ok(Self {
            min_interval: Duration::from_nanos(nanos),
            last_release: Mutex::new(None),
        })
    }

    /// Minimum spacing between two releases.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits for the next release slot. Never fails.
    pub async fn acquire(&self) {
        let mut last = self.last_release.lock().await;
        if let Some(previous) = *last {
            let next = previous + self.min_interval;
            if Instant::now() < next {
                trace!(wait_ms = (next - Instant::now()).as_millis() as u64, "Rate limiting");
                sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_rejects_invalid_rates() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                RateLimiter::new(rate),
                Err(DataError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_interval() {
        let limiter = RateLimiter::new(10.0).unwrap();
        assert_eq!(limiter.min_interval(), Duration::from_millis(100));
        let limiter = RateLimiter::new(3.0).unwrap();
        assert!(limiter.min_interval() * 3 >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_plus_one_acquires_span_a_second() {
        let limiter = RateLimiter::new(10.0).unwrap();
        let start = Instant::now();
        for _ in 0..11 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(1.0).unwrap();
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_limiter_spaces_concurrent_callers() {
        let limiter = Arc::new(RateLimiter::new(4.0).unwrap());
        let mut handles = Vec::new();
        for _ in 0..6 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            }));
        }

        let mut releases = Vec::new();
        for handle in handles {
            releases.push(handle.await.unwrap());
        }
        releases.sort();
        for pair in releases.windows(2) {
            assert!(pair[1] - pair[0] >= limiter.min_interval());
        }
    }
}
