//! Scripted transport for offline use.

use async_trait::async_trait;
use gaapfetch_core::{DataError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::fetcher::{HttpRequest, RawResponse, Transport};

#[derive(Clone, Debug)]
enum Reply {
    Response(RawResponse),
    NetworkError(String),
}

/// A [`Transport`] that answers from per-URL scripts and records every request.
///
/// Replies queued for a URL are returned in order; the last one repeats for
/// any further calls. URLs with no script answer 404.
#[derive(Debug, Default)]
pub struct StubTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StubTransport {
    /// Creates an empty stub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn enqueue(&self, url: impl Into<String>, reply: Reply) {
        locked(&self.scripts)
            .entry(url.into())
            .or_default()
            .push_back(reply);
    }

    /// Queues a response for `url`.
    pub fn push(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
        self.enqueue(url, Reply::Response(RawResponse::new(status, body)));
    }

    /// Queues a 200 response with `value` serialized as the body.
    pub fn push_json(&self, url: impl Into<String>, value: &serde_json::Value) {
        self.push(url, 200, value.to_string());
    }

    /// Queues a transport failure for `url`.
    pub fn push_network_error(&self, url: impl Into<String>, message: impl Into<String>) {
        self.enqueue(url, Reply::NetworkError(message.into()));
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        locked(&self.requests).clone()
    }

    /// Total requests sent.
    #[must_use]
    pub fn request_count(&self) -> usize {
        locked(&self.requests).len()
    }

    /// Requests sent to exactly `url`.
    #[must_use]
    pub fn calls_to(&self, url: &str) -> usize {
        locked(&self.requests)
            .iter()
            .filter(|r| r.url == url)
            .count()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse> {
        locked(&self.requests).push(request.clone());

        let reply = {
            let mut scripts = locked(&self.scripts);
            match scripts.get_mut(&request.url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::NetworkError(message)) => Err(DataError::Network(message)),
            None => Ok(RawResponse::new(404, "")),
        }
    }
}
