//! Batch runner driving many fetch requests through one resolver into a store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use gaapfetch_core::{
    BatchRun, BatchSummary, Cik, DataError, ErrorKind, FetchError, FetchRequest, ValueResolver,
    ValueStore,
};

/// Options controlling which requests a batch actually sends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Skip requests whose value is already stored for the resolver's source.
    pub skip_existing: bool,
    /// Skip requests whose latest logged failure within this window was
    /// `NotFound` or `NoDataForPeriod`.
    pub skip_known_missing: Option<Duration>,
}

impl BatchOptions {
    /// Sets [`BatchOptions::skip_existing`].
    #[must_use]
    pub const fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Sets [`BatchOptions::skip_known_missing`].
    #[must_use]
    pub const fn with_skip_known_missing(mut self, window: Duration) -> Self {
        self.skip_known_missing = Some(window);
        self
    }
}

/// Cooperative cancellation flag shared with a [`BatchRunner`].
///
/// Once stopped, the runner issues no further requests; an in-flight request
/// runs to completion. A stopped handle stays stopped.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a handle that is not stopped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the runner stop issuing items.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`StopHandle::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one request.
enum Outcome {
    Stored,
    Skipped,
    Failed(ErrorKind),
}

/// Drives fetch requests through a [`ValueResolver`] into a [`ValueStore`].
///
/// Every request is isolated: a failure of any kind, including a failed
/// write, is appended to the store's error log and the batch moves on. A run
/// always completes and returns a [`BatchSummary`].
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use gaapfetch::{BatchRunner, ConceptResolver, FetchConfig, FetchRequest, Cik, Period, SqliteStore};
///
/// let config = FetchConfig::new("MyApp/1.0 (contact@example.com)");
/// let resolver = Arc::new(ConceptResolver::new(&config)?);
/// let store = Arc::new(SqliteStore::new("values.db")?);
/// let runner = BatchRunner::new(resolver, store);
///
/// let requests = vec![FetchRequest::new(
///     Cik::from(320_193),
///     "NetIncomeLoss",
///     Period::annual(2024)?,
/// )];
/// let summary = runner.run(&requests).await;
/// println!("{} stored, {} failed", summary.succeeded, summary.failed_total());
/// ```
pub struct BatchRunner {
    resolver: Arc<dyn ValueResolver>,
    store: Arc<dyn ValueStore>,
    options: BatchOptions,
    stop: StopHandle,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("resolver", &self.resolver.name())
            .field("store", &"configured")
            .field("options", &self.options)
            .field("stopped", &self.stop.is_stopped())
            .finish()
    }
}

impl BatchRunner {
    /// Creates a runner with default options.
    #[must_use]
    pub fn new(resolver: Arc<dyn ValueResolver>, store: Arc<dyn ValueStore>) -> Self {
        Self {
            resolver,
            store,
            options: BatchOptions::default(),
            stop: StopHandle::new(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub const fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses an existing stop handle.
    #[must_use]
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Current options.
    #[must_use]
    pub const fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// A handle that cancels this runner's remaining items.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The store results are written to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ValueStore> {
        &self.store
    }

    /// Processes `requests` one at a time, in input order.
    pub async fn run(&self, requests: &[FetchRequest]) -> BatchSummary {
        let started_at = Utc::now();
        info!(
            provider = self.resolver.name(),
            requests = requests.len(),
            "Starting batch"
        );

        let summary = self.run_items(requests).await;
        self.finish(started_at, requests.len(), summary).await
    }

    /// Processes `requests` grouped by entity, running up to `max_entities`
    /// groups at once.
    ///
    /// Requests for one entity keep their input order. All groups go through
    /// the same resolver, so they share its rate limiter. A `max_entities` of
    /// zero is treated as one.
    pub async fn run_concurrent(
        &self,
        requests: &[FetchRequest],
        max_entities: usize,
    ) -> BatchSummary {
        let started_at = Utc::now();
        let groups = group_by_entity(requests);
        info!(
            provider = self.resolver.name(),
            requests = requests.len(),
            entities = groups.len(),
            max_entities,
            "Starting concurrent batch"
        );

        let partials: Vec<BatchSummary> = stream::iter(groups.iter())
            .map(|(_, items)| self.run_items(items))
            .buffer_unordered(max_entities.max(1))
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for partial in &partials {
            summary.merge(partial);
        }
        self.finish(started_at, requests.len(), summary).await
    }

    async fn run_items(&self, requests: &[FetchRequest]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for (i, request) in requests.iter().enumerate() {
            if self.stop.is_stopped() {
                summary.cancelled += requests.len() - i;
                debug!(remaining = requests.len() - i, "Batch stopped");
                break;
            }

            match self.process(request).await {
                Outcome::Stored => summary.succeeded += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed(kind) => summary.record_failure(kind),
            }
        }

        summary
    }

    async fn process(&self, request: &FetchRequest) -> Outcome {
        if self.should_skip(request).await {
            debug!(request = %request, "Skipping request");
            return Outcome::Skipped;
        }

        let record = match self.resolver.resolve(request).await {
            Ok(record) => record,
            Err(e) => return self.fail(request, &e).await,
        };

        match self.store.upsert(&record).await {
            Ok(()) => {
                debug!(request = %request, value = record.value, unit = %record.unit, "Stored value");
                Outcome::Stored
            }
            Err(e) => self.fail(request, &e).await,
        }
    }

    async fn fail(&self, request: &FetchRequest, error: &DataError) -> Outcome {
        let kind = error.kind();
        warn!(request = %request, kind = %kind, error = %error, "Fetch failed");

        if let Err(e) = self
            .store
            .append_error(&FetchError::from_error(request, error))
            .await
        {
            warn!(request = %request, error = %e, "Failed to log fetch error");
        }
        Outcome::Failed(kind)
    }

    async fn should_skip(&self, request: &FetchRequest) -> bool {
        if self.options.skip_existing {
            match self
                .store
                .get(
                    self.resolver.source(),
                    &request.entity,
                    &request.concept,
                    &request.period,
                )
                .await
            {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                Err(e) => warn!(request = %request, error = %e, "Existing value check failed"),
            }
        }

        if let Some(window) = self.options.skip_known_missing {
            match self
                .store
                .last_error(&request.entity, &request.concept, &request.period)
                .await
            {
                Ok(Some(last)) if is_missing(last.kind) && within(window, last.occurred_at) => {
                    return true;
                }
                Ok(_) => {}
                Err(e) => warn!(request = %request, error = %e, "Error log check failed"),
            }
        }

        false
    }

    async fn finish(
        &self,
        started_at: DateTime<Utc>,
        requested: usize,
        summary: BatchSummary,
    ) -> BatchSummary {
        info!(
            provider = self.resolver.name(),
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            failed = summary.failed_total(),
            "Batch finished"
        );

        let run = BatchRun {
            started_at,
            finished_at: Utc::now(),
            requested,
            summary,
        };
        if let Err(e) = self.store.record_run(&run).await {
            warn!(error = %e, "Failed to record batch run");
        }
        run.summary
    }
}

const fn is_missing(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::NotFound | ErrorKind::NoDataForPeriod)
}

fn within(window: Duration, at: DateTime<Utc>) -> bool {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|w| Utc::now().checked_sub_signed(w))
        .is_none_or(|cutoff| at >= cutoff)
}

/// Groups requests by entity in order of first appearance.
fn group_by_entity(requests: &[FetchRequest]) -> Vec<(Cik, Vec<FetchRequest>)> {
    let mut groups: Vec<(Cik, Vec<FetchRequest>)> = Vec::new();
    let mut index: HashMap<Cik, usize> = HashMap::new();

    for request in requests {
        let slot = *index.entry(request.entity.clone()).or_insert_with(|| {
            groups.push((request.entity.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(request.clone());
    }
    groups
}
