//! In-memory store implementation.

use async_trait::async_trait;
use gaapfetch_core::{
    BatchRun, Cik, Concept, ConceptDictionary, Entity, ErrorQuery, FetchError, Period, Result,
    ValueQuery, ValueRecord, ValueStore,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::cutoff;

/// Identity of a stored value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ValueKey {
    source: String,
    entity: Cik,
    concept: String,
    period: Period,
}

impl ValueKey {
    fn of(record: &ValueRecord) -> Self {
        Self {
            source: record.source.clone(),
            entity: record.entity.clone(),
            concept: record.concept.clone(),
            period: record.period,
        }
    }
}

/// Snapshot of the concept reference table.
#[derive(Debug, Clone)]
struct ConceptTable {
    version: String,
    concepts: Vec<Concept>,
}

/// Simple in-memory store for testing and development.
///
/// Data is stored in `RwLock`-protected collections and is lost when the
/// store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<ValueKey, ValueRecord>>,
    errors: RwLock<Vec<FetchError>>,
    entities: RwLock<HashMap<Cik, Entity>>,
    concepts: RwLock<Option<ConceptTable>>,
    runs: RwLock<Vec<BatchRun>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Returns true if no values are stored.
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }

    /// Concepts from the last sync, in name order.
    pub async fn concepts(&self) -> Vec<Concept> {
        self.concepts
            .read()
            .await
            .as_ref()
            .map(|t| t.concepts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ValueStore for InMemoryStore {
    #[instrument(skip(self, record), fields(request = %record.request()))]
    async fn upsert(&self, record: &ValueRecord) -> Result<()> {
        let replaced = self
            .values
            .write()
            .await
            .insert(ValueKey::of(record), record.clone())
            .is_some();
        debug!(replaced, "Stored value");
        Ok(())
    }

    async fn get(
        &self,
        source: &str,
        entity: &Cik,
        concept: &str,
        period: &Period,
    ) -> Result<Option<ValueRecord>> {
        let key = ValueKey {
            source: source.to_string(),
            entity: entity.clone(),
            concept: concept.to_string(),
            period: *period,
        };
        Ok(self.values.read().await.get(&key).cloned())
    }

    #[instrument(skip(self, error), fields(kind = %error.kind))]
    async fn append_error(&self, error: &FetchError) -> Result<()> {
        self.errors.write().await.push(error.clone());
        Ok(())
    }

    async fn query(&self, query: &ValueQuery) -> Result<Vec<ValueRecord>> {
        Ok(query.apply(self.values.read().await.values()))
    }

    async fn errors(&self, query: &ErrorQuery) -> Result<Vec<FetchError>> {
        let mut matching: Vec<FetchError> = self
            .errors
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn last_error(
        &self,
        entity: &Cik,
        concept: &str,
        period: &Period,
    ) -> Result<Option<FetchError>> {
        Ok(self
            .errors
            .read()
            .await
            .iter()
            .filter(|e| e.entity == *entity && e.concept == concept && e.period == *period)
            .max_by_key(|e| e.occurred_at)
            .cloned())
    }

    #[instrument(skip(self))]
    async fn prune_errors(&self, older_than: Duration) -> Result<usize> {
        let Some(cutoff) = cutoff(older_than) else {
            return Ok(0);
        };
        let mut errors = self.errors.write().await;
        let before = errors.len();
        errors.retain(|e| e.occurred_at >= cutoff);
        let removed = before - errors.len();
        debug!(removed, "Pruned error log");
        Ok(removed)
    }

    async fn put_entity(&self, entity: &Entity) -> Result<()> {
        self.entities
            .write()
            .await
            .insert(entity.cik.clone(), entity.clone());
        Ok(())
    }

    async fn entity(&self, cik: &Cik) -> Result<Option<Entity>> {
        Ok(self.entities.read().await.get(cik).cloned())
    }

    async fn sync_concepts(&self, dictionary: &ConceptDictionary) -> Result<usize> {
        let table = ConceptTable {
            version: dictionary.version().to_string(),
            concepts: dictionary.iter().cloned().collect(),
        };
        let count = table.concepts.len();
        *self.concepts.write().await = Some(table);
        Ok(count)
    }

    async fn concepts_version(&self) -> Result<Option<String>> {
        Ok(self.concepts.read().await.as_ref().map(|t| t.version.clone()))
    }

    async fn record_run(&self, run: &BatchRun) -> Result<()> {
        self.runs.write().await.push(run.clone());
        Ok(())
    }

    async fn runs(&self, limit: usize) -> Result<Vec<BatchRun>> {
        let mut runs = self.runs.read().await.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}
