//! Local store trait and query types.
//!
//! This module defines the [`ValueStore`] trait that provides a unified
//! interface for persisting resolved values, the append-only error log and
//! the reference tables that describe them.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::{
    concept::ConceptDictionary,
    error::{ErrorKind, Result},
    period::{Period, PeriodKind},
    types::{BatchRun, Cik, Entity, FetchError, ValueRecord},
};

/// Column a value query can be ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Entity identifier.
    Entity,
    /// Concept name.
    Concept,
    /// Period end date.
    PeriodEnd,
    /// Numeric value.
    Value,
    /// Fetch timestamp.
    FetchedAt,
}

/// Ordering of a value query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    /// Column to order by.
    pub field: SortField,
    /// Largest first when true.
    pub descending: bool,
}

impl SortKey {
    /// Ascending order on `field`.
    #[must_use]
    pub const fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    /// Descending order on `field`.
    #[must_use]
    pub const fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    /// Compares two records under this key.
    #[must_use]
    pub fn compare(&self, a: &ValueRecord, b: &ValueRecord) -> Ordering {
        let ord = match self.field {
            SortField::Entity => a.entity.cmp(&b.entity),
            SortField::Concept => a.concept.cmp(&b.concept),
            SortField::PeriodEnd => a.period.end().cmp(&b.period.end()),
            SortField::Value => a.value.total_cmp(&b.value),
            SortField::FetchedAt => a.fetched_at.cmp(&b.fetched_at),
        };
        if self.descending { ord.reverse() } else { ord }
    }
}

/// Filter over stored values. Every field is optional; unset fields match
/// everything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueQuery {
    /// Only these entities; empty means any.
    pub entities: BTreeSet<Cik>,
    /// Only these concepts; empty means any.
    pub concepts: BTreeSet<String>,
    /// Only this period kind.
    pub period_kind: Option<PeriodKind>,
    /// Period end on or after.
    pub end_from: Option<NaiveDate>,
    /// Period end on or before.
    pub end_to: Option<NaiveDate>,
    /// Value at least.
    pub min_value: Option<f64>,
    /// Value at most.
    pub max_value: Option<f64>,
    /// Only this source.
    pub source: Option<String>,
    /// Result ordering; storage order when unset.
    pub sort: Option<SortKey>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl ValueQuery {
    /// A query matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity to the accepted set.
    #[must_use]
    pub fn entity(mut self, cik: Cik) -> Self {
        self.entities.insert(cik);
        self
    }

    /// Adds several entities to the accepted set, for cross-company
    /// comparisons of one concept.
    #[must_use]
    pub fn entities(mut self, ciks: impl IntoIterator<Item = Cik>) -> Self {
        self.entities.extend(ciks);
        self
    }

    /// Adds a concept to the accepted set.
    #[must_use]
    pub fn concept(mut self, concept: impl Into<String>) -> Self {
        self.concepts.insert(concept.into());
        self
    }

    /// Restricts to one period kind.
    #[must_use]
    pub const fn period_kind(mut self, kind: PeriodKind) -> Self {
        self.period_kind = Some(kind);
        self
    }

    /// Restricts the period end to `[from, to]`.
    #[must_use]
    pub const fn ending_between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.end_from = Some(from);
        self.end_to = Some(to);
        self
    }

    /// Restricts values to `[min, max]`.
    #[must_use]
    pub const fn value_between(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    /// Restricts to one source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Orders the result.
    #[must_use]
    pub const fn sort_by(mut self, key: SortKey) -> Self {
        self.sort = Some(key);
        self
    }

    /// Caps the result size.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `record` passes every filter.
    #[must_use]
    pub fn matches(&self, record: &ValueRecord) -> bool {
        let end = record.period.end();
        (self.entities.is_empty() || self.entities.contains(&record.entity))
            && (self.concepts.is_empty() || self.concepts.contains(&record.concept))
            && self.period_kind.is_none_or(|kind| kind == record.period.kind)
            && self.end_from.is_none_or(|from| end >= from)
            && self.end_to.is_none_or(|to| end <= to)
            && self.min_value.is_none_or(|min| record.value >= min)
            && self.max_value.is_none_or(|max| record.value <= max)
            && self.source.as_ref().is_none_or(|s| *s == record.source)
    }

    /// Filters, sorts and truncates `records` in memory.
    #[must_use]
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a ValueRecord>) -> Vec<ValueRecord> {
        let mut out: Vec<ValueRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        if let Some(key) = self.sort {
            out.sort_by(|a, b| key.compare(a, b));
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Filter over the error log. Results are newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorQuery {
    /// Only this entity.
    pub entity: Option<Cik>,
    /// Only this concept.
    pub concept: Option<String>,
    /// Only this kind.
    pub kind: Option<ErrorKind>,
    /// Only entries recorded at or after.
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl ErrorQuery {
    /// Returns true if `error` passes every filter.
    #[must_use]
    pub fn matches(&self, error: &FetchError) -> bool {
        self.entity.as_ref().is_none_or(|cik| *cik == error.entity)
            && self.concept.as_ref().is_none_or(|c| *c == error.concept)
            && self.kind.is_none_or(|kind| kind == error.kind)
            && self.since.is_none_or(|since| error.occurred_at >= since)
    }
}

/// Trait for durable storage of resolved values.
///
/// Values are unique on (source, entity, concept, period); writing the same
/// key again replaces the earlier row. The error log only ever grows, except
/// through [`ValueStore::prune_errors`].
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Inserts or replaces the row keyed by the record's identity.
    async fn upsert(&self, record: &ValueRecord) -> Result<()>;

    /// Exact-key lookup.
    ///
    /// Returns `Ok(None)` when no row exists.
    async fn get(
        &self,
        source: &str,
        entity: &Cik,
        concept: &str,
        period: &Period,
    ) -> Result<Option<ValueRecord>>;

    /// Appends a failure to the error log.
    async fn append_error(&self, error: &FetchError) -> Result<()>;

    /// Returns values matching `query`; an empty match is `Ok(vec![])`.
    async fn query(&self, query: &ValueQuery) -> Result<Vec<ValueRecord>>;

    /// Returns error log entries matching `query`, newest first.
    async fn errors(&self, query: &ErrorQuery) -> Result<Vec<FetchError>>;

    /// Most recent error logged for one (entity, concept, period).
    async fn last_error(
        &self,
        entity: &Cik,
        concept: &str,
        period: &Period,
    ) -> Result<Option<FetchError>>;

    /// Deletes error log entries older than `older_than`.
    ///
    /// Returns the number of entries removed.
    async fn prune_errors(&self, older_than: Duration) -> Result<usize>;

    /// Inserts or replaces an entity in the reference table.
    async fn put_entity(&self, entity: &Entity) -> Result<()>;

    /// Looks up an entity in the reference table.
    async fn entity(&self, cik: &Cik) -> Result<Option<Entity>>;

    /// Replaces the concept reference table with `dictionary`.
    ///
    /// Returns the number of concepts written.
    async fn sync_concepts(&self, dictionary: &ConceptDictionary) -> Result<usize>;

    /// Version of the concept table last synced, if any.
    async fn concepts_version(&self) -> Result<Option<String>>;

    /// Records a finished batch.
    async fn record_run(&self, run: &BatchRun) -> Result<()>;

    /// Most recent batch runs, newest first.
    async fn runs(&self, limit: usize) -> Result<Vec<BatchRun>>;
}
