//! SQLite-based store implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use gaapfetch_core::{
    BatchRun, BatchSummary, Cik, ConceptDictionary, DataError, Entity, ErrorKind, ErrorQuery,
    FetchError, FilingRef, Period, PeriodKind, PeriodNature, Result, SortField, ValueQuery,
    ValueRecord, ValueStore,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::cutoff;

/// Columns read back into a [`ValueRecord`], in select order.
const RECORD_COLUMNS: &str = "source, cik, concept, period_kind, period_start, period_end, value, \
     unit, accession, form, filed, fiscal_year, fiscal_period, fetched_at";

/// Columns read back into a [`FetchError`], in select order.
const ERROR_COLUMNS: &str =
    "cik, concept, period_kind, period_start, period_end, kind, message, occurred_at";

const CONCEPTS_VERSION_KEY: &str = "concepts_version";

/// SQLite-based store for resolved values.
///
/// This store keeps data in a SQLite database file, providing persistence
/// across application restarts. All access goes through one connection
/// guarded by a mutex.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn storage(e: impl ToString) -> DataError {
    DataError::Storage(e.to_string())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DataError::Storage(format!("Invalid timestamp {s:?}: {e}")))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DataError::Storage(format!("Invalid date {s:?}: {e}")))
}

/// Key columns of a period. Instants store an empty start so the primary key
/// never contains NULL.
fn period_columns(period: &Period) -> (&'static str, String, String) {
    (
        period.kind.code(),
        period.start().map(|d| d.to_string()).unwrap_or_default(),
        period.end().to_string(),
    )
}

fn period_from_columns(kind: &str, start: &str, end: &str) -> Result<Period> {
    let kind = PeriodKind::from_code(kind).map_err(storage)?;
    let end = parse_date(end)?;
    if start.is_empty() {
        Ok(Period::instant(kind, end))
    } else {
        Period::duration(kind, parse_date(start)?, end).map_err(storage)
    }
}

fn limit_value(limit: usize) -> Value {
    Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))
}

/// A `value_records` row before conversion.
struct RecordRow {
    source: String,
    cik: String,
    concept: String,
    period_kind: String,
    period_start: String,
    period_end: String,
    value: f64,
    unit: String,
    accession: Option<String>,
    form: Option<String>,
    filed: Option<String>,
    fiscal_year: Option<i32>,
    fiscal_period: Option<String>,
    fetched_at: String,
}

impl RecordRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            source: row.get(0)?,
            cik: row.get(1)?,
            concept: row.get(2)?,
            period_kind: row.get(3)?,
            period_start: row.get(4)?,
            period_end: row.get(5)?,
            value: row.get(6)?,
            unit: row.get(7)?,
            accession: row.get(8)?,
            form: row.get(9)?,
            filed: row.get(10)?,
            fiscal_year: row.get(11)?,
            fiscal_period: row.get(12)?,
            fetched_at: row.get(13)?,
        })
    }

    fn into_record(self) -> Result<ValueRecord> {
        Ok(ValueRecord {
            entity: Cik::new(&self.cik).map_err(storage)?,
            concept: self.concept,
            period: period_from_columns(&self.period_kind, &self.period_start, &self.period_end)?,
            value: self.value,
            unit: self.unit,
            source: self.source,
            filing: FilingRef {
                accession: self.accession,
                form: self.form,
                filed: self.filed.as_deref().map(parse_date).transpose()?,
                fiscal_year: self.fiscal_year,
                fiscal_period: self.fiscal_period,
            },
            fetched_at: parse_timestamp(&self.fetched_at)?,
        })
    }
}

/// A `fetch_errors` row before conversion.
struct ErrorRow {
    cik: String,
    concept: String,
    period_kind: String,
    period_start: String,
    period_end: String,
    kind: String,
    message: String,
    occurred_at: String,
}

impl ErrorRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            cik: row.get(0)?,
            concept: row.get(1)?,
            period_kind: row.get(2)?,
            period_start: row.get(3)?,
            period_end: row.get(4)?,
            kind: row.get(5)?,
            message: row.get(6)?,
            occurred_at: row.get(7)?,
        })
    }

    fn into_error(self) -> Result<FetchError> {
        Ok(FetchError {
            entity: Cik::new(&self.cik).map_err(storage)?,
            concept: self.concept,
            period: period_from_columns(&self.period_kind, &self.period_start, &self.period_end)?,
            kind: self.kind.parse::<ErrorKind>().map_err(storage)?,
            message: self.message,
            occurred_at: parse_timestamp(&self.occurred_at)?,
        })
    }
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(storage)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS value_records (
                source TEXT NOT NULL,
                cik TEXT NOT NULL,
                concept TEXT NOT NULL,
                period_kind TEXT NOT NULL,
                period_start TEXT NOT NULL DEFAULT '',
                period_end TEXT NOT NULL,
                value REAL NOT NULL,
                unit TEXT NOT NULL,
                accession TEXT,
                form TEXT,
                filed TEXT,
                fiscal_year INTEGER,
                fiscal_period TEXT,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (source, cik, concept, period_kind, period_start, period_end)
            );
            CREATE INDEX IF NOT EXISTS idx_values_concept_end
                ON value_records(concept, period_end);

            CREATE TABLE IF NOT EXISTS fetch_errors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cik TEXT NOT NULL,
                concept TEXT NOT NULL,
                period_kind TEXT NOT NULL,
                period_start TEXT NOT NULL DEFAULT '',
                period_end TEXT NOT NULL,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                occurred_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_errors_request
                ON fetch_errors(cik, concept, period_kind, period_start, period_end, occurred_at);

            CREATE TABLE IF NOT EXISTS entities (
                cik TEXT PRIMARY KEY,
                name TEXT,
                ticker TEXT
            );

            CREATE TABLE IF NOT EXISTS concepts (
                name TEXT PRIMARY KEY,
                taxonomy TEXT NOT NULL,
                category TEXT NOT NULL,
                data_type TEXT NOT NULL,
                period_nature TEXT NOT NULL,
                unit TEXT NOT NULL,
                chinese_name TEXT NOT NULL,
                chinese_definition TEXT NOT NULL,
                english_explanation TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dictionary_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS batch_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                requested INTEGER NOT NULL,
                succeeded INTEGER NOT NULL,
                skipped INTEGER NOT NULL,
                cancelled INTEGER NOT NULL,
                failed_json TEXT NOT NULL
            );",
        )
        .map_err(storage)?;

        debug!("SQLite store schema initialized");
        Ok(())
    }

    fn select_records(&self, sql: &str, values: Vec<Value>) -> Result<Vec<ValueRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(storage)?;
        let rows = stmt
            .query_map(params_from_iter(values), RecordRow::read)
            .map_err(storage)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(storage)?.into_record()?);
        }
        Ok(records)
    }

    fn select_errors(&self, sql: &str, values: Vec<Value>) -> Result<Vec<FetchError>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(storage)?;
        let rows = stmt
            .query_map(params_from_iter(values), ErrorRow::read)
            .map_err(storage)?;

        let mut errors = Vec::new();
        for row in rows {
            errors.push(row.map_err(storage)?.into_error()?);
        }
        Ok(errors)
    }
}

#[async_trait]
impl ValueStore for SqliteStore {
    #[instrument(skip(self, record), fields(request = %record.request()))]
    async fn upsert(&self, record: &ValueRecord) -> Result<()> {
        let (kind, start, end) = period_columns(&record.period);
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO value_records
             (source, cik, concept, period_kind, period_start, period_end, value, unit,
              accession, form, filed, fiscal_year, fiscal_period, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.source,
                record.entity.as_str(),
                record.concept,
                kind,
                start,
                end,
                record.value,
                record.unit,
                record.filing.accession,
                record.filing.form,
                record.filing.filed.map(|d| d.to_string()),
                record.filing.fiscal_year,
                record.filing.fiscal_period,
                timestamp(record.fetched_at),
            ],
        )
        .map_err(storage)?;

        debug!("Stored value");
        Ok(())
    }

    #[instrument(skip(self), fields(entity = %entity))]
    async fn get(
        &self,
        source: &str,
        entity: &Cik,
        concept: &str,
        period: &Period,
    ) -> Result<Option<ValueRecord>> {
        let (kind, start, end) = period_columns(period);
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM value_records
                     WHERE source = ?1 AND cik = ?2 AND concept = ?3
                       AND period_kind = ?4 AND period_start = ?5 AND period_end = ?6"
                ),
                params![source, entity.as_str(), concept, kind, start, end],
                RecordRow::read,
            )
            .optional()
            .map_err(storage)?;

        row.map(RecordRow::into_record).transpose()
    }

    #[instrument(skip(self, error), fields(kind = %error.kind))]
    async fn append_error(&self, error: &FetchError) -> Result<()> {
        let (kind, start, end) = period_columns(&error.period);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO fetch_errors
             (cik, concept, period_kind, period_start, period_end, kind, message, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                error.entity.as_str(),
                error.concept,
                kind,
                start,
                end,
                error.kind.as_str(),
                error.message,
                timestamp(error.occurred_at),
            ],
        )
        .map_err(storage)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn query(&self, query: &ValueQuery) -> Result<Vec<ValueRecord>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !query.entities.is_empty() {
            let marks = vec!["?"; query.entities.len()].join(", ");
            clauses.push(format!("cik IN ({marks})"));
            values.extend(query.entities.iter().map(|c| Value::Text(c.to_string())));
        }
        if !query.concepts.is_empty() {
            let marks = vec!["?"; query.concepts.len()].join(", ");
            clauses.push(format!("concept IN ({marks})"));
            values.extend(query.concepts.iter().map(|c| Value::Text(c.clone())));
        }
        if let Some(kind) = query.period_kind {
            clauses.push("period_kind = ?".to_string());
            values.push(Value::Text(kind.code().to_string()));
        }
        if let Some(from) = query.end_from {
            clauses.push("period_end >= ?".to_string());
            values.push(Value::Text(from.to_string()));
        }
        if let Some(to) = query.end_to {
            clauses.push("period_end <= ?".to_string());
            values.push(Value::Text(to.to_string()));
        }
        if let Some(min) = query.min_value {
            clauses.push("value >= ?".to_string());
            values.push(Value::Real(min));
        }
        if let Some(max) = query.max_value {
            clauses.push("value <= ?".to_string());
            values.push(Value::Real(max));
        }
        if let Some(source) = &query.source {
            clauses.push("source = ?".to_string());
            values.push(Value::Text(source.clone()));
        }

        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM value_records");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if let Some(key) = query.sort {
            let column = match key.field {
                SortField::Entity => "cik",
                SortField::Concept => "concept",
                SortField::PeriodEnd => "period_end",
                SortField::Value => "value",
                SortField::FetchedAt => "fetched_at",
            };
            let direction = if key.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY {column} {direction}"));
        }
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(limit_value(limit));
        }

        let records = self.select_records(&sql, values)?;
        debug!("Found {} stored values", records.len());
        Ok(records)
    }

    async fn errors(&self, query: &ErrorQuery) -> Result<Vec<FetchError>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(cik) = &query.entity {
            clauses.push("cik = ?");
            values.push(Value::Text(cik.to_string()));
        }
        if let Some(concept) = &query.concept {
            clauses.push("concept = ?");
            values.push(Value::Text(concept.clone()));
        }
        if let Some(kind) = query.kind {
            clauses.push("kind = ?");
            values.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(since) = query.since {
            clauses.push("occurred_at >= ?");
            values.push(Value::Text(timestamp(since)));
        }

        let mut sql = format!("SELECT {ERROR_COLUMNS} FROM fetch_errors");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY occurred_at DESC, id DESC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(limit_value(limit));
        }

        self.select_errors(&sql, values)
    }

    async fn last_error(
        &self,
        entity: &Cik,
        concept: &str,
        period: &Period,
    ) -> Result<Option<FetchError>> {
        let (kind, start, end) = period_columns(period);
        let sql = format!(
            "SELECT {ERROR_COLUMNS} FROM fetch_errors
             WHERE cik = ? AND concept = ? AND period_kind = ? AND period_start = ? AND period_end = ?
             ORDER BY occurred_at DESC, id DESC LIMIT 1"
        );
        let values = vec![
            Value::Text(entity.to_string()),
            Value::Text(concept.to_string()),
            Value::Text(kind.to_string()),
            Value::Text(start),
            Value::Text(end),
        ];
        Ok(self.select_errors(&sql, values)?.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn prune_errors(&self, older_than: Duration) -> Result<usize> {
        let Some(cutoff) = cutoff(older_than) else {
            return Ok(0);
        };
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM fetch_errors WHERE occurred_at < ?1",
                params![timestamp(cutoff)],
            )
            .map_err(storage)?;

        debug!(removed, "Pruned error log");
        Ok(removed)
    }

    async fn put_entity(&self, entity: &Entity) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO entities (cik, name, ticker) VALUES (?1, ?2, ?3)",
            params![entity.cik.as_str(), entity.name, entity.ticker],
        )
        .map_err(storage)?;
        Ok(())
    }

    async fn entity(&self, cik: &Cik) -> Result<Option<Entity>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT name, ticker FROM entities WHERE cik = ?1",
                params![cik.as_str()],
                |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()
            .map_err(storage)?;

        Ok(row.map(|(name, ticker)| Entity {
            cik: cik.clone(),
            name,
            ticker,
        }))
    }

    #[instrument(skip(self, dictionary), fields(version = %dictionary.version()))]
    async fn sync_concepts(&self, dictionary: &ConceptDictionary) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage)?;

        tx.execute("DELETE FROM concepts", []).map_err(storage)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO concepts
                     (name, taxonomy, category, data_type, period_nature, unit,
                      chinese_name, chinese_definition, english_explanation)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(storage)?;
            for concept in dictionary.iter() {
                let nature = match concept.period_nature {
                    PeriodNature::Instant => "instant",
                    PeriodNature::Duration => "duration",
                };
                stmt.execute(params![
                    concept.name,
                    concept.taxonomy,
                    concept.category.as_str(),
                    concept.data_type.as_str(),
                    nature,
                    concept.unit,
                    concept.chinese_name,
                    concept.chinese_definition,
                    concept.english_explanation,
                ])
                .map_err(storage)?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO dictionary_meta (key, value) VALUES (?1, ?2)",
            params![CONCEPTS_VERSION_KEY, dictionary.version()],
        )
        .map_err(storage)?;
        tx.commit().map_err(storage)?;

        debug!("Synced {} concepts", dictionary.len());
        Ok(dictionary.len())
    }

    async fn concepts_version(&self) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM dictionary_meta WHERE key = ?1",
            params![CONCEPTS_VERSION_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage)
    }

    async fn record_run(&self, run: &BatchRun) -> Result<()> {
        let failed_json =
            serde_json::to_string(&run.summary.failed).map_err(|e| DataError::Parse(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO batch_runs
             (started_at, finished_at, requested, succeeded, skipped, cancelled, failed_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                timestamp(run.started_at),
                timestamp(run.finished_at),
                run.requested as i64,
                run.summary.succeeded as i64,
                run.summary.skipped as i64,
                run.summary.cancelled as i64,
                failed_json,
            ],
        )
        .map_err(storage)?;
        Ok(())
    }

    async fn runs(&self, limit: usize) -> Result<Vec<BatchRun>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT started_at, finished_at, requested, succeeded, skipped, cancelled, failed_json
                 FROM batch_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![limit_value(limit)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(storage)?;

        let mut runs = Vec::new();
        for row in rows {
            let (started, finished, requested, succeeded, skipped, cancelled, failed_json) =
                row.map_err(storage)?;
            runs.push(BatchRun {
                started_at: parse_timestamp(&started)?,
                finished_at: parse_timestamp(&finished)?,
                requested: requested as usize,
                summary: BatchSummary {
                    succeeded: succeeded as usize,
                    skipped: skipped as usize,
                    cancelled: cancelled as usize,
                    failed: serde_json::from_str(&failed_json)
                        .map_err(|e| DataError::Parse(e.to_string()))?,
                },
            });
        }
        Ok(runs)
    }
}
