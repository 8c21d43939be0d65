#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/gaapfetch/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for SEC XBRL value fetching.
//!
//! This crate provides the foundational abstractions shared by the fetcher,
//! the stores and the batch runner:
//!
//! - [`ValueResolver`](resolver::ValueResolver) - Resolves one request into one value
//! - [`ValueStore`](store::ValueStore) - Durable values, error log and reference tables
//! - [`ConceptDictionary`](concept::ConceptDictionary) - Versioned bilingual concept table
//! - [`FetchConfig`](config::FetchConfig) - Client settings and retry policy

/// Concept definitions and the concept dictionary.
pub mod concept;
/// Client configuration and retry policy.
pub mod config;
/// Error types for fetch, resolution and storage.
pub mod error;
/// Dictionary and record export.
pub mod export;
/// Reporting periods and frame tokens.
pub mod period;
/// Resolver trait.
pub mod resolver;
/// Store trait and query types.
pub mod store;
/// Core data types (Cik, ValueRecord, FetchError, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use concept::{Concept, ConceptCategory, ConceptDataType, ConceptDictionary, PeriodNature};
pub use config::{FetchConfig, QueryStrategy, RetryPolicy};
pub use error::{DataError, ErrorKind, Result};
pub use export::{ExportFormat, format_value, records_frame};
pub use period::{Period, PeriodKind, PeriodSpan};
pub use resolver::ValueResolver;
pub use store::{ErrorQuery, SortField, SortKey, ValueQuery, ValueStore};
pub use types::{
    BatchRun, BatchSummary, Cik, Entity, FetchError, FetchRequest, FilingRef, ValueRecord,
};
