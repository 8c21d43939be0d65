#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/gaapfetch/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Rate-limited, retrying SEC EDGAR XBRL value fetcher.
//!
//! This crate re-exports the core types, the EDGAR resolver and the storage
//! backends, and provides a [`BatchRunner`] that drives lists of
//! (entity, concept, period) requests into a [`ValueStore`], logging every
//! failure instead of aborting.
//!
//! # Features
//!
//! - `edgar` - SEC EDGAR resolver, HTTP fetcher and rate limiter
//! - `sqlite` - SQLite-backed [`ValueStore`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gaapfetch::{BatchRunner, Cik, ConceptResolver, FetchConfig, FetchRequest, Period, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> gaapfetch::Result<()> {
//!     let config = FetchConfig::new("MyApp/1.0 (contact@example.com)");
//!     let runner = BatchRunner::new(
//!         Arc::new(ConceptResolver::new(&config)?),
//!         Arc::new(SqliteStore::new("values.db")?),
//!     );
//!
//!     let requests = vec![
//!         FetchRequest::new(Cik::from(320_193), "NetIncomeLoss", Period::annual(2024)?),
//!         FetchRequest::new(Cik::from(320_193), "Assets", Period::year_end(2024)?),
//!     ];
//!     let summary = runner.run(&requests).await;
//!     println!("{summary:?}");
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use gaapfetch_core::*;

// Store implementations
pub use gaapfetch_store::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use gaapfetch_store::SqliteStore;

// Provider
#[cfg(feature = "edgar")]
pub use gaapfetch_edgar::{
    ConceptResolver, HttpFetcher, RateLimiter, ReqwestTransport, StubTransport, Transport,
};

mod batch;
pub use batch::{BatchOptions, BatchRunner, StopHandle};
