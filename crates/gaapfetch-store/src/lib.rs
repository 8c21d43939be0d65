#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/gaapfetch/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Storage backends for resolved values.
//!
//! This crate provides implementations of the [`ValueStore`] trait from `gaapfetch-core`:
//!
//! - [`SqliteStore`] - Persistent SQLite-based store (default, requires `sqlite` feature)
//! - [`InMemoryStore`] - Simple in-memory store for testing

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// In-memory store implementation.
pub mod memory;

/// SQLite-based store implementation.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use gaapfetch_core::ValueStore;

// Re-export implementations
pub use memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Oldest timestamp kept by a prune of `older_than`; `None` when the age
/// reaches past the representable range and nothing can be that old.
pub(crate) fn cutoff(older_than: Duration) -> Option<DateTime<Utc>> {
    let age = TimeDelta::from_std(older_than).ok()?;
    Utc::now().checked_sub_signed(age)
}
