//! Resolver trait.
//!
//! A [`ValueResolver`] turns one [`FetchRequest`] into one normalized
//! [`ValueRecord`]. The batch runner depends only on this trait, so a
//! provider-backed resolver and a test double are interchangeable.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{FetchRequest, ValueRecord},
};

/// Resolves (entity, concept, period) requests into values.
#[async_trait]
pub trait ValueResolver: Send + Sync + Debug {
    /// Human readable provider name (e.g. "SEC EDGAR").
    fn name(&self) -> &str;

    /// Provider identifier written to [`ValueRecord::source`].
    fn source(&self) -> &str;

    /// Resolves one request.
    ///
    /// # Errors
    /// Any [`DataError`](crate::DataError) variant; the caller records its
    /// [`ErrorKind`](crate::ErrorKind) and moves on.
    async fn resolve(&self, request: &FetchRequest) -> Result<ValueRecord>;
}
