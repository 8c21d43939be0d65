#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/gaapfetch/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SEC EDGAR XBRL client.
//!
//! This crate provides access to the SEC XBRL REST API:
//!
//! - [`RateLimiter`] - Paces requests below the SEC fair-access ceiling
//! - [`HttpFetcher`] - GET with identifying headers, timeout and retry
//! - [`ConceptResolver`] - Turns (entity, concept, period) into one value
//! - [`StubTransport`] - Scripted responses for offline runs
//!
//! # Example
//!
//! ```no_run
//! use gaapfetch_core::{Cik, FetchConfig, FetchRequest, Period, ValueResolver};
//! use gaapfetch_edgar::ConceptResolver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FetchConfig::new("MyApp/1.0 (contact@example.com)");
//!     let resolver = ConceptResolver::new(&config)?;
//!
//!     let request = FetchRequest::new(Cik::new("320193")?, "NetIncomeLoss", Period::annual(2024)?);
//!     let record = resolver.resolve(&request).await?;
//!     println!("{} {}", record.value, record.unit);
//!
//!     Ok(())
//! }
//! ```

/// HTTP fetch policy and transports.
pub mod fetcher;
/// Request pacing.
pub mod rate_limit;
/// Concept resolution.
pub mod resolver;
/// Scripted transport.
pub mod stub;

mod wire;

pub use fetcher::{
    ACCEPT_ENCODING, HttpFetcher, HttpRequest, RawResponse, ReqwestTransport, Transport,
    classify_status,
};
pub use rate_limit::RateLimiter;
pub use resolver::{ConceptResolver, Observation, SOURCE, frames_unit, select_observation};
pub use stub::StubTransport;
