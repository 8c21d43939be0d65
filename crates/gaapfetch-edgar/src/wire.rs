//! SEC API response types.
//!
//! Only the fields the resolver reads are declared; everything else in the
//! payloads is ignored.

use serde::Deserialize;
use std::collections::HashMap;

/// Company ticker information from `company_tickers.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct CompanyTickerInfo {
    /// CIK as a number (SEC returns this as an integer)
    pub(crate) cik_str: u64,
    pub(crate) ticker: String,
    pub(crate) title: String,
}

/// Response from the company concept API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompanyConceptResponse {
    #[serde(default)]
    pub(crate) entity_name: Option<String>,
    /// Observations keyed by unit
    #[serde(default)]
    pub(crate) units: HashMap<String, Vec<FactValue>>,
}

/// A single reported observation.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FactValue {
    /// Absent for instants
    #[serde(default)]
    pub(crate) start: Option<String>,
    pub(crate) end: String,
    pub(crate) val: f64,
    #[serde(default)]
    pub(crate) accn: Option<String>,
    #[serde(default)]
    pub(crate) fy: Option<i32>,
    #[serde(default)]
    pub(crate) fp: Option<String>,
    #[serde(default)]
    pub(crate) form: Option<String>,
    #[serde(default)]
    pub(crate) filed: Option<String>,
    #[serde(default)]
    pub(crate) frame: Option<String>,
}

/// Response from the frames API.
#[derive(Debug, Deserialize)]
pub(crate) struct FramesResponse {
    /// Unit of measure of every value in the frame
    pub(crate) uom: String,
    #[serde(default)]
    pub(crate) data: Vec<FrameValue>,
}

/// One entity's value within a frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FrameValue {
    pub(crate) accn: Option<String>,
    pub(crate) cik: u64,
    #[serde(default)]
    pub(crate) start: Option<String>,
    pub(crate) end: String,
    pub(crate) val: f64,
}
