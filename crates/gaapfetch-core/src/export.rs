//! Dictionary and record export.
//!
//! The concept dictionary is exported as CSV (one row per concept) or as JSON
//! enriched with usage statistics and sample values drawn from stored
//! records. Records themselves can be turned into a polars [`DataFrame`].

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use crate::{
    concept::{Concept, ConceptDictionary},
    error::{DataError, Result},
    types::ValueRecord,
};

/// Export format options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values, dictionary fields only.
    Csv,
    /// Compact JSON with usage and samples.
    Json,
    /// Pretty-printed JSON with usage and samples.
    PrettyJson,
}

impl ExportFormat {
    /// File extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

/// One CSV row.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    concept: &'a str,
    taxonomy: &'a str,
    chinese_name: &'a str,
    chinese_definition: &'a str,
    category: &'static str,
    data_type: &'static str,
}

impl<'a> From<&'a Concept> for CsvRow<'a> {
    fn from(c: &'a Concept) -> Self {
        Self {
            concept: &c.name,
            taxonomy: &c.taxonomy,
            chinese_name: &c.chinese_name,
            chinese_definition: &c.chinese_definition,
            category: c.category.as_str(),
            data_type: c.data_type.as_str(),
        }
    }
}

/// How often a concept appears in the stored records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptUsage {
    /// Entities with at least one record, in CIK order.
    pub companies_using: Vec<String>,
    /// Units seen, sorted.
    pub common_units: Vec<String>,
    /// Total records.
    pub record_count: usize,
}

/// A stored value shown alongside its concept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleValue {
    /// Entity identifier.
    pub cik: String,
    /// Period frame token.
    pub period: String,
    /// Raw value.
    pub value: f64,
    /// Raw unit.
    pub unit: String,
    /// Human readable value, see [`format_value`].
    pub formatted: String,
}

/// One concept in the JSON export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConceptExport {
    /// Canonical name.
    pub concept: String,
    /// Taxonomy.
    pub taxonomy: String,
    /// Localized name.
    pub chinese_name: String,
    /// Localized definition.
    pub chinese_definition: String,
    /// Category code.
    pub category: String,
    /// Data type code.
    pub data_type: String,
    /// English explanation.
    pub english_explanation: String,
    /// Usage statistics.
    pub usage: ConceptUsage,
    /// Most recent values, newest period first.
    pub sample_data: Vec<SampleValue>,
}

/// Builds the JSON export entries for every concept in `dictionary`.
///
/// `records` may hold any mix of concepts; records for concepts outside the
/// dictionary are ignored. At most `sample_size` samples are kept per concept.
#[must_use]
pub fn concept_exports(
    dictionary: &ConceptDictionary,
    records: &[ValueRecord],
    sample_size: usize,
) -> Vec<ConceptExport> {
    let mut by_concept: BTreeMap<&str, Vec<&ValueRecord>> = BTreeMap::new();
    for record in records {
        by_concept.entry(&record.concept).or_default().push(record);
    }

    dictionary
        .iter()
        .map(|concept| {
            let mut matching = by_concept.remove(concept.name.as_str()).unwrap_or_default();
            matching.sort_by(|a, b| {
                b.period
                    .end()
                    .cmp(&a.period.end())
                    .then_with(|| a.entity.cmp(&b.entity))
            });

            let companies: BTreeSet<&str> = matching.iter().map(|r| r.entity.as_str()).collect();
            let units: BTreeSet<&str> = matching.iter().map(|r| r.unit.as_str()).collect();

            ConceptExport {
                concept: concept.name.clone(),
                taxonomy: concept.taxonomy.clone(),
                chinese_name: concept.chinese_name.clone(),
                chinese_definition: concept.chinese_definition.clone(),
                category: concept.category.as_str().to_string(),
                data_type: concept.data_type.as_str().to_string(),
                english_explanation: concept.english_explanation.clone(),
                usage: ConceptUsage {
                    companies_using: companies.into_iter().map(str::to_string).collect(),
                    common_units: units.into_iter().map(str::to_string).collect(),
                    record_count: matching.len(),
                },
                sample_data: matching
                    .iter()
                    .take(sample_size)
                    .map(|r| SampleValue {
                        cik: r.entity.to_string(),
                        period: r.period.frame_token(),
                        value: r.value,
                        unit: r.unit.clone(),
                        formatted: format_value(r.value, &r.unit),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Writes the dictionary as CSV.
///
/// Columns: `concept,taxonomy,chinese_name,chinese_definition,category,data_type`.
pub fn write_dictionary_csv<W: Write>(dictionary: &ConceptDictionary, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for concept in dictionary.iter() {
        wtr.serialize(CsvRow::from(concept))
            .map_err(|e| DataError::Parse(e.to_string()))?;
    }
    wtr.flush().map_err(|e| DataError::Storage(e.to_string()))
}

/// Writes the dictionary with usage and samples as a JSON array.
pub fn write_dictionary_json<W: Write>(
    dictionary: &ConceptDictionary,
    records: &[ValueRecord],
    sample_size: usize,
    pretty: bool,
    writer: W,
) -> Result<()> {
    let entries = concept_exports(dictionary, records, sample_size);
    let written = if pretty {
        serde_json::to_writer_pretty(writer, &entries)
    } else {
        serde_json::to_writer(writer, &entries)
    };
    written.map_err(|e| DataError::Parse(e.to_string()))
}

/// Exports the dictionary to a string in `format`.
pub fn export_dictionary(
    dictionary: &ConceptDictionary,
    records: &[ValueRecord],
    sample_size: usize,
    format: ExportFormat,
) -> Result<String> {
    let mut buf = Vec::new();
    match format {
        ExportFormat::Csv => write_dictionary_csv(dictionary, &mut buf)?,
        ExportFormat::Json => write_dictionary_json(dictionary, records, sample_size, false, &mut buf)?,
        ExportFormat::PrettyJson => {
            write_dictionary_json(dictionary, records, sample_size, true, &mut buf)?;
        }
    }
    String::from_utf8(buf).map_err(|e| DataError::Parse(e.to_string()))
}

/// Converts records into a DataFrame.
///
/// Columns: cik, concept, period, period_kind, period_start, period_end,
/// value, unit, source, form, filed, fetched_at. Date columns are typed as
/// `Date`.
pub fn records_frame(records: &[ValueRecord]) -> Result<DataFrame> {
    let ciks: Vec<&str> = records.iter().map(|r| r.entity.as_str()).collect();
    let concepts: Vec<&str> = records.iter().map(|r| r.concept.as_str()).collect();
    let tokens: Vec<String> = records.iter().map(|r| r.period.frame_token()).collect();
    let kinds: Vec<&str> = records.iter().map(|r| r.period.kind.code()).collect();
    let starts: Vec<Option<String>> = records
        .iter()
        .map(|r| r.period.start().map(|d| d.to_string()))
        .collect();
    let ends: Vec<String> = records.iter().map(|r| r.period.end().to_string()).collect();
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    let units: Vec<&str> = records.iter().map(|r| r.unit.as_str()).collect();
    let sources: Vec<&str> = records.iter().map(|r| r.source.as_str()).collect();
    let forms: Vec<Option<&str>> = records.iter().map(|r| r.filing.form.as_deref()).collect();
    let filed: Vec<Option<String>> = records
        .iter()
        .map(|r| r.filing.filed.map(|d| d.to_string()))
        .collect();
    let fetched: Vec<String> = records.iter().map(|r| r.fetched_at.to_rfc3339()).collect();

    let df = DataFrame::new(vec![
        Column::new("cik".into(), ciks),
        Column::new("concept".into(), concepts),
        Column::new("period".into(), tokens),
        Column::new("period_kind".into(), kinds),
        Column::new("period_start".into(), starts),
        Column::new("period_end".into(), ends),
        Column::new("value".into(), values),
        Column::new("unit".into(), units),
        Column::new("source".into(), sources),
        Column::new("form".into(), forms),
        Column::new("filed".into(), filed),
        Column::new("fetched_at".into(), fetched),
    ])
    .map_err(|e| DataError::Parse(e.to_string()))?;

    df.lazy()
        .with_columns([
            col("period_start").cast(DataType::Date),
            col("period_end").cast(DataType::Date),
            col("filed").cast(DataType::Date),
        ])
        .collect()
        .map_err(|e| DataError::Parse(e.to_string()))
}

/// Formats a value for display according to its unit.
///
/// `USD` amounts are scaled to B/M/K, `shares` to B/M, `USD/shares` is shown
/// per share and `pure` as a plain number.
#[must_use]
pub fn format_value(value: f64, unit: &str) -> String {
    let abs = value.abs();
    match unit {
        "USD" => {
            if abs >= 1e9 {
                format!("${:.2}B", value / 1e9)
            } else if abs >= 1e6 {
                format!("${:.2}M", value / 1e6)
            } else if abs >= 1e3 {
                format!("${:.2}K", value / 1e3)
            } else {
                format!("${value:.2}")
            }
        }
        "USD/shares" | "USD-per-shares" => format!("${value:.2} per share"),
        "shares" => {
            if abs >= 1e9 {
                format!("{:.2}B shares", value / 1e9)
            } else if abs >= 1e6 {
                format!("{:.2}M shares", value / 1e6)
            } else {
                format!("{value:.0} shares")
            }
        }
        "pure" => format!("{value:.4}"),
        other => format!("{value} {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use crate::types::{Cik, FilingRef};
    use chrono::Utc;

    fn record(cik: u64, concept: &str, year: i32, value: f64, unit: &str) -> ValueRecord {
        ValueRecord {
            entity: Cik::from(cik),
            concept: concept.to_string(),
            period: Period::annual(year).unwrap(),
            value,
            unit: unit.to_string(),
            source: "sec-edgar".to_string(),
            filing: FilingRef {
                form: Some("10-K".to_string()),
                ..Default::default()
            },
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(93_736_000_000.0, "USD"), "$93.74B");
        assert_eq!(format_value(-2_500_000.0, "USD"), "$-2.50M");
        assert_eq!(format_value(4_200.0, "USD"), "$4.20K");
        assert_eq!(format_value(12.5, "USD"), "$12.50");
        assert_eq!(format_value(6.11, "USD/shares"), "$6.11 per share");
        assert_eq!(format_value(1_200_000.0, "shares"), "1.20M shares");
        assert_eq!(format_value(15_000_000_000.0, "shares"), "15.00B shares");
        assert_eq!(format_value(0.1625, "pure"), "0.1625");
    }

    #[test]
    fn test_csv_export_columns() {
        let dict = ConceptDictionary::builtin().unwrap();
        let csv = export_dictionary(&dict, &[], 0, ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "concept,taxonomy,chinese_name,chinese_definition,category,data_type"
        );
        assert_eq!(lines.count(), dict.len());
        assert!(csv.contains("NetIncomeLoss,us-gaap,净利润"));
    }

    #[test]
    fn test_json_export_usage_and_samples() {
        let dict = ConceptDictionary::builtin().unwrap();
        let records = vec![
            record(320_193, "NetIncomeLoss", 2023, 96_995_000_000.0, "USD"),
            record(320_193, "NetIncomeLoss", 2024, 93_736_000_000.0, "USD"),
            record(789_019, "NetIncomeLoss", 2024, 88_136_000_000.0, "USD"),
            record(789_019, "NotInDictionary", 2024, 1.0, "USD"),
        ];

        let entries = concept_exports(&dict, &records, 2);
        assert_eq!(entries.len(), dict.len());

        let net_income = entries.iter().find(|e| e.concept == "NetIncomeLoss").unwrap();
        assert_eq!(net_income.usage.record_count, 3);
        assert_eq!(net_income.usage.companies_using, vec!["0000320193", "0000789019"]);
        assert_eq!(net_income.usage.common_units, vec!["USD"]);
        assert_eq!(net_income.sample_data.len(), 2);
        assert_eq!(net_income.sample_data[0].period, "CY2024");
        assert_eq!(net_income.sample_data[0].formatted, "$93.74B");

        let json = export_dictionary(&dict, &records, 2, ExportFormat::Json).unwrap();
        let parsed: Vec<ConceptExport> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), dict.len());
    }

    #[test]
    fn test_records_frame() {
        let records = vec![
            record(320_193, "NetIncomeLoss", 2024, 93_736_000_000.0, "USD"),
            record(789_019, "NetIncomeLoss", 2024, 88_136_000_000.0, "USD"),
        ];
        let df = records_frame(&records).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 12);
        assert_eq!(df.column("period_end").unwrap().dtype(), &DataType::Date);

        let empty = records_frame(&[]).unwrap();
        assert_eq!(empty.height(), 0);
    }
}
