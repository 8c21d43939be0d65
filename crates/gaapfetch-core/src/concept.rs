//! Financial concepts and the read-only concept dictionary.
//!
//! Concepts are a fixed reference set. The built-in set ships as a versioned
//! JSON table embedded in this crate; callers may load their own table with
//! [`ConceptDictionary::from_json_str`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::io::Read;

use crate::error::{DataError, Result};
use crate::period::Period;

/// Versioned reference table compiled into the crate.
const BUILTIN_TABLE: &str = include_str!("../data/us_gaap_concepts.json");

/// Semantic category of a concept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptCategory {
    /// Balance-sheet assets.
    Asset,
    /// Balance-sheet liabilities.
    Liability,
    /// Balance-sheet equity.
    Equity,
    /// Revenue and income lines.
    Revenue,
    /// Cost and expense lines.
    Expense,
    /// Cash-flow statement lines.
    CashFlow,
    /// Per-share figures.
    PerShare,
}

impl ConceptCategory {
    /// Stable string code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
            Self::CashFlow => "cash_flow",
            Self::PerShare => "per_share",
        }
    }
}

impl fmt::Display for ConceptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a concept's value is measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptDataType {
    /// Currency amount.
    Monetary,
    /// Currency amount per share.
    PerShare,
    /// Dimensionless ratio.
    Ratio,
    /// Count of units, typically shares.
    Count,
}

impl ConceptDataType {
    /// Stable string code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monetary => "monetary",
            Self::PerShare => "per_share",
            Self::Ratio => "ratio",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for ConceptDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a concept is measured at a point in time or over an interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodNature {
    /// Balance-sheet style, measured at an instant.
    Instant,
    /// Flow style, measured over a duration.
    Duration,
}

/// A named financial data point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Canonical external name, e.g. `NetIncomeLoss`.
    pub name: String,
    /// Taxonomy the name lives in (`us-gaap`, `dei`).
    pub taxonomy: String,
    /// Semantic category.
    pub category: ConceptCategory,
    /// Measurement type.
    pub data_type: ConceptDataType,
    /// Instant or duration.
    pub period_nature: PeriodNature,
    /// Unit the provider normally reports the concept in.
    pub unit: String,
    /// Localized (Chinese) name.
    pub chinese_name: String,
    /// Localized (Chinese) definition.
    pub chinese_definition: String,
    /// English explanation.
    #[serde(default)]
    pub english_explanation: String,
}

impl Concept {
    /// Checks that `period` has the shape this concept is reported in.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidPeriodForConcept`] on mismatch.
    pub fn validate_period(&self, period: &Period) -> Result<()> {
        let reason = match (self.period_nature, period.is_instant()) {
            (PeriodNature::Instant, false) => "balance-sheet concepts require an instant period",
            (PeriodNature::Duration, true) if self.data_type == ConceptDataType::PerShare => {
                "per-share concepts require a duration period"
            }
            (PeriodNature::Duration, true) => "flow concepts require a duration period",
            _ => return Ok(()),
        };
        Err(DataError::InvalidPeriodForConcept {
            concept: self.name.clone(),
            period: period.frame_token(),
            reason: reason.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct DictionaryTable {
    version: String,
    concepts: Vec<Concept>,
}

/// Read-only mapping from concept name to [`Concept`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConceptDictionary {
    version: String,
    concepts: BTreeMap<String, Concept>,
}

impl ConceptDictionary {
    /// Loads the reference table compiled into this crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_TABLE)
    }

    /// Loads a reference table from JSON text.
    ///
    /// # Errors
    /// Returns [`DataError::Parse`] for malformed JSON and
    /// [`DataError::Configuration`] for an empty version, duplicate names or
    /// inconsistent entries.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: DictionaryTable = serde_json::from_str(json)
            .map_err(|e| DataError::Parse(format!("Invalid concept table: {e}")))?;
        Self::from_table(table)
    }

    /// Loads a reference table from a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let table: DictionaryTable = serde_json::from_reader(reader)
            .map_err(|e| DataError::Parse(format!("Invalid concept table: {e}")))?;
        Self::from_table(table)
    }

    fn from_table(table: DictionaryTable) -> Result<Self> {
        if table.version.trim().is_empty() {
            return Err(DataError::Configuration(
                "Concept table has no version".to_string(),
            ));
        }

        let mut concepts = BTreeMap::new();
        for concept in table.concepts {
            if concept.data_type == ConceptDataType::PerShare
                && concept.period_nature == PeriodNature::Instant
            {
                return Err(DataError::Configuration(format!(
                    "Per-share concept {} cannot be an instant",
                    concept.name
                )));
            }
            match concepts.entry(concept.name.clone()) {
                Entry::Occupied(_) => {
                    return Err(DataError::Configuration(format!(
                        "Duplicate concept {}",
                        concept.name
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(concept);
                }
            }
        }

        Ok(Self {
            version: table.version,
            concepts,
        })
    }

    /// Version string of the loaded table.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Looks up a concept by canonical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Concept> {
        self.concepts.get(name)
    }

    /// Looks up a concept, failing with [`DataError::UnknownConcept`].
    pub fn require(&self, name: &str) -> Result<&Concept> {
        self.get(name)
            .ok_or_else(|| DataError::UnknownConcept(name.to_string()))
    }

    /// Iterates concepts in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    /// Concepts of one category, in name order.
    pub fn by_category(&self, category: ConceptCategory) -> impl Iterator<Item = &Concept> {
        self.iter().filter(move |c| c.category == category)
    }

    /// Number of concepts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}
