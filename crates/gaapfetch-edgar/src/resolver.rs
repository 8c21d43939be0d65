//! Concept resolution against the XBRL APIs.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use gaapfetch_core::{
    Cik, Concept, ConceptDictionary, DataError, Entity, FetchConfig, FetchRequest, FilingRef,
    Period, QueryStrategy, Result, ValueRecord, ValueResolver,
};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::fetcher::{HttpFetcher, Transport};
use crate::wire::{CompanyConceptResponse, CompanyTickerInfo, FactValue, FramesResponse};

/// Identifier written to [`ValueRecord::source`].
pub const SOURCE: &str = "sec-edgar";

// =============================================================================
// Observation selection
// =============================================================================

/// One reported value, normalized from either endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Interval start; `None` for instants.
    pub start: Option<NaiveDate>,
    /// Interval end, or the instant.
    pub end: NaiveDate,
    /// Value as reported.
    pub value: f64,
    /// Unit as reported.
    pub unit: String,
    /// Calendar frame the provider assigned, if any.
    pub frame: Option<String>,
    /// Filing the value came from.
    pub filing: FilingRef,
}

/// How closely an observation's span fits the requested period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum MatchRank {
    Exact,
    Frame,
}

fn match_rank(period: &Period, token: &str, obs: &Observation) -> Option<MatchRank> {
    if period.is_instant() != obs.start.is_none() {
        return None;
    }
    if obs.start == period.start() && obs.end == period.end() {
        Some(MatchRank::Exact)
    } else if obs.frame.as_deref() == Some(token) {
        Some(MatchRank::Frame)
    } else {
        None
    }
}

fn form_priority(form: Option<&str>) -> u8 {
    match form {
        Some("10-K") => 0,
        Some("10-Q") => 1,
        _ => 2,
    }
}

/// Picks the observation that best answers `period`.
///
/// Observations of the wrong shape, or that match neither the exact dates
/// nor the period's frame token, are ignored. An exact date match beats a
/// frame match. Remaining ties go to the latest filing date, then 10-K over
/// 10-Q over other forms, then the highest accession number.
#[must_use]
pub fn select_observation<'a>(
    period: &Period,
    observations: &'a [Observation],
) -> Option<&'a Observation> {
    let token = period.frame_token();
    observations
        .iter()
        .filter_map(|obs| match_rank(period, &token, obs).map(|rank| (rank, obs)))
        .min_by_key(|(rank, obs)| {
            (
                *rank,
                Reverse(obs.filing.filed),
                form_priority(obs.filing.form.as_deref()),
                Reverse(obs.filing.accession.clone()),
            )
        })
        .map(|(_, obs)| obs)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("Invalid date {s:?}: {e}")))
}

fn parse_span(start: Option<&str>, end: &str) -> Result<(Option<NaiveDate>, NaiveDate)> {
    Ok((start.map(parse_date).transpose()?, parse_date(end)?))
}

impl Observation {
    fn from_fact(unit: &str, fact: &FactValue) -> Result<Self> {
        let (start, end) = parse_span(fact.start.as_deref(), &fact.end)?;
        Ok(Self {
            start,
            end,
            value: fact.val,
            unit: unit.to_string(),
            frame: fact.frame.clone(),
            filing: FilingRef {
                accession: fact.accn.clone(),
                form: fact.form.clone(),
                filed: fact.filed.as_deref().and_then(|d| {
                    parse_date(d)
                        .map_err(|e| debug!(error = %e, "Ignoring malformed filing date"))
                        .ok()
                }),
                fiscal_year: fact.fy,
                fiscal_period: fact.fp.clone(),
            },
        })
    }
}

/// Frames API unit path segment (`USD/shares` becomes `USD-per-shares`).
#[must_use]
pub fn frames_unit(unit: &str) -> String {
    unit.replace('/', "-per-")
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves requests through the SEC XBRL APIs.
#[derive(Debug)]
pub struct ConceptResolver {
    fetcher: HttpFetcher,
    dictionary: Arc<ConceptDictionary>,
    base_url: String,
    tickers_url: String,
    strategy: QueryStrategy,
}

impl ConceptResolver {
    /// Creates a resolver over the network with the built-in dictionary.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] for invalid settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config)?;
        Ok(Self::from_parts(config, fetcher, Arc::new(ConceptDictionary::builtin()?)))
    }

    /// Creates a resolver over a custom transport with the built-in dictionary.
    ///
    /// # Errors
    /// Returns [`DataError::Configuration`] for invalid settings.
    pub fn with_transport(config: &FetchConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let fetcher = HttpFetcher::with_transport(config, transport)?;
        Ok(Self::from_parts(config, fetcher, Arc::new(ConceptDictionary::builtin()?)))
    }

    /// Assembles a resolver from an existing fetcher and dictionary.
    #[must_use]
    pub fn from_parts(
        config: &FetchConfig,
        fetcher: HttpFetcher,
        dictionary: Arc<ConceptDictionary>,
    ) -> Self {
        Self {
            fetcher,
            dictionary,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tickers_url: config.tickers_url.clone(),
            strategy: config.strategy,
        }
    }

    /// Replaces the concept dictionary.
    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Arc<ConceptDictionary>) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// The concept dictionary in use.
    #[must_use]
    pub fn dictionary(&self) -> &ConceptDictionary {
        &self.dictionary
    }

    /// The underlying fetcher.
    #[must_use]
    pub const fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }

    /// The endpoint strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> QueryStrategy {
        self.strategy
    }

    /// Company concept URL for one entity and concept.
    #[must_use]
    pub fn company_concept_url(&self, cik: &Cik, concept: &Concept) -> String {
        format!(
            "{}/api/xbrl/companyconcept/CIK{}/{}/{}.json",
            self.base_url, cik, concept.taxonomy, concept.name
        )
    }

    /// Frames URL for one concept and period, in the concept's preferred unit.
    #[must_use]
    pub fn frames_url(&self, concept: &Concept, period: &Period) -> String {
        format!(
            "{}/api/xbrl/frames/{}/{}/{}/{}.json",
            self.base_url,
            concept.taxonomy,
            concept.name,
            frames_unit(&concept.unit),
            period.frame_token()
        )
    }

    /// Fetches every observation the provider has for the request.
    ///
    /// With the company concept strategy this is every value the entity
    /// reported for the concept; with the frames strategy it is the entity's
    /// value in the requested frame, if any.
    pub async fn observations(
        &self,
        concept: &Concept,
        request: &FetchRequest,
    ) -> Result<Vec<Observation>> {
        match self.strategy {
            QueryStrategy::CompanyConcept => {
                let url = self.company_concept_url(&request.entity, concept);
                let response: CompanyConceptResponse = self.fetcher.get_json(&url).await?;
                debug!(
                    entity = response.entity_name.as_deref().unwrap_or_default(),
                    units = response.units.len(),
                    "Fetched company concept"
                );

                let mut observations = Vec::new();
                for (unit, facts) in &response.units {
                    for fact in facts {
                        match Observation::from_fact(unit, fact) {
                            Ok(obs) => observations.push(obs),
                            Err(e) => warn!(unit = %unit, error = %e, "Skipping malformed fact"),
                        }
                    }
                }
                Ok(observations)
            }
            QueryStrategy::Frames => {
                let token = request.period.frame_token();
                let url = self.frames_url(concept, &request.period);
                let response: FramesResponse = self.fetcher.get_json(&url).await?;
                let unit = response.uom.replace("-per-", "/");
                let cik = request.entity.number();

                let observations = response
                    .data
                    .iter()
                    .filter(|v| v.cik == cik)
                    .filter_map(|v| match parse_span(v.start.as_deref(), &v.end) {
                        Ok((start, end)) => Some(Observation {
                            start,
                            end,
                            value: v.val,
                            unit: unit.clone(),
                            frame: Some(token.clone()),
                            filing: FilingRef {
                                accession: v.accn.clone(),
                                ..Default::default()
                            },
                        }),
                        Err(e) => {
                            warn!(frame = %token, error = %e, "Skipping malformed frame value");
                            None
                        }
                    })
                    .collect();
                Ok(observations)
            }
        }
    }

    /// Resolves a ticker symbol to an entity via the SEC ticker map.
    ///
    /// # Errors
    /// [`DataError::Configuration`] for an empty ticker, [`DataError::NotFound`]
    /// when the ticker is not listed, or any fetch error.
    #[instrument(skip(self))]
    pub async fn lookup_ticker(&self, ticker: &str) -> Result<Entity> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(DataError::Configuration("Empty ticker".to_string()));
        }

        let data: HashMap<String, CompanyTickerInfo> =
            self.fetcher.get_json(&self.tickers_url).await?;

        let company = data
            .values()
            .find(|c| c.ticker.eq_ignore_ascii_case(ticker))
            .ok_or_else(|| DataError::NotFound(format!("Ticker {ticker}")))?;

        let cik = Cik::from(company.cik_str);
        debug!(%cik, "Found CIK for ticker");
        Ok(Entity::new(cik)
            .with_name(company.title.clone())
            .with_ticker(company.ticker.clone()))
    }
}

#[async_trait]
impl ValueResolver for ConceptResolver {
    fn name(&self) -> &str {
        "SEC EDGAR"
    }

    fn source(&self) -> &str {
        SOURCE
    }

    #[instrument(skip(self), fields(request = %request))]
    async fn resolve(&self, request: &FetchRequest) -> Result<ValueRecord> {
        let concept = self.dictionary.require(&request.concept)?;
        concept.validate_period(&request.period)?;

        let observations = self.observations(concept, request).await?;
        let preferred: Vec<Observation> = observations
            .iter()
            .filter(|o| o.unit == concept.unit)
            .cloned()
            .collect();

        // Other units only answer when the preferred unit has no match.
        let chosen = select_observation(&request.period, &preferred)
            .or_else(|| select_observation(&request.period, &observations))
            .ok_or_else(|| DataError::NoDataForPeriod {
                cik: request.entity.to_string(),
                concept: request.concept.clone(),
                period: request.period.frame_token(),
            })?;
        debug!(
            value = chosen.value,
            unit = %chosen.unit,
            form = chosen.filing.form.as_deref().unwrap_or_default(),
            "Resolved value"
        );

        Ok(ValueRecord {
            entity: request.entity.clone(),
            concept: concept.name.clone(),
            period: request.period,
            value: chosen.value,
            unit: chosen.unit.clone(),
            source: SOURCE.to_string(),
            filing: chosen.filing.clone(),
            fetched_at: Utc::now(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubTransport;
    use gaapfetch_core::PeriodKind;
    use serde_json::json;

    const APPLE_NET_INCOME: &str =
        "https://data.sec.gov/api/xbrl/companyconcept/CIK0000320193/us-gaap/NetIncomeLoss.json";
    const APPLE_ASSETS: &str =
        "https://data.sec.gov/api/xbrl/companyconcept/CIK0000320193/us-gaap/Assets.json";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(end: NaiveDate, value: f64, form: &str, filed: NaiveDate, accn: &str) -> Observation {
        Observation {
            start: None,
            end,
            value,
            unit: "USD".to_string(),
            frame: None,
            filing: FilingRef {
                accession: Some(accn.to_string()),
                form: Some(form.to_string()),
                filed: Some(filed),
                ..Default::default()
            },
        }
    }

    fn resolver(stub: &Arc<StubTransport>) -> ConceptResolver {
        let config = FetchConfig::new("gaapfetch tests test@example.com");
        ConceptResolver::with_transport(&config, stub.clone()).unwrap()
    }

    #[test]
    fn test_later_filing_wins_over_form() {
        let period = Period::year_end(2023).unwrap();
        let end = date(2023, 12, 31);
        let observations = vec![
            obs(end, 1.0, "10-K", date(2024, 1, 10), "0000000001-24-000001"),
            obs(end, 2.0, "10-Q", date(2024, 2, 1), "0000000001-24-000002"),
        ];
        let chosen = select_observation(&period, &observations).unwrap();
        assert_eq!(chosen.value, 2.0);
        assert_eq!(chosen.filing.form.as_deref(), Some("10-Q"));
    }

    #[test]
    fn test_form_then_accession_break_same_day_ties() {
        let period = Period::year_end(2023).unwrap();
        let end = date(2023, 12, 31);
        let filed = date(2024, 2, 1);

        let by_form = vec![
            obs(end, 1.0, "10-Q", filed, "0000000001-24-000009"),
            obs(end, 2.0, "10-K", filed, "0000000001-24-000001"),
            obs(end, 3.0, "8-K", filed, "0000000001-24-000010"),
        ];
        assert_eq!(select_observation(&period, &by_form).unwrap().value, 2.0);

        let by_accession = vec![
            obs(end, 1.0, "10-K", filed, "0000000001-24-000001"),
            obs(end, 2.0, "10-K", filed, "0000000001-24-000003"),
        ];
        assert_eq!(select_observation(&period, &by_accession).unwrap().value, 2.0);
    }

    #[test]
    fn test_exact_match_beats_frame_match() {
        let period = Period::duration(PeriodKind::Annual, date(2023, 10, 1), date(2024, 9, 28)).unwrap();
        let mut framed = obs(date(2024, 12, 31), 1.0, "10-K", date(2025, 2, 1), "a");
        framed.start = Some(date(2024, 1, 1));
        framed.frame = Some("CY2024".to_string());
        let mut exact = obs(date(2024, 9, 28), 2.0, "10-K", date(2024, 11, 1), "b");
        exact.start = Some(date(2023, 10, 1));

        let both = [framed, exact];
        let chosen = select_observation(&period, &both).unwrap();
        assert_eq!(chosen.value, 2.0);
    }

    #[test]
    fn test_shape_mismatch_is_ignored() {
        let period = Period::year_end(2023).unwrap();
        let mut duration = obs(date(2023, 12, 31), 1.0, "10-K", date(2024, 1, 10), "a");
        duration.start = Some(date(2023, 1, 1));
        assert!(select_observation(&period, &[duration]).is_none());
    }

    #[test]
    fn test_frames_unit_encoding() {
        assert_eq!(frames_unit("USD/shares"), "USD-per-shares");
        assert_eq!(frames_unit("USD"), "USD");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_apple_net_income() {
        let stub = Arc::new(StubTransport::new());
        stub.push_json(
            APPLE_NET_INCOME,
            &json!({
                "cik": 320193,
                "taxonomy": "us-gaap",
                "tag": "NetIncomeLoss",
                "entityName": "Apple Inc.",
                "units": {
                    "USD": [
                        {"start": "2022-09-25", "end": "2023-09-30", "val": 96995000000_i64,
                         "accn": "0000320193-23-000106", "fy": 2023, "fp": "FY", "form": "10-K",
                         "filed": "2023-11-03", "frame": "CY2023"},
                        {"start": "2023-10-01", "end": "2024-09-28", "val": 93736000000_i64,
                         "accn": "0000320193-24-000123", "fy": 2024, "fp": "FY", "form": "10-K",
                         "filed": "2024-11-01", "frame": "CY2024"},
                        {"start": "2024-06-30", "end": "2024-09-28", "val": 14736000000_i64,
                         "accn": "0000320193-24-000123", "fy": 2024, "fp": "FY", "form": "10-K",
                         "filed": "2024-11-01", "frame": "CY2024Q3"}
                    ]
                }
            }),
        );

        let resolver = resolver(&stub);
        let request = FetchRequest::new(
            Cik::new("0000320193").unwrap(),
            "NetIncomeLoss",
            Period::annual(2024).unwrap(),
        );
        let record = resolver.resolve(&request).await.unwrap();

        assert_eq!(record.value, 93_736_000_000.0);
        assert_eq!(record.unit, "USD");
        assert_eq!(record.source, SOURCE);
        assert_eq!(record.filing.form.as_deref(), Some("10-K"));
        assert_eq!(record.filing.filed, Some(date(2024, 11, 1)));
        assert_eq!(record.filing.fiscal_year, Some(2024));
        assert_eq!(stub.calls_to(APPLE_NET_INCOME), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_period_makes_no_request() {
        let stub = Arc::new(StubTransport::new());
        let resolver = resolver(&stub);

        let request = FetchRequest::new(Cik::from(320_193), "Assets", Period::annual(2024).unwrap());
        let err = resolver.resolve(&request).await.unwrap_err();
        assert!(matches!(err, DataError::InvalidPeriodForConcept { .. }));

        let request = FetchRequest::new(
            Cik::from(320_193),
            "NotAConcept",
            Period::annual(2024).unwrap(),
        );
        assert!(matches!(
            resolver.resolve(&request).await.unwrap_err(),
            DataError::UnknownConcept(_)
        ));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_matching_period() {
        let stub = Arc::new(StubTransport::new());
        stub.push_json(
            APPLE_ASSETS,
            &json!({
                "entityName": "Apple Inc.",
                "units": {"USD": [
                    {"end": "2022-09-24", "val": 352755000000_i64, "accn": "0000320193-22-000108",
                     "form": "10-K", "filed": "2022-10-28", "frame": "CY2022Q3I"}
                ]}
            }),
        );

        let resolver = resolver(&stub);
        let request =
            FetchRequest::new(Cik::from(320_193), "Assets", Period::quarter_end(2024, 3).unwrap());
        let err = resolver.resolve(&request).await.unwrap_err();
        assert!(matches!(err, DataError::NoDataForPeriod { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preferred_unit_and_fallback() {
        let url = "https://data.sec.gov/api/xbrl/companyconcept/CIK0000320193/us-gaap/Revenues.json";
        let stub = Arc::new(StubTransport::new());
        stub.push_json(
            url,
            &json!({
                "units": {
                    "EUR": [{"start": "2024-01-01", "end": "2024-12-31", "val": 1.0,
                             "form": "10-K", "filed": "2025-03-01"}],
                    "USD": [{"start": "2024-01-01", "end": "2024-12-31", "val": 2.0,
                             "form": "10-K", "filed": "2025-02-01"}]
                }
            }),
        );

        let resolver = resolver(&stub);
        let request = FetchRequest::new(Cik::from(320_193), "Revenues", Period::annual(2024).unwrap());
        let record = resolver.resolve(&request).await.unwrap();
        assert_eq!(record.unit, "USD");
        assert_eq!(record.value, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_unit_answers_when_preferred_has_no_match() {
        let url = "https://data.sec.gov/api/xbrl/companyconcept/CIK0000320193/us-gaap/Revenues.json";
        let stub = Arc::new(StubTransport::new());
        stub.push_json(
            url,
            &json!({
                "units": {
                    "USD": [{"start": "2023-01-01", "end": "2023-12-31", "val": 1.0,
                             "form": "10-K", "filed": "2024-02-01"}],
                    "EUR": [{"start": "2024-01-01", "end": "2024-12-31", "val": 2.0,
                             "form": "10-K", "filed": "2025-02-01"}]
                }
            }),
        );

        let resolver = resolver(&stub);
        let request = FetchRequest::new(Cik::from(320_193), "Revenues", Period::annual(2024).unwrap());
        let record = resolver.resolve(&request).await.unwrap();
        assert_eq!(record.unit, "EUR");
        assert_eq!(record.value, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_facts_are_skipped() {
        let url = "https://data.sec.gov/api/xbrl/companyconcept/CIK0000320193/us-gaap/Revenues.json";
        let stub = Arc::new(StubTransport::new());
        stub.push_json(
            url,
            &json!({
                "units": {"USD": [
                    {"start": "2019-01-01", "end": "2019-13-40", "val": 1.0,
                     "form": "10-K", "filed": "2020-02-01"},
                    {"start": "2024-01-01", "end": "2024-12-31", "val": 2.0,
                     "form": "10-K", "filed": "not-a-date"}
                ]}
            }),
        );

        let resolver = resolver(&stub);
        let request = FetchRequest::new(Cik::from(320_193), "Revenues", Period::annual(2024).unwrap());
        let record = resolver.resolve(&request).await.unwrap();
        assert_eq!(record.value, 2.0);
        assert_eq!(record.filing.filed, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_values_are_skipped() {
        let url = "https://data.sec.gov/api/xbrl/frames/us-gaap/Revenues/USD/CY2024.json";
        let stub = Arc::new(StubTransport::new());
        stub.push_json(
            url,
            &json!({
                "uom": "USD",
                "data": [
                    {"accn": "a", "cik": 320193, "start": "2024-01-01", "end": "bad", "val": 1.0},
                    {"accn": "b", "cik": 320193, "start": "2024-01-01", "end": "2024-12-31", "val": 2.0}
                ]
            }),
        );

        let config = FetchConfig::new("gaapfetch tests test@example.com")
            .with_strategy(QueryStrategy::Frames);
        let resolver = ConceptResolver::with_transport(&config, stub.clone()).unwrap();
        let request = FetchRequest::new(Cik::from(320_193), "Revenues", Period::annual(2024).unwrap());
        let record = resolver.resolve(&request).await.unwrap();
        assert_eq!(record.value, 2.0);
        assert_eq!(record.filing.accession.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_propagate_unchanged() {
        let stub = Arc::new(StubTransport::new());
        let resolver = resolver(&stub);

        let request = FetchRequest::new(
            Cik::from(320_193),
            "NetIncomeLoss",
            Period::annual(2024).unwrap(),
        );
        let err = resolver.resolve(&request).await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));

        stub.push(APPLE_NET_INCOME, 200, "<html>");
        let err = resolver.resolve(&request).await.unwrap_err();
        assert!(matches!(err, DataError::Parse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_strategy() {
        let url = "https://data.sec.gov/api/xbrl/frames/us-gaap/EarningsPerShareBasic/USD-per-shares/CY2024.json";
        let stub = Arc::new(StubTransport::new());
        stub.push_json(
            url,
            &json!({
                "taxonomy": "us-gaap", "tag": "EarningsPerShareBasic", "ccp": "CY2024",
                "uom": "USD-per-shares", "pts": 2,
                "data": [
                    {"accn": "0000789019-24-000001", "cik": 789019, "entityName": "MICROSOFT",
                     "start": "2023-07-01", "end": "2024-06-30", "val": 11.86},
                    {"accn": "0000320193-24-000123", "cik": 320193, "entityName": "Apple Inc.",
                     "start": "2023-10-01", "end": "2024-09-28", "val": 6.11}
                ]
            }),
        );

        let config = FetchConfig::new("gaapfetch tests test@example.com")
            .with_strategy(QueryStrategy::Frames);
        let resolver = ConceptResolver::with_transport(&config, stub.clone()).unwrap();
        let request = FetchRequest::new(
            Cik::from(320_193),
            "EarningsPerShareBasic",
            Period::annual(2024).unwrap(),
        );
        let record = resolver.resolve(&request).await.unwrap();
        assert_eq!(record.value, 6.11);
        assert_eq!(record.unit, "USD/shares");
        assert_eq!(
            record.filing.accession.as_deref(),
            Some("0000320193-24-000123")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_ticker() {
        let stub = Arc::new(StubTransport::new());
        stub.push_json(
            "https://www.sec.gov/files/company_tickers.json",
            &json!({
                "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
                "1": {"cik_str": 789019, "ticker": "MSFT", "title": "MICROSOFT CORP"}
            }),
        );

        let resolver = resolver(&stub);
        let entity = resolver.lookup_ticker("msft").await.unwrap();
        assert_eq!(entity.cik.as_str(), "0000789019");
        assert_eq!(entity.ticker.as_deref(), Some("MSFT"));
        assert_eq!(entity.name.as_deref(), Some("MICROSOFT CORP"));

        assert!(matches!(
            resolver.lookup_ticker("ZZZZ").await,
            Err(DataError::NotFound(_))
        ));
        assert!(matches!(
            resolver.lookup_ticker(" ").await,
            Err(DataError::Configuration(_))
        ));
    }
}
