//! Shanghai Gold Exchange client
//!
//! Two endpoints:
//! - homepage html carrying the morning/midday fixing prices
//! - `graph/quotations` JSON with the intraday Au99.99 curve for the current
//!   (or most recent) trading cycle, one slot per minute
//!
//! No API key required. Neither endpoint is documented; shapes below are what
//! the site serves to its own charts.

use super::fixing::extract_session_fixing_price;
use super::quote_source::{json_price, AdapterError, FetchOutcome, QuoteSource};
use crate::calendar::{fixing_window_at, session_date_for};
use crate::models::{DaySeries, PriceSample, SeriesPoint, SourceId};
use crate::series::last_positive;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use reqwest::header::{ACCEPT, REFERER};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const HOME_URL: &str = "https://www.sge.com.cn/";
pub const QUOTATIONS_URL: &str = "https://www.sge.com.cn/graph/quotations";
const QUOTATIONS_REFERER: &str = "https://www.sge.com.cn/sjzx/mrhq";
const DEFAULT_INSTRUMENT: &str = "Au99.99";
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";

#[derive(Debug, Deserialize)]
struct QuotationsResponse {
    #[serde(default)]
    times: Vec<String>,
    data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    max: Option<serde_json::Value>,
    #[serde(default)]
    heyue: Option<String>,
    #[serde(default)]
    delaystr: Option<String>,
}

/// Parse a `graph/quotations` body into a raw (unsanitized) day series.
pub fn parse_quotations(body: &str, session_date: NaiveDate) -> Result<DaySeries, AdapterError> {
    let resp: QuotationsResponse = serde_json::from_str(body)?;

    let data = match resp.data {
        Some(d) if !d.is_empty() => d,
        _ => return Err(AdapterError::Shape("quotations without data".into())),
    };

    // Unparseable slots become placeholders rather than failing the series.
    let samples: Vec<SeriesPoint> = resp
        .times
        .into_iter()
        .zip(data.iter())
        .map(|(time, v)| SeriesPoint::new(time, json_price(v).unwrap_or(0.0)))
        .collect();

    if samples.is_empty() {
        return Err(AdapterError::Shape("quotations without time labels".into()));
    }

    let observed_max = samples
        .iter()
        .filter(|p| !p.is_placeholder())
        .map(|p| p.price)
        .fold(0.0_f64, f64::max);
    let ceiling_price = resp
        .max
        .as_ref()
        .and_then(json_price)
        .filter(|m| *m > 0.0)
        .unwrap_or(observed_max);

    if let Some(delay) = resp.delaystr.as_deref().filter(|s| !s.is_empty()) {
        debug!("SGE quotations as of {}", delay);
    }

    Ok(DaySeries {
        session_date,
        samples,
        ceiling_price,
        instrument_label: resp
            .heyue
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_INSTRUMENT.to_string()),
        fetched_at: Utc::now(),
    })
}

/// Shared HTTP access to both SGE endpoints.
pub struct SgeClient {
    client: Client,
    home_url: String,
    quotations_url: String,
}

impl SgeClient {
    pub fn new(home_url: impl Into<String>, quotations_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            home_url: home_url.into(),
            quotations_url: quotations_url.into(),
        })
    }

    pub async fn fetch_home(&self) -> Result<String, AdapterError> {
        let response = self
            .client
            .get(&self.home_url)
            .header(ACCEPT, "text/html")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Network(format!("SGE homepage: {}", response.status())));
        }
        Ok(response.text().await?)
    }

    pub async fn fetch_quotations(&self, now: NaiveDateTime) -> Result<DaySeries, AdapterError> {
        let url = format!("{}?t={}", self.quotations_url, Utc::now().timestamp_millis());

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(REFERER, QUOTATIONS_REFERER)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Network(format!("SGE quotations: {}", response.status())));
        }

        let body = response.text().await?;
        parse_quotations(&body, session_date_for(now))
    }
}

/// Live trading source: homepage fixing plus the intraday curve.
pub struct SgeIntradayAdapter {
    client: Arc<SgeClient>,
}

impl SgeIntradayAdapter {
    pub fn new(client: Arc<SgeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuoteSource for SgeIntradayAdapter {
    fn provider_name(&self) -> &str {
        "SGE intraday"
    }

    fn source_id(&self) -> SourceId {
        SourceId::SgeIntraday
    }

    async fn try_fetch(&self, now: NaiveDateTime) -> Result<FetchOutcome, AdapterError> {
        let (home, series) = tokio::join!(self.client.fetch_home(), self.client.fetch_quotations(now));

        let fixing = match home {
            Ok(html) => extract_session_fixing_price(&html, fixing_window_at(now.time())),
            Err(e) => {
                debug!("SGE homepage unavailable: {}", e);
                None
            }
        };

        let fixing_sample = fixing.map(|price| {
            debug!("SGE fixing price: {}", price);
            PriceSample::flat(price, SourceId::SgeIntraday).with_label(DEFAULT_INSTRUMENT)
        });

        merge_intraday(fixing_sample, series)
    }
}

/// Combine the homepage fixing with the curve fetch. Either half is enough;
/// the curve error surfaces only when there is no fixing either.
pub fn merge_intraday(
    fixing: Option<PriceSample>,
    series: Result<DaySeries, AdapterError>,
) -> Result<FetchOutcome, AdapterError> {
    match (fixing, series) {
        (Some(sample), Ok(series)) => Ok(FetchOutcome::Both { sample, series }),
        (None, Ok(series)) => Ok(FetchOutcome::Series(series)),
        (Some(sample), Err(e)) => {
            warn!("SGE quotations failed, using fixing price only: {}", e);
            Ok(FetchOutcome::Price(sample))
        }
        (None, Err(e)) => Err(e),
    }
}

/// Closed-market source: the curve of the last completed session.
pub struct SgeQuotationsAdapter {
    client: Arc<SgeClient>,
}

impl SgeQuotationsAdapter {
    pub fn new(client: Arc<SgeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuoteSource for SgeQuotationsAdapter {
    fn provider_name(&self) -> &str {
        "SGE quotations"
    }

    fn source_id(&self) -> SourceId {
        SourceId::SgeQuotations
    }

    async fn try_fetch(&self, now: NaiveDateTime) -> Result<FetchOutcome, AdapterError> {
        let series = self.client.fetch_quotations(now).await?;
        if last_positive(&series.samples).is_none() {
            return Err(AdapterError::NoData("quotations carry no traded slot".into()));
        }
        Ok(FetchOutcome::Series(series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 15).unwrap()
    }

    #[test]
    fn test_parse_quotations() {
        let body = r#"{
            "times": ["20:00", "20:01", "09:00", "09:01", "09:02"],
            "data": [915.1, "915.3", 916.0, 0, 0],
            "max": 916.0,
            "heyue": "Au99.99",
            "delaystr": "2024-11-15 09:00"
        }"#;
        let series = parse_quotations(body, date()).unwrap();
        assert_eq!(series.samples.len(), 5);
        assert_eq!(series.samples[1].price, 915.3);
        assert!(series.samples[4].is_placeholder());
        assert_eq!(series.ceiling_price, 916.0);
        assert_eq!(series.instrument_label, "Au99.99");
        assert_eq!(series.session_date, date());
    }

    #[test]
    fn test_parse_quotations_defaults() {
        let body = r#"{"times": ["09:00", "09:01"], "data": [912.5, 913.0]}"#;
        let series = parse_quotations(body, date()).unwrap();
        assert_eq!(series.ceiling_price, 913.0);
        assert_eq!(series.instrument_label, "Au99.99");
    }

    #[test]
    fn test_parse_quotations_shape_errors() {
        assert!(matches!(parse_quotations(r#"{"times": []}"#, date()), Err(AdapterError::Shape(_))));
        assert!(matches!(
            parse_quotations(r#"{"times": [], "data": []}"#, date()),
            Err(AdapterError::Shape(_))
        ));
        assert!(matches!(parse_quotations("<html>", date()), Err(AdapterError::Shape(_))));
    }

    fn curve() -> DaySeries {
        parse_quotations(r#"{"times": ["09:00", "09:01"], "data": [912.5, 913.0]}"#, date()).unwrap()
    }

    fn fixing() -> PriceSample {
        PriceSample::flat(910.2, SourceId::SgeIntraday)
    }

    #[test]
    fn test_merge_intraday_keeps_both_halves() {
        let (sample, series) = (fixing(), curve());
        let outcome = merge_intraday(Some(sample.clone()), Ok(series.clone())).unwrap();
        assert_eq!(outcome, FetchOutcome::Both { sample, series });
    }

    #[test]
    fn test_merge_intraday_curve_only() {
        let outcome = merge_intraday(None, Ok(curve())).unwrap();
        assert!(matches!(outcome, FetchOutcome::Series(s) if s.samples.len() == 2));
    }

    #[test]
    fn test_merge_intraday_falls_back_to_fixing() {
        let outcome = merge_intraday(Some(fixing()), Err(AdapterError::Network("timeout".into()))).unwrap();
        assert!(matches!(outcome, FetchOutcome::Price(p) if p.price == 910.2));
    }

    #[test]
    fn test_merge_intraday_propagates_curve_error() {
        let result = merge_intraday(None, Err(AdapterError::Shape("missing data".into())));
        assert!(matches!(result, Err(AdapterError::Shape(_))));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_quotations_fetch() {
        let client = SgeClient::new(HOME_URL, QUOTATIONS_URL, Duration::from_secs(10)).unwrap();
        let now = crate::calendar::TradingCalendar::default().now();
        let series = client.fetch_quotations(now).await.unwrap();
        println!("{} slots, ceiling {}", series.samples.len(), series.ceiling_price);
    }
}
