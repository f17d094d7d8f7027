//! Gold Quote Source Trait
//!
//! Defines a common interface for gold price providers. Each provider returns
//! its own response shape; adapters normalize it into a [`FetchOutcome`].

use crate::models::{DaySeries, PriceSample, SourceId};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

/// Adapter-level failure. None of these escape the acquisition engine; each
/// is logged and the next source in the chain is tried.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transport, DNS, HTTP status or deadline failure
    #[error("network error: {0}")]
    Network(String),
    /// The response parsed but does not match the provider's schema
    #[error("unexpected response shape: {0}")]
    Shape(String),
    /// Well-formed response without a usable price
    #[error("no usable price: {0}")]
    NoData(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdapterError::Shape(e.to_string())
        } else {
            AdapterError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        AdapterError::Shape(e.to_string())
    }
}

/// What a successful fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A single current quote
    Price(PriceSample),
    /// A full intraday curve
    Series(DaySeries),
    /// A quote and a curve; the curve wins when deriving the current price
    Both { sample: PriceSample, series: DaySeries },
}

impl FetchOutcome {
    pub fn sample(&self) -> Option<&PriceSample> {
        match self {
            FetchOutcome::Price(sample) | FetchOutcome::Both { sample, .. } => Some(sample),
            FetchOutcome::Series(_) => None,
        }
    }

    pub fn series(&self) -> Option<&DaySeries> {
        match self {
            FetchOutcome::Series(series) | FetchOutcome::Both { series, .. } => Some(series),
            FetchOutcome::Price(_) => None,
        }
    }
}

/// Common trait for gold price providers
///
/// `now` is exchange-local wall-clock time; adapters that pick patterns or
/// attribute session dates by time of day read it instead of the system
/// clock.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Display name for logs
    fn provider_name(&self) -> &str;

    fn source_id(&self) -> SourceId;

    async fn try_fetch(&self, now: NaiveDateTime) -> Result<FetchOutcome, AdapterError>;
}

/// Coerce a JSON number or numeric string into a price.
pub(crate) fn json_price(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
