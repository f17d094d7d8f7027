//! Synthetic last-resort quote source
//!
//! Always succeeds. Every sample is tagged [`SourceId::Mock`].

use super::quote_source::{AdapterError, FetchOutcome, QuoteSource};
use crate::models::{PriceSample, SourceId};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::Rng;

/// Default synthetic base price, CNY per gram
pub const DEFAULT_BASE_PRICE: f64 = 917.0;
pub const DEFAULT_NOISE: f64 = 5.0;

pub struct MockQuoteSource {
    base_price: f64,
    noise: f64,
}

impl MockQuoteSource {
    pub fn new(base_price: f64, noise: f64) -> Self {
        Self {
            base_price,
            noise: noise.abs(),
        }
    }

    /// Draw one synthetic sample, price within `base ± noise` at cent precision.
    pub fn sample(&self) -> PriceSample {
        let mut rng = rand::thread_rng();
        let offset = if self.noise > 0.0 {
            rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        let price = ((self.base_price + offset) * 100.0).round() / 100.0;

        PriceSample {
            high: price + rng.gen_range(0.0..2.0),
            low: price - rng.gen_range(0.0..2.0),
            ..PriceSample::flat(price, SourceId::Mock)
        }
    }
}

impl Default for MockQuoteSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PRICE, DEFAULT_NOISE)
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    fn provider_name(&self) -> &str {
        "Mock"
    }

    fn source_id(&self) -> SourceId {
        SourceId::Mock
    }

    async fn try_fetch(&self, _now: NaiveDateTime) -> Result<FetchOutcome, AdapterError> {
        Ok(FetchOutcome::Price(self.sample()))
    }
}
