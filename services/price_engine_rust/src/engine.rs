//! Acquisition engine
//!
//! One cycle walks the source chain in priority order and stops at the first
//! usable result:
//!
//! 1. SGE intraday (trading hours only)
//! 2. SGE quotations
//! 3. ICBC price list (never overwrites the live price while trading)
//! 4. Synthetic quote
//!
//! Fetches run outside the state lock; applying, persisting and alert
//! evaluation run under it, so writes from cycles and inbound messages never
//! interleave. Overlapping scheduler ticks are skipped by an in-flight flag.

use crate::config::EngineConfig;
use crate::error::InvalidInput;
use crate::observer::{ObserverBus, PriceUpdate};
use crate::state::AcquisitionState;
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use goldwatch_core::alerts::{evaluate, AlertDecision, AlertNotifier, PriceAlert};
use goldwatch_core::calendar::session_label;
use goldwatch_core::clients::{
    AdapterError, FetchOutcome, IcbcQuoteAdapter, MockQuoteSource, QuoteSource, SgeClient,
    SgeIntradayAdapter, SgeQuotationsAdapter,
};
use goldwatch_core::series::last_positive;
use goldwatch_core::store::PriceStore;
use goldwatch_core::{AlertConfig, DaySeries, PriceSample, SourceId, TradingCalendar};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// The four sources in fallback order.
#[derive(Clone)]
pub struct SourceChain {
    pub intraday: Arc<dyn QuoteSource>,
    pub historical: Arc<dyn QuoteSource>,
    pub bank: Arc<dyn QuoteSource>,
    pub fallback: Arc<dyn QuoteSource>,
}

impl SourceChain {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let sge = Arc::new(SgeClient::new(
            config.sge_home_url.clone(),
            config.sge_quotations_url.clone(),
            config.fetch_timeout,
        )?);

        Ok(Self {
            intraday: Arc::new(SgeIntradayAdapter::new(sge.clone())),
            historical: Arc::new(SgeQuotationsAdapter::new(sge)),
            bank: Arc::new(IcbcQuoteAdapter::new(
                config.icbc_quote_url.clone(),
                config.fetch_timeout,
            )?),
            fallback: Arc::new(MockQuoteSource::new(
                config.mock_base_price,
                config.mock_noise,
            )),
        })
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A real source set the current price.
    Updated { source: SourceId, price: f64 },
    /// A real source answered but the current price was left alone.
    Unchanged { source: SourceId },
    /// Every real source failed; a synthetic price is in use.
    Degraded { price: f64 },
    /// Even the synthetic source failed.
    Failed,
    /// A previous cycle was still in flight.
    Skipped,
}

/// Reply to `getData`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSnapshot {
    pub current_price: Option<f64>,
    pub history: Vec<PriceSample>,
    pub day_series: Option<DaySeries>,
    pub is_trading_time: bool,
    pub session_date: NaiveDate,
    /// "M/D" form shown next to the chart.
    pub session_label: String,
}

/// Quote pushed by the page-capture collaborator.
#[derive(Debug, Clone, Default)]
pub struct CapturedQuote {
    pub buy_price: f64,
    pub sell_price: Option<f64>,
    pub source: Option<String>,
    pub name: Option<String>,
    pub change_percent: Option<f64>,
}

/// A price ready to be written into state.
struct Accepted {
    /// `None` leaves the current price untouched.
    price: Option<f64>,
    sample: PriceSample,
    series: Option<DaySeries>,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AcquisitionEngine {
    sources: SourceChain,
    calendar: TradingCalendar,
    store: PriceStore,
    notifier: Arc<dyn AlertNotifier>,
    observers: ObserverBus,
    state: Mutex<AcquisitionState>,
    in_flight: AtomicBool,
    fetch_timeout: Duration,
}

impl AcquisitionEngine {
    pub fn new(
        sources: SourceChain,
        calendar: TradingCalendar,
        store: PriceStore,
        notifier: Arc<dyn AlertNotifier>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            sources,
            calendar,
            store,
            notifier,
            observers: ObserverBus::new(),
            state: Mutex::new(AcquisitionState::new()),
            in_flight: AtomicBool::new(false),
            fetch_timeout,
        }
    }

    pub fn observers(&self) -> &ObserverBus {
        &self.observers
    }

    /// Load persisted price state. Skipped when no current price was stored.
    pub async fn restore(&self) -> Result<()> {
        let persisted = self.store.load_price().await?;
        let Some(price) = persisted.current_price else {
            info!("No persisted price, starting empty");
            return Ok(());
        };

        let mut state = self.state.lock().await;
        *state = AcquisitionState::restore(persisted);
        let source = state.last_sample().map_or(SourceId::Display, |s| s.source);
        info!(
            "Restored price {} with {} history entries",
            price,
            state.history_len()
        );
        self.publish(&mut state, source);
        Ok(())
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        self.run_cycle_at(self.calendar.now()).await
    }

    /// One pass through the source chain at exchange-local time `now`.
    pub async fn run_cycle_at(&self, now: NaiveDateTime) -> CycleOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Previous cycle still in flight, skipping");
            return CycleOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        let trading = self.calendar.is_trading_now(now);
        debug!("Cycle at {} (trading: {})", now, trading);

        if trading {
            if let Some(accepted) = self
                .attempt(&self.sources.intraday, now)
                .await
                .and_then(|o| derive_quotation(o, SourceId::SgeIntraday, true))
            {
                return self.commit(accepted).await;
            }
        }

        if let Some(accepted) = self
            .attempt(&self.sources.historical, now)
            .await
            .and_then(|o| derive_quotation(o, SourceId::SgeQuotations, trading))
        {
            return self.commit(accepted).await;
        }

        if let Some(sample) = self
            .attempt(&self.sources.bank, now)
            .await
            .and_then(|o| o.sample().cloned())
        {
            // The display is authoritative during live trading.
            let price = if trading { None } else { Some(sample.price) };
            if trading {
                info!("Bank quote {} recorded to history only (market open)", sample.price);
            }
            return self
                .commit(Accepted {
                    price,
                    sample,
                    series: None,
                })
                .await;
        }

        match self
            .attempt(&self.sources.fallback, now)
            .await
            .and_then(|o| o.sample().cloned())
        {
            Some(sample) => {
                warn!(
                    "All price sources failed, using synthetic price {} ({})",
                    sample.price, sample.source
                );
                self.commit(Accepted {
                    price: Some(sample.price),
                    sample,
                    series: None,
                })
                .await
            }
            None => {
                error!("No price source produced a result this cycle");
                CycleOutcome::Failed
            }
        }
    }

    /// Bounded fetch. Any failure is logged and becomes "no result".
    async fn attempt(&self, source: &Arc<dyn QuoteSource>, now: NaiveDateTime) -> Option<FetchOutcome> {
        let result = match timeout(self.fetch_timeout, source.try_fetch(now)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Network(format!(
                "timed out after {:?}",
                self.fetch_timeout
            ))),
        };

        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("{} failed: {}", source.provider_name(), e);
                None
            }
        }
    }

    async fn commit(&self, accepted: Accepted) -> CycleOutcome {
        let mut state = self.state.lock().await;
        let source = accepted.sample.source;
        let price = accepted.price;
        self.apply(&mut state, accepted).await;

        match price {
            Some(price) if source.is_synthetic() => CycleOutcome::Degraded { price },
            Some(price) => CycleOutcome::Updated { source, price },
            None => CycleOutcome::Unchanged { source },
        }
    }

    /// Write an accepted sample into state, persist, alert when the current
    /// price moved, then notify observers.
    async fn apply(&self, state: &mut AcquisitionState, accepted: Accepted) {
        let source = accepted.sample.source;
        state.push_history(accepted.sample);
        if let Some(series) = accepted.series {
            state.day_series = Some(series);
        }
        if let Some(price) = accepted.price {
            state.current_price = Some(price);
        }

        self.persist(state).await;

        if let Some(price) = accepted.price {
            info!("Current price {} ({})", price, source);
            self.check_alert(price).await;
        }
        self.publish(state, source);
    }

    async fn persist(&self, state: &AcquisitionState) {
        if let Err(e) = self
            .store
            .save_price(state.current_price, &state.history(), state.day_series.as_ref())
            .await
        {
            error!("Failed to persist price state: {:#}", e);
        }
    }

    fn publish(&self, state: &mut AcquisitionState, source: SourceId) {
        self.observers.publish(PriceUpdate::new(state.current_price, source));
        state.last_notified_observers_at = Some(Utc::now());
    }

    /// Evaluate the stored alert config against `price` and act on it.
    async fn check_alert(&self, price: f64) {
        let config = match self.store.load_alert_config().await {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load alert config: {:#}", e);
                return;
            }
        };

        match evaluate(price, &config) {
            AlertDecision::Fire { threshold } => {
                let alert = PriceAlert::new(price, threshold);
                if let Err(e) = self.notifier.notify(&alert).await {
                    error!("Failed to deliver price alert: {:#}", e);
                }
                if let Err(e) = self.store.set_last_triggered(Some(threshold)).await {
                    error!("Failed to persist alert marker: {:#}", e);
                }
            }
            AlertDecision::Clear => {
                debug!("Price {} back above alert threshold, re-arming", price);
                if let Err(e) = self.store.set_last_triggered(None).await {
                    error!("Failed to clear alert marker: {:#}", e);
                }
            }
            AlertDecision::NoAction => {}
        }
    }

    // ------------------------------------------------------------------
    // Inbound messages
    // ------------------------------------------------------------------

    pub async fn snapshot(&self) -> DataSnapshot {
        let now = self.calendar.now();
        let session_date = self.calendar.session_date_for(now);
        let state = self.state.lock().await;
        DataSnapshot {
            current_price: state.current_price,
            history: state.history(),
            day_series: state.day_series.clone(),
            is_trading_time: self.calendar.is_trading_now(now),
            session_date,
            session_label: session_label(session_date),
        }
    }

    /// Display override: sets the current price without fetching or
    /// touching history.
    pub async fn update_current_price(&self, price: f64) -> Result<f64, InvalidInput> {
        if !is_valid_price(price) {
            debug!("Ignoring display price {}", price);
            return Err(InvalidInput::price(price));
        }

        let mut state = self.state.lock().await;
        state.current_price = Some(price);
        self.persist(&state).await;
        self.check_alert(price).await;
        self.publish(&mut state, SourceId::Display);
        info!("Display price set to {}", price);
        Ok(price)
    }

    /// Quote captured from a page the user has open.
    pub async fn update_price(&self, quote: CapturedQuote) -> Result<PriceSample, InvalidInput> {
        if !is_valid_price(quote.buy_price) {
            warn!("Rejecting captured price {}", quote.buy_price);
            return Err(InvalidInput::price(quote.buy_price));
        }

        let price = quote.buy_price;
        let label = quote.name.or(quote.source);
        let sample = PriceSample {
            high: quote.sell_price.filter(|p| is_valid_price(*p)).unwrap_or(price),
            low: price,
            label,
            change_percent: quote.change_percent,
            ..PriceSample::flat(price, SourceId::PageCapture)
        };

        let mut state = self.state.lock().await;
        self.apply(
            &mut state,
            Accepted {
                price: Some(price),
                sample: sample.clone(),
                series: None,
            },
        )
        .await;
        Ok(sample)
    }

    /// Change alert settings, then check the current price against them.
    pub async fn set_alert(
        &self,
        enabled: Option<bool>,
        threshold: Option<f64>,
    ) -> Result<AlertConfig, InvalidInput> {
        if let Some(t) = threshold {
            if !is_valid_price(t) {
                return Err(InvalidInput::AlertPrice(t.to_string()));
            }
        }

        let state = self.state.lock().await;
        if let Some(enabled) = enabled {
            if let Err(e) = self.store.set_alert_enabled(enabled).await {
                error!("Failed to persist alert toggle: {:#}", e);
            }
        }
        if let Some(t) = threshold {
            if let Err(e) = self.store.set_alert_price(t).await {
                error!("Failed to persist alert price: {:#}", e);
            }
        }

        if let Some(price) = state.current_price {
            self.check_alert(price).await;
        }

        match self.store.load_alert_config().await {
            Ok(config) => {
                info!(
                    "Alert {} at {:?}",
                    if config.enabled { "enabled" } else { "disabled" },
                    config.threshold_price
                );
                Ok(config)
            }
            Err(e) => {
                error!("Failed to reload alert config: {:#}", e);
                Ok(AlertConfig {
                    enabled: enabled.unwrap_or(false),
                    threshold_price: threshold,
                    last_triggered_threshold: None,
                })
            }
        }
    }
}

fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Turn an exchange outcome into an accepted price.
///
/// While `live`, the series is sanitized and its last point is the price; an
/// empty day window yields no price from the curve. On a closed market the
/// last traded slot of the raw series is authoritative. The curve takes
/// priority over the fixing price; the fixing only stands in when the curve
/// yields nothing.
fn derive_quotation(outcome: FetchOutcome, source: SourceId, live: bool) -> Option<Accepted> {
    let (fixing, series) = match outcome {
        FetchOutcome::Price(sample) => (Some(sample), None),
        FetchOutcome::Series(series) => (None, Some(series)),
        FetchOutcome::Both { sample, series } => (Some(sample), Some(series)),
    };

    let Some(raw) = series else {
        let sample = fixing?;
        return Some(Accepted {
            price: Some(sample.price),
            sample,
            series: None,
        });
    };

    // While live only the day window counts; night slots never price.
    let (series, point) = if live {
        let sanitized = raw.sanitized();
        let point = sanitized.samples.last().cloned();
        (sanitized, point)
    } else {
        let point = last_positive(&raw.samples).cloned();
        (raw, point)
    };

    let Some(point) = point else {
        return match fixing {
            Some(sample) => {
                debug!("{} curve has no traded slot, using fixing {}", source, sample.price);
                Some(Accepted {
                    price: Some(sample.price),
                    sample,
                    series: None,
                })
            }
            None => {
                warn!("{} returned a series without a traded slot", source);
                None
            }
        };
    };
    debug!("{} price {} at {}", source, point.price, point.time);
    let price = point.price;

    let sample = PriceSample {
        high: if series.ceiling_price > 0.0 {
            series.ceiling_price.max(price)
        } else {
            price
        },
        low: series.floor_price().map_or(price, |floor| floor.min(price)),
        ..PriceSample::flat(price, source).with_label(series.instrument_label.clone())
    };

    Some(Accepted {
        price: Some(price),
        sample,
        series: Some(series),
    })
}
