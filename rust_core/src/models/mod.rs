// Shared models for Goldwatch services
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Notification Events (cross-service alerting)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationPriority {
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PriceAlert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub event_type: NotificationType,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
}

// ============================================================================
// Price Sources
// ============================================================================

/// Where a price sample came from.
///
/// `Mock` marks synthetic quotes; anything downstream that audits prices must
/// be able to tell them apart from real ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    /// Exchange homepage fixing + live intraday chart
    #[serde(rename = "SGE_INTRADAY")]
    SgeIntraday,
    /// Exchange quotation chart outside trading hours
    #[serde(rename = "SGE")]
    SgeQuotations,
    /// Bank precious-metal price list
    #[serde(rename = "ICBC_API")]
    IcbcBank,
    /// Quote captured by the page-interception collaborator
    #[serde(rename = "PAGE_CAPTURE")]
    PageCapture,
    /// Price pushed from an already-rendered display
    #[serde(rename = "DISPLAY")]
    Display,
    /// Synthetic last-resort quote
    #[serde(rename = "MOCK")]
    Mock,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::SgeIntraday => "SGE_INTRADAY",
            SourceId::SgeQuotations => "SGE",
            SourceId::IcbcBank => "ICBC_API",
            SourceId::PageCapture => "PAGE_CAPTURE",
            SourceId::Display => "DISPLAY",
            SourceId::Mock => "MOCK",
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, SourceId::Mock)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Price Samples & Day Series
// ============================================================================

/// One accepted price observation, in CNY per gram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub high: f64,
    pub low: f64,
    pub source: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
}

impl PriceSample {
    /// A sample whose high and low collapse onto the price itself.
    pub fn flat(price: f64, source: SourceId) -> Self {
        Self {
            timestamp: Utc::now(),
            price,
            high: price,
            low: price,
            source,
            label: None,
            change_percent: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A single slot of an intraday chart: session-local "HH:MM" label and price.
///
/// A price of zero or below is a placeholder for a slot that has not traded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time: String,
    pub price: f64,
}

impl SeriesPoint {
    pub fn new(time: impl Into<String>, price: f64) -> Self {
        Self {
            time: time.into(),
            price,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.price.is_nan() || self.price <= 0.0
    }
}

/// One trading day's intraday curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySeries {
    pub session_date: NaiveDate,
    pub samples: Vec<SeriesPoint>,
    pub ceiling_price: f64,
    pub instrument_label: String,
    pub fetched_at: DateTime<Utc>,
}

impl DaySeries {
    /// Lowest non-placeholder price, if any slot has traded.
    pub fn floor_price(&self) -> Option<f64> {
        self.samples
            .iter()
            .filter(|p| !p.is_placeholder())
            .map(|p| p.price)
            .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.min(p))))
    }
}

// ============================================================================
// Alert Configuration
// ============================================================================

/// Threshold alert settings as held by persisted storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfig {
    pub enabled: bool,
    pub threshold_price: Option<f64>,
    pub last_triggered_threshold: Option<f64>,
}

// ============================================================================
// Redis Channels & Storage Keys
// ============================================================================

pub mod channels {
    pub const NOTIFICATION_EVENTS: &str = "notification:events";
}

/// Persisted state keys. Stores may prefix these with a namespace.
pub mod keys {
    pub const CURRENT_PRICE: &str = "currentPrice";
    pub const PRICE_HISTORY: &str = "priceHistory";
    pub const DAY_SERIES: &str = "daySeries";
    pub const ALERT_ENABLED: &str = "alertEnabled";
    pub const ALERT_PRICE: &str = "alertPrice";
    pub const LAST_ALERT_TRIGGERED: &str = "lastAlertTriggered";
}
