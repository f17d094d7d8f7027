//! Threshold alert evaluation
//!
//! Fires once when the price drops below the configured threshold, then stays
//! quiet for that threshold until the price recovers to or above it. The
//! re-arm marker is the threshold value itself, so changing the threshold
//! re-arms immediately.

use crate::models::AlertConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the caller should do after evaluating a price against the config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertDecision {
    /// Notify, then persist `last_triggered_threshold = threshold`.
    Fire { threshold: f64 },
    /// Price recovered; persist `last_triggered_threshold = None`.
    Clear,
    NoAction,
}

/// Decide whether `price` crosses the configured threshold.
pub fn evaluate(price: f64, config: &AlertConfig) -> AlertDecision {
    if !config.enabled {
        return AlertDecision::NoAction;
    }
    let Some(threshold) = config.threshold_price else {
        return AlertDecision::NoAction;
    };

    let already_fired = config.last_triggered_threshold == Some(threshold);

    if price < threshold && !already_fired {
        AlertDecision::Fire { threshold }
    } else if price >= threshold && already_fired {
        AlertDecision::Clear
    } else {
        AlertDecision::NoAction
    }
}

impl AlertConfig {
    /// Config as it should be persisted after acting on `decision`.
    pub fn after(&self, decision: AlertDecision) -> AlertConfig {
        let mut next = self.clone();
        match decision {
            AlertDecision::Fire { threshold } => next.last_triggered_threshold = Some(threshold),
            AlertDecision::Clear => next.last_triggered_threshold = None,
            AlertDecision::NoAction => {}
        }
        next
    }
}

/// A fired price alert, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub price: f64,
    pub threshold: f64,
    pub triggered_at: DateTime<Utc>,
}

impl PriceAlert {
    pub fn new(price: f64, threshold: f64) -> Self {
        Self {
            price,
            threshold,
            triggered_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &'static str {
        "🔔 Gold price alert"
    }

    pub fn format_message(&self) -> String {
        format!(
            "Current gold price: {:.2} CNY/g\nBelow your alert price of {} CNY/g",
            self.price, self.threshold
        )
    }
}
