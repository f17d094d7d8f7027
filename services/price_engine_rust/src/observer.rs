//! Price-change fan-out
//!
//! Badge and display listeners subscribe here instead of being called from
//! the fetch path. Lagging receivers skip missed updates.

use chrono::{DateTime, Utc};
use goldwatch_core::SourceId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// What changed, as seen by display listeners.
///
/// Sent on every accepted sample. `current_price` is unset when only history
/// moved and no price has been shown yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub current_price: Option<f64>,
    pub badge_text: Option<String>,
    /// Source of the sample that triggered the update.
    pub source: SourceId,
    pub at: DateTime<Utc>,
}

impl PriceUpdate {
    pub fn new(current_price: Option<f64>, source: SourceId) -> Self {
        Self {
            current_price,
            badge_text: current_price.map(badge_text),
            source,
            at: Utc::now(),
        }
    }
}

/// Badge text is the price rounded to a whole yuan.
pub fn badge_text(price: f64) -> String {
    format!("{}", price.round() as i64)
}

#[derive(Clone)]
pub struct ObserverBus {
    tx: broadcast::Sender<PriceUpdate>,
}

impl ObserverBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PriceUpdate> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. No subscribers is not an error.
    pub fn publish(&self, update: PriceUpdate) {
        match self.tx.send(update) {
            Ok(n) => debug!("Price update delivered to {} observers", n),
            Err(_) => debug!("Price update dropped, no observers"),
        }
    }
}

impl Default for ObserverBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_text_rounds() {
        assert_eq!(badge_text(917.49), "917");
        assert_eq!(badge_text(917.5), "918");
    }

    #[tokio::test]
    async fn test_subscribers_receive_updates() {
        let bus = ObserverBus::new();
        let mut rx = bus.subscribe();
        bus.publish(PriceUpdate::new(Some(921.3), SourceId::SgeIntraday));

        let update = rx.recv().await.unwrap();
        assert_eq!(update.badge_text.as_deref(), Some("921"));
        assert_eq!(update.source, SourceId::SgeIntraday);
    }

    #[test]
    fn test_history_only_update_has_no_badge() {
        let update = PriceUpdate::new(None, SourceId::IcbcBank);
        assert!(update.badge_text.is_none());
        // No subscribers is fine.
        ObserverBus::new().publish(update);
    }
}
