//! Delivery of fired price alerts

use super::evaluator::PriceAlert;
use crate::models::{channels, NotificationEvent, NotificationPriority, NotificationType};
use crate::redis::RedisBus;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &PriceAlert) -> Result<()>;
}

/// Publishes alerts as [`NotificationEvent`]s for the host notification
/// facility to pick up.
pub struct RedisAlertNotifier {
    bus: RedisBus,
}

impl RedisAlertNotifier {
    pub fn new(bus: RedisBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl AlertNotifier for RedisAlertNotifier {
    async fn notify(&self, alert: &PriceAlert) -> Result<()> {
        let event = NotificationEvent {
            event_type: NotificationType::PriceAlert,
            priority: NotificationPriority::Warning,
            title: alert.title().to_string(),
            message: alert.format_message(),
            data: json!({
                "price": alert.price,
                "threshold": alert.threshold,
            }),
            ts: Some(alert.triggered_at),
        };
        self.bus.publish(channels::NOTIFICATION_EVENTS, &event).await?;
        info!(
            "Price alert published: {:.2} < {}",
            alert.price, alert.threshold
        );
        Ok(())
    }
}
