//! Persisted key/value state
//!
//! The storage backend is an external collaborator; the engine only needs
//! string get/set/remove. [`PriceStore`] layers the typed keys on top.

use crate::models::{keys, AlertConfig, DaySeries, PriceSample};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, used by tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Price state as last written to storage.
#[derive(Debug, Clone, Default)]
pub struct PersistedPrice {
    pub current_price: Option<f64>,
    pub history: Vec<PriceSample>,
    pub day_series: Option<DaySeries>,
}

/// Typed access to the persisted keys.
#[derive(Clone)]
pub struct PriceStore {
    inner: Arc<dyn KeyValueStore>,
}

impl PriceStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get(key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt value under {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.inner.set(key, raw).await
    }

    async fn write_opt<T: Serialize>(&self, key: &str, value: Option<&T>) -> Result<()> {
        match value {
            Some(v) => self.write(key, v).await,
            None => self.inner.remove(key).await,
        }
    }

    /// Load persisted price state. A corrupt history or series is dropped
    /// with a warning rather than failing the whole restore.
    pub async fn load_price(&self) -> Result<PersistedPrice> {
        let current_price = self.read::<f64>(keys::CURRENT_PRICE).await?;

        let history = self
            .read::<Vec<PriceSample>>(keys::PRICE_HISTORY)
            .await
            .unwrap_or_else(|e| {
                warn!("Discarding persisted history: {:#}", e);
                None
            })
            .unwrap_or_default();

        let day_series = self
            .read::<DaySeries>(keys::DAY_SERIES)
            .await
            .unwrap_or_else(|e| {
                warn!("Discarding persisted day series: {:#}", e);
                None
            });

        Ok(PersistedPrice {
            current_price,
            history,
            day_series,
        })
    }

    pub async fn save_price(
        &self,
        current_price: Option<f64>,
        history: &[PriceSample],
        day_series: Option<&DaySeries>,
    ) -> Result<()> {
        self.write_opt(keys::CURRENT_PRICE, current_price.as_ref()).await?;
        self.write(keys::PRICE_HISTORY, &history).await?;
        self.write_opt(keys::DAY_SERIES, day_series).await?;
        Ok(())
    }

    pub async fn load_alert_config(&self) -> Result<AlertConfig> {
        Ok(AlertConfig {
            enabled: self.read::<bool>(keys::ALERT_ENABLED).await?.unwrap_or(false),
            threshold_price: self.read::<f64>(keys::ALERT_PRICE).await?,
            last_triggered_threshold: self.read::<f64>(keys::LAST_ALERT_TRIGGERED).await?,
        })
    }

    pub async fn set_last_triggered(&self, threshold: Option<f64>) -> Result<()> {
        self.write_opt(keys::LAST_ALERT_TRIGGERED, threshold.as_ref()).await
    }

    pub async fn set_alert_enabled(&self, enabled: bool) -> Result<()> {
        self.write(keys::ALERT_ENABLED, &enabled).await
    }

    pub async fn set_alert_price(&self, price: f64) -> Result<()> {
        self.write(keys::ALERT_PRICE, &price).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;

    fn store() -> (Arc<MemoryStore>, PriceStore) {
        let mem = Arc::new(MemoryStore::new());
        (mem.clone(), PriceStore::new(mem))
    }

    #[tokio::test]
    async fn test_empty_store_loads_defaults() {
        let (_, store) = store();
        let price = store.load_price().await.unwrap();
        assert!(price.current_price.is_none());
        assert!(price.history.is_empty());
        assert!(price.day_series.is_none());
        assert_eq!(store.load_alert_config().await.unwrap(), AlertConfig::default());
    }

    #[tokio::test]
    async fn test_price_state_persists_under_spec_keys() {
        let (mem, store) = store();
        let history = vec![PriceSample::flat(917.5, SourceId::IcbcBank)];
        store.save_price(Some(917.5), &history, None).await.unwrap();

        let raw = mem.snapshot();
        assert_eq!(raw.get("currentPrice").map(String::as_str), Some("917.5"));
        assert!(raw.get("priceHistory").unwrap().contains("ICBC_API"));
        assert!(!raw.contains_key("daySeries"));

        let loaded = store.load_price().await.unwrap();
        assert_eq!(loaded.current_price, Some(917.5));
        assert_eq!(loaded.history, history);
    }

    #[tokio::test]
    async fn test_corrupt_history_is_dropped() {
        let (mem, store) = store();
        mem.set(keys::CURRENT_PRICE, "910.0".into()).await.unwrap();
        mem.set(keys::PRICE_HISTORY, "not json".into()).await.unwrap();

        let loaded = store.load_price().await.unwrap();
        assert_eq!(loaded.current_price, Some(910.0));
        assert!(loaded.history.is_empty());
    }

    #[tokio::test]
    async fn test_last_triggered_round_trip() {
        let (mem, store) = store();
        store.set_alert_enabled(true).await.unwrap();
        store.set_alert_price(900.0).await.unwrap();
        store.set_last_triggered(Some(900.0)).await.unwrap();

        let config = store.load_alert_config().await.unwrap();
        assert!(config.enabled);
        assert_eq!(config.last_triggered_threshold, config.threshold_price);

        store.set_last_triggered(None).await.unwrap();
        assert!(!mem.snapshot().contains_key(keys::LAST_ALERT_TRIGGERED));
    }
}
