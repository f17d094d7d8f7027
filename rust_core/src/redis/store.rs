//! Redis-backed key/value store

use super::bus::RedisBus;
use crate::store::KeyValueStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;

/// Stores each persisted key as a plain redis string under `prefix`.
pub struct RedisStore {
    bus: RedisBus,
    prefix: String,
}

impl RedisStore {
    pub fn new(bus: RedisBus, prefix: impl Into<String>) -> Self {
        Self {
            bus,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.bus.connection();
        conn.get(self.key(key))
            .await
            .with_context(|| format!("Failed to read {}", key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.bus.connection();
        conn.set::<_, _, ()>(self.key(key), value)
            .await
            .with_context(|| format!("Failed to write {}", key))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.bus.connection();
        conn.del::<_, ()>(self.key(key))
            .await
            .with_context(|| format!("Failed to delete {}", key))
    }
}
