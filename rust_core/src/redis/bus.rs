use anyhow::{Context, Result};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::Serialize;

/// Thin pub/sub wrapper shared by the store, the notifier and the request
/// transport.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    connection: ConnectionManager,
}

impl RedisBus {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Invalid REDIS_URL")?;

        // ConnectionManager reconnects on its own and is cheap to clone, so
        // publishers and the store share it.
        let connection = ConnectionManager::new(client.clone())
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { client, connection })
    }

    pub async fn publish<T: Serialize>(&self, channel: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        self.publish_str(channel, &payload).await
    }

    pub async fn publish_str(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.publish::<_, _, ()>(channel, message)
            .await
            .context("Failed to publish message")?;
        Ok(())
    }

    pub async fn subscribe(&self, channel: &str) -> Result<redis::aio::PubSub> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(channel).await?;
        Ok(pubsub)
    }

    /// Shared multiplexed connection for key/value commands.
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}
