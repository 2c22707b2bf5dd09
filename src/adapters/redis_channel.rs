//! Redis-backed share channel.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::{AppError, Result};
use crate::traits::ChannelTransport;

/// Keeps each channel's latest envelope under `{prefix}:channel:{code}`.
///
/// Every publish refreshes the TTL, so a publisher that vanishes without
/// ending its channel frees the code once the TTL lapses.
#[derive(Clone)]
pub struct RedisChannel {
    redis: ConnectionManager,
    prefix: String,
    ttl_secs: u64,
}

impl RedisChannel {
    /// Creates a new `RedisChannel`.
    ///
    /// # Arguments
    ///
    /// * `redis` - The Redis connection manager.
    /// * `prefix` - Key namespace.
    /// * `ttl_secs` - Expiry applied on every publish.
    pub fn new(redis: ConnectionManager, prefix: &str, ttl_secs: u64) -> Self {
        Self {
            redis,
            prefix: prefix.to_string(),
            ttl_secs,
        }
    }

    fn key(&self, channel_id: &str) -> String {
        format!("{}:channel:{}", self.prefix, channel_id)
    }
}

#[async_trait]
impl ChannelTransport for RedisChannel {
    async fn publish(&self, channel_id: &str, envelope_json: &str) -> Result<()> {
        let _: () = self
            .redis
            .clone()
            .set_ex(self.key(channel_id), envelope_json, self.ttl_secs)
            .await
            .map_err(|e| AppError::Publish(format!("Redis publish failed: {}", e)))?;
        Ok(())
    }

    async fn check_availability(&self, channel_id: &str) -> Result<bool> {
        let exists: bool = self
            .redis
            .clone()
            .exists(self.key(channel_id))
            .await
            .map_err(|e| AppError::Publish(format!("Redis availability check failed: {}", e)))?;
        Ok(!exists)
    }

    async fn end_channel(&self, channel_id: &str) -> Result<()> {
        let _: () = self
            .redis
            .clone()
            .del(self.key(channel_id))
            .await
            .map_err(|e| AppError::Publish(format!("Redis end channel failed: {}", e)))?;
        Ok(())
    }

    async fn fetch_latest(&self, channel_id: &str) -> Result<Option<String>> {
        let latest: Option<String> = self
            .redis
            .clone()
            .get(self.key(channel_id))
            .await
            .map_err(|e| AppError::Publish(format!("Redis fetch failed: {}", e)))?;
        Ok(latest)
    }
}
