//! Process-local store and channel.
//!
//! Used by the daemon when no Redis URL is configured, and as fakes in tests
//! (both carry failure switches and a publish log).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::traits::{ChannelTransport, KeyValueStore};

/// A `KeyValueStore` backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a storage error.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Write a key without going through the trait.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Storage("In-memory store failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.insert_raw(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn multi_get(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        self.check()?;
        let entries = self.entries.lock();
        Ok(keys.iter().map(|k| entries.get(*k).cloned()).collect())
    }

    async fn multi_set(&self, pairs: &[(&str, &str)]) -> Result<()> {
        self.check()?;
        let mut entries = self.entries.lock();
        for (key, value) in pairs {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// A `ChannelTransport` that keeps the latest envelope per channel in memory.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    channels: Mutex<HashMap<String, String>>,
    published: Mutex<Vec<(String, String)>>,
    ended: Mutex<Vec<String>>,
    fail_publish: AtomicBool,
    fail_end: AtomicBool,
    publish_delay: Mutex<Option<Duration>>,
}

impl InMemoryChannel {
    /// Create a channel set with nothing published.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a code as held by someone else.
    pub fn claim(&self, channel_id: &str, envelope_json: &str) {
        self.channels
            .lock()
            .insert(channel_id.to_string(), envelope_json.to_string());
    }

    /// Every successful publish, oldest first.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    /// Number of successful publishes to one channel.
    pub fn publish_count(&self, channel_id: &str) -> usize {
        self.published
            .lock()
            .iter()
            .filter(|(id, _)| id == channel_id)
            .count()
    }

    /// Channels that were ended, in order.
    pub fn ended(&self) -> Vec<String> {
        self.ended.lock().clone()
    }

    /// Make publishes fail.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Make `end_channel` fail.
    pub fn set_fail_end(&self, fail: bool) {
        self.fail_end.store(fail, Ordering::SeqCst);
    }

    /// Make every publish take this long before completing.
    pub fn set_publish_delay(&self, delay: Option<Duration>) {
        *self.publish_delay.lock() = delay;
    }
}

#[async_trait]
impl ChannelTransport for InMemoryChannel {
    async fn publish(&self, channel_id: &str, envelope_json: &str) -> Result<()> {
        let delay = *self.publish_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(AppError::Publish("In-memory publish failure".to_string()));
        }

        self.channels
            .lock()
            .insert(channel_id.to_string(), envelope_json.to_string());
        self.published
            .lock()
            .push((channel_id.to_string(), envelope_json.to_string()));
        Ok(())
    }

    async fn check_availability(&self, channel_id: &str) -> Result<bool> {
        Ok(!self.channels.lock().contains_key(channel_id))
    }

    async fn end_channel(&self, channel_id: &str) -> Result<()> {
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(AppError::Publish("In-memory end failure".to_string()));
        }

        self.channels.lock().remove(channel_id);
        self.ended.lock().push(channel_id.to_string());
        Ok(())
    }

    async fn fetch_latest(&self, channel_id: &str) -> Result<Option<String>> {
        Ok(self.channels.lock().get(channel_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_round_trips_and_removes() {
        let store = InMemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn multi_ops_preserve_order() {
        let store = InMemoryStore::new();
        store.multi_set(&[("a", "1"), ("b", "2")]).await.unwrap();
        let values = store.multi_get(&["b", "missing", "a"]).await.unwrap();
        assert_eq!(values, vec![Some("2".into()), None, Some("1".into())]);
    }

    #[tokio::test]
    async fn failing_store_reports_storage_error() {
        let store = InMemoryStore::new();
        store.set_fail(true);
        assert!(matches!(store.get("k").await, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn channel_availability_follows_publish_and_end() {
        let channel = InMemoryChannel::new();
        assert!(channel.check_availability("my-code").await.unwrap());
        channel.publish("my-code", "{}").await.unwrap();
        assert!(!channel.check_availability("my-code").await.unwrap());
        assert_eq!(channel.fetch_latest("my-code").await.unwrap().as_deref(), Some("{}"));
        channel.end_channel("my-code").await.unwrap();
        assert!(channel.check_availability("my-code").await.unwrap());
        assert_eq!(channel.ended(), vec!["my-code".to_string()]);
    }
}
