//! Key-value persistence seam.

use async_trait::async_trait;

use crate::error::Result;

/// A persistent string key-value store.
///
/// Only per-key atomicity of `get`/`set` is assumed. Implementations map
/// their failures to `AppError::Storage`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value; `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes a key. Deleting an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Reads several keys, in order.
    async fn multi_get(&self, keys: &[&str]) -> Result<Vec<Option<String>>>;

    /// Writes several keys.
    async fn multi_set(&self, entries: &[(&str, &str)]) -> Result<()>;
}
