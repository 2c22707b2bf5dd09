//! Background task scheduling seam.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// The work a periodic task runs on every tick.
pub type TaskCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs callbacks on a timer, independently of the foreground UI.
#[async_trait]
pub trait BackgroundScheduler: Send + Sync {
    /// Registers `callback` to run every `interval`. Registering an id that
    /// already exists replaces it.
    async fn register_periodic(
        &self,
        task_id: &str,
        interval: Duration,
        callback: TaskCallback,
    ) -> Result<()>;

    /// Cancels a task. Unregistering an unknown id is a no-op.
    async fn unregister(&self, task_id: &str) -> Result<()>;

    /// Whether a task with this id is registered.
    async fn is_registered(&self, task_id: &str) -> bool;
}
