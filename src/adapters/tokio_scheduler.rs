//! Periodic background tasks on the Tokio runtime.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::Result;
use crate::traits::{BackgroundScheduler, TaskCallback};

/// One spawned Tokio task per registered id.
///
/// The first tick lands one interval after registration; a slow callback
/// delays the next tick instead of bursting to catch up.
#[derive(Default)]
pub struct TokioScheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioScheduler {
    /// Creates a new `TokioScheduler`.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackgroundScheduler for TokioScheduler {
    async fn register_periodic(
        &self,
        task_id: &str,
        interval: Duration,
        callback: TaskCallback,
    ) -> Result<()> {
        let id = task_id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracing::debug!("⏰ Background task {} fired", id);
                callback().await;
            }
        });

        if let Some(previous) = self.tasks.lock().insert(task_id.to_string(), handle) {
            previous.abort();
        }

        tracing::info!("✅ Background task {} registered every {:?}", task_id, interval);
        Ok(())
    }

    async fn unregister(&self, task_id: &str) -> Result<()> {
        if let Some(handle) = self.tasks.lock().remove(task_id) {
            handle.abort();
            tracing::info!("🛑 Background task {} unregistered", task_id);
        }
        Ok(())
    }

    async fn is_registered(&self, task_id: &str) -> bool {
        self.tasks
            .lock()
            .get(task_id)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.lock().drain() {
            handle.abort();
        }
    }
}
