//! Background scheduler double that fires only on demand.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;
use crate::traits::{BackgroundScheduler, TaskCallback};

/// Records registrations; tests fire callbacks with [`MockScheduler::fire`].
#[derive(Default)]
pub struct MockScheduler {
    tasks: Mutex<HashMap<String, (Duration, TaskCallback)>>,
    registrations: Mutex<usize>,
    unregistrations: Mutex<usize>,
    register_delay: Mutex<Option<Duration>>,
}

impl MockScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a registered task's callback once, as the OS would.
    ///
    /// # Returns
    /// `false` if no such task is registered.
    pub async fn fire(&self, task_id: &str) -> bool {
        let callback = self.tasks.lock().get(task_id).map(|(_, cb)| cb.clone());
        match callback {
            Some(callback) => {
                callback().await;
                true
            }
            None => false,
        }
    }

    /// The interval a task was registered with.
    pub fn interval_of(&self, task_id: &str) -> Option<Duration> {
        self.tasks.lock().get(task_id).map(|(interval, _)| *interval)
    }

    /// Hold every `register_periodic` call for `delay` before it lands.
    pub fn set_register_delay(&self, delay: Option<Duration>) {
        *self.register_delay.lock() = delay;
    }

    /// Total `register_periodic` calls.
    pub fn registrations(&self) -> usize {
        *self.registrations.lock()
    }

    /// Total `unregister` calls.
    pub fn unregistrations(&self) -> usize {
        *self.unregistrations.lock()
    }
}

#[async_trait]
impl BackgroundScheduler for MockScheduler {
    async fn register_periodic(
        &self,
        task_id: &str,
        interval: Duration,
        callback: TaskCallback,
    ) -> Result<()> {
        let delay = *self.register_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.tasks
            .lock()
            .insert(task_id.to_string(), (interval, callback));
        *self.registrations.lock() += 1;
        Ok(())
    }

    async fn unregister(&self, task_id: &str) -> Result<()> {
        self.tasks.lock().remove(task_id);
        *self.unregistrations.lock() += 1;
        Ok(())
    }

    async fn is_registered(&self, task_id: &str) -> bool {
        self.tasks.lock().contains_key(task_id)
    }
}
