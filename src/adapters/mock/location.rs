//! Scripted location provider for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{AppError, ErrorKind, Result};
use crate::models::location::LocationSample;
use crate::traits::LocationProvider;

/// Location provider returning a configurable fix.
#[derive(Debug)]
pub struct MockLocationProvider {
    sample: Mutex<LocationSample>,
    failure: Mutex<Option<ErrorKind>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockLocationProvider {
    /// Create a provider that always returns `sample`.
    pub fn new(sample: LocationSample) -> Self {
        Self {
            sample: Mutex::new(sample),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Change the returned fix.
    pub fn set_sample(&self, sample: LocationSample) {
        *self.sample.lock() = sample;
    }

    /// Make captures fail with `PermissionDenied` or `LocationUnavailable`;
    /// `None` restores success.
    pub fn set_failure(&self, failure: Option<ErrorKind>) {
        *self.failure.lock() = failure;
    }

    /// Make every capture take this long.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Number of capture calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationProvider for MockLocationProvider {
    async fn current_location(&self) -> Result<LocationSample> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.failure.lock();
        match failure {
            Some(ErrorKind::PermissionDenied) => {
                Err(AppError::PermissionDenied("Mock permission denied".to_string()))
            }
            Some(_) => Err(AppError::LocationUnavailable("Mock location failure".to_string())),
            None => Ok(*self.sample.lock()),
        }
    }
}
