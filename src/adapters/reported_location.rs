//! Location provider fed by fixes the device reports over the API.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::location::LocationSample;
use crate::traits::{Clock, LocationProvider};

#[derive(Debug, Default)]
struct Reported {
    granted: bool,
    latest: Option<LocationSample>,
}

/// Serves the most recent fix pushed by the device.
///
/// Fixes older than `max_age_ms` count as unavailable so a dead GPS never
/// republishes a stale position as current.
pub struct ReportedLocationProvider {
    state: Mutex<Reported>,
    clock: Arc<dyn Clock>,
    max_age_ms: i64,
}

impl ReportedLocationProvider {
    /// Creates a new `ReportedLocationProvider`.
    pub fn new(clock: Arc<dyn Clock>, max_age_ms: i64) -> Self {
        Self {
            state: Mutex::new(Reported::default()),
            clock,
            max_age_ms,
        }
    }

    /// Stores a fresh fix. Reporting a fix implies permission.
    pub fn report(&self, sample: LocationSample) {
        let mut state = self.state.lock();
        state.granted = true;
        state.latest = Some(sample);
    }

    /// Records the platform permission; revoking drops the stored fix.
    pub fn set_permission(&self, granted: bool) {
        let mut state = self.state.lock();
        state.granted = granted;
        if !granted {
            state.latest = None;
        }
    }
}

#[async_trait]
impl LocationProvider for ReportedLocationProvider {
    async fn current_location(&self) -> Result<LocationSample> {
        let state = self.state.lock();

        if !state.granted {
            return Err(AppError::PermissionDenied(
                "Location permission has not been granted".to_string(),
            ));
        }

        let sample = state.latest.ok_or_else(|| {
            AppError::LocationUnavailable("No location has been reported yet".to_string())
        })?;

        let age = self.clock.now_ms() - sample.timestamp;
        if age > self.max_age_ms {
            return Err(AppError::LocationUnavailable(format!(
                "Latest fix is {} seconds old",
                age / 1000
            )));
        }

        Ok(sample)
    }
}
