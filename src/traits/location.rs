//! Device geolocation seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::location::LocationSample;

/// Yields the device's current position on demand.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Captures a fix.
    ///
    /// # Returns
    /// - `Ok(sample)` with the current position
    /// - `Err(AppError::PermissionDenied)` if location access is refused
    /// - `Err(AppError::LocationUnavailable)` if no fix can be produced
    async fn current_location(&self) -> Result<LocationSample>;
}
