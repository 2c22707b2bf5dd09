use serde::{Deserialize, Serialize};

/// A single geolocation fix.
///
/// Exists only in memory between capture and encryption; the only form that
/// leaves the device is the encrypted envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// When the fix was taken, epoch milliseconds.
    pub timestamp: i64,
}

impl LocationSample {
    /// Creates a new `LocationSample`.
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Whether the coordinates are finite and inside the WGS84 ranges.
    pub fn is_plausible(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}
