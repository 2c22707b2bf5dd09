use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::location::LocationSample,
    state::AppState,
    traits::Clock,
};

/// A fix pushed by the device.
#[derive(Deserialize, Debug)]
pub struct ReportRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since epoch; defaults to receipt time.
    pub timestamp: Option<i64>,
}

/// The platform location permission.
#[derive(Deserialize, Debug)]
pub struct PermissionRequest {
    pub granted: bool,
}

/// Stores the latest device fix for the next publish cycle.
#[axum::debug_handler]
pub async fn report(
    State(state): State<AppState>,
    Json(payload): Json<ReportRequest>,
) -> Result<StatusCode> {
    let sample = LocationSample::new(
        payload.latitude,
        payload.longitude,
        payload.timestamp.unwrap_or_else(|| state.clock.now_ms()),
    );

    if !sample.is_plausible() {
        return Err(AppError::Validation(
            "Latitude must be within ±90 and longitude within ±180".to_string(),
        ));
    }

    state.location.report(sample);
    Ok(StatusCode::NO_CONTENT)
}

/// Records a permission grant or revocation.
#[axum::debug_handler]
pub async fn permission(
    State(state): State<AppState>,
    Json(payload): Json<PermissionRequest>,
) -> Result<StatusCode> {
    tracing::info!("📍 Location permission granted: {}", payload.granted);
    state.location.set_permission(payload.granted);
    Ok(StatusCode::NO_CONTENT)
}
