use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    handlers::respond::json,
    models::{location::LocationSample, watched::WatchedSessionView},
    state::AppState,
};

/// The request payload for tracking a friend. Not `Debug`: it holds a
/// password.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub share_code: String,
    pub password: String,
    pub label: Option<String>,
}

/// One row of a watched-list refresh.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshEntry {
    #[serde(flatten)]
    pub session: WatchedSessionView,
    pub location: Option<LocationSample>,
    pub error: Option<String>,
}

/// Fetches and decrypts a friend's latest location.
#[axum::debug_handler]
pub async fn track(
    State(state): State<AppState>,
    Json(payload): Json<TrackRequest>,
) -> Result<Response> {
    tracing::info!("🔎 Track request for {}", payload.share_code);

    let sample = state
        .tracking
        .track(&payload.share_code, &payload.password, payload.label)
        .await?;

    json(StatusCode::OK, &sample)
}

/// The lock state of a share code.
#[axum::debug_handler]
pub async fn rate_limit_status(
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> Result<Response> {
    json(StatusCode::OK, &state.tracking.rate_limit_status(&share_code))
}

/// Lists watched sessions without their passwords.
#[axum::debug_handler]
pub async fn list_watched(State(state): State<AppState>) -> Result<Response> {
    let watched: Vec<WatchedSessionView> = state
        .tracking
        .watched()
        .await?
        .iter()
        .map(WatchedSessionView::from)
        .collect();

    json(StatusCode::OK, &watched)
}

/// Re-polls every watched session.
#[axum::debug_handler]
pub async fn refresh_watched(State(state): State<AppState>) -> Result<Response> {
    let entries: Vec<RefreshEntry> = state
        .tracking
        .refresh_watched()
        .await?
        .into_iter()
        .map(|(session, result)| {
            let (location, error) = match result {
                Ok(sample) => (Some(sample), None),
                Err(e) => (None, Some(e.to_string())),
            };
            RefreshEntry {
                session: WatchedSessionView::from(&session),
                location,
                error,
            }
        })
        .collect();

    json(StatusCode::OK, &entries)
}

/// Stops watching a share code.
#[axum::debug_handler]
pub async fn unwatch(
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> Result<StatusCode> {
    state.tracking.unwatch(&share_code).await?;
    Ok(StatusCode::NO_CONTENT)
}
