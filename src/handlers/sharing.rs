use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorKind, Result},
    handlers::respond::json,
    models::session::{SharingConfig, SharingStatus},
    services::coordinator::{SharingPhase, TriggerOutcome},
    state::AppState,
    traits::Clock,
};

/// The request payload for extending the auto-stop deadline.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExtendRequest {
    pub additional_minutes: u64,
}

/// The response payload for `GET /api/sharing/status`.
#[derive(Serialize)]
pub struct StatusResponse {
    pub phase: SharingPhase,
    pub session: Option<SharingStatus>,
}

/// What a foreground trigger did.
#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TriggerOutcome> for TriggerResponse {
    fn from(outcome: TriggerOutcome) -> Self {
        let (name, at, remaining_ms, error) = match outcome {
            TriggerOutcome::Published { at } => ("published", Some(at), None, None),
            TriggerOutcome::Skipped { remaining_ms } => ("skipped", None, Some(remaining_ms), None),
            TriggerOutcome::AutoStopped => ("autoStopped", None, None, None),
            TriggerOutcome::NoSession => ("noSession", None, None, None),
            TriggerOutcome::Superseded => ("superseded", None, None, None),
            TriggerOutcome::Failed { kind } => ("failed", None, None, Some(kind_name(kind))),
        };

        Self {
            outcome: name,
            at,
            remaining_ms,
            error,
        }
    }
}

fn kind_name(kind: ErrorKind) -> String {
    format!("{:?}", kind)
}

/// Starts sharing the device location.
///
/// # Returns
///
/// `201 Created` with the session status after the first publish.
#[axum::debug_handler]
pub async fn start(
    State(state): State<AppState>,
    Json(payload): Json<SharingConfig>,
) -> Result<Response> {
    tracing::info!("📡 Start sharing request: {:?}", payload);

    let session = state.coordinator.start_sharing(payload).await?;
    let status = SharingStatus::from_session(&session, state.clock.now_ms());

    json(StatusCode::CREATED, &status)
}

/// Stops sharing. Idempotent.
#[axum::debug_handler]
pub async fn stop(State(state): State<AppState>) -> Result<StatusCode> {
    state.coordinator.stop_sharing().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pushes the auto-stop deadline back.
#[axum::debug_handler]
pub async fn extend(
    State(state): State<AppState>,
    Json(payload): Json<ExtendRequest>,
) -> Result<Response> {
    let session = state
        .coordinator
        .extend_sharing_session(payload.additional_minutes)
        .await?;
    let status = SharingStatus::from_session(&session, state.clock.now_ms());

    json(StatusCode::OK, &status)
}

/// Reports the lifecycle phase and the live session, if any.
#[axum::debug_handler]
pub async fn status(State(state): State<AppState>) -> Result<Response> {
    let now = state.clock.now_ms();
    let (phase, session) = state.coordinator.sharing_state().await?;

    json(
        StatusCode::OK,
        &StatusResponse {
            phase,
            session: session.map(|session| SharingStatus::from_session(&session, now)),
        },
    )
}

/// The app came back to the foreground; publish if the interval allows.
#[axum::debug_handler]
pub async fn foreground(State(state): State<AppState>) -> Result<Response> {
    let outcome = state.coordinator.on_foreground().await;
    tracing::debug!("Foreground trigger: {:?}", outcome);

    json(StatusCode::OK, &TriggerResponse::from(outcome))
}
