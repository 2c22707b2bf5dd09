use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::{handlers, state::AppState};

/// Routes that drive the local sharing session and device location.
pub fn sharing_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/sharing/start", post(handlers::sharing::start))
        .route("/api/sharing/stop", post(handlers::sharing::stop))
        .route("/api/sharing/extend", post(handlers::sharing::extend))
        .route("/api/sharing/status", get(handlers::sharing::status))
        .route("/api/sharing/foreground", post(handlers::sharing::foreground))
        .route("/api/location", post(handlers::location::report))
        .route(
            "/api/location/permission",
            post(handlers::location::permission),
        )
        .route(
            "/api/validate/share-code/{code}",
            get(handlers::validation::share_code),
        )
        .with_state(state)
}

/// The decrypt endpoint. Kept separate so the binary can put a per-IP
/// limiter in front of it.
pub fn track_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/track", post(handlers::tracking::track))
        .with_state(state)
}

/// Watched-list and lock-status routes.
pub fn watched_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/track/status/{share_code}",
            get(handlers::tracking::rate_limit_status),
        )
        .route("/api/watched", get(handlers::tracking::list_watched))
        .route(
            "/api/watched/refresh",
            post(handlers::tracking::refresh_watched),
        )
        .route(
            "/api/watched/{share_code}",
            delete(handlers::tracking::unwatch),
        )
        .with_state(state)
}

/// Every route, without transport layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(sharing_routes(state.clone()))
        .merge(track_routes(state.clone()))
        .merge(watched_routes(state))
}
