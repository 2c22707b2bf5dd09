use axum::{Router, extract::DefaultBodyLimit};

use http::{Method, header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use journey_share::{config::Config, routes, state::AppState};

/// How often expired failed-attempt entries are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    match state.coordinator.restore().await {
        Ok(Some(session)) => {
            tracing::info!("✅ Resumed sharing on {}", session.share_code);
        }
        Ok(None) => {
            tracing::info!("✅ No sharing session to resume");
        }
        Err(e) => {
            tracing::error!("❌ Failed to restore sharing session: {}", e);
            return Err(e.into());
        }
    }

    let origin = format!("http://{}", config.bind_addr);
    let cors = CorsLayer::new()
        .allow_origin([origin.parse::<http::HeaderValue>()?])
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(86400));

    let track_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(10)
            .use_headers()
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid governor configuration"))?,
    );

    let track_routes = routes::track_routes(state.clone())
        .layer(tower_governor::GovernorLayer::new(track_governor_conf));

    let app = Router::new()
        .merge(routes::sharing_routes(state.clone()))
        .merge(track_routes)
        .merge(routes::watched_routes(state.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors);

    let housekeeping_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(PRUNE_INTERVAL).await;
            let pruned = housekeeping_state.rate_limiter.prune_expired();
            if pruned > 0 {
                tracing::info!("🧹 Pruned {} expired rate-limit entries", pruned);
            }
        }
    });

    let addr = config.bind_addr;
    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("✅ Background housekeeping started (runs every 5 minutes)");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
