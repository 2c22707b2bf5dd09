use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::adapters::{
    InMemoryChannel, InMemoryStore, RedisChannel, RedisStore, ReportedLocationProvider,
    SystemClock, TokioScheduler,
};
use crate::config::Config;
use crate::error::Result;
use crate::repositories::session::SessionRepository;
use crate::services::{
    coordinator::{CoordinatorConfig, CoordinatorDeps, SharingCoordinator},
    rate_limiter::RateLimiter,
    tracking::TrackingService,
};
use crate::traits::{BackgroundScheduler, ChannelTransport, Clock, KeyValueStore};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Drives the local sharing session.
    pub coordinator: Arc<SharingCoordinator>,
    /// Observer side: fetch and decrypt friends' locations.
    pub tracking: TrackingService,
    /// Failed-decryption limiter, shared with `tracking`.
    pub rate_limiter: RateLimiter,
    /// Receives fixes and permission changes from the device.
    pub location: Arc<ReportedLocationProvider>,
    /// The time source.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// Uses Redis for the store and channel when `REDIS_URL` is set, and
    /// process-local adapters otherwise.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn KeyValueStore>;
        let channel: Arc<dyn ChannelTransport>;

        match &config.redis_url {
            Some(url) => {
                let redis_client = redis::Client::open(url.as_str())?;
                let redis = ConnectionManager::new(redis_client).await?;
                tracing::info!("✅ Redis Connection Manager initialized (pooled)");

                store = Arc::new(RedisStore::new(redis.clone()));
                channel = Arc::new(RedisChannel::new(
                    redis,
                    &config.key_prefix,
                    config.channel_ttl_secs,
                ));
            }
            None => {
                tracing::warn!("⚠️  REDIS_URL not set, state is kept in memory only");
                store = Arc::new(InMemoryStore::new());
                channel = Arc::new(InMemoryChannel::new());
            }
        }

        Ok(Self::assemble(
            config,
            store,
            channel,
            Arc::new(TokioScheduler::new()),
            Arc::new(SystemClock),
        ))
    }

    /// Wires the services over the given collaborators.
    pub fn assemble(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        channel: Arc<dyn ChannelTransport>,
        scheduler: Arc<dyn BackgroundScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let repository = Arc::new(SessionRepository::new(store, &config.key_prefix));

        let location = Arc::new(ReportedLocationProvider::new(
            clock.clone(),
            config.location_max_age_secs as i64 * 1000,
        ));

        let coordinator = SharingCoordinator::new(
            CoordinatorDeps {
                repository: repository.clone(),
                channel: channel.clone(),
                location: location.clone(),
                scheduler,
                clock: clock.clone(),
            },
            CoordinatorConfig {
                operation_timeout: config.operation_timeout(),
            },
        );
        tracing::info!("✅ Sharing coordinator initialized");

        let rate_limiter = RateLimiter::new(clock.clone());
        let tracking = TrackingService::new(channel, repository, rate_limiter.clone(), clock.clone());
        tracing::info!("✅ Tracking service initialized");

        Self {
            config: config.clone(),
            coordinator,
            tracking,
            rate_limiter,
            location,
            clock,
        }
    }
}
