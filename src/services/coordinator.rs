use futures::FutureExt;
use parking_lot::Mutex as PhaseLock;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::{
    crypto::envelope,
    error::{AppError, ErrorKind, Result},
    models::session::{SharingConfig, SharingSession},
    repositories::session::SessionRepository,
    services::throttle::{self, ThrottleDecision},
    traits::{BackgroundScheduler, ChannelTransport, Clock, LocationProvider, TaskCallback},
    validation::sharing::{
        normalize_share_code, validate_extension_minutes, validate_password,
        validate_share_code, validate_update_interval,
    },
};

/// Id of the periodic background task that drives publishing.
pub const LOCATION_TASK_ID: &str = "journey-share-location";

/// Where the local sharing lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SharingPhase {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Which mechanism fired a publish trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// The periodic background task.
    Background,
    /// The app returned to the foreground.
    Foreground,
}

/// The result of one trigger. Failures are reported here, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A location was published and the throttle anchor moved to `at`.
    Published { at: i64 },
    /// Too soon since the last publish.
    Skipped { remaining_ms: i64 },
    /// The deadline had passed; the session was ended instead.
    AutoStopped,
    /// No active session; the background task was unregistered.
    NoSession,
    /// The session was stopped while this cycle was in flight.
    Superseded,
    /// Capture, encryption, publish or storage failed; the next trigger
    /// retries.
    Failed { kind: ErrorKind },
}

/// External collaborators the coordinator drives.
#[derive(Clone)]
pub struct CoordinatorDeps {
    pub repository: Arc<SessionRepository>,
    pub channel: Arc<dyn ChannelTransport>,
    pub location: Arc<dyn LocationProvider>,
    pub scheduler: Arc<dyn BackgroundScheduler>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables for the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Bound on a single location capture and on a single publish.
    pub operation_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PhaseState {
    phase: SharingPhase,
    /// Bumped by every stop, so an in-flight start or cycle can tell it was
    /// overtaken.
    stops: u64,
}

/// Runs the capture → encrypt → publish lifecycle of the local session.
///
/// Two trigger sources (background task, foreground resume) funnel into
/// [`SharingCoordinator::handle_trigger`]. Cycles are serialized by
/// `cycle_lock` and throttled against the persisted `last_update_time`, so
/// the sources never need to know about each other.
pub struct SharingCoordinator {
    repository: Arc<SessionRepository>,
    channel: Arc<dyn ChannelTransport>,
    location: Arc<dyn LocationProvider>,
    scheduler: Arc<dyn BackgroundScheduler>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    cycle_lock: Mutex<()>,
    phase: PhaseLock<PhaseState>,
    this: Weak<SharingCoordinator>,
}

impl SharingCoordinator {
    /// Creates a new `SharingCoordinator`.
    pub fn new(deps: CoordinatorDeps, config: CoordinatorConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            repository: deps.repository,
            channel: deps.channel,
            location: deps.location,
            scheduler: deps.scheduler,
            clock: deps.clock,
            config,
            cycle_lock: Mutex::new(()),
            phase: PhaseLock::new(PhaseState {
                phase: SharingPhase::Idle,
                stops: 0,
            }),
            this: this.clone(),
        })
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> SharingPhase {
        self.phase.lock().phase
    }

    fn set_phase(&self, phase: SharingPhase) {
        self.phase.lock().phase = phase;
    }

    fn stop_epoch(&self) -> u64 {
        self.phase.lock().stops
    }

    fn begin_stop(&self) {
        let mut state = self.phase.lock();
        state.phase = SharingPhase::Stopping;
        state.stops += 1;
    }

    /// Moves to `Active` unless a stop ran since `epoch` was read.
    fn activate(&self, epoch: u64) -> bool {
        let mut state = self.phase.lock();
        if state.stops != epoch {
            return false;
        }
        state.phase = SharingPhase::Active;
        true
    }

    /// Starts sharing, replacing any existing session.
    ///
    /// Publishes once before returning so the caller knows sharing works,
    /// then registers the background task. On failure nothing is left
    /// active.
    ///
    /// # Arguments
    ///
    /// * `config` - Share code, password, interval and optional auto-stop.
    ///
    /// # Returns
    ///
    /// The persisted session, or `Validation`, `CodeTaken`,
    /// `LocationUnavailable`/`PermissionDenied`, `Publish`, `Timeout` or
    /// `Storage`.
    pub async fn start_sharing(&self, config: SharingConfig) -> Result<SharingSession> {
        let share_code = normalize_share_code(&config.share_code);
        validate_share_code(&share_code).into_result()?;
        validate_password(&config.password).into_result()?;
        validate_update_interval(config.update_interval).into_result()?;
        if config.auto_stop_minutes == Some(0) {
            return Err(AppError::Validation(
                "Auto-stop must be at least 1 minute".to_string(),
            ));
        }

        let _cycle = self.cycle_lock.lock().await;

        match self.repository.get().await {
            Ok(None) => {}
            Ok(Some(_)) => {
                tracing::info!("🔁 Replacing existing sharing session");
                self.stop_sharing().await?;
            }
            Err(e) => {
                tracing::warn!("⚠️  Discarding unreadable session record: {}", e);
                self.stop_sharing().await?;
            }
        }

        let epoch = self.stop_epoch();

        match self.channel.check_availability(&share_code).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("Share code {} is already in use", share_code);
                self.set_phase(SharingPhase::Idle);
                return Err(AppError::CodeTaken(share_code));
            }
            Err(e) => {
                tracing::warn!("⚠️  Availability check for {} failed: {}", share_code, e);
                self.set_phase(SharingPhase::Idle);
                return Err(e);
            }
        }

        self.set_phase(SharingPhase::Starting);
        tracing::info!("🚀 Starting sharing on {}", share_code);

        let config = SharingConfig {
            share_code: share_code.clone(),
            ..config
        };

        match self.launch(&config).await {
            Ok(_) if !self.activate(epoch) => {
                tracing::warn!("🛑 Sharing on {} stopped while starting", share_code);
                self.rollback(&share_code).await;
                self.set_phase(SharingPhase::Idle);
                Err(AppError::NoActiveSession)
            }
            Ok(session) => {
                tracing::info!(
                    "✅ Sharing active on {} every {}s",
                    session.share_code,
                    session.update_interval
                );
                Ok(session)
            }
            Err(e) => {
                tracing::warn!("❌ Start failed for {}: {}", share_code, e);
                self.rollback(&share_code).await;
                self.set_phase(SharingPhase::Idle);
                Err(e)
            }
        }
    }

    async fn launch(&self, config: &SharingConfig) -> Result<SharingSession> {
        let session = SharingSession::from_config(config, self.clock.now_ms());
        self.repository.save(&session).await?;

        let published_at = self.capture_and_publish(&session).await?;

        let session = self
            .repository
            .update(|current| {
                current.last_update_time = Some(published_at);
                Ok(current.clone())
            })
            .await?
            .ok_or(AppError::NoActiveSession)?;

        self.register_task(&session).await?;
        Ok(session)
    }

    async fn rollback(&self, share_code: &str) {
        if let Err(e) = self.scheduler.unregister(LOCATION_TASK_ID).await {
            tracing::warn!("⚠️  Rollback could not unregister task: {}", e);
        }
        if let Err(e) = self.channel.end_channel(share_code).await {
            tracing::warn!("⚠️  Rollback could not end channel {}: {}", share_code, e);
        }
        if let Err(e) = self.repository.clear().await {
            tracing::error!("❌ Rollback could not clear session: {}", e);
        }
    }

    /// Runs one trigger: reload, auto-stop, throttle, then publish.
    ///
    /// Never fails; errors are logged and reported as
    /// [`TriggerOutcome::Failed`] so the periodic task keeps running.
    pub async fn handle_trigger(&self, source: TriggerSource) -> TriggerOutcome {
        let _cycle = self.cycle_lock.lock().await;

        match self.run_cycle(source).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("⚠️  {:?} trigger failed, will retry: {}", source, e);
                TriggerOutcome::Failed { kind: e.kind() }
            }
        }
    }

    /// The app came back to the foreground.
    pub async fn on_foreground(&self) -> TriggerOutcome {
        self.handle_trigger(TriggerSource::Foreground).await
    }

    async fn run_cycle(&self, source: TriggerSource) -> Result<TriggerOutcome> {
        let now = self.clock.now_ms();
        let epoch = self.stop_epoch();

        let session = match self.repository.get().await? {
            Some(session) if session.active => session,
            _ => {
                tracing::debug!("{:?} trigger without active session", source);
                self.scheduler.unregister(LOCATION_TASK_ID).await?;
                self.set_phase(SharingPhase::Idle);
                return Ok(TriggerOutcome::NoSession);
            }
        };

        if session.is_expired(now) {
            self.auto_stop(&session).await?;
            return Ok(TriggerOutcome::AutoStopped);
        }

        if !self.scheduler.is_registered(LOCATION_TASK_ID).await {
            tracing::info!("🔧 Background task missing, re-registering");
            self.register_task(&session).await?;
        }
        if !self.activate(epoch) {
            tracing::info!("Session on {} stopped during trigger", session.share_code);
            self.scheduler.unregister(LOCATION_TASK_ID).await?;
            return Ok(TriggerOutcome::Superseded);
        }

        if let ThrottleDecision::Skip { remaining_ms } = throttle::decide(&session, now) {
            tracing::debug!(
                "⏳ {:?} trigger skipped, next publish in {}ms",
                source,
                remaining_ms
            );
            return Ok(TriggerOutcome::Skipped { remaining_ms });
        }

        let published_at = self.capture_and_publish(&session).await?;

        let recorded = self
            .repository
            .update(|current| {
                if current.active && current.same_session(&session) {
                    current.last_update_time = Some(published_at);
                    Ok(true)
                } else {
                    Ok(false)
                }
            })
            .await?;

        if recorded == Some(true) {
            tracing::info!("📍 Location published on {} ({:?})", session.share_code, source);
            return Ok(TriggerOutcome::Published { at: published_at });
        }

        tracing::info!("Session ended during publish on {}", session.share_code);
        if recorded.is_none() {
            if let Err(e) = self.channel.end_channel(&session.share_code).await {
                tracing::warn!("⚠️  Could not retract late publish: {}", e);
            }
            self.scheduler.unregister(LOCATION_TASK_ID).await?;
        }
        Ok(TriggerOutcome::Superseded)
    }

    async fn bounded<T>(&self, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.operation_timeout, call)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "{} exceeded {:?}",
                    what, self.config.operation_timeout
                ))
            })?
    }

    async fn capture_and_publish(&self, session: &SharingSession) -> Result<i64> {
        let sample = self
            .bounded("location capture", self.location.current_location())
            .await?;

        let envelope = envelope::encrypt_location(&sample, &session.password, &session.share_code)?;

        self.bounded(
            "publish",
            self.channel.publish(&session.share_code, &envelope),
        )
        .await?;

        Ok(self.clock.now_ms())
    }

    async fn auto_stop(&self, session: &SharingSession) -> Result<()> {
        tracing::info!("⏰ Auto-stop deadline reached for {}", session.share_code);
        self.begin_stop();

        if let Err(e) = self.scheduler.unregister(LOCATION_TASK_ID).await {
            tracing::warn!("⚠️  Could not unregister task: {}", e);
        }
        if let Err(e) = self.channel.end_channel(&session.share_code).await {
            tracing::warn!("⚠️  Could not end channel {}: {}", session.share_code, e);
        }

        let result = self
            .repository
            .clear_if(|current| current.same_session(session))
            .await;
        self.set_phase(SharingPhase::Idle);
        result.map(|_| ())
    }

    fn task_callback(&self) -> TaskCallback {
        let this = self.this.clone();
        Arc::new(move || {
            let this = this.clone();
            async move {
                if let Some(coordinator) = this.upgrade() {
                    coordinator.handle_trigger(TriggerSource::Background).await;
                }
            }
            .boxed()
        })
    }

    async fn register_task(&self, session: &SharingSession) -> Result<()> {
        self.scheduler
            .register_periodic(
                LOCATION_TASK_ID,
                Duration::from_secs(session.update_interval),
                self.task_callback(),
            )
            .await
    }

    async fn teardown(&self) -> Result<()> {
        if let Err(e) = self.scheduler.unregister(LOCATION_TASK_ID).await {
            tracing::warn!("⚠️  Could not unregister task: {}", e);
        }

        match self.repository.get().await {
            Ok(Some(session)) => {
                if let Err(e) = self.channel.end_channel(&session.share_code).await {
                    tracing::warn!("⚠️  Could not end channel {}: {}", session.share_code, e);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("⚠️  Could not read session during stop: {}", e),
        }

        self.repository.clear().await
    }

    /// Stops sharing. Safe to call in any phase, and when already idle.
    ///
    /// Ending the remote channel is best-effort; local cleanup always runs.
    pub async fn stop_sharing(&self) -> Result<()> {
        self.begin_stop();
        let result = self.teardown().await;
        self.set_phase(SharingPhase::Idle);

        match &result {
            Ok(()) => tracing::info!("🛑 Sharing stopped"),
            Err(e) => tracing::error!("❌ Stop could not clear session: {}", e),
        }
        result
    }

    /// Pushes the auto-stop deadline back.
    ///
    /// # Arguments
    ///
    /// * `additional_minutes` - Minutes to add to the deadline.
    ///
    /// # Returns
    ///
    /// The updated session, `NoActiveSession` if nothing live is shared, or
    /// `NoDeadline` if the session is unbounded.
    pub async fn extend_sharing_session(&self, additional_minutes: u64) -> Result<SharingSession> {
        validate_extension_minutes(additional_minutes).into_result()?;
        let now = self.clock.now_ms();

        let session = self
            .repository
            .update(|current| {
                if !current.is_live(now) {
                    return Err(AppError::NoActiveSession);
                }
                let deadline = current.auto_stop_time.ok_or(AppError::NoDeadline)?;
                current.auto_stop_time = Some(deadline + additional_minutes as i64 * 60_000);
                Ok(current.clone())
            })
            .await?
            .ok_or(AppError::NoActiveSession)?;

        tracing::info!(
            "⏱️  Sharing on {} extended by {} minutes",
            session.share_code,
            additional_minutes
        );
        Ok(session)
    }

    /// The live session, or `None`.
    ///
    /// A session past its deadline reads as gone even if the background task
    /// has not cleaned it up yet.
    pub async fn get_sharing_status(&self) -> Result<Option<SharingSession>> {
        let now = self.clock.now_ms();
        Ok(self
            .repository
            .get()
            .await?
            .filter(|session| session.is_live(now)))
    }

    /// The live session together with a phase that agrees with it.
    ///
    /// An overdue session reads as gone and the phase as `Idle`, even before
    /// the background task has cleaned it up.
    pub async fn sharing_state(&self) -> Result<(SharingPhase, Option<SharingSession>)> {
        let session = self.get_sharing_status().await?;
        let phase = match (self.phase(), &session) {
            (SharingPhase::Active, None) => SharingPhase::Idle,
            (phase, _) => phase,
        };
        Ok((phase, session))
    }

    /// Re-arms sharing after a process restart.
    ///
    /// A live persisted session gets its background task back; an expired
    /// or inactive one is cleaned up.
    pub async fn restore(&self) -> Result<Option<SharingSession>> {
        let _cycle = self.cycle_lock.lock().await;
        let now = self.clock.now_ms();
        let epoch = self.stop_epoch();
        let (session, watched) = self.repository.snapshot().await?;
        tracing::info!("Restoring state: {} watched sessions", watched.len());

        match session {
            Some(session) if session.is_live(now) => {
                self.register_task(&session).await?;
                if !self.activate(epoch) {
                    self.scheduler.unregister(LOCATION_TASK_ID).await?;
                    return Ok(None);
                }
                tracing::info!("✅ Sharing on {} resumed", session.share_code);
                Ok(Some(session))
            }
            Some(session) if session.active => {
                self.auto_stop(&session).await?;
                Ok(None)
            }
            Some(_) => {
                self.teardown().await?;
                Ok(None)
            }
            None => {
                self.scheduler.unregister(LOCATION_TASK_ID).await?;
                Ok(None)
            }
        }
    }
}
