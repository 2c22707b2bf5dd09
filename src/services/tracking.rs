use std::sync::Arc;

use crate::{
    crypto::envelope,
    error::{AppError, ErrorKind, Result},
    models::{location::LocationSample, watched::WatchedSession},
    repositories::session::SessionRepository,
    services::rate_limiter::{RateLimitStatus, RateLimiter},
    traits::{ChannelTransport, Clock},
    validation::sharing::{normalize_share_code, validate_password, validate_share_code},
};

/// The observer side: fetch a friend's latest envelope and decrypt it.
///
/// Every decrypt goes through the rate limiter. Only wrong-credential
/// failures count against the share code; a corrupted envelope says
/// nothing about guessing.
#[derive(Clone)]
pub struct TrackingService {
    channel: Arc<dyn ChannelTransport>,
    repository: Arc<SessionRepository>,
    rate_limiter: RateLimiter,
    clock: Arc<dyn Clock>,
}

impl TrackingService {
    /// Creates a new `TrackingService`.
    pub fn new(
        channel: Arc<dyn ChannelTransport>,
        repository: Arc<SessionRepository>,
        rate_limiter: RateLimiter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            channel,
            repository,
            rate_limiter,
            clock,
        }
    }

    /// The lock state of a share code.
    pub fn rate_limit_status(&self, share_code: &str) -> RateLimitStatus {
        self.rate_limiter
            .check_rate_limit(&normalize_share_code(share_code))
    }

    /// Fetches and decrypts the latest location on a share code.
    ///
    /// # Arguments
    ///
    /// * `share_code` - The friend's share code.
    /// * `password` - The password the friend handed out.
    /// * `label` - Optional display label for the watched list.
    ///
    /// # Returns
    ///
    /// The decrypted sample, or `Validation`, `RateLimited`, `NotFound`,
    /// `InvalidCredentials` or `MalformedEnvelope`.
    pub async fn track(
        &self,
        share_code: &str,
        password: &str,
        label: Option<String>,
    ) -> Result<LocationSample> {
        let share_code = normalize_share_code(share_code);
        validate_share_code(&share_code).into_result()?;
        validate_password(password).into_result()?;

        let sample = self.fetch_and_decrypt(&share_code, password).await?;

        let now = self.clock.now_ms();
        let watched = WatchedSession {
            share_code: share_code.clone(),
            password: password.to_string(),
            label,
            added_at: now,
            last_seen_at: Some(now),
        };
        if let Err(e) = self.repository.save_watched(watched).await {
            tracing::warn!("⚠️  Could not record watched session {}: {}", share_code, e);
        }

        Ok(sample)
    }

    async fn fetch_and_decrypt(&self, share_code: &str, password: &str) -> Result<LocationSample> {
        let status = self.rate_limiter.check_rate_limit(share_code);
        if status.limited {
            tracing::warn!("⛔ Tracking {} refused, locked", share_code);
            return Err(AppError::rate_limited(status.remaining_time_ms));
        }

        let envelope_json = self
            .channel
            .fetch_latest(share_code)
            .await?
            .ok_or(AppError::NotFound)?;

        match envelope::decrypt_location(&envelope_json, password, share_code) {
            Ok(sample) => {
                self.rate_limiter.record_attempt(share_code, true);
                Ok(sample)
            }
            Err(e) if e.kind() == ErrorKind::InvalidCredentials => {
                if !self.rate_limiter.record_attempt(share_code, false) {
                    let status = self.rate_limiter.check_rate_limit(share_code);
                    return Err(AppError::rate_limited(status.remaining_time_ms));
                }
                tracing::info!("🔐 Wrong credentials for {}", share_code);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Polls every watched session through the same guarded path.
    ///
    /// # Returns
    ///
    /// One result per watched session, in list order.
    pub async fn refresh_watched(&self) -> Result<Vec<(WatchedSession, Result<LocationSample>)>> {
        let watched = self.repository.list_watched().await?;
        let mut results = Vec::with_capacity(watched.len());

        for session in watched {
            let result = self
                .fetch_and_decrypt(&session.share_code, &session.password)
                .await;

            if result.is_ok() {
                let refreshed = WatchedSession {
                    last_seen_at: Some(self.clock.now_ms()),
                    ..session.clone()
                };
                if let Err(e) = self.repository.save_watched(refreshed).await {
                    tracing::warn!("⚠️  Could not refresh {}: {}", session.share_code, e);
                }
            }

            results.push((session, result));
        }

        Ok(results)
    }

    /// Lists watched sessions.
    pub async fn watched(&self) -> Result<Vec<WatchedSession>> {
        self.repository.list_watched().await
    }

    /// Stops watching a share code.
    pub async fn unwatch(&self, share_code: &str) -> Result<()> {
        if self
            .repository
            .remove_watched(&normalize_share_code(share_code))
            .await?
        {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryChannel, InMemoryStore};
    use crate::adapters::mock::ManualClock;
    use crate::services::rate_limiter::WINDOW_MS;

    const T0: i64 = 1_700_000_000_000;

    struct Harness {
        tracking: TrackingService,
        channel: Arc<InMemoryChannel>,
        repository: Arc<SessionRepository>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let channel = Arc::new(InMemoryChannel::new());
        let repository = Arc::new(SessionRepository::new(Arc::new(InMemoryStore::new()), "test"));
        let clock = Arc::new(ManualClock::new(T0));
        let tracking = TrackingService::new(
            channel.clone(),
            repository.clone(),
            RateLimiter::new(clock.clone()),
            clock.clone(),
        );
        Harness {
            tracking,
            channel,
            repository,
            clock,
        }
    }

    fn publish(h: &Harness, code: &str, password: &str) -> LocationSample {
        let sample = LocationSample::new(40.4168, -3.7038, T0);
        let envelope = envelope::encrypt_location(&sample, password, code).unwrap();
        h.channel.claim(code, &envelope);
        sample
    }

    #[tokio::test]
    async fn right_password_decrypts_and_watches() {
        let h = harness();
        let sample = publish(&h, "friend-1", "secret1");

        let got = h
            .tracking
            .track(" friend-1 ", "secret1", Some("Ana".into()))
            .await
            .unwrap();
        assert_eq!(got, sample);

        let watched = h.tracking.watched().await.unwrap();
        assert_eq!(watched.len(), 1);
        assert_eq!(watched[0].share_code, "friend-1");
        assert_eq!(watched[0].label.as_deref(), Some("Ana"));
        assert_eq!(watched[0].last_seen_at, Some(T0));
    }

    #[tokio::test]
    async fn nothing_published_is_not_found() {
        let h = harness();
        let err = h.tracking.track("friend-1", "secret1", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(h.tracking.watched().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_input_is_rejected_before_fetching() {
        let h = harness();
        assert_eq!(
            h.tracking.track("abc", "secret1", None).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            h.tracking.track("friend-1", "123", None).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[tokio::test]
    async fn sixth_wrong_password_is_locked() {
        let h = harness();
        publish(&h, "friend-1", "secret1");

        for _ in 0..5 {
            let err = h.tracking.track("friend-1", "wrong-pw", None).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        }

        let err = h.tracking.track("friend-1", "secret1", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(h.tracking.rate_limit_status("friend-1").limited);

        h.clock.advance(WINDOW_MS);
        assert!(h.tracking.track("friend-1", "secret1", None).await.is_ok());
        assert!(!h.tracking.rate_limit_status("friend-1").limited);
    }

    #[tokio::test]
    async fn malformed_envelopes_do_not_count() {
        let h = harness();
        h.channel.claim("friend-1", r#"{"iv":"","data":""}"#);

        for _ in 0..8 {
            let err = h.tracking.track("friend-1", "secret1", None).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedEnvelope);
        }
        assert!(!h.tracking.rate_limit_status("friend-1").limited);
    }

    #[tokio::test]
    async fn refresh_polls_every_watched_session() {
        let h = harness();
        publish(&h, "friend-1", "secret1");
        publish(&h, "friend-2", "secret2");
        h.tracking.track("friend-1", "secret1", None).await.unwrap();
        h.tracking.track("friend-2", "secret2", None).await.unwrap();

        h.channel.end_channel("friend-2").await.unwrap();
        h.clock.advance(5_000);

        let results = h.tracking.refresh_watched().await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].1.as_ref().unwrap_err().kind(), ErrorKind::NotFound);

        let watched = h.repository.list_watched().await.unwrap();
        assert_eq!(watched[0].last_seen_at, Some(T0 + 5_000));
        assert_eq!(watched[1].last_seen_at, Some(T0));
    }

    #[tokio::test]
    async fn unwatch_removes_or_reports_missing() {
        let h = harness();
        publish(&h, "friend-1", "secret1");
        h.tracking.track("friend-1", "secret1", None).await.unwrap();

        h.tracking.unwatch("friend-1").await.unwrap();
        assert!(h.tracking.watched().await.unwrap().is_empty());
        assert_eq!(
            h.tracking.unwatch("friend-1").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
