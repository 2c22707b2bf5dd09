use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::clock::Clock;

/// Failures inside the window that lock a share code.
pub const MAX_FAILED_ATTEMPTS: usize = 5;
/// Length of the trailing window, in milliseconds.
pub const WINDOW_MS: i64 = 15 * 60 * 1000;

#[derive(Debug, Clone, Copy)]
struct Attempt {
    timestamp: i64,
    success: bool,
}

/// The lock state of a share code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub limited: bool,
    pub remaining_time_ms: i64,
    pub remaining_minutes: i64,
    /// Failures counted in the window, for "N attempts left" hints.
    pub failed_attempts: usize,
}

impl RateLimitStatus {
    fn open(failed_attempts: usize) -> Self {
        Self {
            limited: false,
            remaining_time_ms: 0,
            remaining_minutes: 0,
            failed_attempts,
        }
    }
}

/// A sliding-window guard against password guessing on a share code.
///
/// State lives for the process lifetime only. Each instance is independent,
/// so tests construct their own.
#[derive(Clone)]
pub struct RateLimiter {
    attempts: Arc<Mutex<HashMap<String, Vec<Attempt>>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a new `RateLimiter`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    fn in_window(attempt: &Attempt, now: i64) -> bool {
        now - attempt.timestamp < WINDOW_MS
    }

    /// Records a decryption attempt for a share code.
    ///
    /// # Arguments
    ///
    /// * `share_code` - The share code that was tried.
    /// * `success` - Whether decryption succeeded.
    ///
    /// # Returns
    ///
    /// `false` if the code is already locked and the attempt was rejected,
    /// `true` otherwise. A success clears the code's history.
    pub fn record_attempt(&self, share_code: &str, success: bool) -> bool {
        let now = self.clock.now_ms();
        let mut attempts = self.attempts.lock();

        if success {
            attempts.remove(share_code);
            tracing::debug!("🔓 Attempts cleared after success for {}", share_code);
            return true;
        }

        let entry = attempts.entry(share_code.to_string()).or_default();
        entry.retain(|a| Self::in_window(a, now));

        let failures = entry.iter().filter(|a| !a.success).count();
        if failures >= MAX_FAILED_ATTEMPTS {
            tracing::warn!("⛔ Attempt rejected, {} is locked", share_code);
            return false;
        }

        entry.push(Attempt {
            timestamp: now,
            success: false,
        });
        tracing::debug!(
            "Failed attempt {}/{} recorded for {}",
            failures + 1,
            MAX_FAILED_ATTEMPTS,
            share_code
        );
        true
    }

    /// Reports whether a share code is locked and for how long.
    ///
    /// The lock lifts when the oldest failure still in the window ages out.
    pub fn check_rate_limit(&self, share_code: &str) -> RateLimitStatus {
        let now = self.clock.now_ms();
        let attempts = self.attempts.lock();

        let Some(entry) = attempts.get(share_code) else {
            return RateLimitStatus::open(0);
        };

        let failures: Vec<i64> = entry
            .iter()
            .filter(|a| !a.success && Self::in_window(a, now))
            .map(|a| a.timestamp)
            .collect();

        if failures.len() < MAX_FAILED_ATTEMPTS {
            return RateLimitStatus::open(failures.len());
        }

        let oldest = failures.iter().copied().min().unwrap_or(now);
        let remaining_time_ms = (oldest + WINDOW_MS - now).max(0);

        RateLimitStatus {
            limited: true,
            remaining_time_ms,
            remaining_minutes: (remaining_time_ms + 59_999) / 60_000,
            failed_attempts: failures.len(),
        }
    }

    /// Forgets every attempt for a share code.
    pub fn clear_attempts(&self, share_code: &str) {
        self.attempts.lock().remove(share_code);
    }

    /// Drops codes whose window has emptied.
    ///
    /// # Returns
    ///
    /// The number of codes removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut attempts = self.attempts.lock();
        let before = attempts.len();
        attempts.retain(|_, entry| {
            entry.retain(|a| Self::in_window(a, now));
            !entry.is_empty()
        });
        before - attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::clock::ManualClock;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (RateLimiter::new(clock.clone()), clock)
    }

    #[test]
    fn sixth_failure_is_rejected() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            assert!(limiter.record_attempt("my-code", false));
        }
        assert!(!limiter.record_attempt("my-code", false));
        assert!(limiter.check_rate_limit("my-code").limited);
    }

    #[test]
    fn success_clears_history() {
        let (limiter, _) = limiter();
        for _ in 0..4 {
            limiter.record_attempt("my-code", false);
        }
        assert!(limiter.record_attempt("my-code", true));
        assert_eq!(limiter.check_rate_limit("my-code").failed_attempts, 0);
        assert!(limiter.record_attempt("my-code", false));
    }

    #[test]
    fn open_status_counts_failures() {
        let (limiter, _) = limiter();
        assert_eq!(limiter.check_rate_limit("my-code").failed_attempts, 0);
        for _ in 0..3 {
            limiter.record_attempt("my-code", false);
        }
        let status = limiter.check_rate_limit("my-code");
        assert!(!status.limited);
        assert_eq!(status.failed_attempts, 3);
        assert_eq!(status.remaining_time_ms, 0);
    }

    #[test]
    fn codes_are_independent() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            limiter.record_attempt("code-a1", false);
        }
        assert!(limiter.check_rate_limit("code-a1").limited);
        assert!(!limiter.check_rate_limit("code-b2").limited);
        assert!(limiter.record_attempt("code-b2", false));
    }

    #[test]
    fn lock_lifts_when_oldest_failure_ages_out() {
        let (limiter, clock) = limiter();
        limiter.record_attempt("my-code", false);
        clock.advance(60_000);
        for _ in 0..4 {
            limiter.record_attempt("my-code", false);
        }

        let status = limiter.check_rate_limit("my-code");
        assert!(status.limited);
        assert_eq!(status.failed_attempts, 5);
        assert_eq!(status.remaining_time_ms, WINDOW_MS - 60_000);
        assert_eq!(status.remaining_minutes, 14);

        clock.advance(WINDOW_MS - 60_000);
        assert!(!limiter.check_rate_limit("my-code").limited);
        assert_eq!(limiter.check_rate_limit("my-code").failed_attempts, 4);
        assert!(limiter.record_attempt("my-code", false));
        assert!(!limiter.record_attempt("my-code", false));
    }

    #[test]
    fn remaining_minutes_round_up() {
        let (limiter, clock) = limiter();
        for _ in 0..5 {
            limiter.record_attempt("my-code", false);
        }
        clock.advance(30_000);
        let status = limiter.check_rate_limit("my-code");
        assert_eq!(status.remaining_time_ms, WINDOW_MS - 30_000);
        assert_eq!(status.remaining_minutes, 15);
    }

    #[test]
    fn clear_attempts_unlocks() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            limiter.record_attempt("my-code", false);
        }
        limiter.clear_attempts("my-code");
        assert!(!limiter.check_rate_limit("my-code").limited);
    }

    #[test]
    fn prune_expired_drops_stale_codes() {
        let (limiter, clock) = limiter();
        limiter.record_attempt("old-code", false);
        clock.advance(WINDOW_MS);
        limiter.record_attempt("new-code", false);
        assert_eq!(limiter.prune_expired(), 1);
        assert_eq!(limiter.check_rate_limit("new-code").failed_attempts, 1);
    }
}
