use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller supplies to start sharing.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingConfig {
    /// The channel name and KDF salt.
    pub share_code: String,
    /// The password the key is derived from. Never leaves the device.
    pub password: String,
    /// Minimum spacing between publishes, in seconds.
    pub update_interval: u64,
    /// Auto-stop after this many minutes; `None` shares until stopped.
    #[serde(default)]
    pub auto_stop_minutes: Option<u64>,
}

impl fmt::Debug for SharingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharingConfig")
            .field("share_code", &self.share_code)
            .field("password", &"<redacted>")
            .field("update_interval", &self.update_interval)
            .field("auto_stop_minutes", &self.auto_stop_minutes)
            .finish()
    }
}

/// The persisted local sharing session.
///
/// At most one exists per device. `last_update_time` is the throttle anchor:
/// it only moves after a successful publish, and `None` means the first
/// publish has not happened yet.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingSession {
    pub share_code: String,
    pub password: String,
    /// Seconds.
    pub update_interval: u64,
    /// Absolute deadline, epoch milliseconds.
    pub auto_stop_time: Option<i64>,
    pub active: bool,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds of the last successful publish.
    pub last_update_time: Option<i64>,
}

impl SharingSession {
    /// Creates an active session from a start request.
    pub fn from_config(config: &SharingConfig, now: i64) -> Self {
        Self {
            share_code: config.share_code.clone(),
            password: config.password.clone(),
            update_interval: config.update_interval,
            auto_stop_time: config
                .auto_stop_minutes
                .map(|minutes| now + minutes as i64 * 60_000),
            active: true,
            start_time: now,
            last_update_time: None,
        }
    }

    /// The update interval in milliseconds.
    pub fn interval_ms(&self) -> i64 {
        self.update_interval as i64 * 1000
    }

    /// Whether the auto-stop deadline has been reached.
    pub fn is_expired(&self, now: i64) -> bool {
        self.auto_stop_time.is_some_and(|deadline| now >= deadline)
    }

    /// Active and not past its deadline.
    pub fn is_live(&self, now: i64) -> bool {
        self.active && !self.is_expired(now)
    }

    /// Whether `other` is the same session (not a replacement that reused
    /// the code).
    pub fn same_session(&self, other: &SharingSession) -> bool {
        self.share_code == other.share_code && self.start_time == other.start_time
    }
}

impl fmt::Debug for SharingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharingSession")
            .field("share_code", &self.share_code)
            .field("password", &"<redacted>")
            .field("update_interval", &self.update_interval)
            .field("auto_stop_time", &self.auto_stop_time)
            .field("active", &self.active)
            .field("start_time", &self.start_time)
            .field("last_update_time", &self.last_update_time)
            .finish()
    }
}

/// The session as reported to the UI. Carries no password.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingStatus {
    pub share_code: String,
    pub update_interval: u64,
    pub auto_stop_time: Option<i64>,
    pub start_time: i64,
    pub last_update_time: Option<i64>,
    /// Milliseconds until auto-stop, if a deadline is set.
    pub remaining_ms: Option<i64>,
}

impl SharingStatus {
    /// Builds the status view of a session at `now`.
    pub fn from_session(session: &SharingSession, now: i64) -> Self {
        Self {
            share_code: session.share_code.clone(),
            update_interval: session.update_interval,
            auto_stop_time: session.auto_stop_time,
            start_time: session.start_time,
            last_update_time: session.last_update_time,
            remaining_ms: session
                .auto_stop_time
                .map(|deadline| (deadline - now).max(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(auto_stop_minutes: Option<u64>) -> SharingConfig {
        SharingConfig {
            share_code: "my-code".to_string(),
            password: "secret1".to_string(),
            update_interval: 60,
            auto_stop_minutes,
        }
    }

    #[test]
    fn from_config_computes_deadline() {
        let session = SharingSession::from_config(&config(Some(30)), 1_000);
        assert_eq!(session.auto_stop_time, Some(1_000 + 30 * 60_000));
        assert!(session.active);
        assert_eq!(session.last_update_time, None);
        assert_eq!(session.interval_ms(), 60_000);
    }

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let session = SharingSession::from_config(&config(Some(1)), 0);
        assert!(!session.is_expired(59_999));
        assert!(session.is_expired(60_000));
        assert!(!session.is_live(60_000));
    }

    #[test]
    fn unbounded_session_never_expires() {
        let session = SharingSession::from_config(&config(None), 0);
        assert!(session.is_live(i64::MAX));
    }

    #[test]
    fn debug_output_redacts_password() {
        let session = SharingSession::from_config(&config(None), 0);
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret1"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let session = SharingSession::from_config(&config(None), 5);
        let json = sonic_rs::to_string(&session).unwrap();
        assert!(json.contains("\"shareCode\":\"my-code\""));
        assert!(json.contains("\"lastUpdateTime\":null"));
        let back: SharingSession = sonic_rs::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
