use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote sharing session this device observes.
///
/// Decrypted coordinates are never stored here, only what is needed to fetch
/// and decrypt again.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedSession {
    /// The friend's share code.
    pub share_code: String,
    /// The password the friend handed out with the code.
    pub password: String,
    /// A display label chosen locally.
    #[serde(default)]
    pub label: Option<String>,
    /// When the session was first tracked, epoch milliseconds.
    pub added_at: i64,
    /// Last successful decrypt, epoch milliseconds.
    #[serde(default)]
    pub last_seen_at: Option<i64>,
}

impl fmt::Debug for WatchedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedSession")
            .field("share_code", &self.share_code)
            .field("password", &"<redacted>")
            .field("label", &self.label)
            .field("added_at", &self.added_at)
            .field("last_seen_at", &self.last_seen_at)
            .finish()
    }
}

/// A watched session as exposed over the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedSessionView {
    pub share_code: String,
    pub label: Option<String>,
    pub added_at: i64,
    pub last_seen_at: Option<i64>,
}

impl From<&WatchedSession> for WatchedSessionView {
    fn from(session: &WatchedSession) -> Self {
        Self {
            share_code: session.share_code.clone(),
            label: session.label.clone(),
            added_at: session.added_at,
            last_seen_at: session.last_seen_at,
        }
    }
}
