use crate::models::session::SharingSession;

/// What a trigger should do with a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Capture and publish now.
    Publish,
    /// Too soon since the last publish.
    Skip { remaining_ms: i64 },
}

/// Decides whether a trigger at `now` may publish.
///
/// The clock is anchored to the persisted `last_update_time`, not to either
/// trigger source, so background ticks and foreground resumes converge on at
/// most one publish per interval. A session that has never published always
/// publishes.
pub fn decide(session: &SharingSession, now: i64) -> ThrottleDecision {
    let Some(last) = session.last_update_time else {
        return ThrottleDecision::Publish;
    };

    let elapsed = now - last;
    let interval = session.interval_ms();
    if elapsed < interval {
        ThrottleDecision::Skip {
            remaining_ms: interval - elapsed,
        }
    } else {
        ThrottleDecision::Publish
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::SharingConfig;

    fn session(interval: u64, last: Option<i64>) -> SharingSession {
        let mut session = SharingSession::from_config(
            &SharingConfig {
                share_code: "my-code".into(),
                password: "secret1".into(),
                update_interval: interval,
                auto_stop_minutes: None,
            },
            0,
        );
        session.last_update_time = last;
        session
    }

    #[test]
    fn first_publish_is_never_throttled() {
        assert_eq!(decide(&session(600, None), 0), ThrottleDecision::Publish);
    }

    #[test]
    fn half_interval_skips() {
        let t = 1_700_000_000_000;
        assert_eq!(
            decide(&session(600, Some(t)), t + 300_000),
            ThrottleDecision::Skip { remaining_ms: 300_000 }
        );
    }

    #[test]
    fn full_interval_publishes() {
        let t = 1_700_000_000_000;
        assert_eq!(decide(&session(600, Some(t)), t + 600_000), ThrottleDecision::Publish);
        assert_eq!(decide(&session(600, Some(t)), t + 900_000), ThrottleDecision::Publish);
    }

    #[test]
    fn clock_moving_backwards_skips() {
        let t = 1_000_000;
        assert!(matches!(
            decide(&session(60, Some(t)), t - 5_000),
            ThrottleDecision::Skip { .. }
        ));
    }
}
