//! Time source abstraction.

/// A source of "now" in epoch milliseconds.
///
/// The throttle, auto-stop deadline and rate-limiter window all read time
/// through this trait so tests can move time by hand.
pub trait Clock: Send + Sync {
    /// Current time, epoch milliseconds.
    fn now_ms(&self) -> i64;
}
