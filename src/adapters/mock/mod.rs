//! Test doubles for the collaborator traits.
//!
//! - [`ManualClock`] - time that moves by hand
//! - [`MockLocationProvider`] - configurable fixes and failures
//! - [`MockScheduler`] - records registrations, fires on demand
//!
//! The in-memory store and channel in [`crate::adapters::memory`] double as
//! test fakes.

pub mod clock;
pub mod location;
pub mod scheduler;

pub use clock::ManualClock;
pub use location::MockLocationProvider;
pub use scheduler::MockScheduler;
