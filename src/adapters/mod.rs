//! Concrete implementations of the collaborator traits.
//!
//! - [`RedisStore`] - key-value store on Redis
//! - [`RedisChannel`] - share channel on Redis
//! - [`InMemoryStore`] / [`InMemoryChannel`] - process-local variants
//! - [`TokioScheduler`] - periodic tasks on the Tokio runtime
//! - [`ReportedLocationProvider`] - fixes pushed by the device
//! - [`SystemClock`] - wall-clock time
//!
//! Test doubles live in [`mock`].

pub mod memory;
pub mod mock;
pub mod redis_channel;
pub mod redis_store;
pub mod reported_location;
pub mod system_clock;
pub mod tokio_scheduler;

pub use memory::{InMemoryChannel, InMemoryStore};
pub use redis_channel::RedisChannel;
pub use redis_store::RedisStore;
pub use reported_location::ReportedLocationProvider;
pub use system_clock::SystemClock;
pub use tokio_scheduler::TokioScheduler;
