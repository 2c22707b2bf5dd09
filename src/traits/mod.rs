//! Trait abstractions for the collaborators the sharing core depends on.
//!
//! - [`KeyValueStore`] - persistent string store
//! - [`LocationProvider`] - device geolocation
//! - [`BackgroundScheduler`] - periodic tasks that outlive the foreground UI
//! - [`ChannelTransport`] - the remote publish/fetch channel
//! - [`Clock`] - time source

pub mod channel;
pub mod clock;
pub mod location;
pub mod scheduler;
pub mod store;

pub use channel::ChannelTransport;
pub use clock::Clock;
pub use location::LocationProvider;
pub use scheduler::{BackgroundScheduler, TaskCallback};
pub use store::KeyValueStore;
