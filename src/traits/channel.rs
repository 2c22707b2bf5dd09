//! Remote channel seam.

use async_trait::async_trait;

use crate::error::Result;

/// The shared medium envelopes are published to, one channel per share code.
///
/// Channels only ever carry envelope JSON; passwords and plaintext never
/// cross this boundary.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Replaces the channel's latest envelope.
    async fn publish(&self, channel_id: &str, envelope_json: &str) -> Result<()>;

    /// `true` if nobody currently holds the channel.
    async fn check_availability(&self, channel_id: &str) -> Result<bool>;

    /// Tears the channel down. Ending an absent channel succeeds.
    async fn end_channel(&self, channel_id: &str) -> Result<()>;

    /// The latest envelope, `None` if the channel is empty.
    async fn fetch_latest(&self, channel_id: &str) -> Result<Option<String>>;
}
