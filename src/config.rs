use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// The application's configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the local API listens on.
    pub bind_addr: SocketAddr,
    /// The URL of the Redis server. `None` keeps everything in memory.
    pub redis_url: Option<String>,
    /// Namespace for store and channel keys.
    pub key_prefix: String,
    /// Expiry applied to every published envelope, in seconds.
    pub channel_ttl_secs: u64,
    /// Bound on a single capture or publish, in seconds.
    pub operation_timeout_secs: u64,
    /// Reported fixes older than this are unavailable, in seconds.
    pub location_max_age_secs: u64,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a `Config` from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 127.0.0.1:3000")?;

        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());

        let key_prefix = lookup("KEY_PREFIX").unwrap_or_else(|| "journey".to_string());
        if key_prefix.is_empty() || key_prefix.contains(char::is_whitespace) {
            anyhow::bail!("KEY_PREFIX must be non-empty and contain no whitespace");
        }

        let seconds = |key: &str, default: &str| -> Result<u64> {
            let value: u64 = lookup(key)
                .unwrap_or_else(|| default.to_string())
                .parse()
                .with_context(|| format!("Invalid {}", key))?;
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", key);
            }
            Ok(value)
        };

        Ok(Self {
            bind_addr,
            redis_url,
            key_prefix,
            channel_ttl_secs: seconds("CHANNEL_TTL_SECS", "86400")?,
            operation_timeout_secs: seconds("OPERATION_TIMEOUT_SECS", "30")?,
            location_max_age_secs: seconds("LOCATION_MAX_AGE_SECS", "300")?,
        })
    }

    /// The capture/publish bound as a `Duration`.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}
