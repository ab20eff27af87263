//! Process configuration
//!
//! Loaded once at startup and passed to the processor explicitly.

use crate::client::{FirehoseClient, FirehoseClientConfig};
use crate::contracts::ChannelConfig;
use crate::error::{Result, RouterError};

pub const BLOCK_STREAM_ENV: &str = "BLOCK_DELIVERY_STREAM_NAME";
pub const COUNT_STREAM_ENV: &str = "COUNT_DELIVERY_STREAM_NAME";
pub const DELIVERY_ENDPOINT_ENV: &str = "DELIVERY_ENDPOINT_URL";
pub const DELIVERY_TIMEOUT_ENV: &str = "DELIVERY_TIMEOUT_MS";

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Delivery stream names for the block and count channels
    pub channels: ChannelConfig,

    /// Delivery transport settings
    pub delivery: FirehoseClientConfig,
}

impl RouterConfig {
    pub fn new(channels: ChannelConfig) -> Self {
        Self {
            channels,
            delivery: FirehoseClientConfig::default(),
        }
    }

    /// Set the delivery endpoint
    pub fn with_endpoint(mut self, endpoint_url: impl Into<String>) -> Self {
        self.delivery.endpoint_url = endpoint_url.into();
        self
    }

    /// Set the delivery timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.delivery.timeout_ms = timeout_ms;
        self
    }

    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = FirehoseClientConfig::default();

        let timeout_ms = match lookup(DELIVERY_TIMEOUT_ENV) {
            Some(v) => v.parse().map_err(|_| {
                RouterError::config(format!("{} must be an integer, got {:?}", DELIVERY_TIMEOUT_ENV, v))
            })?,
            None => defaults.timeout_ms,
        };

        let config = Self {
            channels: ChannelConfig::new(
                lookup(BLOCK_STREAM_ENV).unwrap_or_default(),
                lookup(COUNT_STREAM_ENV).unwrap_or_default(),
            ),
            delivery: FirehoseClientConfig {
                endpoint_url: lookup(DELIVERY_ENDPOINT_ENV).unwrap_or(defaults.endpoint_url),
                timeout_ms,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Build the HTTP delivery client for these settings
    pub fn firehose_client(&self) -> Result<FirehoseClient> {
        Ok(FirehoseClient::with_config(self.delivery.clone())?)
    }

    /// Reject configurations the router cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.channels.block_stream.trim().is_empty() {
            return Err(RouterError::config(format!("{} must be set", BLOCK_STREAM_ENV)));
        }
        if self.channels.count_stream.trim().is_empty() {
            return Err(RouterError::config(format!("{} must be set", COUNT_STREAM_ENV)));
        }
        let endpoint = &self.delivery.endpoint_url;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(RouterError::config(format!(
                "{} must be an http(s) URL, got {:?}",
                DELIVERY_ENDPOINT_ENV, endpoint
            )));
        }
        if self.delivery.timeout_ms == 0 {
            return Err(RouterError::config(format!(
                "{} must be greater than zero",
                DELIVERY_TIMEOUT_ENV
            )));
        }
        Ok(())
    }
}
