use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BatcherConfig {
    /// Maximum requests per dispatched batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum time a non-empty batch may sit undispatched.
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Size of the dispatcher pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum wait when posting a response to a caller's reply channel.
    #[serde(default = "default_reply_delivery_timeout_ms")]
    pub reply_delivery_timeout_ms: u64,

    /// TTL for records written to the cache after a successful fetch.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl BatcherConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn reply_delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_delivery_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Ingress queue capacity, derived from the batch size.
    pub fn ingress_capacity(&self) -> usize {
        self.batch_size * 2
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
            workers: default_workers(),
            reply_delivery_timeout_ms: default_reply_delivery_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

fn default_batch_timeout_ms() -> u64 {
    2_000
}

fn default_workers() -> usize {
    3
}

fn default_reply_delivery_timeout_ms() -> u64 {
    100
}

fn default_cache_ttl_secs() -> u64 {
    300
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> u64 {
    10_000
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    pub base_url: String,

    /// Whole-cycle timeout for one batch fetch.
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upstream_timeout_secs() -> u64 {
    60
}
