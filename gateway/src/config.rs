use serde::Deserialize;
use tracker::config::{BatcherConfig, CacheConfig, UpstreamConfig};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    pub listener: Listener,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub batcher: BatcherConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}
