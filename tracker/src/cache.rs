//! TTL-bounded cache of tracking records.

use crate::config::CacheConfig;
use crate::errors::CacheError;
use crate::models::{TrackKey, TrackRecord};
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Store for tracking records, keyed by tracking code.
///
/// `Ok(None)` is a miss. Implementations must bound the time any single
/// operation can take; a dispatcher is never allowed to hang on a cache
/// write.
#[async_trait]
pub trait TrackCache: Send + Sync {
    async fn get_track_data(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> Result<Option<TrackRecord>, CacheError>;

    async fn set_track_data(
        &self,
        cancel: &CancellationToken,
        key: &str,
        record: &TrackRecord,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn health(&self, cancel: &CancellationToken) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct CachedRecord {
    record: Arc<TrackRecord>,
    ttl: Duration,
}

/// Expires each entry `ttl` after insertion; the TTL rides along with the
/// value so callers can vary it per write.
struct PerEntryTtl;

impl Expiry<TrackKey, CachedRecord> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &TrackKey,
        value: &CachedRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backed by moka.
pub struct InMemoryTrackCache {
    entries: Cache<TrackKey, CachedRecord>,
}

impl InMemoryTrackCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { entries }
    }
}

#[async_trait]
impl TrackCache for InMemoryTrackCache {
    async fn get_track_data(
        &self,
        _cancel: &CancellationToken,
        key: &str,
    ) -> Result<Option<TrackRecord>, CacheError> {
        Ok(self
            .entries
            .get(key)
            .await
            .map(|entry| (*entry.record).clone()))
    }

    async fn set_track_data(
        &self,
        _cancel: &CancellationToken,
        key: &str,
        record: &TrackRecord,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries
            .insert(
                key.to_string(),
                CachedRecord {
                    record: Arc::new(record.clone()),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn health(&self, _cancel: &CancellationToken) -> Result<(), CacheError> {
        Ok(())
    }
}
