//! Tracking service facade: cache probe, lifecycle, batcher delegation.

use crate::batcher::Batcher;
use crate::cache::TrackCache;
use crate::client::TrackSource;
use crate::config::BatcherConfig;
use crate::errors::ServiceError;
use crate::metrics_defs::{CACHE_HIT, CACHE_MISS};
use crate::models::TrackResponse;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct TrackingService {
    batcher: Batcher,
    cache: Arc<dyn TrackCache>,
    active: RwLock<bool>,
}

impl TrackingService {
    pub fn new(
        config: BatcherConfig,
        cache: Arc<dyn TrackCache>,
        source: Arc<dyn TrackSource>,
    ) -> Self {
        let batcher = Batcher::new(config, cache.clone(), source);

        Self {
            batcher,
            cache,
            active: RwLock::new(false),
        }
    }

    /// Resolves one tracking key. Exactly one [`TrackResponse`] arrives on
    /// the returned receiver: immediately (inactive service, cache hit,
    /// rejection) or later from a batch dispatcher.
    pub async fn track_package(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> mpsc::Receiver<TrackResponse> {
        if !*self.active.read() {
            return prepopulated(TrackResponse::not_running());
        }

        match self.cache.get_track_data(cancel, key).await {
            Ok(Some(record)) => {
                tracing::debug!(key, "cache hit");
                metrics::counter!(CACHE_HIT.name).increment(1);
                return prepopulated(TrackResponse::success(record));
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(key, error = %error, "cache probe failed, treating as miss");
            }
        }

        metrics::counter!(CACHE_MISS.name).increment(1);
        tracing::debug!(key, "queueing for batch");
        self.batcher.submit(cancel, key.to_string())
    }

    pub fn start(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let mut active = self.active.write();
        if *active {
            return Err(ServiceError::AlreadyRunning);
        }

        self.batcher.start(cancel)?;
        *active = true;
        tracing::info!("tracking service started");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), ServiceError> {
        let mut active = self.active.write();
        if !*active {
            return Err(ServiceError::NotRunning);
        }

        self.batcher.stop().map_err(ServiceError::BatcherStop)?;
        *active = false;
        tracing::info!("tracking service stopped");
        Ok(())
    }

    /// First failure of: active flag, batcher ingress, cache backend.
    pub async fn health(&self, cancel: &CancellationToken) -> Result<(), ServiceError> {
        if !*self.active.read() {
            return Err(ServiceError::NotRunning);
        }

        self.batcher
            .health(cancel)
            .await
            .map_err(ServiceError::BatcherUnhealthy)?;
        self.cache
            .health(cancel)
            .await
            .map_err(ServiceError::CacheUnhealthy)?;
        Ok(())
    }
}

fn prepopulated(response: TrackResponse) -> mpsc::Receiver<TrackResponse> {
    let (tx, rx) = mpsc::channel(1);
    let _ = tx.try_send(response);
    rx
}
