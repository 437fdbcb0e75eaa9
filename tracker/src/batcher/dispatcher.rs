//! Batch dispatch: the upstream fetch and the per-caller response fan-out.

use super::types::BatchItem;
use crate::cache::TrackCache;
use crate::client::TrackSource;
use crate::metrics_defs::BATCH_FETCH_DURATION;
use crate::models::TrackResponse;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub(super) struct Dispatcher {
    cache: Arc<dyn TrackCache>,
    source: Arc<dyn TrackSource>,
    reply_timeout: Duration,
    cache_ttl: Duration,
}

impl Dispatcher {
    pub(super) fn new(
        cache: Arc<dyn TrackCache>,
        source: Arc<dyn TrackSource>,
        reply_timeout: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            source,
            reply_timeout,
            cache_ttl,
        }
    }

    /// Resolves one batch snapshot: a single grouped upstream fetch followed
    /// by exactly one response per accumulated request.
    pub(super) async fn process_batch(&self, items: Vec<BatchItem>) {
        if items.is_empty() {
            return;
        }

        let keys: Vec<_> = items.iter().map(|item| item.key.clone()).collect();

        // The batch completes or fails as a unit; a caller walking away must
        // not cancel the fetch shared with everyone else.
        let fetch_scope = CancellationToken::new();

        let started = Instant::now();
        let fetched = self.source.fetch_batch(&fetch_scope, &keys).await;
        metrics::histogram!(BATCH_FETCH_DURATION.name).record(started.elapsed().as_secs_f64());

        let results = match fetched {
            Ok(results) => results,
            Err(error) => {
                tracing::error!(error = %error, len = items.len(), "upstream batch fetch failed");
                let response = if error.is_client_error() {
                    TrackResponse::failure(error.to_string())
                } else {
                    TrackResponse::unavailable()
                };
                for item in &items {
                    self.deliver(item, response.clone()).await;
                }
                return;
            }
        };

        let total = items.len();
        let mut successful = 0usize;

        for item in &items {
            match results.get(&item.key) {
                Some(record) => {
                    // cache write precedes the success response
                    if let Err(error) = self
                        .cache
                        .set_track_data(&fetch_scope, &item.key, record, self.cache_ttl)
                        .await
                    {
                        tracing::warn!(key = %item.key, error = %error, "cache write failed");
                    }
                    successful += 1;
                    self.deliver(item, TrackResponse::success(record.clone()))
                        .await;
                }
                None => {
                    tracing::debug!(key = %item.key, "no record for tracking code");
                    self.deliver(item, TrackResponse::not_found()).await;
                }
            }
        }

        tracing::info!(successful, total, "batch dispatch complete");
    }

    async fn deliver(&self, item: &BatchItem, response: TrackResponse) {
        match item.reply.send_timeout(response, self.reply_timeout).await {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                tracing::warn!(key = %item.key, "reply delivery timed out, caller stalled");
            }
            Err(SendTimeoutError::Closed(_)) => {
                tracing::debug!(key = %item.key, "caller went away before delivery");
            }
        }
    }
}
