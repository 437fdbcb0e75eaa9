//! HTTP ingress for the tracking service.
//!
//! Thin boundary layer: route matching, key validation, and the mapping of
//! response error strings onto HTTP statuses. All tracking semantics live in
//! the `tracker` crate.

pub mod config;
pub mod metrics_defs;
mod service;

pub use service::GatewayService;

use crate::config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracker::cache::InMemoryTrackCache;
use tracker::client::HttpTrackSource;
use tracker::errors::ServiceError;
use tracker::service::TrackingService;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tracking service error: {0}")]
    Service(#[from] ServiceError),
}

/// Starts the tracking facade and serves HTTP until `shutdown` is cancelled
/// or an interrupt arrives.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), GatewayError> {
    let cache = Arc::new(InMemoryTrackCache::new(&config.cache));
    let source = Arc::new(HttpTrackSource::new(&config.upstream));
    let tracking = Arc::new(TrackingService::new(config.batcher.clone(), cache, source));

    tracking.start(shutdown.child_token())?;

    let gateway = GatewayService::new(tracking.clone());

    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        "gateway listening"
    );

    let server = shared::http::run_http_service(
        &config.listener.host,
        config.listener.port,
        gateway,
        shutdown.clone(),
    );
    tokio::pin!(server);

    let result = tokio::select! {
        served = &mut server => served,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            shutdown.cancel();
            server.await
        }
    };

    if let Err(error) = tracking.stop() {
        tracing::warn!(error = %error, "stopping tracking service failed");
    }

    result
}
