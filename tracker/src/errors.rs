use thiserror::Error;

/// Errors reported by an upstream tracking source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no tracking codes provided")]
    EmptyBatch,

    #[error("invalid tracking code format: {0}")]
    InvalidCode(String),

    #[error("upstream request failed: {0}")]
    RequestFailed(String),

    #[error("upstream timeout for {0}")]
    Timeout(String),

    #[error("failed to parse upstream response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Caller-attributable errors are shown to the caller verbatim; everything
    /// else is masked behind the canonical unavailable message.
    pub fn is_client_error(&self) -> bool {
        matches!(self, FetchError::EmptyBatch | FetchError::InvalidCode(_))
    }
}

/// Errors from a cache backend. The facade treats any of these as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BatcherError {
    #[error("batcher already started")]
    AlreadyStarted,

    #[error("batcher ingress queue blocked")]
    QueueBlocked,

    #[error("health probe cancelled")]
    ProbeCancelled,
}

/// Lifecycle and health errors surfaced by the tracking service facade.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("service is already running")]
    AlreadyRunning,

    #[error("service is not running")]
    NotRunning,

    #[error("failed to start batcher: {0}")]
    BatcherStart(#[from] BatcherError),

    #[error("failed to stop batcher: {0}")]
    BatcherStop(BatcherError),

    #[error("batcher health check failed: {0}")]
    BatcherUnhealthy(BatcherError),

    #[error("cache health check failed: {0}")]
    CacheUnhealthy(CacheError),
}
