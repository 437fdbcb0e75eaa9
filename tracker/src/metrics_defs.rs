//! Metrics definitions for the tracking core.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "track_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of lookups served from cache",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "track_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of lookups that fell through to the batcher",
};

pub const BATCH_DISPATCHED: MetricDef = MetricDef {
    name: "batcher.batch.dispatched",
    metric_type: MetricType::Counter,
    description: "Number of batches handed to a dispatcher",
};

pub const BATCH_SIZE: MetricDef = MetricDef {
    name: "batcher.batch.size",
    metric_type: MetricType::Histogram,
    description: "Number of requests in a dispatched batch",
};

pub const BATCH_FETCH_DURATION: MetricDef = MetricDef {
    name: "batcher.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Upstream batch fetch duration in seconds",
};

pub const SUBMIT_REJECTED: MetricDef = MetricDef {
    name: "batcher.submit.rejected",
    metric_type: MetricType::Counter,
    description: "Submissions rejected before accumulation. Tagged with reason.",
};

// TODO: generate this table with a macro instead of listing by hand.
pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    BATCH_DISPATCHED,
    BATCH_SIZE,
    BATCH_FETCH_DURATION,
    SUBMIT_REJECTED,
];
