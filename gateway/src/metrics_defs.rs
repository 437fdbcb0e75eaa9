use shared::metrics_defs::{MetricDef, MetricType};

pub const TRACK_REQUESTS: MetricDef = MetricDef {
    name: "gateway.track.requests",
    metric_type: MetricType::Counter,
    description: "Number of tracking lookups received",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "gateway.request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status.",
};

pub const ALL_METRICS: &[MetricDef] = &[TRACK_REQUESTS, REQUEST_DURATION];
