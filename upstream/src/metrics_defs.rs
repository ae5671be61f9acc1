//! Metrics definitions for upstream service calls.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_CALLS: MetricDef = MetricDef {
    name: "upstream.calls",
    metric_type: MetricType::Counter,
    description: "Number of upstream calls issued",
};

pub const UPSTREAM_RETRIES: MetricDef = MetricDef {
    name: "upstream.retries",
    metric_type: MetricType::Counter,
    description: "Number of GET calls re-attempted after a transport failure",
};

pub const UPSTREAM_FAILURES: MetricDef = MetricDef {
    name: "upstream.failures",
    metric_type: MetricType::Counter,
    description: "Number of upstream calls that ultimately failed",
};

pub const ALL_METRICS: &[MetricDef] = &[UPSTREAM_CALLS, UPSTREAM_RETRIES, UPSTREAM_FAILURES];
