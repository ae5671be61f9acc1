//! Metrics definitions for the aggregation engine.

use shared::metrics_defs::{MetricDef, MetricType};

pub const AGGREGATION_DURATION: MetricDef = MetricDef {
    name: "aggregation.duration",
    metric_type: MetricType::Histogram,
    description: "Time to execute one request graph in seconds",
};

pub const NODE_FAILURES: MetricDef = MetricDef {
    name: "aggregation.node_failures",
    metric_type: MetricType::Counter,
    description: "Number of nodes whose upstream call failed",
};

pub const NODES_SKIPPED: MetricDef = MetricDef {
    name: "aggregation.nodes_skipped",
    metric_type: MetricType::Counter,
    description: "Number of nodes skipped because a prerequisite failed",
};

pub const AGGREGATIONS_ABORTED: MetricDef = MetricDef {
    name: "aggregation.aborted",
    metric_type: MetricType::Counter,
    description: "Number of runs abandoned after a required node failed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    AGGREGATION_DURATION,
    NODE_FAILURES,
    NODES_SKIPPED,
    AGGREGATIONS_ABORTED,
];
