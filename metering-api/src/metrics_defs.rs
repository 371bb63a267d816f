//! Metrics definitions for the metering API.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "metering_api.requests",
    metric_type: MetricType::Counter,
    description: "Requests received, tagged by endpoint",
};

pub const REQUEST_FORBIDDEN: MetricDef = MetricDef {
    name: "metering_api.requests.forbidden",
    metric_type: MetricType::Counter,
    description: "Requests rejected because no user identity was present",
};

pub const REQUEST_REJECTED: MetricDef = MetricDef {
    name: "metering_api.requests.rejected",
    metric_type: MetricType::Counter,
    description: "Requests answered with 400, tagged by endpoint and error kind",
};

pub const ENGINE_DURATION: MetricDef = MetricDef {
    name: "metering_api.engine.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent waiting for the metering engine in seconds",
};

pub const EXPORT_ROWS: MetricDef = MetricDef {
    name: "metering_api.export.rows",
    metric_type: MetricType::Histogram,
    description: "Number of data rows written per CSV export",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    REQUEST_FORBIDDEN,
    REQUEST_REJECTED,
    ENGINE_DURATION,
    EXPORT_ROWS,
];
