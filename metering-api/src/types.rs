//! Result documents returned by the metering engine.
//!
//! The API forwards [`MeteringResult`] and [`HierarchyResult`] as they came
//! from the engine. Only the export renderer looks inside a metering result,
//! through the [`Metrics`] view.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated metering result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeteringResult(pub serde_json::Value);

impl MeteringResult {
    /// Decodes the parts of the result the CSV export needs.
    pub fn metrics(&self) -> Result<Metrics, serde_json::Error> {
        Metrics::deserialize(&self.0)
    }
}

/// Per-resource breakdown returned for hierarchy queries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HierarchyResult(pub serde_json::Value);

/// Typed view over a [`MeteringResult`]. Fields the export does not use are
/// ignored.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Metrics {
    #[serde(default)]
    pub results: Vec<Metric>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub metric_name: String,
    #[serde(rename = "data", default)]
    pub metric_data: MetricData,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MetricData {
    #[serde(rename = "result", default)]
    pub metric_values: Vec<MetricValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MetricValue {
    #[serde(rename = "metric", default)]
    pub metadata: BTreeMap<String, String>,
    // Instant vector sample
    #[serde(rename = "value", default)]
    pub sample: Option<Point>,
    // Range vector
    #[serde(rename = "values", default)]
    pub series: Vec<Point>,
    #[serde(default)]
    pub resource_unit: Option<String>,
}

/// A single `[timestamp, value]` observation, timestamp in epoch seconds.
///
/// Either element may be a JSON number or a numeric string.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Point(
    #[serde(deserialize_with = "number")] pub f64,
    #[serde(deserialize_with = "number")] pub f64,
);

impl Point {
    pub fn timestamp(&self) -> f64 {
        self.0
    }

    pub fn value(&self) -> f64 {
        self.1
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Number::deserialize(deserializer)? {
        Number::Float(v) => Ok(v),
        Number::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
