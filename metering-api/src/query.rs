use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("invalid {field} timestamp {value:?}: {source}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },

    #[error("unknown level {0:?}")]
    UnknownLevel(String),

    #[error("{0}")]
    InvalidParameters(String),
}

/// Resource scope at which metering results are aggregated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Cluster,
    Node,
    Workspace,
    Namespace,
    Application,
    Openpitrix,
    Workload,
    Service,
    Pod,
    Container,
    Pvc,
    Component,
    Ingress,
}

impl Level {
    /// Level used for per-resource hierarchy breakdowns.
    pub const LEAF: Level = Level::Pod;

    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Cluster => "cluster",
            Level::Node => "node",
            Level::Workspace => "workspace",
            Level::Namespace => "namespace",
            Level::Application => "application",
            Level::Openpitrix => "openpitrix",
            Level::Workload => "workload",
            Level::Service => "service",
            Level::Pod => "pod",
            Level::Container => "container",
            Level::Pvc => "pvc",
            Level::Component => "component",
            Level::Ingress => "ingress",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = QueryError;

    /// Accepts both `pod` and `LevelPod`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let name = lowered.strip_prefix("level").unwrap_or(&lowered);

        let level = match name {
            "cluster" => Level::Cluster,
            "node" => Level::Node,
            "workspace" => Level::Workspace,
            "namespace" => Level::Namespace,
            "application" => Level::Application,
            "openpitrix" => Level::Openpitrix,
            "workload" => Level::Workload,
            "service" => Level::Service,
            "pod" => Level::Pod,
            "container" => Level::Container,
            "pvc" => Level::Pvc,
            "component" => Level::Component,
            "ingress" => Level::Ingress,
            _ => return Err(QueryError::UnknownLevel(s.to_string())),
        };
        Ok(level)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Query,
    Export,
}

impl Operation {
    /// Only the literal `export` selects export mode.
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("export") => Operation::Export,
            _ => Operation::Query,
        }
    }
}

/// Query string parameters as sent by the caller.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawQuery {
    pub level: Option<String>,
    pub operation: Option<String>,
    pub time: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub step: Option<String>,
    pub metrics_filter: Option<String>,
    pub resources_filter: Option<String>,
    pub cluster: Option<String>,
    pub workspace: Option<String>,
    pub namespace: Option<String>,
    pub node: Option<String>,
    pub kind: Option<String>,
    pub workload: Option<String>,
    pub pod: Option<String>,
    pub applications: Option<String>,
    pub services: Option<String>,
    pub storageclass: Option<String>,
    pub pvc_filter: Option<String>,
    #[serde(rename = "labelSelector")]
    pub label_selector: Option<String>,
    pub sort_metric: Option<String>,
    pub sort_type: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Resource selectors passed through to the engine untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Filters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storageclass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvc_filter: Option<String>,
    #[serde(rename = "labelSelector", skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

/// Normalized metering query, built once per request.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Query {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(flatten)]
    pub filters: Filters,
}

impl Query {
    /// Normalizes raw parameters. Empty values count as absent.
    pub fn parse(raw: RawQuery) -> Result<Self, QueryError> {
        let level = non_empty(raw.level)
            .map(|level| level.parse::<Level>())
            .transpose()?;

        Ok(Query {
            level,
            operation: Operation::parse(non_empty(raw.operation).as_deref()),
            time: non_empty(raw.time),
            start: non_empty(raw.start),
            end: non_empty(raw.end),
            step: non_empty(raw.step),
            filters: Filters {
                metrics_filter: non_empty(raw.metrics_filter),
                resources_filter: non_empty(raw.resources_filter),
                cluster: non_empty(raw.cluster),
                workspace: non_empty(raw.workspace),
                namespace: non_empty(raw.namespace),
                node: non_empty(raw.node),
                kind: non_empty(raw.kind),
                workload: non_empty(raw.workload),
                pod: non_empty(raw.pod),
                applications: non_empty(raw.applications),
                services: non_empty(raw.services),
                storageclass: non_empty(raw.storageclass),
                pvc_filter: non_empty(raw.pvc_filter),
                label_selector: non_empty(raw.label_selector),
                sort_metric: non_empty(raw.sort_metric),
                sort_type: non_empty(raw.sort_type),
                page: non_empty(raw.page),
                limit: non_empty(raw.limit),
            },
        })
    }

    pub fn is_export(&self) -> bool {
        self.operation == Operation::Export
    }

    /// Parses `start` and `end` as base-10 epoch seconds.
    ///
    /// A missing bound fails the same way an unparsable one does.
    pub fn export_window(&self) -> Result<TimeWindow, QueryError> {
        let start = parse_epoch("start", self.start.as_deref())?;
        let end = parse_epoch("end", self.end.as_deref())?;
        Ok(TimeWindow { start, end })
    }
}

/// Inclusive export interval in seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start as f64 && timestamp <= self.end as f64
    }
}

fn parse_epoch(field: &'static str, value: Option<&str>) -> Result<i64, QueryError> {
    let value = value.unwrap_or_default();
    value
        .parse::<i64>()
        .map_err(|source| QueryError::InvalidTimestamp {
            field,
            value: value.to_string(),
            source,
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
