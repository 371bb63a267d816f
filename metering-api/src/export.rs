//! CSV export of metering results over a time window.

use crate::metrics_defs::EXPORT_ROWS;
use crate::query::TimeWindow;
use crate::types::{MeteringResult, Metrics, Point};
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat};
use http::StatusCode;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use shared::histogram;
use std::io::Write;

const HEADER: [&str; 5] = ["metric_name", "labels", "timestamp", "value", "unit"];

/// Writes every point of `metrics` that falls inside `window` as one CSV row.
///
/// Returns the number of data rows written.
pub fn write_csv<W: Write>(
    sink: W,
    metrics: &Metrics,
    window: &TimeWindow,
) -> Result<usize, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink);
    writer.write_record(HEADER)?;

    let mut rows = 0;
    for metric in &metrics.results {
        for value in &metric.metric_data.metric_values {
            let labels = value
                .metadata
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(";");
            let unit = value.resource_unit.as_deref().unwrap_or_default();

            let points = value.sample.iter().chain(value.series.iter());
            for point in points.filter(|p| window.contains(p.timestamp())) {
                writer.write_record([
                    metric.metric_name.as_str(),
                    labels.as_str(),
                    format_timestamp(point).as_str(),
                    point.value().to_string().as_str(),
                    unit,
                ])?;
                rows += 1;
            }
        }
    }

    writer.flush()?;
    Ok(rows)
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("undecodable metering result: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not write csv: {0}")]
    Write(#[from] csv::Error),
}

fn render(
    result: &MeteringResult,
    window: &TimeWindow,
) -> Result<(usize, Vec<u8>), ExportError> {
    let metrics = result.metrics()?;
    let mut body = Vec::new();
    let rows = write_csv(&mut body, &metrics, window)?;
    Ok((rows, body))
}

/// Builds the complete export response. The caller must not write anything
/// else for this request.
pub fn export_response(result: &MeteringResult, window: &TimeWindow) -> Response {
    let (rows, body) = match render(result, window) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::error!(error = %e, "failed to render metering export");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    histogram!(EXPORT_ROWS).record(rows as f64);

    let disposition = format!(
        "attachment; filename=\"metering-{}-{}.csv\"",
        window.start, window.end
    );
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from(body),
    )
        .into_response()
}

fn format_timestamp(point: &Point) -> String {
    let ts = point.timestamp();
    let secs = ts.floor() as i64;
    let nanos = ((ts - ts.floor()) * 1e9).round() as u32;

    match DateTime::from_timestamp(secs, nanos.min(999_999_999)) {
        Some(time) => time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metric, MetricData, MetricValue};
    use axum::body::to_bytes;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn metrics() -> Metrics {
        Metrics {
            results: vec![Metric {
                metric_name: "meter_pod_cpu_usage".into(),
                metric_data: MetricData {
                    metric_values: vec![MetricValue {
                        metadata: BTreeMap::from([
                            ("pod".to_string(), "web-0".to_string()),
                            ("namespace".to_string(), "demo".to_string()),
                        ]),
                        series: vec![
                            Point(900.0, 0.1),
                            Point(1000.0, 0.25),
                            Point(1500.5, 0.5),
                            Point(2000.0, 0.75),
                            Point(2100.0, 1.0),
                        ],
                        resource_unit: Some("cores".into()),
                        ..Default::default()
                    }],
                },
            }],
        }
    }

    fn to_csv(metrics: &Metrics, window: TimeWindow) -> (usize, String) {
        let mut sink = Vec::new();
        let rows = write_csv(&mut sink, metrics, &window).unwrap();
        (rows, String::from_utf8(sink).unwrap())
    }

    #[test]
    fn test_rows_limited_to_window() {
        let (rows, csv) = to_csv(&metrics(), TimeWindow { start: 1000, end: 2000 });

        assert_eq!(rows, 3);
        assert_eq!(
            csv,
            "metric_name,labels,timestamp,value,unit\n\
             meter_pod_cpu_usage,namespace=demo;pod=web-0,1970-01-01T00:16:40Z,0.25,cores\n\
             meter_pod_cpu_usage,namespace=demo;pod=web-0,1970-01-01T00:25:00.500Z,0.5,cores\n\
             meter_pod_cpu_usage,namespace=demo;pod=web-0,1970-01-01T00:33:20Z,0.75,cores\n"
        );
    }

    #[test]
    fn test_sample_and_escaping() {
        let metrics = Metrics {
            results: vec![Metric {
                metric_name: "meter_workspace_cost".into(),
                metric_data: MetricData {
                    metric_values: vec![MetricValue {
                        metadata: BTreeMap::from([(
                            "workspace".to_string(),
                            "team \"a\", b".to_string(),
                        )]),
                        sample: Some(Point(1200.0, 3.5)),
                        ..Default::default()
                    }],
                },
            }],
        };

        let (rows, csv) = to_csv(&metrics, TimeWindow { start: 1000, end: 2000 });
        assert_eq!(rows, 1);
        assert!(csv.ends_with(
            "meter_workspace_cost,\"workspace=team \"\"a\"\", b\",1970-01-01T00:20:00Z,3.5,\n"
        ));
    }

    #[test]
    fn test_empty_window() {
        let (rows, csv) = to_csv(&metrics(), TimeWindow { start: 2000, end: 1000 });
        assert_eq!(rows, 0);
        assert_eq!(csv, "metric_name,labels,timestamp,value,unit\n");
    }

    #[tokio::test]
    async fn test_export_response_headers() {
        let result = MeteringResult(json!({
            "results": [{
                "metric_name": "meter_pod_cpu_usage",
                "data": {
                    "resultType": "matrix",
                    "result": [{
                        "metric": {"pod": "web-0"},
                        "values": [[1000, "0.25"], [2500, "1"]]
                    }]
                }
            }]
        }));
        let response = export_response(&result, &TimeWindow { start: 1000, end: 2000 });

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"metering-1000-2000.csv\""
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            String::from_utf8_lossy(&body),
            "metric_name,labels,timestamp,value,unit\n\
             meter_pod_cpu_usage,pod=web-0,1970-01-01T00:16:40Z,0.25,\n"
        );
    }

    #[test]
    fn test_undecodable_result_is_server_error() {
        let result = MeteringResult(json!({"results": "not a list"}));
        let response = export_response(&result, &TimeWindow { start: 1000, end: 2000 });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
