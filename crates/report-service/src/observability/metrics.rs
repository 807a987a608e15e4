//! Metrics definitions for the report service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `report_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! The shared token cache records `token_cache_refresh_total` and
//! `token_cache_refresh_duration_seconds` through the same recorder.
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: 4 values (known paths plus `/other`)
//! - `status`: success, error, timeout
//! - `stage`: 3 pipeline stages
//! - `error_type`: `ReportError` variants
//! - `operation`: `list_clients`, `list_actions`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle for `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("report_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // A build is one token lookup plus two upstream calls
        .set_buckets_for_metric(
            Matcher::Prefix("report_build".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set report build buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("report_management_request".to_string()),
            &[0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set Management API buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("token_cache_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set token refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `report_http_requests_total`, `report_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("report_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("report_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout.
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path to a bounded label.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/report/applications-actions" => "/api/report/applications-actions",
        _ => "/other",
    }
}

// ============================================================================
// Report Metrics
// ============================================================================

/// Record a report build.
///
/// Metric: `report_builds_total{status}`, `report_build_duration_seconds`,
/// and the `report_applications` gauge on success.
pub fn record_report_build(status: &'static str, applications: Option<usize>, duration: Duration) {
    histogram!("report_build_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("report_builds_total", "status" => status).increment(1);

    if let Some(count) = applications {
        #[allow(clippy::cast_precision_loss)]
        gauge!("report_applications").set(count as f64);
    }
}

/// Record one Management API call.
///
/// Metric: `report_management_requests_total{operation,status}`,
/// `report_management_request_duration_seconds{operation}`
pub fn record_management_request(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("report_management_request_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
    counter!("report_management_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a request that left the pipeline early.
///
/// Metric: `report_pipeline_failures_total{stage,error_type}`
pub fn record_pipeline_failure(stage: &'static str, error_type: &'static str) {
    counter!("report_pipeline_failures_total",
        "stage" => stage,
        "error_type" => error_type
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(403), "error");
        assert_eq!(categorize_status_code(500), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(
            normalize_endpoint("/api/report/applications-actions"),
            "/api/report/applications-actions"
        );
        assert_eq!(normalize_endpoint("/api/report/other"), "/other");
        assert_eq!(normalize_endpoint("/"), "/other");
    }

    // Recording without an installed recorder is a no-op; these exercise the
    // label construction paths.
    #[test]
    fn test_record_functions_do_not_panic() {
        record_http_request("GET", "/health", 200, Duration::from_millis(1));
        record_http_request("GET", "/unknown/path", 404, Duration::from_millis(1));
        record_report_build("success", Some(3), Duration::from_millis(120));
        record_report_build("error", None, Duration::from_millis(40));
        record_management_request("list_clients", "success", Duration::from_millis(80));
        record_management_request("list_actions", "error", Duration::from_millis(10));
        record_pipeline_failure("authorization", "authorization");
    }
}
