//! Prometheus metrics exposition
//!
//! - `track_requests_total` (counter): labels `carrier`, `outcome`
//! - `track_request_duration_seconds` (histogram): label `carrier`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering
/// metrics on `/metrics`.
///
/// The duration histogram gets explicit buckets so it renders with
/// `_bucket` lines usable by `histogram_quantile()` queries. Boundaries
/// cover fast validations through retried carrier calls.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "track_request_duration_seconds".to_string(),
            ),
            &[
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one completed tracking request.
pub fn record_track_request(carrier: &str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!(
        "track_requests_total",
        "carrier" => carrier.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "track_request_duration_seconds",
        "carrier" => carrier.to_string()
    )
    .record(duration_secs);
}
