use std::sync::OnceLock;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Installs the Prometheus recorder once per process. A no-op when the exporter is disabled.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()?;
    if PROM_HANDLE.set(handle).is_err() {
        tracing::debug!("Prometheus recorder already installed");
    }

    describe();
    Ok(())
}

fn describe() {
    describe_counter!("http_requests_total", "HTTP requests by route, method and status");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency by route, method and status"
    );
    describe_counter!("exam_attempts_started_total", "Exam attempts created");
    describe_counter!("exam_submissions_total", "Attempt submissions by outcome and trigger");
    describe_counter!(
        "expired_attempts_submitted_total",
        "Attempts submitted by the sweeper after their time limit"
    );
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
