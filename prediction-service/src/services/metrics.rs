//! Metrics collection and Prometheus export.
//!
//! Installs the global recorder behind the `metrics` facade and renders it
//! for the /metrics endpoint.

use crate::pipeline::DiseaseType;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Install the Prometheus recorder. A second call is a no-op.
pub fn init_metrics() -> Result<(), BuildError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()?;

    // Lost a race with another initializer; its recorder is the live one.
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// How a prediction request ended, as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionOutcome {
    Positive,
    Negative,
    InvalidInput,
    Unavailable,
    Error,
}

impl PredictionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionOutcome::Positive => "positive",
            PredictionOutcome::Negative => "negative",
            PredictionOutcome::InvalidInput => "invalid_input",
            PredictionOutcome::Unavailable => "unavailable",
            PredictionOutcome::Error => "error",
        }
    }
}

pub fn record_prediction(disease: DiseaseType, outcome: PredictionOutcome) {
    metrics::counter!(
        "predictions_total",
        "disease_type" => disease.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_insight(status: &'static str) {
    metrics::counter!("insight_requests_total", "status" => status).increment(1);
}
