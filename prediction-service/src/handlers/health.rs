use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;
use serde_json::{json, Map, Value};

/// Liveness. Always 200; `status` is `degraded` while any domain is
/// unavailable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.registry.status();
    let all_ready = status.iter().all(|(_, ready)| *ready);

    let domains: Map<String, Value> = status
        .into_iter()
        .map(|(disease, ready)| {
            let value = if ready { "ready" } else { "unavailable" };
            (disease.to_string(), Value::from(value))
        })
        .collect();

    Json(json!({
        "status": if all_ready { "ok" } else { "degraded" },
        "service": "prediction-service",
        "version": env!("CARGO_PKG_VERSION"),
        "domains": domains
    }))
}

/// Readiness: at least one domain can serve predictions.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    if state.registry.any_ready() {
        Ok(StatusCode::OK)
    } else {
        Err(AppError::ServiceUnavailable)
    }
}
