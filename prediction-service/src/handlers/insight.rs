use super::reject_body;
use crate::models::{InsightRequest, InsightResponse};
use crate::services::metrics::record_insight;
use crate::services::ProviderError;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;
use validator::Validate;

/// Proxy a free-text prompt to the generative-text provider.
pub async fn generate_insight(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<InsightRequest>, JsonRejection>,
) -> Result<Json<InsightResponse>, AppError> {
    let Json(payload) = payload.map_err(reject_body)?;
    payload.validate()?;

    if !state.insight_provider.is_configured() {
        record_insight("not_configured");
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "Insight provider credential is not configured"
        )));
    }

    let request_id = request_id.map(|Extension(RequestId(id))| id);
    match state
        .insight_provider
        .generate(&payload.prompt, request_id.as_deref())
        .await
    {
        Ok(insight) => {
            record_insight("success");
            Ok(Json(InsightResponse { insight }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Insight generation failed");
            record_insight("error");
            Err(match e {
                ProviderError::NotConfigured(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
                other => AppError::UpstreamError(other.to_string()),
            })
        }
    }
}
