use super::reject_body;
use crate::models::{LegacyDiabetesResponse, PredictionResponse};
use crate::pipeline::{DiseaseType, InputShape, PredictError, PredictionResult, RawInput};
use crate::services::metrics::{record_prediction, PredictionOutcome};
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use service_core::error::AppError;

impl From<PredictError> for AppError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Encode(e) => AppError::BadRequest(anyhow::Error::new(e)),
            PredictError::ModelUnavailable { disease, reason } => {
                tracing::error!(disease_type = %disease, reason = %reason, "Prediction requested for unavailable domain");
                AppError::ModelUnavailable(disease.to_string())
            }
            // Shape mismatches mean the loaded artifacts disagree, not bad input.
            PredictError::Scale(e) => AppError::InternalError(anyhow::Error::new(e)),
            PredictError::Inference(e) => AppError::InternalError(anyhow::Error::new(e)),
        }
    }
}

fn outcome_of(result: &Result<PredictionResult, PredictError>) -> PredictionOutcome {
    match result {
        Ok(r) if r.is_positive() => PredictionOutcome::Positive,
        Ok(_) => PredictionOutcome::Negative,
        Err(PredictError::Encode(_)) => PredictionOutcome::InvalidInput,
        Err(PredictError::ModelUnavailable { .. }) => PredictionOutcome::Unavailable,
        Err(_) => PredictionOutcome::Error,
    }
}

fn run(
    state: &AppState,
    disease: DiseaseType,
    input: &RawInput,
    shape: InputShape,
) -> Result<PredictionResult, AppError> {
    let result = state.registry.predict(disease, input, shape);
    record_prediction(disease, outcome_of(&result));

    let result = result?;
    tracing::info!(
        disease_type = %disease,
        label = result.label,
        probability = result.probability,
        "Prediction served"
    );
    Ok(result)
}

fn disease_type(fields: &Map<String, Value>) -> Result<DiseaseType, AppError> {
    match fields.get("disease_type") {
        None | Some(Value::Null) => Err(AppError::BadRequest(anyhow::anyhow!(
            "Missing 'disease_type' field"
        ))),
        Some(Value::String(tag)) => tag
            .parse()
            .map_err(|e| AppError::BadRequest(anyhow::Error::new(e))),
        Some(other) => Err(AppError::BadRequest(anyhow::anyhow!(
            "'disease_type' must be a string, got {}",
            other
        ))),
    }
}

/// Multi-domain prediction, dispatched on `disease_type`.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>, AppError> {
    let Json(body) = payload.map_err(reject_body)?;
    let Value::Object(fields) = body else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Request body must be a JSON object"
        )));
    };

    let disease = disease_type(&fields)?;
    let input = RawInput::from(fields);
    let result = run(&state, disease, &input, InputShape::Form)?;

    Ok(Json(PredictionResponse::new(disease.definition(), &result)))
}

/// Diabetes-only endpoint kept for clients of the first API version. Those
/// clients may send schema columns directly, one-hot flags included.
pub async fn predict_diabetes(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<LegacyDiabetesResponse>, AppError> {
    let fields = match payload {
        Ok(Json(Value::Object(fields))) => fields,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(AppError::PayloadTooLarge)
        }
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Request must be JSON"
            )))
        }
    };

    let disease = DiseaseType::Diabetes;
    let result = run(
        &state,
        disease,
        &RawInput::from(fields),
        InputShape::FormWithColumns,
    )?;

    Ok(Json(LegacyDiabetesResponse::new(disease.definition(), &result)))
}
