use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, Uri};
use service_core::error::AppError;

pub mod health;
pub mod insight;
pub mod metrics;
pub mod predict;

pub use health::{health_check, readiness_check};
pub use insight::generate_insight;
pub use predict::{predict, predict_diabetes};

/// Map a JSON body rejection, keeping the body-limit status.
pub(crate) fn reject_body(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(anyhow::anyhow!(rejection.body_text()))
    }
}

/// Fallback for paths no route matches.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No route for {}", uri.path()))
}
