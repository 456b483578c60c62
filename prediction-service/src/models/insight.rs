use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct InsightRequest {
    #[validate(length(min = 1, message = "Prompt is required"))]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct InsightResponse {
    pub insight: String,
}
