//! Request and response bodies of the HTTP API.

pub mod insight;
pub mod prediction;

pub use insight::{InsightRequest, InsightResponse};
pub use prediction::{LegacyDiabetesResponse, PredictionResponse};
