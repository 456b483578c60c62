use crate::pipeline::{DomainDefinition, PredictionResult};
use serde::Serialize;

/// Body of a successful `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    /// `"Prediction: <label>"`.
    pub prediction_text: String,
    /// Positive-class probability as a percentage with two decimals.
    pub probability: String,
}

impl PredictionResponse {
    pub fn new(definition: &DomainDefinition, result: &PredictionResult) -> Self {
        Self {
            prediction_text: format!("Prediction: {}", definition.label(result.is_positive())),
            probability: format!("{:.2}%", result.probability * 100.0),
        }
    }
}

/// Body of a successful `POST /predict_diabetes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyDiabetesResponse {
    pub prediction: String,
    pub probability_of_diabetes: f64,
}

impl LegacyDiabetesResponse {
    pub fn new(definition: &DomainDefinition, result: &PredictionResult) -> Self {
        Self {
            prediction: definition.label(result.is_positive()).to_string(),
            probability_of_diabetes: (result.probability * 10_000.0).round() / 10_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DiseaseType;

    #[test]
    fn test_prediction_response_format() {
        let result = PredictionResult::from_probability(0.732);
        let response = PredictionResponse::new(DiseaseType::HeartDisease.definition(), &result);

        assert_eq!(response.prediction_text, "Prediction: Heart Disease");
        assert_eq!(response.probability, "73.20%");
    }

    #[test]
    fn test_threshold_boundary_is_positive() {
        let result = PredictionResult::from_probability(0.5);
        let response = PredictionResponse::new(DiseaseType::Diabetes.definition(), &result);

        assert_eq!(response.prediction_text, "Prediction: Diabetes");
        assert_eq!(response.probability, "50.00%");
    }

    #[test]
    fn test_legacy_probability_is_rounded() {
        let result = PredictionResult::from_probability(0.123456);
        let response = LegacyDiabetesResponse::new(DiseaseType::Diabetes.definition(), &result);

        assert_eq!(response.prediction, "No Diabetes");
        assert_eq!(response.probability_of_diabetes, 0.1235);
    }
}
