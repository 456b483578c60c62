//! Per-domain pipelines, loaded once at startup and shared read-only.

use super::artifacts::{load_domain, DomainArtifacts};
use super::classifier::{infer, InferenceError, PredictionResult};
use super::domain::{DiseaseType, DomainDefinition};
use super::encoder::{copy_schema_columns, encode, EncodeError, RawInput};
use super::scaler::{scaled_columns, ScalerError};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("{disease} model is unavailable: {reason}")]
    ModelUnavailable {
        disease: DiseaseType,
        reason: String,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Scale(#[from] ScalerError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// How a request body maps onto the feature schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputShape {
    /// Form fields only, expanded through the domain definition.
    #[default]
    Form,
    /// Form fields, then any key that already names a schema column.
    FormWithColumns,
}

/// Encoder, scaler and classifier for one domain.
#[derive(Debug, Clone)]
pub struct DomainPipeline {
    definition: &'static DomainDefinition,
    artifacts: DomainArtifacts,
    scaled: Vec<&'static str>,
}

impl DomainPipeline {
    pub fn new(definition: &'static DomainDefinition, artifacts: DomainArtifacts) -> Self {
        let scaled = scaled_columns(definition.scaled_columns, &artifacts.schema);
        Self {
            definition,
            artifacts,
            scaled,
        }
    }

    pub fn definition(&self) -> &'static DomainDefinition {
        self.definition
    }

    /// Encode, scale and classify one input.
    pub fn predict(
        &self,
        input: &RawInput,
        shape: InputShape,
    ) -> Result<PredictionResult, PredictError> {
        let mut vector = encode(
            input,
            &self.artifacts.schema,
            self.definition.numeric,
            self.definition.categorical,
        )?;
        if shape == InputShape::FormWithColumns {
            copy_schema_columns(input, &mut vector)?;
        }
        self.artifacts.scaler.transform(&mut vector, &self.scaled)?;

        Ok(infer(Some(self.artifacts.classifier.as_ref()), &vector)?)
    }
}

#[derive(Debug, Clone)]
pub enum DomainSlot {
    Ready(DomainPipeline),
    Unavailable { reason: String },
}

impl DomainSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, DomainSlot::Ready(_))
    }
}

/// Immutable map of every known domain to its pipeline or the reason it
/// could not be loaded.
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    slots: HashMap<DiseaseType, DomainSlot>,
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl DomainRegistry {
    /// Every domain unavailable.
    pub fn empty() -> Self {
        let slots = DiseaseType::ALL
            .into_iter()
            .map(|disease| {
                (
                    disease,
                    DomainSlot::Unavailable {
                        reason: "not loaded".to_string(),
                    },
                )
            })
            .collect();
        Self { slots }
    }

    /// Load every domain from `dir`. A domain that fails to load is marked
    /// unavailable; the others are unaffected.
    pub fn load(dir: &Path) -> Self {
        let mut registry = Self::empty();

        for disease in DiseaseType::ALL {
            match load_domain(dir, disease) {
                Ok(artifacts) => {
                    tracing::info!(
                        disease_type = %disease,
                        features = artifacts.schema.len(),
                        "Loaded model artifacts"
                    );
                    registry = registry.with_domain(disease, artifacts);
                }
                Err(e) => {
                    tracing::error!(
                        disease_type = %disease,
                        dir = %dir.display(),
                        error = %e,
                        "Failed to load model artifacts, domain unavailable"
                    );
                    registry.slots.insert(
                        disease,
                        DomainSlot::Unavailable {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        registry
    }

    /// Install already-loaded artifacts for `disease`.
    pub fn with_domain(mut self, disease: DiseaseType, artifacts: DomainArtifacts) -> Self {
        self.slots.insert(
            disease,
            DomainSlot::Ready(DomainPipeline::new(disease.definition(), artifacts)),
        );
        self
    }

    pub fn slot(&self, disease: DiseaseType) -> &DomainSlot {
        static MISSING: DomainSlot = DomainSlot::Unavailable {
            reason: String::new(),
        };
        self.slots.get(&disease).unwrap_or(&MISSING)
    }

    pub fn predict(
        &self,
        disease: DiseaseType,
        input: &RawInput,
        shape: InputShape,
    ) -> Result<PredictionResult, PredictError> {
        match self.slot(disease) {
            DomainSlot::Ready(pipeline) => pipeline.predict(input, shape),
            DomainSlot::Unavailable { reason } => Err(PredictError::ModelUnavailable {
                disease,
                reason: reason.clone(),
            }),
        }
    }

    /// Readiness of every domain, in declaration order.
    pub fn status(&self) -> Vec<(DiseaseType, bool)> {
        DiseaseType::ALL
            .into_iter()
            .map(|disease| (disease, self.slot(disease).is_ready()))
            .collect()
    }

    pub fn any_ready(&self) -> bool {
        self.slots.values().any(DomainSlot::is_ready)
    }
}
