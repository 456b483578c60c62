//! Prediction pipeline: feature encoding, scaling and inference over the
//! artifacts loaded for each disease domain.

pub mod artifacts;
pub mod classifier;
pub mod domain;
pub mod encoder;
pub mod registry;
pub mod scaler;
pub mod schema;

pub use artifacts::{load_domain, ArtifactError, ArtifactPaths, DomainArtifacts};
pub use classifier::{
    infer, Classifier, InferenceError, Model, ModelError, PredictionResult, DECISION_THRESHOLD,
};
pub use domain::{DiseaseType, DomainDefinition, UnknownDiseaseType};
pub use encoder::{copy_schema_columns, encode, EncodeError, RawInput};
pub use registry::{DomainPipeline, DomainRegistry, DomainSlot, InputShape, PredictError};
pub use scaler::{ScalerError, ScalerState};
pub use schema::{FeatureSchema, FeatureVector, SchemaError};
