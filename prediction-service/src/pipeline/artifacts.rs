//! Artifact store: the fitted model, scaler and feature list per domain.
//!
//! Layout under the artifact directory:
//!
//! ```text
//! <dir>/<domain>_model.json
//! <dir>/<domain>_scaler.json
//! <dir>/<domain>_feature_columns.json
//! ```

use super::classifier::{Classifier, Model, ModelError};
use super::domain::{DiseaseType, DomainDefinition};
use super::scaler::{scaled_columns, ScalerState};
use super::schema::{FeatureSchema, SchemaError};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact file {0} not found")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid feature columns: {0}")]
    Schema(#[from] SchemaError),

    #[error("invalid model: {0}")]
    Model(#[from] ModelError),

    #[error("scaler does not match the feature schema: {0}")]
    ScalerSchema(String),
}

/// File locations of one domain's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub feature_columns: PathBuf,
}

impl ArtifactPaths {
    pub fn for_domain(dir: &Path, disease: DiseaseType) -> Self {
        let prefix = disease.as_str();
        Self {
            model: dir.join(format!("{}_model.json", prefix)),
            scaler: dir.join(format!("{}_scaler.json", prefix)),
            feature_columns: dir.join(format!("{}_feature_columns.json", prefix)),
        }
    }
}

/// A domain's loaded, mutually consistent artifacts.
#[derive(Debug, Clone)]
pub struct DomainArtifacts {
    pub schema: FeatureSchema,
    pub scaler: ScalerState,
    pub classifier: Arc<dyn Classifier>,
}

impl DomainArtifacts {
    /// Assemble artifacts after checking they agree with each other and
    /// with the domain definition.
    pub fn new(
        definition: &DomainDefinition,
        schema: FeatureSchema,
        scaler: ScalerState,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, ArtifactError> {
        if classifier.n_features() != schema.len() {
            return Err(ModelError::FeatureCount {
                expected: classifier.n_features(),
                found: schema.len(),
            }
            .into());
        }

        if let Some(column) = scaler
            .feature_names()
            .iter()
            .find(|name| !schema.contains(name))
        {
            return Err(ArtifactError::ScalerSchema(format!(
                "scaler column '{}' is not in the feature schema",
                column
            )));
        }

        let one_hot = definition.one_hot_positions(&schema);
        if let Some(column) = scaler.feature_names().iter().find(|name| {
            schema
                .position(name)
                .is_some_and(|position| one_hot.contains(&position))
        }) {
            return Err(ArtifactError::ScalerSchema(format!(
                "scaler transforms one-hot column '{}'",
                column
            )));
        }

        let expected = scaled_columns(definition.scaled_columns, &schema);
        if scaler.feature_names() != expected.as_slice() {
            return Err(ArtifactError::ScalerSchema(format!(
                "scaler columns {:?}, schema numerical columns {:?}",
                scaler.feature_names(),
                expected
            )));
        }

        Ok(Self {
            schema,
            scaler,
            classifier,
        })
    }
}

/// Load and cross-check one domain's artifacts from `dir`.
pub fn load_domain(dir: &Path, disease: DiseaseType) -> Result<DomainArtifacts, ArtifactError> {
    let paths = ArtifactPaths::for_domain(dir, disease);

    let columns: Vec<String> = read_json(&paths.feature_columns)?;
    let schema = FeatureSchema::new(columns)?;
    let scaler: ScalerState = read_json(&paths.scaler)?;
    let model: Model = read_json(&paths.model)?;
    model.validate(schema.len())?;

    DomainArtifacts::new(disease.definition(), schema, scaler, model.into_classifier())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Missing(path.to_path_buf())
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
