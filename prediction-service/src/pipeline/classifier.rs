//! Fitted binary classifiers and the inference stage.
//!
//! Models arrive as JSON exports of the fitted estimators:
//!
//! - `random_forest`: each tree in array-of-nodes form (`children_left`,
//!   `children_right`, `feature`, `threshold`, `value`), `-1` marking a
//!   leaf. A row goes left when `x[feature] <= threshold`, comparing `x`
//!   at the single precision the trees were fitted on. The forest's
//!   class distribution is the mean of the trees' normalized leaf values.
//! - `logistic_regression`: `sigmoid(w . x + b)`.
//!
//! In both, the positive class is whichever position of `classes` holds
//! the label `1`.

use super::schema::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Probability at or above which a row is classified positive.
pub const DECISION_THRESHOLD: f64 = 0.5;

const LEAF: i64 = -1;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("model must have exactly two classes, got {0:?}")]
    NotBinary(Vec<i64>),

    #[error("model has no positive class (label 1) in {0:?}")]
    MissingPositiveClass(Vec<i64>),

    #[error("model expects {expected} features but the schema has {found}")]
    FeatureCount { expected: usize, found: usize },

    #[error("random forest has no trees")]
    NoTrees,

    #[error("tree {tree}: {reason}")]
    InvalidTree { tree: usize, reason: String },

    #[error("logistic regression has {coefficients} coefficients for {features} features")]
    CoefficientCount { coefficients: usize, features: usize },

    #[error("model parameters contain a non-finite value")]
    NonFinite,
}

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("no classifier is loaded")]
    ModelUnavailable,

    #[error("classifier expects {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("classifier produced an invalid probability")]
    InvalidProbability,
}

/// Anything that can score a feature row with a positive-class probability.
pub trait Classifier: Send + Sync + Debug {
    /// Number of input features the classifier was fitted on.
    fn n_features(&self) -> usize;

    /// Estimated probability of the positive class. `features` has exactly
    /// `n_features()` entries.
    fn positive_probability(&self, features: &[f64]) -> f64;
}

/// Binary class label plus positive-class probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: u8,
    pub probability: f64,
}

impl PredictionResult {
    pub fn from_probability(probability: f64) -> Self {
        Self {
            label: u8::from(probability >= DECISION_THRESHOLD),
            probability,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.label == 1
    }
}

/// Run the inference stage. A missing classifier is reported, never a panic.
pub fn infer(
    classifier: Option<&dyn Classifier>,
    vector: &FeatureVector<'_>,
) -> Result<PredictionResult, InferenceError> {
    let classifier = classifier.ok_or(InferenceError::ModelUnavailable)?;

    if vector.len() != classifier.n_features() {
        return Err(InferenceError::DimensionMismatch {
            expected: classifier.n_features(),
            found: vector.len(),
        });
    }

    let probability = classifier.positive_probability(vector.values());
    if probability.is_nan() {
        return Err(InferenceError::InvalidProbability);
    }

    Ok(PredictionResult::from_probability(probability.clamp(0.0, 1.0)))
}

fn positive_index(classes: &[i64]) -> Result<usize, ModelError> {
    if classes.len() != 2 {
        return Err(ModelError::NotBinary(classes.to_vec()));
    }
    classes
        .iter()
        .position(|c| *c == 1)
        .ok_or_else(|| ModelError::MissingPositiveClass(classes.to_vec()))
}

fn default_classes() -> Vec<i64> {
    vec![0, 1]
}

/// A fitted model as stored in the artifact store.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    RandomForest(RandomForest),
    LogisticRegression(LogisticRegression),
}

impl Model {
    /// Check internal consistency and that the model takes `n_features`
    /// inputs. Inference assumes a validated model.
    pub fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        match self {
            Model::RandomForest(forest) => forest.validate(n_features),
            Model::LogisticRegression(lr) => lr.validate(n_features),
        }
    }

    pub fn into_classifier(self) -> Arc<dyn Classifier> {
        match self {
            Model::RandomForest(forest) => Arc::new(forest),
            Model::LogisticRegression(lr) => Arc::new(lr),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let nodes = self.children_left.len();
        if nodes == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|len| *len != nodes)
        {
            return Err("node arrays have different lengths".to_string());
        }

        for node in 0..nodes {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF || right == LEAF {
                if left != right {
                    return Err(format!("node {} has exactly one child", node));
                }
                let value = &self.value[node];
                if value.len() != n_classes {
                    return Err(format!(
                        "leaf {} has {} class values, expected {}",
                        node,
                        value.len(),
                        n_classes
                    ));
                }
                if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(format!("leaf {} has an invalid class value", node));
                }
                continue;
            }

            // Children always come after their parent, which also rules out cycles.
            for child in [left, right] {
                if child <= node as i64 || child >= nodes as i64 {
                    return Err(format!("node {} has invalid child {}", node, child));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {} splits on unknown feature {}", node, feature));
            }
            if self.threshold[node].is_nan() {
                return Err(format!("node {} has a NaN threshold", node));
            }
        }

        Ok(())
    }

    fn leaf_for(&self, features: &[f64]) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let feature = self.feature[node] as usize;
            node = if f64::from(features[feature] as f32) <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    fn class_probability(&self, features: &[f64], class_index: usize) -> f64 {
        let value = &self.value[self.leaf_for(features)];
        let total: f64 = value.iter().sum();
        if total > 0.0 {
            value[class_index] / total
        } else {
            1.0 / value.len() as f64
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        positive_index(&self.classes)?;
        if self.n_features != n_features {
            return Err(ModelError::FeatureCount {
                expected: self.n_features,
                found: n_features,
            });
        }
        if self.trees.is_empty() {
            return Err(ModelError::NoTrees);
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.classes.len())
                .map_err(|reason| ModelError::InvalidTree { tree: i, reason })?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn positive_probability(&self, features: &[f64]) -> f64 {
        let Ok(positive) = positive_index(&self.classes) else {
            return f64::NAN;
        };
        let sum: f64 = self
            .trees
            .iter()
            .map(|tree| tree.class_probability(features, positive))
            .sum();
        sum / self.trees.len() as f64
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    pub fn new(
        classes: Vec<i64>,
        coefficients: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, ModelError> {
        let model = Self {
            classes,
            coefficients,
            intercept,
        };
        model.validate(model.coefficients.len())?;
        Ok(model)
    }

    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        positive_index(&self.classes)?;
        if self.coefficients.len() != n_features {
            return Err(ModelError::CoefficientCount {
                coefficients: self.coefficients.len(),
                features: n_features,
            });
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        Ok(())
    }
}

impl Classifier for LogisticRegression {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn positive_probability(&self, features: &[f64]) -> f64 {
        let z: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        let p = 1.0 / (1.0 + (-z).exp());
        // The decision function scores `classes[1]`.
        if self.classes.get(1) == Some(&1) {
            p
        } else {
            1.0 - p
        }
    }
}
