//! Standard-score scaling of the numerical subset of a feature row.

use super::schema::{FeatureSchema, FeatureVector};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScalerError {
    #[error("scaler parameter lengths differ: {names} names, {means} means, {scales} scales")]
    LengthMismatch {
        names: usize,
        means: usize,
        scales: usize,
    },

    #[error("scaler parameter for '{0}' is not finite")]
    NonFinite(String),

    #[error("scaler was fitted on {expected:?} but asked to transform {found:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("column '{0}' is not part of the feature schema")]
    UnknownColumn(String),
}

#[derive(Debug, Deserialize)]
struct ScalerParams {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// Fitted per-column mean and scale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ScalerParams")]
pub struct ScalerState {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl TryFrom<ScalerParams> for ScalerState {
    type Error = ScalerError;

    fn try_from(params: ScalerParams) -> Result<Self, Self::Error> {
        ScalerState::new(params.feature_names, params.mean, params.scale)
    }
}

impl ScalerState {
    pub fn new(
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Self, ScalerError> {
        if feature_names.len() != mean.len() || feature_names.len() != scale.len() {
            return Err(ScalerError::LengthMismatch {
                names: feature_names.len(),
                means: mean.len(),
                scales: scale.len(),
            });
        }

        if let Some((name, _)) = feature_names
            .iter()
            .zip(mean.iter().zip(scale.iter()))
            .find(|(_, (m, s))| !m.is_finite() || !s.is_finite())
        {
            return Err(ScalerError::NonFinite(name.clone()));
        }

        // A constant training column has scale 0; the fitting library
        // divides by 1 instead.
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self {
            feature_names,
            mean,
            scale,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Replace `columns` of `vector` with `(x - mean) / scale`.
    ///
    /// `columns` must be exactly the columns the scaler was fitted on, in
    /// fitting order. An empty `columns` leaves the vector untouched.
    pub fn transform(
        &self,
        vector: &mut FeatureVector<'_>,
        columns: &[&str],
    ) -> Result<(), ScalerError> {
        if columns.is_empty() {
            return Ok(());
        }

        if columns.len() != self.feature_names.len()
            || columns
                .iter()
                .zip(&self.feature_names)
                .any(|(requested, fitted)| *requested != fitted.as_str())
        {
            return Err(ScalerError::ColumnMismatch {
                expected: self.feature_names.clone(),
                found: columns.iter().map(|c| c.to_string()).collect(),
            });
        }

        let positions = columns
            .iter()
            .map(|column| {
                vector
                    .schema()
                    .position(column)
                    .ok_or_else(|| ScalerError::UnknownColumn(column.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, position) in positions.into_iter().enumerate() {
            let scaled = (vector.value_at(position) - self.mean[i]) / self.scale[i];
            vector.set_at(position, scaled);
        }

        Ok(())
    }
}

/// The domain's scaled columns that the schema actually contains, in the
/// domain's canonical order.
pub fn scaled_columns(canonical: &[&'static str], schema: &FeatureSchema) -> Vec<&'static str> {
    canonical
        .iter()
        .copied()
        .filter(|column| schema.contains(column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            ["age", "bmi", "gender_Male"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
        .unwrap()
    }

    fn scaler() -> ScalerState {
        ScalerState::new(
            vec!["age".into(), "bmi".into()],
            vec![40.0, 25.0],
            vec![10.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn test_transform_scales_only_named_columns() {
        let schema = schema();
        let mut vector = FeatureVector::zeros(&schema);
        vector.set_at(0, 50.0);
        vector.set_at(1, 20.0);
        vector.set_at(2, 1.0);

        scaler().transform(&mut vector, &["age", "bmi"]).unwrap();

        assert_eq!(vector.values(), &[1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_empty_column_list_is_identity() {
        let schema = schema();
        let mut vector = FeatureVector::zeros(&schema);
        vector.set_at(0, 50.0);
        let before = vector.clone();

        scaler().transform(&mut vector, &[]).unwrap();

        assert_eq!(vector, before);
    }

    #[test]
    fn test_column_mismatch_is_rejected() {
        let schema = schema();
        let mut vector = FeatureVector::zeros(&schema);

        let err = scaler().transform(&mut vector, &["bmi", "age"]).unwrap_err();
        assert!(matches!(err, ScalerError::ColumnMismatch { .. }));

        let err = scaler().transform(&mut vector, &["age"]).unwrap_err();
        assert!(matches!(err, ScalerError::ColumnMismatch { .. }));
    }

    #[test]
    fn test_zero_scale_divides_by_one() {
        let scaler = ScalerState::new(vec!["age".into()], vec![3.0], vec![0.0]).unwrap();
        let schema = schema();
        let mut vector = FeatureVector::zeros(&schema);
        vector.set_at(0, 5.0);

        scaler.transform(&mut vector, &["age"]).unwrap();

        assert_eq!(vector.get("age"), Some(2.0));
    }

    #[test]
    fn test_deserialize_validates_lengths() {
        let err = serde_json::from_str::<ScalerState>(
            r#"{"feature_names": ["age", "bmi"], "mean": [1.0], "scale": [1.0, 2.0]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("lengths differ"));
    }

    #[test]
    fn test_scaled_columns_intersects_in_canonical_order() {
        let schema = schema();
        assert_eq!(
            scaled_columns(&["bmi", "HbA1c_level", "age"], &schema),
            vec!["bmi", "age"]
        );
        assert!(scaled_columns(&["chol"], &schema).is_empty());
    }
}
