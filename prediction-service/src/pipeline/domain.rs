//! Compiled-in description of each disease domain: which form fields feed
//! which columns, how categories expand, and which columns get scaled.

use super::encoder::{CategoricalField, CategoryMap, NumericField};
use super::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseType {
    Diabetes,
    HeartDisease,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown disease_type '{0}'")]
pub struct UnknownDiseaseType(pub String);

impl DiseaseType {
    pub const ALL: [DiseaseType; 2] = [DiseaseType::Diabetes, DiseaseType::HeartDisease];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseType::Diabetes => "diabetes",
            DiseaseType::HeartDisease => "heart_disease",
        }
    }

    pub fn definition(&self) -> &'static DomainDefinition {
        match self {
            DiseaseType::Diabetes => &DIABETES,
            DiseaseType::HeartDisease => &HEART_DISEASE,
        }
    }
}

impl fmt::Display for DiseaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiseaseType {
    type Err = UnknownDiseaseType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diabetes" => Ok(DiseaseType::Diabetes),
            "heart_disease" => Ok(DiseaseType::HeartDisease),
            other => Err(UnknownDiseaseType(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct DomainDefinition {
    pub disease: DiseaseType,
    pub numeric: &'static [NumericField],
    pub categorical: &'static [CategoricalField],
    /// Columns the fitted scaler transforms, in fitting order.
    pub scaled_columns: &'static [&'static str],
    pub positive_label: &'static str,
    pub negative_label: &'static str,
}

impl DomainDefinition {
    pub fn label(&self, positive: bool) -> &'static str {
        if positive {
            self.positive_label
        } else {
            self.negative_label
        }
    }

    /// Schema positions any categorical field of this domain can set.
    pub fn one_hot_positions(&self, schema: &FeatureSchema) -> HashSet<usize> {
        self.categorical
            .iter()
            .flat_map(|field| field.categories.positions(schema))
            .collect()
    }
}

pub static DIABETES: DomainDefinition = DomainDefinition {
    disease: DiseaseType::Diabetes,
    numeric: &[
        NumericField::same("age"),
        NumericField::same("hypertension"),
        NumericField::same("heart_disease"),
        NumericField::same("bmi"),
        NumericField::same("HbA1c_level"),
        NumericField::same("blood_glucose_level"),
    ],
    categorical: &[
        CategoricalField {
            input: "gender",
            categories: CategoryMap::table(&[
                ("Female", "gender_Female"),
                ("Male", "gender_Male"),
                ("Other", "gender_Other"),
            ]),
        },
        CategoricalField {
            input: "smoking_history",
            categories: CategoryMap::table(&[
                ("No Info", "smoking_history_No Info"),
                ("current", "smoking_history_current"),
                ("ever", "smoking_history_ever"),
                ("former", "smoking_history_former"),
                ("never", "smoking_history_never"),
                ("not current", "smoking_history_not current"),
            ]),
        },
    ],
    scaled_columns: &["age", "bmi", "HbA1c_level", "blood_glucose_level"],
    positive_label: "Diabetes",
    negative_label: "No Diabetes",
};

pub static HEART_DISEASE: DomainDefinition = DomainDefinition {
    disease: DiseaseType::HeartDisease,
    numeric: &[
        NumericField::renamed("hd_age", "age"),
        NumericField::renamed("hd_trestbps", "trestbps"),
        NumericField::renamed("hd_chol", "chol"),
        NumericField::renamed("hd_thalach", "thalach"),
        NumericField::renamed("hd_oldpeak", "oldpeak"),
    ],
    // Integer-coded attributes; the accepted codes are the ones the fitted
    // schema has columns for.
    categorical: &[
        CategoricalField {
            input: "hd_sex",
            categories: CategoryMap::coded("sex"),
        },
        CategoricalField {
            input: "hd_cp",
            categories: CategoryMap::coded("cp"),
        },
        CategoricalField {
            input: "hd_fbs",
            categories: CategoryMap::coded("fbs"),
        },
        CategoricalField {
            input: "hd_restecg",
            categories: CategoryMap::coded("restecg"),
        },
        CategoricalField {
            input: "hd_exang",
            categories: CategoryMap::coded("exang"),
        },
        CategoricalField {
            input: "hd_slope",
            categories: CategoryMap::coded("slope"),
        },
        CategoricalField {
            input: "hd_ca",
            categories: CategoryMap::coded("ca"),
        },
        CategoricalField {
            input: "hd_thal",
            categories: CategoryMap::coded("thal"),
        },
    ],
    scaled_columns: &["age", "trestbps", "chol", "thalach", "oldpeak"],
    positive_label: "Heart Disease",
    negative_label: "No Heart Disease",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disease_type_round_trips_through_str() {
        for disease in DiseaseType::ALL {
            assert_eq!(disease.as_str().parse::<DiseaseType>(), Ok(disease));
        }
        assert_eq!(
            "cancer".parse::<DiseaseType>(),
            Err(UnknownDiseaseType("cancer".into()))
        );
    }

    #[test]
    fn test_scaled_columns_are_numeric_and_not_one_hot() {
        for disease in DiseaseType::ALL {
            let definition = disease.definition();
            let numeric: Vec<String> =
                definition.numeric.iter().map(|f| f.column.to_string()).collect();
            let schema = FeatureSchema::new(numeric).unwrap();

            for column in definition.scaled_columns {
                assert!(schema.contains(column), "{} not numeric", column);
            }
            assert!(definition.one_hot_positions(&schema).is_empty());
        }
    }

    #[test]
    fn test_heart_fields_are_prefixed() {
        let definition = DiseaseType::HeartDisease.definition();
        assert!(definition.numeric.iter().all(|f| f.input.starts_with("hd_")));
        assert!(definition.categorical.iter().all(|f| f.input.starts_with("hd_")));
        assert_eq!(definition.numeric.len() + definition.categorical.len(), 13);
    }

    #[test]
    fn test_heart_codes_come_from_schema() {
        let schema = FeatureSchema::new(
            ["age", "cp_1", "cp_4", "thal_3.0", "thal_6.0", "thal_7.0"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
        .unwrap();

        let positions = DiseaseType::HeartDisease
            .definition()
            .one_hot_positions(&schema);

        assert_eq!(positions, HashSet::from([1, 2, 3, 4, 5]));
    }
}
