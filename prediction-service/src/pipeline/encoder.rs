//! Feature encoder: loosely-typed form fields to a schema-aligned row.
//!
//! Numerical fields are copied (coerced to `f64`) into their column.
//! Categorical fields set exactly one one-hot column to `1.0`. Fields that
//! are absent, category values without a mapping, and mapped columns the
//! schema does not contain all leave the row at its zero default.

use super::schema::{FeatureSchema, FeatureVector};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("field '{field}' must be numeric, got {value}")]
    NonNumeric { field: String, value: String },
}

/// User-supplied field values, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput(Map<String, Value>);

impl RawInput {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for RawInput {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A numerical input field and the schema column it feeds.
#[derive(Debug, Clone, Copy)]
pub struct NumericField {
    pub input: &'static str,
    pub column: &'static str,
}

impl NumericField {
    /// Field whose input key and column name are the same.
    pub const fn same(name: &'static str) -> Self {
        Self {
            input: name,
            column: name,
        }
    }

    pub const fn renamed(input: &'static str, column: &'static str) -> Self {
        Self { input, column }
    }
}

/// How one categorical attribute expands into one-hot columns.
#[derive(Debug, Clone, Copy)]
pub enum CategoryMap {
    /// Fixed raw value to column table.
    Table(&'static [(&'static str, &'static str)]),
    /// Integer codes resolved against the schema's `<attribute>_<code>`
    /// columns, so every code the model was fitted on is accepted.
    Coded { attribute: &'static str },
}

impl CategoryMap {
    pub const fn table(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self::Table(entries)
    }

    pub const fn coded(attribute: &'static str) -> Self {
        Self::Coded { attribute }
    }

    /// Schema position of the one-hot column for a normalized category key.
    pub fn position_for(&self, key: &str, schema: &FeatureSchema) -> Option<usize> {
        match self {
            Self::Table(entries) => entries
                .iter()
                .find(|(raw, _)| *raw == key)
                .and_then(|(_, column)| schema.one_hot_position(column)),
            Self::Coded { attribute } => {
                let code: i64 = key.parse().ok()?;
                schema.one_hot_position(&format!("{}_{}", attribute, code))
            }
        }
    }

    /// Schema positions of every one-hot column this attribute can set.
    pub fn positions(&self, schema: &FeatureSchema) -> Vec<usize> {
        match self {
            Self::Table(entries) => entries
                .iter()
                .filter_map(|(_, column)| schema.one_hot_position(column))
                .collect(),
            Self::Coded { attribute } => schema
                .columns()
                .iter()
                .enumerate()
                .filter(|(_, column)| coded_column(attribute, column))
                .map(|(position, _)| position)
                .collect(),
        }
    }
}

/// Whether `column` reads `<attribute>_<integer>` or `<attribute>_<integer>.0`.
fn coded_column(attribute: &str, column: &str) -> bool {
    column
        .strip_prefix(attribute)
        .and_then(|rest| rest.strip_prefix('_'))
        .map(|code| code.strip_suffix(".0").unwrap_or(code))
        .is_some_and(|code| code.parse::<i64>().is_ok())
}

/// A categorical input field and the map that expands it.
#[derive(Debug, Clone, Copy)]
pub struct CategoricalField {
    pub input: &'static str,
    pub categories: CategoryMap,
}

/// Build the model input row for `input`.
///
/// Fails only when a numerical field that feeds a schema column holds a
/// value that cannot be read as a number.
pub fn encode<'s>(
    input: &RawInput,
    schema: &'s FeatureSchema,
    numeric: &[NumericField],
    categorical: &[CategoricalField],
) -> Result<FeatureVector<'s>, EncodeError> {
    let mut vector = FeatureVector::zeros(schema);

    for field in numeric {
        let (Some(value), Some(position)) = (input.get(field.input), schema.position(field.column))
        else {
            continue;
        };
        if let Some(number) = coerce_numeric(field.input, value)? {
            vector.set_at(position, number);
        }
    }

    for field in categorical {
        let Some(value) = input.get(field.input) else {
            continue;
        };
        let Some(key) = category_key(value) else {
            continue;
        };

        match field.categories.position_for(&key, schema) {
            Some(position) => vector.set_at(position, 1.0),
            None => tracing::debug!(
                field = field.input,
                value = %key,
                "Unmapped category value left at zero"
            ),
        }
    }

    Ok(vector)
}

/// Copy every input field whose key is itself a schema column over the
/// encoded row. Pre-expanded one-hot keys such as `gender_Male: true`
/// become `1.0`. Values go through the same numeric coercion as
/// numerical fields.
pub fn copy_schema_columns(
    input: &RawInput,
    vector: &mut FeatureVector<'_>,
) -> Result<(), EncodeError> {
    let schema = vector.schema();

    for (field, value) in input.iter() {
        let Some(position) = schema.position(field) else {
            continue;
        };
        if let Some(number) = coerce_numeric(field, value)? {
            vector.set_at(position, number);
        }
    }

    Ok(())
}

/// Read a field value as a number. `null` counts as absent.
fn coerce_numeric(field: &str, value: &Value) -> Result<Option<f64>, EncodeError> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Array(_) | Value::Object(_) => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(EncodeError::NonNumeric {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Normalize a category value so `2`, `2.0` and `"2"` share a key.
fn category_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            Some(
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(integral_key)
                    .unwrap_or_else(|| trimmed.to_string()),
            )
        }
        Value::Number(n) => n.as_f64().and_then(integral_key).or_else(|| Some(n.to_string())),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn integral_key(n: f64) -> Option<String> {
    (n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15).then(|| format!("{}", n as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GENDER: CategoryMap = CategoryMap::table(&[
        ("Female", "gender_Female"),
        ("Male", "gender_Male"),
    ]);
    const CA: CategoryMap = CategoryMap::coded("ca");

    const NUMERIC: &[NumericField] = &[NumericField::same("age"), NumericField::renamed("hd_chol", "chol")];
    const CATEGORICAL: &[CategoricalField] = &[
        CategoricalField {
            input: "gender",
            categories: GENDER,
        },
        CategoricalField {
            input: "hd_ca",
            categories: CA,
        },
    ];

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            ["age", "chol", "gender_Female", "gender_Male", "ca_0", "ca_1", "ca_2.0"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
        .unwrap()
    }

    fn input(value: Value) -> RawInput {
        match value {
            Value::Object(map) => RawInput::from(map),
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn test_encodes_numeric_and_one_hot_in_schema_order() {
        let schema = schema();
        let raw = input(json!({"age": "45", "hd_chol": 233, "gender": "Female", "hd_ca": 1}));

        let vector = encode(&raw, &schema, NUMERIC, CATEGORICAL).unwrap();

        assert_eq!(vector.values(), &[45.0, 233.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let schema = schema();
        let vector = encode(&input(json!({})), &schema, NUMERIC, CATEGORICAL).unwrap();

        assert_eq!(vector.len(), schema.len());
        assert!(vector.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_unknown_category_is_skipped() {
        let schema = schema();
        let raw = input(json!({"gender": "Unknown", "hd_ca": "7"}));

        let vector = encode(&raw, &schema, NUMERIC, CATEGORICAL).unwrap();

        assert!(vector.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_category_keys_are_normalized() {
        let schema = schema();
        for value in [json!(2), json!(2.0), json!("2"), json!(" 2.0 ")] {
            let raw = input(json!({ "hd_ca": value }));
            let vector = encode(&raw, &schema, NUMERIC, CATEGORICAL).unwrap();
            assert_eq!(vector.get("ca_2.0"), Some(1.0), "value {}", value);
        }
    }

    #[test]
    fn test_non_numeric_value_is_an_error() {
        let schema = schema();
        let raw = input(json!({"age": "forty"}));

        let err = encode(&raw, &schema, NUMERIC, CATEGORICAL).unwrap_err();

        assert_eq!(
            err,
            EncodeError::NonNumeric {
                field: "age".into(),
                value: "\"forty\"".into()
            }
        );
    }

    #[test]
    fn test_null_and_bool_coercion() {
        let schema = schema();
        let raw = input(json!({"age": null, "hd_chol": true}));

        let vector = encode(&raw, &schema, NUMERIC, CATEGORICAL).unwrap();

        assert_eq!(vector.get("age"), Some(0.0));
        assert_eq!(vector.get("chol"), Some(1.0));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let schema = schema();
        let raw = input(json!({"age": 61.5, "gender": "Male", "hd_ca": 0}));

        let first = encode(&raw, &schema, NUMERIC, CATEGORICAL).unwrap();
        let second = encode(&raw, &schema, NUMERIC, CATEGORICAL).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_heart_codes_follow_schema_columns() {
        let schema = FeatureSchema::new(
            ["age", "thal_3.0", "thal_6.0", "thal_7.0"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
        .unwrap();
        let thal = [CategoricalField {
            input: "hd_thal",
            categories: CategoryMap::coded("thal"),
        }];

        for (code, expected) in [
            (json!(3), [0.0, 1.0, 0.0, 0.0]),
            (json!("6"), [0.0, 0.0, 1.0, 0.0]),
            (json!(7.0), [0.0, 0.0, 0.0, 1.0]),
            (json!(2), [0.0, 0.0, 0.0, 0.0]),
        ] {
            let raw = input(json!({ "hd_thal": code }));
            let vector = encode(&raw, &schema, NUMERIC, &thal).unwrap();
            assert_eq!(vector.values(), &expected, "hd_thal={}", code);
        }
    }

    #[test]
    fn test_coded_positions_only_match_integer_suffixes() {
        let schema = FeatureSchema::new(
            ["thal_3.0", "thalach", "thal_x", "thal_7", "cp_1"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
        .unwrap();

        assert_eq!(CategoryMap::coded("thal").positions(&schema), vec![0, 3]);
    }

    #[test]
    fn test_copy_schema_columns_accepts_pre_expanded_one_hot() {
        let schema = FeatureSchema::new(
            ["age", "gender_Female", "gender_Male", "smoking_history_never"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
        .unwrap();
        let raw = input(json!({
            "age": 45,
            "gender_Male": true,
            "smoking_history_never": 1,
            "unrelated": "ignored"
        }));

        let mut vector = encode(&raw, &schema, NUMERIC, CATEGORICAL).unwrap();
        copy_schema_columns(&raw, &mut vector).unwrap();

        assert_eq!(vector.values(), &[45.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_copy_schema_columns_rejects_non_numeric() {
        let schema = schema();
        let raw = input(json!({"gender_Male": "yes"}));
        let mut vector = FeatureVector::zeros(&schema);

        let err = copy_schema_columns(&raw, &mut vector).unwrap_err();

        assert!(matches!(err, EncodeError::NonNumeric { field, .. } if field == "gender_Male"));
    }
}
