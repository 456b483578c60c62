//! Training-time feature schema and the row vector aligned to it.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("feature schema is empty")]
    Empty,

    #[error("duplicate feature column '{0}'")]
    DuplicateColumn(String),
}

/// Ordered, unique column names a fitted model expects as input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut index = HashMap::with_capacity(columns.len());
        for (position, column) in columns.iter().enumerate() {
            if index.insert(column.clone(), position).is_some() {
                return Err(SchemaError::DuplicateColumn(column.clone()));
            }
        }

        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Position of a one-hot column, also accepting the `<name>.0` spelling
    /// the dummy encoder produces for float-typed source columns.
    pub fn one_hot_position(&self, column: &str) -> Option<usize> {
        self.position(column)
            .or_else(|| self.position(&format!("{}.0", column)))
    }
}

/// A single model input row. Values are always in schema order and the
/// length always equals the schema's.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<'s> {
    schema: &'s FeatureSchema,
    values: Vec<f64>,
}

impl<'s> FeatureVector<'s> {
    pub fn zeros(schema: &'s FeatureSchema) -> Self {
        Self {
            schema,
            values: vec![0.0; schema.len()],
        }
    }

    pub fn schema(&self) -> &'s FeatureSchema {
        self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.schema.position(column).map(|i| self.values[i])
    }

    pub(crate) fn set_at(&mut self, position: usize, value: f64) {
        self.values[position] = value;
    }

    pub(crate) fn value_at(&self, position: usize) -> f64 {
        self.values[position]
    }
}
