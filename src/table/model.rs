//! Core tabular model for granary.
//!
//! This module defines the canonical format-agnostic representation of
//! tabular data. All format-specific readers convert into this model, and
//! the columnar writer consumes it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::GranaryError;

/// A single cell value.
///
/// The model is deliberately small: the supported scalar types map one to
/// one onto the Arrow types the writer produces. Nested values are rejected
/// at conversion time rather than silently stringified.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Logical column type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int64,
    Float64,
    Utf8,
    /// Integer-coded labels with a fixed name table. Stored as `Int64` on
    /// disk; `names` maps indices to human-readable labels.
    ClassLabel { names: Vec<String> },
}

/// A named column. All columns are nullable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An ordered collection of columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    /// Builds a schema, rejecting duplicate column names.
    pub fn new(fields: Vec<Field>) -> Result<Self, GranaryError> {
        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(GranaryError::DuplicateColumn(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One row: column name to value.
///
/// Columns absent from a row are treated as `Null` by the writer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Example {
    values: BTreeMap<String, Value>,
}

impl Example {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts a JSON object into an example. Nested arrays and objects are
    /// rejected with an error naming the offending column.
    pub fn from_json_object(
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, GranaryError> {
        let mut example = Example::new();
        for (column, value) in object {
            example.set(column.clone(), Value::from_json(column, value)?);
        }
        Ok(example)
    }

    /// Renders the example as a JSON object for display and reporting.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (column, value) in &self.values {
            object.insert(column.clone(), value.to_json());
        }
        serde_json::Value::Object(object)
    }
}

impl Value {
    /// The narrowest data type that represents this value, or `None` for
    /// `Null` (nulls never narrow a column during inference).
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::Int(_) => Some(DataType::Int64),
            Value::Float(_) => Some(DataType::Float64),
            Value::Str(_) => Some(DataType::Utf8),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn from_json(column: &str, value: &serde_json::Value) -> Result<Self, GranaryError> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(flag) => Ok(Value::Bool(*flag)),
            serde_json::Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Ok(Value::Int(int))
                } else if let Some(float) = number.as_f64() {
                    Ok(Value::Float(float))
                } else {
                    Err(GranaryError::UnsupportedValue {
                        column: column.to_string(),
                        message: format!("number '{number}' does not fit a 64-bit value"),
                    })
                }
            }
            serde_json::Value::String(text) => Ok(Value::Str(text.clone())),
            serde_json::Value::Array(_) => Err(GranaryError::UnsupportedValue {
                column: column.to_string(),
                message: "nested arrays are not supported in tabular columns".to_string(),
            }),
            serde_json::Value::Object(_) => Err(GranaryError::UnsupportedValue {
                column: column.to_string(),
                message: "nested objects are not supported in tabular columns".to_string(),
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(flag) => serde_json::Value::Bool(*flag),
            Value::Int(int) => serde_json::Value::from(*int),
            Value::Float(float) => serde_json::Value::from(*float),
            Value::Str(text) => serde_json::Value::String(text.clone()),
        }
    }

    /// Coerces the value to the given column type.
    ///
    /// Lossless widenings are applied (`Int` into `Float64`, any scalar into
    /// `Utf8`); `ClassLabel` accepts in-range indices or known label names.
    pub fn coerce_to(self, column: &str, data_type: &DataType) -> Result<Value, GranaryError> {
        match (&self, data_type) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Bool(_), DataType::Bool) => Ok(self),
            (Value::Int(_), DataType::Int64) => Ok(self),
            (Value::Float(_), DataType::Float64) => Ok(self),
            (Value::Str(_), DataType::Utf8) => Ok(self),
            (Value::Int(int), DataType::Float64) => Ok(Value::Float(*int as f64)),
            (Value::Int(int), DataType::ClassLabel { names }) => {
                if *int >= 0 && (*int as usize) < names.len() {
                    Ok(self)
                } else {
                    Err(GranaryError::TypeMismatch {
                        column: column.to_string(),
                        message: format!(
                            "class label index {} out of range for {} name(s)",
                            int,
                            names.len()
                        ),
                    })
                }
            }
            (Value::Str(label), DataType::ClassLabel { names }) => {
                match class_label_index(names, label) {
                    Some(index) => Ok(Value::Int(index as i64)),
                    None => Err(GranaryError::TypeMismatch {
                        column: column.to_string(),
                        message: format!("unknown class label '{label}'"),
                    }),
                }
            }
            (Value::Bool(flag), DataType::Utf8) => Ok(Value::Str(flag.to_string())),
            (Value::Int(int), DataType::Utf8) => Ok(Value::Str(int.to_string())),
            (Value::Float(float), DataType::Utf8) => Ok(Value::Str(float.to_string())),
            (value, data_type) => Err(GranaryError::TypeMismatch {
                column: column.to_string(),
                message: format!("cannot store {value:?} in a {data_type:?} column"),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Int(int) => write!(f, "{int}"),
            Value::Float(float) => write!(f, "{float}"),
            Value::Str(text) => write!(f, "{text}"),
        }
    }
}

/// Looks up a label in a class-label name table.
pub fn class_label_index(names: &[String], label: &str) -> Option<usize> {
    names.iter().position(|name| name == label)
}

/// Widens two observed column types to the narrowest common type.
///
/// The lattice is `Int64 -> Float64 -> Utf8`; `Bool` mixes with nothing but
/// itself before falling back to `Utf8`.
pub fn unify_types(left: &DataType, right: &DataType) -> DataType {
    use DataType::*;
    match (left, right) {
        (a, b) if a == b => a.clone(),
        (Int64, Float64) | (Float64, Int64) => Float64,
        _ => Utf8,
    }
}

/// Incremental schema inference over a stream of examples.
///
/// Column order follows first appearance. Columns observed only as `Null`
/// infer `Utf8`.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    order: Vec<String>,
    types: BTreeMap<String, Option<DataType>>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, example: &Example) {
        for (column, value) in example.columns() {
            self.observe_value(column, value);
        }
    }

    pub fn observe_value(&mut self, column: &str, value: &Value) {
        if !self.types.contains_key(column) {
            self.order.push(column.to_string());
        }
        let observed = value.data_type();
        let entry = self.types.entry(column.to_string()).or_insert(None);
        *entry = match (entry.take(), observed) {
            (None, observed) => observed,
            (current, None) => current,
            (Some(current), Some(observed)) => Some(unify_types(&current, &observed)),
        };
    }

    pub fn finish(self) -> Schema {
        let fields = self
            .order
            .into_iter()
            .map(|name| {
                let data_type = self.types[&name].clone().unwrap_or(DataType::Utf8);
                Field::new(name, data_type)
            })
            .collect();
        // Duplicate names cannot occur: order entries are keyed uniquely.
        Schema { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_follows_the_lattice() {
        assert_eq!(
            unify_types(&DataType::Int64, &DataType::Float64),
            DataType::Float64
        );
        assert_eq!(
            unify_types(&DataType::Float64, &DataType::Int64),
            DataType::Float64
        );
        assert_eq!(
            unify_types(&DataType::Bool, &DataType::Int64),
            DataType::Utf8
        );
        assert_eq!(unify_types(&DataType::Bool, &DataType::Bool), DataType::Bool);
    }

    #[test]
    fn inference_keeps_first_appearance_order() {
        let mut builder = SchemaBuilder::new();
        builder.observe(
            &Example::new()
                .with("b", Value::Int(1))
                .with("a", Value::Str("x".to_string())),
        );
        builder.observe(&Example::new().with("c", Value::Float(0.5)));

        let schema = builder.finish();
        // BTreeMap order inside an example is alphabetical; across examples,
        // first appearance wins.
        assert_eq!(schema.column_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn null_only_columns_infer_utf8() {
        let mut builder = SchemaBuilder::new();
        builder.observe(&Example::new().with("x", Value::Null));
        let schema = builder.finish();
        assert_eq!(schema.fields[0].data_type, DataType::Utf8);
    }

    #[test]
    fn nested_json_is_rejected() {
        let object = serde_json::json!({"ok": 1, "bad": [1, 2]});
        let err = Example::from_json_object(object.as_object().unwrap()).expect_err("nested");
        match err {
            GranaryError::UnsupportedValue { column, .. } => assert_eq!(column, "bad"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn class_label_coercion_accepts_names_and_indices() {
        let names = vec!["cat".to_string(), "dog".to_string()];
        let dtype = DataType::ClassLabel {
            names: names.clone(),
        };

        assert_eq!(
            Value::Str("dog".to_string())
                .coerce_to("label", &dtype)
                .expect("known label"),
            Value::Int(1)
        );
        assert_eq!(
            Value::Int(0).coerce_to("label", &dtype).expect("in range"),
            Value::Int(0)
        );
        assert!(Value::Int(2).coerce_to("label", &dtype).is_err());
        assert!(Value::Str("bird".to_string()).coerce_to("label", &dtype).is_err());
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = Schema::new(vec![
            Field::new("a", DataType::Int64),
            Field::new("a", DataType::Utf8),
        ])
        .expect_err("duplicate");
        match err {
            GranaryError::DuplicateColumn(name) => assert_eq!(name, "a"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn int_widens_losslessly_into_float_columns() {
        assert_eq!(
            Value::Int(3).coerce_to("x", &DataType::Float64).expect("coerce"),
            Value::Float(3.0)
        );
    }
}
