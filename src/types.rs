//! Core tabular types
//!
//! An [`EventTable`] is an ordered set of equally long, uniquely named columns of
//! [`Value`] cells. The same type carries the raw log-vocabulary table handed over
//! by a log source and the normalized table produced by the normalizer.

use crate::error::SchemaError;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fmt;

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<FixedOffset>),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Render the cell as a grouping key (`None` for nulls)
    pub fn key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            nested => Value::Text(nested.to_string()),
        }
    }
}

/// A named column of cells
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// Column-oriented event table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventTable {
    columns: Vec<Column>,
    rows: usize,
}

impl EventTable {
    /// Create an empty table with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from named columns, checking names are unique and lengths agree
    pub fn from_columns<N, I>(columns: I) -> Result<Self, SchemaError>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<Value>)>,
    {
        let mut table = Self::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Append a column at the end of the table
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<(), SchemaError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(SchemaError::DuplicateColumn { column: name });
        }
        if self.columns.is_empty() {
            self.rows = values.len();
        } else if values.len() != self.rows {
            return Err(SchemaError::LengthMismatch {
                column: name,
                expected: self.rows,
                found: values.len(),
            });
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Cells of the named column, if present
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Cells of a column that must exist
    pub fn require(&self, name: &str) -> Result<&[Value], SchemaError> {
        self.column(name).ok_or_else(|| SchemaError::MissingColumn {
            column: name.to_string(),
        })
    }

    /// New table containing the given rows in the given order
    pub fn take_rows(&self, rows: &[usize]) -> EventTable {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: rows.iter().map(|&r| c.values[r].clone()).collect(),
            })
            .collect();
        EventTable {
            columns,
            rows: rows.len(),
        }
    }

    pub(crate) fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> EventTable {
        EventTable::from_columns(vec![
            ("case", vec![Value::from("c1"), Value::from("c2")]),
            ("n", vec![Value::Int(1), Value::Float(2.5)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns() {
        let table = sample_table();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column_names(), vec!["case", "n"]);
        assert_eq!(table.column("n").unwrap()[1].as_f64(), Some(2.5));
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_length_mismatch() {
        let mut table = sample_table();
        let err = table.push_column("x", vec![Value::Null]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::LengthMismatch {
                column: "x".to_string(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_duplicate_column() {
        let mut table = sample_table();
        let err = table
            .push_column("case", vec![Value::Null, Value::Null])
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_take_rows_reorders() {
        let table = sample_table().take_rows(&[1, 0]);
        assert_eq!(table.column("case").unwrap()[0], Value::from("c2"));
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_json_value_conversion() {
        assert_eq!(Value::from(serde_json::json!(3)), Value::Int(3));
        assert_eq!(Value::from(serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(serde_json::json!(null)), Value::Null);
        assert_eq!(Value::from(serde_json::json!("A")), Value::from("A"));
    }
}
