//! Row abstraction for query results.

use std::sync::Arc;

use crate::codec::ColumnDesc;
use crate::error::{Error, Result};
use crate::types::Value;

/// A row returned from a query.
///
/// Values are stored in result-set column order and the column metadata is
/// shared across all rows of one result set. Iterating yields `(name, value)`
/// pairs in that order, so a row behaves like an ordered name/value mapping.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<ColumnDesc>>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<ColumnDesc>>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get column descriptions.
    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// Column names in result-set order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Get a column value by zero-based index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a column value by name. The first matching column wins when a
    /// query selects the same name twice.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c.name == name)?;
        self.values.get(index)
    }

    /// Iterate over `(column name, value)` pairs in result-set order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(self.values.iter())
    }

    /// Consume the row, keeping only the values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    fn checked(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            Error::TypeConversion(format!("column index {index} out of range"))
        })
    }

    /// Get a column as i64.
    pub fn get_i64(&self, index: usize) -> Result<Option<i64>> {
        match self.checked(index)? {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v)),
            Value::UInt(v) => i64::try_from(*v)
                .map(Some)
                .map_err(|_| Error::TypeConversion(format!("{v} does not fit in i64"))),
            Value::Text(s) => s
                .parse()
                .map(Some)
                .map_err(|_| Error::TypeConversion(format!("not an i64: {s:?}"))),
            other => Err(Error::TypeConversion(format!(
                "cannot convert {other:?} to i64"
            ))),
        }
    }

    /// Get a column as u64.
    pub fn get_u64(&self, index: usize) -> Result<Option<u64>> {
        match self.checked(index)? {
            Value::Null => Ok(None),
            Value::UInt(v) => Ok(Some(*v)),
            Value::Int(v) => u64::try_from(*v)
                .map(Some)
                .map_err(|_| Error::TypeConversion(format!("{v} is negative"))),
            Value::Text(s) => s
                .parse()
                .map(Some)
                .map_err(|_| Error::TypeConversion(format!("not a u64: {s:?}"))),
            other => Err(Error::TypeConversion(format!(
                "cannot convert {other:?} to u64"
            ))),
        }
    }

    /// Get a column as f64.
    pub fn get_f64(&self, index: usize) -> Result<Option<f64>> {
        match self.checked(index)? {
            Value::Null => Ok(None),
            Value::Float(v) => Ok(Some(*v)),
            Value::Int(v) => Ok(Some(*v as f64)),
            Value::UInt(v) => Ok(Some(*v as f64)),
            Value::Text(s) => s
                .parse()
                .map(Some)
                .map_err(|_| Error::TypeConversion(format!("not an f64: {s:?}"))),
            other => Err(Error::TypeConversion(format!(
                "cannot convert {other:?} to f64"
            ))),
        }
    }

    /// Get a column as a string slice.
    pub fn get_str(&self, index: usize) -> Result<Option<&str>> {
        match self.checked(index)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            other => Err(Error::TypeConversion(format!(
                "cannot convert {other:?} to str"
            ))),
        }
    }

    /// Get a column as bool. Only integer columns convert; MySQL has no
    /// boolean type of its own.
    pub fn get_bool(&self, index: usize) -> Result<Option<bool>> {
        match self.checked(index)? {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v != 0)),
            Value::UInt(v) => Ok(Some(*v != 0)),
            other => Err(Error::TypeConversion(format!(
                "cannot convert {other:?} to bool"
            ))),
        }
    }

    /// Get a column as raw bytes.
    pub fn get_bytes(&self, index: usize) -> Result<Option<&[u8]>> {
        match self.checked(index)? {
            Value::Null => Ok(None),
            Value::Bytes(b) => Ok(Some(b)),
            Value::Text(s) => Ok(Some(s.as_bytes())),
            other => Err(Error::TypeConversion(format!(
                "cannot convert {other:?} to bytes"
            ))),
        }
    }
}
