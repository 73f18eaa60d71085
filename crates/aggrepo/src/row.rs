//! Materialized result rows and typed column extraction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::value::Value;

/// One result row, materialized in `Table.columns` order.
///
/// Rows returned by an [`Executor`](crate::Executor) and rows rebuilt
/// in memory during batched child redistribution are the same type.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Build a row from already-materialized values.
    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw column values, in scan order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The raw value at `index`, if in range.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Extract the column at `index` as `T`.
    ///
    /// # Example
    /// ```
    /// use aggrepo::{Row, Value};
    ///
    /// let row = Row::from_values(vec![Value::Int(7), Value::Text("a".into())]);
    /// let id: i64 = row.get(0).unwrap();
    /// assert_eq!(id, 7);
    /// ```
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self
            .value(index)
            .ok_or_else(|| Error::decode(index.to_string(), "column index out of range"))?;
        T::from_value(value).map_err(|err| match err {
            Error::Decode { message, .. } => Error::Decode {
                column: index.to_string(),
                message,
            },
            other => other,
        })
    }
}

/// Conversion from a raw column value into a typed destination.
///
/// This is the coercion seam consumed by [`Row::get`]; unsupported
/// conversions fail with a decode error.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, got: &Value) -> Result<T> {
    Err(Error::decode(
        String::new(),
        format!("cannot convert {got:?} into {expected}"),
    ))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(*v),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => mismatch("bool", other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(*v),
            other => mismatch("i64", other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => i32::try_from(*v)
                .map_err(|_| Error::decode(String::new(), format!("{v} out of range for i32"))),
            other => mismatch("i32", other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => mismatch("f64", other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            Value::Uuid(v) => Ok(v.to_string()),
            other => mismatch("String", other),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Uuid(v) => Ok(*v),
            Value::Text(v) => Uuid::parse_str(v)
                .map_err(|err| Error::decode(String::new(), format!("invalid uuid: {err}"))),
            other => mismatch("Uuid", other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(v) => Ok(*v),
            Value::Text(v) => DateTime::parse_from_rfc3339(v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| Error::decode(String::new(), format!("invalid timestamp: {err}"))),
            other => mismatch("DateTime<Utc>", other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            other => mismatch("Vec<u8>", other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_extracts_typed_columns() {
        let row = Row::from_values(vec![
            Value::Int(1),
            Value::Text("alice".into()),
            Value::Null,
        ]);
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
        assert_eq!(row.get::<String>(1).unwrap(), "alice");
        assert_eq!(row.get::<Option<String>>(2).unwrap(), None);
    }

    #[test]
    fn get_out_of_range_is_a_decode_error() {
        let row = Row::from_values(vec![Value::Int(1)]);
        let err = row.get::<i64>(5).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn mismatched_type_reports_the_column() {
        let row = Row::from_values(vec![Value::Text("x".into())]);
        let err = row.get::<i64>(0).unwrap_err();
        match err {
            Error::Decode { column, .. } => assert_eq!(column, "0"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn int_coerces_into_bool_and_float() {
        assert!(bool::from_value(&Value::Int(1)).unwrap());
        assert_eq!(f64::from_value(&Value::Int(3)).unwrap(), 3.0);
    }
}
