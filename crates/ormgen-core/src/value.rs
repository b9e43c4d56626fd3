//! Runtime values stored in records and used in lookups.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{FieldType, ScalarType};
use crate::error::Error;

/// A runtime value held by a record column.
///
/// It maps to the scalar types defined in the catalog. Rows are persisted with
/// serde's externally tagged encoding of this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// UUID as 16 bytes.
    Uuid([u8; 16]),
}

/// Hashable projection of a [`Value`], used as the key of in-memory joins.
///
/// Both integer widths share one variant so that an `Int32` foreign key matches
/// an `Int64` identity. Nulls and floats never produce a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoinKey {
    /// Boolean key.
    Bool(bool),
    /// Integer key.
    Int(i64),
    /// Timestamp key.
    Timestamp(i64),
    /// String key.
    String(String),
    /// UUID key.
    Uuid([u8; 16]),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as UUID.
    pub fn as_uuid(&self) -> Option<&[u8; 16]> {
        match self {
            Value::Uuid(u) => Some(u),
            _ => None,
        }
    }

    /// Project this value onto a hashable join key.
    pub fn join_key(&self) -> Option<JoinKey> {
        match self {
            Value::Null | Value::Float64(_) => None,
            Value::Bool(b) => Some(JoinKey::Bool(*b)),
            Value::Int32(i) => Some(JoinKey::Int(*i as i64)),
            Value::Int64(i) => Some(JoinKey::Int(*i)),
            Value::String(s) => Some(JoinKey::String(s.clone())),
            Value::Timestamp(t) => Some(JoinKey::Timestamp(*t)),
            Value::Uuid(u) => Some(JoinKey::Uuid(*u)),
        }
    }

    /// Parse query-string text into a value of the given field type.
    pub fn parse(text: &str, field_type: &FieldType, field: &str) -> Result<Value, Error> {
        let invalid = |message: String| Error::InvalidValue {
            field: field.to_string(),
            message,
        };

        if field_type.is_optional() && text.is_empty() {
            return Ok(Value::Null);
        }

        match field_type.scalar_type() {
            ScalarType::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                other => Err(invalid(format!("'{}' is not a boolean", other))),
            },
            ScalarType::Int32 => text
                .trim()
                .parse::<i32>()
                .map(Value::Int32)
                .map_err(|e| invalid(e.to_string())),
            ScalarType::Int64 => text
                .trim()
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| invalid(e.to_string())),
            ScalarType::Float64 => text
                .trim()
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|e| invalid(e.to_string())),
            ScalarType::String => Ok(Value::String(text.to_string())),
            ScalarType::Timestamp => text
                .trim()
                .parse::<i64>()
                .map(Value::Timestamp)
                .map_err(|e| invalid(e.to_string())),
            ScalarType::Uuid => parse_uuid(text).map(Value::Uuid).map_err(invalid),
        }
    }

    /// Convert a JSON value into a value of the given field type.
    pub fn from_json(
        json: &serde_json::Value,
        field_type: &FieldType,
        field: &str,
    ) -> Result<Value, Error> {
        let invalid = |message: &str| Error::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        };

        match json {
            serde_json::Value::Null if field_type.is_optional() => Ok(Value::Null),
            serde_json::Value::Null => Err(invalid("this field cannot be null")),
            serde_json::Value::String(s) => Value::parse(s, field_type, field),
            serde_json::Value::Bool(b) => match field_type.scalar_type() {
                ScalarType::Bool => Ok(Value::Bool(*b)),
                _ => Err(invalid("unexpected boolean")),
            },
            serde_json::Value::Number(n) => match field_type.scalar_type() {
                ScalarType::Int32 => n
                    .as_i64()
                    .and_then(|i| i32::try_from(i).ok())
                    .map(Value::Int32)
                    .ok_or_else(|| invalid("expected a 32-bit integer")),
                ScalarType::Int64 => n
                    .as_i64()
                    .map(Value::Int64)
                    .ok_or_else(|| invalid("expected an integer")),
                ScalarType::Timestamp => n
                    .as_i64()
                    .map(Value::Timestamp)
                    .ok_or_else(|| invalid("expected a timestamp")),
                ScalarType::Float64 => n
                    .as_f64()
                    .map(Value::Float64)
                    .ok_or_else(|| invalid("expected a number")),
                ScalarType::String => Ok(Value::String(n.to_string())),
                _ => Err(invalid("unexpected number")),
            },
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err(invalid("expected a scalar"))
            }
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int32(i) => serde_json::json!(i),
            Value::Int64(i) => serde_json::json!(i),
            Value::Float64(f) => serde_json::json!(f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(t) => serde_json::json!(t),
            Value::Uuid(u) => serde_json::Value::String(hex::encode(u)),
        }
    }
}

fn parse_uuid(text: &str) -> Result<[u8; 16], String> {
    let compact: String = text.trim().chars().filter(|c| *c != '-').collect();
    let bytes = hex::decode(&compact).map_err(|e| e.to_string())?;
    <[u8; 16]>::try_from(bytes.as_slice()).map_err(|_| "expected 16 bytes".to_string())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Timestamp(t) => write!(f, "{}", t),
            Value::Uuid(u) => f.write_str(&hex::encode(u)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_key_unifies_integer_widths() {
        assert_eq!(Value::Int32(7).join_key(), Value::Int64(7).join_key());
        assert_eq!(Value::Null.join_key(), None);
        assert_eq!(Value::Float64(1.5).join_key(), None);
    }

    #[test]
    fn test_parse_typed_text() {
        let int = FieldType::Scalar(ScalarType::Int64);
        assert_eq!(Value::parse("42", &int, "id").unwrap(), Value::Int64(42));
        assert!(Value::parse("abc", &int, "id").is_err());

        let flag = FieldType::Scalar(ScalarType::Bool);
        assert_eq!(Value::parse("Yes", &flag, "f").unwrap(), Value::Bool(true));

        let optional = FieldType::OptionalScalar(ScalarType::Int64);
        assert_eq!(Value::parse("", &optional, "n").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_uuid_with_hyphens() {
        let uuid = FieldType::Scalar(ScalarType::Uuid);
        let value = Value::parse("00010203-0405-0607-0809-0a0b0c0d0e0f", &uuid, "id").unwrap();
        assert_eq!(
            value,
            Value::Uuid([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15])
        );
        assert_eq!(value.to_string(), "000102030405060708090a0b0c0d0e0f");
    }

    #[test]
    fn test_from_json_rejects_null_for_required() {
        let text = FieldType::Scalar(ScalarType::String);
        assert!(Value::from_json(&serde_json::Value::Null, &text, "title").is_err());

        let optional = FieldType::OptionalScalar(ScalarType::String);
        assert_eq!(
            Value::from_json(&serde_json::Value::Null, &optional, "title").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_from_json_numbers() {
        let small = FieldType::Scalar(ScalarType::Int32);
        assert_eq!(
            Value::from_json(&serde_json::json!(12), &small, "n").unwrap(),
            Value::Int32(12)
        );
        assert!(Value::from_json(&serde_json::json!(5_000_000_000i64), &small, "n").is_err());
    }

    #[test]
    fn test_display_null_is_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from("x").to_string(), "x");
    }
}
