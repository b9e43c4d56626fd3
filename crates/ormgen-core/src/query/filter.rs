//! Filter conditions and their evaluation against column values.

use std::cmp::Ordering;

use super::lookup::{LookupOp, ResolvedLookup};
use crate::catalog::FieldType;
use crate::error::Error;
use crate::value::Value;

/// Right-hand side of a condition, already coerced to the column type.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Single value.
    Value(Value),
    /// Candidate values for `in`.
    List(Vec<Value>),
    /// Expected nullness for `isnull`.
    IsNull(bool),
    /// Text for string-matching operators.
    Text(String),
}

impl Operand {
    /// Coerce a value for `op` against a column of `field_type`.
    ///
    /// String values are parsed into the column type; `in` accepts a
    /// comma-separated string.
    pub fn coerce(
        op: LookupOp,
        field_type: &FieldType,
        field: &str,
        value: Value,
    ) -> Result<Self, Error> {
        match op {
            LookupOp::IsNull => {
                let flag = match &value {
                    Value::Bool(b) => *b,
                    Value::String(s) => match s.to_ascii_lowercase().as_str() {
                        "true" | "1" => true,
                        "false" | "0" => false,
                        _ => return Err(invalid(field, "isnull expects true or false")),
                    },
                    Value::Int32(1) | Value::Int64(1) => true,
                    Value::Int32(0) | Value::Int64(0) => false,
                    _ => return Err(invalid(field, "isnull expects true or false")),
                };
                Ok(Operand::IsNull(flag))
            }
            LookupOp::In => match value {
                Value::String(s) => {
                    let items = s
                        .split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(|item| Value::parse(item, field_type, field))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Operand::List(items))
                }
                other => Ok(Operand::List(vec![coerce_value(field_type, field, other)?])),
            },
            op if op.is_text() => match value {
                Value::Null => Err(invalid(field, "text lookups do not accept null")),
                other => Ok(Operand::Text(other.to_string())),
            },
            _ => Ok(Operand::Value(coerce_value(field_type, field, value)?)),
        }
    }

    /// Coerce a list of values for `in`.
    pub fn coerce_list(
        field_type: &FieldType,
        field: &str,
        values: Vec<Value>,
    ) -> Result<Self, Error> {
        values
            .into_iter()
            .map(|v| coerce_value(field_type, field, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Operand::List)
    }
}

fn invalid(field: &str, message: &str) -> Error {
    Error::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn coerce_value(field_type: &FieldType, field: &str, value: Value) -> Result<Value, Error> {
    match value {
        Value::String(s) => Value::parse(&s, field_type, field),
        Value::Null => Ok(Value::Null),
        other => {
            let compatible = match (&other, field_type.scalar_type()) {
                (Value::Bool(_), crate::catalog::ScalarType::Bool) => true,
                (Value::Int32(_) | Value::Int64(_), s) if s.is_numeric() => true,
                (Value::Int32(_) | Value::Int64(_), crate::catalog::ScalarType::Timestamp) => true,
                (Value::Float64(_), crate::catalog::ScalarType::Float64) => true,
                (Value::Timestamp(_), crate::catalog::ScalarType::Timestamp) => true,
                (Value::Uuid(_), crate::catalog::ScalarType::Uuid) => true,
                _ => false,
            };
            if compatible {
                Ok(other)
            } else {
                Err(invalid(
                    field,
                    &format!("{:?} does not match {:?}", other, field_type),
                ))
            }
        }
    }
}

/// One resolved lookup with its coerced operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Resolved lookup.
    pub lookup: ResolvedLookup,
    /// Coerced right-hand side.
    pub operand: Operand,
}

impl Condition {
    /// Evaluate the condition's operator against one column value.
    pub fn matches_value(&self, value: &Value) -> bool {
        FilterEvaluator::evaluate(self.lookup.op, &self.operand, value)
    }
}

/// A clause of a query's `WHERE`; clauses are combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Single condition.
    Condition(Condition),
    /// Any of the conditions must hold.
    AnyOf(Vec<Condition>),
}

/// Evaluates lookup operators against values.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Evaluate `value <op> operand`.
    pub fn evaluate(op: LookupOp, operand: &Operand, value: &Value) -> bool {
        match (op, operand) {
            (LookupOp::IsNull, Operand::IsNull(expected)) => value.is_null() == *expected,
            (_, _) if value.is_null() => {
                // only `exact None` matches a null column
                matches!(operand, Operand::Value(Value::Null)) && op == LookupOp::Exact
            }
            (LookupOp::In, Operand::List(items)) => {
                items.iter().any(|item| Self::values_equal(value, item))
            }
            (LookupOp::Exact, Operand::Value(expected)) => Self::values_equal(value, expected),
            (LookupOp::Gt, Operand::Value(b)) => Self::compare(value, b, |o| o.is_gt()),
            (LookupOp::Gte, Operand::Value(b)) => Self::compare(value, b, |o| o.is_ge()),
            (LookupOp::Lt, Operand::Value(b)) => Self::compare(value, b, |o| o.is_lt()),
            (LookupOp::Lte, Operand::Value(b)) => Self::compare(value, b, |o| o.is_le()),
            (op, Operand::Text(needle)) => Self::text_match(op, &value.to_string(), needle),
            _ => false,
        }
    }

    fn compare(a: &Value, b: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        Self::compare_values(a, b).is_some_and(accept)
    }

    fn text_match(op: LookupOp, haystack: &str, needle: &str) -> bool {
        match op {
            LookupOp::Contains => haystack.contains(needle),
            LookupOp::StartsWith => haystack.starts_with(needle),
            LookupOp::EndsWith => haystack.ends_with(needle),
            LookupOp::IExact => haystack.to_lowercase() == needle.to_lowercase(),
            LookupOp::IContains => haystack.to_lowercase().contains(&needle.to_lowercase()),
            LookupOp::IStartsWith => haystack.to_lowercase().starts_with(&needle.to_lowercase()),
            LookupOp::IEndsWith => haystack.to_lowercase().ends_with(&needle.to_lowercase()),
            _ => false,
        }
    }

    /// Equality with integer width and float coercion.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
                a.as_i64() == b.as_i64()
            }
            (Value::Float64(_), _) | (_, Value::Float64(_)) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
            (Value::Timestamp(x), Value::Int64(y)) | (Value::Int64(y), Value::Timestamp(x)) => {
                x == y
            }
            _ => a == b,
        }
    }

    /// Ordering of two values of compatible types.
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
                Some(a.as_i64()?.cmp(&b.as_i64()?))
            }
            (Value::Float64(_), _) | (_, Value::Float64(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting; nulls sort first.
    pub fn sort_order(a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Self::compare_values(a, b).unwrap_or(Ordering::Equal),
        }
    }
}
