use crate::error::RunError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Boolean,
    Int,
    StringList,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Int => write!(f, "int"),
            ValueType::StringList => write!(f, "list"),
        }
    }
}

/// A resolved or declared datum.
///
/// `Null` is string-typed and reads permissively as `false`, `0`, an empty list or
/// an empty string. Reading a non-null value as the wrong type is an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null | Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Boolean,
            Value::Int(_) => ValueType::Int,
            Value::List(_) => ValueType::StringList,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Result<&str, RunError> {
        match self {
            Value::String(s) => Ok(s),
            Value::Null => Ok(""),
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RunError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(other.mismatch(ValueType::Boolean)),
        }
    }

    pub fn as_int(&self) -> Result<i64, RunError> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Null => Ok(0),
            other => Err(other.mismatch(ValueType::Int)),
        }
    }

    pub fn as_list(&self) -> Result<&[String], RunError> {
        match self {
            Value::List(items) => Ok(items),
            Value::Null => Ok(&[]),
            other => Err(other.mismatch(ValueType::StringList)),
        }
    }

    /// Parses a raw string, as supplied by a caller or a prompt, into a value of
    /// the given type.
    pub fn parse_as(value_type: ValueType, raw: &str) -> Result<Value, RunError> {
        let trimmed = raw.trim();
        match value_type {
            ValueType::String => Ok(Value::String(raw.to_string())),
            ValueType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" => Ok(Value::Bool(true)),
                "false" | "no" | "n" => Ok(Value::Bool(false)),
                _ => Err(Value::String(raw.to_string()).mismatch(ValueType::Boolean)),
            },
            ValueType::Int => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Value::String(raw.to_string()).mismatch(ValueType::Int)),
            ValueType::StringList => Ok(Value::List(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }

    fn mismatch(&self, expected: ValueType) -> RunError {
        RunError::ValueTypeMismatch {
            expected,
            found: self.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value)
    }
}

impl From<Vec<&str>> for Value {
    fn from(value: Vec<&str>) -> Self {
        Value::List(value.into_iter().map(str::to_string).collect())
    }
}
