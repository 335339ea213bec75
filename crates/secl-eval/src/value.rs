//! Runtime values carried by events and literals carried by expressions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Field;

/// A concrete value, either read from an event or written in an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Bool(_) => FieldKind::Bool,
            Value::Int(_) => FieldKind::Int,
            Value::String(_) => FieldKind::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parses a configuration string, trying bool, then integer, then falling back to string.
    pub fn parse_loose(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            Value::Bool(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            Value::Int(i)
        } else {
            Value::String(raw.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    Int,
    String,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Int => write!(f, "int"),
            FieldKind::String => write!(f, "string"),
        }
    }
}

/// How a literal is compared against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldValueType {
    /// Exact value, used by equality and membership.
    Scalar,
    /// Glob pattern.
    Pattern,
}

/// A literal a rule compares `field` against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldValue {
    pub field: Field,
    pub value: Value,
    pub value_type: FieldValueType,
}
