use thiserror::Error;

use crate::{Field, FieldKind, Operator};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Expression not parsed")]
    NotParsed,
    #[error("Evaluator not generated")]
    NotCompiled,
    #[error("Partials not generated")]
    PartialsNotGenerated,
    #[error("Field not found: {0}")]
    FieldNotFound(Field),
    #[error("Field {field} value error: {reason}")]
    FieldValue { field: Field, reason: String },
    #[error("Field {field} is {expected}, got {found}")]
    FieldTypeMismatch {
        field: Field,
        expected: FieldKind,
        found: FieldKind,
    },
    #[error("Operator {0} not allowed on type {1}")]
    OperatorNotAllowedOnType(Operator, FieldKind),
    #[error("Identifier not found: {0}")]
    IdentifierNotFound(String),
    #[error("Macro not found: {0}")]
    MacroNotFound(String),
    #[error("Macro {0} is not a boolean expression")]
    MacroNotExpression(String),
    #[error("Macro {0} is not an array")]
    MacroNotArray(String),
    #[error("Operator {0} doesn't accept an array")]
    ArrayOperand(Operator),
    #[error("Comparing fields of different types: {0} and {1}")]
    DifferentFieldsType(Field, Field),
    #[error("Array mixes {0} and {1} values")]
    MixedArray(FieldKind, FieldKind),
    #[error("Empty list is not allowed")]
    EmptyList,
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
