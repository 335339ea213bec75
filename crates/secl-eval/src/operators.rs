//! This module contains operators available on field values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Enum of all possible operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum Operator {
    Relational(RelationalOperator),
    String(StringOperator),
    Multi(MultiOperator),
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operator::Relational(op) => write!(f, "{op}"),
            Operator::String(op) => write!(f, "{op}"),
            Operator::Multi(op) => write!(f, "{op}"),
        }
    }
}

/// Operators intended to be used on strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StringOperator {
    Glob,
}

impl fmt::Display for StringOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StringOperator::Glob => write!(f, "=~"),
        }
    }
}

/// Relational operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelationalOperator {
    Equals,
    NotEquals,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

impl RelationalOperator {
    pub fn apply<T: PartialEq + PartialOrd + ?Sized>(&self, first: &T, second: &T) -> bool {
        match self {
            RelationalOperator::Equals => first == second,
            RelationalOperator::NotEquals => first != second,
            RelationalOperator::Greater => first > second,
            RelationalOperator::Less => first < second,
            RelationalOperator::GreaterEqual => first >= second,
            RelationalOperator::LessEqual => first <= second,
        }
    }

    /// Whether the operator only checks for (in)equality.
    pub fn is_equality(&self) -> bool {
        matches!(
            self,
            RelationalOperator::Equals | RelationalOperator::NotEquals
        )
    }
}

impl fmt::Display for RelationalOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            RelationalOperator::Equals => "==",
            RelationalOperator::NotEquals => "!=",
            RelationalOperator::Greater => ">",
            RelationalOperator::Less => "<",
            RelationalOperator::GreaterEqual => ">=",
            RelationalOperator::LessEqual => "<=",
        };
        write!(f, "{s}")
    }
}

/// Operators intended to be used with arrays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MultiOperator {
    In,
}

impl fmt::Display for MultiOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MultiOperator::In => write!(f, "in"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relational_apply() {
        assert!(RelationalOperator::LessEqual.apply(&3, &3));
        assert!(RelationalOperator::LessEqual.apply(&2, &3));
        assert!(!RelationalOperator::LessEqual.apply(&4, &3));
        assert!(RelationalOperator::Greater.apply("b", "a"));
        assert!(RelationalOperator::NotEquals.apply(&true, &false));
    }

    #[test]
    fn display() {
        assert_eq!(
            Operator::Relational(RelationalOperator::GreaterEqual).to_string(),
            ">="
        );
        assert_eq!(Operator::String(StringOperator::Glob).to_string(), "=~");
        assert_eq!(Operator::Multi(MultiOperator::In).to_string(), "in");
    }
}
