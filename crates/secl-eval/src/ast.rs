use serde::{Deserialize, Serialize};

use crate::{Operator, Value};

/// Boolean expression produced by the parser, before validation against a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum Expr {
    And {
        l: Box<Expr>,
        r: Box<Expr>,
    },
    Or {
        l: Box<Expr>,
        r: Box<Expr>,
    },
    Not {
        inner: Box<Expr>,
    },
    Bool(bool),
    /// Bare identifier: a boolean field or a boolean macro.
    Ident(String),
    Compare {
        field: String,
        op: Operator,
        value: Operand,
    },
}

/// Right side of a comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum Operand {
    Value(Value),
    Array(Vec<Value>),
    /// A constant, another field or an array macro.
    Ident(String),
}

/// Body of a macro.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum MacroExpr {
    Expression(Expr),
    Array(Vec<Value>),
}

impl Expr {
    pub(crate) fn and(l: Expr, r: Expr) -> Self {
        Expr::And {
            l: Box::new(l),
            r: Box::new(r),
        }
    }

    pub(crate) fn or(l: Expr, r: Expr) -> Self {
        Expr::Or {
            l: Box::new(l),
            r: Box::new(r),
        }
    }

    pub(crate) fn not(inner: Expr) -> Self {
        Expr::Not {
            inner: Box::new(inner),
        }
    }

    pub(crate) fn compare(field: &str, op: Operator, value: Operand) -> Self {
        Expr::Compare {
            field: field.to_string(),
            op,
            value,
        }
    }
}

/// Strips the quotes of a string literal and resolves `\"` and `\\` escapes.
pub(crate) fn unquote(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::unquote;

    #[test]
    fn unquote_escapes() {
        assert_eq!(unquote(r#""/etc/passwd""#), "/etc/passwd");
        assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unquote(r#""a\\b""#), r"a\b");
        assert_eq!(unquote(r#""/tmp/*\n""#), r"/tmp/*\n");
        assert_eq!(unquote(r#""""#), "");
    }
}
