use lalrpop_util::lalrpop_mod;

use crate::{
    EvalError,
    ast::{Expr, MacroExpr},
};

lalrpop_mod!(#[allow(clippy::all)] pub grammar); // generated by build.rs

/// Parses a rule expression.
pub fn parse_expression(input: &str) -> Result<Expr, EvalError> {
    grammar::ExpressionParser::new()
        .parse(input)
        .map_err(|err| EvalError::Parse(err.to_string()))
}

/// Parses a macro body, which is either a boolean expression or an array of literals.
pub fn parse_macro(input: &str) -> Result<MacroExpr, EvalError> {
    grammar::MacroExpressionParser::new()
        .parse(input)
        .map_err(|err| EvalError::Parse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MultiOperator, Operator, RelationalOperator, StringOperator, Value, ast::Operand,
    };

    fn cmp(field: &str, op: Operator, value: Operand) -> Expr {
        Expr::Compare {
            field: field.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn simple_field_path() {
        let parsed = parse_expression(r#"open.filename == "/etc/passwd""#).unwrap();
        let expected = cmp(
            "open.filename",
            Operator::Relational(RelationalOperator::Equals),
            Operand::Value(Value::String("/etc/passwd".to_string())),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn simple_field_num() {
        let parsed = parse_expression("open.flags >= -3").unwrap();
        let expected = cmp(
            "open.flags",
            Operator::Relational(RelationalOperator::GreaterEqual),
            Operand::Value(Value::Int(-3)),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn no_number_field_start() {
        assert!(parse_expression("4ad == 3").is_err());
    }

    #[test]
    fn keyword_prefix_is_identifier() {
        let parsed = parse_expression("inode == 3").unwrap();
        let expected = cmp(
            "inode",
            Operator::Relational(RelationalOperator::Equals),
            Operand::Value(Value::Int(3)),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn glob_and_not_glob() {
        let parsed = parse_expression(r#"exec.file.path !~ "/usr/bin/*""#).unwrap();
        let expected = Expr::Not {
            inner: Box::new(cmp(
                "exec.file.path",
                Operator::String(StringOperator::Glob),
                Operand::Value(Value::String("/usr/bin/*".to_string())),
            )),
        };
        assert_eq!(parsed, expected);
    }

    #[test]
    fn not_in_list() {
        let parsed = parse_expression(r#"open.filename not in ["/a", "/b"]"#).unwrap();
        let expected = Expr::Not {
            inner: Box::new(cmp(
                "open.filename",
                Operator::Multi(MultiOperator::In),
                Operand::Array(vec![
                    Value::String("/a".to_string()),
                    Value::String("/b".to_string()),
                ]),
            )),
        };
        assert_eq!(parsed, expected);
    }

    #[test]
    fn in_macro() {
        let parsed = parse_expression("open.filename in sensitive_files").unwrap();
        let expected = cmp(
            "open.filename",
            Operator::Multi(MultiOperator::In),
            Operand::Ident("sensitive_files".to_string()),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn precedence() {
        let parsed = parse_expression("a || b && !c").unwrap();
        let expected = Expr::Or {
            l: Box::new(Expr::Ident("a".to_string())),
            r: Box::new(Expr::And {
                l: Box::new(Expr::Ident("b".to_string())),
                r: Box::new(Expr::Not {
                    inner: Box::new(Expr::Ident("c".to_string())),
                }),
            }),
        };
        assert_eq!(parsed, expected);
    }

    #[test]
    fn parenthesis() {
        let parsed = parse_expression("(a || b) && true").unwrap();
        let expected = Expr::And {
            l: Box::new(Expr::Or {
                l: Box::new(Expr::Ident("a".to_string())),
                r: Box::new(Expr::Ident("b".to_string())),
            }),
            r: Box::new(Expr::Bool(true)),
        };
        assert_eq!(parsed, expected);
    }

    #[test]
    fn field_compare() {
        let parsed = parse_expression("process.uid != process.gid").unwrap();
        let expected = cmp(
            "process.uid",
            Operator::Relational(RelationalOperator::NotEquals),
            Operand::Ident("process.gid".to_string()),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn unbalanced() {
        assert!(parse_expression(r#"(open.filename == "/etc/passwd""#).is_err());
        assert!(parse_expression(r#"open.filename == "#).is_err());
        assert!(parse_expression("").is_err());
    }

    #[test]
    fn integer_overflow() {
        assert!(parse_expression("open.flags == 99999999999999999999").is_err());
    }

    #[test]
    fn macro_array() {
        let parsed = parse_macro(r#"["/etc/passwd", "/etc/shadow"]"#).unwrap();
        let expected = MacroExpr::Array(vec![
            Value::String("/etc/passwd".to_string()),
            Value::String("/etc/shadow".to_string()),
        ]);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn macro_expression() {
        let parsed = parse_macro("process.is_root").unwrap();
        assert_eq!(
            parsed,
            MacroExpr::Expression(Expr::Ident("process.is_root".to_string()))
        );
    }
}
