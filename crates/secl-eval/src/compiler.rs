//! Validation of parsed expressions against a [Model] and compilation into closures.
//!
//! An [Expr] is first checked and turned into a tree of [Node]s, whose leaves
//! are single comparisons already bound to their fields and literals. The tree
//! is then compiled twice:
//!
//! - into a single boolean closure, used for full evaluation;
//! - into one closure per referenced field, returning a three-valued result,
//!   used for partial evaluation. Leaves depending on fields other than the
//!   pinned one are unknown and the logical operators follow Kleene logic.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    EvalError, EventType, Field, FieldKind, FieldSpec, FieldValue, FieldValueType, Model,
    MultiOperator, Operator, RelationalOperator, StringOperator, Value,
    ast::{Expr, MacroExpr, Operand},
    context::Context,
    macros::MacroStore,
};

pub(crate) type LeafFn = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Compiled boolean evaluator.
pub type EvalFn = Box<dyn Fn(&Context) -> bool + Send + Sync>;

/// Compiled partial evaluator: `None` means the result depends on other fields.
pub(crate) type PartialFn = Box<dyn Fn(&Context) -> Option<bool> + Send + Sync>;

/// Options used while generating evaluators.
///
/// `macros` holds the macros compiled so far in the current load: an
/// expression can reference any of them.
#[derive(Clone, Copy)]
pub struct CompileOpts<'a> {
    pub constants: &'a HashMap<String, Value>,
    pub macros: &'a MacroStore,
}

/// Validated expression tree.
pub(crate) enum Node {
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Const(bool),
    Leaf { fields: Vec<Field>, eval: LeafFn },
}

/// Result of the validation of an expression.
pub(crate) struct Compiled {
    pub(crate) node: Node,
    pub(crate) fields: Vec<Field>,
    pub(crate) event_types: Vec<EventType>,
    pub(crate) field_values: Vec<FieldValue>,
}

pub(crate) fn compile_expr(
    expr: &Expr,
    model: &dyn Model,
    opts: &CompileOpts,
) -> Result<Compiled, EvalError> {
    let mut compiler = Compiler::new(model, opts);
    let node = compiler.expr(expr)?;
    Ok(compiler.finish(node))
}

/// Validates a macro body. Arrays are only checked for emptiness and
/// homogeneity, their type is bound where the macro is used.
pub(crate) fn compile_macro(
    body: &MacroExpr,
    model: &dyn Model,
    opts: &CompileOpts,
) -> Result<Vec<Field>, EvalError> {
    match body {
        MacroExpr::Expression(expr) => compile_expr(expr, model, opts).map(|c| c.fields),
        MacroExpr::Array(values) => {
            let Some(first) = values.first() else {
                return Err(EvalError::EmptyList);
            };
            let kind = first.kind();
            if let Some(other) = values.iter().find(|v| v.kind() != kind) {
                return Err(EvalError::MixedArray(kind, other.kind()));
            }
            Ok(Vec::new())
        }
    }
}

struct Compiler<'a> {
    model: &'a dyn Model,
    opts: &'a CompileOpts<'a>,
    fields: Vec<Field>,
    event_types: Vec<EventType>,
    field_values: Vec<FieldValue>,
}

impl<'a> Compiler<'a> {
    fn new(model: &'a dyn Model, opts: &'a CompileOpts<'a>) -> Self {
        Self {
            model,
            opts,
            fields: Vec::new(),
            event_types: Vec::new(),
            field_values: Vec::new(),
        }
    }

    fn finish(self, node: Node) -> Compiled {
        Compiled {
            node,
            fields: self.fields,
            event_types: self.event_types,
            field_values: self.field_values,
        }
    }

    /// Resolves a field on the model, recording it and its event type.
    fn field(&mut self, name: &str) -> Result<FieldSpec, EvalError> {
        let spec = self.model.field_spec(name)?;

        if !self.fields.iter().any(|f| f == name) {
            self.fields.push(name.to_string());
        }
        if let Some(event_type) = &spec.event_type {
            if !self.event_types.contains(event_type) {
                self.event_types.push(event_type.clone());
            }
        }

        Ok(spec)
    }

    fn expr(&mut self, expr: &Expr) -> Result<Node, EvalError> {
        match expr {
            Expr::And { l, r } => Ok(Node::And(Box::new(self.expr(l)?), Box::new(self.expr(r)?))),
            Expr::Or { l, r } => Ok(Node::Or(Box::new(self.expr(l)?), Box::new(self.expr(r)?))),
            Expr::Not { inner } => Ok(Node::Not(Box::new(self.expr(inner)?))),
            Expr::Bool(b) => Ok(Node::Const(*b)),
            Expr::Ident(name) => self.ident(name),
            Expr::Compare { field, op, value } => self.compare(field, *op, value),
        }
    }

    fn ident(&mut self, name: &str) -> Result<Node, EvalError> {
        let macros = self.opts.macros;
        if let Some(m) = macros.get(name) {
            return match m.body() {
                Some(MacroExpr::Expression(expr)) => self.expr(expr),
                Some(MacroExpr::Array(_)) => Err(EvalError::MacroNotExpression(name.to_string())),
                None => Err(EvalError::NotParsed),
            };
        }

        let spec = self.field(name)?;
        if spec.kind != FieldKind::Bool {
            return Err(EvalError::FieldTypeMismatch {
                field: name.to_string(),
                expected: FieldKind::Bool,
                found: spec.kind,
            });
        }

        let field = name.to_string();
        Ok(Node::Leaf {
            fields: vec![field.clone()],
            eval: Arc::new(move |ctx| {
                ctx.resolve(&field, |v| *v == Value::Bool(true))
                    .unwrap_or(false)
            }),
        })
    }

    fn compare(&mut self, field: &str, op: Operator, value: &Operand) -> Result<Node, EvalError> {
        let spec = self.field(field)?;
        check_operator(op, spec.kind)?;

        match (op, value) {
            (Operator::Multi(MultiOperator::In), Operand::Array(values)) => {
                self.membership(field, &spec, values)
            }
            (Operator::Multi(MultiOperator::In), Operand::Value(value)) => {
                self.membership(field, &spec, std::slice::from_ref(value))
            }
            (Operator::Multi(MultiOperator::In), Operand::Ident(name)) => {
                let macros = self.opts.macros;
                let m = macros
                    .get(name)
                    .ok_or_else(|| EvalError::MacroNotFound(name.clone()))?;
                match m.body() {
                    Some(MacroExpr::Array(values)) => self.membership(field, &spec, values),
                    Some(MacroExpr::Expression(_)) => Err(EvalError::MacroNotArray(name.clone())),
                    None => Err(EvalError::NotParsed),
                }
            }
            (_, Operand::Array(_)) => Err(EvalError::ArrayOperand(op)),
            (_, Operand::Value(value)) => self.literal(field, &spec, op, value.clone()),
            (_, Operand::Ident(name)) => {
                if let Some(constant) = self.opts.constants.get(name) {
                    self.literal(field, &spec, op, constant.clone())
                } else {
                    self.fields_compare(field, &spec, op, name)
                }
            }
        }
    }

    fn literal(
        &mut self,
        field: &str,
        spec: &FieldSpec,
        op: Operator,
        literal: Value,
    ) -> Result<Node, EvalError> {
        check_literal(field, spec, &literal)?;

        let name = field.to_string();
        let eval: LeafFn = match op {
            Operator::Relational(rel) => {
                self.record(field, literal.clone(), FieldValueType::Scalar);
                Arc::new(move |ctx| {
                    ctx.resolve(&name, |v| compare_values(rel, v, &literal))
                        .unwrap_or(false)
                })
            }
            Operator::String(StringOperator::Glob) => {
                let Value::String(raw) = &literal else {
                    return Err(EvalError::OperatorNotAllowedOnType(op, literal.kind()));
                };
                let pattern =
                    glob::Pattern::new(raw).map_err(|err| EvalError::InvalidPattern {
                        pattern: raw.clone(),
                        reason: err.to_string(),
                    })?;
                self.record(field, literal.clone(), FieldValueType::Pattern);
                Arc::new(move |ctx| {
                    ctx.resolve(&name, |v| v.as_str().is_some_and(|s| pattern.matches(s)))
                        .unwrap_or(false)
                })
            }
            Operator::Multi(MultiOperator::In) => {
                return self.membership(field, spec, std::slice::from_ref(&literal));
            }
        };

        Ok(Node::Leaf {
            fields: vec![field.to_string()],
            eval,
        })
    }

    fn membership(
        &mut self,
        field: &str,
        spec: &FieldSpec,
        values: &[Value],
    ) -> Result<Node, EvalError> {
        if values.is_empty() {
            return Err(EvalError::EmptyList);
        }

        let mut set = HashSet::with_capacity(values.len());
        for value in values {
            check_literal(field, spec, value)?;
            self.record(field, value.clone(), FieldValueType::Scalar);
            set.insert(value.clone());
        }

        let name = field.to_string();
        Ok(Node::Leaf {
            fields: vec![field.to_string()],
            eval: Arc::new(move |ctx| ctx.resolve(&name, |v| set.contains(v)).unwrap_or(false)),
        })
    }

    fn fields_compare(
        &mut self,
        field: &str,
        spec: &FieldSpec,
        op: Operator,
        other: &str,
    ) -> Result<Node, EvalError> {
        // neither a constant nor a field
        let other_spec = self.field(other).map_err(|err| match err {
            EvalError::FieldNotFound(_) => EvalError::IdentifierNotFound(other.to_string()),
            err => err,
        })?;
        if other_spec.kind != spec.kind {
            return Err(EvalError::DifferentFieldsType(
                field.to_string(),
                other.to_string(),
            ));
        }

        let Operator::Relational(rel) = op else {
            return Err(EvalError::OperatorNotAllowedOnType(op, spec.kind));
        };

        let first = field.to_string();
        let second = other.to_string();
        Ok(Node::Leaf {
            fields: vec![first.clone(), second.clone()],
            eval: Arc::new(move |ctx| match (ctx.value(&first), ctx.value(&second)) {
                (Some(a), Some(b)) => compare_values(rel, &a, &b),
                _ => false,
            }),
        })
    }

    fn record(&mut self, field: &str, value: Value, value_type: FieldValueType) {
        let field_value = FieldValue {
            field: field.to_string(),
            value,
            value_type,
        };
        if !self.field_values.contains(&field_value) {
            self.field_values.push(field_value);
        }
    }
}

fn check_operator(op: Operator, kind: FieldKind) -> Result<(), EvalError> {
    let allowed = match (op, kind) {
        (Operator::Relational(rel), FieldKind::Bool) => rel.is_equality(),
        (Operator::Relational(_), _) => true,
        (Operator::String(_), FieldKind::String) => true,
        (Operator::String(_), _) => false,
        (Operator::Multi(_), _) => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(EvalError::OperatorNotAllowedOnType(op, kind))
    }
}

fn check_literal(field: &str, spec: &FieldSpec, literal: &Value) -> Result<(), EvalError> {
    if literal.kind() == spec.kind {
        Ok(())
    } else {
        Err(EvalError::FieldTypeMismatch {
            field: field.to_string(),
            expected: spec.kind,
            found: literal.kind(),
        })
    }
}

fn compare_values(op: RelationalOperator, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => op.apply(a, b),
        (Value::String(a), Value::String(b)) => op.apply(a.as_str(), b.as_str()),
        (Value::Bool(a), Value::Bool(b)) => op.apply(a, b),
        _ => false,
    }
}

/// Compiles a [Node] tree into a single closure.
pub(crate) fn generate_closures(node: &Node) -> EvalFn {
    match node {
        Node::And(l, r) => {
            let l = generate_closures(l);
            let r = generate_closures(r);
            Box::new(move |ctx| (l)(ctx) && (r)(ctx))
        }
        Node::Or(l, r) => {
            let l = generate_closures(l);
            let r = generate_closures(r);
            Box::new(move |ctx| (l)(ctx) || (r)(ctx))
        }
        Node::Not(inner) => {
            let inner = generate_closures(inner);
            Box::new(move |ctx| !(inner)(ctx))
        }
        Node::Const(b) => {
            let b = *b;
            Box::new(move |_| b)
        }
        Node::Leaf { eval, .. } => {
            let eval = eval.clone();
            Box::new(move |ctx| eval(ctx))
        }
    }
}

/// Partial evaluator under construction. Constant sub-trees are folded away.
enum Partial {
    Fixed(bool),
    Unknown,
    Dynamic(PartialFn),
}

/// Compiles the partial evaluator of a [Node] tree for `field`.
pub(crate) fn generate_partial(node: &Node, field: &str) -> PartialFn {
    match partial(node, field) {
        Partial::Fixed(b) => Box::new(move |_| Some(b)),
        Partial::Unknown => Box::new(|_| None),
        Partial::Dynamic(f) => f,
    }
}

fn partial(node: &Node, field: &str) -> Partial {
    match node {
        Node::Const(b) => Partial::Fixed(*b),
        Node::Leaf { fields, eval } => {
            if fields.iter().all(|f| f == field) {
                let eval = eval.clone();
                Partial::Dynamic(Box::new(move |ctx| Some(eval(ctx))))
            } else {
                Partial::Unknown
            }
        }
        Node::Not(inner) => match partial(inner, field) {
            Partial::Fixed(b) => Partial::Fixed(!b),
            Partial::Unknown => Partial::Unknown,
            Partial::Dynamic(f) => Partial::Dynamic(Box::new(move |ctx| f(ctx).map(|b| !b))),
        },
        Node::And(l, r) => match (partial(l, field), partial(r, field)) {
            (Partial::Fixed(false), _) | (_, Partial::Fixed(false)) => Partial::Fixed(false),
            (Partial::Fixed(true), other) | (other, Partial::Fixed(true)) => other,
            (Partial::Unknown, Partial::Unknown) => Partial::Unknown,
            (Partial::Unknown, Partial::Dynamic(f)) | (Partial::Dynamic(f), Partial::Unknown) => {
                Partial::Dynamic(Box::new(move |ctx| match f(ctx) {
                    Some(false) => Some(false),
                    _ => None,
                }))
            }
            (Partial::Dynamic(l), Partial::Dynamic(r)) => {
                Partial::Dynamic(Box::new(move |ctx| kleene_and(l(ctx), r(ctx))))
            }
        },
        Node::Or(l, r) => match (partial(l, field), partial(r, field)) {
            (Partial::Fixed(true), _) | (_, Partial::Fixed(true)) => Partial::Fixed(true),
            (Partial::Fixed(false), other) | (other, Partial::Fixed(false)) => other,
            (Partial::Unknown, Partial::Unknown) => Partial::Unknown,
            (Partial::Unknown, Partial::Dynamic(f)) | (Partial::Dynamic(f), Partial::Unknown) => {
                Partial::Dynamic(Box::new(move |ctx| match f(ctx) {
                    Some(true) => Some(true),
                    _ => None,
                }))
            }
            (Partial::Dynamic(l), Partial::Dynamic(r)) => {
                Partial::Dynamic(Box::new(move |ctx| kleene_or(l(ctx), r(ctx))))
            }
        },
    }
}

fn kleene_and(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn kleene_or(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}
