use std::{collections::HashMap, fmt, sync::OnceLock};

use crate::{
    EvalError, EventType, Field, FieldValue, Model,
    ast::Expr,
    compiler::{
        CompileOpts, Compiled, EvalFn, Node, PartialFn, compile_expr, generate_closures,
        generate_partial,
    },
    context::Context,
    parser,
};

pub type RuleId = String;

/// Executable form of a rule expression.
pub struct RuleEvaluator {
    event_types: Vec<EventType>,
    fields: Vec<Field>,
    field_values: Vec<FieldValue>,
    node: Node,
    eval: EvalFn,
}

impl RuleEvaluator {
    fn from_compiled(compiled: Compiled) -> Self {
        let eval = generate_closures(&compiled.node);
        Self {
            event_types: compiled.event_types,
            fields: compiled.fields,
            field_values: compiled.field_values,
            node: compiled.node,
            eval,
        }
    }

    pub fn eval(&self, ctx: &Context) -> bool {
        (self.eval)(ctx)
    }

    /// Event types of the fields referenced by the expression.
    pub fn event_types(&self) -> &[EventType] {
        &self.event_types
    }

    /// Distinct fields referenced by the expression, in order of appearance.
    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }
}

/// A rule expression going through its lifecycle: [Rule::parse],
/// [Rule::gen_evaluator], then [Rule::gen_partials] once all the rules of a
/// load are known.
pub struct Rule {
    pub id: RuleId,
    pub expression: String,
    pub tags: Vec<String>,
    ast: Option<Expr>,
    evaluator: Option<RuleEvaluator>,
    partials: OnceLock<HashMap<Field, PartialFn>>,
}

impl Rule {
    pub fn new(id: &str, expression: &str, tags: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            expression: expression.to_string(),
            tags,
            ast: None,
            evaluator: None,
            partials: OnceLock::new(),
        }
    }

    pub fn parse(&mut self) -> Result<(), EvalError> {
        self.ast = Some(parser::parse_expression(&self.expression)?);
        Ok(())
    }

    pub fn gen_evaluator(&mut self, model: &dyn Model, opts: &CompileOpts) -> Result<(), EvalError> {
        let ast = self.ast.as_ref().ok_or(EvalError::NotParsed)?;
        let compiled = compile_expr(ast, model, opts)?;
        self.evaluator = Some(RuleEvaluator::from_compiled(compiled));
        self.partials = OnceLock::new();
        Ok(())
    }

    pub fn get_evaluator(&self) -> Option<&RuleEvaluator> {
        self.evaluator.as_ref()
    }

    pub fn get_event_types(&self) -> Result<&[EventType], EvalError> {
        self.evaluator
            .as_ref()
            .map(RuleEvaluator::event_types)
            .ok_or(EvalError::NotCompiled)
    }

    pub fn get_fields(&self) -> &[Field] {
        self.evaluator
            .as_ref()
            .map(RuleEvaluator::get_fields)
            .unwrap_or_default()
    }

    /// Full evaluation. A rule without evaluator never matches.
    pub fn eval(&self, ctx: &Context) -> bool {
        self.evaluator
            .as_ref()
            .is_some_and(|evaluator| evaluator.eval(ctx))
    }

    /// Generates the partial evaluator of every referenced field. Calling it
    /// again is a no-op.
    pub fn gen_partials(&self) -> Result<(), EvalError> {
        let evaluator = self.evaluator.as_ref().ok_or(EvalError::NotCompiled)?;
        self.partials.get_or_init(|| {
            evaluator
                .fields
                .iter()
                .map(|field| (field.clone(), generate_partial(&evaluator.node, field)))
                .collect()
        });
        Ok(())
    }

    /// Evaluates the rule holding `field` at its value in `ctx`, every other
    /// field being unknown.
    ///
    /// Returns `false` only when the rule can't match whatever the other
    /// fields are. A field the rule doesn't reference can't rule it out.
    pub fn partial_eval(&self, ctx: &Context, field: &str) -> Result<bool, EvalError> {
        let partials = self.partials.get().ok_or(EvalError::PartialsNotGenerated)?;
        match partials.get(field) {
            Some(partial) => Ok(partial(ctx) != Some(false)),
            None => Ok(true),
        }
    }

    /// Literal values the rule compares `field` against.
    pub fn get_field_values(&self, field: &str) -> Vec<FieldValue> {
        self.evaluator
            .iter()
            .flat_map(|evaluator| evaluator.field_values.iter())
            .filter(|fv| fv.field == field)
            .cloned()
            .collect()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("expression", &self.expression)
            .field("tags", &self.tags)
            .field("event_types", &self.get_event_types().unwrap_or_default())
            .field("fields", &self.get_fields())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        FieldValueType, Value,
        context::Context,
        macros::{Macro, MacroStore},
        testing::{TestEvent, TestModel},
    };

    fn compile_with(expression: &str, macros: &MacroStore) -> Result<Rule, EvalError> {
        let constants = HashMap::from([("ROOT_UID".to_string(), Value::Int(0))]);
        let opts = CompileOpts {
            constants: &constants,
            macros,
        };
        let mut rule = Rule::new("test", expression, Vec::new());
        rule.parse()?;
        rule.gen_evaluator(&TestModel, &opts)?;
        rule.gen_partials()?;
        Ok(rule)
    }

    fn compile(expression: &str) -> Rule {
        compile_with(expression, &MacroStore::new()).unwrap()
    }

    #[test]
    fn simple_match() {
        let rule = compile(r#"open.filename == "/etc/passwd""#);
        let event = TestEvent::open("/etc/passwd", 0);
        assert!(rule.eval(&Context::new(&event)));

        let event = TestEvent::open("/tmp/x", 0);
        assert!(!rule.eval(&Context::new(&event)));
    }

    #[test]
    fn event_types_and_fields() {
        let rule = compile(r#"open.filename == "/etc/passwd" && process.uid == ROOT_UID && open.flags > 0"#);
        assert_eq!(rule.get_event_types().unwrap(), ["open".to_string()]);
        assert_eq!(
            rule.get_fields(),
            ["open.filename".to_string(), "process.uid".to_string(), "open.flags".to_string()]
        );
    }

    #[test]
    fn multiple_event_types() {
        let rule = compile(r#"open.filename == "/etc/passwd" || exec.file.path == "/bin/sh""#);
        assert_eq!(rule.get_event_types().unwrap().len(), 2);
    }

    #[test]
    fn common_fields_only() {
        let rule = compile(r#"process.name == "bash""#);
        assert!(rule.get_event_types().unwrap().is_empty());
    }

    #[test]
    fn type_errors() {
        let macros = MacroStore::new();
        assert!(matches!(
            compile_with("open.filename == 3", &macros),
            Err(EvalError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            compile_with("open.flags =~ \"a*\"", &macros),
            Err(EvalError::OperatorNotAllowedOnType(..))
        ));
        assert!(matches!(
            compile_with("process.is_root > true", &macros),
            Err(EvalError::OperatorNotAllowedOnType(..))
        ));
        assert!(matches!(
            compile_with("open.unknown == 3", &macros),
            Err(EvalError::FieldNotFound(_))
        ));
        assert!(matches!(
            compile_with("open.filename in []", &macros),
            Err(EvalError::EmptyList)
        ));
        assert!(matches!(
            compile_with("open.filename == open.flags", &macros),
            Err(EvalError::DifferentFieldsType(..))
        ));
        assert!(matches!(
            compile_with("open.flags > MISSING", &macros),
            Err(EvalError::IdentifierNotFound(_))
        ));
        assert!(matches!(
            compile_with("open.filename in missing", &macros),
            Err(EvalError::MacroNotFound(_))
        ));
        assert!(matches!(
            compile_with(r#"open.filename =~ "[""#, &macros),
            Err(EvalError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn not_parsed() {
        let mut rule = Rule::new("test", "open.flags == 1", Vec::new());
        let constants = HashMap::new();
        let macros = MacroStore::new();
        let opts = CompileOpts {
            constants: &constants,
            macros: &macros,
        };
        assert_eq!(
            rule.gen_evaluator(&TestModel, &opts).unwrap_err(),
            EvalError::NotParsed
        );
        assert_eq!(rule.gen_partials().unwrap_err(), EvalError::NotCompiled);
    }

    #[test]
    fn partials_required() {
        let mut rule = Rule::new("test", "open.flags == 1", Vec::new());
        rule.parse().unwrap();
        let constants = HashMap::new();
        let macros = MacroStore::new();
        let opts = CompileOpts {
            constants: &constants,
            macros: &macros,
        };
        rule.gen_evaluator(&TestModel, &opts).unwrap();

        let event = TestEvent::open("/tmp/x", 1);
        let ctx = Context::new(&event);
        assert_eq!(
            rule.partial_eval(&ctx, "open.flags").unwrap_err(),
            EvalError::PartialsNotGenerated
        );
    }

    #[test]
    fn glob_and_membership() {
        let rule = compile(r#"open.filename =~ "/etc/*" && open.flags in [1, 2]"#);
        assert!(rule.eval(&Context::new(&TestEvent::open("/etc/shadow", 2))));
        assert!(!rule.eval(&Context::new(&TestEvent::open("/etc/shadow", 3))));
        assert!(!rule.eval(&Context::new(&TestEvent::open("/var/log", 1))));

        let rule = compile(r#"open.filename not in ["/a", "/b"]"#);
        assert!(rule.eval(&Context::new(&TestEvent::open("/c", 0))));
        assert!(!rule.eval(&Context::new(&TestEvent::open("/b", 0))));
    }

    #[test]
    fn fields_comparison() {
        let rule = compile("process.uid != process.gid");
        let mut event = TestEvent::open("/tmp/x", 0);
        event.uid = 1000;
        event.gid = 1000;
        assert!(!rule.eval(&Context::new(&event)));
        event.gid = 0;
        assert!(rule.eval(&Context::new(&event)));
    }

    #[test]
    fn macros() {
        let constants = HashMap::new();
        let mut macros = MacroStore::new();

        let mut files = Macro::new("sensitive_files", r#"["/etc/passwd", "/etc/shadow"]"#);
        files.parse().unwrap();
        files
            .gen_evaluator(&TestModel, &CompileOpts { constants: &constants, macros: &macros })
            .unwrap();
        macros.insert(files.into());

        let mut root = Macro::new("is_root", "process.is_root && process.uid == 0");
        root.parse().unwrap();
        root.gen_evaluator(&TestModel, &CompileOpts { constants: &constants, macros: &macros })
            .unwrap();
        assert_eq!(root.get_fields().len(), 2);
        macros.insert(root.into());

        let rule = compile_with("open.filename in sensitive_files && !is_root", &macros).unwrap();
        assert_eq!(
            rule.get_fields(),
            [
                "open.filename".to_string(),
                "process.is_root".to_string(),
                "process.uid".to_string()
            ]
        );

        let mut event = TestEvent::open("/etc/shadow", 0);
        event.uid = 1000;
        assert!(rule.eval(&Context::new(&event)));
        event.is_root = true;
        event.uid = 0;
        assert!(!rule.eval(&Context::new(&event)));

        assert!(matches!(
            compile_with("sensitive_files", &macros),
            Err(EvalError::MacroNotExpression(_))
        ));
        assert!(matches!(
            compile_with("open.filename in is_root", &macros),
            Err(EvalError::MacroNotArray(_))
        ));
    }

    #[test]
    fn partial_eval() {
        let rule = compile(r#"open.filename == "/etc/passwd" && open.flags > 0"#);

        let event = TestEvent::open("/tmp/x", 5);
        let ctx = Context::new(&event);
        assert!(!rule.partial_eval(&ctx, "open.filename").unwrap());
        assert!(rule.partial_eval(&ctx, "open.flags").unwrap());
        // not referenced by the rule
        assert!(rule.partial_eval(&ctx, "process.uid").unwrap());

        let event = TestEvent::open("/etc/passwd", 0);
        let ctx = Context::new(&event);
        assert!(rule.partial_eval(&ctx, "open.filename").unwrap());
        assert!(!rule.partial_eval(&ctx, "open.flags").unwrap());
    }

    #[test]
    fn partial_eval_unknown_branches() {
        // the other branch of the OR can always match
        let rule = compile(r#"open.filename == "/etc/passwd" || open.flags > 0"#);
        let event = TestEvent::open("/tmp/x", 0);
        assert!(rule.partial_eval(&Context::new(&event), "open.filename").unwrap());

        // negation of an unknown is unknown
        let rule = compile(r#"open.filename == "/etc/passwd" && !(open.flags > 0)"#);
        let event = TestEvent::open("/tmp/x", 0);
        assert!(!rule.partial_eval(&Context::new(&event), "open.filename").unwrap());
        let event = TestEvent::open("/etc/passwd", 10);
        assert!(rule.partial_eval(&Context::new(&event), "open.filename").unwrap());

        // a comparison between two fields is never decided by one of them
        let rule = compile("process.uid == process.gid");
        let event = TestEvent::open("/tmp/x", 0);
        assert!(rule.partial_eval(&Context::new(&event), "process.uid").unwrap());

        let rule = compile("false && open.flags > 0");
        let event = TestEvent::open("/tmp/x", 10);
        assert!(!rule.partial_eval(&Context::new(&event), "open.flags").unwrap());
    }

    #[test]
    fn field_values() {
        let rule = compile(
            r#"open.filename in ["/etc/passwd", "/etc/shadow"] || open.filename =~ "/root/*" || open.flags == 2"#,
        );

        let values = rule.get_field_values("open.filename");
        assert_eq!(values.len(), 3);
        assert!(values.contains(&FieldValue {
            field: "open.filename".to_string(),
            value: Value::from("/root/*"),
            value_type: FieldValueType::Pattern,
        }));
        assert!(values.contains(&FieldValue {
            field: "open.filename".to_string(),
            value: Value::from("/etc/shadow"),
            value_type: FieldValueType::Scalar,
        }));
        assert_eq!(rule.get_field_values("open.flags").len(), 1);
        assert!(rule.get_field_values("process.uid").is_empty());
    }
}
