use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    EvalError, Field, Model,
    ast::MacroExpr,
    compiler::{CompileOpts, compile_macro},
    parser,
};

pub type MacroId = String;

/// A named expression or array of values that rules and later macros can reference.
pub struct Macro {
    pub id: MacroId,
    pub expression: String,
    body: Option<MacroExpr>,
    fields: Vec<Field>,
}

impl Macro {
    pub fn new(id: &str, expression: &str) -> Self {
        Self {
            id: id.to_string(),
            expression: expression.to_string(),
            body: None,
            fields: Vec::new(),
        }
    }

    pub fn parse(&mut self) -> Result<(), EvalError> {
        self.body = Some(parser::parse_macro(&self.expression)?);
        Ok(())
    }

    /// Validates the macro against the model, the constants and the macros already known.
    pub fn gen_evaluator(&mut self, model: &dyn Model, opts: &CompileOpts) -> Result<(), EvalError> {
        let body = self.body.as_ref().ok_or(EvalError::NotParsed)?;
        self.fields = compile_macro(body, model, opts)?;
        Ok(())
    }

    pub fn body(&self) -> Option<&MacroExpr> {
        self.body.as_ref()
    }

    /// Fields referenced by a boolean macro. Empty for arrays.
    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }
}

impl fmt::Debug for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Macro")
            .field("id", &self.id)
            .field("expression", &self.expression)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Macros visible to the compilation of rules and macros of one load session.
#[derive(Debug, Default)]
pub struct MacroStore {
    macros: HashMap<MacroId, Arc<Macro>>,
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, m: Arc<Macro>) -> Option<Arc<Macro>> {
        self.macros.insert(m.id.clone(), m)
    }

    pub fn get(&self, id: &str) -> Option<&Macro> {
        self.macros.get(id).map(Arc::as_ref)
    }
}
