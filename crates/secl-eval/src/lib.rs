//! secl-eval compiles security rule expressions into closures over events.
//!
//! Expressions are parsed, checked against a [Model] describing the event
//! fields and their types, and compiled into a boolean evaluator. Example:
//!
//! ```
//! use std::collections::HashMap;
//!
//! use secl_eval::{
//!     CompileOpts, Context, EvalError, Event, EventType, FieldKind, FieldSpec, MacroStore, Model,
//!     Rule, Value,
//! };
//!
//! struct OpenModel;
//!
//! impl Model for OpenModel {
//!     fn field_spec(&self, field: &str) -> Result<FieldSpec, EvalError> {
//!         match field {
//!             "open.filename" => Ok(FieldSpec::new(FieldKind::String, "open")),
//!             _ => Err(EvalError::FieldNotFound(field.to_string())),
//!         }
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct OpenEvent {
//!     filename: String,
//! }
//!
//! impl Event for OpenEvent {
//!     fn get_type(&self) -> &str {
//!         "open"
//!     }
//!
//!     fn get_field_event_type(&self, _field: &str) -> Result<EventType, EvalError> {
//!         Ok("open".to_string())
//!     }
//!
//!     fn get_field_value(&self, field: &str) -> Result<Value, EvalError> {
//!         match field {
//!             "open.filename" => Ok(Value::String(self.filename.clone())),
//!             _ => Err(EvalError::FieldNotFound(field.to_string())),
//!         }
//!     }
//!
//!     fn set_field_value(&mut self, field: &str, _value: Value) -> Result<(), EvalError> {
//!         Err(EvalError::FieldNotFound(field.to_string()))
//!     }
//! }
//!
//! let constants = HashMap::new();
//! let macros = MacroStore::new();
//! let opts = CompileOpts {
//!     constants: &constants,
//!     macros: &macros,
//! };
//!
//! let mut rule = Rule::new("passwd", r#"open.filename == "/etc/passwd""#, vec![]);
//! rule.parse().unwrap();
//! rule.gen_evaluator(&OpenModel, &opts).unwrap();
//!
//! let event = OpenEvent {
//!     filename: "/etc/passwd".to_string(),
//! };
//! assert!(rule.eval(&Context::new(&event)));
//! ```
//!
//! Once all the rules of a load are compiled, [Rule::gen_partials] builds one
//! partial evaluator per referenced field. [Rule::partial_eval] then tells
//! whether the current value of a field alone is enough to rule out a match:
//! that's how discarders are found.
//!
//! The expression language supports `&&`, `||`, `!`, parentheses, the
//! comparisons `==`, `!=`, `<`, `<=`, `>`, `>=`, glob matching with `=~` and
//! `!~`, membership with `in` and `not in`, constants, field to field
//! comparisons and macros.

mod compiler;
mod context;
mod error;
mod macros;
mod model;
mod operators;
mod rule;
mod value;

pub mod ast;
pub mod parser;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use compiler::{CompileOpts, EvalFn};
pub use context::{Context, ContextPool, PooledContext};
pub use error::EvalError;
pub use macros::{Macro, MacroId, MacroStore};
pub use model::{Event, EventType, Field, FieldSpec, Model};
pub use operators::*;
pub use rule::{Rule, RuleEvaluator, RuleId};
pub use value::{FieldKind, FieldValue, FieldValueType, Value};
