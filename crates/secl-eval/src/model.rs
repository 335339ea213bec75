use std::fmt::Debug;

use crate::{EvalError, FieldKind, Value};

/// Name of an event field, like `open.filename` or `process.uid`.
pub type Field = String;

/// Name of an event type, like `open` or `exec`.
pub type EventType = String;

/// Static description of a field exposed by a [Model].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    /// Event type owning the field. `None` for fields shared by every event type.
    pub event_type: Option<EventType>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind, event_type: &str) -> Self {
        Self {
            kind,
            event_type: Some(event_type.to_string()),
        }
    }

    pub fn common(kind: FieldKind) -> Self {
        Self {
            kind,
            event_type: None,
        }
    }
}

/// Data model rules are compiled against.
pub trait Model: Send + Sync {
    fn field_spec(&self, field: &str) -> Result<FieldSpec, EvalError>;
}

/// Concrete event evaluated against compiled rules.
pub trait Event: Debug + Send + Sync {
    fn get_type(&self) -> &str;

    /// Event type the field belongs to on this event.
    fn get_field_event_type(&self, field: &str) -> Result<EventType, EvalError>;

    fn get_field_value(&self, field: &str) -> Result<Value, EvalError>;

    fn set_field_value(&mut self, field: &str, value: Value) -> Result<(), EvalError>;
}
