use std::sync::Arc;

use secl_eval::{EventType, Field};

use crate::definition::{MacroDefinition, RuleDefinition};

/// A compiled macro and its definition.
#[derive(Debug, Clone)]
pub struct Macro {
    pub(crate) inner: Arc<secl_eval::Macro>,
    pub definition: MacroDefinition,
}

impl Macro {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn evaluator(&self) -> &secl_eval::Macro {
        &self.inner
    }
}

/// A compiled rule, its definition and the event type it applies to.
#[derive(Debug)]
pub struct Rule {
    pub(crate) inner: secl_eval::Rule,
    pub(crate) event_type: EventType,
    pub definition: RuleDefinition,
}

impl Rule {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn evaluator(&self) -> &secl_eval::Rule {
        &self.inner
    }

    pub fn get_fields(&self) -> &[Field] {
        self.inner.get_fields()
    }

    /// Tags as `key:value` strings.
    pub fn tags(&self) -> &[String] {
        &self.inner.tags
    }
}
