use std::collections::{HashMap, HashSet};

use secl_eval::{EventType, Field, RuleId, Value};
use serde::Deserialize;

/// Event type enabling every other one.
pub const ALL_EVENT_TYPES: &str = "*";

/// Options of a [crate::RuleSet].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Opts {
    /// Named values usable in rule expressions.
    pub constants: HashMap<String, Value>,
    /// Fields allowed as discarders. `None` allows every field.
    pub supported_discarders: Option<HashSet<Field>>,
    /// Event types rules can be loaded for.
    pub event_type_enabled: HashSet<EventType>,
    /// Rule IDs used internally, that definitions can't take.
    pub reserved_rule_ids: Vec<RuleId>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            constants: HashMap::new(),
            supported_discarders: None,
            event_type_enabled: HashSet::from([ALL_EVENT_TYPES.to_string()]),
            reserved_rule_ids: Vec::new(),
        }
    }
}

impl Opts {
    pub fn with_constant(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.constants.insert(name.to_string(), value.into());
        self
    }

    pub fn with_supported_discarders<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Field>,
    {
        self.supported_discarders = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the enabled event types.
    pub fn with_event_types<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EventType>,
    {
        self.event_type_enabled = event_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reserved_rule_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RuleId>,
    {
        self.reserved_rule_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_event_type_enabled(&self, event_type: &str) -> bool {
        self.event_type_enabled.contains(ALL_EVENT_TYPES)
            || self.event_type_enabled.contains(event_type)
    }

    pub fn is_reserved(&self, id: &str) -> bool {
        self.reserved_rule_ids.iter().any(|reserved| reserved == id)
    }

    pub fn is_discarder_supported(&self, field: &str) -> bool {
        self.supported_discarders
            .as_ref()
            .is_none_or(|fields| fields.contains(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Opts::default();
        assert!(opts.is_event_type_enabled("open"));
        assert!(opts.is_discarder_supported("open.filename"));
        assert!(!opts.is_reserved("r1"));
    }

    #[test]
    fn restricted() {
        let opts = Opts::default()
            .with_event_types(["open"])
            .with_supported_discarders(["open.filename"])
            .with_reserved_rule_ids(["ruleset_loaded"])
            .with_constant("ROOT_UID", 0);

        assert!(opts.is_event_type_enabled("open"));
        assert!(!opts.is_event_type_enabled("exec"));
        assert!(!opts.is_discarder_supported("open.flags"));
        assert!(opts.is_reserved("ruleset_loaded"));
        assert_eq!(opts.constants["ROOT_UID"], Value::Int(0));
    }
}
