use std::sync::Arc;

use secl_eval::{Event, EventType, Field};

use crate::{
    RuleSetError,
    approvers::{self, Approvers, FieldCapability},
    rule::Rule,
};

/// Rules targeting the same event type, with the fields they reference.
#[derive(Debug, Default)]
pub struct RuleBucket {
    event_type: EventType,
    rules: Vec<Arc<Rule>>,
    fields: Vec<Field>,
}

impl RuleBucket {
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            ..Default::default()
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub(crate) fn add_rule(&mut self, rule: Arc<Rule>) {
        for field in rule.get_fields() {
            if !self.fields.contains(field) {
                self.fields.push(field.clone());
            }
        }
        self.rules.push(rule);
    }

    pub fn get_rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Distinct fields referenced by the rules, in order of appearance.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Derives the approvers of the bucket. Fails if one of the rules isn't
    /// restricted by any capable field.
    pub fn get_approvers(
        &self,
        event: &mut dyn Event,
        caps: &[FieldCapability],
    ) -> Result<Approvers, RuleSetError> {
        let mut bucket_approvers = Approvers::new();

        for rule in &self.rules {
            let rule_approvers = approvers::rule_approvers(rule, event, caps)?;
            if rule_approvers.is_empty() {
                return Err(RuleSetError::NoApprover {
                    event_type: self.event_type.clone(),
                    fields: rule.get_fields().to_vec(),
                });
            }
            approvers::merge(&mut bucket_approvers, rule_approvers);
        }

        Ok(bucket_approvers)
    }
}
