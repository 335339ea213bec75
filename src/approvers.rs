//! Approvers are field values that can be used upstream as an allow list:
//! an event whose field doesn't hold one of them can't match any rule.

use std::collections::HashMap;

use secl_eval::{Context, EvalError, Event, Field, FieldValue, FieldValueType, Value};

use crate::rule::Rule;

/// Kind of values a filter on `field` can use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCapability {
    pub field: Field,
    pub types: Vec<FieldValueType>,
}

impl FieldCapability {
    pub fn new(field: &str, types: &[FieldValueType]) -> Self {
        Self {
            field: field.to_string(),
            types: types.to_vec(),
        }
    }
}

pub type FieldCapabilities = Vec<FieldCapability>;

/// Field values accepted by at least one rule.
pub type Approvers = HashMap<Field, Vec<FieldValue>>;

pub(crate) fn merge(approvers: &mut Approvers, other: Approvers) {
    for (field, values) in other {
        let entry = approvers.entry(field).or_default();
        for value in values {
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
    }
}

/// Approvers of a single rule. Empty when no capable field restricts the rule.
pub(crate) fn rule_approvers(
    rule: &Rule,
    event: &mut dyn Event,
    caps: &[FieldCapability],
) -> Result<Approvers, EvalError> {
    let mut approvers = Approvers::new();

    for cap in caps {
        if !rule.get_fields().contains(&cap.field) {
            continue;
        }

        let values: Vec<FieldValue> = rule
            .evaluator()
            .get_field_values(&cap.field)
            .into_iter()
            .filter(|fv| cap.types.contains(&fv.value_type))
            .collect();
        if values.is_empty() {
            continue;
        }

        if is_approver(rule, event, &cap.field, &values)? {
            log::trace!("rule `{}` approved by {} values of {}", rule.id(), values.len(), cap.field);
            approvers.insert(cap.field.clone(), values);
        }
    }

    Ok(approvers)
}

/// Every value must let the rule match, and a value outside of them must not.
fn is_approver(
    rule: &Rule,
    event: &mut dyn Event,
    field: &str,
    values: &[FieldValue],
) -> Result<bool, EvalError> {
    for fv in values {
        if !probe(rule, event, field, fv.value.clone())? {
            return Ok(false);
        }
    }

    match foreign_value(values) {
        Some(value) => Ok(!probe(rule, event, field, value)?),
        None => Ok(false),
    }
}

fn probe(rule: &Rule, event: &mut dyn Event, field: &str, value: Value) -> Result<bool, EvalError> {
    event.set_field_value(field, value)?;
    let ctx = Context::new(&*event);
    rule.evaluator().partial_eval(&ctx, field)
}

/// A value of the same kind not present in `values`.
fn foreign_value(values: &[FieldValue]) -> Option<Value> {
    let taken = |value: &Value| values.iter().any(|fv| &fv.value == value);

    match &values.first()?.value {
        Value::Bool(_) => [true, false]
            .into_iter()
            .map(Value::Bool)
            .find(|value| !taken(value)),
        Value::Int(_) => (0..)
            .map(|offset: i64| Value::Int(i64::MIN + offset))
            .take(values.len() + 1)
            .find(|value| !taken(value)),
        Value::String(_) => (0..)
            .map(|n: usize| Value::String(format!("\u{0}unapproved.{n}")))
            .take(values.len() + 1)
            .find(|value| !taken(value)),
    }
}
