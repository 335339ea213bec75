use secl_eval::Event;

use crate::{RuleSet, rule::Rule};

/// Observer of a [RuleSet] evaluation.
///
/// Called synchronously from the evaluating thread, in registration order.
/// Implementations must not block.
pub trait RuleSetListener: Send + Sync {
    fn rule_match(&self, rule: &Rule, event: &dyn Event);

    /// `field` has a value on `event` that can't satisfy any rule of `event_type`.
    fn event_discarder_found(&self, rs: &RuleSet, event: &dyn Event, field: &str, event_type: &str);
}
