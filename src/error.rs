use std::fmt;

use secl_eval::{EvalError, EventType, Field, MacroId, RuleId};
use thiserror::Error;

/// Why a rule or macro definition was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("multiple definition with the same ID")]
    IdConflict,
    #[error("internal rule ID conflict")]
    ReservedId,
    #[error("syntax error: {0}")]
    Syntax(#[source] EvalError),
    #[error("compilation error: {0}")]
    Compilation(#[source] EvalError),
    #[error("rule without event")]
    NoEvent,
    #[error("rule with multiple events: {}", .0.join(", "))]
    MultipleEvents(Vec<EventType>),
    #[error("event type `{0}` not enabled")]
    EventTypeNotEnabled(EventType),
    #[error("couldn't generate partials: {0}")]
    Partials(#[source] EvalError),
}

/// Describes ruleset errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleSetError {
    #[error("rule `{id}` error: {error}")]
    RuleLoad {
        id: RuleId,
        #[source]
        error: DefinitionError,
    },
    #[error("macro `{id}` error: {error}")]
    MacroLoad {
        id: MacroId,
        #[source]
        error: DefinitionError,
    },
    #[error("no rule for event type `{0}`")]
    NoEventTypeBucket(EventType),
    #[error("no approver for event type `{event_type}` on fields: {}", .fields.join(", "))]
    NoApprover {
        event_type: EventType,
        fields: Vec<Field>,
    },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl RuleSetError {
    pub(crate) fn rule(id: &str, error: DefinitionError) -> Self {
        RuleSetError::RuleLoad {
            id: id.to_string(),
            error,
        }
    }

    pub(crate) fn macro_load(id: &str, error: DefinitionError) -> Self {
        RuleSetError::MacroLoad {
            id: id.to_string(),
            error,
        }
    }

    /// The definition failure carried by a load error.
    pub fn definition_error(&self) -> Option<&DefinitionError> {
        match self {
            RuleSetError::RuleLoad { error, .. } | RuleSetError::MacroLoad { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}

/// Every failure of a bulk load, in the order definitions were processed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadErrors {
    errors: Vec<RuleSetError>,
}

impl LoadErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: RuleSetError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleSetError> {
        self.errors.iter()
    }

    /// IDs of the rules that failed to load.
    pub fn rule_ids(&self) -> Vec<&RuleId> {
        self.errors
            .iter()
            .filter_map(|error| match error {
                RuleSetError::RuleLoad { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// IDs of the macros that failed to load.
    pub fn macro_ids(&self) -> Vec<&MacroId> {
        self.errors
            .iter()
            .filter_map(|error| match error {
                RuleSetError::MacroLoad { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// `Ok` when nothing failed.
    pub fn into_result(self) -> Result<(), LoadErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for LoadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            1 => writeln!(f, "1 error occurred:")?,
            n => writeln!(f, "{n} errors occurred:")?,
        }
        for error in &self.errors {
            writeln!(f, "\t* {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LoadErrors {}

impl Extend<RuleSetError> for LoadErrors {
    fn extend<I: IntoIterator<Item = RuleSetError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for LoadErrors {
    type Item = RuleSetError;
    type IntoIter = std::vec::IntoIter<RuleSetError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a LoadErrors {
    type Item = &'a RuleSetError;
    type IntoIter = std::slice::Iter<'a, RuleSetError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate() {
        let mut errors = LoadErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.push(RuleSetError::rule("r2", DefinitionError::IdConflict));
        errors.push(RuleSetError::macro_load("m1", DefinitionError::Syntax(EvalError::Parse("eof".to_string()))));
        errors.push(RuleSetError::rule(
            "r3",
            DefinitionError::MultipleEvents(vec!["open".to_string(), "exec".to_string()]),
        ));

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.rule_ids(), ["r2", "r3"]);
        assert_eq!(errors.macro_ids(), ["m1"]);

        let display = errors.to_string();
        assert!(display.starts_with("3 errors occurred:"));
        assert!(display.contains("rule `r3` error: rule with multiple events: open, exec"));
        assert!(display.contains("macro `m1` error: syntax error: Parse error: eof"));

        let conflicts = errors
            .iter()
            .filter(|e| e.definition_error() == Some(&DefinitionError::IdConflict))
            .count();
        assert_eq!(conflicts, 1);
        assert!(errors.into_result().is_err());
    }
}
