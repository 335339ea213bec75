//! Rule set of a runtime security monitor.
//!
//! A [RuleSet] compiles rule and macro definitions against a data model,
//! groups the rules by the event type they target and evaluates incoming
//! events against them. When an event matches no rule, the fields whose value
//! alone rules out every rule of the event type are reported as discarders,
//! so that the event source can filter similar events upstream.
//!
//! ```
//! use secl_eval::testing::{TestEvent, TestModel};
//! use secl_rules::{Opts, RuleDefinition, RuleSet};
//!
//! let mut rs = RuleSet::new(
//!     Box::new(TestModel),
//!     || Box::new(TestEvent::default()),
//!     Opts::default(),
//! );
//! rs.add_rules([RuleDefinition::new(
//!     "passwd",
//!     r#"open.filename == "/etc/passwd""#,
//! )])
//! .unwrap();
//!
//! assert!(rs.evaluate(&TestEvent::open("/etc/passwd", 0)));
//! assert!(rs.is_discarder(&TestEvent::open("/tmp/x", 0), "open.filename").unwrap());
//! ```

mod approvers;
mod bucket;
mod config;
mod definition;
mod error;
mod listener;
mod opts;
mod rule;
mod ruleset;

pub use approvers::{Approvers, FieldCapabilities, FieldCapability};
pub use bucket::RuleBucket;
pub use config::{ConfigError, RuleSetConfig};
pub use definition::{MacroDefinition, Policy, RuleDefinition};
pub use error::{DefinitionError, LoadErrors, RuleSetError};
pub use listener::RuleSetListener;
pub use opts::{ALL_EVENT_TYPES, Opts};
pub use rule::{Macro, Rule};
pub use ruleset::{EventCtor, RuleSet};
