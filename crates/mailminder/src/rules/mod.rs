//! Rule schema, document-backed rule store and the rule matcher.

pub mod matcher;
pub mod schema;
pub mod store;

pub use matcher::RuleMatcher;
pub use schema::{
    CompoundCriteria, FieldSpec, FieldTransform, MatchCriteria, MatchScope, ReminderTemplate,
    Rule, RuleStatus, SimpleCriteria,
};
pub use store::{RuleStore, YamlRuleStore};
