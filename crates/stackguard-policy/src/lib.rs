//! StackGuard Policy Engine
//!
//! Declarative policy-as-code for infrastructure change guardrails.
//!
//! Policies are defined in YAML (or compiled from a Rego subset) and specify:
//! - Conditions (a boolean tree over dot-paths of the change record)
//! - Actions (deny, warn, require approval, notify)
//! - Messages rendered from the change record

pub mod action;
pub mod approval;
pub mod builtin;
pub mod condition;
pub mod engine;
pub mod flatten;
pub mod rego;
pub mod rule;
pub mod template;

pub use action::{RuleAction, Severity};
pub use approval::{ApprovalError, ApprovalRequest, ApprovalRequirements, ApprovalStatus, Decision};
pub use condition::{evaluate, Condition, SizeOp};
pub use engine::{AggregatedResult, EvaluationResult, PolicyEvaluationEngine, RuleEvaluation};
pub use flatten::{flatten, flatten_with_depth, FlatRecord, ResourceView};
pub use rego::{parse_rego_subset, rego_to_local_rules, LocalRegoRule, ParsedRegoRule};
pub use rule::{PolicyDefinition, Rule};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::action::{RuleAction, Severity};
    pub use crate::condition::Condition;
    pub use crate::engine::{AggregatedResult, EvaluationResult, PolicyEvaluationEngine};
    pub use crate::rego::{parse_rego_subset, rego_to_local_rules};
    pub use crate::rule::{PolicyDefinition, Rule};
}
