//! Policy evaluation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackguard_core::Result;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

use crate::flatten::{flatten_with_depth, ResourceView, DEFAULT_MAX_DEPTH};
use crate::template::render;
use crate::{PolicyDefinition, RuleAction};

/// Prefix applied to warnings raised by `require_approval` rules
pub const APPROVAL_PREFIX: &str = "Approval required: ";

/// Evaluates policy definitions against input records
pub struct PolicyEvaluationEngine {
    policies: Vec<PolicyDefinition>,
    max_depth: usize,
}

impl PolicyEvaluationEngine {
    /// Create a new policy engine
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the flattening depth guard
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Load a policy from file
    pub fn load_policy(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let policy = PolicyDefinition::from_file(path)?;
        self.policies.push(policy);
        Ok(())
    }

    /// Add a policy directly
    pub fn add_policy(&mut self, policy: PolicyDefinition) {
        self.policies.push(policy);
    }

    /// Get loaded policies
    pub fn policies(&self) -> &[PolicyDefinition] {
        &self.policies
    }

    /// Evaluate every loaded policy
    pub fn evaluate_loaded(&self, input: &Value) -> AggregatedResult {
        self.evaluate_all(&self.policies, input)
    }

    /// Evaluate one policy against an input record
    pub fn evaluate(&self, policy: &PolicyDefinition, input: &Value) -> EvaluationResult {
        let start = Instant::now();
        let mut result = EvaluationResult::pass(policy);

        if !policy.enabled {
            debug!(policy = %policy.id, "Policy disabled, skipping");
            result.duration_ms = elapsed_ms(start);
            return result;
        }

        let flat = flatten_with_depth(input, self.max_depth);
        let resource = ResourceView::from_record(input);

        for rule in &policy.rules {
            if !rule.condition.evaluate(&flat, Some(&resource)) {
                result.evaluated_rules.push(RuleEvaluation {
                    rule_id: rule.id.clone(),
                    passed: true,
                    action: rule.action,
                    message: None,
                });
                continue;
            }

            let message = render(&rule.message, &flat);
            debug!(
                policy = %policy.id,
                rule = %rule.id,
                action = %rule.action,
                "Rule matched"
            );

            match rule.action {
                RuleAction::Deny => result.denials.push(message.clone()),
                RuleAction::Warn => result.warnings.push(message.clone()),
                RuleAction::RequireApproval => {
                    result.approval_required = true;
                    result.warnings.push(format!("{}{}", APPROVAL_PREFIX, message));
                }
                RuleAction::Notify => result.notifications.push(message.clone()),
            }

            result.evaluated_rules.push(RuleEvaluation {
                rule_id: rule.id.clone(),
                passed: false,
                action: rule.action,
                message: Some(message),
            });
        }

        result.denied = !result.denials.is_empty();
        result.allowed = !result.denied;
        result.duration_ms = elapsed_ms(start);
        result
    }

    /// Evaluate every policy independently and fold the outcomes
    pub fn evaluate_all(&self, policies: &[PolicyDefinition], input: &Value) -> AggregatedResult {
        let results = policies
            .iter()
            .map(|policy| self.evaluate(policy, input))
            .collect();
        AggregatedResult::from_results(results)
    }
}

impl Default for PolicyEvaluationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of evaluating one policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub policy_id: String,
    pub policy_name: String,

    /// No denials were raised
    pub allowed: bool,
    pub denied: bool,

    pub warnings: Vec<String>,
    pub denials: Vec<String>,
    pub approval_required: bool,
    pub notifications: Vec<String>,

    /// Every rule that was checked, matching or not
    pub evaluated_rules: Vec<RuleEvaluation>,

    pub evaluated_at: DateTime<Utc>,
    pub duration_ms: f64,
}

impl EvaluationResult {
    fn pass(policy: &PolicyDefinition) -> Self {
        Self {
            policy_id: policy.id.clone(),
            policy_name: policy.name.clone(),
            allowed: true,
            denied: false,
            warnings: Vec::new(),
            denials: Vec::new(),
            approval_required: false,
            notifications: Vec::new(),
            evaluated_rules: Vec::new(),
            evaluated_at: Utc::now(),
            duration_ms: 0.0,
        }
    }
}

/// Per-rule outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluation {
    pub rule_id: String,

    /// True when the rule's condition did not match
    pub passed: bool,

    pub action: RuleAction,

    /// Rendered message for matching rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of evaluating several policies against one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub allowed: bool,
    pub denied: bool,
    pub warnings: Vec<String>,
    pub denials: Vec<String>,
    pub approval_required: bool,
    pub notifications: Vec<String>,

    /// Policies that did not deny
    pub passed_policies: usize,

    /// Policies that denied
    pub failed_policies: usize,

    pub results: Vec<EvaluationResult>,
    pub total_duration_ms: f64,
}

impl AggregatedResult {
    /// Fold individual policy results
    pub fn from_results(results: Vec<EvaluationResult>) -> Self {
        let mut aggregate = Self {
            allowed: true,
            denied: false,
            warnings: Vec::new(),
            denials: Vec::new(),
            approval_required: false,
            notifications: Vec::new(),
            passed_policies: 0,
            failed_policies: 0,
            results: Vec::new(),
            total_duration_ms: 0.0,
        };

        for result in &results {
            if result.denied {
                aggregate.failed_policies += 1;
            } else {
                aggregate.passed_policies += 1;
            }
            aggregate.denied |= result.denied;
            aggregate.approval_required |= result.approval_required;
            aggregate.warnings.extend(result.warnings.iter().cloned());
            aggregate.denials.extend(result.denials.iter().cloned());
            aggregate.notifications.extend(result.notifications.iter().cloned());
            aggregate.total_duration_ms += result.duration_ms;
        }

        aggregate.allowed = !aggregate.denied;
        aggregate.results = results;
        aggregate
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
