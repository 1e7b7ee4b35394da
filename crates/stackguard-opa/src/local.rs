//! In-process engine backed by rules compiled from Rego text

use async_trait::async_trait;
use stackguard_policy::flatten::DEFAULT_MAX_DEPTH;
use stackguard_policy::template::render;
use stackguard_policy::{flatten_with_depth, parse_rego_subset, rego_to_local_rules, LocalRegoRule, ResourceView};
use std::time::Instant;
use tracing::{debug, info};

use crate::{EngineType, OpaEngine, OpaEvaluationResult, OpaInput, OpaPolicyViolation};

/// Evaluates lowered Rego rules without a network round trip
#[derive(Debug, Clone, Default)]
pub struct LocalOpaEngine {
    rules: Vec<LocalRegoRule>,
}

impl LocalOpaEngine {
    /// Create an engine with no rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine from already lowered rules
    pub fn with_rules(rules: Vec<LocalRegoRule>) -> Self {
        Self { rules }
    }

    /// Create an engine from Rego policy text
    pub fn from_rego(text: &str) -> Self {
        let mut engine = Self::new();
        engine.load_rego(text);
        engine
    }

    /// Compile Rego text and append its rules, returning how many were added
    pub fn load_rego(&mut self, text: &str) -> usize {
        let rules = rego_to_local_rules(&parse_rego_subset(text));
        let added = rules.len();
        self.rules.extend(rules);
        info!(added, total = self.rules.len(), "Loaded Rego rules into local engine");
        added
    }

    /// Add a rule
    pub fn add_rule(&mut self, rule: LocalRegoRule) {
        self.rules.push(rule);
    }

    /// Remove a rule by id, returning whether it existed
    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        before != self.rules.len()
    }

    /// Current rules
    pub fn rules(&self) -> &[LocalRegoRule] {
        &self.rules
    }
}

#[async_trait]
impl OpaEngine for LocalOpaEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Local
    }

    async fn evaluate(&self, input: &OpaInput) -> OpaEvaluationResult {
        let start = Instant::now();
        let flat = flatten_with_depth(&input.change_request, DEFAULT_MAX_DEPTH);
        let resource = ResourceView::from_record(&input.change_request);

        let violations: Vec<OpaPolicyViolation> = self
            .rules
            .iter()
            .filter(|rule| rule.condition.evaluate(&flat, Some(&resource)))
            .map(|rule| {
                OpaPolicyViolation::new(
                    rule.id.clone(),
                    render(&rule.message, &flat),
                    rule.severity,
                    rule.action,
                    rule.package.clone(),
                )
            })
            .collect();

        debug!(
            rules = self.rules.len(),
            violations = violations.len(),
            "Local policy evaluation complete"
        );

        OpaEvaluationResult {
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            ..OpaEvaluationResult::with_violations(violations)
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackguard_policy::{Condition, RuleAction, Severity};

    const POLICY: &str = r#"
package infra.cost

deny[msg] {
    input.changeRequest.cost.monthlyDelta > 1000
    msg := "{{resource.name}} adds ${{cost.monthlyDelta}} per month (owner {{resource.owner}})"
}

warn[msg] {
    not input.resource.tags.owner
    msg := "missing owner tag"
}
"#;

    #[tokio::test]
    async fn test_local_evaluation_and_placeholders() {
        let engine = LocalOpaEngine::from_rego(POLICY);
        assert_eq!(engine.rules().len(), 2);

        let input = OpaInput::new(json!({
            "resource": {"name": "warehouse", "tags": {}},
            "cost": {"monthlyDelta": 2500}
        }));
        let result = engine.evaluate(&input).await;

        assert!(result.ok);
        assert!(result.is_denied());
        assert_eq!(result.violations.len(), 2);

        let deny = &result.violations[0];
        assert_eq!(deny.rule_id, "infra.cost.deny_1");
        assert_eq!(deny.package, "infra.cost");
        assert_eq!(deny.severity, Severity::Critical);
        assert_eq!(deny.message, "warehouse adds $2500 per month (owner <resource.owner>)");
        assert_eq!(result.violations[1].action, RuleAction::Warn);
    }

    #[tokio::test]
    async fn test_no_match() {
        let engine = LocalOpaEngine::from_rego(POLICY);
        let input = OpaInput::new(json!({
            "resource": {"name": "tiny", "tags": {"owner": "ops"}},
            "cost": {"monthlyDelta": 10}
        }));
        let result = engine.evaluate(&input).await;
        assert!(result.ok);
        assert!(result.violations.is_empty());
    }

    #[tokio::test]
    async fn test_untranslatable_rule_does_not_deny_everything() {
        let engine = LocalOpaEngine::from_rego(
            r#"
package network
deny[msg] {
    some i
    input.resource.rules[i].cidr == "0.0.0.0/0"
    msg := "open ingress"
}
"#,
        );
        assert!(engine.rules().is_empty());

        let input = OpaInput::new(json!({"resource": {"rules": [{"cidr": "10.0.0.0/8"}]}}));
        let result = engine.evaluate(&input).await;
        assert!(result.ok);
        assert!(!result.is_denied());
        assert!(result.violations.is_empty());
    }

    #[tokio::test]
    async fn test_rule_management() {
        let mut engine = LocalOpaEngine::new();
        assert!(engine.health_check().await);
        assert_eq!(engine.engine_type(), EngineType::Local);

        engine.add_rule(LocalRegoRule {
            id: "custom.notify_1".to_string(),
            package: "custom".to_string(),
            description: String::new(),
            condition: Condition::field_equals("action", "delete"),
            severity: Severity::Low,
            action: RuleAction::Notify,
            message: "delete of {{resource.id}}".to_string(),
        });
        assert_eq!(engine.rules().len(), 1);

        let result = engine
            .evaluate(&OpaInput::new(json!({"action": "delete", "resource": {"id": "vm-9"}})))
            .await;
        assert_eq!(result.violations[0].message, "delete of vm-9");

        assert!(engine.remove_rule("custom.notify_1"));
        assert!(!engine.remove_rule("custom.notify_1"));
        assert!(engine.rules().is_empty());
    }
}
