//! Scriptable engine for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{EngineType, OpaEngine, OpaEvaluationResult, OpaInput};

type Predicate = Box<dyn Fn(&OpaInput) -> bool + Send + Sync>;

/// Returns canned results chosen by predicate, recording every call
pub struct MockOpaEngine {
    responses: Vec<(Predicate, OpaEvaluationResult)>,
    default_result: OpaEvaluationResult,
    log: Mutex<Vec<OpaInput>>,
}

impl MockOpaEngine {
    /// Create a mock that allows everything
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            default_result: OpaEvaluationResult::allow(),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Set the result returned when no predicate matches
    pub fn with_default(mut self, result: OpaEvaluationResult) -> Self {
        self.default_result = result;
        self
    }

    /// Return `result` for inputs matching `predicate`
    ///
    /// Predicates are checked in insertion order; the first match wins.
    pub fn when<F>(mut self, predicate: F, result: OpaEvaluationResult) -> Self
    where
        F: Fn(&OpaInput) -> bool + Send + Sync + 'static,
    {
        self.responses.push((Box::new(predicate), result));
        self
    }

    /// Match on `changeRequest.action`
    pub fn when_action(self, action: impl Into<String>, result: OpaEvaluationResult) -> Self {
        let action = action.into();
        self.when(
            move |input| input.change_request.get("action").and_then(Value::as_str) == Some(action.as_str()),
            result,
        )
    }

    /// Match on the change's resource type
    pub fn when_resource_type(self, resource_type: impl Into<String>, result: OpaEvaluationResult) -> Self {
        let resource_type = resource_type.into();
        self.when(
            move |input| resource_type_of(&input.change_request) == Some(resource_type.as_str()),
            result,
        )
    }

    /// Match when the change's risk score is strictly above `threshold`
    pub fn when_risk_above(self, threshold: f64, result: OpaEvaluationResult) -> Self {
        self.when(
            move |input| risk_score_of(&input.change_request).is_some_and(|score| score > threshold),
            result,
        )
    }

    /// Inputs seen so far, oldest first
    pub fn evaluation_log(&self) -> Vec<OpaInput> {
        self.log.lock().clone()
    }

    /// Number of recorded evaluations
    pub fn call_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Forget recorded evaluations
    pub fn clear_log(&self) {
        self.log.lock().clear();
    }
}

impl Default for MockOpaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OpaEngine for MockOpaEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Mock
    }

    async fn evaluate(&self, input: &OpaInput) -> OpaEvaluationResult {
        self.log.lock().push(input.clone());

        self.responses
            .iter()
            .find(|(predicate, _)| predicate(input))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| self.default_result.clone())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn resource_type_of(change: &Value) -> Option<&str> {
    change
        .get("resourceType")
        .or_else(|| change.get("resource").and_then(|r| r.get("type")))
        .and_then(Value::as_str)
}

fn risk_score_of(change: &Value) -> Option<f64> {
    change
        .get("riskScore")
        .or_else(|| change.get("risk").and_then(|r| r.get("score")))
        .and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpaPolicyViolation;
    use serde_json::json;
    use stackguard_policy::{RuleAction, Severity};

    fn deny(rule: &str) -> OpaEvaluationResult {
        OpaEvaluationResult::with_violations(vec![OpaPolicyViolation::new(
            rule,
            format!("{} denied", rule),
            Severity::High,
            RuleAction::Deny,
            "mock",
        )])
    }

    #[tokio::test]
    async fn test_first_matching_predicate_wins() {
        let engine = MockOpaEngine::new()
            .when_action("delete", deny("no-delete"))
            .when_resource_type("database", deny("db-guard"))
            .when_risk_above(7.0, deny("risky"));

        let delete_db = OpaInput::new(json!({"action": "delete", "resource": {"type": "database"}}));
        assert_eq!(engine.evaluate(&delete_db).await.violations[0].rule_id, "no-delete");

        let update_db = OpaInput::new(json!({"action": "update", "resourceType": "database"}));
        assert_eq!(engine.evaluate(&update_db).await.violations[0].rule_id, "db-guard");

        let risky = OpaInput::new(json!({"action": "update", "risk": {"score": 8.5}}));
        assert_eq!(engine.evaluate(&risky).await.violations[0].rule_id, "risky");

        let at_threshold = OpaInput::new(json!({"action": "update", "riskScore": 7.0}));
        assert!(engine.evaluate(&at_threshold).await.violations.is_empty());
    }

    #[tokio::test]
    async fn test_default_result_and_log() {
        let engine = MockOpaEngine::new().with_default(deny("default"));
        assert_eq!(engine.engine_type(), EngineType::Mock);
        assert!(engine.health_check().await);

        let input = OpaInput::new(json!({"action": "create"}));
        let result = engine.evaluate(&input).await;
        assert_eq!(result.violations[0].rule_id, "default");

        engine.evaluate(&input).await;
        assert_eq!(engine.call_count(), 2);
        assert_eq!(engine.evaluation_log()[0], input);

        engine.clear_log();
        assert!(engine.evaluation_log().is_empty());
    }
}
