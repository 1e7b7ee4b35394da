//! Batch evaluation

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{info, warn};

use crate::{OpaEngine, OpaEvaluationResult, OpaInput};

/// Evaluations allowed in flight at once
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// Results of evaluating many inputs with one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub input_count: usize,
    pub total_violations: usize,

    /// Sum of the per-input evaluation durations
    pub total_duration_ms: f64,

    /// One result per input, in input order
    pub results: Vec<OpaEvaluationResult>,

    /// Results with `ok == false`
    pub failed: usize,
}

impl BatchResult {
    /// Whether any input was denied
    pub fn any_denied(&self) -> bool {
        self.results.iter().any(OpaEvaluationResult::is_denied)
    }
}

/// Evaluate every input, preserving order
///
/// A panic inside one evaluation is turned into a failed result for that
/// input only.
pub async fn batch_evaluate(engine: &dyn OpaEngine, inputs: &[OpaInput]) -> BatchResult {
    batch_evaluate_with_concurrency(engine, inputs, DEFAULT_BATCH_CONCURRENCY).await
}

/// [`batch_evaluate`] with an explicit concurrency bound
pub async fn batch_evaluate_with_concurrency(
    engine: &dyn OpaEngine,
    inputs: &[OpaInput],
    concurrency: usize,
) -> BatchResult {
    let start = Instant::now();
    let engine_name = engine.engine_type().as_str();

    let results: Vec<OpaEvaluationResult> = stream::iter(inputs.iter().enumerate())
        .map(|(index, input)| async move {
            match AssertUnwindSafe(engine.evaluate(input)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    warn!(index, engine = engine_name, "Policy evaluation panicked");
                    OpaEvaluationResult::failed("evaluation panicked", Vec::new())
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    for result in &results {
        metrics::counter!("stackguard_opa_evaluations_total", "engine" => engine_name).increment(1);
        metrics::histogram!("stackguard_opa_evaluation_ms", "engine" => engine_name).record(result.duration_ms);
    }

    let batch = BatchResult {
        input_count: inputs.len(),
        total_violations: results.iter().map(|r| r.violations.len()).sum(),
        total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
        failed: results.iter().filter(|r| !r.ok).count(),
        results,
    };

    info!(
        engine = engine_name,
        inputs = batch.input_count,
        violations = batch.total_violations,
        failed = batch.failed,
        wall_ms = start.elapsed().as_millis() as u64,
        "Batch evaluation complete"
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineType, MockOpaEngine, OpaPolicyViolation};
    use async_trait::async_trait;
    use serde_json::json;
    use stackguard_policy::{RuleAction, Severity};

    fn violation(rule: &str) -> OpaPolicyViolation {
        OpaPolicyViolation::new(rule, rule, Severity::High, RuleAction::Deny, "batch")
    }

    #[tokio::test]
    async fn test_order_and_totals() {
        let engine = MockOpaEngine::new()
            .when_action("delete", OpaEvaluationResult::with_violations(vec![violation("a"), violation("b")]))
            .when_action("update", OpaEvaluationResult::with_violations(vec![violation("c")]));

        let inputs: Vec<OpaInput> = ["create", "delete", "update", "create"]
            .iter()
            .map(|action| OpaInput::new(json!({ "action": action })))
            .collect();

        let batch = batch_evaluate(&engine, &inputs).await;
        assert_eq!(batch.input_count, 4);
        assert_eq!(batch.total_violations, 3);
        assert_eq!(batch.failed, 0);
        assert!(batch.any_denied());

        let counts: Vec<usize> = batch.results.iter().map(|r| r.violations.len()).collect();
        assert_eq!(counts, vec![0, 2, 1, 0]);

        let summed: f64 = batch.results.iter().map(|r| r.duration_ms).sum();
        assert_eq!(batch.total_duration_ms, summed);
        assert_eq!(engine.call_count(), 4);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let batch = batch_evaluate(&MockOpaEngine::new(), &[]).await;
        assert_eq!(batch.input_count, 0);
        assert!(batch.results.is_empty());
    }

    struct PanicsOnDelete;

    #[async_trait]
    impl OpaEngine for PanicsOnDelete {
        fn engine_type(&self) -> EngineType {
            EngineType::Mock
        }

        async fn evaluate(&self, input: &OpaInput) -> OpaEvaluationResult {
            if input.change_request["action"] == "delete" {
                panic!("boom");
            }
            let mut result = OpaEvaluationResult::with_violations(vec![violation("ok")]);
            result.duration_ms = 2.5;
            result
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_panic_isolated_to_one_input() {
        let inputs = vec![
            OpaInput::new(json!({"action": "create"})),
            OpaInput::new(json!({"action": "delete"})),
            OpaInput::new(json!({"action": "update"})),
        ];

        let batch = batch_evaluate_with_concurrency(&PanicsOnDelete, &inputs, 2).await;
        assert_eq!(batch.failed, 1);
        assert!(!batch.results[1].ok);
        assert_eq!(batch.results[1].error.as_deref(), Some("evaluation panicked"));
        assert_eq!(batch.total_violations, 2);
        assert_eq!(batch.total_duration_ms, 5.0);
    }
}
