//! Policy engine trait

use async_trait::async_trait;

use crate::{EngineType, OpaEvaluationResult, OpaInput};

/// Trait for all policy engine backends
///
/// `evaluate` never fails: transport or evaluation problems are reported in
/// the returned result so callers always receive a verdict.
#[async_trait]
pub trait OpaEngine: Send + Sync {
    /// Which backend this is
    fn engine_type(&self) -> EngineType;

    /// Evaluate a change request
    async fn evaluate(&self, input: &OpaInput) -> OpaEvaluationResult;

    /// Whether the backend can currently serve evaluations
    async fn health_check(&self) -> bool;
}
