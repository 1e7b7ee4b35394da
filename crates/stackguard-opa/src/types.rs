//! Engine input and result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackguard_policy::{RuleAction, Severity};
use std::fmt;

/// Input handed to every policy engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaInput {
    /// The proposed change (action, resource, environment, cost, risk, ...)
    pub change_request: Value,

    pub timestamp: DateTime<Utc>,
}

impl OpaInput {
    /// Wrap a change request, stamped with the current time
    pub fn new(change_request: Value) -> Self {
        Self {
            change_request,
            timestamp: Utc::now(),
        }
    }
}

/// One rule violation reported by an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaPolicyViolation {
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
    pub action: RuleAction,
    pub package: String,
}

impl OpaPolicyViolation {
    /// Create a violation
    pub fn new(
        rule_id: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        action: RuleAction,
        package: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            severity,
            action,
            package: package.into(),
        }
    }
}

/// Outcome of one engine evaluation
///
/// `ok` reports whether the engine produced a verdict at all; a failed remote
/// call yields `ok == false` with violations decided by the fail mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaEvaluationResult {
    pub ok: bool,
    pub violations: Vec<OpaPolicyViolation>,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OpaEvaluationResult {
    /// A successful evaluation with no violations
    pub fn allow() -> Self {
        Self {
            ok: true,
            violations: Vec::new(),
            duration_ms: 0.0,
            error: None,
        }
    }

    /// A successful evaluation with violations
    pub fn with_violations(violations: Vec<OpaPolicyViolation>) -> Self {
        Self {
            violations,
            ..Self::allow()
        }
    }

    /// A failed evaluation
    pub fn failed(error: impl Into<String>, violations: Vec<OpaPolicyViolation>) -> Self {
        Self {
            ok: false,
            violations,
            duration_ms: 0.0,
            error: Some(error.into()),
        }
    }

    /// Whether any violation blocks the change
    pub fn is_denied(&self) -> bool {
        self.violations.iter().any(|v| v.action.is_blocking())
    }
}

impl Default for OpaEvaluationResult {
    fn default() -> Self {
        Self::allow()
    }
}

/// Backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Local,
    Mock,
    Remote,
}

impl EngineType {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Mock => "mock",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
