//! Engine that delegates to an external policy service over HTTP

use async_trait::async_trait;
use serde_json::{json, Value};
use stackguard_core::{Error, Result};
use stackguard_policy::rego::head_mapping;
use stackguard_policy::{RuleAction, Severity};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{EngineType, FailMode, OpaEngine, OpaEvaluationResult, OpaInput, OpaPolicyViolation, RemoteOpaConfig};

/// Rule id of the violation synthesized when a fail-closed call fails
pub const UNAVAILABLE_RULE_ID: &str = "remote-policy-unavailable";

/// Package of the synthesized violation
pub const UNAVAILABLE_PACKAGE: &str = "stackguard.remote";

/// Posts `{"input": ...}` to a policy decision endpoint
pub struct RemoteOpaEngine {
    config: RemoteOpaConfig,
    client: reqwest::Client,
    endpoint: String,
    health_endpoint: String,
    package: String,
    head: String,
}

impl RemoteOpaEngine {
    /// Create an engine; fails only if the HTTP client cannot be built
    pub fn new(config: RemoteOpaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::transport(format!("Failed to build HTTP client: {}", e)))?;

        let base = config.base_url.trim_end_matches('/');
        let endpoint = format!("{}/{}", base, config.policy_path.trim_start_matches('/'));
        let health_endpoint = format!("{}/{}", base, config.health_path.trim_start_matches('/'));
        let (package, head) = package_and_head(&config.policy_path);

        Ok(Self {
            config,
            client,
            endpoint,
            health_endpoint,
            package,
            head,
        })
    }

    /// Decision endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Configuration in use
    pub fn config(&self) -> &RemoteOpaConfig {
        &self.config
    }

    async fn call(&self, input: &OpaInput) -> Result<Vec<OpaPolicyViolation>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "input": input }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(format!("{} returned {}", self.endpoint, status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("Invalid response body: {}", e)))?;

        Ok(parse_decision(&body, &self.package, &self.head))
    }

    fn on_failure(&self, error: Error) -> OpaEvaluationResult {
        let fail_mode = self.config.fail_mode;
        metrics::counter!("stackguard_opa_failures_total", "fail_mode" => fail_mode.as_str()).increment(1);
        warn!(
            endpoint = %self.endpoint,
            fail_mode = fail_mode.as_str(),
            error = %error,
            "Remote policy evaluation failed"
        );

        let violations = match fail_mode {
            FailMode::Open => Vec::new(),
            FailMode::Closed => vec![OpaPolicyViolation::new(
                UNAVAILABLE_RULE_ID,
                format!("Policy service unavailable: {}", error),
                Severity::Critical,
                RuleAction::Deny,
                UNAVAILABLE_PACKAGE,
            )],
        };
        OpaEvaluationResult::failed(error.to_string(), violations)
    }
}

#[async_trait]
impl OpaEngine for RemoteOpaEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Remote
    }

    async fn evaluate(&self, input: &OpaInput) -> OpaEvaluationResult {
        let start = Instant::now();
        let mut result = match self.call(input).await {
            Ok(violations) => {
                debug!(endpoint = %self.endpoint, violations = violations.len(), "Remote policy evaluation complete");
                OpaEvaluationResult::with_violations(violations)
            }
            Err(e) => self.on_failure(e),
        };
        result.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        result
    }

    async fn health_check(&self) -> bool {
        match self.client.get(&self.health_endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(endpoint = %self.health_endpoint, error = %e, "Health check failed");
                false
            }
        }
    }
}

/// `v1/data/infra/cost/deny` -> (`infra.cost`, `deny`)
fn package_and_head(policy_path: &str) -> (String, String) {
    let trimmed = policy_path.trim_matches('/');
    let trimmed = trimmed.strip_prefix("v1/data/").unwrap_or(trimmed);
    let mut segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    let head = segments.pop().unwrap_or_default().to_string();
    (segments.join("."), head)
}

/// Read violations out of a decision document
///
/// Accepts `result` as a list of violations, an object with a `violations`
/// list, or an object keyed by rule head. An undefined decision is empty.
fn parse_decision(body: &Value, package: &str, head: &str) -> Vec<OpaPolicyViolation> {
    let result = body.get("result").unwrap_or(&Value::Null);
    match result {
        Value::Array(items) => parse_items(items, package, head),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("violations") {
                return parse_items(items, package, head);
            }
            map.iter()
                .filter(|(key, _)| head_mapping(key).is_some())
                .filter_map(|(key, value)| value.as_array().map(|items| parse_items(items, package, key)))
                .flatten()
                .collect()
        }
        _ => Vec::new(),
    }
}

fn parse_items(items: &[Value], package: &str, head: &str) -> Vec<OpaPolicyViolation> {
    let (default_severity, default_action) = head_mapping(head).unwrap_or((Severity::High, RuleAction::Deny));

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let fallback_id = format!("{}.{}_{}", package, head, index + 1);
            match item {
                Value::Object(obj) => {
                    let text = |keys: &[&str]| {
                        keys.iter()
                            .find_map(|k| obj.get(*k).and_then(Value::as_str))
                            .map(str::to_string)
                    };
                    let severity = obj
                        .get("severity")
                        .and_then(|v| serde_json::from_value(v.clone()).ok())
                        .unwrap_or(default_severity);
                    let action = obj
                        .get("action")
                        .and_then(|v| serde_json::from_value(v.clone()).ok())
                        .unwrap_or(default_action);
                    OpaPolicyViolation::new(
                        text(&["ruleId", "rule_id", "id"]).unwrap_or(fallback_id),
                        text(&["message", "msg"]).unwrap_or_default(),
                        severity,
                        action,
                        text(&["package"]).unwrap_or_else(|| package.to_string()),
                    )
                }
                Value::String(message) => {
                    OpaPolicyViolation::new(fallback_id, message.clone(), default_severity, default_action, package)
                }
                other => OpaPolicyViolation::new(fallback_id, other.to_string(), default_severity, default_action, package),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let engine = RemoteOpaEngine::new(
            RemoteOpaConfig::new("http://opa:8181///").with_policy_path("/v1/data/infra/deny"),
        )
        .unwrap();
        assert_eq!(engine.endpoint(), "http://opa:8181/v1/data/infra/deny");
        assert_eq!(engine.engine_type(), EngineType::Remote);
    }

    #[test]
    fn test_package_and_head() {
        assert_eq!(
            package_and_head("v1/data/infra/cost/deny"),
            ("infra.cost".to_string(), "deny".to_string())
        );
        assert_eq!(package_and_head("warn"), (String::new(), "warn".to_string()));
    }

    #[test]
    fn test_parse_string_list_uses_head() {
        let body = json!({"result": ["too expensive", "no owner"]});
        let violations = parse_decision(&body, "infra", "warn");
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].rule_id, "infra.warn_1");
        assert_eq!(violations[1].message, "no owner");
        assert_eq!(violations[0].action, RuleAction::Warn);
        assert_eq!(violations[0].severity, Severity::Medium);
    }

    #[test]
    fn test_parse_structured_violations() {
        let body = json!({"result": {"violations": [
            {"ruleId": "cost-1", "message": "over budget", "severity": "critical", "action": "deny", "package": "cost"},
            {"id": "tag-1", "msg": "missing tag"}
        ]}});
        let violations = parse_decision(&body, "infra", "violations");
        assert_eq!(violations[0].rule_id, "cost-1");
        assert_eq!(violations[0].package, "cost");
        assert_eq!(violations[1].rule_id, "tag-1");
        assert_eq!(violations[1].severity, Severity::High);
        assert_eq!(violations[1].package, "infra");
    }

    #[test]
    fn test_parse_head_keyed_object() {
        let body = json!({"result": {"deny": ["blocked"], "notify": ["fyi"], "allow": true}});
        let violations = parse_decision(&body, "infra", "main");
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.action == RuleAction::Deny && v.severity == Severity::Critical));
        assert!(violations.iter().any(|v| v.action == RuleAction::Notify && v.rule_id == "infra.notify_1"));
    }

    #[test]
    fn test_undefined_decision_is_empty() {
        assert!(parse_decision(&json!({}), "p", "deny").is_empty());
    }
}
