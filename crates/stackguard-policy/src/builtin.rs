//! Ready-made policies for common guardrails

use serde_json::json;

use crate::{Condition, PolicyDefinition, Rule, RuleAction, Severity};

/// Deny changes whose `cost.monthlyDelta` exceeds `limit`
///
/// The boundary is exclusive: a delta equal to the limit is allowed.
pub fn cost_threshold_policy(limit: f64) -> PolicyDefinition {
    let amount = format_amount(limit);
    PolicyDefinition::new("cost-threshold", "Monthly cost threshold").with_rule(
        Rule::new(
            "cost-delta-limit",
            Condition::field_gt("cost.monthlyDelta", limit),
            RuleAction::Deny,
            format!(
                "Estimated monthly cost increase of ${{{{cost.monthlyDelta}}}} exceeds the ${} limit",
                amount
            ),
        )
        .with_severity(Severity::High)
        .with_description(format!("Block changes adding more than ${} per month", amount)),
    )
}

/// Warn once per missing tag
pub fn required_tags_policy<I, S>(tags: I) -> PolicyDefinition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter()
        .map(Into::into)
        .fold(
            PolicyDefinition::new("required-tags", "Required tags"),
            |policy, tag: String| {
                policy.with_rule(
                    Rule::new(
                        format!("tag-{}", tag),
                        Condition::tag_missing(tag.clone()),
                        RuleAction::Warn,
                        format!("Resource {{{{resource.name}}}} is missing required tag '{}'", tag),
                    )
                    .with_severity(Severity::Low),
                )
            },
        )
}

/// Gate production changes behind approval and block deletes of protected resources
pub fn production_change_policy() -> PolicyDefinition {
    PolicyDefinition::new("production-changes", "Production change control")
        .with_rule(
            Rule::new(
                "prod-approval",
                Condition::field_equals("environment", "production"),
                RuleAction::RequireApproval,
                "{{action}} on {{resource.name}} targets production",
            )
            .with_severity(Severity::High),
        )
        .with_rule(
            Rule::new(
                "protected-delete",
                Condition::and(vec![
                    Condition::field_equals("action", "delete"),
                    Condition::TagEquals {
                        tag: "protected".to_string(),
                        value: Some("true".to_string()),
                    },
                ]),
                RuleAction::Deny,
                "{{resource.name}} is protected and cannot be deleted",
            )
            .with_severity(Severity::Critical),
        )
}

/// Deny world-open ingress and notify on public buckets
pub fn public_exposure_policy() -> PolicyDefinition {
    PolicyDefinition::new("public-exposure", "Public exposure")
        .with_rule(
            Rule::new(
                "open-ingress",
                Condition::FieldContains {
                    field: "resource.ingressCidrs".to_string(),
                    value: json!("0.0.0.0/0"),
                },
                RuleAction::Deny,
                "{{resource.name}} allows ingress from 0.0.0.0/0",
            )
            .with_severity(Severity::Critical),
        )
        .with_rule(
            Rule::new(
                "public-bucket",
                Condition::and(vec![
                    Condition::ResourceType {
                        value: "storage".to_string(),
                    },
                    Condition::field_equals("resource.public", true),
                ]),
                RuleAction::Notify,
                "Bucket {{resource.name}} is publicly readable",
            )
            .with_severity(Severity::Medium),
        )
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PolicyEvaluationEngine;
    use serde_json::{json, Value};

    fn cost_input(delta: f64) -> Value {
        json!({"action": "update", "cost": {"monthlyDelta": delta}})
    }

    #[test]
    fn test_cost_threshold_boundaries() {
        let engine = PolicyEvaluationEngine::new();
        let policy = cost_threshold_policy(500.0);

        let under = engine.evaluate(&policy, &cost_input(300.0));
        assert!(under.allowed);
        assert!(under.denials.is_empty());

        let over = engine.evaluate(&policy, &cost_input(600.0));
        assert!(over.denied);
        assert_eq!(over.denials.len(), 1);
        assert!(over.denials[0].contains("$500"), "{}", over.denials[0]);
        assert!(over.denials[0].contains("$600"), "{}", over.denials[0]);

        let at = engine.evaluate(&policy, &cost_input(500.0));
        assert!(at.allowed);
    }

    #[test]
    fn test_required_tags() {
        let engine = PolicyEvaluationEngine::new();
        let policy = required_tags_policy(["owner", "env", "cost-center"]);
        let input = json!({"resource": {"name": "vm-1", "tags": {"env": "dev"}}});

        let result = engine.evaluate(&policy, &input);
        assert!(result.allowed);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].contains("vm-1"));
        assert!(result.warnings[0].contains("'owner'"));
    }

    #[test]
    fn test_production_change_policy() {
        let engine = PolicyEvaluationEngine::new();
        let policy = production_change_policy();
        let input = json!({
            "action": "delete",
            "environment": "production",
            "resource": {"name": "ledger", "tags": {"protected": "true"}}
        });

        let result = engine.evaluate(&policy, &input);
        assert!(result.denied);
        assert!(result.approval_required);
        assert_eq!(result.denials, vec!["ledger is protected and cannot be deleted"]);
    }

    #[test]
    fn test_public_exposure_policy() {
        let engine = PolicyEvaluationEngine::new();
        let input = json!({
            "resource": {
                "name": "assets",
                "type": "storage",
                "public": true,
                "ingressCidrs": ["10.0.0.0/8"]
            }
        });

        let result = engine.evaluate(&public_exposure_policy(), &input);
        assert!(result.allowed);
        assert_eq!(result.notifications, vec!["Bucket assets is publicly readable"]);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(500.0), "500");
        assert_eq!(format_amount(99.5), "99.50");
    }
}
