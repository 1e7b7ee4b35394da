//! Multi-approver sign-off for changes flagged by `require_approval` rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::info;
use uuid::Uuid;

use crate::EvaluationResult;

/// Errors raised while recording approval decisions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("approver '{0}' is not authorized for this change")]
    Unauthorized(String),

    #[error("approver '{0}' has already submitted a decision")]
    DuplicateApprover(String),

    #[error("approval request is already {0}")]
    AlreadyResolved(ApprovalStatus),
}

/// Lifecycle of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A single approver's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Required approval counts per environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequirements {
    /// Count used for environments without an override
    #[serde(default = "default_required")]
    pub default_required: usize,

    /// Environment-specific counts
    #[serde(default)]
    pub overrides: HashMap<String, usize>,
}

impl Default for ApprovalRequirements {
    fn default() -> Self {
        let mut overrides = HashMap::new();
        overrides.insert("production".to_string(), 2);
        overrides.insert("staging".to_string(), 1);
        Self {
            default_required: default_required(),
            overrides,
        }
    }
}

impl ApprovalRequirements {
    /// Approvals needed for an environment
    pub fn required_for(&self, environment: &str) -> usize {
        self.overrides
            .get(environment)
            .copied()
            .unwrap_or(self.default_required)
            .max(1)
    }
}

/// A recorded vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    pub approver: String,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Sign-off state for one change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: String,
    pub change_id: String,
    pub environment: String,
    pub required_approvals: usize,
    pub authorized_approvers: BTreeSet<String>,
    pub records: Vec<ApprovalRecord>,
    pub status: ApprovalStatus,

    /// Reasons copied from the evaluation that triggered the request
    #[serde(default)]
    pub reasons: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Open a pending request
    pub fn new<I, S>(
        change_id: impl Into<String>,
        environment: impl Into<String>,
        required_approvals: usize,
        authorized_approvers: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4().to_string(),
            change_id: change_id.into(),
            environment: environment.into(),
            required_approvals: required_approvals.max(1),
            authorized_approvers: authorized_approvers.into_iter().map(Into::into).collect(),
            records: Vec::new(),
            status: ApprovalStatus::Pending,
            reasons: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Open a request when an evaluation flagged the change for approval
    pub fn from_evaluation<I, S>(
        result: &EvaluationResult,
        change_id: impl Into<String>,
        environment: &str,
        requirements: &ApprovalRequirements,
        authorized_approvers: I,
    ) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !result.approval_required {
            return None;
        }

        let mut request = Self::new(
            change_id,
            environment,
            requirements.required_for(environment),
            authorized_approvers,
        );
        request.reasons = result
            .warnings
            .iter()
            .filter_map(|w| w.strip_prefix(crate::engine::APPROVAL_PREFIX))
            .map(str::to_string)
            .collect();
        Some(request)
    }

    /// Record a decision and return the resulting status
    pub fn submit(
        &mut self,
        approver: &str,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<ApprovalStatus, ApprovalError> {
        if self.status != ApprovalStatus::Pending {
            return Err(ApprovalError::AlreadyResolved(self.status));
        }
        if !self.authorized_approvers.contains(approver) {
            return Err(ApprovalError::Unauthorized(approver.to_string()));
        }
        if self.records.iter().any(|r| r.approver == approver) {
            return Err(ApprovalError::DuplicateApprover(approver.to_string()));
        }

        self.records.push(ApprovalRecord {
            approver: approver.to_string(),
            decision,
            comment,
            decided_at: Utc::now(),
        });

        self.status = match decision {
            Decision::Reject => ApprovalStatus::Rejected,
            Decision::Approve if self.approval_count() >= self.required_approvals => {
                ApprovalStatus::Approved
            }
            Decision::Approve => ApprovalStatus::Pending,
        };

        info!(
            request = %self.id,
            change = %self.change_id,
            approver = %approver,
            status = %self.status,
            "Approval decision recorded"
        );

        Ok(self.status)
    }

    /// Number of approve votes so far
    pub fn approval_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.decision == Decision::Approve)
            .count()
    }
}

fn default_required() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builtin, PolicyEvaluationEngine};
    use serde_json::json;

    fn production_request() -> ApprovalRequest {
        let requirements = ApprovalRequirements::default();
        ApprovalRequest::new(
            "chg-42",
            "production",
            requirements.required_for("production"),
            ["alice", "bob", "carol"],
        )
    }

    #[test]
    fn test_two_approvals_required_in_production() {
        let mut request = production_request();
        assert_eq!(request.required_approvals, 2);

        let status = request.submit("alice", Decision::Approve, None).unwrap();
        assert_eq!(status, ApprovalStatus::Pending);

        let status = request
            .submit("bob", Decision::Approve, Some("lgtm".to_string()))
            .unwrap();
        assert_eq!(status, ApprovalStatus::Approved);
    }

    #[test]
    fn test_single_rejection_is_final() {
        let mut request = production_request();
        let status = request.submit("carol", Decision::Reject, None).unwrap();
        assert_eq!(status, ApprovalStatus::Rejected);

        let err = request.submit("alice", Decision::Approve, None).unwrap_err();
        assert_eq!(err, ApprovalError::AlreadyResolved(ApprovalStatus::Rejected));
    }

    #[test]
    fn test_unauthorized_and_duplicate_votes() {
        let mut request = production_request();
        assert_eq!(
            request.submit("mallory", Decision::Approve, None),
            Err(ApprovalError::Unauthorized("mallory".to_string()))
        );

        request.submit("alice", Decision::Approve, None).unwrap();
        assert_eq!(
            request.submit("alice", Decision::Approve, None),
            Err(ApprovalError::DuplicateApprover("alice".to_string()))
        );
        assert_eq!(request.status, ApprovalStatus::Pending);
    }

    #[test]
    fn test_requirements_defaults() {
        let requirements = ApprovalRequirements::default();
        assert_eq!(requirements.required_for("production"), 2);
        assert_eq!(requirements.required_for("staging"), 1);
        assert_eq!(requirements.required_for("dev"), 1);
    }

    #[test]
    fn test_from_evaluation() {
        let engine = PolicyEvaluationEngine::new();
        let policy = builtin::production_change_policy();
        let input = json!({
            "action": "update",
            "environment": "production",
            "resource": {"name": "api", "tags": {}}
        });
        let result = engine.evaluate(&policy, &input);

        let request = ApprovalRequest::from_evaluation(
            &result,
            "chg-7",
            "production",
            &ApprovalRequirements::default(),
            ["alice", "bob"],
        )
        .unwrap();
        assert_eq!(request.required_approvals, 2);
        assert_eq!(request.reasons, vec!["update on api targets production"]);

        let staging = json!({"action": "update", "environment": "staging"});
        let result = engine.evaluate(&policy, &staging);
        assert!(ApprovalRequest::from_evaluation(
            &result,
            "chg-8",
            "staging",
            &ApprovalRequirements::default(),
            ["alice"],
        )
        .is_none());
    }
}
