//! Rule actions and severities

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens when a rule's condition matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Block the change
    Deny,
    /// Allow, but surface a warning
    Warn,
    /// Allow only after human approval
    RequireApproval,
    /// Allow, and notify interested parties
    Notify,
}

impl RuleAction {
    /// Whether this action blocks the change on its own
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deny => "deny",
            Self::Warn => "warn",
            Self::RequireApproval => "require_approval",
            Self::Notify => "notify",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a rule or control, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Whether this severity counts toward critical-resource ranking
    pub fn is_severe(self) -> bool {
        self >= Self::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_deserialization() {
        let action: RuleAction = serde_json::from_str(r#""require_approval""#).unwrap();
        assert_eq!(action, RuleAction::RequireApproval);
        assert!(!action.is_blocking());
        assert!(RuleAction::Deny.is_blocking());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High.is_severe());
        assert!(!Severity::Medium.is_severe());
        assert_eq!(Severity::Low.to_string(), "low");
    }
}
