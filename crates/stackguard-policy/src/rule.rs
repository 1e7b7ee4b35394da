//! Policy and rule definitions

use serde::{Deserialize, Serialize};
use stackguard_core::{Error, Result};

use crate::{Condition, RuleAction, Severity};

/// A named collection of rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    /// Policy identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Description of what this policy enforces
    #[serde(default)]
    pub description: String,

    /// Disabled policies never deny, warn, or notify
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Rules in this policy
    pub rules: Vec<Rule>,
}

impl PolicyDefinition {
    /// Create an enabled policy with no rules
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            rules: Vec::new(),
        }
    }

    /// Append a rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Set the enabled flag
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Load a policy from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a policy from a YAML or JSON file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            Self::from_yaml(&content)
        }
    }
}

/// A single rule within a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule identifier
    pub id: String,

    /// Description of what this rule checks
    #[serde(default)]
    pub description: String,

    /// Condition that triggers the rule
    pub condition: Condition,

    /// Severity when triggered
    #[serde(default)]
    pub severity: Severity,

    /// Outcome when triggered
    pub action: RuleAction,

    /// Message template with `{{dot.path}}` placeholders
    pub message: String,
}

impl Rule {
    /// Create a new rule
    pub fn new(
        id: impl Into<String>,
        condition: Condition,
        action: RuleAction,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            condition,
            severity: Severity::default(),
            action,
            message: message.into(),
        }
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

fn default_true() -> bool {
    true
}
