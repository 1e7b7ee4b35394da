//! Frameworks, controls, and per-resource results

use serde::{Deserialize, Serialize};
use stackguard_core::Resource;
use stackguard_policy::Severity;
use std::fmt;
use std::str::FromStr;

use crate::ControlEvaluationContext;

/// A compliance framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "soc2")]
    Soc2,
    #[serde(rename = "cis")]
    Cis,
    #[serde(rename = "hipaa")]
    Hipaa,
    #[serde(rename = "pci-dss")]
    PciDss,
}

impl Framework {
    /// Every supported framework
    pub const ALL: [Framework; 4] = [Self::Soc2, Self::Cis, Self::Hipaa, Self::PciDss];

    /// Identifier used in configuration and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soc2 => "soc2",
            Self::Cis => "cis",
            Self::Hipaa => "hipaa",
            Self::PciDss => "pci-dss",
        }
    }

    /// Human-readable name
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Soc2 => "SOC 2",
            Self::Cis => "CIS Benchmarks",
            Self::Hipaa => "HIPAA",
            Self::PciDss => "PCI-DSS",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised framework name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown compliance framework: {0}")]
pub struct UnknownFramework(pub String);

impl FromStr for Framework {
    type Err = UnknownFramework;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        match normalized.as_str() {
            "soc2" => Ok(Self::Soc2),
            "cis" => Ok(Self::Cis),
            "hipaa" => Ok(Self::Hipaa),
            "pcidss" | "pci" => Ok(Self::PciDss),
            _ => Err(UnknownFramework(s.to_string())),
        }
    }
}

/// Outcome of one control against one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlStatus {
    Pass,
    Fail,
    Warning,
    NotApplicable,
}

impl ControlStatus {
    /// `Pass` when the check holds, `Fail` otherwise
    pub fn from_check(holds: bool) -> Self {
        if holds {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    /// Whether the row counts as a failure
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Fail)
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warning => "warning",
            Self::NotApplicable => "not-applicable",
        }
    }
}

impl fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides a control's status for one resource
pub type EvaluateFn = fn(&ControlEvaluationContext) -> ControlStatus;

/// Explains a status in words
pub type ReasonFn = fn(&ControlEvaluationContext, ControlStatus) -> String;

/// One compliance requirement
///
/// `applicable_resource_types` lists the resource types the control applies
/// to; `"*"` applies it to every resource.
#[derive(Debug, Clone)]
pub struct ComplianceControl {
    pub id: &'static str,
    pub framework: Framework,
    pub section: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub applicable_resource_types: &'static [&'static str],
    pub evaluate: EvaluateFn,
    pub reason: ReasonFn,
}

impl ComplianceControl {
    /// Whether the control applies to a resource type (case-insensitive)
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.applicable_resource_types
            .iter()
            .any(|t| *t == "*" || t.eq_ignore_ascii_case(resource_type))
    }
}

/// One row of a framework evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResult {
    pub control_id: String,
    pub framework: Framework,
    pub section: String,
    pub title: String,
    pub severity: Severity,
    pub status: ControlStatus,

    /// Empty for the placeholder row of a control with no applicable resources
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,

    pub reason: String,
}

impl ControlResult {
    /// A row for `control` evaluated against `resource`
    pub fn new(control: &ComplianceControl, resource: &Resource, status: ControlStatus, reason: String) -> Self {
        Self {
            control_id: control.id.to_string(),
            framework: control.framework,
            section: control.section.to_string(),
            title: control.title.to_string(),
            severity: control.severity,
            status,
            resource_id: resource.id.clone(),
            resource_name: resource.name.clone(),
            resource_type: resource.resource_type.clone(),
            reason,
        }
    }

    /// A failed row carrying an error as its reason
    pub fn failed(control: &ComplianceControl, resource: &Resource, error: impl fmt::Display) -> Self {
        Self::new(
            control,
            resource,
            ControlStatus::Fail,
            format!("Control evaluation error: {}", error),
        )
    }

    /// The placeholder row for a control with no applicable resources
    pub fn not_applicable(control: &ComplianceControl) -> Self {
        Self {
            control_id: control.id.to_string(),
            framework: control.framework,
            section: control.section.to_string(),
            title: control.title.to_string(),
            severity: control.severity,
            status: ControlStatus::NotApplicable,
            resource_id: String::new(),
            resource_name: String::new(),
            resource_type: String::new(),
            reason: format!(
                "No resources of type {} in scope",
                control.applicable_resource_types.join(", ")
            ),
        }
    }
}
