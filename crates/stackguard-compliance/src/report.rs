//! Assessment summaries and reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackguard_policy::Severity;
use std::collections::{BTreeSet, HashMap};

use crate::{ControlResult, ControlStatus, Framework};

/// Failures bucketed by control severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    /// Count one failure
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Outcome of one framework pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub framework: Framework,
    pub framework_name: String,

    /// Controls in the catalog
    pub total_controls: usize,

    /// Result rows (one per control and applicable resource)
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    pub not_applicable: usize,

    /// Percentage of applicable checks that passed, to one decimal
    pub score: f64,

    pub failures_by_severity: SeverityCounts,
    pub results: Vec<ControlResult>,
    pub evaluated_at: DateTime<Utc>,
}

impl ComplianceSummary {
    /// Tally rows into a summary
    pub fn from_results(framework: Framework, total_controls: usize, results: Vec<ControlResult>) -> Self {
        let mut passed = 0;
        let mut failed = 0;
        let mut warnings = 0;
        let mut not_applicable = 0;
        let mut failures_by_severity = SeverityCounts::default();

        for result in &results {
            match result.status {
                ControlStatus::Pass => passed += 1,
                ControlStatus::Fail => {
                    failed += 1;
                    failures_by_severity.record(result.severity);
                }
                ControlStatus::Warning => warnings += 1,
                ControlStatus::NotApplicable => not_applicable += 1,
            }
        }

        Self {
            framework,
            framework_name: framework.display_name().to_string(),
            total_controls,
            total_checks: results.len(),
            passed,
            failed,
            warnings,
            not_applicable,
            score: score(passed, results.len(), not_applicable),
            failures_by_severity,
            results,
            evaluated_at: Utc::now(),
        }
    }

    /// Rows with status `fail`
    pub fn failures(&self) -> impl Iterator<Item = &ControlResult> {
        self.results.iter().filter(|r| r.status == ControlStatus::Fail)
    }
}

/// `passed / (total - not_applicable) * 100` rounded to one decimal, or 100
/// when nothing was applicable
pub fn score(passed: usize, total: usize, not_applicable: usize) -> f64 {
    let applicable = total.saturating_sub(not_applicable);
    if applicable == 0 {
        return 100.0;
    }
    let raw = passed as f64 / applicable as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// A resource with at least one critical or high failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalResource {
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,

    /// Failures of any severity across all frameworks
    pub failure_count: usize,
    pub critical_failures: usize,
    pub high_failures: usize,
    pub failed_controls: Vec<String>,
    pub frameworks: BTreeSet<Framework>,
}

/// Cross-framework assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub generated_at: DateTime<Utc>,
    pub frameworks: Vec<ComplianceSummary>,
    pub total_resources: usize,

    /// Ranked by failure count, highest first
    pub critical_resources: Vec<CriticalResource>,
}

impl ComplianceReport {
    /// Assemble a report and rank critical resources
    pub fn new(frameworks: Vec<ComplianceSummary>, total_resources: usize) -> Self {
        let critical_resources = rank_critical_resources(&frameworks);
        Self {
            generated_at: Utc::now(),
            frameworks,
            total_resources,
            critical_resources,
        }
    }

    /// Summary for one framework
    pub fn summary(&self, framework: Framework) -> Option<&ComplianceSummary> {
        self.frameworks.iter().find(|s| s.framework == framework)
    }
}

fn rank_critical_resources(summaries: &[ComplianceSummary]) -> Vec<CriticalResource> {
    let mut by_resource: HashMap<&str, CriticalResource> = HashMap::new();

    for summary in summaries {
        for failure in summary.failures().filter(|r| !r.resource_id.is_empty()) {
            let entry = by_resource
                .entry(failure.resource_id.as_str())
                .or_insert_with(|| CriticalResource {
                    resource_id: failure.resource_id.clone(),
                    resource_name: failure.resource_name.clone(),
                    resource_type: failure.resource_type.clone(),
                    failure_count: 0,
                    critical_failures: 0,
                    high_failures: 0,
                    failed_controls: Vec::new(),
                    frameworks: BTreeSet::new(),
                });
            entry.failure_count += 1;
            match failure.severity {
                Severity::Critical => entry.critical_failures += 1,
                Severity::High => entry.high_failures += 1,
                _ => {}
            }
            entry.failed_controls.push(failure.control_id.clone());
            entry.frameworks.insert(failure.framework);
        }
    }

    let mut ranked: Vec<CriticalResource> = by_resource
        .into_values()
        .filter(|r| r.critical_failures + r.high_failures > 0)
        .collect();
    ranked.sort_by(|a, b| {
        b.failure_count
            .cmp(&a.failure_count)
            .then_with(|| b.critical_failures.cmp(&a.critical_failures))
            .then_with(|| a.resource_id.cmp(&b.resource_id))
    });
    ranked
}
