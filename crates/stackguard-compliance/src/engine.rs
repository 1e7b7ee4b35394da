//! Compliance assessment over a resource graph

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use stackguard_core::{GraphSource, NodeFilter, Resource, Result};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::controls_for;
use crate::{
    ComplianceControl, ComplianceReport, ComplianceSummary, ControlEvaluationContext, ControlResult, Framework,
};

/// (control, resource) evaluations in flight at once
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Runs framework control catalogs against graph resources
#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    concurrency: usize,
    catalogs: HashMap<Framework, Vec<ComplianceControl>>,
}

impl ComplianceEngine {
    /// Create an engine using the built-in catalogs
    pub fn new() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            catalogs: HashMap::new(),
        }
    }

    /// Bound the per-framework fan-out
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Replace a framework's built-in catalog
    pub fn with_controls(mut self, framework: Framework, controls: Vec<ComplianceControl>) -> Self {
        self.catalogs.insert(framework, controls);
        self
    }

    /// Controls evaluated for a framework
    pub fn controls(&self, framework: Framework) -> &[ComplianceControl] {
        self.catalogs
            .get(&framework)
            .map(Vec::as_slice)
            .unwrap_or_else(|| controls_for(framework))
    }

    /// Evaluate one framework against the resources matching `filter`
    ///
    /// Only the resource query can fail; per-resource problems become `fail`
    /// rows.
    pub async fn evaluate_framework(
        &self,
        framework: Framework,
        graph: &dyn GraphSource,
        filter: Option<&NodeFilter>,
    ) -> Result<ComplianceSummary> {
        let resources = query(graph, filter).await?;
        Ok(self.evaluate_resources(framework, graph, &resources).await)
    }

    /// Evaluate several frameworks and rank critical resources
    pub async fn run_compliance_assessment(
        &self,
        frameworks: &[Framework],
        graph: &dyn GraphSource,
        filter: Option<&NodeFilter>,
    ) -> Result<ComplianceReport> {
        let resources = query(graph, filter).await?;

        let mut summaries = Vec::with_capacity(frameworks.len());
        for framework in frameworks {
            summaries.push(self.evaluate_resources(*framework, graph, &resources).await);
        }

        let report = ComplianceReport::new(summaries, resources.len());
        info!(
            frameworks = frameworks.len(),
            resources = report.total_resources,
            critical_resources = report.critical_resources.len(),
            "Compliance assessment complete"
        );
        Ok(report)
    }

    async fn evaluate_resources(
        &self,
        framework: Framework,
        graph: &dyn GraphSource,
        resources: &[Resource],
    ) -> ComplianceSummary {
        let start = Instant::now();
        let controls = self.controls(framework);
        info!(
            framework = %framework,
            controls = controls.len(),
            resources = resources.len(),
            "Starting compliance evaluation"
        );

        let mut placeholders = Vec::new();
        let mut pairs = Vec::new();
        for control in controls {
            let applicable: Vec<&Resource> = resources
                .iter()
                .filter(|r| control.applies_to(&r.resource_type))
                .collect();
            if applicable.is_empty() {
                placeholders.push(ControlResult::not_applicable(control));
            } else {
                pairs.extend(applicable.into_iter().map(|resource| (control, resource)));
            }
        }

        let evaluated: Vec<ControlResult> = stream::iter(pairs)
            .map(|(control, resource)| evaluate_pair(control, resource, graph))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut results = evaluated;
        results.extend(placeholders);
        results.sort_by(|a, b| a.control_id.cmp(&b.control_id).then_with(|| a.resource_id.cmp(&b.resource_id)));

        let summary = ComplianceSummary::from_results(framework, controls.len(), results);
        metrics::gauge!("stackguard_compliance_score", "framework" => framework.as_str()).set(summary.score);
        info!(
            framework = %framework,
            score = summary.score,
            passed = summary.passed,
            failed = summary.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Compliance evaluation complete"
        );
        summary
    }
}

impl Default for ComplianceEngine {
    fn default() -> Self {
        Self::new()
    }
}

async fn query(graph: &dyn GraphSource, filter: Option<&NodeFilter>) -> Result<Vec<Resource>> {
    let all = NodeFilter::all();
    let resources = graph.query_nodes(filter.unwrap_or(&all)).await?;
    debug!(resources = resources.len(), "Queried resources for compliance");
    Ok(resources)
}

async fn evaluate_pair(control: &ComplianceControl, resource: &Resource, graph: &dyn GraphSource) -> ControlResult {
    let outcome = AssertUnwindSafe(async {
        let ctx = ControlEvaluationContext::build(graph, resource).await?;
        let status = (control.evaluate)(&ctx);
        let reason = (control.reason)(&ctx, status);
        Ok::<_, stackguard_core::Error>((status, reason))
    })
    .catch_unwind()
    .await;

    match outcome {
        Ok(Ok((status, reason))) => ControlResult::new(control, resource, status, reason),
        Ok(Err(e)) => {
            warn!(control = control.id, resource = %resource.id, error = %e, "Control evaluation failed");
            ControlResult::failed(control, resource, e)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(control = control.id, resource = %resource.id, error = %message, "Control evaluation panicked");
            ControlResult::failed(control, resource, message)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "control panicked".to_string()
    }
}
