//! StackGuard compliance assessment
//!
//! Runs framework control catalogs (SOC 2, CIS, HIPAA, PCI-DSS) against the
//! resources of a [`GraphSource`](stackguard_core::GraphSource):
//! - every control yields one row per applicable resource, or a single
//!   `not-applicable` row when nothing in scope matches
//! - a control that errors or panics yields a `fail` row instead of aborting
//!   the pass
//! - summaries carry a 0-100 score and failures by severity; reports add a
//!   cross-framework ranking of critical resources

pub mod catalog;
pub mod context;
pub mod control;
pub mod engine;
pub mod heuristics;
pub mod report;

pub use catalog::controls_for;
pub use context::ControlEvaluationContext;
pub use control::{
    ComplianceControl, ControlResult, ControlStatus, EvaluateFn, Framework, ReasonFn, UnknownFramework,
};
pub use engine::ComplianceEngine;
pub use report::{ComplianceReport, ComplianceSummary, CriticalResource, SeverityCounts};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::control::{ControlStatus, Framework};
    pub use crate::engine::ComplianceEngine;
    pub use crate::report::{ComplianceReport, ComplianceSummary};
}
