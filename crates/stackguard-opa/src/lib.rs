//! StackGuard policy engines
//!
//! Interchangeable backends behind the [`OpaEngine`] trait:
//! - [`LocalOpaEngine`]: evaluates rules compiled from a Rego subset in-process
//! - [`MockOpaEngine`]: returns scripted results and records its inputs
//! - [`RemoteOpaEngine`]: posts to an external policy service, with
//!   fail-open or fail-closed behaviour when the service is unreachable
//!
//! [`create_opa_engine`] builds a backend from configuration and
//! [`batch_evaluate`] runs many inputs through one engine.

pub mod batch;
pub mod config;
pub mod engine;
pub mod factory;
pub mod local;
pub mod mock;
pub mod remote;
pub mod types;

pub use batch::{batch_evaluate, batch_evaluate_with_concurrency, BatchResult};
pub use config::{EngineConfig, FailMode, LocalEngineConfig, MockEngineConfig, RemoteOpaConfig};
pub use engine::OpaEngine;
pub use factory::create_opa_engine;
pub use local::LocalOpaEngine;
pub use mock::MockOpaEngine;
pub use remote::RemoteOpaEngine;
pub use types::{EngineType, OpaEvaluationResult, OpaInput, OpaPolicyViolation};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::batch::batch_evaluate;
    pub use crate::config::{EngineConfig, FailMode};
    pub use crate::engine::OpaEngine;
    pub use crate::factory::create_opa_engine;
    pub use crate::types::{OpaEvaluationResult, OpaInput, OpaPolicyViolation};
}
