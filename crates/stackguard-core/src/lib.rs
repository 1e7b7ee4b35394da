//! StackGuard Core
//!
//! Core types shared across StackGuard components.
//!
//! This crate provides:
//! - Error types and result handling
//! - The resource graph model (resources, edges, filters)
//! - The `GraphSource` contract consumed by compliance assessment
//! - An in-memory graph source for tests and embedding callers

pub mod error;
pub mod graph;

pub use error::{Error, Result};
pub use graph::{Edge, EdgeDirection, GraphSource, InMemoryGraph, NodeFilter, Resource};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::graph::{Edge, EdgeDirection, GraphSource, NodeFilter, Resource};
}
