// src/dag/mod.rs

//! Dependency graph over catalog resources.
//!
//! [`graph`] owns readiness tracking, completion marking, and skip
//! propagation. The engine in [`crate::engine`] is its only driver.

pub mod graph;

pub use graph::{DepGraph, NodeState, Outcome};
