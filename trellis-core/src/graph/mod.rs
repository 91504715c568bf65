//! Dependency Graph
//!
//! This module implements the keyed dependency graph that orders effect
//! evaluation.
//!
//! # Overview
//!
//! The graph is a directed graph over opaque keys where an edge
//! `(dependent, dependency)` means `dependent` must be evaluated after
//! `dependency`. Keys follow two conventions:
//!
//! - a bare field name, e.g. `"email"`
//! - a compound `"field:metaKey"` name for one metadata slot, e.g.
//!   `"email:disabled"`
//!
//! Edges are recorded raw and turned into adjacency maps plus a topological
//! order only on an explicit rebuild, which fails if the edges contain a
//! cycle.
//!
//! # Design Decisions
//!
//! 1. Zero-dependency keys are released in first-seen order, so the same
//!    edges always produce the same order.
//!
//! 2. We maintain both forward (dependencies) and reverse (dependents) maps
//!    so a pass can check its frontier and Kahn's algorithm can walk
//!    forward.
//!
//! 3. [`ValuedDependencyGraph`] binds values to keys without changing the
//!    ordering rules; unbound keys still take part in the order.

mod dependency;
mod valued;

pub use dependency::{CyclicDependency, DependencyGraph, DependencyMap};
pub use valued::ValuedDependencyGraph;
