// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kiln Graph: dependency bookkeeping for formula-driven settings.
//!
//! Settings whose formulas mention other settings form a dependency graph.
//! This crate provides the pieces the settings engine builds on:
//!
//! - **Dependency graph** ([`DependencyGraph`]): "A depends on B" edges with
//!   cycle rejection and bidirectional traversal.
//! - **Interning** ([`Interner`], [`InternId`]): compact `Copy` ids for owned
//!   keys such as setting names.
//! - **Topological drain** ([`drain_sorted`], [`affected_sorted`]): Kahn's
//!   algorithm over a subset of keys, dependencies first, with a deterministic
//!   tie-break.
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln_graph::{DependencyGraph, affected_sorted};
//!
//! let mut graph = DependencyGraph::<u32>::new();
//!
//! // 3 depends on 2, 2 depends on 1
//! graph.add_dependency(2, 1).unwrap();
//! graph.add_dependency(3, 2).unwrap();
//!
//! // Closing the loop is rejected.
//! assert!(graph.add_dependency(1, 3).is_err());
//!
//! // Everything affected by a change to 1, dependencies first.
//! let order: Vec<_> = affected_sorted(&graph, [1]).collect();
//! assert_eq!(order, vec![1, 2, 3]);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod drain;
mod graph;
pub mod intern;

pub use drain::{DrainSorted, affected_sorted, drain_sorted};
pub use graph::{CycleError, DenseKey, DependencyGraph};
pub use intern::{InternId, Interner};
