// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Topologically sorted drain over a subset of graph keys.

use alloc::collections::BinaryHeap;
use alloc::vec::Vec;
use core::cmp::Reverse;
use core::hash::Hash;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;

use crate::graph::{DenseKey, DependencyGraph};

/// Iterator that yields keys dependencies-first.
///
/// Uses Kahn's algorithm restricted to the given key subset:
///
/// 1. Count, for each key, how many of its dependencies are in the subset.
/// 2. Start with the keys whose count is zero.
/// 3. Yield the smallest ready key, decrement its dependents' counts, and
///    promote any dependent that reaches zero.
///
/// Picking the smallest ready key (by `Ord`) makes the order deterministic,
/// which keeps recomputation order stable across runs.
///
/// [`DependencyGraph`] rejects cycles, so every key in the subset is
/// eventually yielded.
///
/// # Example
///
/// ```
/// use kiln_graph::{DependencyGraph, drain_sorted};
///
/// let mut graph = DependencyGraph::<u32>::new();
/// // 1 <- 2 <- 3
/// graph.add_dependency(2, 1).unwrap();
/// graph.add_dependency(3, 2).unwrap();
///
/// let sorted: Vec<_> = drain_sorted(&graph, [3, 1, 2]).collect();
/// assert_eq!(sorted, vec![1, 2, 3]);
/// ```
#[derive(Debug)]
pub struct DrainSorted<'a, K>
where
    K: Copy + Eq + Hash + Ord + DenseKey,
{
    graph: &'a DependencyGraph<K>,
    /// Keys with zero in-degree, ready to yield (min-heap via `Reverse`).
    ready: BinaryHeap<Reverse<K>>,
    /// Remaining in-degree for each not-yet-yielded key.
    in_degree: HashMap<K, usize>,
}

/// Drains `keys` in dependency order.
///
/// Duplicate keys are yielded once.
pub fn drain_sorted<K, I>(graph: &DependencyGraph<K>, keys: I) -> DrainSorted<'_, K>
where
    K: Copy + Eq + Hash + Ord + DenseKey,
    I: IntoIterator<Item = K>,
{
    DrainSorted::new(graph, keys)
}

/// Drains `roots` plus all of their transitive dependents in dependency order.
///
/// This is the recomputation order after `roots` changed: every affected
/// key appears after everything it reads.
pub fn affected_sorted<K, I>(graph: &DependencyGraph<K>, roots: I) -> DrainSorted<'_, K>
where
    K: Copy + Eq + Hash + Ord + DenseKey,
    I: IntoIterator<Item = K>,
{
    let mut keys = Vec::new();
    for root in roots {
        keys.push(root);
        keys.extend(graph.transitive_dependents(root));
    }
    DrainSorted::new(graph, keys)
}

impl<'a, K> DrainSorted<'a, K>
where
    K: Copy + Eq + Hash + Ord + DenseKey,
{
    fn new<I>(graph: &'a DependencyGraph<K>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        // Deduplicate input keys via the in-degree map keys.
        let mut in_degree: HashMap<K, usize> = HashMap::new();
        let mut unique_keys = Vec::new();
        for key in keys {
            if let Entry::Vacant(e) = in_degree.entry(key) {
                e.insert(0);
                unique_keys.push(key);
            }
        }

        // Compute in-degrees within the subset.
        for &key in &unique_keys {
            let within = graph
                .dependencies(key)
                .filter(|dep| in_degree.contains_key(dep))
                .count();
            if let Some(deg) = in_degree.get_mut(&key) {
                *deg = within;
            }
        }

        let mut ready = BinaryHeap::with_capacity(in_degree.len());
        for key in unique_keys {
            if in_degree.get(&key).is_some_and(|&deg| deg == 0) {
                ready.push(Reverse(key));
            }
        }

        Self {
            graph,
            ready,
            in_degree,
        }
    }
}

impl<K> Iterator for DrainSorted<'_, K>
where
    K: Copy + Eq + Hash + Ord + DenseKey,
{
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(key) = self.ready.pop()?;
        self.in_degree.remove(&key);

        for dependent in self.graph.dependents(key) {
            if let Some(deg) = self.in_degree.get_mut(&dependent) {
                *deg = deg.saturating_sub(1);
                if *deg == 0 {
                    self.ready.push(Reverse(dependent));
                }
            }
        }

        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn drain_orders_dependencies_first() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(3, 1).unwrap();
        graph.add_dependency(3, 2).unwrap();
        graph.add_dependency(4, 3).unwrap();

        let order: Vec<_> = drain_sorted(&graph, [4, 3, 2, 1]).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn drain_ties_break_by_smallest_key() {
        let graph = DependencyGraph::<u32>::new();
        let order: Vec<_> = drain_sorted(&graph, [9, 4, 7]).collect();
        assert_eq!(order, vec![4, 7, 9]);
    }

    #[test]
    fn drain_ignores_edges_outside_subset() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(2, 1).unwrap();

        // 1 is not part of the subset, so 2 is immediately ready.
        let order: Vec<_> = drain_sorted(&graph, [2]).collect();
        assert_eq!(order, vec![2]);
    }

    #[test]
    fn affected_includes_transitive_dependents() {
        let mut graph = DependencyGraph::<u32>::new();
        // 1 <- 2 <- 3, 1 <- 4, 5 unrelated
        graph.add_dependency(2, 1).unwrap();
        graph.add_dependency(3, 2).unwrap();
        graph.add_dependency(4, 1).unwrap();
        graph.add_dependency(6, 5).unwrap();

        let order: Vec<_> = affected_sorted(&graph, [1]).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn duplicate_roots_are_yielded_once() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(2, 1).unwrap();
        graph.add_dependency(3, 1).unwrap();

        let order: Vec<_> = affected_sorted(&graph, [2, 1, 2]).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }
}
