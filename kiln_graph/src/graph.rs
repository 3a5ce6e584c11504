// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency graph between settings.

use alloc::vec::Vec;
use core::fmt;
use core::hash::Hash;

use hashbrown::HashSet;

/// Keys that map onto a dense `0..n` index range.
///
/// The graph stores adjacency lists in vectors indexed by [`DenseKey::index`],
/// so keys should be small and contiguous (interned ids are ideal).
pub trait DenseKey {
    /// Returns the dense index of this key.
    fn index(self) -> usize;
}

impl DenseKey for u32 {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl DenseKey for usize {
    #[inline]
    fn index(self) -> usize {
        self
    }
}

/// Error returned when a cycle would be created by adding a dependency.
#[derive(Clone, PartialEq, Eq)]
pub struct CycleError<K> {
    /// The key that would depend on another.
    pub from: K,
    /// The key that would be depended upon.
    pub to: K,
}

impl<K: fmt::Debug> fmt::Debug for CycleError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CycleError {{ from: {:?}, to: {:?} }}", self.from, self.to)
    }
}

impl<K: fmt::Debug> fmt::Display for CycleError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "adding dependency {:?} -> {:?} would create a cycle",
            self.from, self.to
        )
    }
}

impl<K: fmt::Debug> core::error::Error for CycleError<K> {}

/// Dependency graph: "A depends on B" edges.
///
/// Edges are stored in both directions, so "what does A read?" and "who reads
/// A?" are both a single slice lookup.
///
/// # Example
///
/// ```
/// use kiln_graph::DependencyGraph;
///
/// let mut graph = DependencyGraph::<u32>::new();
///
/// // `double` (2) reads `base` (1); `gate` (3) reads `base` too.
/// graph.add_dependency(2, 1).unwrap();
/// graph.add_dependency(3, 1).unwrap();
///
/// assert!(graph.dependencies(2).any(|k| k == 1));
/// assert_eq!(graph.dependents(1).count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct DependencyGraph<K>
where
    K: Copy + Eq + Hash + DenseKey,
{
    /// Forward edges: forward[key.index()] -> keys that `key` depends on.
    forward: Vec<Vec<K>>,
    /// Reverse edges: reverse[key.index()] -> keys that depend on `key`.
    reverse: Vec<Vec<K>>,
}

impl<K> Default for DependencyGraph<K>
where
    K: Copy + Eq + Hash + DenseKey,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Ensures `vec` has at least `idx + 1` elements, filling with defaults.
#[inline]
fn grow<T: Default>(vec: &mut Vec<T>, idx: usize) {
    if idx >= vec.len() {
        vec.resize_with(idx + 1, T::default);
    }
}

#[inline]
fn slot<K>(lists: &[Vec<K>], idx: usize) -> &[K] {
    lists.get(idx).map_or(&[][..], Vec::as_slice)
}

impl<K> DependencyGraph<K>
where
    K: Copy + Eq + Hash + DenseKey,
{
    /// Creates a new empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            forward: Vec::new(),
            reverse: Vec::new(),
        }
    }

    /// Adds a dependency: `from` depends on `to`.
    ///
    /// When `to` changes, `from` has to be recomputed.
    ///
    /// Returns `Ok(true)` if the dependency was newly added and `Ok(false)`
    /// if it already existed.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`] and leaves the graph unchanged if `to` already
    /// (transitively) depends on `from`, or if `from == to`.
    pub fn add_dependency(&mut self, from: K, to: K) -> Result<bool, CycleError<K>> {
        if from == to || self.would_create_cycle(from, to) {
            return Err(CycleError { from, to });
        }

        let from_idx = from.index();
        let to_idx = to.index();

        grow(&mut self.forward, from_idx);
        if self.forward[from_idx].contains(&to) {
            return Ok(false);
        }
        self.forward[from_idx].push(to);

        grow(&mut self.reverse, to_idx);
        self.reverse[to_idx].push(from);

        Ok(true)
    }

    /// Checks whether adding `from -> to` would create a cycle, i.e. whether
    /// `to` already (transitively) depends on `from`.
    fn would_create_cycle(&self, from: K, to: K) -> bool {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        stack.push(to);

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(slot(&self.forward, current.index()).iter().copied());
        }

        false
    }

    /// Returns the direct dependencies of `key` (the keys it reads).
    ///
    /// Keys are yielded in insertion order.
    #[inline]
    pub fn dependencies(&self, key: K) -> impl Iterator<Item = K> + '_ {
        slot(&self.forward, key.index()).iter().copied()
    }

    /// Returns the direct dependents of `key` (the keys that read it).
    #[inline]
    pub fn dependents(&self, key: K) -> impl Iterator<Item = K> + '_ {
        slot(&self.reverse, key.index()).iter().copied()
    }

    /// Returns all transitive dependents of `key`, each at most once.
    ///
    /// The iteration order is depth-first and not otherwise specified.
    pub fn transitive_dependents(&self, key: K) -> impl Iterator<Item = K> + '_ {
        TransitiveDependentsIter {
            graph: self,
            visited: HashSet::new(),
            stack: self.dependents(key).collect(),
        }
    }
}

/// Iterator over transitive dependents using DFS.
struct TransitiveDependentsIter<'a, K>
where
    K: Copy + Eq + Hash + DenseKey,
{
    graph: &'a DependencyGraph<K>,
    visited: HashSet<K>,
    stack: Vec<K>,
}

impl<K> Iterator for TransitiveDependentsIter<'_, K>
where
    K: Copy + Eq + Hash + DenseKey,
{
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(key) = self.stack.pop() {
            if self.visited.insert(key) {
                self.stack.extend(self.graph.dependents(key));
                return Some(key);
            }
        }
        None
    }
}
