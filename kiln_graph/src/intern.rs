// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interning helper for owned keys.
//!
//! The graph APIs are keyed by `K: Copy` so traversal never clones. Setting
//! names are owned strings, so the definition store interns each name once
//! and uses the resulting [`InternId`] everywhere else.
//!
//! ## Example
//!
//! ```rust
//! use kiln_graph::{DependencyGraph, InternId, Interner, affected_sorted};
//!
//! let mut ids = Interner::<String>::new();
//! let base: InternId = ids.intern("base".to_string());
//! let double: InternId = ids.intern("double".to_string());
//!
//! let mut graph = DependencyGraph::<InternId>::new();
//! graph.add_dependency(double, base).unwrap();
//!
//! let order: Vec<_> = affected_sorted(&graph, [base]).collect();
//! assert_eq!(order, vec![base, double]);
//!
//! assert_eq!(ids.lookup("double"), Some(double));
//! assert_eq!(ids.get(base).map(String::as_str), Some("base"));
//! ```

use alloc::vec::Vec;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

use hashbrown::DefaultHashBuilder;
use hashbrown::HashMap;

use crate::graph::DenseKey;

/// A compact, interned identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct InternId(u32);

impl InternId {
    /// Returns this id as a `usize` index (for tables keyed by intern ids).
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw numeric id.
    #[inline]
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Rebuilds an id from a table index.
    ///
    /// Only meaningful for indices handed out by the same [`Interner`].
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self)
    }
}

impl DenseKey for InternId {
    #[inline]
    fn index(self) -> usize {
        self.as_usize()
    }
}

/// Interns owned keys into compact [`InternId`] handles.
///
/// Ids are handed out densely in first-intern order, so `0..len()` covers
/// every interned key.
#[derive(Debug, Clone)]
pub struct Interner<K> {
    keys: Vec<K>,
    buckets: HashMap<u64, Vec<InternId>>,
    build_hasher: DefaultHashBuilder,
}

impl<K> Default for Interner<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Interner<K>
where
    K: Eq + Hash,
{
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            buckets: HashMap::new(),
            build_hasher: DefaultHashBuilder::default(),
        }
    }

    /// Returns the number of interned keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the interner contains no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the key for an interned id, if the id is in-range.
    #[must_use]
    pub fn get(&self, id: InternId) -> Option<&K> {
        self.keys.get(id.as_usize())
    }

    /// Returns the id of an already interned key without inserting it.
    #[must_use]
    pub fn lookup<Q>(&self, key: &Q) -> Option<InternId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.build_hasher.hash_one(key);
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|id| self.keys[id.as_usize()].borrow() == key)
    }

    /// Interns `key` and returns its [`InternId`].
    ///
    /// If an equal key was already interned, this returns the existing id and
    /// drops `key`.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` keys are interned.
    pub fn intern(&mut self, key: K) -> InternId {
        let hash = self.build_hasher.hash_one(&key);
        if let Some(ids) = self.buckets.get(&hash) {
            for &id in ids {
                if self.keys[id.as_usize()] == key {
                    return id;
                }
            }
        }

        let id = InternId(
            u32::try_from(self.keys.len()).expect("too many interned keys for InternId (u32)"),
        );
        self.keys.push(key);
        self.buckets.entry(hash).or_default().push(id);
        id
    }

    /// Returns every interned key with its id, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (InternId, &K)> {
        (0_u32..).zip(self.keys.iter()).map(|(i, k)| (InternId(i), k))
    }

    /// Clears all interned keys.
    ///
    /// This invalidates any previously returned ids.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.buckets.clear();
    }
}
