// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dependency index: who reads whom.

use hashbrown::HashSet;
use kiln_graph::{DependencyGraph, Interner, affected_sorted, drain_sorted};
use tracing::warn;

use crate::SettingId;
use crate::definition::SettingDefinition;

/// Dependency edges derived from the formulas of every definition.
///
/// An edge `A -> B` means one of `A`'s `value`, `resolve`, `enabled` or
/// `limit_to_extruder` formulas mentions `B`. Names that are not defined
/// settings and a setting mentioning itself produce no edge.
///
/// Edges that would close a cycle are rejected when the index is built and
/// both endpoints are recorded in [`cyclic`](Self::cyclic), so recomputation
/// always terminates.
#[derive(Clone, Debug, Default)]
pub struct DependencyIndex {
    graph: DependencyGraph<SettingId>,
    len: usize,
    cyclic: Vec<SettingId>,
}

impl DependencyIndex {
    pub(crate) fn build(definitions: &[SettingDefinition], names: &Interner<String>) -> Self {
        let mut graph = DependencyGraph::new();
        let mut cyclic = HashSet::new();

        for (id, definition) in names.iter().map(|(id, _)| id).zip(definitions) {
            let mut seen = Vec::new();
            for formula in definition.tracked_formulas() {
                for reference in formula.references() {
                    let Some(dependency) = names.lookup(reference.as_str()) else {
                        continue;
                    };
                    if dependency == id || seen.contains(&dependency) {
                        continue;
                    }
                    seen.push(dependency);
                    if graph.add_dependency(id, dependency).is_err() {
                        warn!(
                            setting = definition.name(),
                            dependency = %reference,
                            "dependency would close a cycle, edge rejected"
                        );
                        cyclic.insert(id);
                        cyclic.insert(dependency);
                    }
                }
            }
        }

        let mut cyclic: Vec<_> = cyclic.into_iter().collect();
        cyclic.sort_unstable();
        Self {
            graph,
            len: definitions.len(),
            cyclic,
        }
    }

    /// Settings `id`'s formulas read.
    pub fn dependencies(&self, id: SettingId) -> impl Iterator<Item = SettingId> + '_ {
        self.graph.dependencies(id)
    }

    /// Settings whose formulas read `id`.
    pub fn dependents(&self, id: SettingId) -> impl Iterator<Item = SettingId> + '_ {
        self.graph.dependents(id)
    }

    /// Everything that must be recomputed when `id` changes, excluding `id`.
    pub fn transitive_dependents(&self, id: SettingId) -> impl Iterator<Item = SettingId> + '_ {
        self.graph.transitive_dependents(id)
    }

    /// `roots` and their transitive dependents, each after everything it
    /// reads. Ties break by definition order.
    #[must_use]
    pub fn affected_order(&self, roots: impl IntoIterator<Item = SettingId>) -> Vec<SettingId> {
        affected_sorted(&self.graph, roots).collect()
    }

    /// Every setting, each after everything it reads.
    #[must_use]
    pub fn full_order(&self) -> Vec<SettingId> {
        let ids = (0..self.len).filter_map(SettingId::from_index);
        drain_sorted(&self.graph, ids).collect()
    }

    /// Settings that took part in a rejected edge, in id order.
    #[must_use]
    #[inline]
    pub fn cyclic(&self) -> &[SettingId] {
        &self.cyclic
    }

    /// Returns `true` if `id` took part in a rejected edge.
    #[must_use]
    pub fn is_cyclic(&self, id: SettingId) -> bool {
        self.cyclic.binary_search(&id).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SettingDefinition, SettingType};
    use pretty_assertions::assert_eq;

    fn index(defs: &[SettingDefinition]) -> (DependencyIndex, Interner<String>) {
        let mut names = Interner::new();
        for def in defs {
            names.intern(def.name().to_owned());
        }
        (DependencyIndex::build(defs, &names), names)
    }

    fn float(name: &str) -> SettingDefinition {
        SettingDefinition::builder(name, SettingType::Float).build()
    }

    fn computed(name: &str, formula: &str) -> SettingDefinition {
        SettingDefinition::builder(name, SettingType::Float)
            .value(formula)
            .build()
    }

    fn labels(names: &Interner<String>, ids: impl IntoIterator<Item = SettingId>) -> Vec<String> {
        ids.into_iter()
            .map(|id| names.get(id).cloned().unwrap())
            .collect()
    }

    #[test]
    fn edges_follow_formula_references() {
        let defs = [
            float("line_width"),
            computed("wall_thickness", "line_width * wall_line_count"),
            float("wall_line_count"),
            SettingDefinition::builder("wall_speed", SettingType::Float)
                .enabled("wall_thickness > 0 and unknown_setting")
                .build(),
        ];
        let (index, names) = index(&defs);
        let wall = names.lookup("wall_thickness").unwrap();
        assert_eq!(
            labels(&names, index.dependencies(wall)),
            ["line_width", "wall_line_count"]
        );
        assert_eq!(labels(&names, index.dependents(wall)), ["wall_speed"]);
        assert!(index.cyclic().is_empty());
    }

    #[test]
    fn self_references_add_no_edge() {
        let defs = [SettingDefinition::builder("bed_temperature", SettingType::Float)
            .resolve("max(extruderValues('bed_temperature'))")
            .build()];
        let (index, names) = index(&defs);
        let id = names.lookup("bed_temperature").unwrap();
        assert_eq!(index.dependencies(id).count(), 0);
        assert!(!index.is_cyclic(id));
    }

    #[test]
    fn cycles_are_rejected_and_recorded() {
        let defs = [computed("a", "b + 1"), computed("b", "a + 1"), float("c")];
        let (index, names) = index(&defs);
        assert_eq!(labels(&names, index.cyclic().iter().copied()), ["a", "b"]);
        let c = names.lookup("c").unwrap();
        assert!(!index.is_cyclic(c));
        // Ordering still terminates and covers everything.
        assert_eq!(index.full_order().len(), 3);
    }

    #[test]
    fn affected_order_puts_dependencies_first() {
        let defs = [
            computed("top", "middle + bottom"),
            computed("middle", "bottom * 2"),
            float("bottom"),
            float("unrelated"),
        ];
        let (index, names) = index(&defs);
        let bottom = names.lookup("bottom").unwrap();
        assert_eq!(
            labels(&names, index.affected_order([bottom])),
            ["bottom", "middle", "top"]
        );
        assert_eq!(
            labels(&names, index.full_order()),
            ["bottom", "middle", "top", "unrelated"]
        );
    }
}
