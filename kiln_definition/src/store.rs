// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The definition store.

use core::fmt;
use core::ops::Index;

use kiln_graph::Interner;
use tracing::{debug, info};

use crate::SettingId;
use crate::definition::SettingDefinition;
use crate::document::RecordSet;
use crate::error::DefinitionError;
use crate::index::DependencyIndex;
use crate::loader::DefinitionLoader;

/// Every known setting definition plus the dependency index over them.
///
/// Ids are dense and follow first-appearance order across the schema
/// documents, which is also the tie-break order for recomputation.
///
/// # Example
///
/// ```rust
/// use kiln_definition::DefinitionStore;
///
/// let store = DefinitionStore::load([r#"{
///     "settings": {
///         "machine": {
///             "type": "category",
///             "children": {
///                 "nozzle_size": { "type": "float", "default_value": 0.4 },
///                 "line_width": { "type": "float", "value": "nozzle_size" }
///             }
///         }
///     }
/// }"#])
/// .unwrap();
///
/// assert_eq!(store.len(), 2);
/// assert_eq!(store.dependencies("line_width"), ["nozzle_size"]);
/// assert_eq!(store.dependents("nozzle_size"), ["line_width"]);
/// assert!(store.definition("machine").is_none());
/// ```
pub struct DefinitionStore {
    names: Interner<String>,
    definitions: Vec<SettingDefinition>,
    index: DependencyIndex,
}

impl DefinitionStore {
    /// Builds a store from definitions. A later definition with an already
    /// used name replaces the earlier one but keeps its id.
    #[must_use]
    pub fn from_definitions(definitions: impl IntoIterator<Item = SettingDefinition>) -> Self {
        let mut names = Interner::new();
        let mut slots: Vec<SettingDefinition> = Vec::new();
        for definition in definitions {
            let id = names.intern(definition.name().to_owned());
            if let Some(slot) = slots.get_mut(id.as_usize()) {
                debug!(setting = definition.name(), "definition replaced");
                *slot = definition;
            } else {
                slots.push(definition);
            }
        }
        let index = DependencyIndex::build(&slots, &names);
        info!(
            settings = slots.len(),
            cyclic = index.cyclic().len(),
            "definition store built"
        );
        Self {
            names,
            definitions: slots,
            index,
        }
    }

    /// Builds a store from complete document texts, in merge order.
    ///
    /// Malformed documents are logged and skipped. Fails only if no
    /// document could be used.
    pub fn load<I, S>(documents: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let documents: Vec<S> = documents.into_iter().collect();
        let mut loader = DefinitionLoader::new((0..documents.len()).map(|i| i.to_string()));
        for (i, document) in documents.iter().enumerate() {
            loader.receive(&i.to_string(), Ok(document.as_ref().to_owned()));
        }
        loader.finish()
    }

    pub(crate) fn from_records(records: &RecordSet) -> Self {
        Self::from_definitions(
            records
                .iter()
                .filter(|(_, fields)| !crate::document::is_category(fields))
                .map(|(name, fields)| SettingDefinition::from_record(name, fields)),
        )
    }

    /// Number of definitions.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if there are no definitions.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// The id of a setting name.
    #[must_use]
    pub fn id(&self, name: &str) -> Option<SettingId> {
        self.names.lookup(name)
    }

    /// The definition with the given id.
    #[must_use]
    #[inline]
    pub fn get(&self, id: SettingId) -> Option<&SettingDefinition> {
        self.definitions.get(id.as_usize())
    }

    /// The definition with the given name.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&SettingDefinition> {
        self.get(self.id(name)?)
    }

    /// Returns `true` if `name` is a defined setting.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.id(name).is_some()
    }

    /// Every definition with its id, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SettingId, &SettingDefinition)> {
        self.names.iter().map(|(id, _)| id).zip(&self.definitions)
    }

    /// Every id, in id order.
    pub fn ids(&self) -> impl Iterator<Item = SettingId> + '_ {
        self.names.iter().map(|(id, _)| id)
    }

    /// The dependency index.
    #[must_use]
    #[inline]
    pub fn index(&self) -> &DependencyIndex {
        &self.index
    }

    /// Names the formulas of `name` read. Empty for unknown names.
    #[must_use]
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.id(name)
            .map(|id| self.names_of(self.index.dependencies(id)))
            .unwrap_or_default()
    }

    /// Names whose formulas read `name`. Empty for unknown names.
    #[must_use]
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.id(name)
            .map(|id| self.names_of(self.index.dependents(id)))
            .unwrap_or_default()
    }

    fn names_of(&self, ids: impl Iterator<Item = SettingId>) -> Vec<&str> {
        ids.filter_map(|id| self.get(id)).map(SettingDefinition::name).collect()
    }
}

impl Default for DefinitionStore {
    fn default() -> Self {
        Self::from_definitions(Vec::new())
    }
}

impl Index<SettingId> for DefinitionStore {
    type Output = SettingDefinition;

    /// # Panics
    ///
    /// Panics if `id` did not come from this store.
    fn index(&self, id: SettingId) -> &SettingDefinition {
        &self.definitions[id.as_usize()]
    }
}

impl fmt::Debug for DefinitionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionStore")
            .field("len", &self.definitions.len())
            .field("cyclic", &self.index.cyclic().len())
            .finish_non_exhaustive()
    }
}
