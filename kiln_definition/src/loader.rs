// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collecting schema documents that arrive in any order.

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::document::{RecordSet, parse_document};
use crate::error::{DefinitionError, DocumentError};
use crate::store::DefinitionStore;

/// Gathers the schema documents of one machine and builds the store once
/// all of them are in.
///
/// Documents are merged in the order their ids were declared, no matter
/// which order they arrive in. A document that failed to fetch or parse is
/// logged and skipped.
///
/// # Example
///
/// ```rust
/// use kiln_definition::DefinitionLoader;
///
/// let mut loader = DefinitionLoader::new(["base", "printer"]);
/// loader.receive("printer", Ok(r#"{ "overrides": { "speed": { "default_value": 60 } } }"#.into()));
/// assert!(!loader.is_ready());
///
/// loader.receive("base", Ok(r#"{ "settings": { "speed": { "type": "float", "default_value": 50 } } }"#.into()));
/// assert!(loader.is_ready());
///
/// let store = loader.finish().unwrap();
/// assert_eq!(store.definition("speed").unwrap().default_value().as_f64(), Some(60.0));
/// ```
#[derive(Debug)]
pub struct DefinitionLoader {
    expected: Vec<String>,
    arrived: HashMap<String, Result<String, DocumentError>>,
    patches: Vec<(String, String, serde_json::Value)>,
}

impl DefinitionLoader {
    /// Creates a loader waiting for the given document ids, in merge order.
    #[must_use]
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            expected: ids.into_iter().map(Into::into).collect(),
            arrived: HashMap::new(),
            patches: Vec::new(),
        }
    }

    /// Records the outcome of fetching document `id`.
    ///
    /// Returns `false` if `id` was not expected or already arrived; such
    /// deliveries are ignored.
    pub fn receive(&mut self, id: &str, document: Result<String, DocumentError>) -> bool {
        if !self.expected.iter().any(|e| e == id) {
            warn!(document = id, "ignoring unexpected schema document");
            return false;
        }
        if self.arrived.contains_key(id) {
            warn!(document = id, "ignoring duplicate schema document");
            return false;
        }
        debug!(document = id, ok = document.is_ok(), "schema document arrived");
        self.arrived.insert(id.to_owned(), document);
        true
    }

    /// Returns `true` once every expected document has arrived.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.pending().next().is_none()
    }

    /// Ids still outstanding, in merge order.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.expected
            .iter()
            .filter(|id| !self.arrived.contains_key(id.as_str()))
            .map(String::as_str)
    }

    /// Queues a field change applied after all documents are merged.
    ///
    /// Used to correct known defects in shipped schemas. A `null` value
    /// removes the field. Patches naming a setting no document defines are
    /// skipped with a warning.
    pub fn patch(
        &mut self,
        setting: impl Into<String>,
        field: impl Into<String>,
        value: serde_json::Value,
    ) -> &mut Self {
        self.patches.push((setting.into(), field.into(), value));
        self
    }

    /// Merges every usable document and builds the store.
    pub fn finish(mut self) -> Result<DefinitionStore, DefinitionError> {
        let pending = self.pending().count();
        if pending > 0 {
            return Err(DefinitionError::NotReady { pending });
        }

        let mut records = RecordSet::default();
        let mut loaded = 0_usize;
        for id in &self.expected {
            let Some(outcome) = self.arrived.remove(id.as_str()) else {
                continue;
            };
            match outcome.and_then(|text| parse_document(&text)) {
                Ok(patches) => {
                    for patch in patches {
                        records.merge(patch);
                    }
                    loaded += 1;
                }
                Err(error) => warn!(document = %id, %error, "skipping schema document"),
            }
        }
        if loaded == 0 {
            return Err(DefinitionError::NoDefinitions);
        }

        for (setting, field, value) in self.patches {
            if !records.set(&setting, &field, value) {
                warn!(setting = %setting, field = %field, "patch targets an undefined setting");
            }
        }
        info!(documents = loaded, records = records.len(), "schema documents merged");
        Ok(DefinitionStore::from_records(&records))
    }
}
