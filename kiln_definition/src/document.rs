// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Schema documents and raw record merging.
//!
//! A schema document is a JSON object with two optional members:
//!
//! - `settings`: a tree of named nodes. Each node's fields describe a
//!   setting; a nested `children` object holds more nodes. Nodes whose
//!   `type` is `"category"` only group their children.
//! - `overrides`: a flat map from setting name to fields.
//!
//! Later documents merge into earlier ones field by field. A JSON `null`
//! removes a field.

use hashbrown::HashMap;
use serde_json::{Map, Value as Json};

use crate::error::DocumentError;

/// Fields for one setting as written in a single document.
pub(crate) type Fields = Map<String, Json>;

/// One name plus the fields a document contributes to it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Patch {
    pub(crate) name: String,
    pub(crate) fields: Fields,
}

/// Parses a document into patches, in document order.
///
/// Nothing is applied unless the whole document is well formed.
pub(crate) fn parse_document(text: &str) -> Result<Vec<Patch>, DocumentError> {
    let root: Json = serde_json::from_str(text)?;
    let Json::Object(mut root) = root else {
        return Err(DocumentError::Shape("document root must be an object".into()));
    };

    let mut patches = Vec::new();
    if let Some(settings) = root.remove("settings") {
        let Json::Object(nodes) = settings else {
            return Err(DocumentError::Shape("`settings` must be an object".into()));
        };
        flatten(nodes, &mut patches)?;
    }
    if let Some(overrides) = root.remove("overrides") {
        let Json::Object(entries) = overrides else {
            return Err(DocumentError::Shape("`overrides` must be an object".into()));
        };
        for (name, fields) in entries {
            let Json::Object(fields) = fields else {
                return Err(DocumentError::Shape(format!("override `{name}` must be an object")));
            };
            patches.push(Patch { name, fields });
        }
    }
    Ok(patches)
}

fn flatten(nodes: Map<String, Json>, patches: &mut Vec<Patch>) -> Result<(), DocumentError> {
    for (name, node) in nodes {
        let Json::Object(mut fields) = node else {
            return Err(DocumentError::Shape(format!("setting `{name}` must be an object")));
        };
        let children = fields.remove("children");
        patches.push(Patch { name: name.clone(), fields });
        match children {
            None | Some(Json::Null) => {}
            Some(Json::Object(children)) => flatten(children, patches)?,
            Some(_) => {
                return Err(DocumentError::Shape(format!(
                    "children of `{name}` must be an object"
                )));
            }
        }
    }
    Ok(())
}

/// Merged raw records, kept in first-appearance order.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordSet {
    records: Vec<(String, Fields)>,
    by_name: HashMap<String, usize>,
}

impl RecordSet {
    /// Merges `patch` into the record of the same name, creating it if absent.
    pub(crate) fn merge(&mut self, patch: Patch) {
        let index = match self.by_name.get(&patch.name) {
            Some(&index) => index,
            None => {
                let index = self.records.len();
                self.by_name.insert(patch.name.clone(), index);
                self.records.push((patch.name, Fields::new()));
                index
            }
        };
        let record = &mut self.records[index].1;
        for (field, value) in patch.fields {
            set_field(record, field, value);
        }
    }

    /// Sets one field on an existing record. Returns `false` if no record
    /// has that name.
    pub(crate) fn set(&mut self, name: &str, field: &str, value: Json) -> bool {
        let Some(&index) = self.by_name.get(name) else {
            return false;
        };
        set_field(&mut self.records[index].1, field.to_owned(), value);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Fields)> {
        self.records.iter().map(|(name, fields)| (name.as_str(), fields))
    }
}

fn set_field(record: &mut Fields, field: String, value: Json) {
    if value.is_null() {
        record.remove(&field);
    } else {
        record.insert(field, value);
    }
}

/// Returns `true` for records that only group other settings.
pub(crate) fn is_category(fields: &Fields) -> bool {
    fields.get("type").and_then(Json::as_str) == Some("category")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn names(patches: &[Patch]) -> Vec<&str> {
        patches.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn nested_settings_flatten_depth_first() {
        let patches = parse_document(
            r#"{
                "settings": {
                    "resolution": {
                        "type": "category",
                        "children": {
                            "layer_height": { "type": "float", "default_value": 0.1 }
                        }
                    }
                },
                "overrides": { "layer_height": { "default_value": 0.2 } }
            }"#,
        )
        .unwrap();
        assert_eq!(names(&patches), ["resolution", "layer_height", "layer_height"]);
        assert!(!patches[0].fields.contains_key("children"));
    }

    #[test]
    fn malformed_documents_are_rejected_whole() {
        assert!(matches!(parse_document("{"), Err(DocumentError::Json(_))));
        assert!(matches!(parse_document("[]"), Err(DocumentError::Shape(_))));
        assert!(matches!(
            parse_document(r#"{ "settings": { "a": 3 } }"#),
            Err(DocumentError::Shape(_))
        ));
        assert!(matches!(
            parse_document(r#"{ "overrides": { "a": { "type": "int" } }, "settings": [] }"#),
            Err(DocumentError::Shape(_))
        ));
    }

    #[test]
    fn merge_overwrites_and_null_deletes() {
        let mut records = RecordSet::default();
        for doc in [
            json!({ "settings": { "a": { "type": "int", "value": "b" }, "b": { "type": "int" } } }),
            json!({ "overrides": { "a": { "value": null, "default_value": 4 } } }),
        ] {
            for patch in parse_document(&doc.to_string()).unwrap() {
                records.merge(patch);
            }
        }
        let merged: Vec<_> = records.iter().collect();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0, "a");
        assert_eq!(merged[0].1.get("value"), None);
        assert_eq!(merged[0].1.get("default_value"), Some(&json!(4)));
        assert_eq!(merged[0].1.get("type"), Some(&json!("int")));
    }

    #[test]
    fn set_only_touches_existing_records() {
        let mut records = RecordSet::default();
        records.merge(Patch {
            name: "a".into(),
            fields: Fields::new(),
        });
        assert!(records.set("a", "enabled", json!(false)));
        assert!(!records.set("missing", "enabled", json!(false)));
        assert_eq!(records.len(), 1);
    }
}
