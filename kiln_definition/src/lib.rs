// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kiln Definition: what settings exist and how they relate.
//!
//! A printer's settings are described by a chain of JSON schema documents:
//! a shared base document followed by machine specific ones that override
//! parts of it. This crate merges those documents into typed
//! [`SettingDefinition`]s and builds the [`DependencyIndex`] the settings
//! engine uses to decide what to recompute.
//!
//! - [`DefinitionLoader`] collects documents that arrive in any order and
//!   merges them in declared order once all are in.
//! - [`DefinitionStore`] holds the merged definitions, addressed by name or
//!   by dense [`SettingId`].
//! - [`DependencyIndex`] records which settings each formula reads, rejects
//!   edges that would close a cycle, and yields recomputation orders.
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln_definition::DefinitionStore;
//!
//! let store = DefinitionStore::load([
//!     r#"{ "settings": {
//!         "infill_sparse_density": { "type": "float", "default_value": 20 },
//!         "infill_line_width": { "type": "float", "default_value": 0.4 },
//!         "infill_line_distance": {
//!             "type": "float",
//!             "value": "0 if infill_sparse_density == 0 else infill_line_width * 100 / infill_sparse_density"
//!         }
//!     } }"#,
//! ])
//! .unwrap();
//!
//! let order: Vec<_> = store
//!     .index()
//!     .affected_order(store.id("infill_line_width"))
//!     .into_iter()
//!     .map(|id| store[id].name())
//!     .collect();
//! assert_eq!(order, ["infill_line_width", "infill_line_distance"]);
//! ```

mod definition;
mod document;
mod error;
mod index;
mod loader;
mod setting_type;
mod store;

pub use definition::{SettingDefinition, SettingDefinitionBuilder};
pub use error::{DefinitionError, DocumentError};
pub use index::DependencyIndex;
pub use loader::DefinitionLoader;
pub use setting_type::SettingType;
pub use store::DefinitionStore;

/// Dense id of a setting within one [`DefinitionStore`].
pub type SettingId = kiln_graph::InternId;
