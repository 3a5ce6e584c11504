// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kiln Settings: multi-channel setting values and change propagation.
//!
//! A printer with several extruders keeps one *channel* of values per
//! extruder. Most settings hold the same value on every channel; settings
//! declared settable per extruder may differ, and when a single value is
//! needed the definition's `resolve` formula (or its `limit_to_extruder`
//! owner) reconciles them.
//!
//! [`SettingsEngine`] is the only writer. Each mutating call applies its
//! values, recomputes every dependent formula in dependency order, refreshes
//! enabled and validity flags, then reports one [`SettingChange`] per
//! affected setting to the registered [`ChangeSink`].
//!
//! Supporting pieces:
//!
//! - [`ValueStore`]: the per-channel value and [`SettingFlags`] table.
//! - [`Profile`]: saved explicit values, split into global and per-channel
//!   sections.
//! - [`Validation`]: bound checks against the `minimum_value` and
//!   `maximum_value` formulas.
//! - [`EngineConfig`]: channel count, cycle policy and resolution depth.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use kiln_definition::DefinitionStore;
//! use kiln_formula::Value;
//! use kiln_settings::{EngineConfig, SettingChange, SettingsEngine};
//!
//! let definitions = DefinitionStore::load([r#"{ "settings": {
//!     "layer_height": { "type": "float", "default_value": 0.1 },
//!     "layer_height_0": { "type": "float", "value": "layer_height * 2" },
//!     "material_print_temperature": {
//!         "type": "float", "default_value": 200, "settable_per_extruder": true
//!     },
//!     "build_volume_temperature": {
//!         "type": "float", "resolve": "max(extruderValues('material_print_temperature'))"
//!     }
//! } }"#])
//! .unwrap();
//!
//! let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! engine.on_change(move |change: &SettingChange| sink.borrow_mut().push(change.name.clone()));
//!
//! engine.set_multiple(0, [("layer_height", Value::Float(0.2))]);
//! assert_eq!(*seen.borrow(), ["layer_height", "layer_height_0"]);
//! assert_eq!(engine.value(0, "layer_height_0"), Some(&Value::Float(0.4)));
//!
//! engine.set_multiple(1, [("material_print_temperature", Value::Float(240.0))]);
//! assert_eq!(engine.channel_count(), 2);
//! assert_eq!(engine.resolved("build_volume_temperature"), Value::Float(240.0));
//! ```

mod change;
mod config;
mod engine;
mod flags;
mod profile;
mod store;
mod validation;
mod view;

pub use change::{ChangeSink, ChannelState, SettingChange};
pub use config::{ConfigError, CyclePolicy, EngineConfig};
pub use engine::SettingsEngine;
pub use flags::SettingFlags;
pub use profile::{Profile, ProfileError};
pub use store::ValueStore;
pub use validation::{Problem, Validation};
