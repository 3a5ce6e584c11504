// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kiln Command: the argument list handed to the slicing engine.
//!
//! The engine is configured entirely through its command line. Settings
//! that hold one value for the whole print go first, each channel then
//! gets its own block of per-extruder values, and finally every object to
//! print is listed under the channel that prints it, with its placement and
//! per-object overrides.
//!
//! Only values that matter are emitted: disabled settings and settings that
//! equal their default are skipped and counted in [`BuildStats`].
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln_command::{CommandBuilder, CommandConfig, Transform, WorkItem};
//! use kiln_definition::DefinitionStore;
//! use kiln_formula::Value;
//! use kiln_settings::{EngineConfig, SettingsEngine};
//!
//! let definitions = DefinitionStore::load([r#"{ "settings": {
//!     "adhesion_type": { "type": "enum", "default_value": "skirt",
//!         "options": { "skirt": "Skirt", "brim": "Brim" } },
//!     "material_print_temperature": {
//!         "type": "float", "default_value": 200, "settable_per_extruder": true
//!     }
//! } }"#])
//! .unwrap();
//! let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
//! engine.set_multiple(0, [("adhesion_type", Value::from("brim"))]);
//!
//! let config = CommandConfig {
//!     schemas: vec!["printer.def.json".into()],
//!     output: "benchy.gcode".into(),
//!     ..CommandConfig::default()
//! };
//! let item = WorkItem::new("benchy.stl", 0).with_transform(Transform::at([0.0, 0.0, 12.5]));
//! let command = CommandBuilder::new(config).build(&mut engine, &[item]);
//! assert_eq!(
//!     command.to_string(),
//!     "slice -j printer.def.json -s adhesion_type=brim -e0 -e0 -l benchy.stl \
//!      -s mesh_rotation_matrix=[[1,0,0],[0,1,0],[0,0,1]] \
//!      -s mesh_position_x=0 -s mesh_position_y=0 -s mesh_position_z=12.5 \
//!      -o benchy.gcode"
//! );
//! ```

mod builder;
mod config;
mod encode;
mod stats;
mod work_item;

pub use builder::{Command, CommandBuilder};
pub use config::{CommandConfig, CommandConfigError};
pub use encode::encode;
pub use stats::{BuildStats, Disposition, TypeStats};
pub use work_item::{Transform, WorkItem};
