// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Building the engine command line.
//!
//! Schema documents arrive out of order, as they would from independent
//! fetches. Once both are in, the engine is seeded, a few values are set
//! and the argument list for two placed objects is printed.
//!
//! Run:
//! - `cargo run -p kiln_demos --example command_line`

use kiln_command::{CommandBuilder, CommandConfig, Transform, WorkItem};
use kiln_definition::{DefinitionLoader, SettingType};
use kiln_demos::{BASE_SCHEMA, PRINTER_SCHEMA, init_tracing};
use kiln_formula::Value;
use kiln_settings::{EngineConfig, SettingsEngine};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut loader = DefinitionLoader::new(["base", "printer"]);
    loader.receive("printer", Ok(PRINTER_SCHEMA.to_owned()));
    info!(pending = ?loader.pending().collect::<Vec<_>>(), "waiting for schemas");
    loader.receive("base", Ok(BASE_SCHEMA.to_owned()));
    let definitions = loader.finish()?;

    let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
    engine.set_multiple(0, [("infill_sparse_density", Value::Int(35))]);
    engine.set_multiple(1, [("material_print_temperature", Value::Float(215.0))]);

    let config = CommandConfig {
        verbose: true,
        schemas: vec!["base.def.json".into(), "printer.def.json".into()],
        output: "plate.gcode".into(),
        ..CommandConfig::default()
    };
    let items = [
        WorkItem::new("bracket.stl", 0).with_transform(Transform::at([-20.0, 0.0, 5.0])),
        WorkItem::new("hinge.stl", 1)
            .with_transform(
                Transform::at([25.0, 10.0, 2.5])
                    .with_rotation([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]),
            )
            .with_override("infill_sparse_density", Value::Int(80)),
    ];
    let command = CommandBuilder::new(config).build(&mut engine, &items);
    info!(tokens = command.args().len(), "command built");
    println!("{command}");

    for (setting_type, stats) in command.stats().iter() {
        if setting_type == SettingType::Float || stats.changed > 0 {
            println!(
                "{setting_type}: {} emitted, {} disabled, {} at default",
                stats.changed, stats.inactive, stats.default
            );
        }
    }
    Ok(())
}
