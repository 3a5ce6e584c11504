// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Propagation basics.
//!
//! Loads the demo schema, listens for changes, and shows how explicit
//! values, derived values and enabled states interact.
//!
//! Run:
//! - `cargo run -p kiln_demos --example propagation_basics`
//! - `RUST_LOG=kiln_settings=trace cargo run -p kiln_demos --example propagation_basics`

use kiln_definition::DefinitionStore;
use kiln_demos::{BASE_SCHEMA, PRINTER_SCHEMA, init_tracing};
use kiln_formula::Value;
use kiln_settings::{EngineConfig, SettingChange, SettingsEngine};
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let definitions = DefinitionStore::load([BASE_SCHEMA, PRINTER_SCHEMA])?;
    info!(settings = definitions.len(), "definitions loaded");
    println!(
        "infill_line_distance reads {:?}",
        definitions.dependencies("infill_line_distance")
    );

    let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
    engine.on_change(|change: &SettingChange| {
        let state = &change.channels[0];
        println!(
            "  changed: {} = {} (enabled: {})",
            change.name,
            change.resolved,
            state.is_enabled()
        );
    });

    info!("set infill_sparse_density = 40");
    engine.set_multiple(0, [("infill_sparse_density", Value::Int(40))]);

    info!("set infill_sparse_density = 0");
    engine.set_multiple(0, [("infill_sparse_density", Value::Int(0))]);

    info!("pin infill_line_distance, then change the density again");
    engine.set_multiple(0, [("infill_line_distance", Value::Float(5.0))]);
    engine.set_multiple(0, [("infill_sparse_density", Value::Int(15))]);

    info!("unset infill_line_distance");
    engine.unset(0, ["infill_line_distance"]);

    for problem in engine.problems() {
        warn!(
            setting = %problem.setting,
            channel = problem.channel,
            validation = %problem.validation,
            "setting out of range"
        );
    }
    Ok(())
}
