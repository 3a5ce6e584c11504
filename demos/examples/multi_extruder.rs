// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two extruders.
//!
//! Applies a profile with a per-extruder section, then shows how values
//! that differ per channel are resolved into one.
//!
//! Run:
//! - `cargo run -p kiln_demos --example multi_extruder`

use kiln_definition::DefinitionStore;
use kiln_demos::{BASE_SCHEMA, init_tracing};
use kiln_formula::Value;
use kiln_settings::{EngineConfig, Profile, SettingsEngine};
use tracing::info;

const PROFILE: &str = r#"{
  "layer_height": "0.2",
  "support_enable": "True",
  "channel_1": { "material_print_temperature": 240, "machine_nozzle_size": 0.8 }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let definitions = DefinitionStore::load([BASE_SCHEMA])?;
    let mut engine = SettingsEngine::new(definitions, EngineConfig::from_json("{}")?);
    let profile = Profile::from_json(PROFILE)?;
    let notified = profile.apply(&mut engine);
    info!(notified, channels = engine.channel_count(), "profile applied");

    for name in ["material_print_temperature", "line_width", "layer_height_0"] {
        let per_channel: Vec<String> = (0..engine.channel_count())
            .map(|channel| engine.value(channel, name).map(ToString::to_string).unwrap_or_default())
            .collect();
        println!("{name}: {per_channel:?} multi-value: {}", engine.is_multi_value(name));
    }

    println!(
        "build_volume_temperature resolves to {}",
        engine.resolved("build_volume_temperature")
    );

    info!("move support to extruder 1");
    engine.set_multiple(0, [("support_extruder_nr", Value::from("1"))]);
    engine.set_multiple(1, [("support_angle", Value::Float(65.0))]);
    println!(
        "support_angle owned by channel {}, resolves to {}",
        engine.authoritative_channel("support_angle"),
        engine.resolved("support_angle")
    );
    Ok(())
}
