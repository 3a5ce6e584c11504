// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Argument list assembly.

use core::fmt;

use kiln_definition::SettingDefinition;
use kiln_formula::Value;
use kiln_settings::SettingsEngine;
use tracing::{debug, warn};

use crate::config::CommandConfig;
use crate::encode::{encode, matrix};
use crate::stats::{BuildStats, Disposition};
use crate::work_item::WorkItem;

/// Turns propagated settings and work items into engine arguments.
///
/// The token layout is fixed:
///
/// 1. the verb, `-v` when verbose, and `-j <schema>` per schema document;
/// 2. `-s key=value` for every emitted single-valued setting;
/// 3. for every channel, `-e<N>` and its per-channel `-s key=value` tokens;
/// 4. for every channel with work items, `-e<N>` and per item
///    `-l <path>`, the rotation matrix, the three position tokens and the
///    item's overrides;
/// 5. `-o <output>`.
///
/// A setting value is emitted only when it is enabled and differs from the
/// default, both as a value and in its encoding.
#[derive(Clone, Debug, Default)]
pub struct CommandBuilder {
    config: CommandConfig,
}

/// Output of [`CommandBuilder::build`].
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    args: Vec<String>,
    stats: BuildStats,
}

impl Command {
    /// The argument tokens, in order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Consumes the command, returning the tokens.
    #[must_use]
    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    /// What was emitted and skipped, per setting type.
    #[must_use]
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, "'{arg}'")?;
            } else {
                f.write_str(arg)?;
            }
        }
        Ok(())
    }
}

impl CommandBuilder {
    /// A builder with the given structural tokens.
    #[must_use]
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    /// The structural tokens.
    #[must_use]
    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Builds the argument list.
    ///
    /// Channels referenced by work items are allocated first. Single-valued
    /// settings are read through
    /// [`SettingsEngine::resolve_value`], so irreconcilable ones end up
    /// flagged `INVALID`.
    ///
    /// ```
    /// use kiln_command::{CommandBuilder, CommandConfig, WorkItem};
    /// use kiln_definition::{DefinitionStore, SettingDefinition, SettingType};
    /// use kiln_formula::Value;
    /// use kiln_settings::{EngineConfig, SettingsEngine};
    ///
    /// let definitions = DefinitionStore::from_definitions([
    ///     SettingDefinition::builder("layer_height", SettingType::Float)
    ///         .default_value(0.1)
    ///         .build(),
    /// ]);
    /// let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
    /// engine.set_multiple(0, [("layer_height", Value::Float(0.2))]);
    ///
    /// let command = CommandBuilder::new(CommandConfig::default())
    ///     .build(&mut engine, &[WorkItem::new("cube.stl", 0)]);
    /// assert_eq!(&command.args()[..3], ["slice", "-s", "layer_height=0.2"]);
    /// assert_eq!(command.args().last().map(String::as_str), Some("output.gcode"));
    /// ```
    pub fn build(&self, engine: &mut SettingsEngine, items: &[WorkItem]) -> Command {
        if let Some(last) = items.iter().map(|item| item.channel).max() {
            engine.ensure_channel(last);
        }

        let mut args = vec![self.config.verb.clone()];
        if self.config.verbose {
            args.push("-v".into());
        }
        for schema in &self.config.schemas {
            args.push("-j".into());
            args.push(schema.clone());
        }

        let (global, per_channel): (Vec<String>, Vec<String>) = engine
            .definitions()
            .iter()
            .map(|(_, definition)| definition.name().to_owned())
            .partition(|name| !engine.is_multi_value(name));

        let mut stats = BuildStats::default();
        for name in &global {
            let channel = engine.authoritative_channel(name);
            let enabled = engine.is_enabled(channel, name);
            let value = engine.resolve_value(name);
            if let Some(token) = setting_token(engine, name, enabled, &value, &mut stats) {
                args.push("-s".into());
                args.push(token);
            }
        }

        for channel in 0..engine.channel_count() {
            args.push(format!("-e{channel}"));
            for name in &per_channel {
                let enabled = engine.is_enabled(channel, name);
                let value = engine.value(channel, name).cloned().unwrap_or_default();
                if let Some(token) = setting_token(engine, name, enabled, &value, &mut stats) {
                    args.push("-s".into());
                    args.push(token);
                }
            }
        }

        for channel in 0..engine.channel_count() {
            let mut assigned = items.iter().filter(|item| item.channel == channel).peekable();
            if assigned.peek().is_none() {
                continue;
            }
            args.push(format!("-e{channel}"));
            for item in assigned {
                self.push_item(engine, item, &mut args);
            }
        }

        args.push("-o".into());
        args.push(self.config.output.clone());

        let totals = stats.totals();
        debug!(
            tokens = args.len(),
            changed = totals.changed,
            inactive = totals.inactive,
            default = totals.default,
            "command built"
        );
        Command { args, stats }
    }

    fn push_item(&self, engine: &SettingsEngine, item: &WorkItem, args: &mut Vec<String>) {
        let [x, y, z] = item.transform.position;
        args.push("-l".into());
        args.push(item.path.clone());
        args.push("-s".into());
        args.push(format!("mesh_rotation_matrix={}", matrix(&item.transform.rotation)));
        for (axis, position) in [("x", x), ("y", y), ("z", z)] {
            args.push("-s".into());
            args.push(format!("mesh_position_{axis}={position}"));
        }
        for (name, value) in &item.overrides {
            let Some(definition) = engine.definitions().definition(name) else {
                warn!(setting = %name, path = %item.path, "unknown override skipped");
                continue;
            };
            if !definition.settable_per_mesh() {
                warn!(
                    setting = %name,
                    path = %item.path,
                    "setting is not settable per object, override skipped"
                );
                continue;
            }
            let value = definition.setting_type().coerce(value.clone());
            args.push("-s".into());
            args.push(format!("{name}={}", encode(&value)));
        }
    }
}

fn setting_token(
    engine: &SettingsEngine,
    name: &str,
    enabled: bool,
    value: &Value,
    stats: &mut BuildStats,
) -> Option<String> {
    let definition = engine.definitions().definition(name)?;
    let encoded = encode(value);
    let disposition = disposition(definition, enabled, value, &encoded);
    stats.record(definition.setting_type(), disposition);
    (disposition == Disposition::Changed).then(|| format!("{name}={encoded}"))
}

fn disposition(
    definition: &SettingDefinition,
    enabled: bool,
    value: &Value,
    encoded: &str,
) -> Disposition {
    let default = definition.default_value();
    if !enabled {
        Disposition::Inactive
    } else if value == default || encoded == encode(default) {
        Disposition::Default
    } else {
        Disposition::Changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_definition::{DefinitionStore, SettingType};
    use kiln_settings::EngineConfig;
    use pretty_assertions::assert_eq;

    use crate::{Transform, TypeStats};

    fn engine() -> SettingsEngine {
        let definitions = DefinitionStore::load([r#"{ "settings": {
            "layer_height": { "type": "float", "default_value": 0.1 },
            "support_enable": { "type": "bool", "default_value": false },
            "support_angle": {
                "type": "float", "default_value": 50, "enabled": "support_enable"
            },
            "material_print_temperature": {
                "type": "float", "default_value": 200, "settable_per_extruder": true
            },
            "infill_sparse_density": {
                "type": "float", "default_value": 20, "settable_per_mesh": true
            },
            "machine_name": { "type": "str", "default_value": "printer" }
        } }"#])
        .unwrap();
        SettingsEngine::new(definitions, EngineConfig::default())
    }

    fn args(command: &Command) -> Vec<&str> {
        command.args().iter().map(String::as_str).collect()
    }

    #[test]
    fn defaults_produce_only_structure() {
        let mut engine = engine();
        let config = CommandConfig {
            verbose: true,
            schemas: vec!["base.def.json".into(), "printer.def.json".into()],
            output: "out.gcode".into(),
            ..CommandConfig::default()
        };
        let command = CommandBuilder::new(config).build(&mut engine, &[]);
        assert_eq!(
            args(&command),
            [
                "slice",
                "-v",
                "-j",
                "base.def.json",
                "-j",
                "printer.def.json",
                "-e0",
                "-o",
                "out.gcode",
            ]
        );
        assert_eq!(command.stats().totals().default, 5);
        assert_eq!(command.stats().totals().inactive, 1);
    }

    #[test]
    fn full_layout() {
        let mut engine = engine();
        engine.set_multiple(0, [("layer_height", Value::Float(0.2))]);
        engine.set_multiple(1, [("material_print_temperature", Value::Float(230.0))]);
        let items = [
            WorkItem::new("a.stl", 1)
                .with_transform(Transform::at([10.0, 20.0, 0.0]))
                .with_override("infill_sparse_density", Value::Int(40))
                .with_override("layer_height", Value::Float(0.3)),
            WorkItem::new("b.stl", 1),
        ];
        let command = CommandBuilder::default().build(&mut engine, &items);
        assert_eq!(
            args(&command),
            [
                "slice",
                "-s",
                "layer_height=0.2",
                "-e0",
                "-e1",
                "-s",
                "material_print_temperature=230",
                "-e1",
                "-l",
                "a.stl",
                "-s",
                "mesh_rotation_matrix=[[1,0,0],[0,1,0],[0,0,1]]",
                "-s",
                "mesh_position_x=10",
                "-s",
                "mesh_position_y=20",
                "-s",
                "mesh_position_z=0",
                "-s",
                "infill_sparse_density=40",
                "-l",
                "b.stl",
                "-s",
                "mesh_rotation_matrix=[[1,0,0],[0,1,0],[0,0,1]]",
                "-s",
                "mesh_position_x=0",
                "-s",
                "mesh_position_y=0",
                "-s",
                "mesh_position_z=0",
                "-o",
                "output.gcode",
            ]
        );
        assert_eq!(
            command.stats().get(SettingType::Float),
            TypeStats {
                changed: 2,
                inactive: 1,
                default: 3,
            }
        );
    }

    #[test]
    fn disabled_settings_are_omitted_until_enabled() {
        let mut engine = engine();
        engine.set_multiple(0, [("support_angle", Value::Float(60.0))]);
        let builder = CommandBuilder::default();
        let command = builder.build(&mut engine, &[]);
        assert!(!command.args().iter().any(|arg| arg.starts_with("support_angle")));

        engine.set_multiple(0, [("support_enable", Value::Bool(true))]);
        let command = builder.build(&mut engine, &[]);
        let emitted: Vec<_> = args(&command).into_iter().filter(|arg| arg.contains('=')).collect();
        assert_eq!(emitted, ["support_enable=true", "support_angle=60"]);
    }

    #[test]
    fn work_items_grow_channels() {
        let mut engine = engine();
        let command = CommandBuilder::default().build(&mut engine, &[WorkItem::new("c.stl", 2)]);
        assert_eq!(engine.channel_count(), 3);
        let sections: Vec<_> = args(&command)
            .into_iter()
            .filter(|arg| arg.starts_with("-e"))
            .collect();
        assert_eq!(sections, ["-e0", "-e1", "-e2", "-e2"]);
    }

    #[test]
    fn computed_polygons_equal_to_their_default_are_omitted() {
        let definitions = DefinitionStore::load([r#"{ "settings": {
            "width": { "type": "float", "default_value": 2 },
            "area": {
                "type": "polygon", "default_value": [[0, 1], [1, 1]],
                "value": "[[0, width / 2], [width / 2, 1]]"
            }
        } }"#])
        .unwrap();
        let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
        let builder = CommandBuilder::default();

        let command = builder.build(&mut engine, &[]);
        assert_eq!(args(&command), ["slice", "-e0", "-o", "output.gcode"]);
        assert_eq!(
            command.stats().get(SettingType::Polygon),
            TypeStats {
                changed: 0,
                inactive: 0,
                default: 1,
            }
        );

        engine.set_multiple(0, [("width", Value::Int(4))]);
        let command = builder.build(&mut engine, &[]);
        let emitted: Vec<_> = args(&command).into_iter().filter(|arg| arg.contains('=')).collect();
        assert_eq!(emitted, ["width=4", "area=[[0,2],[2,1]]"]);
    }

    #[test]
    fn display_quotes_awkward_tokens() {
        let mut engine = engine();
        engine.set_multiple(0, [("machine_name", Value::from("my printer"))]);
        let command = CommandBuilder::default().build(&mut engine, &[]);
        assert_eq!(
            command.to_string(),
            "slice -s 'machine_name=my printer' -e0 -o output.gcode"
        );
    }
}
