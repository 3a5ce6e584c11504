// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-only queries over definitions and values: formula scopes, channel
//! ownership and cross-channel resolution.

use kiln_definition::{DefinitionStore, SettingId};
use kiln_formula::{Formula, Scope, Value};
use tracing::{debug, warn};

use crate::store::ValueStore;

/// Borrowed engine state that formulas are evaluated against.
#[derive(Clone, Copy)]
pub(crate) struct View<'a> {
    pub(crate) definitions: &'a DefinitionStore,
    pub(crate) values: &'a ValueStore,
    pub(crate) max_depth: usize,
}

/// How a resolved value was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Source {
    /// Every channel holds the same value.
    Agreed,
    /// The `resolve` formula combined the channels.
    Resolver,
    /// The owning channel selected by `limit_to_extruder`.
    Limited,
    /// Channels disagree with nothing to reconcile them; channel 0 wins.
    Fallback,
}

#[derive(Clone, Debug)]
pub(crate) struct Resolution {
    pub(crate) value: Value,
    pub(crate) source: Source,
}

/// Result of evaluating one formula slot, with failures already logged and
/// replaced by `0`.
pub(crate) struct Outcome {
    pub(crate) value: Value,
    pub(crate) failed: bool,
}

pub(crate) fn evaluate_logged(
    setting: &str,
    slot: &'static str,
    formula: &Formula,
    scope: &dyn Scope,
) -> Outcome {
    match formula.evaluate(scope) {
        Ok(value) => Outcome {
            value,
            failed: false,
        },
        Err(error) => {
            warn!(
                setting,
                slot,
                formula = formula.source().unwrap_or_default(),
                %error,
                "formula failed, using 0"
            );
            Outcome {
                value: Value::Int(0),
                failed: true,
            }
        }
    }
}

/// Reads a channel number out of a formula result: ints, integral floats
/// and numeric text. Anything else reads as channel 0.
pub(crate) fn channel_number(value: &Value) -> i64 {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .unwrap_or(0)
}

impl<'a> View<'a> {
    pub(crate) fn scope(self, channel: usize) -> ChannelScope<'a> {
        self.scope_at(channel, 0)
    }

    fn scope_at(self, channel: usize, depth: usize) -> ChannelScope<'a> {
        ChannelScope {
            view: self,
            channel,
            depth,
        }
    }

    fn value_on(&self, channel: usize, id: SettingId) -> Value {
        self.values.value(channel, id).cloned().unwrap_or_default()
    }

    /// The channel `limit_to_extruder` selects, evaluated on channel 0.
    /// `None` without the formula; negative for "every channel".
    pub(crate) fn limit_channel(self, id: SettingId, depth: usize) -> Option<i64> {
        let definition = self.definitions.get(id)?;
        let formula = definition.limit_to_extruder()?;
        let scope = self.scope_at(0, depth);
        let outcome = evaluate_logged(definition.name(), "limit_to_extruder", formula, &scope);
        Some(channel_number(&outcome.value))
    }

    /// Returns `true` if each channel legitimately holds its own value.
    pub(crate) fn is_multi_value(self, id: SettingId) -> bool {
        let Some(definition) = self.definitions.get(id) else {
            return false;
        };
        (definition.settable_per_extruder() || definition.settable_per_mesh())
            && self.limit_channel(id, 0).is_none_or(|channel| channel < 0)
    }

    /// The channel whose value counts for a single-valued setting.
    pub(crate) fn authoritative_channel(self, id: SettingId) -> usize {
        self.owning_channel(id, 0).unwrap_or(0)
    }

    fn owning_channel(self, id: SettingId, depth: usize) -> Option<usize> {
        let channel = self.limit_channel(id, depth)?;
        let index = usize::try_from(channel).ok()?;
        if index < self.values.channel_count() {
            Some(index)
        } else {
            debug!(
                setting = self.definitions[id].name(),
                channel,
                "owning channel not allocated, using 0"
            );
            Some(0)
        }
    }

    /// One value for `id` across all channels.
    pub(crate) fn resolve(self, id: SettingId, depth: usize) -> Resolution {
        let first = self.value_on(0, id);
        if depth > self.max_depth {
            warn!(
                setting = self.definitions[id].name(),
                depth, "resolution nested too deeply, using channel 0"
            );
            return Resolution {
                value: first,
                source: Source::Fallback,
            };
        }
        if self.values.equal_on_all_channels(id) {
            return Resolution {
                value: first,
                source: Source::Agreed,
            };
        }
        let definition = &self.definitions[id];
        if let Some(resolver) = definition.resolve() {
            let scope = self.scope_at(0, depth);
            let outcome = evaluate_logged(definition.name(), "resolve", resolver, &scope);
            return Resolution {
                value: definition.setting_type().coerce(outcome.value),
                source: Source::Resolver,
            };
        }
        if let Some(channel) = self.owning_channel(id, depth) {
            return Resolution {
                value: self.value_on(channel, id),
                source: Source::Limited,
            };
        }
        Resolution {
            value: first,
            source: Source::Fallback,
        }
    }
}

/// A formula [`Scope`] seen from one channel.
pub(crate) struct ChannelScope<'a> {
    view: View<'a>,
    channel: usize,
    depth: usize,
}

impl ChannelScope<'_> {
    fn id(&self, name: &str) -> Option<SettingId> {
        self.view.definitions.id(name)
    }
}

impl Scope for ChannelScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        let id = self.id(name)?;
        self.view.values.value(self.channel, id).cloned()
    }

    fn channel_value(&self, channel: i64, name: &str) -> Option<Value> {
        let id = self.id(name)?;
        let count = self.view.values.channel_count();
        let channel = if channel < 0 {
            self.channel
        } else {
            match usize::try_from(channel) {
                Ok(index) if index < count => index,
                _ => {
                    debug!(setting = name, channel, "channel not allocated, reading channel 0");
                    0
                }
            }
        };
        self.view.values.value(channel, id).cloned()
    }

    fn channel_values(&self, name: &str) -> Option<Vec<Value>> {
        let id = self.id(name)?;
        Some(self.view.values.channel_values(id).cloned().collect())
    }

    fn resolved_value(&self, name: &str) -> Option<Value> {
        let id = self.id(name)?;
        Some(self.view.resolve(id, self.depth + 1).value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_definition::{SettingDefinition, SettingType};

    fn fixture() -> (DefinitionStore, ValueStore) {
        let definitions = DefinitionStore::from_definitions([
            SettingDefinition::builder("temperature", SettingType::Float)
                .per_extruder(true)
                .build(),
            SettingDefinition::builder("bed_temperature", SettingType::Float)
                .resolve("max(extruderValues('temperature'))")
                .build(),
            SettingDefinition::builder("support_extruder_nr", SettingType::Extruder).build(),
            SettingDefinition::builder("support_width", SettingType::Float)
                .per_extruder(true)
                .limit_to_extruder("support_extruder_nr")
                .build(),
            SettingDefinition::builder("loop", SettingType::Float)
                .resolve("resolveOrValue('loop') + 1")
                .build(),
        ]);
        let mut values = ValueStore::new(definitions.len());
        values.clone_channel(0);
        (definitions, values)
    }

    fn id(definitions: &DefinitionStore, name: &str) -> SettingId {
        definitions.id(name).unwrap()
    }

    #[test]
    fn scope_reads_channels() {
        let (definitions, mut values) = fixture();
        let temperature = id(&definitions, "temperature");
        values.set(0, temperature, Value::Float(200.0));
        values.set(1, temperature, Value::Float(210.0));
        let view = View {
            definitions: &definitions,
            values: &values,
            max_depth: 8,
        };
        let scope = view.scope(1);
        assert_eq!(scope.lookup("temperature"), Some(Value::Float(210.0)));
        assert_eq!(scope.channel_value(-1, "temperature"), Some(Value::Float(210.0)));
        assert_eq!(scope.channel_value(0, "temperature"), Some(Value::Float(200.0)));
        // Unallocated channels read channel 0.
        assert_eq!(scope.channel_value(5, "temperature"), Some(Value::Float(200.0)));
        assert_eq!(
            scope.channel_values("temperature"),
            Some(vec![Value::Float(200.0), Value::Float(210.0)])
        );
        assert_eq!(scope.lookup("missing"), None);
    }

    #[test]
    fn resolution_sources() {
        let (definitions, mut values) = fixture();
        let temperature = id(&definitions, "temperature");
        let bed = id(&definitions, "bed_temperature");
        values.set(0, temperature, Value::Float(200.0));
        values.set(1, temperature, Value::Float(210.0));
        values.set(0, bed, Value::Float(50.0));
        values.set(1, bed, Value::Float(60.0));
        let view = View {
            definitions: &definitions,
            values: &values,
            max_depth: 8,
        };

        let fallback = view.resolve(temperature, 0);
        assert_eq!(fallback.source, Source::Fallback);
        assert_eq!(fallback.value, Value::Float(200.0));

        let resolved = view.resolve(bed, 0);
        assert_eq!(resolved.source, Source::Resolver);
        assert_eq!(resolved.value, Value::Float(210.0));

        let agreed = view.resolve(id(&definitions, "support_extruder_nr"), 0);
        assert_eq!(agreed.source, Source::Agreed);
    }

    #[test]
    fn limit_to_extruder_picks_the_owner() {
        let (definitions, mut values) = fixture();
        let owner = id(&definitions, "support_extruder_nr");
        let width = id(&definitions, "support_width");
        for channel in 0..2 {
            values.set(channel, owner, Value::from("1"));
        }
        values.set(0, width, Value::Float(0.4));
        values.set(1, width, Value::Float(0.6));
        let view = View {
            definitions: &definitions,
            values: &values,
            max_depth: 8,
        };
        assert!(!view.is_multi_value(width));
        assert!(view.is_multi_value(id(&definitions, "temperature")));
        assert_eq!(view.authoritative_channel(width), 1);
        let resolution = view.resolve(width, 0);
        assert_eq!(resolution.source, Source::Limited);
        assert_eq!(resolution.value, Value::Float(0.6));
    }

    #[test]
    fn nested_resolution_stops() {
        let (definitions, mut values) = fixture();
        let looped = id(&definitions, "loop");
        values.set(0, looped, Value::Float(1.0));
        values.set(1, looped, Value::Float(2.0));
        let view = View {
            definitions: &definitions,
            values: &values,
            max_depth: 3,
        };
        // Depths 0..=3 each add one on top of channel 0's value.
        assert_eq!(view.resolve(looped, 0).value, Value::Float(5.0));
    }

    #[test]
    fn channel_numbers() {
        assert_eq!(channel_number(&Value::from("-1")), -1);
        assert_eq!(channel_number(&Value::Int(2)), 2);
        assert_eq!(channel_number(&Value::Float(1.0)), 1);
        assert_eq!(channel_number(&Value::from("left")), 0);
    }
}
