// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The settings engine: the only writer of setting values.
//!
//! Every mutating operation runs three phases before returning:
//!
//! 1. **Apply**: write the requested values (or defaults) on the targeted
//!    channels, marking explicit values `CHANGED`.
//! 2. **Propagate**: walk the settings affected by what actually changed,
//!    dependencies first, recomputing values (unless `CHANGED`) and enabled
//!    states on every channel, then refresh validity.
//! 3. **Notify**: deliver one [`SettingChange`] per setting whose value,
//!    enabled state or validity changed.
//!
//! Propagation follows the topological order from the dependency index, so
//! each setting is recomputed at most once per operation and only if one of
//! its dependencies changed.

use core::fmt;

use hashbrown::HashSet;
use kiln_definition::{DefinitionStore, SettingId};
use kiln_formula::Value;
use tracing::{debug, trace, warn};

use crate::change::{ChangeSink, ChannelState, SettingChange};
use crate::config::{CyclePolicy, EngineConfig};
use crate::flags::SettingFlags;
use crate::store::ValueStore;
use crate::view::{Source, View, evaluate_logged};

/// Owns definitions, values, configuration and the change listener.
///
/// # Example
///
/// ```rust
/// use kiln_definition::{DefinitionStore, SettingDefinition, SettingType};
/// use kiln_formula::Value;
/// use kiln_settings::{EngineConfig, SettingsEngine};
///
/// let definitions = DefinitionStore::from_definitions([
///     SettingDefinition::builder("base", SettingType::Int).default_value(10).build(),
///     SettingDefinition::builder("double", SettingType::Int).value("base * 2").build(),
///     SettingDefinition::builder("gate", SettingType::Bool).enabled("base > 5").build(),
/// ]);
/// let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
/// assert_eq!(engine.value(0, "double"), Some(&Value::Int(20)));
///
/// let notified = engine.set_multiple(0, [("base", Value::Int(3))]);
/// assert_eq!(notified, 3);
/// assert_eq!(engine.value(0, "double"), Some(&Value::Int(6)));
/// assert!(!engine.is_enabled(0, "gate"));
/// ```
pub struct SettingsEngine {
    definitions: DefinitionStore,
    values: ValueStore,
    config: EngineConfig,
    sink: Option<Box<dyn ChangeSink>>,
    /// Per-channel settings whose channels were last read through the
    /// channel 0 fallback.
    unresolved: HashSet<SettingId>,
}

impl SettingsEngine {
    /// Builds an engine with `config.initial_channels` channels holding
    /// computed defaults.
    #[must_use]
    pub fn new(definitions: DefinitionStore, config: EngineConfig) -> Self {
        if config.cycle_policy == CyclePolicy::Error {
            for &id in definitions.index().cyclic() {
                warn!(setting = definitions[id].name(), "setting is part of a dependency cycle");
            }
        }
        let channels = config.initial_channels;
        let mut engine = Self {
            values: ValueStore::new(definitions.len()),
            definitions,
            config,
            sink: None,
            unresolved: HashSet::new(),
        };
        engine.reset(channels);
        engine
    }

    /// Installs the change listener, replacing any previous one.
    pub fn on_change(&mut self, sink: impl ChangeSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// The definitions.
    #[must_use]
    #[inline]
    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    /// The raw value table.
    #[must_use]
    #[inline]
    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    /// The configuration.
    #[must_use]
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of allocated channels.
    #[must_use]
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.values.channel_count()
    }

    /// The value of `name` on `channel`.
    #[must_use]
    pub fn value(&self, channel: usize, name: &str) -> Option<&Value> {
        self.values.value(channel, self.definitions.id(name)?)
    }

    /// The flags of `name` on `channel`.
    #[must_use]
    pub fn flags(&self, channel: usize, name: &str) -> Option<SettingFlags> {
        let id = self.definitions.id(name)?;
        (channel < self.values.channel_count()).then(|| self.values.flags(channel, id))
    }

    /// Returns `true` if `name` is active on `channel`.
    #[must_use]
    pub fn is_enabled(&self, channel: usize, name: &str) -> bool {
        self.flags(channel, name)
            .is_some_and(|flags| flags.contains(SettingFlags::ENABLED))
    }

    pub(crate) fn view(&self) -> View<'_> {
        View {
            definitions: &self.definitions,
            values: &self.values,
            max_depth: self.config.max_resolve_depth,
        }
    }

    fn setting_id(&self, name: &str) -> Option<SettingId> {
        let id = self.definitions.id(name);
        if id.is_none() {
            warn!(setting = name, "unknown setting");
        }
        id
    }

    /// Returns `true` if each channel holds its own value for `name`:
    /// the setting is settable per channel or per work item, and it has no
    /// `limit_to_extruder` or that formula selects no specific channel.
    #[must_use]
    pub fn is_multi_value(&self, name: &str) -> bool {
        self.definitions
            .id(name)
            .is_some_and(|id| self.view().is_multi_value(id))
    }

    /// The channel whose value counts for a single-valued setting: the one
    /// `limit_to_extruder` selects, otherwise channel 0.
    #[must_use]
    pub fn authoritative_channel(&self, name: &str) -> usize {
        self.definitions
            .id(name)
            .map_or(0, |id| self.view().authoritative_channel(id))
    }

    /// The single value of `name` across channels, without touching flags.
    ///
    /// Agreeing channels give their common value; otherwise the `resolve`
    /// formula decides, then the owning channel, then channel 0 with a
    /// warning. Unknown settings read as `0`.
    #[must_use]
    pub fn resolved(&self, name: &str) -> Value {
        let Some(id) = self.setting_id(name) else {
            return Value::Int(0);
        };
        let resolution = self.view().resolve(id, 0);
        if resolution.source == Source::Fallback {
            warn!(setting = name, "channels disagree and no resolve formula, using channel 0");
        }
        resolution.value
    }

    /// Like [`resolved`](Self::resolved), and additionally marks the
    /// channels that disagree with channel 0 `INVALID` when nothing
    /// reconciles them.
    ///
    /// The mark lasts until the channels agree again or something
    /// reconciles them. Newly marked settings are delivered to the change
    /// listener before returning.
    pub fn resolve_value(&mut self, name: &str) -> Value {
        let Some(id) = self.setting_id(name) else {
            return Value::Int(0);
        };
        let resolution = self.view().resolve(id, 0);
        if resolution.source == Source::Fallback {
            warn!(setting = name, "channels disagree and no resolve formula, using channel 0");
            self.unresolved.insert(id);
            for channel in 0..self.values.channel_count() {
                if self.values.value(channel, id) != Some(&resolution.value)
                    && self.values.set_flag(channel, id, SettingFlags::INVALID)
                {
                    self.values.set_flag(channel, id, SettingFlags::MUST_NOTIFY);
                }
            }
            self.notify();
        }
        resolution.value
    }

    /// Resets every channel to defaults and recomputes everything.
    ///
    /// Running it twice in a row leaves the same state as running it once.
    pub fn load_defaults(&mut self) -> usize {
        for channel in 0..self.values.channel_count() {
            self.reset_channel(channel, false);
        }
        let all: Vec<_> = self.definitions.ids().collect();
        self.propagate(&all);
        self.notify()
    }

    /// Discards all values and rebuilds `channel_count` channels (at least
    /// one) from defaults.
    pub fn reset(&mut self, channel_count: usize) -> usize {
        self.values = ValueStore::new(self.definitions.len());
        self.unresolved.clear();
        for _ in 1..channel_count.max(1) {
            self.values.clone_channel(0);
        }
        debug!(channels = self.values.channel_count(), "value store rebuilt");
        self.load_defaults()
    }

    /// Allocates channels up to and including `channel`.
    ///
    /// New channels start as copies of channel 0 whose per-channel settings
    /// are then reset to defaults; single-valued settings keep channel 0's
    /// value.
    pub fn ensure_channel(&mut self, channel: usize) -> usize {
        self.grow(channel);
        self.notify()
    }

    /// Sets explicit values on `channel`, growing the channel list if needed.
    ///
    /// Values are coerced to the declared type first; unknown names and
    /// values that do not fit are logged and skipped. Single-valued
    /// settings are written on every channel.
    pub fn set_multiple<I, S>(&mut self, channel: usize, changes: I) -> usize
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        self.grow(channel);
        let mut roots = Vec::new();
        for (name, value) in changes {
            let Some((id, value)) = self.typed(name.as_ref(), value) else {
                continue;
            };
            let channels = self.target_channels(id, Some(channel));
            if self.apply(id, channels, &value) {
                roots.push(id);
            }
        }
        self.propagate(&roots);
        self.notify()
    }

    /// Sets explicit values on every channel.
    pub fn set_across<I, S>(&mut self, changes: I) -> usize
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let mut roots = Vec::new();
        for (name, value) in changes {
            let Some((id, value)) = self.typed(name.as_ref(), value) else {
                continue;
            };
            let channels = self.target_channels(id, None);
            if self.apply(id, channels, &value) {
                roots.push(id);
            }
        }
        self.propagate(&roots);
        self.notify()
    }

    /// Drops explicit values on `channel` so the settings follow their
    /// formulas (or defaults) again.
    pub fn unset<I, S>(&mut self, channel: usize, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.grow(channel);
        let mut roots = Vec::new();
        for name in names {
            let Some(id) = self.setting_id(name.as_ref()) else {
                continue;
            };
            let channels = self.target_channels(id, Some(channel));
            self.restore(id, channels);
            roots.push(id);
        }
        self.propagate(&roots);
        self.notify()
    }

    /// Drops explicit values on every channel.
    pub fn unset_across<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roots = Vec::new();
        for name in names {
            let Some(id) = self.setting_id(name.as_ref()) else {
                continue;
            };
            let channels = self.target_channels(id, None);
            self.restore(id, channels);
            roots.push(id);
        }
        self.propagate(&roots);
        self.notify()
    }

    fn typed(&self, name: &str, value: Value) -> Option<(SettingId, Value)> {
        let id = self.setting_id(name)?;
        let setting_type = self.definitions[id].setting_type();
        let value = setting_type.coerce(value);
        if !setting_type.accepts(&value) {
            warn!(
                setting = name,
                %value,
                expected = %setting_type,
                "value does not fit the setting type"
            );
            return None;
        }
        Some((id, value))
    }

    /// `Some(channel)` targets that channel for per-channel settings;
    /// single-valued settings and `None` target every channel.
    fn target_channels(&self, id: SettingId, channel: Option<usize>) -> core::ops::Range<usize> {
        match channel {
            Some(channel) if self.view().is_multi_value(id) => channel..channel + 1,
            _ => 0..self.values.channel_count(),
        }
    }

    fn apply(&mut self, id: SettingId, channels: core::ops::Range<usize>, value: &Value) -> bool {
        let mut changed = false;
        for channel in channels {
            self.values.set_flag(channel, id, SettingFlags::CHANGED);
            if self.values.set(channel, id, value.clone()) {
                self.values.set_flag(channel, id, SettingFlags::MUST_NOTIFY);
                changed = true;
            }
        }
        changed
    }

    fn restore(&mut self, id: SettingId, channels: core::ops::Range<usize>) {
        let definition = &self.definitions[id];
        for channel in channels {
            self.values.clear_flag(channel, id, SettingFlags::CHANGED);
            self.values.set_flag(channel, id, SettingFlags::MUST_NOTIFY);
            if !definition.is_computed() {
                self.values
                    .set(channel, id, definition.default_value().clone());
            }
        }
    }

    /// Drops explicit values on `channel` and restores plain defaults.
    /// Computed values and enabled states are left for propagation, so a
    /// reset that ends where it started notifies nothing.
    fn reset_channel(&mut self, channel: usize, per_channel_only: bool) {
        let ids: Vec<_> = self
            .definitions
            .ids()
            .filter(|&id| !per_channel_only || self.view().is_multi_value(id))
            .collect();
        for id in ids {
            let definition = &self.definitions[id];
            let mut changed = self.values.clear_flag(channel, id, SettingFlags::CHANGED);
            if !definition.is_computed() {
                changed |= self
                    .values
                    .set(channel, id, definition.default_value().clone());
            }
            if changed {
                self.values.set_flag(channel, id, SettingFlags::MUST_NOTIFY);
            }
        }
    }

    fn grow(&mut self, channel: usize) {
        if channel < self.values.channel_count() {
            return;
        }
        while self.values.channel_count() <= channel {
            let Some(added) = self.values.clone_channel(0) else {
                break;
            };
            self.reset_channel(added, true);
            debug!(channel = added, "channel added");
        }
        let all: Vec<_> = self.definitions.ids().collect();
        self.propagate(&all);
    }

    fn propagate(&mut self, roots: &[SettingId]) {
        if roots.is_empty() {
            return;
        }
        let index = self.definitions.index();
        let order = if roots.len() == self.definitions.len() {
            index.full_order()
        } else {
            index.affected_order(roots.iter().copied())
        };
        let roots: HashSet<SettingId> = roots.iter().copied().collect();
        let mut changed = roots.clone();
        let mut failed = HashSet::new();
        let mut touched = Vec::new();

        for id in order {
            let stale = roots.contains(&id)
                || self
                    .definitions
                    .index()
                    .dependencies(id)
                    .any(|dependency| changed.contains(&dependency));
            if !stale {
                continue;
            }
            touched.push(id);
            let mut any = false;
            for channel in 0..self.values.channel_count() {
                let recomputed = self.recompute(id, channel);
                let mut notify = false;
                if let Some(value) = recomputed.value {
                    notify |= self.values.set(channel, id, value);
                }
                notify |= self.values.assign_flag(
                    channel,
                    id,
                    SettingFlags::ENABLED,
                    recomputed.enabled,
                );
                if notify {
                    self.values.set_flag(channel, id, SettingFlags::MUST_NOTIFY);
                    any = true;
                }
                if recomputed.failed {
                    failed.insert((id, channel));
                }
            }
            if any {
                changed.insert(id);
            }
        }
        trace!(
            roots = roots.len(),
            recomputed = touched.len(),
            changed = changed.len(),
            "propagation finished"
        );
        self.refresh_validity(&touched, &failed);
    }

    fn recompute(&self, id: SettingId, channel: usize) -> Recomputed {
        let definition = &self.definitions[id];
        let scope = self.view().scope(channel);
        let mut failed = false;

        let formula = match (definition.value(), definition.resolve()) {
            (Some(value), _) => Some(("value", value)),
            (None, Some(resolve)) => Some(("resolve", resolve)),
            (None, None) => None,
        };
        let value = match formula {
            Some((slot, formula))
                if !self.values.flags(channel, id).contains(SettingFlags::CHANGED) =>
            {
                let outcome = evaluate_logged(definition.name(), slot, formula, &scope);
                failed |= outcome.failed;
                Some(definition.setting_type().coerce(outcome.value))
            }
            _ => None,
        };

        let enabled = match definition.enabled() {
            None => true,
            Some(formula) => {
                let outcome = evaluate_logged(definition.name(), "enabled", formula, &scope);
                failed |= outcome.failed;
                outcome.value.is_truthy()
            }
        };

        Recomputed {
            value,
            enabled,
            failed,
        }
    }

    /// Recomputes `INVALID` for `touched` settings from scratch: formula
    /// failures, rejected cycles, and channels that disagree with channel 0
    /// when nothing reconciles them. Per-channel settings only count as
    /// disagreeing after [`resolve_value`](Self::resolve_value) fell back
    /// to channel 0 for them.
    fn refresh_validity(&mut self, touched: &[SettingId], failed: &HashSet<(SettingId, usize)>) {
        let count = self.values.channel_count();
        let mut marks = Vec::with_capacity(count);
        for &id in touched {
            marks.clear();
            let view = self.view();
            let definition = &self.definitions[id];
            let cyclic = self.config.cycle_policy == CyclePolicy::Error
                && self.definitions.index().is_cyclic(id);
            let reconciled = self.values.equal_on_all_channels(id)
                || definition.resolve().is_some()
                || view.limit_channel(id, 0).is_some_and(|channel| channel >= 0);
            let multi = view.is_multi_value(id);
            let unresolved = !reconciled && (!multi || self.unresolved.contains(&id));
            let reference = self.values.value(0, id);

            for channel in 0..count {
                let cross = unresolved && self.values.value(channel, id) != reference;
                marks.push(cyclic || cross || failed.contains(&(id, channel)));
            }
            if reconciled {
                self.unresolved.remove(&id);
            } else if !multi {
                warn!(
                    setting = definition.name(),
                    "channels disagree and no resolve formula, using channel 0"
                );
            }

            for (channel, &invalid) in marks.iter().enumerate() {
                if self
                    .values
                    .assign_flag(channel, id, SettingFlags::INVALID, invalid)
                {
                    self.values.set_flag(channel, id, SettingFlags::MUST_NOTIFY);
                }
            }
        }
    }

    /// Clears `MUST_NOTIFY` everywhere and delivers one change per flagged
    /// setting, in definition order.
    fn notify(&mut self) -> usize {
        let count = self.values.channel_count();
        let mut flagged = Vec::new();
        for id in self.definitions.ids() {
            let mut any = false;
            for channel in 0..count {
                any |= self
                    .values
                    .clear_flag(channel, id, SettingFlags::MUST_NOTIFY);
            }
            if any {
                flagged.push(id);
            }
        }

        if self.sink.is_some() {
            let view = self.view();
            let changes: Vec<_> = flagged
                .iter()
                .map(|&id| SettingChange {
                    name: self.definitions[id].name().to_owned(),
                    resolved: view.resolve(id, 0).value,
                    channels: (0..count)
                        .map(|channel| ChannelState {
                            value: self.values.value(channel, id).cloned().unwrap_or_default(),
                            flags: self.values.flags(channel, id),
                        })
                        .collect(),
                })
                .collect();
            if let Some(sink) = self.sink.as_mut() {
                for change in &changes {
                    sink.setting_changed(change);
                }
            }
        }
        debug!(notifications = flagged.len(), "changes delivered");
        flagged.len()
    }
}

struct Recomputed {
    value: Option<Value>,
    enabled: bool,
    failed: bool,
}

impl fmt::Debug for SettingsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsEngine")
            .field("definitions", &self.definitions)
            .field("channels", &self.values.channel_count())
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use kiln_definition::{SettingDefinition, SettingType};
    use pretty_assertions::assert_eq;

    fn scenario() -> SettingsEngine {
        SettingsEngine::new(
            DefinitionStore::from_definitions([
                SettingDefinition::builder("base", SettingType::Int)
                    .default_value(10)
                    .build(),
                SettingDefinition::builder("double", SettingType::Int)
                    .value("base * 2")
                    .build(),
                SettingDefinition::builder("gate", SettingType::Bool)
                    .enabled("base > 5")
                    .build(),
            ]),
            EngineConfig::default(),
        )
    }

    fn record(engine: &mut SettingsEngine) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.on_change(move |change: &SettingChange| sink.borrow_mut().push(change.name.clone()));
        seen
    }

    #[test]
    fn dependents_follow_their_inputs() {
        let mut engine = scenario();
        let seen = record(&mut engine);

        engine.set_multiple(0, [("base", Value::Int(3))]);
        assert_eq!(engine.value(0, "double"), Some(&Value::Int(6)));
        assert!(!engine.is_enabled(0, "gate"));

        seen.borrow_mut().clear();
        let count = engine.set_multiple(0, [("base", Value::Int(20))]);
        assert_eq!(engine.value(0, "double"), Some(&Value::Int(40)));
        assert!(engine.is_enabled(0, "gate"));
        assert_eq!(count, 3);
        assert_eq!(*seen.borrow(), ["base", "double", "gate"]);
    }

    #[test]
    fn setting_the_same_value_notifies_nothing() {
        let mut engine = scenario();
        assert_eq!(engine.set_multiple(0, [("base", Value::Int(10))]), 0);
        assert!(engine.flags(0, "base").unwrap().contains(SettingFlags::CHANGED));
    }

    #[test]
    fn explicit_values_survive_propagation() {
        let mut engine = scenario();
        engine.set_multiple(0, [("double", Value::Int(7))]);
        engine.set_multiple(0, [("base", Value::Int(4))]);
        assert_eq!(engine.value(0, "double"), Some(&Value::Int(7)));
        assert!(engine.flags(0, "double").unwrap().contains(SettingFlags::CHANGED));

        engine.unset(0, ["double"]);
        assert_eq!(engine.value(0, "double"), Some(&Value::Int(8)));
        engine.set_multiple(0, [("base", Value::Int(5))]);
        assert_eq!(engine.value(0, "double"), Some(&Value::Int(10)));
    }

    #[test]
    fn unset_restores_plain_defaults_and_always_notifies() {
        let mut engine = scenario();
        let seen = record(&mut engine);
        engine.set_multiple(0, [("base", Value::Int(3))]);
        seen.borrow_mut().clear();
        assert_eq!(engine.unset(0, ["base"]), 3);
        assert_eq!(engine.value(0, "base"), Some(&Value::Int(10)));
        assert_eq!(engine.unset(0, ["base"]), 1);
    }

    #[test]
    fn load_defaults_is_idempotent() {
        let mut engine = scenario();
        engine.set_multiple(0, [("base", Value::Int(3))]);
        engine.load_defaults();
        let once: Vec<_> = ["base", "double", "gate"]
            .iter()
            .map(|name| (engine.value(0, name).cloned(), engine.flags(0, name)))
            .collect();
        assert_eq!(engine.load_defaults(), 0);
        let twice: Vec<_> = ["base", "double", "gate"]
            .iter()
            .map(|name| (engine.value(0, name).cloned(), engine.flags(0, name)))
            .collect();
        assert_eq!(once, twice);
        assert_eq!(engine.value(0, "double"), Some(&Value::Int(20)));
    }

    #[test]
    fn text_values_are_coerced() {
        let mut engine = scenario();
        engine.set_multiple(0, [("base", Value::from("6"))]);
        assert_eq!(engine.value(0, "base"), Some(&Value::Int(6)));
        assert_eq!(engine.value(0, "double"), Some(&Value::Int(12)));

        // Neither unknown names nor ill-typed values are stored.
        assert_eq!(
            engine.set_multiple(0, [("missing", Value::Int(1)), ("base", Value::from("six"))]),
            0
        );
        assert_eq!(engine.value(0, "base"), Some(&Value::Int(6)));
    }

    fn extruders() -> SettingsEngine {
        SettingsEngine::new(
            DefinitionStore::from_definitions([
                SettingDefinition::builder("layer_height", SettingType::Float)
                    .default_value(0.1)
                    .build(),
                SettingDefinition::builder("temperature", SettingType::Float)
                    .default_value(200.0)
                    .per_extruder(true)
                    .build(),
                SettingDefinition::builder("flow", SettingType::Float)
                    .value("temperature / 2")
                    .per_extruder(true)
                    .build(),
            ]),
            EngineConfig::default(),
        )
    }

    #[test]
    fn channels_grow_on_demand() {
        let mut engine = extruders();
        engine.set_multiple(
            0,
            [
                ("temperature", Value::Float(230.0)),
                ("layer_height", Value::Float(0.2)),
            ],
        );
        engine.set_multiple(2, [("temperature", Value::Float(190.0))]);

        assert_eq!(engine.channel_count(), 3);
        assert_eq!(engine.value(0, "temperature"), Some(&Value::Float(230.0)));
        assert_eq!(engine.value(1, "temperature"), Some(&Value::Float(200.0)));
        assert_eq!(engine.value(2, "temperature"), Some(&Value::Float(190.0)));
        assert_eq!(engine.value(2, "flow"), Some(&Value::Float(95.0)));
        assert_eq!(engine.value(1, "flow"), Some(&Value::Float(100.0)));
        // Single-valued settings carry over to new channels.
        assert_eq!(engine.value(2, "layer_height"), Some(&Value::Float(0.2)));
        assert!(!engine.flags(1, "layer_height").unwrap().contains(SettingFlags::INVALID));
    }

    #[test]
    fn single_valued_settings_are_written_everywhere() {
        let mut engine = extruders();
        engine.ensure_channel(1);
        engine.set_multiple(1, [("layer_height", Value::Float(0.3))]);
        assert_eq!(engine.value(0, "layer_height"), Some(&Value::Float(0.3)));
        let id = engine.definitions().id("layer_height").unwrap();
        assert!(engine.values().equal_on_all_channels(id));

        engine.unset(1, ["layer_height"]);
        assert_eq!(engine.value(0, "layer_height"), Some(&Value::Float(0.1)));
    }

    #[test]
    fn resolution_falls_back_to_channel_zero() {
        let mut engine = extruders();
        engine.ensure_channel(1);
        engine.set_multiple(1, [("temperature", Value::Float(210.0))]);
        assert!(engine.is_multi_value("temperature"));
        assert_eq!(engine.resolve_value("temperature"), Value::Float(200.0));
        assert!(engine.flags(1, "temperature").unwrap().contains(SettingFlags::INVALID));

        // Agreement clears the invalid state on the next propagation.
        engine.set_across([("temperature", Value::Float(215.0))]);
        assert!(!engine.flags(1, "temperature").unwrap().contains(SettingFlags::INVALID));
        assert_eq!(engine.resolved("temperature"), Value::Float(215.0));
    }

    #[test]
    fn operations_across_channels_notify_each_setting_once() {
        let mut engine = extruders();
        engine.ensure_channel(1);
        let seen = record(&mut engine);

        assert_eq!(engine.set_across([("temperature", Value::Float(230.0))]), 2);
        assert_eq!(*seen.borrow(), ["temperature", "flow"]);
        for channel in 0..2 {
            assert_eq!(engine.value(channel, "flow"), Some(&Value::Float(115.0)));
        }

        seen.borrow_mut().clear();
        assert_eq!(engine.unset_across(["temperature"]), 2);
        assert_eq!(*seen.borrow(), ["temperature", "flow"]);
        for channel in 0..2 {
            assert_eq!(engine.value(channel, "temperature"), Some(&Value::Float(200.0)));
            assert_eq!(engine.value(channel, "flow"), Some(&Value::Float(100.0)));
            assert!(!engine.flags(channel, "temperature").unwrap().contains(SettingFlags::CHANGED));
        }
    }

    #[test]
    fn per_channel_values_recover_from_formula_failures() {
        let mut engine = SettingsEngine::new(
            DefinitionStore::from_definitions([
                SettingDefinition::builder("count", SettingType::Int)
                    .per_extruder(true)
                    .build(),
                SettingDefinition::builder("ratio", SettingType::Float)
                    .value("10 / count")
                    .per_extruder(true)
                    .build(),
            ]),
            EngineConfig {
                initial_channels: 2,
                ..EngineConfig::default()
            },
        );
        let invalid = |engine: &SettingsEngine, channel| {
            engine.flags(channel, "ratio").unwrap().contains(SettingFlags::INVALID)
        };

        engine.set_multiple(0, [("count", Value::Int(4))]);
        assert!(!invalid(&engine, 0));
        assert!(invalid(&engine, 1));

        // Channels may legitimately differ once both formulas succeed.
        engine.set_multiple(1, [("count", Value::Int(5))]);
        assert_eq!(engine.value(0, "ratio"), Some(&Value::Float(2.5)));
        assert_eq!(engine.value(1, "ratio"), Some(&Value::Float(2.0)));
        assert!(!invalid(&engine, 0));
        assert!(!invalid(&engine, 1));
    }

    #[test]
    fn fallback_marks_are_delivered_and_last_until_agreement() {
        let mut engine = extruders();
        engine.set_multiple(1, [("temperature", Value::Float(210.0))]);
        let seen = record(&mut engine);

        assert_eq!(engine.resolve_value("temperature"), Value::Float(200.0));
        assert_eq!(*seen.borrow(), ["temperature"]);
        assert!(engine.flags(1, "temperature").unwrap().contains(SettingFlags::INVALID));

        // Still disagreeing: the mark stays.
        engine.set_multiple(1, [("temperature", Value::Float(220.0))]);
        assert!(engine.flags(1, "temperature").unwrap().contains(SettingFlags::INVALID));

        seen.borrow_mut().clear();
        engine.set_multiple(1, [("temperature", Value::Float(200.0))]);
        assert!(!engine.flags(1, "temperature").unwrap().contains(SettingFlags::INVALID));
        assert_eq!(*seen.borrow(), ["temperature", "flow"]);

        // A second disagreement without a fresh resolution is not a problem.
        engine.set_multiple(1, [("temperature", Value::Float(190.0))]);
        assert!(!engine.flags(1, "temperature").unwrap().contains(SettingFlags::INVALID));
    }

    #[test]
    fn resolver_reconciles_channels() {
        let definitions = DefinitionStore::from_definitions([SettingDefinition::builder(
            "temperature",
            SettingType::Float,
        )
        .default_value(200.0)
        .per_extruder(true)
        .resolve("max(extruderValues('temperature'))")
        .build()]);
        let mut engine = SettingsEngine::new(
            definitions,
            EngineConfig {
                initial_channels: 2,
                ..EngineConfig::default()
            },
        );
        engine.set_multiple(0, [("temperature", Value::Float(205.0))]);
        engine.set_multiple(1, [("temperature", Value::Float(240.0))]);
        assert_eq!(engine.value(0, "temperature"), Some(&Value::Float(205.0)));
        assert_eq!(engine.resolve_value("temperature"), Value::Float(240.0));
        for channel in 0..2 {
            assert!(!engine.flags(channel, "temperature").unwrap().contains(SettingFlags::INVALID));
        }
    }

    #[test]
    fn formula_failures_read_zero_and_mark_invalid() {
        let mut engine = SettingsEngine::new(
            DefinitionStore::from_definitions([
                SettingDefinition::builder("count", SettingType::Int).build(),
                SettingDefinition::builder("ratio", SettingType::Float)
                    .value("10 / count")
                    .build(),
            ]),
            EngineConfig::default(),
        );
        assert_eq!(engine.value(0, "ratio"), Some(&Value::Float(0.0)));
        assert!(engine.flags(0, "ratio").unwrap().contains(SettingFlags::INVALID));

        engine.set_multiple(0, [("count", Value::Int(4))]);
        assert_eq!(engine.value(0, "ratio"), Some(&Value::Float(2.5)));
        assert!(!engine.flags(0, "ratio").unwrap().contains(SettingFlags::INVALID));
    }

    #[test]
    fn cyclic_settings_stay_invalid() {
        let engine = SettingsEngine::new(
            DefinitionStore::from_definitions([
                SettingDefinition::builder("a", SettingType::Int).value("b + 1").build(),
                SettingDefinition::builder("b", SettingType::Int).value("a + 1").build(),
            ]),
            EngineConfig::default(),
        );
        assert!(engine.flags(0, "a").unwrap().contains(SettingFlags::INVALID));
        assert!(engine.flags(0, "b").unwrap().contains(SettingFlags::INVALID));
    }

    #[test]
    fn identical_operations_give_identical_state() {
        let run = || {
            let mut engine = extruders();
            engine.set_multiple(1, [("temperature", Value::Float(205.0))]);
            engine.set_multiple(0, [("layer_height", Value::Float(0.15))]);
            engine.unset(1, ["temperature"]);
            let mut state = Vec::new();
            for channel in 0..engine.channel_count() {
                for id in engine.definitions().ids() {
                    state.push((
                        engine.values().value(channel, id).cloned(),
                        engine.values().flags(channel, id),
                    ));
                }
            }
            state
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn unknown_names_resolve_to_zero() {
        let mut engine = scenario();
        assert_eq!(engine.resolved("missing"), Value::Int(0));
        assert_eq!(engine.resolve_value("missing"), Value::Int(0));
        assert_eq!(engine.value(0, "missing"), None);
        assert_eq!(engine.flags(5, "base"), None);
    }
}
