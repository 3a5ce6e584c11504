// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed setting definitions.
//!
//! This module provides [`SettingDefinition`], the typed view of one merged
//! schema record, and [`SettingDefinitionBuilder`] for building definitions
//! in code.

use kiln_formula::{Formula, Value};
use serde_json::Map;
use tracing::warn;

use crate::setting_type::SettingType;

/// One named, typed setting.
///
/// A definition never changes after the store is built; values live in the
/// settings engine.
///
/// # Example
///
/// ```rust
/// use kiln_definition::{SettingDefinition, SettingType};
/// use kiln_formula::Value;
///
/// let wall = SettingDefinition::builder("wall_thickness", SettingType::Float)
///     .default_value(0.8)
///     .value("wall_line_width * wall_line_count")
///     .per_extruder(true)
///     .build();
///
/// assert_eq!(wall.default_value(), &Value::Float(0.8));
/// assert!(wall.is_computed());
/// assert!(wall.settable_per_extruder());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SettingDefinition {
    name: String,
    setting_type: SettingType,
    default_value: Value,
    value: Option<Formula>,
    resolve: Option<Formula>,
    enabled: Option<Formula>,
    limit_to_extruder: Option<Formula>,
    minimum_value: Option<Formula>,
    maximum_value: Option<Formula>,
    minimum_value_warning: Option<Formula>,
    maximum_value_warning: Option<Formula>,
    settable_per_extruder: bool,
    settable_per_mesh: bool,
    settable_globally: bool,
    options: Vec<(String, String)>,
    unit: Option<String>,
    label: Option<String>,
    description: Option<String>,
}

impl SettingDefinition {
    /// Starts building a definition with the given name and type.
    #[must_use]
    pub fn builder(name: impl Into<String>, setting_type: SettingType) -> SettingDefinitionBuilder {
        SettingDefinitionBuilder::new(name, setting_type)
    }

    /// The unique setting name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type.
    #[must_use]
    #[inline]
    pub fn setting_type(&self) -> SettingType {
        self.setting_type
    }

    /// The value used when nothing else applies.
    #[must_use]
    #[inline]
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// The formula computing this setting from others, if any.
    #[must_use]
    #[inline]
    pub fn value(&self) -> Option<&Formula> {
        self.value.as_ref()
    }

    /// The formula combining per-channel values into one.
    #[must_use]
    #[inline]
    pub fn resolve(&self) -> Option<&Formula> {
        self.resolve.as_ref()
    }

    /// The formula deciding whether the setting is active.
    #[must_use]
    #[inline]
    pub fn enabled(&self) -> Option<&Formula> {
        self.enabled.as_ref()
    }

    /// The formula naming the channel that owns this setting.
    #[must_use]
    #[inline]
    pub fn limit_to_extruder(&self) -> Option<&Formula> {
        self.limit_to_extruder.as_ref()
    }

    /// Hard lower bound.
    #[must_use]
    #[inline]
    pub fn minimum_value(&self) -> Option<&Formula> {
        self.minimum_value.as_ref()
    }

    /// Hard upper bound.
    #[must_use]
    #[inline]
    pub fn maximum_value(&self) -> Option<&Formula> {
        self.maximum_value.as_ref()
    }

    /// Soft lower bound.
    #[must_use]
    #[inline]
    pub fn minimum_value_warning(&self) -> Option<&Formula> {
        self.minimum_value_warning.as_ref()
    }

    /// Soft upper bound.
    #[must_use]
    #[inline]
    pub fn maximum_value_warning(&self) -> Option<&Formula> {
        self.maximum_value_warning.as_ref()
    }

    /// Whether each channel may hold its own value.
    #[must_use]
    #[inline]
    pub fn settable_per_extruder(&self) -> bool {
        self.settable_per_extruder
    }

    /// Whether individual work items may override the value.
    #[must_use]
    #[inline]
    pub fn settable_per_mesh(&self) -> bool {
        self.settable_per_mesh
    }

    /// Whether the setting may be set for the whole job.
    #[must_use]
    #[inline]
    pub fn settable_globally(&self) -> bool {
        self.settable_globally
    }

    /// `(value, label)` pairs for enum settings.
    #[must_use]
    #[inline]
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Display unit, such as `mm`.
    #[must_use]
    #[inline]
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Human readable label.
    #[must_use]
    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Human readable description.
    #[must_use]
    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns `true` if the value comes from a formula.
    #[must_use]
    #[inline]
    pub fn is_computed(&self) -> bool {
        self.value.is_some()
    }

    /// Formula slots that take part in dependency tracking, in the order
    /// their references are collected.
    pub fn tracked_formulas(&self) -> impl Iterator<Item = &Formula> {
        [
            self.value.as_ref(),
            self.resolve.as_ref(),
            self.enabled.as_ref(),
            self.limit_to_extruder.as_ref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Every formula slot, tracked or not.
    pub fn formulas(&self) -> impl Iterator<Item = (&'static str, &Formula)> {
        [
            ("value", self.value.as_ref()),
            ("resolve", self.resolve.as_ref()),
            ("enabled", self.enabled.as_ref()),
            ("limit_to_extruder", self.limit_to_extruder.as_ref()),
            ("minimum_value", self.minimum_value.as_ref()),
            ("maximum_value", self.maximum_value.as_ref()),
            ("minimum_value_warning", self.minimum_value_warning.as_ref()),
            ("maximum_value_warning", self.maximum_value_warning.as_ref()),
        ]
        .into_iter()
        .filter_map(|(slot, formula)| formula.map(|f| (slot, f)))
    }

    /// Builds a definition from a merged schema record.
    ///
    /// Malformed fields are logged and ignored. Formulas that fail to parse
    /// are logged here and kept, so every evaluation reports them.
    pub(crate) fn from_record(name: &str, record: &Map<String, serde_json::Value>) -> Self {
        let setting_type = match record.get("type") {
            Some(serde_json::Value::String(declared)) => {
                SettingType::from_name_lossy(name, declared)
            }
            Some(other) => {
                warn!(
                    setting = name,
                    declared = %other,
                    "setting type is not a string, treating as str"
                );
                SettingType::Str
            }
            None => {
                warn!(setting = name, "setting has no type, treating as str");
                SettingType::Str
            }
        };

        let mut builder = Self::builder(name, setting_type);
        if let Some(default) = record.get("default_value") {
            builder = builder.default_value(setting_type.coerce(Value::from(default.clone())));
        }

        let formula = |slot: &str| {
            let formula = Formula::from_json(record.get(slot)?.clone());
            if let Formula::Expression(expr) = &formula
                && let Some(error) = expr.parse_error()
            {
                warn!(
                    setting = name,
                    slot,
                    formula = expr.source(),
                    %error,
                    "formula does not parse"
                );
            }
            Some(formula)
        };
        builder.definition.value = formula("value");
        builder.definition.resolve = formula("resolve");
        builder.definition.enabled = formula("enabled");
        builder.definition.limit_to_extruder = formula("limit_to_extruder");
        builder.definition.minimum_value = formula("minimum_value");
        builder.definition.maximum_value = formula("maximum_value");
        builder.definition.minimum_value_warning = formula("minimum_value_warning");
        builder.definition.maximum_value_warning = formula("maximum_value_warning");

        let flag = |field: &str, default: bool| match record.get(field) {
            None => default,
            Some(serde_json::Value::Bool(b)) => *b,
            Some(other) => {
                warn!(setting = name, field, value = %other, "expected a boolean");
                default
            }
        };
        builder = builder
            .per_extruder(flag("settable_per_extruder", false))
            .per_mesh(flag("settable_per_mesh", false))
            .globally(flag("settable_globally", true));

        if let Some(options) = record.get("options") {
            match options {
                serde_json::Value::Object(map) => {
                    for (value, label) in map {
                        let label = label.as_str().map_or_else(|| label.to_string(), str::to_owned);
                        builder = builder.option(value.clone(), label);
                    }
                }
                other => warn!(setting = name, options = %other, "options must be an object"),
            }
        }

        let text = |field: &str| {
            record
                .get(field)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };
        builder.definition.unit = text("unit");
        builder.definition.label = text("label");
        builder.definition.description = text("description");

        builder.build()
    }
}

/// Builder for [`SettingDefinition`].
///
/// # Example
///
/// ```rust
/// use kiln_definition::{SettingDefinition, SettingType};
///
/// let pattern = SettingDefinition::builder("infill_pattern", SettingType::Enum)
///     .option("grid", "Grid")
///     .option("lines", "Lines")
///     .default_value("grid")
///     .enabled("infill_sparse_density > 0")
///     .build();
///
/// assert_eq!(pattern.options().len(), 2);
/// assert_eq!(pattern.enabled().and_then(|f| f.source()), Some("infill_sparse_density > 0"));
/// ```
#[derive(Debug)]
pub struct SettingDefinitionBuilder {
    definition: SettingDefinition,
}

impl SettingDefinitionBuilder {
    /// Creates a builder whose default value is the type's zero value.
    #[must_use]
    pub fn new(name: impl Into<String>, setting_type: SettingType) -> Self {
        Self {
            definition: SettingDefinition {
                name: name.into(),
                setting_type,
                default_value: setting_type.zero_value(),
                value: None,
                resolve: None,
                enabled: None,
                limit_to_extruder: None,
                minimum_value: None,
                maximum_value: None,
                minimum_value_warning: None,
                maximum_value_warning: None,
                settable_per_extruder: false,
                settable_per_mesh: false,
                settable_globally: true,
                options: Vec::new(),
                unit: None,
                label: None,
                description: None,
            },
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.definition.default_value = value.into();
        self
    }

    /// Sets the value formula.
    #[must_use]
    pub fn value(mut self, source: &str) -> Self {
        self.definition.value = Some(Formula::parse(source));
        self
    }

    /// Sets the resolve formula.
    #[must_use]
    pub fn resolve(mut self, source: &str) -> Self {
        self.definition.resolve = Some(Formula::parse(source));
        self
    }

    /// Sets the enabled formula.
    #[must_use]
    pub fn enabled(mut self, source: &str) -> Self {
        self.definition.enabled = Some(Formula::parse(source));
        self
    }

    /// Sets the owning-channel formula.
    #[must_use]
    pub fn limit_to_extruder(mut self, source: &str) -> Self {
        self.definition.limit_to_extruder = Some(Formula::parse(source));
        self
    }

    /// Sets the hard bounds.
    #[must_use]
    pub fn bounds(mut self, minimum: Option<&str>, maximum: Option<&str>) -> Self {
        self.definition.minimum_value = minimum.map(Formula::parse);
        self.definition.maximum_value = maximum.map(Formula::parse);
        self
    }

    /// Sets the soft bounds.
    #[must_use]
    pub fn warning_bounds(mut self, minimum: Option<&str>, maximum: Option<&str>) -> Self {
        self.definition.minimum_value_warning = minimum.map(Formula::parse);
        self.definition.maximum_value_warning = maximum.map(Formula::parse);
        self
    }

    /// Sets whether each channel may hold its own value.
    #[must_use]
    pub fn per_extruder(mut self, settable: bool) -> Self {
        self.definition.settable_per_extruder = settable;
        self
    }

    /// Sets whether work items may override the value.
    #[must_use]
    pub fn per_mesh(mut self, settable: bool) -> Self {
        self.definition.settable_per_mesh = settable;
        self
    }

    /// Sets whether the value may be set for the whole job.
    #[must_use]
    pub fn globally(mut self, settable: bool) -> Self {
        self.definition.settable_globally = settable;
        self
    }

    /// Appends an enum option.
    #[must_use]
    pub fn option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.definition.options.push((value.into(), label.into()));
        self
    }

    /// Sets the display unit.
    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.definition.unit = Some(unit.into());
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.definition.label = Some(label.into());
        self
    }

    /// Builds the definition.
    #[must_use]
    pub fn build(self) -> SettingDefinition {
        self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    #[test]
    fn record_fields_become_typed() {
        let def = SettingDefinition::from_record(
            "layer_height",
            &record(json!({
                "type": "float",
                "default_value": 0.1,
                "minimum_value": "0.001",
                "maximum_value_warning": "0.8 * min(extruderValues('machine_nozzle_size'))",
                "settable_per_mesh": false,
                "unit": "mm",
                "label": "Layer Height"
            })),
        );
        assert_eq!(def.setting_type(), SettingType::Float);
        assert_eq!(def.default_value(), &Value::Float(0.1));
        assert!(!def.is_computed());
        assert!(def.settable_globally());
        assert_eq!(def.unit(), Some("mm"));
        assert_eq!(def.label(), Some("Layer Height"));
        assert_eq!(
            def.formulas().map(|(slot, _)| slot).collect::<Vec<_>>(),
            ["minimum_value", "maximum_value_warning"]
        );
    }

    #[test]
    fn default_values_are_coerced_to_the_declared_type() {
        let def = SettingDefinition::from_record(
            "wall_line_count",
            &record(json!({ "type": "int", "default_value": "3" })),
        );
        assert_eq!(def.default_value(), &Value::Int(3));

        let def =
            SettingDefinition::from_record("extruder_nr", &record(json!({ "type": "extruder" })));
        assert_eq!(def.default_value(), &Value::from("0"));
    }

    #[test]
    fn literal_formula_slots_are_kept() {
        let def = SettingDefinition::from_record(
            "support_enable",
            &record(json!({ "type": "bool", "enabled": false, "value": true })),
        );
        assert_eq!(def.enabled(), Some(&Formula::Literal(Value::Bool(false))));
        assert_eq!(def.value(), Some(&Formula::Literal(Value::Bool(true))));
    }

    #[test]
    fn malformed_fields_fall_back() {
        let def = SettingDefinition::from_record(
            "mystery",
            &record(json!({ "settable_per_extruder": "yes", "options": [1, 2] })),
        );
        assert_eq!(def.setting_type(), SettingType::Str);
        assert!(!def.settable_per_extruder());
        assert!(def.options().is_empty());
    }

    #[test]
    fn tracked_formulas_skip_bounds() {
        let def = SettingDefinition::builder("speed", SettingType::Float)
            .value("speed_print / 2")
            .bounds(Some("speed_min"), None)
            .enabled("speed_enabled")
            .build();
        let sources: Vec<_> = def.tracked_formulas().filter_map(Formula::source).collect();
        assert_eq!(sources, ["speed_print / 2", "speed_enabled"]);
    }
}
