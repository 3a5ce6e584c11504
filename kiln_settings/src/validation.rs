// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bound checking against the `minimum_value`/`maximum_value` formulas and
//! their `_warning` variants.

use core::fmt;

use kiln_formula::Formula;
use serde::Serialize;
use tracing::debug;

use crate::engine::SettingsEngine;

/// Outcome of checking a value against its bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    /// Within every bound, or no bounds declared.
    Valid,
    /// Below `minimum_value`.
    MinimumError,
    /// Above `maximum_value`.
    MaximumError,
    /// Below `minimum_value_warning`.
    MinimumWarning,
    /// Above `maximum_value_warning`.
    MaximumWarning,
    /// Bounds are declared but the value is not a number.
    NotNumeric,
}

impl Validation {
    /// Returns `true` for hard bound violations and non-numeric values.
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::MinimumError | Self::MaximumError | Self::NotNumeric
        )
    }

    /// Returns `true` for soft bound violations.
    #[must_use]
    pub fn is_warning(self) -> bool {
        matches!(self, Self::MinimumWarning | Self::MaximumWarning)
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::MinimumError => "below minimum",
            Self::MaximumError => "above maximum",
            Self::MinimumWarning => "below recommended minimum",
            Self::MaximumWarning => "above recommended maximum",
            Self::NotNumeric => "not a number",
        })
    }
}

/// A validation problem found by [`SettingsEngine::problems`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Problem {
    /// The setting name.
    pub setting: String,
    /// The channel the value lives on.
    pub channel: usize,
    /// What is wrong with it.
    pub validation: Validation,
}

impl SettingsEngine {
    /// Checks the value of `name` on `channel` against its bounds, with the
    /// bound formulas evaluated on the same channel.
    ///
    /// Bounds whose formulas fail are skipped. Returns `None` for unknown
    /// settings or channels.
    ///
    /// ```
    /// use kiln_definition::{DefinitionStore, SettingDefinition, SettingType};
    /// use kiln_formula::Value;
    /// use kiln_settings::{EngineConfig, SettingsEngine, Validation};
    ///
    /// let definitions = DefinitionStore::from_definitions([
    ///     SettingDefinition::builder("nozzle", SettingType::Float).default_value(0.4).build(),
    ///     SettingDefinition::builder("line_width", SettingType::Float)
    ///         .default_value(0.4)
    ///         .bounds(Some("0.001"), None)
    ///         .warning_bounds(Some("nozzle * 0.5"), Some("nozzle * 2"))
    ///         .build(),
    /// ]);
    /// let mut engine = SettingsEngine::new(definitions, EngineConfig::default());
    /// assert_eq!(engine.validate(0, "line_width"), Some(Validation::Valid));
    ///
    /// engine.set_multiple(0, [("line_width", Value::Float(1.0))]);
    /// assert_eq!(engine.validate(0, "line_width"), Some(Validation::MaximumWarning));
    /// ```
    #[must_use]
    pub fn validate(&self, channel: usize, name: &str) -> Option<Validation> {
        let id = self.definitions().id(name)?;
        let definition = &self.definitions()[id];
        let value = self.values().value(channel, id)?;

        let bounds = [
            (definition.minimum_value(), Validation::MinimumError, true),
            (definition.maximum_value(), Validation::MaximumError, false),
            (definition.minimum_value_warning(), Validation::MinimumWarning, true),
            (definition.maximum_value_warning(), Validation::MaximumWarning, false),
        ];
        if bounds.iter().all(|(formula, ..)| formula.is_none()) {
            return Some(Validation::Valid);
        }
        let Some(number) = value.as_f64() else {
            return Some(Validation::NotNumeric);
        };

        let scope = self.view().scope(channel);
        for (formula, violation, is_minimum) in bounds {
            let Some(bound) = formula.and_then(|f| bound(name, f, &scope)) else {
                continue;
            };
            if (is_minimum && number < bound) || (!is_minimum && number > bound) {
                return Some(violation);
            }
        }
        Some(Validation::Valid)
    }

    /// Every enabled setting value that is not [`Validation::Valid`], in
    /// channel then definition order.
    #[must_use]
    pub fn problems(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        for channel in 0..self.channel_count() {
            for (_, definition) in self.definitions().iter() {
                let name = definition.name();
                if !self.is_enabled(channel, name) {
                    continue;
                }
                match self.validate(channel, name) {
                    Some(Validation::Valid) | None => {}
                    Some(validation) => problems.push(Problem {
                        setting: name.to_owned(),
                        channel,
                        validation,
                    }),
                }
            }
        }
        problems
    }
}

fn bound(setting: &str, formula: &Formula, scope: &dyn kiln_formula::Scope) -> Option<f64> {
    match formula.evaluate(scope) {
        Ok(value) => {
            let bound = value.as_f64();
            if bound.is_none() {
                debug!(setting, %value, "bound is not a number, skipped");
            }
            bound
        }
        Err(error) => {
            debug!(setting, %error, "bound formula failed, skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_definition::{DefinitionStore, SettingDefinition, SettingType};
    use kiln_formula::Value;

    use crate::EngineConfig;

    fn engine() -> SettingsEngine {
        SettingsEngine::new(
            DefinitionStore::from_definitions([
                SettingDefinition::builder("speed", SettingType::Float)
                    .default_value(50.0)
                    .bounds(Some("1"), Some("max_speed"))
                    .warning_bounds(Some("10"), Some("max_speed * 0.8"))
                    .build(),
                SettingDefinition::builder("max_speed", SettingType::Float)
                    .default_value(100.0)
                    .build(),
                SettingDefinition::builder("pattern", SettingType::Str)
                    .bounds(Some("1"), None)
                    .build(),
                SettingDefinition::builder("broken", SettingType::Float)
                    .bounds(Some("undefined_thing"), None)
                    .build(),
            ]),
            EngineConfig::default(),
        )
    }

    #[test]
    fn bounds_are_checked_in_order() {
        let mut engine = engine();
        let cases = [
            (0.5, Validation::MinimumError),
            (5.0, Validation::MinimumWarning),
            (50.0, Validation::Valid),
            (90.0, Validation::MaximumWarning),
            (150.0, Validation::MaximumError),
        ];
        for (speed, expected) in cases {
            engine.set_multiple(0, [("speed", Value::Float(speed))]);
            assert_eq!(engine.validate(0, "speed"), Some(expected), "speed {speed}");
        }
    }

    #[test]
    fn bounds_follow_their_formulas() {
        let mut engine = engine();
        engine.set_multiple(0, [("speed", Value::Float(90.0))]);
        assert_eq!(engine.validate(0, "speed"), Some(Validation::MaximumWarning));
        engine.set_multiple(0, [("max_speed", Value::Float(200.0))]);
        assert_eq!(engine.validate(0, "speed"), Some(Validation::Valid));
    }

    #[test]
    fn non_numeric_and_failing_bounds() {
        let engine = engine();
        assert_eq!(engine.validate(0, "pattern"), Some(Validation::NotNumeric));
        assert_eq!(engine.validate(0, "broken"), Some(Validation::Valid));
        assert_eq!(engine.validate(0, "missing"), None);
        assert_eq!(engine.validate(3, "speed"), None);
        assert!(Validation::NotNumeric.is_error());
        assert!(Validation::MaximumWarning.is_warning());
    }

    #[test]
    fn problems_list_enabled_violations() {
        let mut engine = engine();
        engine.set_multiple(0, [("speed", Value::Float(0.5))]);
        assert_eq!(
            engine.problems(),
            [
                Problem {
                    setting: "speed".into(),
                    channel: 0,
                    validation: Validation::MinimumError,
                },
                Problem {
                    setting: "pattern".into(),
                    channel: 0,
                    validation: Validation::NotNumeric,
                },
            ]
        );
    }
}
