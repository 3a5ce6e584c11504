// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do with settings that took part in a dependency edge the index
/// rejected because it would close a cycle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Keep them flagged [`INVALID`](crate::SettingFlags::INVALID) on every
    /// channel and warn when the engine is built.
    #[default]
    Error,
    /// Treat them like any other setting.
    Ignore,
}

/// Settings engine configuration.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration.
///
/// ```
/// use kiln_settings::{CyclePolicy, EngineConfig};
///
/// let config = EngineConfig::from_json(r#"{ "initial_channels": 2 }"#).unwrap();
/// assert_eq!(config.initial_channels, 2);
/// assert_eq!(config.cycle_policy, CyclePolicy::Error);
/// assert_eq!(config.max_resolve_depth, 8);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Channels allocated when the engine is built.
    pub initial_channels: usize,
    /// Handling of settings on rejected cycles.
    pub cycle_policy: CyclePolicy,
    /// How deeply `resolveOrValue` may nest before resolution stops
    /// evaluating formulas and reads channel 0.
    pub max_resolve_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_channels: 1,
            cycle_policy: CyclePolicy::default(),
            max_resolve_depth: 8,
        }
    }
}

impl EngineConfig {
    /// Parses and checks a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.initial_channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        Ok(())
    }
}

/// A configuration could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The text is not a valid configuration object.
    #[error("invalid engine configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// Channel 0 always exists, so zero channels is meaningless.
    #[error("initial_channels must be at least 1")]
    NoChannels,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn policies_use_snake_case() {
        let config = EngineConfig::from_json(r#"{ "cycle_policy": "ignore" }"#).unwrap();
        assert_eq!(config.cycle_policy, CyclePolicy::Ignore);
    }

    #[test]
    fn bad_configurations_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "initial_channels": 0 }"#),
            Err(ConfigError::NoChannels)
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "channels": 2 }"#),
            Err(ConfigError::Json(_))
        ));
    }
}
