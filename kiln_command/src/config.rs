// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed parts of the command line.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural tokens around the setting values.
///
/// ```
/// use kiln_command::CommandConfig;
///
/// let config = CommandConfig::from_json(
///     r#"{ "schemas": ["printer.def.json"], "output": "part.gcode" }"#,
/// )
/// .unwrap();
/// assert_eq!(config.verb, "slice");
/// assert!(!config.verbose);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandConfig {
    /// First token: the engine subcommand.
    pub verb: String,
    /// Emits `-v` after the verb.
    pub verbose: bool,
    /// Schema documents passed with `-j`, in order.
    pub schemas: Vec<String>,
    /// Output path passed with `-o`.
    pub output: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            verb: "slice".into(),
            verbose: false,
            schemas: Vec::new(),
            output: "output.gcode".into(),
        }
    }
}

impl CommandConfig {
    /// Parses and checks a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, CommandConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a usable command line.
    pub fn check(&self) -> Result<(), CommandConfigError> {
        if self.verb.trim().is_empty() {
            return Err(CommandConfigError::Missing("verb"));
        }
        if self.output.trim().is_empty() {
            return Err(CommandConfigError::Missing("output"));
        }
        Ok(())
    }
}

/// A command configuration could not be used.
#[derive(Debug, Error)]
pub enum CommandConfigError {
    /// The text is not a valid configuration object.
    #[error("invalid command configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// A required token is empty.
    #[error("`{0}` must not be empty")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CommandConfig::from_json("{}").unwrap();
        assert_eq!(config, CommandConfig::default());
        assert_eq!(config.output, "output.gcode");
    }

    #[test]
    fn empty_tokens_are_rejected() {
        assert!(matches!(
            CommandConfig::from_json(r#"{ "verb": " " }"#),
            Err(CommandConfigError::Missing("verb"))
        ));
        assert!(matches!(
            CommandConfig::from_json(r#"{ "output": "" }"#),
            Err(CommandConfigError::Missing("output"))
        ));
        assert!(matches!(
            CommandConfig::from_json(r#"{ "schema": [] }"#),
            Err(CommandConfigError::Json(_))
        ));
    }
}
