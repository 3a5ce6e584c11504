// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Saved user profiles.
//!
//! A profile is a JSON object of explicit values. Keys of the form
//! `channel_N` hold objects with the values for channel `N`; a `global`
//! object and every other key hold values for channel 0 that are written
//! before any channel section.
//!
//! ```json
//! {
//!   "layer_height": 0.2,
//!   "global": { "infill_density": 15 },
//!   "channel_1": { "material_temperature": 230 }
//! }
//! ```

use std::collections::BTreeMap;

use kiln_formula::Value;
use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::debug;

use crate::engine::SettingsEngine;

/// Explicit values grouped by channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Profile {
    global: Vec<(String, Value)>,
    channels: BTreeMap<usize, Vec<(String, Value)>>,
}

impl Profile {
    /// Parses a profile document.
    pub fn from_json(text: &str) -> Result<Self, ProfileError> {
        let Json::Object(root) = serde_json::from_str::<Json>(text)? else {
            return Err(ProfileError::Shape("profile must be an object".into()));
        };
        let mut profile = Self::default();
        for (key, value) in root {
            if key == "global" {
                profile.global.extend(section(&key, value)?);
            } else if let Some(number) = key.strip_prefix("channel_") {
                let channel = number
                    .parse()
                    .map_err(|_| ProfileError::BadChannel(key.clone()))?;
                profile.channels.entry(channel).or_default().extend(section(&key, value)?);
            } else {
                profile.global.push((key, Value::from(value)));
            }
        }
        Ok(profile)
    }

    /// Values written to channel 0 before the channel sections.
    #[must_use]
    pub fn global(&self) -> &[(String, Value)] {
        &self.global
    }

    /// Channel sections in channel order.
    pub fn channels(&self) -> impl Iterator<Item = (usize, &[(String, Value)])> {
        self.channels.iter().map(|(&channel, values)| (channel, values.as_slice()))
    }

    /// Returns `true` if the profile holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.channels.values().all(Vec::is_empty)
    }

    /// Writes the profile into `engine`, growing channels as needed.
    ///
    /// Returns the number of notifications delivered.
    pub fn apply(&self, engine: &mut SettingsEngine) -> usize {
        let mut notified = engine.set_multiple(0, self.global.iter().map(pair));
        for (&channel, values) in &self.channels {
            notified += engine.set_multiple(channel, values.iter().map(pair));
        }
        debug!(
            global = self.global.len(),
            channels = self.channels.len(),
            notified,
            "profile applied"
        );
        notified
    }
}

fn pair((name, value): &(String, Value)) -> (&str, Value) {
    (name.as_str(), value.clone())
}

fn section(key: &str, value: Json) -> Result<Vec<(String, Value)>, ProfileError> {
    let Json::Object(values) = value else {
        return Err(ProfileError::Shape(format!("`{key}` must be an object")));
    };
    Ok(entries(values))
}

fn entries(values: Map<String, Json>) -> Vec<(String, Value)> {
    values.into_iter().map(|(name, value)| (name, Value::from(value))).collect()
}

/// A profile document could not be read.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The text is not JSON.
    #[error("profile is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON does not have the profile layout.
    #[error("{0}")]
    Shape(String),
    /// A `channel_` key without a channel number.
    #[error("`{0}` does not name a channel")]
    BadChannel(String),
}
