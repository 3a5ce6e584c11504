// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Placed objects handed to the engine.

use kiln_formula::Value;
use serde::{Deserialize, Serialize};

/// Placement of a work item on the build plate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation in millimetres.
    pub position: [f64; 3],
}

impl Transform {
    /// No rotation, placed at the origin.
    pub const IDENTITY: Self = Self {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        position: [0.0; 3],
    };

    /// Identity rotation at `position`.
    #[must_use]
    pub const fn at(position: [f64; 3]) -> Self {
        Self {
            rotation: Self::IDENTITY.rotation,
            position,
        }
    }

    /// Replaces the rotation.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: [[f64; 3]; 3]) -> Self {
        self.rotation = rotation;
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One input file assigned to a channel, with its placement and the
/// per-object setting overrides.
///
/// ```
/// use kiln_command::{Transform, WorkItem};
/// use kiln_formula::Value;
///
/// let item = WorkItem::new("bracket.stl", 1)
///     .with_transform(Transform::at([10.0, 20.0, 0.0]))
///     .with_override("infill_sparse_density", Value::Int(40));
/// assert_eq!(item.channel, 1);
/// assert_eq!(item.overrides.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Input file path.
    pub path: String,
    /// Channel (extruder) printing the object.
    #[serde(default)]
    pub channel: usize,
    /// Placement.
    #[serde(default)]
    pub transform: Transform,
    /// Per-object values, emitted after the placement tokens.
    #[serde(default)]
    pub overrides: Vec<(String, Value)>,
}

impl WorkItem {
    /// A work item at the origin without overrides.
    pub fn new(path: impl Into<String>, channel: usize) -> Self {
        Self {
            path: path.into(),
            channel,
            transform: Transform::IDENTITY,
            overrides: Vec::new(),
        }
    }

    /// Replaces the placement.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Adds a per-object value.
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.push((name.into(), value.into()));
        self
    }
}
