// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Name resolution for formula evaluation.

use hashbrown::HashMap;

use crate::value::Value;

/// Supplies setting values to an evaluating formula.
///
/// Bare names go through [`lookup`](Self::lookup). The three domain
/// functions map onto the remaining methods, whose defaults suit scopes
/// that only know a single channel:
///
/// | Formula | Method |
/// |---------|--------|
/// | `name` | `lookup("name")` |
/// | `extruderValue(ch, 'name')` | `channel_value(ch, "name")` |
/// | `extruderValues('name')` | `channel_values("name")` |
/// | `resolveOrValue('name')` | `resolved_value("name")` |
///
/// Returning `None` means the setting does not exist. Bare names then fail
/// evaluation; domain functions log a warning and read `0`.
pub trait Scope {
    /// Value of `name` as seen by the evaluating channel.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Value of `name` on `channel`; a negative channel means the
    /// evaluating channel.
    fn channel_value(&self, channel: i64, name: &str) -> Option<Value> {
        let _ = channel;
        self.lookup(name)
    }

    /// Values of `name` on every channel, in channel order.
    fn channel_values(&self, name: &str) -> Option<Vec<Value>> {
        self.lookup(name).map(|v| vec![v])
    }

    /// The single resolved value of `name` across channels.
    fn resolved_value(&self, name: &str) -> Option<Value> {
        self.lookup(name)
    }
}

/// A [`Scope`] backed by a plain map, for tests and one-off evaluation.
///
/// ```
/// use kiln_formula::{Formula, MapScope, Value};
///
/// let scope = MapScope::new().with("layer_height", 0.2);
/// let formula = Formula::parse("layer_height * 2");
/// assert_eq!(formula.evaluate(&scope), Ok(Value::Float(0.4)));
/// ```
#[derive(Clone, Debug, Default)]
pub struct MapScope {
    values: HashMap<String, Value>,
}

impl MapScope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding, builder style.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a binding.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_owned(), value.into());
    }
}

impl Scope for MapScope {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }
}
