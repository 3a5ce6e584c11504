// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declared setting types.

use std::fmt;

use kiln_formula::Value;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The declared type of a setting, as named in schema documents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SettingType {
    /// `float`
    #[serde(rename = "float")]
    Float,
    /// `int`
    #[serde(rename = "int")]
    Int,
    /// `str`
    #[serde(rename = "str", alias = "string")]
    Str,
    /// `bool`
    #[serde(rename = "bool")]
    Bool,
    /// `enum`: one of the definition's options.
    #[serde(rename = "enum")]
    Enum,
    /// `vec3`: three numbers.
    #[serde(rename = "vec3")]
    Vec3,
    /// `polygon`: a list of `[x, y]` points.
    #[serde(rename = "polygon")]
    Polygon,
    /// `polygons`: a list of polygons.
    #[serde(rename = "polygons")]
    Polygons,
    /// `[int]`: a list of integers.
    #[serde(rename = "[int]")]
    IntList,
    /// `extruder`: a channel index, stored as text.
    #[serde(rename = "extruder")]
    Extruder,
    /// `optional_extruder`: a channel index or `-1`, stored as text.
    #[serde(rename = "optional_extruder")]
    OptionalExtruder,
}

impl SettingType {
    /// Every type, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Float,
        Self::Int,
        Self::Str,
        Self::Bool,
        Self::Enum,
        Self::Vec3,
        Self::Polygon,
        Self::Polygons,
        Self::IntList,
        Self::Extruder,
        Self::OptionalExtruder,
    ];

    /// Parses a schema type name. Returns `None` for unknown names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "float" => Self::Float,
            "int" => Self::Int,
            "str" | "string" => Self::Str,
            "bool" => Self::Bool,
            "enum" => Self::Enum,
            "vec3" => Self::Vec3,
            "polygon" => Self::Polygon,
            "polygons" => Self::Polygons,
            "[int]" => Self::IntList,
            "extruder" => Self::Extruder,
            "optional_extruder" => Self::OptionalExtruder,
            _ => return None,
        })
    }

    /// Parses a schema type name, falling back to [`SettingType::Str`] with a
    /// warning for unknown names.
    #[must_use]
    pub fn from_name_lossy(setting: &str, name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!(setting, declared = name, "unknown setting type, treating as str");
            Self::Str
        })
    }

    /// The schema name of this type.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Enum => "enum",
            Self::Vec3 => "vec3",
            Self::Polygon => "polygon",
            Self::Polygons => "polygons",
            Self::IntList => "[int]",
            Self::Extruder => "extruder",
            Self::OptionalExtruder => "optional_extruder",
        }
    }

    /// The value a definition without `default_value` starts from.
    #[must_use]
    pub fn zero_value(self) -> Value {
        match self {
            Self::Float => Value::Float(0.0),
            Self::Int => Value::Int(0),
            Self::Str | Self::Enum => Value::Str(String::new()),
            Self::Bool => Value::Bool(false),
            Self::Vec3 => Value::List(vec![Value::Float(0.0); 3]),
            Self::Polygon | Self::Polygons | Self::IntList => Value::List(Vec::new()),
            Self::Extruder => Value::Str("0".to_owned()),
            Self::OptionalExtruder => Value::Str("-1".to_owned()),
        }
    }

    /// Returns `true` if `value` already has this type's shape.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Float => value.is_number(),
            Self::Int => matches!(value, Value::Int(_)),
            Self::Str | Self::Enum => matches!(value, Value::Str(_)),
            Self::Bool => matches!(value, Value::Bool(_)),
            Self::Extruder | Self::OptionalExtruder => {
                matches!(value, Value::Str(_) | Value::Int(_))
            }
            Self::Vec3 => value
                .as_list()
                .is_some_and(|items| items.len() == 3 && items.iter().all(Value::is_number)),
            Self::Polygon | Self::Polygons | Self::IntList => value.as_list().is_some(),
        }
    }

    /// Converts `value` to this type where an obvious conversion exists.
    ///
    /// Profiles store everything as text (`"0.2"`, `"True"`, `"[[0, 0]]"`),
    /// so text is parsed according to the type. Values that cannot be
    /// converted are returned unchanged; check [`accepts`](Self::accepts).
    ///
    /// ```
    /// use kiln_definition::SettingType;
    /// use kiln_formula::Value;
    ///
    /// assert_eq!(SettingType::Float.coerce(Value::from("0.2")), Value::Float(0.2));
    /// assert_eq!(SettingType::Bool.coerce(Value::from("True")), Value::Bool(true));
    /// assert_eq!(SettingType::Extruder.coerce(Value::Int(1)), Value::from("1"));
    /// ```
    #[must_use]
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (Self::Float, Value::Int(i)) => Value::Float(i as f64),
            (Self::Float, Value::Bool(b)) => Value::Float(f64::from(u8::from(b))),
            (Self::Float, Value::Str(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::Str(s),
            },
            (Self::Int, Value::Bool(b)) => Value::Int(i64::from(b)),
            (Self::Int, Value::Float(f)) => match Value::Float(f.trunc()).as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(f),
            },
            (Self::Int, Value::Str(s)) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Value::Int(i)
                } else if let Some(i) = trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(|f| Value::Float(f.trunc()).as_i64())
                {
                    Value::Int(i)
                } else {
                    Value::Str(s)
                }
            }
            (Self::Bool, Value::Str(s)) => match s.trim() {
                "True" | "true" | "1" | "yes" => Value::Bool(true),
                "False" | "false" | "0" | "no" | "" => Value::Bool(false),
                _ => Value::Str(s),
            },
            (Self::Bool, v @ (Value::Int(_) | Value::Float(_))) => Value::Bool(v.is_truthy()),
            (Self::Str | Self::Enum, v @ (Value::Int(_) | Value::Float(_) | Value::Bool(_))) => {
                Value::Str(v.to_string())
            }
            (Self::Extruder | Self::OptionalExtruder, Value::Int(i)) => Value::Str(i.to_string()),
            (Self::Vec3 | Self::Polygon | Self::Polygons | Self::IntList, Value::Str(s)) => {
                match serde_json::from_str::<serde_json::Value>(&s) {
                    Ok(json @ serde_json::Value::Array(_)) => Value::from(json),
                    _ => Value::Str(s),
                }
            }
            (_, v) => v,
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for ty in SettingType::ALL {
            assert_eq!(SettingType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(SettingType::from_name("string"), Some(SettingType::Str));
        assert_eq!(SettingType::from_name("matrix"), None);
        assert_eq!(SettingType::from_name_lossy("x", "matrix"), SettingType::Str);
    }

    #[test]
    fn zero_values_are_accepted_by_their_type() {
        for ty in SettingType::ALL {
            assert!(ty.accepts(&ty.zero_value()), "{ty} rejects its own zero value");
        }
    }

    #[test]
    fn coerce_profile_text() {
        assert_eq!(SettingType::Int.coerce(Value::from(" 3 ")), Value::Int(3));
        assert_eq!(SettingType::Int.coerce(Value::from("3.0")), Value::Int(3));
        assert_eq!(SettingType::Bool.coerce(Value::from("False")), Value::Bool(false));
        assert_eq!(
            SettingType::Polygon.coerce(Value::from("[[0, 1], [2, 3]]")),
            Value::List(vec![
                Value::List(vec![Value::Int(0), Value::Int(1)]),
                Value::List(vec![Value::Int(2), Value::Int(3)]),
            ])
        );
        assert_eq!(SettingType::Enum.coerce(Value::Int(4)), Value::from("4"));
    }

    #[test]
    fn unconvertible_values_pass_through() {
        let v = SettingType::Float.coerce(Value::from("wide"));
        assert_eq!(v, Value::from("wide"));
        assert!(!SettingType::Float.accepts(&v));
    }
}
